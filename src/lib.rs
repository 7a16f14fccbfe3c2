/*!
    driver for the Monarco HAT I/O board, exchanging fixed size frames over a full-duplex SPI link

    The board expects a frame cyclically, or its watchdog forces the outputs to a safe state. Every frame carries the full output state and brings back the full input state. Configuration and identification registers of the board ("service registers") are accessed one at a time by piggybacking their address and value on the cyclic frame.

    - the wire format, checksum and unit conversions are usable without `std`
    - the cyclic scheduler needs the `driver` feature, see [driver::Hat]
*/
#![no_std]
#[cfg(any(feature = "std", test))]
extern crate std;

mod utils;
#[cfg(feature = "driver")]
mod mutex;
#[cfg(feature = "driver")]
mod queue;

pub mod checksum;
pub mod convert;
pub mod frame;
pub mod registers;
pub mod state;
#[cfg(feature = "driver")]
pub mod driver;
