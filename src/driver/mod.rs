/*!
    asynchronous cyclic driver in `std` environment

    The central resource is the [Hat] struct which owns the SPI device and performs the cyclic exchanges.

    - [Hat::run] is the coroutine exchanging frames, it **must** be running for anything to happen on the board
    - the output state is set by [Hat::set_outputs] or [Hat::update_outputs] and sent on the next cycle
    - each valid cycle publishes the input state to [Hat::subscribe] receivers
    - service registers are accessed by [Hat::read], [Hat::write], or [Hat::request], which resolve once the board echoed the register

    ```ignore
    let hat = Hat::new(spi, Config::default());
    let task = async {
        hat.open().await?;
        hat.update_outputs(|outputs| outputs.digital[0] = true);
        let mut events = hat.subscribe();
        while let Ok(event) = events.recv().await {
            if let Event::Data(inputs) = event  {println!("{:?}", inputs.analog)}
        }
        Ok(())
    };
    (task, hat.run()).race().await?;
    ```
*/

/// implementation of the cyclic exchange, this is the tricky part of the code
mod cycle;
/// convenient methods to access the process image and the service registers
mod accessing;

pub use cycle::Hat;
pub use embedded_hal_async::spi::ErrorKind;

use core::time::Duration;
use thiserror::Error;
use crate::{
    frame::{CrcMismatch, FRAME},
    convert::OutOfRange,
    state::Inputs,
    };


/// error of an operation requested to the driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("board refused access to register {register:#06x}, value {value}")]
    Device {register: u16, value: u16},
    #[error("driver is closed")]
    Closed,
    #[error("too many service register accesses pending")]
    QueueFull,
    #[error("cyclic task is already running")]
    Running,
    #[error("no service register at address {0:#06x}")]
    UnknownRegister(u16),
    #[error("no service register in slot {0}")]
    UnknownSlot(usize),
}

/// notification published by the cyclic task
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// a valid frame was received, with this input state
    Data(Inputs),
    /// a frame was received with a wrong checksum and discarded
    FrameError {
        reason: CrcMismatch,
        frame: [u8; FRAME],
    },
    /// the SPI exchange failed, it will be retried next cycle
    TransportError(ErrorKind),
    /// the board refused a service register access
    ServiceError {register: u16, value: u16},
    /// an analog output was out of range and clamped
    Clamped {channel: usize, range: OutOfRange},
}

/// settings of the cyclic task
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// delay between cycles when no service access is pending, it must stay below the board watchdog timeout (100ms by default)
    pub period: Duration,
    /**
        maximum number of consecutive cycles without delay while service accesses are pending

        after it a full period is waited before continuing. `None` never waits while accesses are pending.
    */
    pub max_burst: Option<usize>,
    /// number of events kept for subscribers lagging behind
    pub events: usize,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(70),
            max_burst: None,
            events: 64,
        }
    }
}
impl Config {
    /// delay before the next cycle, given the number of pending service accesses and the number of cycles already done without delay
    pub fn delay(&self, pending: usize, burst: usize) -> Duration {
        if pending == 0
            {return self.period}
        match self.max_burst {
            Some(max) if burst >= max => self.period,
            _ => Duration::ZERO,
        }
    }
}
