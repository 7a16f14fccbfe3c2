/*!
    process image of the board: what the application writes, what the board reports, and the settings of its peripherals
*/

use crate::convert::AnalogMode;

/// number of user LEDs
pub const LEDS: usize = 8;
/// number of digital outputs
pub const DIGITAL_OUTPUTS: usize = 4;
/// number of digital inputs
pub const DIGITAL_INPUTS: usize = 4;
/// number of analog outputs
pub const ANALOG_OUTPUTS: usize = 2;
/// number of analog inputs
pub const ANALOG_INPUTS: usize = 2;
/// number of counters
pub const COUNTERS: usize = 2;


/// a LED is only driven by the application when `controlled`, the board drives it otherwise
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Led {
    pub controlled: bool,
    pub value: bool,
}

/// PWM group, all its channels share the same frequency
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pwm<const N: usize> {
    /// frequency in Hz, out of `1 .. 100_000` disables the group
    pub frequency: f64,
    /// duty cycles in `0 ..= 1`
    pub duty: [f64; N],
}
impl<const N: usize> Default for Pwm<N> {
    fn default() -> Self {
        Self {frequency: 0., duty: [0.; N]}
    }
}

/// output state sent to the board on every cycle
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Outputs {
    pub leds: [Led; LEDS],
    pub digital: [bool; DIGITAL_OUTPUTS],
    /// voltages in `0 .. 10`V
    pub analog: [f64; ANALOG_OUTPUTS],
    /// channels 1A, 1B, 1C
    pub pwm1: Pwm<3>,
    /// channel 2A
    pub pwm2: Pwm<1>,
}

/// input state received from the board on a valid cycle
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Inputs {
    pub digital: [bool; DIGITAL_INPUTS],
    pub counters: [i32; COUNTERS],
    /// volts, or milliamps for inputs in current mode
    pub analog: [f64; ANALOG_INPUTS],
    /// raw SPI status byte, passed through
    pub status: u8,
}


/// RS-485 parity
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Parity {
    #[default]
    None = 0,
    Even = 1,
    Odd = 2,
}

/// RS-485 stop bits
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StopBits {
    Half = 0,
    #[default]
    One = 1,
    OneAndHalf = 2,
    Two = 3,
}

/**
    peripheral settings of the board

    they are not part of the cyclic frame, but are written to configuration registers by the service channel, see [crate::registers::Table::derive]
*/
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Settings {
    /// RS-485 baud rate, the board stores it in hundreds of bauds
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// RS-485 bus termination resistor
    pub termination: bool,
    pub analog_inputs: [AnalogMode; ANALOG_INPUTS],
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::None,
            stop_bits: StopBits::One,
            termination: true,
            analog_inputs: [AnalogMode::Voltage; ANALOG_INPUTS],
        }
    }
}
impl Settings {
    /// switch analog input `channel` (starting at 0) to measure a voltage or a current
    pub fn set_analog_mode(&mut self, channel: usize, mode: AnalogMode) {
        if let Some(slot) = self.analog_inputs.get_mut(channel) {
            *slot = mode;
        }
    }
}
