/*!
    wire format of the cyclic exchange

    Both directions exchange a frame of [FRAME] bytes: a payload of [PAYLOAD] little-endian bytes followed by its CRC-16 (see [crate::checksum]). The payload always carries the whole process image, plus one service register access at most.
*/

use core::fmt;
use bilge::prelude::*;
use packbytes::{FromBytes, ToBytes, ByteArray};

use crate::{
    pack_bilge,
    checksum,
    convert::{self, AnalogMode, OutOfRange},
    state::{Outputs, Inputs, ANALOG_INPUTS, ANALOG_OUTPUTS},
    };


/// size of the payload, without checksum
pub const PAYLOAD: usize = 24;
/// size of a complete frame
pub const FRAME: usize = PAYLOAD + checksum::TRAILER;

/// payload sent to the board
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq)]
pub struct Request {
    /// value of the accessed service register, 0 when none
    pub service_value: u16,
    /// address of the accessed service register, 0 when none
    pub service_register: u16,
    /// reserved control byte
    pub control: u8,
    /// mask of LEDs driven by the application
    pub led_control: u8,
    /// mask of LEDs lit, among the controlled ones
    pub led_value: u8,
    /// mask of digital outputs
    pub digital_outputs: u8,
    /// group 1 counter divisor, see [convert::pwm_divisor]
    pub pwm1_divisor: u16,
    /// group 1 duty cycles, see [convert::pwm_duty]
    pub pwm1: [u16; 3],
    /// group 2 counter divisor
    pub pwm2_divisor: u16,
    /// group 2 duty cycle
    pub pwm2: u16,
    /// DAC codes, see [convert::analog_output]
    pub analog_outputs: [u16; ANALOG_OUTPUTS],
}

/// payload received from the board
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Reply {
    /// value of the echoed service register
    pub service_value: u16,
    /// echoed service register
    pub service_register: ServiceAddress,
    /// SPI status of the board
    pub status: u8,
    _reserved1: [u8; 2],
    /// mask of digital inputs
    pub digital_inputs: u8,
    pub counters: [i32; 2],
    _reserved2: [u8; 4],
    /// ADC codes
    pub analog_inputs: [u16; ANALOG_INPUTS],
}

/// service register address as echoed by the board
#[bitsize(16)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct ServiceAddress {
    pub register: u13,
    /// the board refused the access
    pub error: bool,
    _reserved: u2,
}
pack_bilge!(ServiceAddress);

const _: () = assert!(<Request as ToBytes>::Bytes::SIZE == PAYLOAD);
const _: () = assert!(<Reply as FromBytes>::Bytes::SIZE == PAYLOAD);


/// service register access embedded in a request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub register: u16,
    pub value: u16,
}

/// service register echo carried by a reply
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Echo {
    /// address of the register, without the error flag
    pub register: u16,
    pub value: u16,
    /// the board refused the access
    pub error: bool,
}

/// encoded request
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Encoded {
    pub bytes: [u8; FRAME],
    /// analog outputs that were out of range and clamped
    pub clamped: [Option<OutOfRange>; ANALOG_OUTPUTS],
}

/// decoded reply
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Decoded {
    pub inputs: Inputs,
    pub echo: Echo,
}

/// the received frame does not match its checksum, and was discarded
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CrcMismatch {
    /// checksum of the received payload
    pub computed: u16,
    /// checksum carried by the frame
    pub received: u16,
}
impl fmt::Display for CrcMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame checksum mismatch, computed {:#06x} received {:#06x}", self.computed, self.received)
    }
}
impl core::error::Error for CrcMismatch {}


impl Request {
    /// process image to send, the analog outputs out of range are clamped
    pub fn new(outputs: &Outputs, service: Option<Service>) -> (Self, [Option<OutOfRange>; ANALOG_OUTPUTS]) {
        let mut request = Self::default();
        if let Some(service) = service {
            request.service_value = service.value;
            request.service_register = service.register;
        }
        for (i, led) in outputs.leds.iter().enumerate() {
            if led.controlled {
                request.led_control |= 1 << i;
                if led.value
                    {request.led_value |= 1 << i}
            }
        }
        request.digital_outputs = mask(&outputs.digital);

        request.pwm1_divisor = convert::pwm_divisor(outputs.pwm1.frequency);
        request.pwm1 = outputs.pwm1.duty.map(convert::pwm_duty);
        request.pwm2_divisor = convert::pwm_divisor(outputs.pwm2.frequency);
        request.pwm2 = convert::pwm_duty(outputs.pwm2.duty[0]);

        let mut clamped = [None; ANALOG_OUTPUTS];
        for (i, &volts) in outputs.analog.iter().enumerate() {
            request.analog_outputs[i] = convert::analog_output(volts).unwrap_or_else(|range| {
                clamped[i] = Some(range);
                range.clamped
            });
        }
        (request, clamped)
    }
    /// complete frame with checksum
    pub fn to_frame(self) -> [u8; FRAME] {
        let mut frame = [0; FRAME];
        frame[.. PAYLOAD].copy_from_slice(self.to_le_bytes().as_ref());
        checksum::append(&mut frame);
        frame
    }
}

impl Reply {
    /// check and parse a received frame
    pub fn from_frame(frame: &[u8; FRAME]) -> Result<Self, CrcMismatch> {
        if !checksum::validate(frame) {
            return Err(CrcMismatch {
                computed: checksum::compute(&frame[.. PAYLOAD]),
                received: u16::from_le_bytes([frame[PAYLOAD], frame[PAYLOAD+1]]),
            });
        }
        let mut payload = <Reply as FromBytes>::Bytes::zeroed();
        payload.as_mut().copy_from_slice(&frame[.. PAYLOAD]);
        Ok(Self::from_le_bytes(payload))
    }
    /// physical values, given the modes of analog inputs
    pub fn inputs(&self, modes: [AnalogMode; ANALOG_INPUTS]) -> Inputs {
        let mut inputs = Inputs {
            counters: self.counters,
            status: self.status,
            .. Default::default()
        };
        for (i, input) in inputs.digital.iter_mut().enumerate() {
            *input = self.digital_inputs & (1 << i) != 0;
        }
        for (i, input) in inputs.analog.iter_mut().enumerate() {
            *input = convert::analog_input(self.analog_inputs[i], modes[i]);
        }
        inputs
    }
    pub fn echo(&self) -> Echo {
        Echo {
            register: self.service_register.register().value(),
            value: self.service_value,
            error: self.service_register.error(),
        }
    }
}

/// build the frame to send for the given outputs and service access
pub fn encode(outputs: &Outputs, service: Option<Service>) -> Encoded {
    let (request, clamped) = Request::new(outputs, service);
    Encoded {bytes: request.to_frame(), clamped}
}

/// parse a received frame, nothing is decoded if its checksum is wrong
pub fn decode(frame: &[u8; FRAME], modes: [AnalogMode; ANALOG_INPUTS]) -> Result<Decoded, CrcMismatch> {
    let reply = Reply::from_frame(frame)?;
    Ok(Decoded {
        inputs: reply.inputs(modes),
        echo: reply.echo(),
    })
}

fn mask(bits: &[bool]) -> u8 {
    bits.iter().enumerate()
        .filter(|(_, bit)| **bit)
        .fold(0, |mask, (i, _)| mask | 1 << i)
}
