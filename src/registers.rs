/*!
    service registers of the board

    each known register is described by a [Register] constant giving its slot in the [Table] and its address on the board. The slot is the stable identity of a register in this crate, the address is only what travels on the wire.
*/

use bilge::prelude::*;
use crate::state::Settings;
use crate::convert::AnalogMode;


/// a known service register, a cheap handle to a slot of [Table]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Register {
    slot: usize,
    address: u16,
}
impl Register {
    pub const fn new(slot: usize, address: u16) -> Self {
        Self {slot, address}
    }
    /// index of this register in [Table]
    pub const fn slot(&self) -> usize {self.slot}
    /// address of this register on the board
    pub const fn address(&self) -> u16 {self.address}
}

/// status word, user defined
pub const STATUS: Register = Register::new(0, 0x0000);
/// firmware version, low half
pub const FIRMWARE_LOW: Register = Register::new(1, 0x0001);
/// firmware version, high half
pub const FIRMWARE_HIGH: Register = Register::new(2, 0x0002);
/// hardware version, low half
pub const HARDWARE_LOW: Register = Register::new(3, 0x0003);
/// hardware version, high half
pub const HARDWARE_HIGH: Register = Register::new(4, 0x0004);
/// CPU unique id, quarters from lowest to highest
pub const CPU_ID: [Register; 4] = [
    Register::new(5, 0x0005),
    Register::new(6, 0x0006),
    Register::new(7, 0x0007),
    Register::new(8, 0x0008),
    ];
/// number of frames received by the board
pub const RX_COUNT: Register = Register::new(9, 0x0014);
/// number of frames sent by the board
pub const TX_COUNT: Register = Register::new(10, 0x0015);
/// number of frames the board rejected because of their framing
pub const RX_FRAME_ERRORS: Register = Register::new(11, 0x0018);
/// number of frames the board rejected because of their checksum
pub const RX_PARITY_ERRORS: Register = Register::new(12, 0x0019);
/// delay in milliseconds without cycle before the board forces its outputs to safe state
pub const WATCHDOG: Register = Register::new(13, 0x100F);
/// RS-485 baud rate divided by 100
pub const RS485_BAUD: Register = Register::new(14, 0x1010);
/// RS-485 character format, see [Rs485Mode]
pub const RS485_MODE: Register = Register::new(15, 0x1011);
/// board peripherals configuration, see [BoardConfig]
pub const BOARD_CONFIG: Register = Register::new(16, 0x100A);
/// counters modes, values are defined by the board firmware
pub const COUNTER_MODE: [Register; 2] = [
    Register::new(17, 0x1024),
    Register::new(18, 0x1025),
    ];

/// number of known registers
pub const SLOTS: usize = 19;
/// all known registers, ordered by slot
pub const ALL: [Register; SLOTS] = [
    STATUS,
    FIRMWARE_LOW, FIRMWARE_HIGH,
    HARDWARE_LOW, HARDWARE_HIGH,
    CPU_ID[0], CPU_ID[1], CPU_ID[2], CPU_ID[3],
    RX_COUNT, TX_COUNT,
    RX_FRAME_ERRORS, RX_PARITY_ERRORS,
    WATCHDOG,
    RS485_BAUD, RS485_MODE,
    BOARD_CONFIG,
    COUNTER_MODE[0], COUNTER_MODE[1],
    ];


/// RS-485 mode word
#[bitsize(16)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct Rs485Mode {
    /// [crate::state::Parity] code
    pub parity: u3,
    /// character size, only 8 bits (code 3) is used
    pub char_size: u2,
    /// [crate::state::StopBits] code
    pub stop_bits: u2,
    _reserved: u9,
}
impl Rs485Mode {
    /// code of 8 bits characters
    pub const EIGHT_BITS: u8 = 3;
}

/// board configuration word
#[bitsize(16)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct BoardConfig {
    /// RS-485 bus termination resistor
    pub termination: bool,
    /// analog input 1 measuring a current instead of a voltage
    pub current1: bool,
    /// analog input 2 measuring a current instead of a voltage
    pub current2: bool,
    _reserved: u13,
}

impl Settings {
    /// value of [RS485_BAUD]
    pub fn baud_word(&self) -> u16 {
        u16::try_from(self.baud_rate / 100).unwrap_or(u16::MAX)
    }
    /// value of [RS485_MODE]
    pub fn mode_word(&self) -> u16 {
        let mut mode = Rs485Mode::from(0u16);
        mode.set_parity(u3::new(self.parity as u8));
        mode.set_char_size(u2::new(Rs485Mode::EIGHT_BITS));
        mode.set_stop_bits(u2::new(self.stop_bits as u8));
        u16::from(mode)
    }
    /// value of [BOARD_CONFIG]
    pub fn config_word(&self) -> u16 {
        let mut config = BoardConfig::from(0u16);
        config.set_termination(self.termination);
        config.set_current1(self.analog_inputs[0] == AnalogMode::Current);
        config.set_current2(self.analog_inputs[1] == AnalogMode::Current);
        u16::from(config)
    }
}


/// a slot of [Table]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ServiceRegister {
    /// address on the board
    pub address: u16,
    /// last value read from the board, or staged to be written. `None` until first read
    pub value: Option<u16>,
}
/// value sent on the wire for a register never read
pub const UNKNOWN: u16 = 0xFFFF;

impl ServiceRegister {
    /// value to embed in a request, [UNKNOWN] if never read
    pub fn wire_value(&self) -> u16 {
        self.value.unwrap_or(UNKNOWN)
    }
}

/// local copy of all known service registers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    slots: [ServiceRegister; SLOTS],
}
impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}
impl Table {
    /// table with every known register unread
    pub fn new() -> Self {
        Self {slots: ALL.map(|register| ServiceRegister {address: register.address(), value: None})}
    }
    pub fn len(&self) -> usize {self.slots.len()}
    pub fn is_empty(&self) -> bool {self.slots.is_empty()}
    pub fn get(&self, slot: usize) -> Option<&ServiceRegister> {
        self.slots.get(slot)
    }
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut ServiceRegister> {
        self.slots.get_mut(slot)
    }
    pub fn iter(&self) -> impl Iterator<Item=&ServiceRegister> {
        self.slots.iter()
    }
    /// slot of the register with the given address
    pub fn find(&self, address: u16) -> Option<usize> {
        self.slots.iter().position(|register| register.address == address)
    }
    /// current value of a known register
    pub fn value(&self, register: Register) -> Option<u16> {
        self.get(register.slot()).and_then(|register| register.value)
    }
    /// set the value of a slot, return true if it changed
    pub fn stage(&mut self, slot: usize, value: u16) -> bool {
        match self.slots.get_mut(slot) {
            Some(register) if register.value != Some(value) => {
                register.value = Some(value);
                true
            },
            _ => false,
        }
    }
    /**
        stage the configuration registers that are derived from the settings, where they differ from the current value

        return the number of changed registers
    */
    pub fn derive(&mut self, settings: &Settings) -> usize {
        [
            (RS485_BAUD, settings.baud_word()),
            (RS485_MODE, settings.mode_word()),
            (BOARD_CONFIG, settings.config_word()),
        ].into_iter()
            .filter(|&(register, value)| self.stage(register.slot(), value))
            .count()
    }
    /// identification of the board, available once all its registers have been read
    pub fn device_info(&self) -> Option<DeviceInfo> {
        let pair = |low: Register, high: Register| Some(
            u32::from(self.value(high)?) << 16 | u32::from(self.value(low)?)
            );
        let mut cpu_id = 0;
        for register in CPU_ID.iter().rev() {
            cpu_id = cpu_id << 16 | u64::from(self.value(*register)?);
        }
        Some(DeviceInfo {
            firmware: pair(FIRMWARE_LOW, FIRMWARE_HIGH)?,
            hardware: pair(HARDWARE_LOW, HARDWARE_HIGH)?,
            cpu_id,
        })
    }
}

/// board identification
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub firmware: u32,
    pub hardware: u32,
    pub cpu_id: u64,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Parity, StopBits};

    #[test]
    fn slots_match_table() {
        let table = Table::new();
        assert_eq!(table.len(), SLOTS);
        for (slot, register) in ALL.iter().enumerate() {
            assert_eq!(register.slot(), slot);
            assert_eq!(table.get(slot).unwrap().address, register.address());
            assert_eq!(table.find(register.address()), Some(slot));
            assert_eq!(table.value(*register), None);
        }
        assert_eq!(table.find(0x1234), None);
    }

    #[test]
    fn unknown_on_wire() {
        let mut table = Table::new();
        assert_eq!(table.get(WATCHDOG.slot()).unwrap().wire_value(), UNKNOWN);
        table.stage(WATCHDOG.slot(), 0);
        assert_eq!(table.get(WATCHDOG.slot()).unwrap().wire_value(), 0);
    }

    #[test]
    fn mode_word() {
        let mut settings = Settings::default();
        // 8 bits, no parity, 1 stop bit
        assert_eq!(settings.mode_word(), (3 << 3) | (1 << 5));
        settings.parity = Parity::Odd;
        settings.stop_bits = StopBits::Two;
        assert_eq!(settings.mode_word(), (3 << 3) | 2 | (3 << 5));
        settings.parity = Parity::Even;
        settings.stop_bits = StopBits::Half;
        assert_eq!(settings.mode_word(), (3 << 3) | 1);
    }

    #[test]
    fn config_word() {
        let mut settings = Settings::default();
        assert_eq!(settings.config_word(), 0b001);
        settings.set_analog_mode(1, AnalogMode::Current);
        assert_eq!(settings.config_word(), 0b101);
        settings.termination = false;
        settings.set_analog_mode(0, AnalogMode::Current);
        assert_eq!(settings.config_word(), 0b110);
        // out of range channel is ignored
        settings.set_analog_mode(7, AnalogMode::Voltage);
        assert_eq!(settings.config_word(), 0b110);
    }

    #[test]
    fn baud_word() {
        let mut settings = Settings::default();
        assert_eq!(settings.baud_word(), 96);
        settings.baud_rate = 38_400;
        assert_eq!(settings.baud_word(), 384);
        settings.baud_rate = u32::MAX;
        assert_eq!(settings.baud_word(), u16::MAX);
    }

    #[test]
    fn derive_only_changes() {
        let mut table = Table::new();
        let mut settings = Settings::default();
        assert_eq!(table.derive(&settings), 3);
        assert_eq!(table.value(RS485_BAUD), Some(96));
        assert_eq!(table.value(RS485_MODE), Some(settings.mode_word()));
        assert_eq!(table.value(BOARD_CONFIG), Some(0b001));
        assert_eq!(table.derive(&settings), 0);
        settings.baud_rate = 115_200;
        assert_eq!(table.derive(&settings), 1);
        assert_eq!(table.value(RS485_BAUD), Some(1152));
        // other registers are left untouched
        assert_eq!(table.value(WATCHDOG), None);
    }

    #[test]
    fn device_info() {
        let mut table = Table::new();
        table.stage(FIRMWARE_LOW.slot(), 0x0304);
        table.stage(FIRMWARE_HIGH.slot(), 0x0102);
        table.stage(HARDWARE_LOW.slot(), 0x0002);
        table.stage(HARDWARE_HIGH.slot(), 0x0001);
        assert_eq!(table.device_info(), None);
        for (i, register) in CPU_ID.iter().enumerate() {
            table.stage(register.slot(), 0x1111 * (i as u16 + 1));
        }
        assert_eq!(table.device_info(), Some(DeviceInfo {
            firmware: 0x0102_0304,
            hardware: 0x0001_0002,
            cpu_id: 0x4444_3333_2222_1111,
        }));
    }
}
