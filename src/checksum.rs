/*!
    CRC-16 trailer of every frame

    this is the Modbus variant: reflected polynomial `0xA001`, register initialized at `0xFFFF`, no final xor. The checksum is appended little-endian after the payload.
*/

use crc::{Crc, CRC_16_MODBUS};

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// size of the checksum trailer in bytes
pub const TRAILER: usize = 2;

/// checksum of the given bytes
pub fn compute(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// write the checksum of `frame[.. len-2]` in the last 2 bytes of `frame`
pub fn append(frame: &mut [u8]) {
    let Some(end) = frame.len().checked_sub(TRAILER)
        else {return};
    let crc = compute(&frame[.. end]);
    frame[end ..].copy_from_slice(&crc.to_le_bytes());
}

/// check a buffer ending with its checksum trailer
pub fn validate(frame: &[u8]) -> bool {
    let Some(end) = frame.len().checked_sub(TRAILER)
        else {return false};
    compute(&frame[.. end]).to_le_bytes() == frame[end ..]
}
