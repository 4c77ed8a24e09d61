//! Simulated RTU slave: register and coil banks answering request frames.
//!
//! Serves function codes 0x01 to 0x06, 0x0F, 0x10, 0x16 and 0x17. Input
//! registers hold their own address and odd discrete inputs are on, so reads
//! of the read-only banks return recognizable data.

use log::*;
use rtutcp::frame::{self, encode_adu};
use rtutcp::{Crc16, HexDump};

pub const HOLDING_REGISTERS: usize = 1024;
pub const COILS: usize = 1024;
pub const INPUT_REGISTERS: usize = 1024;
pub const DISCRETE_INPUTS: usize = 1024;

/// Exception codes sent back in `function | 0x80` replies.
pub const ILLEGAL_FUNCTION: u8 = 0x01;
pub const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
pub const ILLEGAL_DATA_VALUE: u8 = 0x03;

pub struct Slave {
    id: u8,
    holding: Vec<u16>,
    coils: Vec<bool>,
    inputs: Vec<u16>,
    discrete: Vec<bool>,
}

impl Slave {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            holding: vec![0; HOLDING_REGISTERS],
            coils: vec![false; COILS],
            inputs: (0..INPUT_REGISTERS).map(|i| i as u16).collect(),
            discrete: (0..DISCRETE_INPUTS).map(|i| i % 2 == 1).collect(),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Handles one request ADU and returns the reply ADU.
    ///
    /// Frames with a bad CRC or addressed to another slave get no reply, as on
    /// a serial line.
    pub fn handle(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        if request.len() < rtutcp::RTU_MIN_SIZE || !Crc16::verify_frame(request) {
            warn!("Dropping corrupt frame: {}", HexDump(request));
            return None;
        }
        if request[0] != self.id {
            debug!("Ignoring frame for slave {}", request[0]);
            return None;
        }

        let function = request[1];
        let body = &request[2..request.len() - 2];
        let pdu = match self.apply(function, body) {
            Ok(pdu) => pdu,
            Err(code) => {
                debug!("Function {:#04x} rejected with exception {:#04x}", function, code);
                vec![frame::exception_code(function), code]
            }
        };
        Some(encode_adu(self.id, &pdu))
    }

    fn apply(&mut self, function: u8, body: &[u8]) -> Result<Vec<u8>, u8> {
        match function {
            frame::READ_COILS => read_bits(function, body, &self.coils),
            frame::READ_DISCRETE_INPUTS => read_bits(function, body, &self.discrete),
            frame::READ_HOLDING_REGISTERS => read_registers(function, body, &self.holding),
            frame::READ_INPUT_REGISTERS => read_registers(function, body, &self.inputs),
            frame::WRITE_SINGLE_COIL => {
                let (address, value) = address_quantity(body)?;
                let on = match value {
                    0xFF00 => true,
                    0x0000 => false,
                    _ => return Err(ILLEGAL_DATA_VALUE),
                };
                let range = checked_range(address, 1, 1, self.coils.len())?;
                self.coils[range.start] = on;
                Ok(echo(function, body))
            }
            frame::WRITE_SINGLE_REGISTER => {
                let (address, value) = address_quantity(body)?;
                let range = checked_range(address, 1, 1, self.holding.len())?;
                self.holding[range.start] = value;
                Ok(echo(function, body))
            }
            frame::WRITE_MULTIPLE_COILS => {
                let (address, quantity) = address_quantity(body)?;
                let range = checked_range(address, quantity, 1968, self.coils.len())?;
                let packed = payload(body, (quantity as usize).div_ceil(8))?;
                for (i, coil) in self.coils[range].iter_mut().enumerate() {
                    *coil = packed[i / 8] & (1 << (i % 8)) != 0;
                }
                Ok(echo(function, &body[..4]))
            }
            frame::WRITE_MULTIPLE_REGISTERS => {
                let (address, quantity) = address_quantity(body)?;
                let range = checked_range(address, quantity, 123, self.holding.len())?;
                let data = payload(body, quantity as usize * 2)?;
                for (register, bytes) in self.holding[range].iter_mut().zip(data.chunks_exact(2)) {
                    *register = u16::from_be_bytes([bytes[0], bytes[1]]);
                }
                Ok(echo(function, &body[..4]))
            }
            frame::MASK_WRITE_REGISTER => {
                let (address, and_mask) = address_quantity(body)?;
                let or_mask = match body {
                    [_, _, _, _, hi, lo] => u16::from_be_bytes([*hi, *lo]),
                    _ => return Err(ILLEGAL_DATA_VALUE),
                };
                let range = checked_range(address, 1, 1, self.holding.len())?;
                let register = &mut self.holding[range.start];
                *register = (*register & and_mask) | (or_mask & !and_mask);
                Ok(echo(function, body))
            }
            frame::READ_WRITE_MULTIPLE_REGISTERS => {
                let (read_address, read_quantity) = address_quantity(body)?;
                checked_range(read_address, read_quantity, 125, self.holding.len())?;
                let write = &body[4..];
                let (write_address, write_quantity) = address_quantity(write)?;
                let range = checked_range(write_address, write_quantity, 121, self.holding.len())?;
                let data = payload(write, write_quantity as usize * 2)?;
                for (register, bytes) in self.holding[range].iter_mut().zip(data.chunks_exact(2)) {
                    *register = u16::from_be_bytes([bytes[0], bytes[1]]);
                }
                read_registers(function, &body[..4], &self.holding)
            }
            _ => Err(ILLEGAL_FUNCTION),
        }
    }
}

fn read_bits(function: u8, body: &[u8], bank: &[bool]) -> Result<Vec<u8>, u8> {
    let (address, quantity) = address_quantity(body)?;
    let range = checked_range(address, quantity, 2000, bank.len())?;
    let mut packed = vec![0u8; (quantity as usize).div_ceil(8)];
    for (i, on) in bank[range].iter().enumerate() {
        if *on {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    let mut pdu = vec![function, packed.len() as u8];
    pdu.extend_from_slice(&packed);
    Ok(pdu)
}

fn read_registers(function: u8, body: &[u8], bank: &[u16]) -> Result<Vec<u8>, u8> {
    let (address, quantity) = address_quantity(body)?;
    let range = checked_range(address, quantity, 125, bank.len())?;
    let mut pdu = vec![function, (quantity * 2) as u8];
    for value in &bank[range] {
        pdu.extend_from_slice(&value.to_be_bytes());
    }
    Ok(pdu)
}

fn address_quantity(body: &[u8]) -> Result<(u16, u16), u8> {
    match body {
        [a_hi, a_lo, q_hi, q_lo, ..] => Ok((
            u16::from_be_bytes([*a_hi, *a_lo]),
            u16::from_be_bytes([*q_hi, *q_lo]),
        )),
        _ => Err(ILLEGAL_DATA_VALUE),
    }
}

fn checked_range(
    address: u16,
    quantity: u16,
    max_quantity: u16,
    size: usize,
) -> Result<std::ops::Range<usize>, u8> {
    if quantity == 0 || quantity > max_quantity {
        return Err(ILLEGAL_DATA_VALUE);
    }
    let start = address as usize;
    let end = start + quantity as usize;
    if end > size {
        return Err(ILLEGAL_DATA_ADDRESS);
    }
    Ok(start..end)
}

/// Returns the byte-count prefixed payload of a multiple-write body.
fn payload(body: &[u8], expected: usize) -> Result<&[u8], u8> {
    match body.get(4) {
        Some(&count) if count as usize == expected && body.len() == 5 + expected => Ok(&body[5..]),
        _ => Err(ILLEGAL_DATA_VALUE),
    }
}

fn echo(function: u8, fields: &[u8]) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(1 + fields.len());
    pdu.push(function);
    pdu.extend_from_slice(fields);
    pdu
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtutcp::{ResponseLength, RtuFrameLength};

    #[test]
    fn test_read_holding_registers() {
        let mut slave = Slave::new(1);
        let reply = slave.handle(&frame::read_holding_registers(1, 300, 2)).unwrap();
        assert_eq!(&reply[..7], &[0x01, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]);
        assert!(Crc16::verify_frame(&reply));
    }

    #[test]
    fn test_write_then_read_registers() {
        let mut slave = Slave::new(1);
        let request = frame::write_multiple_registers(1, 1, &[3, 4]);
        let reply = slave.handle(&request).unwrap();
        assert_eq!(&reply[..6], &request[..6]);
        assert_eq!(reply.len(), 8);

        let reply = slave.handle(&frame::read_holding_registers(1, 1, 2)).unwrap();
        assert_eq!(&reply[3..7], &[0x00, 0x03, 0x00, 0x04]);
    }

    #[test]
    fn test_write_then_read_coils() {
        let mut slave = Slave::new(1);
        slave.handle(&frame::write_multiple_coils(1, 5, 10, &[4, 3])).unwrap();
        assert!(slave.handle(&frame::write_single_coil(1, 0, true)).is_some());

        let reply = slave.handle(&frame::read_coils(1, 5, 10)).unwrap();
        assert_eq!(&reply[..5], &[0x01, 0x01, 0x02, 0x04, 0x03]);
        let reply = slave.handle(&frame::read_coils(1, 0, 1)).unwrap();
        assert_eq!(reply[3], 0x01);
    }

    #[test]
    fn test_read_only_banks() {
        let mut slave = Slave::new(1);
        let reply = slave.handle(&frame::read_input_registers(1, 7, 2)).unwrap();
        assert_eq!(&reply[..7], &[0x01, 0x04, 0x04, 0x00, 0x07, 0x00, 0x08]);

        let reply = slave.handle(&frame::read_discrete_inputs(1, 0, 10)).unwrap();
        assert_eq!(&reply[..5], &[0x01, 0x02, 0x02, 0xAA, 0x02]);
    }

    #[test]
    fn test_mask_write_register() {
        let mut slave = Slave::new(1);
        slave.handle(&frame::write_single_register(1, 4, 0x12)).unwrap();
        let request = frame::mask_write_register(1, 4, 0xF2, 0x25);
        let reply = slave.handle(&request).unwrap();
        assert_eq!(reply, request);

        let reply = slave.handle(&frame::read_holding_registers(1, 4, 1)).unwrap();
        assert_eq!(&reply[3..5], &[0x00, 0x17]);
    }

    #[test]
    fn test_read_write_multiple_registers() {
        let mut slave = Slave::new(1);
        let request = frame::read_write_multiple_registers(1, 9, 3, 10, &[0xAB, 0xCD]);
        let reply = slave.handle(&request).unwrap();
        assert_eq!(
            &reply[..9],
            &[0x01, 0x17, 0x06, 0x00, 0x00, 0x00, 0xAB, 0x00, 0xCD]
        );
        assert_eq!(reply.len(), RtuFrameLength.response_length(&request));

        let bad = frame::read_write_multiple_registers(1, 0, 1, 1023, &[1, 2]);
        let reply = slave.handle(&bad).unwrap();
        assert_eq!(&reply[..3], &[0x01, 0x97, ILLEGAL_DATA_ADDRESS]);
    }

    #[test]
    fn test_exceptions() {
        let mut slave = Slave::new(1);

        let reply = slave.handle(&encode_adu(1, &[0x2B, 0x0E, 0x01, 0x00])).unwrap();
        assert_eq!(&reply[..3], &[0x01, 0xAB, ILLEGAL_FUNCTION]);
        assert_eq!(reply.len(), rtutcp::RTU_EXCEPTION_SIZE);

        let reply = slave.handle(&frame::read_holding_registers(1, 1020, 10)).unwrap();
        assert_eq!(&reply[..3], &[0x01, 0x83, ILLEGAL_DATA_ADDRESS]);

        let reply = slave.handle(&frame::read_holding_registers(1, 0, 0)).unwrap();
        assert_eq!(&reply[..3], &[0x01, 0x83, ILLEGAL_DATA_VALUE]);
    }

    #[test]
    fn test_silent_on_bad_frames() {
        let mut slave = Slave::new(1);
        let mut corrupt = frame::read_holding_registers(1, 0, 1);
        corrupt[7] ^= 0xFF;
        assert!(slave.handle(&corrupt).is_none());
        assert!(slave.handle(&frame::read_holding_registers(2, 0, 1)).is_none());
    }
}
