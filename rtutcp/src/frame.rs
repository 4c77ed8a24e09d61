//! RTU frame knowledge: function codes, response length prediction and
//! request builders.
//!
//! An RTU application data unit (ADU) is laid out as:
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────┬──────────┐
//! │ slave id │ function │       payload       │  CRC-16  │
//! │ (1 byte) │ (1 byte) │  (0 - 252 bytes)    │ (2, LE)  │
//! └──────────┴──────────┴─────────────────────┴──────────┘
//! ```
//!
//! Nothing on the wire says how long a response is, so the transport asks a
//! [`ResponseLength`] implementation for the size of a normal reply to the
//! request it just sent.

use crate::crc::Crc16;
use crate::RTU_MIN_SIZE;

/// Read coils.
pub const READ_COILS: u8 = 0x01;
/// Read discrete inputs.
pub const READ_DISCRETE_INPUTS: u8 = 0x02;
/// Read holding registers.
pub const READ_HOLDING_REGISTERS: u8 = 0x03;
/// Read input registers.
pub const READ_INPUT_REGISTERS: u8 = 0x04;
/// Write single coil.
pub const WRITE_SINGLE_COIL: u8 = 0x05;
/// Write single register.
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
/// Write multiple coils.
pub const WRITE_MULTIPLE_COILS: u8 = 0x0F;
/// Write multiple registers.
pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
/// Mask write register.
pub const MASK_WRITE_REGISTER: u8 = 0x16;
/// Read/write multiple registers.
pub const READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;
/// Read FIFO queue.
pub const READ_FIFO_QUEUE: u8 = 0x18;

/// Bit set in the function code of an exception reply.
pub const EXCEPTION_BIT: u8 = 0x80;

/// Returns the function code an exception reply to `function` carries.
#[inline]
pub const fn exception_code(function: u8) -> u8 {
    function | EXCEPTION_BIT
}

/// Predicts the total length of a normal (non-exception) reply.
pub trait ResponseLength: Send + Sync {
    /// Returns the expected byte length of the reply to `request`,
    /// CRC included.
    fn response_length(&self, request: &[u8]) -> usize;
}

/// Length table of the standard RTU function codes.
///
/// Functions whose reply length cannot be derived from the request (read
/// FIFO queue, unknown codes) predict [`RTU_MIN_SIZE`], which makes the
/// transport return whatever the first read delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct RtuFrameLength;

impl ResponseLength for RtuFrameLength {
    fn response_length(&self, request: &[u8]) -> usize {
        let Some(&function) = request.get(1) else {
            return RTU_MIN_SIZE;
        };
        let quantity = request
            .get(4..6)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize);

        match function {
            READ_COILS | READ_DISCRETE_INPUTS => {
                quantity.map_or(RTU_MIN_SIZE, |q| RTU_MIN_SIZE + 1 + q.div_ceil(8))
            }
            READ_HOLDING_REGISTERS | READ_INPUT_REGISTERS | READ_WRITE_MULTIPLE_REGISTERS => {
                quantity.map_or(RTU_MIN_SIZE, |q| RTU_MIN_SIZE + 1 + q * 2)
            }
            WRITE_SINGLE_COIL
            | WRITE_SINGLE_REGISTER
            | WRITE_MULTIPLE_COILS
            | WRITE_MULTIPLE_REGISTERS => RTU_MIN_SIZE + 4,
            MASK_WRITE_REGISTER => RTU_MIN_SIZE + 6,
            _ => RTU_MIN_SIZE,
        }
    }
}

/// Builds an ADU from a slave id and a PDU, appending the CRC.
pub fn encode_adu(slave_id: u8, pdu: &[u8]) -> Vec<u8> {
    let mut adu = Vec::with_capacity(pdu.len() + 3);
    adu.push(slave_id);
    adu.extend_from_slice(pdu);
    let crc = Crc16::compute(&adu);
    adu.extend_from_slice(&crc.to_le_bytes());
    adu
}

fn encode_address_quantity(slave_id: u8, function: u8, address: u16, quantity: u16) -> Vec<u8> {
    let [a_hi, a_lo] = address.to_be_bytes();
    let [q_hi, q_lo] = quantity.to_be_bytes();
    encode_adu(slave_id, &[function, a_hi, a_lo, q_hi, q_lo])
}

/// Read coils request.
pub fn read_coils(slave_id: u8, address: u16, quantity: u16) -> Vec<u8> {
    encode_address_quantity(slave_id, READ_COILS, address, quantity)
}

/// Read discrete inputs request.
pub fn read_discrete_inputs(slave_id: u8, address: u16, quantity: u16) -> Vec<u8> {
    encode_address_quantity(slave_id, READ_DISCRETE_INPUTS, address, quantity)
}

/// Read holding registers request.
pub fn read_holding_registers(slave_id: u8, address: u16, quantity: u16) -> Vec<u8> {
    encode_address_quantity(slave_id, READ_HOLDING_REGISTERS, address, quantity)
}

/// Read input registers request.
pub fn read_input_registers(slave_id: u8, address: u16, quantity: u16) -> Vec<u8> {
    encode_address_quantity(slave_id, READ_INPUT_REGISTERS, address, quantity)
}

/// Write single coil request. `on` maps to 0xFF00, off to 0x0000.
pub fn write_single_coil(slave_id: u8, address: u16, on: bool) -> Vec<u8> {
    let value = if on { 0xFF00 } else { 0x0000 };
    encode_address_quantity(slave_id, WRITE_SINGLE_COIL, address, value)
}

/// Write single register request.
pub fn write_single_register(slave_id: u8, address: u16, value: u16) -> Vec<u8> {
    encode_address_quantity(slave_id, WRITE_SINGLE_REGISTER, address, value)
}

/// Write multiple coils request. `packed` holds the coil states, least
/// significant bit first.
pub fn write_multiple_coils(slave_id: u8, address: u16, quantity: u16, packed: &[u8]) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(6 + packed.len());
    pdu.push(WRITE_MULTIPLE_COILS);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&quantity.to_be_bytes());
    pdu.push(packed.len() as u8);
    pdu.extend_from_slice(packed);
    encode_adu(slave_id, &pdu)
}

/// Write multiple registers request.
pub fn write_multiple_registers(slave_id: u8, address: u16, values: &[u16]) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(6 + values.len() * 2);
    pdu.push(WRITE_MULTIPLE_REGISTERS);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&(values.len() as u16).to_be_bytes());
    pdu.push((values.len() * 2) as u8);
    for value in values {
        pdu.extend_from_slice(&value.to_be_bytes());
    }
    encode_adu(slave_id, &pdu)
}

/// Mask write register request.
pub fn mask_write_register(slave_id: u8, address: u16, and_mask: u16, or_mask: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(7);
    pdu.push(MASK_WRITE_REGISTER);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&and_mask.to_be_bytes());
    pdu.extend_from_slice(&or_mask.to_be_bytes());
    encode_adu(slave_id, &pdu)
}

/// Read/write multiple registers request. The write is applied before the read.
pub fn read_write_multiple_registers(
    slave_id: u8,
    read_address: u16,
    read_quantity: u16,
    write_address: u16,
    values: &[u16],
) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(10 + values.len() * 2);
    pdu.push(READ_WRITE_MULTIPLE_REGISTERS);
    pdu.extend_from_slice(&read_address.to_be_bytes());
    pdu.extend_from_slice(&read_quantity.to_be_bytes());
    pdu.extend_from_slice(&write_address.to_be_bytes());
    pdu.extend_from_slice(&(values.len() as u16).to_be_bytes());
    pdu.push((values.len() * 2) as u8);
    for value in values {
        pdu.extend_from_slice(&value.to_be_bytes());
    }
    encode_adu(slave_id, &pdu)
}
