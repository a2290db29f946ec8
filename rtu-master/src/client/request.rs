use scursor::{ReadCursor, WriteCursor};

use crate::common::function::FunctionCode;
use crate::common::pdu::{Pdu, MAX_PDU_LENGTH};
use crate::constants::limits;
use crate::error::{AduParseError, InvalidRequest, RequestError};
use crate::serial::frame::build_adu;
use crate::types::{
    coil_from_u16, coil_to_u16, AddressRange, DataUnit, RegisterType, ServerAddress,
};

/// Decoding context kept alongside an outstanding request
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Expected {
    /// Response is decoded against this unit, see [`decode_response`]
    Unit(DataUnit),
    /// Response PDU is returned as-is
    Raw,
}

/// A validated request, ready to be queued
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) server: ServerAddress,
    pub(crate) pdu: Pdu,
    pub(crate) adu: Vec<u8>,
    pub(crate) expected: Expected,
}

impl Request {
    fn new(server: ServerAddress, pdu: Pdu, expected: Expected) -> Result<Self, RequestError> {
        let adu = build_adu(server, &pdu)?;
        Ok(Self {
            server,
            pdu,
            adu,
            expected,
        })
    }

    pub(crate) fn read(server: ServerAddress, unit: DataUnit) -> Result<Self, RequestError> {
        let pdu = build_read_request(&unit)?;
        Self::new(server, pdu, Expected::Unit(unit))
    }

    pub(crate) fn write(server: ServerAddress, unit: DataUnit) -> Result<Self, RequestError> {
        let pdu = build_write_request(&unit)?;
        Self::new(server, pdu, Expected::Unit(unit))
    }

    pub(crate) fn read_write(
        server: ServerAddress,
        read: DataUnit,
        write: DataUnit,
    ) -> Result<Self, RequestError> {
        let pdu = build_read_write_request(&read, &write)?;
        Self::new(server, pdu, Expected::Unit(read))
    }

    pub(crate) fn raw(server: ServerAddress, pdu: Pdu) -> Result<Self, RequestError> {
        validate_raw_request(&pdu)?;
        Self::new(server, pdu, Expected::Raw)
    }
}

/// Build the PDU that reads the values described by `unit`
///
/// Only the type, start address and value count of the unit are used.
pub fn build_read_request(unit: &DataUnit) -> Result<Pdu, InvalidRequest> {
    let (function, limit) = match unit.register_type() {
        RegisterType::Coils => (FunctionCode::ReadCoils, limits::MAX_READ_COILS_COUNT),
        RegisterType::DiscreteInputs => (
            FunctionCode::ReadDiscreteInputs,
            limits::MAX_READ_COILS_COUNT,
        ),
        RegisterType::HoldingRegisters => (
            FunctionCode::ReadHoldingRegisters,
            limits::MAX_READ_REGISTERS_COUNT,
        ),
        RegisterType::InputRegisters => (
            FunctionCode::ReadInputRegisters,
            limits::MAX_READ_REGISTERS_COUNT,
        ),
    };

    let range = unit.range()?.limited_count(limit)?;

    build(function, |cursor| write_range(cursor, range))
}

/// Build the PDU that writes the values of `unit`
///
/// A single value uses the `write single` function codes, anything
/// longer the `write multiple` ones. Only coils and holding registers
/// can be written.
pub fn build_write_request(unit: &DataUnit) -> Result<Pdu, InvalidRequest> {
    let range = unit.range()?;

    match unit.register_type() {
        RegisterType::Coils if range.count == 1 => {
            build(FunctionCode::WriteSingleCoil, |cursor| {
                cursor.write_u16_be(range.start)?;
                cursor.write_u16_be(coil_to_u16(unit.value(0).unwrap_or_default() != 0))
            })
        }
        RegisterType::HoldingRegisters if range.count == 1 => {
            build(FunctionCode::WriteSingleRegister, |cursor| {
                cursor.write_u16_be(range.start)?;
                cursor.write_u16_be(unit.value(0).unwrap_or_default())
            })
        }
        RegisterType::Coils => {
            let range = range.limited_count(limits::MAX_WRITE_COILS_COUNT)?;
            let packed = pack_bits(unit.bits());
            build(FunctionCode::WriteMultipleCoils, |cursor| {
                write_range(cursor, range)?;
                cursor.write_u8(packed.len() as u8)?;
                cursor.write_bytes(&packed)
            })
        }
        RegisterType::HoldingRegisters => {
            let range = range.limited_count(limits::MAX_WRITE_REGISTERS_COUNT)?;
            build(FunctionCode::WriteMultipleRegisters, |cursor| {
                write_range(cursor, range)?;
                write_registers(cursor, unit.values())
            })
        }
        other => Err(InvalidRequest::UnsupportedWriteTarget(other)),
    }
}

/// Build a `read/write multiple registers` PDU
///
/// Both units must refer to holding registers. The write is performed by
/// the server before the read.
pub fn build_read_write_request(read: &DataUnit, write: &DataUnit) -> Result<Pdu, InvalidRequest> {
    if read.register_type() != RegisterType::HoldingRegisters
        || write.register_type() != RegisterType::HoldingRegisters
    {
        return Err(InvalidRequest::ReadWriteNotHoldingRegisters);
    }

    let reads = read
        .range()?
        .limited_count(limits::MAX_READ_REGISTERS_COUNT)?;
    let writes = write
        .range()?
        .limited_count(limits::MAX_READ_WRITE_REGISTERS_WRITE_COUNT)?;

    build(FunctionCode::ReadWriteMultipleRegisters, |cursor| {
        write_range(cursor, reads)?;
        write_range(cursor, writes)?;
        write_registers(cursor, write.values())
    })
}

/// Check that a user supplied PDU can be sent as a request
pub fn validate_raw_request(pdu: &Pdu) -> Result<(), InvalidRequest> {
    pdu.validate_request()
}

/// Decode a response PDU against the unit that described the request
///
/// For reads, `request` carries the type, start address and count that were
/// requested. For writes it carries the values that were written so that the
/// echo can be verified. For `read/write multiple registers` it is the read unit.
///
/// Exception responses are returned as [`RequestError::Exception`] without
/// further decoding, anything else that does not fit the request is a
/// [`RequestError::BadResponse`].
pub fn decode_response(response: &Pdu, request: &DataUnit) -> Result<DataUnit, RequestError> {
    if let Some(code) = response.exception_code() {
        return Err(RequestError::Exception(code));
    }
    if response.is_exception() {
        return Err(AduParseError::InsufficientBytes.into());
    }

    let function = FunctionCode::get(response.raw_function())
        .ok_or(AduParseError::UnexpectedFunction(response.raw_function()))?;

    let mut cursor = ReadCursor::new(response.data());

    let unit = match function {
        FunctionCode::ReadCoils => decode_bits(&mut cursor, RegisterType::Coils, request)?,
        FunctionCode::ReadDiscreteInputs => {
            decode_bits(&mut cursor, RegisterType::DiscreteInputs, request)?
        }
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadWriteMultipleRegisters => {
            decode_registers(&mut cursor, RegisterType::HoldingRegisters, request)?
        }
        FunctionCode::ReadInputRegisters => {
            decode_registers(&mut cursor, RegisterType::InputRegisters, request)?
        }
        FunctionCode::WriteSingleCoil => decode_single_coil(&mut cursor, request)?,
        FunctionCode::WriteSingleRegister => decode_single_register(&mut cursor, request)?,
        FunctionCode::WriteMultipleCoils => decode_multiple_write(
            &mut cursor,
            RegisterType::Coils,
            limits::MAX_WRITE_COILS_COUNT,
            request,
        )?,
        FunctionCode::WriteMultipleRegisters => decode_multiple_write(
            &mut cursor,
            RegisterType::HoldingRegisters,
            limits::MAX_WRITE_REGISTERS_COUNT,
            request,
        )?,
        other => return Err(AduParseError::UnexpectedFunction(other.get_value()).into()),
    };

    if !cursor.is_empty() {
        return Err(AduParseError::TrailingBytes(cursor.remaining()).into());
    }

    Ok(unit)
}

/// Pack bits LSB-first, zero padding the last byte
pub(crate) fn pack_bits(bits: impl Iterator<Item = bool>) -> Vec<u8> {
    let mut bytes: Vec<u8> = Vec::new();
    for (i, bit) in bits.enumerate() {
        if i % 8 == 0 {
            bytes.push(0);
        }
        if bit {
            if let Some(last) = bytes.last_mut() {
                *last |= 1 << (i % 8);
            }
        }
    }
    bytes
}

/// Unpack `count` bits LSB-first, ignoring any padding
pub(crate) fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
        .take(count)
        .collect()
}

fn build<F>(function: FunctionCode, write: F) -> Result<Pdu, InvalidRequest>
where
    F: FnOnce(&mut WriteCursor) -> Result<(), scursor::WriteError>,
{
    let mut buffer = [0u8; MAX_PDU_LENGTH - 1];
    let length = {
        let mut cursor = WriteCursor::new(buffer.as_mut());
        write(&mut cursor).map_err(|_| InvalidRequest::PduTooBig(MAX_PDU_LENGTH + 1))?;
        cursor.position()
    };

    let data = buffer
        .get(..length)
        .ok_or(InvalidRequest::PduTooBig(length + 1))?;
    Ok(Pdu::new(function, data.to_vec()))
}

fn write_range(cursor: &mut WriteCursor, range: AddressRange) -> Result<(), scursor::WriteError> {
    cursor.write_u16_be(range.start)?;
    cursor.write_u16_be(range.count)
}

fn write_registers(cursor: &mut WriteCursor, values: &[u16]) -> Result<(), scursor::WriteError> {
    cursor.write_u8((values.len() * 2) as u8)?;
    for value in values {
        cursor.write_u16_be(*value)?;
    }
    Ok(())
}

fn read_byte_count(cursor: &mut ReadCursor) -> Result<usize, AduParseError> {
    let byte_count = cursor.read_u8().map_err(|_| AduParseError::InsufficientBytes)? as usize;
    if byte_count != cursor.remaining() {
        return Err(AduParseError::InsufficientBytesForByteCount(
            byte_count,
            cursor.remaining(),
        ));
    }
    Ok(byte_count)
}

fn decode_bits(
    cursor: &mut ReadCursor,
    register_type: RegisterType,
    request: &DataUnit,
) -> Result<DataUnit, AduParseError> {
    let byte_count = read_byte_count(cursor)?;
    let count = request.value_count();
    let expected = count.div_ceil(8);
    if byte_count < expected {
        return Err(AduParseError::RequestByteCountMismatch(expected, byte_count));
    }

    let bytes = cursor
        .read_bytes(byte_count)
        .map_err(|_| AduParseError::InsufficientBytes)?;

    let values = unpack_bits(bytes, count)
        .into_iter()
        .map(u16::from)
        .collect();

    Ok(DataUnit::with_values(
        register_type,
        request.start_address(),
        values,
    ))
}

fn decode_registers(
    cursor: &mut ReadCursor,
    register_type: RegisterType,
    request: &DataUnit,
) -> Result<DataUnit, AduParseError> {
    let byte_count = read_byte_count(cursor)?;
    let expected = 2 * request.value_count();
    if byte_count != expected {
        return Err(AduParseError::RequestByteCountMismatch(expected, byte_count));
    }

    let mut values = Vec::with_capacity(request.value_count());
    for _ in 0..request.value_count() {
        values.push(
            cursor
                .read_u16_be()
                .map_err(|_| AduParseError::InsufficientBytes)?,
        );
    }

    Ok(DataUnit::with_values(
        register_type,
        request.start_address(),
        values,
    ))
}

fn read_pair(cursor: &mut ReadCursor) -> Result<(u16, u16), AduParseError> {
    let first = cursor
        .read_u16_be()
        .map_err(|_| AduParseError::InsufficientBytes)?;
    let second = cursor
        .read_u16_be()
        .map_err(|_| AduParseError::InsufficientBytes)?;
    Ok((first, second))
}

fn decode_single_coil(
    cursor: &mut ReadCursor,
    request: &DataUnit,
) -> Result<DataUnit, AduParseError> {
    let (address, raw) = read_pair(cursor)?;
    let value = coil_from_u16(raw).ok_or(AduParseError::UnknownCoilState(raw))?;

    let expected = request.value(0).map(|x| x != 0);
    if address != request.start_address() || expected != Some(value) {
        return Err(AduParseError::ReplyEchoMismatch);
    }

    Ok(DataUnit::coils(address, &[value]))
}

fn decode_single_register(
    cursor: &mut ReadCursor,
    request: &DataUnit,
) -> Result<DataUnit, AduParseError> {
    let (address, value) = read_pair(cursor)?;

    if address != request.start_address() || request.value(0) != Some(value) {
        return Err(AduParseError::ReplyEchoMismatch);
    }

    Ok(DataUnit::holding_registers(address, &[value]))
}

fn decode_multiple_write(
    cursor: &mut ReadCursor,
    register_type: RegisterType,
    limit: u16,
    request: &DataUnit,
) -> Result<DataUnit, AduParseError> {
    let (address, count) = read_pair(cursor)?;

    if count == 0 || count > limit {
        return Err(AduParseError::CountOutOfRange(count));
    }

    if address != request.start_address() || count as usize != request.value_count() {
        return Err(AduParseError::ReplyEchoMismatch);
    }

    // multi-write acknowledgements do not carry the written values
    Ok(DataUnit::new(register_type, address, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidRange;
    use crate::exception::ExceptionCode;

    #[test]
    fn read_holding_registers_request() {
        let unit = DataUnit::new(RegisterType::HoldingRegisters, 0, 2);
        let pdu = build_read_request(&unit).unwrap();
        assert_eq!(pdu.raw_function(), 0x03);
        assert_eq!(pdu.data(), &[0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn read_request_function_follows_register_type() {
        let cases = [
            (RegisterType::Coils, 0x01),
            (RegisterType::DiscreteInputs, 0x02),
            (RegisterType::HoldingRegisters, 0x03),
            (RegisterType::InputRegisters, 0x04),
        ];
        for (register_type, function) in cases {
            let pdu = build_read_request(&DataUnit::new(register_type, 7, 1)).unwrap();
            assert_eq!(pdu.raw_function(), function);
        }
    }

    #[test]
    fn read_request_rejects_invalid_units() {
        assert_eq!(
            build_read_request(&DataUnit::new(RegisterType::Coils, 0, 0)),
            Err(InvalidRequest::BadRange(InvalidRange::CountOfZero))
        );
        assert_eq!(
            build_read_request(&DataUnit::new(RegisterType::InputRegisters, 0, 126)),
            Err(InvalidRequest::BadRange(InvalidRange::CountTooLargeForType(
                126, 125
            )))
        );
        assert!(build_read_request(&DataUnit::new(RegisterType::Coils, 0, 2000)).is_ok());
    }

    #[test]
    fn write_single_coil_request() {
        let pdu = build_write_request(&DataUnit::coils(5, &[true])).unwrap();
        assert_eq!(pdu.raw_function(), 0x05);
        assert_eq!(pdu.data(), &[0x00, 0x05, 0xFF, 0x00]);

        let pdu = build_write_request(&DataUnit::coils(5, &[false])).unwrap();
        assert_eq!(pdu.data(), &[0x00, 0x05, 0x00, 0x00]);
    }

    #[test]
    fn write_single_register_request() {
        let pdu = build_write_request(&DataUnit::holding_registers(0x10, &[0x1234])).unwrap();
        assert_eq!(pdu.raw_function(), 0x06);
        assert_eq!(pdu.data(), &[0x00, 0x10, 0x12, 0x34]);
    }

    #[test]
    fn write_multiple_coils_request() {
        let values = [
            true, false, true, true, false, false, true, true, true, false,
        ];
        let pdu = build_write_request(&DataUnit::coils(0x13, &values)).unwrap();
        assert_eq!(pdu.raw_function(), 0x0F);
        assert_eq!(pdu.data(), &[0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]);
    }

    #[test]
    fn write_multiple_registers_request() {
        let pdu =
            build_write_request(&DataUnit::holding_registers(0x01, &[0x000A, 0x0102])).unwrap();
        assert_eq!(pdu.raw_function(), 0x10);
        assert_eq!(
            pdu.data(),
            &[0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
    }

    #[test]
    fn read_only_tables_cannot_be_written() {
        assert_eq!(
            build_write_request(&DataUnit::new(RegisterType::DiscreteInputs, 0, 1)),
            Err(InvalidRequest::UnsupportedWriteTarget(
                RegisterType::DiscreteInputs
            ))
        );
        assert_eq!(
            build_write_request(&DataUnit::new(RegisterType::InputRegisters, 0, 3)),
            Err(InvalidRequest::UnsupportedWriteTarget(
                RegisterType::InputRegisters
            ))
        );
    }

    #[test]
    fn write_multiple_enforces_limits() {
        assert_eq!(
            build_write_request(&DataUnit::new(RegisterType::HoldingRegisters, 0, 124)),
            Err(InvalidRequest::BadRange(InvalidRange::CountTooLargeForType(
                124, 123
            )))
        );
        assert!(build_write_request(&DataUnit::new(RegisterType::Coils, 0, 1968)).is_ok());
        assert!(build_write_request(&DataUnit::new(RegisterType::Coils, 0, 1969)).is_err());
    }

    #[test]
    fn read_write_request() {
        let read = DataUnit::new(RegisterType::HoldingRegisters, 3, 6);
        let write = DataUnit::holding_registers(14, &[0x00FF, 0x00FF, 0x00FF]);
        let pdu = build_read_write_request(&read, &write).unwrap();
        assert_eq!(pdu.raw_function(), 0x17);
        assert_eq!(
            pdu.data(),
            &[
                0x00, 0x03, 0x00, 0x06, 0x00, 0x0E, 0x00, 0x03, 0x06, 0x00, 0xFF, 0x00, 0xFF, 0x00,
                0xFF
            ]
        );
    }

    #[test]
    fn read_write_requires_holding_registers() {
        let read = DataUnit::new(RegisterType::InputRegisters, 0, 1);
        let write = DataUnit::holding_registers(0, &[1]);
        assert_eq!(
            build_read_write_request(&read, &write),
            Err(InvalidRequest::ReadWriteNotHoldingRegisters)
        );
        let read = DataUnit::new(RegisterType::HoldingRegisters, 0, 1);
        let write = DataUnit::new(RegisterType::HoldingRegisters, 0, 122);
        assert!(build_read_write_request(&read, &write).is_err());
    }

    #[test]
    fn raw_requests_are_validated() {
        assert!(validate_raw_request(&Pdu::from_raw(0x41, vec![1, 2, 3])).is_ok());
        assert_eq!(
            validate_raw_request(&Pdu::from_raw(0x00, vec![])),
            Err(InvalidRequest::BadFunctionCode(0x00))
        );
    }

    #[test]
    fn decodes_holding_registers() {
        let request = DataUnit::new(RegisterType::HoldingRegisters, 0, 2);
        let response = Pdu::from_raw(0x03, vec![0x04, 0x00, 0x0A, 0x00, 0x14]);
        let unit = decode_response(&response, &request).unwrap();
        assert_eq!(unit, DataUnit::holding_registers(0, &[10, 20]));
    }

    #[test]
    fn decodes_input_registers() {
        let request = DataUnit::new(RegisterType::InputRegisters, 9, 1);
        let response = Pdu::from_raw(0x04, vec![0x02, 0xCA, 0xFE]);
        let unit = decode_response(&response, &request).unwrap();
        assert_eq!(unit.register_type(), RegisterType::InputRegisters);
        assert_eq!(unit.start_address(), 9);
        assert_eq!(unit.values(), &[0xCAFE]);
    }

    #[test]
    fn register_byte_count_must_match_request() {
        let request = DataUnit::new(RegisterType::HoldingRegisters, 0, 2);
        let response = Pdu::from_raw(0x03, vec![0x02, 0x00, 0x0A]);
        assert_eq!(
            decode_response(&response, &request),
            Err(AduParseError::RequestByteCountMismatch(4, 2).into())
        );
        let response = Pdu::from_raw(0x03, vec![0x04, 0x00, 0x0A]);
        assert_eq!(
            decode_response(&response, &request),
            Err(AduParseError::InsufficientBytesForByteCount(4, 2).into())
        );
    }

    #[test]
    fn decodes_coils_and_ignores_padding() {
        let request = DataUnit::new(RegisterType::Coils, 0x13, 10);
        let response = Pdu::from_raw(0x01, vec![0x02, 0xCD, 0xFD]);
        let unit = decode_response(&response, &request).unwrap();
        assert_eq!(
            unit.bits().collect::<Vec<_>>(),
            vec![true, false, true, true, false, false, true, true, true, false]
        );
        assert_eq!(unit.start_address(), 0x13);
    }

    #[test]
    fn coil_byte_count_must_cover_the_request() {
        let request = DataUnit::new(RegisterType::DiscreteInputs, 0, 9);
        let response = Pdu::from_raw(0x02, vec![0x01, 0xFF]);
        assert_eq!(
            decode_response(&response, &request),
            Err(AduParseError::RequestByteCountMismatch(2, 1).into())
        );
    }

    #[test]
    fn coil_pack_unpack_preserves_values() {
        for count in [1usize, 7, 8, 9, 17] {
            let bits: Vec<bool> = (0..count).map(|i| i % 3 == 0).collect();
            let packed = pack_bits(bits.iter().copied());
            assert_eq!(packed.len(), count.div_ceil(8));
            assert_eq!(unpack_bits(&packed, count), bits);
        }
    }

    #[test]
    fn write_single_coil_echo_is_success() {
        let request = DataUnit::coils(5, &[true]);
        let pdu = build_write_request(&request).unwrap();
        assert_eq!(pdu.data(), &[0x00, 0x05, 0xFF, 0x00]);
        let unit = decode_response(&pdu, &request).unwrap();
        assert_eq!(unit, request);
    }

    #[test]
    fn write_single_register_echo_round_trips() {
        let request = DataUnit::holding_registers(0x0101, &[0xBEEF]);
        let pdu = build_write_request(&request).unwrap();
        assert_eq!(decode_response(&pdu, &request).unwrap(), request);
    }

    #[test]
    fn single_write_echo_must_match() {
        let request = DataUnit::coils(5, &[true]);
        let bad_value = Pdu::from_raw(0x05, vec![0x00, 0x05, 0x12, 0x34]);
        assert_eq!(
            decode_response(&bad_value, &request),
            Err(AduParseError::UnknownCoilState(0x1234).into())
        );
        let wrong_address = Pdu::from_raw(0x05, vec![0x00, 0x06, 0xFF, 0x00]);
        assert_eq!(
            decode_response(&wrong_address, &request),
            Err(AduParseError::ReplyEchoMismatch.into())
        );
    }

    #[test]
    fn multiple_write_ack_populates_type_address_and_count() {
        let request = DataUnit::holding_registers(1, &[10, 20, 30]);
        let response = Pdu::from_raw(0x10, vec![0x00, 0x01, 0x00, 0x03]);
        let unit = decode_response(&response, &request).unwrap();
        assert_eq!(unit, DataUnit::new(RegisterType::HoldingRegisters, 1, 3));
    }

    #[test]
    fn multiple_write_count_is_range_checked() {
        let request = DataUnit::holding_registers(1, &[10]);
        let response = Pdu::from_raw(0x10, vec![0x00, 0x01, 0x00, 0x7C]);
        assert_eq!(
            decode_response(&response, &request),
            Err(AduParseError::CountOutOfRange(124).into())
        );
        let response = Pdu::from_raw(0x10, vec![0x00, 0x01, 0x00, 0x00]);
        assert_eq!(
            decode_response(&response, &request),
            Err(AduParseError::CountOutOfRange(0).into())
        );
    }

    #[test]
    fn exception_response_is_surfaced() {
        let request = DataUnit::new(RegisterType::Coils, 0, 8);
        let response = Pdu::from_raw(0x81, vec![0x02]);
        assert_eq!(
            decode_response(&response, &request),
            Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let request = DataUnit::holding_registers(0x10, &[0x1234]);
        let response = Pdu::from_raw(0x06, vec![0x00, 0x10, 0x12, 0x34, 0x00]);
        assert_eq!(
            decode_response(&response, &request),
            Err(AduParseError::TrailingBytes(1).into())
        );
    }

    #[test]
    fn short_response_is_invalid() {
        let request = DataUnit::holding_registers(0x10, &[0x1234]);
        let response = Pdu::from_raw(0x06, vec![0x00, 0x10, 0x12]);
        assert_eq!(
            decode_response(&response, &request),
            Err(AduParseError::InsufficientBytes.into())
        );
    }
}
