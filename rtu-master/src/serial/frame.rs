use crate::common::pdu::{response_data_size, DataSize, Pdu};
use crate::decode::FrameDecodeLevel;
use crate::error::InternalError;
use crate::types::ServerAddress;

use scursor::WriteCursor;

pub(crate) mod constants {
    pub(crate) const HEADER_LENGTH: usize = 1;
    pub(crate) const FUNCTION_CODE_LENGTH: usize = 1;
    pub(crate) const CRC_LENGTH: usize = 2;
    /// Address + maximum PDU + CRC
    pub(crate) const MAX_FRAME_LENGTH: usize =
        HEADER_LENGTH + crate::common::pdu::MAX_PDU_LENGTH + CRC_LENGTH;
}

/// precomputes the CRC table as a constant!
const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// Compute the Modbus CRC16 (polynomial 0xA001 reflected, seed 0xFFFF) of some bytes
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC.checksum(bytes)
}

/// A complete, checksum-valid RTU application data unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Adu {
    /// Address of the server that sent (or is targeted by) the frame
    pub server: ServerAddress,
    /// Function code and data
    pub pdu: Pdu,
}

/// Serialize a PDU into a complete RTU frame: `[address][pdu][crc lo][crc hi]`
pub fn build_adu(server: ServerAddress, pdu: &Pdu) -> Result<Vec<u8>, InternalError> {
    let mut buffer = [0u8; constants::MAX_FRAME_LENGTH - constants::CRC_LENGTH];
    let length = {
        let mut cursor = WriteCursor::new(buffer.as_mut());
        let mut write = || -> Result<usize, scursor::WriteError> {
            cursor.write_u8(server.value)?;
            cursor.write_u8(pdu.raw_function())?;
            cursor.write_bytes(pdu.data())?;
            Ok(cursor.position())
        };
        write().map_err(|_| {
            InternalError::FrameTooBig(constants::HEADER_LENGTH + pdu.len() + constants::CRC_LENGTH)
        })?
    };

    let body = buffer
        .get(..length)
        .ok_or(InternalError::InsufficientWriteSpace)?;
    let mut frame = Vec::with_capacity(length + constants::CRC_LENGTH);
    frame.extend_from_slice(body);
    frame.extend_from_slice(&crc16(body).to_le_bytes());
    Ok(frame)
}

/// Try to extract one response frame from the front of `buffer`
///
/// Returns the number of bytes to drop from the front of the buffer and
/// the frame, if a complete one was found. A frame that fails the CRC
/// check is consumed without being returned so that the next call can
/// resynchronize on the bytes that follow it. When the function code has
/// no known size rule, nothing is consumed.
///
/// Diagnostics "return query data" responses have no declared length and
/// can only be framed against the outstanding request, see [`try_parse_response`].
pub fn try_parse_adu(buffer: &[u8]) -> (usize, Option<Adu>) {
    parse(buffer, None)
}

/// Same as [`try_parse_adu`], using the outstanding request to frame
/// responses that echo the request data
pub fn try_parse_response(buffer: &[u8], request: &Pdu) -> (usize, Option<Adu>) {
    parse(buffer, Some(request))
}

fn parse(buffer: &[u8], request: Option<&Pdu>) -> (usize, Option<Adu>) {
    let (address, function) = match buffer {
        [address, function, ..] => (*address, *function),
        _ => return (0, None),
    };

    let data = buffer
        .get(constants::HEADER_LENGTH + constants::FUNCTION_CODE_LENGTH..)
        .unwrap_or_default();

    let data_length = match response_data_size(function, data) {
        DataSize::Known(x) => x,
        DataSize::EchoOfRequest => match request {
            Some(request) => request.data().len(),
            None => return (0, None),
        },
        DataSize::NeedMore => return (0, None),
        DataSize::Unknown => {
            tracing::trace!("unable to determine the length of function code {function:#04X}");
            return (0, None);
        }
    };

    let required_length = constants::HEADER_LENGTH
        + constants::FUNCTION_CODE_LENGTH
        + data_length
        + constants::CRC_LENGTH;

    let frame = match buffer.get(..required_length) {
        Some(x) => x,
        None => return (0, None),
    };

    let (body, crc) = frame.split_at(required_length - constants::CRC_LENGTH);
    let received_crc = u16::from_le_bytes([crc[0], crc[1]]);
    let expected_crc = crc16(body);

    if received_crc != expected_crc {
        tracing::warn!(
            "discarding {required_length} bytes, received CRC {received_crc:#06X} but expected {expected_crc:#06X}"
        );
        return (required_length, None);
    }

    let server = ServerAddress::new(address);
    if server.is_rtu_reserved() {
        tracing::warn!("received reserved server address {server}, passing it through nevertheless");
    }

    let pdu_data = body
        .get(constants::HEADER_LENGTH + constants::FUNCTION_CODE_LENGTH..)
        .unwrap_or_default()
        .to_vec();

    (
        required_length,
        Some(Adu {
            server,
            pdu: Pdu::from_raw(function, pdu_data),
        }),
    )
}

pub(crate) struct RtuDisplay<'a> {
    level: FrameDecodeLevel,
    frame: &'a [u8],
}

impl<'a> RtuDisplay<'a> {
    pub(crate) fn new(level: FrameDecodeLevel, frame: &'a [u8]) -> Self {
        RtuDisplay { level, frame }
    }
}

impl std::fmt::Display for RtuDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (body, crc) = if self.frame.len() >= constants::HEADER_LENGTH + constants::CRC_LENGTH
        {
            self.frame.split_at(self.frame.len() - constants::CRC_LENGTH)
        } else {
            (self.frame, &[][..])
        };
        let (address, payload) = body.split_at(constants::HEADER_LENGTH.min(body.len()));

        match address.first() {
            Some(x) => write!(f, "server: {}", ServerAddress::new(*x))?,
            None => f.write_str("server: none")?,
        }
        if let [lo, hi] = crc {
            write!(f, " crc: {:#06X}", u16::from_le_bytes([*lo, *hi]))?;
        }
        write!(f, " (payload len = {})", payload.len())?;
        if self.level.payload_enabled() {
            crate::common::phys::format_bytes(f, payload)?;
        }
        Ok(())
    }
}
