use crate::common::function::{FunctionCode, EXCEPTION_BIT};
use crate::decode::AppDecodeLevel;
use crate::error::InvalidRequest;
use crate::exception::ExceptionCode;
use crate::types::DataUnit;

/// Maximum size of a PDU (function code + data) on a serial line
pub const MAX_PDU_LENGTH: usize = 253;

/// Protocol data unit: function code and function specific data
///
/// Immutable once built; this is what gets framed into an RTU ADU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pdu {
    function: u8,
    data: Vec<u8>,
}

impl Pdu {
    /// Create a PDU for a known function code
    pub fn new(function: FunctionCode, data: Vec<u8>) -> Self {
        Self {
            function: function.get_value(),
            data,
        }
    }

    /// Create a PDU from a raw function code, which may be user defined
    pub fn from_raw(function: u8, data: Vec<u8>) -> Self {
        Self { function, data }
    }

    /// Raw function code, including the exception bit if set
    pub fn raw_function(&self) -> u8 {
        self.function
    }

    /// Function code with the exception bit removed, if it is a public one
    pub fn function(&self) -> Option<FunctionCode> {
        FunctionCode::get(self.function)
    }

    /// Data following the function code
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the function code and the data
    pub fn len(&self) -> usize {
        1 + self.data.len()
    }

    /// A PDU always contains at least the function code
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if the exception bit of the function code is set
    pub fn is_exception(&self) -> bool {
        self.function & EXCEPTION_BIT != 0
    }

    /// Exception code of an exception response
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        if !self.is_exception() {
            return None;
        }
        self.data.first().map(|x| ExceptionCode::from(*x))
    }

    pub(crate) fn validate_request(&self) -> Result<(), InvalidRequest> {
        if self.function == 0 || self.is_exception() {
            return Err(InvalidRequest::BadFunctionCode(self.function));
        }
        if self.len() > MAX_PDU_LENGTH {
            return Err(InvalidRequest::PduTooBig(self.len()));
        }
        Ok(())
    }

    /// Matching rule for responses: the function code equals the request's,
    /// exception responses carry it with the exception bit set
    pub(crate) fn answers(&self, request: &Pdu) -> bool {
        self.function & !EXCEPTION_BIT == request.function
    }
}

impl std::fmt::Display for Pdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.function() {
            Some(fc) if self.is_exception() => write!(f, "{fc} exception")?,
            Some(fc) => write!(f, "{fc}")?,
            None => write!(f, "FUNCTION ({:#04X})", self.function)?,
        }
        write!(f, " data len = {}", self.data.len())
    }
}

/// Application layer log line for a request or response
pub(crate) struct PduDisplay<'a> {
    level: AppDecodeLevel,
    pdu: &'a Pdu,
    unit: Option<&'a DataUnit>,
}

impl<'a> PduDisplay<'a> {
    pub(crate) fn new(level: AppDecodeLevel, pdu: &'a Pdu, unit: Option<&'a DataUnit>) -> Self {
        Self { level, pdu, unit }
    }
}

impl std::fmt::Display for PduDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pdu)?;
        if let Some(code) = self.pdu.exception_code() {
            return write!(f, " {code}");
        }
        if self.level.data_headers() {
            match self.unit {
                Some(unit) => write!(f, " {}", unit.display(self.level))?,
                None if self.level.data_values() => {
                    crate::common::phys::format_bytes(f, self.pdu.data())?
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// How many data bytes follow the function code of a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DataSize {
    /// Exact number of data bytes
    Known(usize),
    /// More bytes are required before the size can be computed
    NeedMore,
    /// Data has the same length as the request, see `diagnostics::RETURN_QUERY_DATA`
    EchoOfRequest,
    /// Function code (or MEI type) has no known size rule
    Unknown,
}

/// Compute the data size of a response from its function code and the data received so far
pub(crate) fn response_data_size(function: u8, data: &[u8]) -> DataSize {
    if function & EXCEPTION_BIT != 0 {
        return DataSize::Known(1);
    }

    let function = match FunctionCode::get(function) {
        Some(x) => x,
        None => return DataSize::Unknown,
    };

    match function {
        FunctionCode::ReadExceptionStatus => DataSize::Known(1),
        FunctionCode::WriteSingleCoil
        | FunctionCode::WriteSingleRegister
        | FunctionCode::WriteMultipleCoils
        | FunctionCode::WriteMultipleRegisters
        | FunctionCode::GetCommEventCounter => DataSize::Known(4),
        FunctionCode::MaskWriteRegister => DataSize::Known(6),
        FunctionCode::ReadCoils
        | FunctionCode::ReadDiscreteInputs
        | FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters
        | FunctionCode::ReportServerId
        | FunctionCode::GetCommEventLog
        | FunctionCode::ReadFileRecord
        | FunctionCode::WriteFileRecord
        | FunctionCode::ReadWriteMultipleRegisters => match data.first() {
            Some(count) => DataSize::Known(1 + *count as usize),
            None => DataSize::NeedMore,
        },
        FunctionCode::ReadFifoQueue => match data.get(0..2) {
            Some([high, low]) => DataSize::Known(2 + u16::from_be_bytes([*high, *low]) as usize),
            _ => DataSize::NeedMore,
        },
        FunctionCode::Diagnostics => match data.get(0..2) {
            Some([high, low]) => {
                if u16::from_be_bytes([*high, *low])
                    == crate::constants::diagnostics::RETURN_QUERY_DATA
                {
                    DataSize::EchoOfRequest
                } else {
                    DataSize::Known(4)
                }
            }
            _ => DataSize::NeedMore,
        },
        FunctionCode::EncapsulatedInterfaceTransport => device_identification_size(data),
    }
}

fn device_identification_size(data: &[u8]) -> DataSize {
    // mei type, read device id code, conformity level, more follows, next object id, number of objects
    const HEADER_LENGTH: usize = 6;

    match data.first() {
        None => return DataSize::NeedMore,
        Some(&crate::constants::mei::READ_DEVICE_IDENTIFICATION) => {}
        Some(_) => return DataSize::Unknown,
    }

    let num_objects = match data.get(HEADER_LENGTH - 1) {
        Some(x) => *x,
        None => return DataSize::NeedMore,
    };

    let mut size = HEADER_LENGTH;
    for _ in 0..num_objects {
        // object id, object length, object value
        match data.get(size + 1) {
            Some(length) => size += 2 + *length as usize,
            None => return DataSize::NeedMore,
        }
    }

    DataSize::Known(size)
}
