use crate::exception::ExceptionCode;
use crate::types::RegisterType;

/// The task processing requests has terminated
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("the task processing requests has shut down")]
pub struct Shutdown;

/// Top level error type returned by replies and channel operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The serial port is not open
    #[error("serial port is not open")]
    NoConnection,
    /// The serial port reported a connectivity fault (device missing, permission denied, ...)
    #[error("serial port connectivity fault: {0}")]
    Connection(std::io::ErrorKind),
    /// An operation unsupported by the serial port was requested
    #[error("operation not supported by the serial port")]
    Configuration,
    /// Writing to the serial port failed
    #[error("write to serial port failed: {0}")]
    Write(std::io::ErrorKind),
    /// Reading from the serial port failed
    #[error("read from serial port failed: {0}")]
    Read(std::io::ErrorKind),
    /// All send attempts failed to produce a matching response
    #[error("timeout occurred before receiving a response from the server")]
    ResponseTimeout,
    /// The server replied with a valid exception response
    #[error("server returned an exception: {0}")]
    Exception(#[from] ExceptionCode),
    /// The request was discarded because the serial port was closed
    #[error("request aborted because the serial port was closed")]
    Aborted,
    /// The response passed the checksum but failed structural decoding
    #[error("invalid response: {0}")]
    BadResponse(#[from] AduParseError),
    /// The request failed local validation, nothing was sent
    #[error("invalid request: {0}")]
    BadRequest(#[from] InvalidRequest),
    /// Error that indicates a bug in the library
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
    /// The task processing requests has terminated
    #[error("the task processing requests has shut down")]
    Shutdown,
}

/// Classification of every [`RequestError`] into the kinds reported to users of a reply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Link is not open or reported a connectivity fault
    ConnectionError,
    /// Unsupported device operation
    ConfigurationError,
    /// Asynchronous write fault on the link
    WriteError,
    /// Asynchronous read fault on the link
    ReadError,
    /// Retries exhausted without a response
    TimeoutError,
    /// The server sent an exception response
    ProtocolError,
    /// The queue was drained while the request was outstanding
    ReplyAbortedError,
    /// Anything else, notably responses that failed to decode
    UnknownError,
}

impl RequestError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::NoConnection | RequestError::Connection(_) => ErrorKind::ConnectionError,
            RequestError::Configuration => ErrorKind::ConfigurationError,
            RequestError::Write(_) => ErrorKind::WriteError,
            RequestError::Read(_) => ErrorKind::ReadError,
            RequestError::ResponseTimeout => ErrorKind::TimeoutError,
            RequestError::Exception(_) => ErrorKind::ProtocolError,
            RequestError::Aborted | RequestError::Shutdown => ErrorKind::ReplyAbortedError,
            RequestError::BadResponse(_)
            | RequestError::BadRequest(_)
            | RequestError::Internal(_) => ErrorKind::UnknownError,
        }
    }
}

impl From<Shutdown> for RequestError {
    fn from(_: Shutdown) -> Self {
        RequestError::Shutdown
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Shutdown {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Shutdown
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RequestError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RequestError::Shutdown
    }
}

#[cfg(feature = "serial")]
impl From<tokio_serial::Error> for RequestError {
    fn from(err: tokio_serial::Error) -> Self {
        use std::io::ErrorKind as Io;
        use tokio_serial::ErrorKind as Serial;

        match err.kind {
            Serial::InvalidInput | Serial::Io(Io::InvalidInput | Io::Unsupported) => {
                RequestError::Configuration
            }
            Serial::NoDevice => RequestError::Connection(Io::NotFound),
            Serial::Io(kind) => RequestError::Connection(kind),
            Serial::Unknown => RequestError::Connection(Io::Other),
        }
    }
}

impl From<InvalidRange> for RequestError {
    fn from(x: InvalidRange) -> Self {
        RequestError::BadRequest(x.into())
    }
}

impl From<scursor::ReadError> for RequestError {
    fn from(_: scursor::ReadError) -> Self {
        RequestError::BadResponse(AduParseError::InsufficientBytes)
    }
}

impl From<scursor::WriteError> for RequestError {
    fn from(err: scursor::WriteError) -> Self {
        RequestError::Internal(err.into())
    }
}

/// Errors that indicate faulty logic in the library itself if they occur
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    /// Insufficient space for write operation
    #[error("insufficient space to serialize the frame")]
    InsufficientWriteSpace,
    /// The size of a serialized frame exceeds what the protocol allows
    #[error("frame length ({0}) exceeds the maximum RTU frame size")]
    FrameTooBig(usize),
    /// A completed data unit request carried no decoded values
    #[error("response is missing its decoded data unit")]
    MissingDataUnit,
}

impl From<scursor::WriteError> for InternalError {
    fn from(_: scursor::WriteError) -> Self {
        InternalError::InsufficientWriteSpace
    }
}

/// Errors that occur while parsing responses
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AduParseError {
    /// Response is too short to be valid
    #[error("response is too short to be valid")]
    InsufficientBytes,
    /// Byte count doesn't match what is expected based on the request
    #[error("byte count ({1}) doesn't match what is expected based on request ({0})")]
    RequestByteCountMismatch(usize, usize),
    /// Byte count doesn't match the actual number of bytes present
    #[error("byte count ({0}) doesn't match the actual number of bytes remaining ({1})")]
    InsufficientBytesForByteCount(usize, usize),
    /// Response contains extra trailing bytes
    #[error("response contains {0} extra trailing bytes")]
    TrailingBytes(usize),
    /// A parameter expected to be echoed in the reply did not match
    #[error("a parameter expected to be echoed in the reply did not match")]
    ReplyEchoMismatch,
    /// Bad value for the coil state
    #[error("received coil state with unspecified value: {0:#06X}")]
    UnknownCoilState(u16),
    /// The response function code cannot answer a data unit request
    #[error("function code {0:#04X} cannot be decoded into a data unit")]
    UnexpectedFunction(u8),
    /// A count in the response is outside of what the protocol allows
    #[error("received count ({0}) outside of the range allowed for the function")]
    CountOutOfRange(u16),
}

/// Errors that result because of bad request parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequest {
    /// Request contained an invalid range
    #[error("{0}")]
    BadRange(#[from] InvalidRange),
    /// Data units of this type are read-only
    #[error("cannot write values of type {0:?}")]
    UnsupportedWriteTarget(RegisterType),
    /// Read/write requests only operate on holding registers
    #[error("read/write requests only operate on holding registers")]
    ReadWriteNotHoldingRegisters,
    /// The function code cannot be sent in a request
    #[error("function code {0:#04X} is not a valid request function")]
    BadFunctionCode(u8),
    /// The request PDU exceeds the maximum size
    #[error("request PDU of {0} bytes exceeds the maximum size")]
    PduTooBig(usize),
}

/// Errors that result because of bad address ranges
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRange {
    /// Range contains a count of zero
    #[error("range contains count == 0")]
    CountOfZero,
    /// Start and count would overflow the u16 address space
    #[error("start == {0} and count == {1} would overflow the representation of u16")]
    AddressOverflow(u16, u16),
    /// Count is too large for the requested function
    #[error("the request count of {0} exceeds maximum allowed count of {1} for this type")]
    CountTooLargeForType(u16, u16),
}
