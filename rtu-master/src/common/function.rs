use std::fmt::{Display, Formatter};

mod constants {
    pub(crate) const READ_COILS: u8 = 0x01;
    pub(crate) const READ_DISCRETE_INPUTS: u8 = 0x02;
    pub(crate) const READ_HOLDING_REGISTERS: u8 = 0x03;
    pub(crate) const READ_INPUT_REGISTERS: u8 = 0x04;
    pub(crate) const WRITE_SINGLE_COIL: u8 = 0x05;
    pub(crate) const WRITE_SINGLE_REGISTER: u8 = 0x06;
    pub(crate) const READ_EXCEPTION_STATUS: u8 = 0x07;
    pub(crate) const DIAGNOSTICS: u8 = 0x08;
    pub(crate) const GET_COMM_EVENT_COUNTER: u8 = 0x0B;
    pub(crate) const GET_COMM_EVENT_LOG: u8 = 0x0C;
    pub(crate) const WRITE_MULTIPLE_COILS: u8 = 0x0F;
    pub(crate) const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
    pub(crate) const REPORT_SERVER_ID: u8 = 0x11;
    pub(crate) const READ_FILE_RECORD: u8 = 0x14;
    pub(crate) const WRITE_FILE_RECORD: u8 = 0x15;
    pub(crate) const MASK_WRITE_REGISTER: u8 = 0x16;
    pub(crate) const READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;
    pub(crate) const READ_FIFO_QUEUE: u8 = 0x18;
    pub(crate) const ENCAPSULATED_INTERFACE_TRANSPORT: u8 = 0x2B;
}

/// Bit set in the function code of exception responses
pub(crate) const EXCEPTION_BIT: u8 = 0x80;

/// Public Modbus function codes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read Coils (0x01)
    ReadCoils = constants::READ_COILS,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = constants::READ_DISCRETE_INPUTS,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = constants::READ_HOLDING_REGISTERS,
    /// Read Input Registers (0x04)
    ReadInputRegisters = constants::READ_INPUT_REGISTERS,
    /// Write Single Coil (0x05)
    WriteSingleCoil = constants::WRITE_SINGLE_COIL,
    /// Write Single Register (0x06)
    WriteSingleRegister = constants::WRITE_SINGLE_REGISTER,
    /// Read Exception Status (0x07)
    ReadExceptionStatus = constants::READ_EXCEPTION_STATUS,
    /// Diagnostics (0x08)
    Diagnostics = constants::DIAGNOSTICS,
    /// Get Comm Event Counter (0x0B)
    GetCommEventCounter = constants::GET_COMM_EVENT_COUNTER,
    /// Get Comm Event Log (0x0C)
    GetCommEventLog = constants::GET_COMM_EVENT_LOG,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = constants::WRITE_MULTIPLE_COILS,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = constants::WRITE_MULTIPLE_REGISTERS,
    /// Report Server ID (0x11)
    ReportServerId = constants::REPORT_SERVER_ID,
    /// Read File Record (0x14)
    ReadFileRecord = constants::READ_FILE_RECORD,
    /// Write File Record (0x15)
    WriteFileRecord = constants::WRITE_FILE_RECORD,
    /// Mask Write Register (0x16)
    MaskWriteRegister = constants::MASK_WRITE_REGISTER,
    /// Read/Write Multiple Registers (0x17)
    ReadWriteMultipleRegisters = constants::READ_WRITE_MULTIPLE_REGISTERS,
    /// Read FIFO Queue (0x18)
    ReadFifoQueue = constants::READ_FIFO_QUEUE,
    /// Encapsulated Interface Transport (0x2B)
    EncapsulatedInterfaceTransport = constants::ENCAPSULATED_INTERFACE_TRANSPORT,
}

impl Display for FunctionCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        let name = match self {
            FunctionCode::ReadCoils => "READ COILS",
            FunctionCode::ReadDiscreteInputs => "READ DISCRETE INPUTS",
            FunctionCode::ReadHoldingRegisters => "READ HOLDING REGISTERS",
            FunctionCode::ReadInputRegisters => "READ INPUT REGISTERS",
            FunctionCode::WriteSingleCoil => "WRITE SINGLE COIL",
            FunctionCode::WriteSingleRegister => "WRITE SINGLE REGISTER",
            FunctionCode::ReadExceptionStatus => "READ EXCEPTION STATUS",
            FunctionCode::Diagnostics => "DIAGNOSTICS",
            FunctionCode::GetCommEventCounter => "GET COMM EVENT COUNTER",
            FunctionCode::GetCommEventLog => "GET COMM EVENT LOG",
            FunctionCode::WriteMultipleCoils => "WRITE MULTIPLE COILS",
            FunctionCode::WriteMultipleRegisters => "WRITE MULTIPLE REGISTERS",
            FunctionCode::ReportServerId => "REPORT SERVER ID",
            FunctionCode::ReadFileRecord => "READ FILE RECORD",
            FunctionCode::WriteFileRecord => "WRITE FILE RECORD",
            FunctionCode::MaskWriteRegister => "MASK WRITE REGISTER",
            FunctionCode::ReadWriteMultipleRegisters => "READ WRITE MULTIPLE REGISTERS",
            FunctionCode::ReadFifoQueue => "READ FIFO QUEUE",
            FunctionCode::EncapsulatedInterfaceTransport => "ENCAPSULATED INTERFACE TRANSPORT",
        };
        write!(f, "{} ({:#04X})", name, self.get_value())
    }
}

impl FunctionCode {
    /// Raw value of the function code
    pub const fn get_value(self) -> u8 {
        self as u8
    }

    /// Value of the function code in an exception response
    pub const fn as_error(self) -> u8 {
        self.get_value() | EXCEPTION_BIT
    }

    /// Look up a function code by its raw value, ignoring the exception bit
    pub fn get(value: u8) -> Option<Self> {
        match value & !EXCEPTION_BIT {
            constants::READ_COILS => Some(FunctionCode::ReadCoils),
            constants::READ_DISCRETE_INPUTS => Some(FunctionCode::ReadDiscreteInputs),
            constants::READ_HOLDING_REGISTERS => Some(FunctionCode::ReadHoldingRegisters),
            constants::READ_INPUT_REGISTERS => Some(FunctionCode::ReadInputRegisters),
            constants::WRITE_SINGLE_COIL => Some(FunctionCode::WriteSingleCoil),
            constants::WRITE_SINGLE_REGISTER => Some(FunctionCode::WriteSingleRegister),
            constants::READ_EXCEPTION_STATUS => Some(FunctionCode::ReadExceptionStatus),
            constants::DIAGNOSTICS => Some(FunctionCode::Diagnostics),
            constants::GET_COMM_EVENT_COUNTER => Some(FunctionCode::GetCommEventCounter),
            constants::GET_COMM_EVENT_LOG => Some(FunctionCode::GetCommEventLog),
            constants::WRITE_MULTIPLE_COILS => Some(FunctionCode::WriteMultipleCoils),
            constants::WRITE_MULTIPLE_REGISTERS => Some(FunctionCode::WriteMultipleRegisters),
            constants::REPORT_SERVER_ID => Some(FunctionCode::ReportServerId),
            constants::READ_FILE_RECORD => Some(FunctionCode::ReadFileRecord),
            constants::WRITE_FILE_RECORD => Some(FunctionCode::WriteFileRecord),
            constants::MASK_WRITE_REGISTER => Some(FunctionCode::MaskWriteRegister),
            constants::READ_WRITE_MULTIPLE_REGISTERS => {
                Some(FunctionCode::ReadWriteMultipleRegisters)
            }
            constants::READ_FIFO_QUEUE => Some(FunctionCode::ReadFifoQueue),
            constants::ENCAPSULATED_INTERFACE_TRANSPORT => {
                Some(FunctionCode::EncapsulatedInterfaceTransport)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_exception_bit() {
        assert_eq!(FunctionCode::get(0x81), Some(FunctionCode::ReadCoils));
        assert_eq!(FunctionCode::get(0x17), Some(FunctionCode::ReadWriteMultipleRegisters));
        assert_eq!(FunctionCode::get(0x42), None);
    }

    #[test]
    fn formats_name_and_value() {
        assert_eq!(
            FunctionCode::WriteSingleCoil.to_string(),
            "WRITE SINGLE COIL (0x05)"
        );
        assert_eq!(FunctionCode::ReadCoils.as_error(), 0x81);
    }
}
