use crate::decode::AppDecodeLevel;
use crate::error::InvalidRange;

/// Modbus server address on a serial line, just a type-safe wrapper around `u8`
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct ServerAddress {
    /// underlying raw value
    pub value: u8,
}

/// The four Modbus data tables
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterType {
    /// Single bit, read/write
    Coils,
    /// Single bit, read-only
    DiscreteInputs,
    /// 16-bit word, read-only
    InputRegisters,
    /// 16-bit word, read/write
    HoldingRegisters,
}

/// A contiguous range of values of one register type
///
/// Bits are stored one per `u16` (0 = OFF, anything else = ON) so that the
/// same type carries coil and register data. The number of values is always
/// the length of the value vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUnit {
    register_type: RegisterType,
    start_address: u16,
    values: Vec<u16>,
}

/// Start and count tuple used when making various requests
/// Cannot be constructed with invalid start/count
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    /// Starting address of the range
    pub start: u16,
    /// Count of elements in the range
    pub count: u16,
}

/// Value and its address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Indexed<T> {
    /// Address of the value
    pub index: u16,
    /// Associated value
    pub value: T,
}

impl ServerAddress {
    /// Create a new server address
    pub fn new(value: u8) -> Self {
        Self { value }
    }

    /// Broadcast address, servers never answer requests sent to it
    pub fn broadcast() -> Self {
        Self { value: 0x00 }
    }

    /// Returns true if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.value == 0x00
    }

    /// Returns true if the address is reserved in RTU mode
    ///
    /// Users should *not* use reserved addresses in RTU mode.
    pub fn is_rtu_reserved(&self) -> bool {
        self.value >= 248
    }
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04X}", self.value)
    }
}

impl RegisterType {
    /// True for the single-bit tables
    pub fn is_bit(self) -> bool {
        matches!(self, RegisterType::Coils | RegisterType::DiscreteInputs)
    }

    /// True for the tables a master may write to
    pub fn is_writable(self) -> bool {
        matches!(self, RegisterType::Coils | RegisterType::HoldingRegisters)
    }
}

impl std::fmt::Display for RegisterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterType::Coils => f.write_str("coils"),
            RegisterType::DiscreteInputs => f.write_str("discrete inputs"),
            RegisterType::InputRegisters => f.write_str("input registers"),
            RegisterType::HoldingRegisters => f.write_str("holding registers"),
        }
    }
}

impl DataUnit {
    /// Create a unit of `count` zeroed values, typically used to describe a read
    pub fn new(register_type: RegisterType, start_address: u16, count: u16) -> Self {
        Self {
            register_type,
            start_address,
            values: vec![0; count as usize],
        }
    }

    /// Create a unit from explicit values, typically used to describe a write
    pub fn with_values(register_type: RegisterType, start_address: u16, values: Vec<u16>) -> Self {
        Self {
            register_type,
            start_address,
            values,
        }
    }

    /// Create a coil unit from boolean values
    pub fn coils(start_address: u16, values: &[bool]) -> Self {
        Self::with_values(
            RegisterType::Coils,
            start_address,
            values.iter().map(|x| u16::from(*x)).collect(),
        )
    }

    /// Create a holding register unit from values
    pub fn holding_registers(start_address: u16, values: &[u16]) -> Self {
        Self::with_values(RegisterType::HoldingRegisters, start_address, values.to_vec())
    }

    /// Table this unit refers to
    pub fn register_type(&self) -> RegisterType {
        self.register_type
    }

    /// Address of the first value
    pub fn start_address(&self) -> u16 {
        self.start_address
    }

    /// Number of values in the unit
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Raw values in address order
    pub fn values(&self) -> &[u16] {
        &self.values
    }

    /// Value at a position relative to the start address
    pub fn value(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied()
    }

    /// Values interpreted as bits
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.values.iter().map(|x| *x != 0)
    }

    /// Values paired with their absolute address
    pub fn iter(&self) -> impl Iterator<Item = Indexed<u16>> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| Indexed::new(self.start_address.wrapping_add(i as u16), *v))
    }

    /// Replace the values
    pub fn set_values(&mut self, values: Vec<u16>) {
        self.values = values;
    }

    /// True if the unit has at least one value and does not overflow the address space
    pub fn is_valid(&self) -> bool {
        self.range().is_ok()
    }

    /// The address range covered by this unit
    pub fn range(&self) -> Result<AddressRange, InvalidRange> {
        let count = u16::try_from(self.values.len())
            .map_err(|_| InvalidRange::AddressOverflow(self.start_address, u16::MAX))?;
        AddressRange::try_from(self.start_address, count)
    }

    pub(crate) fn display(&self, level: AppDecodeLevel) -> DataUnitDisplay<'_> {
        DataUnitDisplay { unit: self, level }
    }
}

pub(crate) struct DataUnitDisplay<'a> {
    unit: &'a DataUnit,
    level: AppDecodeLevel,
}

impl std::fmt::Display for DataUnitDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} start: {:#06X} qty: {}",
            self.unit.register_type,
            self.unit.start_address,
            self.unit.value_count()
        )?;

        if self.level.data_values() {
            for x in self.unit.iter() {
                if self.unit.register_type.is_bit() {
                    write!(f, "\n{}", Indexed::new(x.index, x.value != 0))?;
                } else {
                    write!(f, "\n{x}")?;
                }
            }
        }

        Ok(())
    }
}

pub(crate) fn coil_from_u16(value: u16) -> Option<bool> {
    match value {
        crate::constants::coil::ON => Some(true),
        crate::constants::coil::OFF => Some(false),
        _ => None,
    }
}

pub(crate) fn coil_to_u16(value: bool) -> u16 {
    if value {
        crate::constants::coil::ON
    } else {
        crate::constants::coil::OFF
    }
}

impl AddressRange {
    /// Create a new address range
    pub fn try_from(start: u16, count: u16) -> Result<Self, InvalidRange> {
        if count == 0 {
            return Err(InvalidRange::CountOfZero);
        }

        let max_start = u16::MAX - (count - 1);

        if start > max_start {
            return Err(InvalidRange::AddressOverflow(start, count));
        }

        Ok(Self { start, count })
    }

    pub(crate) fn limited_count(self, limit: u16) -> Result<Self, InvalidRange> {
        if self.count > limit {
            return Err(InvalidRange::CountTooLargeForType(self.count, limit));
        }
        Ok(self)
    }
}

impl std::fmt::Display for AddressRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start: {:#06X} qty: {}", self.start, self.count)
    }
}

impl<T> Indexed<T> {
    /// Create a new indexed value
    pub fn new(index: u16, value: T) -> Self {
        Indexed { index, value }
    }
}

impl std::fmt::Display for Indexed<bool> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx: {:#06X} value: {}", self.index, self.value as i32)
    }
}

impl std::fmt::Display for Indexed<u16> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx: {:#06X} value: {:#06X}", self.index, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_start_max_count_of_one_is_allowed() {
        AddressRange::try_from(u16::MAX, 1).unwrap();
    }

    #[test]
    fn address_count_zero_fails_validation() {
        assert_eq!(AddressRange::try_from(0, 0), Err(InvalidRange::CountOfZero));
    }

    #[test]
    fn start_max_count_of_two_overflows() {
        assert_eq!(
            AddressRange::try_from(u16::MAX, 2),
            Err(InvalidRange::AddressOverflow(u16::MAX, 2))
        );
    }

    #[test]
    fn data_unit_count_tracks_values() {
        let mut unit = DataUnit::new(RegisterType::HoldingRegisters, 10, 3);
        assert_eq!(unit.value_count(), 3);
        assert_eq!(unit.values(), &[0, 0, 0]);
        unit.set_values(vec![1, 2]);
        assert_eq!(unit.value_count(), 2);
        assert_eq!(unit.range(), Ok(AddressRange { start: 10, count: 2 }));
    }

    #[test]
    fn empty_or_overflowing_units_are_invalid() {
        assert!(!DataUnit::new(RegisterType::Coils, 0, 0).is_valid());
        assert!(!DataUnit::new(RegisterType::Coils, 0xFFFF, 2).is_valid());
        assert!(DataUnit::new(RegisterType::Coils, 0xFFFF, 1).is_valid());
    }

    #[test]
    fn coil_units_store_one_bit_per_value() {
        let unit = DataUnit::coils(4, &[true, false, true]);
        assert_eq!(unit.values(), &[1, 0, 1]);
        assert_eq!(unit.bits().collect::<Vec<_>>(), vec![true, false, true]);
        assert_eq!(
            unit.iter().collect::<Vec<_>>(),
            vec![Indexed::new(4, 1), Indexed::new(5, 0), Indexed::new(6, 1)]
        );
    }

    #[test]
    fn broadcast_and_reserved_addresses() {
        assert!(ServerAddress::broadcast().is_broadcast());
        assert!(ServerAddress::new(248).is_rtu_reserved());
        assert!(ServerAddress::new(255).is_rtu_reserved());
        assert!(!ServerAddress::new(41).is_rtu_reserved());
    }
}
