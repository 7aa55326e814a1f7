//! The PM-xxx telemetry schema.
//!
//! A meter's status page carries its measurements as a flat run of numbers
//! whose meaning is fixed by position. [`Field`] makes that positional
//! contract explicit: the declaration order of its variants *is* the order
//! in which values appear on the wire, and [`FieldValues`] stores one slot
//! per field in that same order.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of telemetry fields reported by a meter.
pub const FIELD_COUNT: usize = 34;

/// A named telemetry field, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    L1Volt,
    L2Volt,
    L3Volt,
    L12Volt,
    L23Volt,
    L31Volt,
    L1Amps,
    L2Amps,
    L3Amps,
    NAmps,
    Frequency,
    VAvrg,
    UAvrg,
    IAvrg,
    TotP,
    TotQ,
    TotS,
    PowFactor,
    DemandI1,
    DemandI2,
    DemandI3,
    DemandIa,
    DemandP,
    DemandQ,
    ThdL1,
    ThdL2,
    ThdL3,
    ThdL12,
    ThdL23,
    ThdL31,
    ThdI1,
    ThdI2,
    ThdI3,
    ThdIn,
}

impl Field {
    /// All fields in wire order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::L1Volt,
        Field::L2Volt,
        Field::L3Volt,
        Field::L12Volt,
        Field::L23Volt,
        Field::L31Volt,
        Field::L1Amps,
        Field::L2Amps,
        Field::L3Amps,
        Field::NAmps,
        Field::Frequency,
        Field::VAvrg,
        Field::UAvrg,
        Field::IAvrg,
        Field::TotP,
        Field::TotQ,
        Field::TotS,
        Field::PowFactor,
        Field::DemandI1,
        Field::DemandI2,
        Field::DemandI3,
        Field::DemandIa,
        Field::DemandP,
        Field::DemandQ,
        Field::ThdL1,
        Field::ThdL2,
        Field::ThdL3,
        Field::ThdL12,
        Field::ThdL23,
        Field::ThdL31,
        Field::ThdI1,
        Field::ThdI2,
        Field::ThdI3,
        Field::ThdIn,
    ];

    /// Position of this field in the wire order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get the snake_case name used in metric names and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::L1Volt => "l1_volt",
            Field::L2Volt => "l2_volt",
            Field::L3Volt => "l3_volt",
            Field::L12Volt => "l12_volt",
            Field::L23Volt => "l23_volt",
            Field::L31Volt => "l31_volt",
            Field::L1Amps => "l1_amps",
            Field::L2Amps => "l2_amps",
            Field::L3Amps => "l3_amps",
            Field::NAmps => "n_amps",
            Field::Frequency => "frequency",
            Field::VAvrg => "v_avrg",
            Field::UAvrg => "u_avrg",
            Field::IAvrg => "i_avrg",
            Field::TotP => "tot_p",
            Field::TotQ => "tot_q",
            Field::TotS => "tot_s",
            Field::PowFactor => "pow_factor",
            Field::DemandI1 => "demand_i1",
            Field::DemandI2 => "demand_i2",
            Field::DemandI3 => "demand_i3",
            Field::DemandIa => "demand_ia",
            Field::DemandP => "demand_p",
            Field::DemandQ => "demand_q",
            Field::ThdL1 => "thd_l1",
            Field::ThdL2 => "thd_l2",
            Field::ThdL3 => "thd_l3",
            Field::ThdL12 => "thd_l12",
            Field::ThdL23 => "thd_l23",
            Field::ThdL31 => "thd_l31",
            Field::ThdI1 => "thd_i1",
            Field::ThdI2 => "thd_i2",
            Field::ThdI3 => "thd_i3",
            Field::ThdIn => "thd_in",
        }
    }

    /// Human-readable description, used as metric help text.
    pub fn description(&self) -> &'static str {
        match self {
            Field::L1Volt => "Leg 1 Voltage",
            Field::L2Volt => "Leg 2 Voltage",
            Field::L3Volt => "Leg 3 Voltage",
            Field::L12Volt => "Leg 1 to Leg 2 Voltage",
            Field::L23Volt => "Leg 2 to Leg 3 Voltage",
            Field::L31Volt => "Leg 3 to Leg 1 Voltage",
            Field::L1Amps => "Leg 1 Amps",
            Field::L2Amps => "Leg 2 Amps",
            Field::L3Amps => "Leg 3 Amps",
            Field::NAmps => "Neutral Leg Amps",
            Field::Frequency => "Input Frequency",
            Field::VAvrg => "Average leg voltage",
            Field::UAvrg => "Average leg-to-leg voltage",
            Field::IAvrg => "Average current",
            Field::TotP => "Total Power",
            Field::TotQ => "Total Reactive Power",
            Field::TotS => "Total Apparent Power",
            Field::PowFactor => "Power Factor",
            Field::DemandI1 => "Leg 1 Current Demand",
            Field::DemandI2 => "Leg 2 Current Demand",
            Field::DemandI3 => "Leg 3 Current Demand",
            Field::DemandIa => "Average Current Demand",
            Field::DemandP => "Power Demand",
            Field::DemandQ => "Reactive Power Demand",
            Field::ThdL1 => "Leg 1 Voltage Total Harmonic Distortion",
            Field::ThdL2 => "Leg 2 Voltage Total Harmonic Distortion",
            Field::ThdL3 => "Leg 3 Voltage Total Harmonic Distortion",
            Field::ThdL12 => "Leg 1 to Leg 2 Voltage Total Harmonic Distortion",
            Field::ThdL23 => "Leg 2 to Leg 3 Voltage Total Harmonic Distortion",
            Field::ThdL31 => "Leg 3 to Leg 1 Voltage Total Harmonic Distortion",
            Field::ThdI1 => "Leg 1 Current Total Harmonic Distortion",
            Field::ThdI2 => "Leg 2 Current Total Harmonic Distortion",
            Field::ThdI3 => "Leg 3 Current Total Harmonic Distortion",
            Field::ThdIn => "Neutral Leg Current Total Harmonic Distortion",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string names no known field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown telemetry field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One optional value per [`Field`], kept in wire order.
///
/// Every field is always present; a field that has never been read is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldValues {
    slots: [Option<f64>; FIELD_COUNT],
}

impl FieldValues {
    /// Create a map with every field unset.
    pub fn new() -> Self {
        Self {
            slots: [None; FIELD_COUNT],
        }
    }

    /// Build a fully populated map from values in wire order.
    pub fn from_ordered(values: [f64; FIELD_COUNT]) -> Self {
        Self {
            slots: values.map(Some),
        }
    }

    /// Get the value of a field.
    pub fn get(&self, field: Field) -> Option<f64> {
        self.slots[field.index()]
    }

    /// Look up a value by field name.
    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        name.parse::<Field>().ok().and_then(|f| self.get(f))
    }

    /// Set the value of a field.
    pub fn set(&mut self, field: Field, value: Option<f64>) {
        self.slots[field.index()] = value;
    }

    /// Whether no field has a value.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Iterate over all fields and their values in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<f64>)> + '_ {
        Field::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    /// Number of fields (always [`FIELD_COUNT`]).
    pub fn len(&self) -> usize {
        FIELD_COUNT
    }
}

impl Default for FieldValues {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for FieldValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIELD_COUNT))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.as_str(), &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_matches_index() {
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
        assert_eq!(Field::ALL[0], Field::L1Volt);
        assert_eq!(Field::ALL[FIELD_COUNT - 1], Field::ThdIn);
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), field);
        }
        assert!("demand_1".parse::<Field>().is_err());
    }

    #[test]
    fn test_new_values_are_unset() {
        let values = FieldValues::new();
        assert!(values.is_empty());
        assert_eq!(values.iter().count(), FIELD_COUNT);
        assert!(values.iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn test_get_and_set() {
        let mut values = FieldValues::new();
        values.set(Field::Frequency, Some(50.02));

        assert_eq!(values.get(Field::Frequency), Some(50.02));
        assert_eq!(values.get_by_name("frequency"), Some(50.02));
        assert_eq!(values.get_by_name("l1_volt"), None);
        assert_eq!(values.get_by_name("bogus"), None);
        assert!(!values.is_empty());
    }

    #[test]
    fn test_serialize_as_ordered_map() {
        let mut values = FieldValues::new();
        values.set(Field::L1Volt, Some(230.5));

        let json = serde_json::to_string(&values).unwrap();
        assert!(json.starts_with("{\"l1_volt\":230.5,\"l2_volt\":null"));
        assert!(json.ends_with("\"thd_in\":null}"));
    }
}
