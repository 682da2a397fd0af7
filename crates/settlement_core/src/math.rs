//! Fixed-point math utilities for deterministic simulation.
//!
//! Path costs and construction progress use fixed-point arithmetic so the
//! same inputs give bit-identical results on every platform.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// One hundred percent.
pub const HUNDRED: Fixed = Fixed::const_from_int(100);

/// Milliseconds per second, used to scale per-second rates.
pub const MS_PER_SECOND: Fixed = Fixed::const_from_int(1000);

/// Percentage `100 * part / whole`, capped at 100.
///
/// An empty whole counts as complete.
#[must_use]
pub fn percent_of(part: u32, whole: u32) -> Fixed {
    if whole == 0 {
        return HUNDRED;
    }
    let ratio = Fixed::from_num(u64::from(part) * 100) / Fixed::from_num(whole);
    ratio.min(HUNDRED)
}

/// Amount of a per-second `rate` accrued over `elapsed_ms`.
///
/// Saturates at [`Fixed::MAX`] divided by one thousand for very long
/// intervals; callers cap the result anyway.
#[must_use]
pub fn accrued(rate_per_second: u32, elapsed_ms: u32) -> Fixed {
    let total = u64::from(rate_per_second) * u64::from(elapsed_ms);
    Fixed::saturating_from_num(total) / MS_PER_SECOND
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => v.to_bits().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of_empty_whole_is_complete() {
        assert_eq!(percent_of(0, 0), HUNDRED);
    }

    #[test]
    fn test_percent_of_partial() {
        assert_eq!(percent_of(1, 4), Fixed::from_num(25));
        assert_eq!(percent_of(3, 4), Fixed::from_num(75));
    }

    #[test]
    fn test_percent_of_caps_at_hundred() {
        assert_eq!(percent_of(9, 4), HUNDRED);
    }

    #[test]
    fn test_accrued_rate() {
        // 20 per second over half a second
        assert_eq!(accrued(20, 500), Fixed::from_num(10));
        assert_eq!(accrued(20, 0), Fixed::ZERO);
    }

    #[test]
    fn test_accrued_saturates_on_long_intervals() {
        assert_eq!(accrued(20, 110_000_000), Fixed::MAX / MS_PER_SECOND);
        assert_eq!(accrued(u32::MAX, u32::MAX), Fixed::MAX / MS_PER_SECOND);
        assert!(accrued(20, u32::MAX) > HUNDRED);
    }

    #[test]
    fn test_fixed_serde_roundtrip_preserves_bits() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper(#[serde(with = "fixed_serde")] Fixed);

        let value = Fixed::from_bits(0x1_6666_6666);
        let encoded = ron::to_string(&Wrapper(value)).unwrap();
        let decoded: Wrapper = ron::from_str(&encoded).unwrap();
        assert_eq!(decoded.0, value);
    }
}
