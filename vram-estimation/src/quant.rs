use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Numeric precision used to store weights or KV cache entries, or to
/// index a GPU's compute throughput table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantKind {
    Fp32,
    Fp16,
    Fp8,
    Int8,
    Int4,
}

impl QuantKind {
    pub const ALL: [Self; 5] = [Self::Fp32, Self::Fp16, Self::Fp8, Self::Int8, Self::Int4];

    /// Storage cost of one scalar at this precision.
    #[must_use]
    pub const fn bytes_per_value(self) -> f64 {
        match self {
            Self::Fp32 => 4.0,
            Self::Fp16 => 2.0,
            Self::Fp8 | Self::Int8 => 1.0,
            Self::Int4 => 0.5,
        }
    }

    /// Worst-case multiplier for grouped-quantization metadata: a group of 32
    /// weights shares one fp16 scale and one fp16 zero point, which costs
    /// 3/32 of a byte per weight on top of the 0.5 byte payload.
    ///
    /// Only fp8 and int4 checkpoints carry this metadata; int8 and the float
    /// formats are stored plain. int8 is excluded on purpose even though it is
    /// an 8-bit kind.
    #[must_use]
    pub fn overhead_factor(self) -> f64 {
        match self {
            Self::Fp8 | Self::Int4 => (0.5 + 3.0 / 32.0) / 0.5,
            Self::Fp32 | Self::Fp16 | Self::Int8 => 1.0,
        }
    }

    /// True for the 8- and 4-bit kinds that need a dedicated fast path on
    /// the device to run at full speed.
    #[must_use]
    pub const fn is_low_precision(self) -> bool {
        matches!(self, Self::Fp8 | Self::Int8 | Self::Int4)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fp32 => "fp32",
            Self::Fp16 => "fp16",
            Self::Fp8 => "fp8",
            Self::Int8 => "int8",
            Self::Int4 => "int4",
        }
    }
}

impl fmt::Display for QuantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuantKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidSpec(format!("unknown quantization kind '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_value() {
        assert_eq!(QuantKind::Fp16.bytes_per_value(), 2.0);
        assert_eq!(QuantKind::Fp8.bytes_per_value(), 1.0);
        assert_eq!(QuantKind::Int8.bytes_per_value(), 1.0);
        assert_eq!(QuantKind::Int4.bytes_per_value(), 0.5);
        assert_eq!(QuantKind::Fp32.bytes_per_value(), 4.0);
    }

    #[test]
    fn test_overhead_factor_only_on_grouped_kinds() {
        assert_eq!(QuantKind::Fp8.overhead_factor(), 1.1875);
        assert_eq!(QuantKind::Int4.overhead_factor(), 1.1875);
        assert_eq!(QuantKind::Int8.overhead_factor(), 1.0);
        assert_eq!(QuantKind::Fp16.overhead_factor(), 1.0);
        assert_eq!(QuantKind::Fp32.overhead_factor(), 1.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("FP8".parse::<QuantKind>().unwrap(), QuantKind::Fp8);
        assert_eq!(" int4 ".parse::<QuantKind>().unwrap(), QuantKind::Int4);
        assert!("q5".parse::<QuantKind>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&QuantKind::Int8).unwrap();
        assert_eq!(json, "\"int8\"");
        let kind: QuantKind = serde_json::from_str("\"fp16\"").unwrap();
        assert_eq!(kind, QuantKind::Fp16);
    }
}
