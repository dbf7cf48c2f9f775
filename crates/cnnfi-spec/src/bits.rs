//! Bit numbering semantics
//!
//! Two numbering conventions meet in a fault campaign:
//!
//! - **Software values** are IEEE-754 single precision floats addressed
//!   LSB-first (bit 0 = least significant mantissa bit, bit 31 = sign).
//! - **Hardware registers** synthesized into VHDL are fixed-point vectors
//!   addressed MSB-first (bit 0 = most significant).
//!
//! Every conversion between the two goes through [`to_hardware_bit`].

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

/// A set of bit indices. Ordered and duplicate-free.
pub type BitMask = BTreeSet<u8>;

/// IEEE-754 sign bit index
pub const SIGN_BIT: u8 = 31;
/// IEEE-754 single precision exponent bits
pub const EXPONENT_BITS: RangeInclusive<u8> = 23..=30;
/// IEEE-754 single precision mantissa bits
pub const MANTISSA_BITS: RangeInclusive<u8> = 0..=22;

/// Width of a faultable quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitWidth {
    /// Hardware filter coefficient
    Bits8,
    /// Hardware bias coefficient
    Bits16,
    /// IEEE-754 single precision software value
    Bits32,
}

impl BitWidth {
    /// Number of bits
    pub const fn bits(self) -> u8 {
        match self {
            BitWidth::Bits8 => 8,
            BitWidth::Bits16 => 16,
            BitWidth::Bits32 => 32,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(BitWidth::Bits8),
            16 => Some(BitWidth::Bits16),
            32 => Some(BitWidth::Bits32),
            _ => None,
        }
    }

    /// Whether `index` addresses a bit of this width
    pub fn contains(self, index: i64) -> bool {
        (0..i64::from(self.bits())).contains(&index)
    }

    /// Narrow a raw index into this width
    pub fn check(self, index: i64) -> Result<u8, ValidationError> {
        if self.contains(index) {
            Ok(index as u8)
        } else {
            Err(ValidationError::BitOutOfRange {
                index,
                width: self.bits(),
            })
        }
    }

    /// Highest addressable index
    pub const fn max_index(self) -> u8 {
        self.bits() - 1
    }
}

impl TryFrom<u8> for BitWidth {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        BitWidth::from_bits(u32::from(bits))
            .ok_or_else(|| format!("unsupported bit width {} (expected 8, 16 or 32)", bits))
    }
}

impl From<BitWidth> for u8 {
    fn from(width: BitWidth) -> u8 {
        width.bits()
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Role of a bit within an IEEE-754 single precision value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ieee754Field {
    Sign,
    Exponent,
    Mantissa,
}

impl Ieee754Field {
    pub fn name(&self) -> &'static str {
        match self {
            Ieee754Field::Sign => "sign",
            Ieee754Field::Exponent => "exponent",
            Ieee754Field::Mantissa => "mantissa",
        }
    }
}

impl fmt::Display for Ieee754Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a bit of a 32-bit IEEE-754 value.
///
/// Index 31 is the sign, 23..=30 the exponent and 0..=22 the mantissa.
pub fn classify_ieee754_bit(index: i64) -> Result<Ieee754Field, ValidationError> {
    let bit = BitWidth::Bits32.check(index)?;
    Ok(if bit == SIGN_BIT {
        Ieee754Field::Sign
    } else if EXPONENT_BITS.contains(&bit) {
        Ieee754Field::Exponent
    } else {
        Ieee754Field::Mantissa
    })
}

/// Convert an LSB-first index into the MSB-first numbering used by hardware
/// registers (`width - 1 - user_index`).
///
/// The mapping is its own inverse, so the same call converts hardware indices
/// back to LSB-first numbering.
pub fn to_hardware_bit(user_index: i64, width: BitWidth) -> Result<u8, ValidationError> {
    let bit = width.check(user_index)?;
    Ok(width.max_index() - bit)
}

/// Collapse raw indices into a [`BitMask`], rejecting the whole set if any
/// index falls outside `[0, width)`.
pub fn bit_mask(indices: &[i64], width: BitWidth) -> Result<BitMask, ValidationError> {
    if !crate::position::validate_bits(indices, width) {
        return Err(ValidationError::InvalidBits {
            bits: indices.to_vec(),
            width: width.bits(),
        });
    }
    Ok(indices.iter().map(|&i| i as u8).collect())
}

/// Convenience bit selections for 32-bit software values.
///
/// These are product presets, not IEEE-754 categories: `Significant` spans
/// the exponent/mantissa boundary and excludes the sign bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitPreset {
    /// Bits 20..=30
    Significant,
    /// Bits 0..=19
    LessSignificant,
    /// Bits 0..=31
    All,
    /// Empty selection
    None,
}

impl BitPreset {
    pub fn all_presets() -> [BitPreset; 4] {
        [
            BitPreset::Significant,
            BitPreset::LessSignificant,
            BitPreset::All,
            BitPreset::None,
        ]
    }

    pub fn bits(&self) -> BitMask {
        match self {
            BitPreset::Significant => (20..=30).collect(),
            BitPreset::LessSignificant => (0..=19).collect(),
            BitPreset::All => (0..=31).collect(),
            BitPreset::None => BitMask::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BitPreset::Significant => "significant",
            BitPreset::LessSignificant => "less_significant",
            BitPreset::All => "all",
            BitPreset::None => "none",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "significant" => Some(BitPreset::Significant),
            "less_significant" => Some(BitPreset::LessSignificant),
            "all" => Some(BitPreset::All),
            "none" => Some(BitPreset::None),
            _ => None,
        }
    }
}

/// Count of selected bits per IEEE-754 field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBreakdown {
    pub sign: usize,
    pub exponent: usize,
    pub mantissa: usize,
    /// Bits outside a 32-bit value
    pub invalid: usize,
}

impl FieldBreakdown {
    /// Bits that landed in an IEEE-754 field
    pub fn total(&self) -> usize {
        self.sign + self.exponent + self.mantissa
    }
}

/// Break a 32-bit mask down by IEEE-754 field. Indices of 32 and above are
/// counted as `invalid`.
pub fn describe_mask(mask: &BitMask) -> FieldBreakdown {
    let mut breakdown = FieldBreakdown::default();
    for &bit in mask {
        match classify_ieee754_bit(i64::from(bit)) {
            Ok(Ieee754Field::Sign) => breakdown.sign += 1,
            Ok(Ieee754Field::Exponent) => breakdown.exponent += 1,
            Ok(Ieee754Field::Mantissa) => breakdown.mantissa += 1,
            Err(_) => breakdown.invalid += 1,
        }
    }
    breakdown
}

/// Render a mask as `[a, b, c]` in ascending order
pub fn format_mask(mask: &BitMask) -> String {
    let items: Vec<String> = mask.iter().map(|b| b.to_string()).collect();
    format!("[{}]", items.join(", "))
}
