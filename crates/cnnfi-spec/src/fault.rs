//! Fault kinds

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard deviation used when a random-noise fault carries none
pub const DEFAULT_NOISE_STD_DEV: f64 = 0.1;

/// Fault type as named on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    /// Invert the selected bits
    #[serde(alias = "bitflip")]
    BitFlip,
    /// Force the selected bits to 0
    #[serde(rename = "stuck_at_0", alias = "stuckat0")]
    StuckAt0,
    /// Force the selected bits to 1
    #[serde(rename = "stuck_at_1", alias = "stuckat1")]
    StuckAt1,
    /// Add Gaussian noise to the value
    RandomNoise,
}

impl FaultType {
    /// Fault types a hardware register can take
    pub fn hardware_set() -> Vec<FaultType> {
        vec![FaultType::BitFlip, FaultType::StuckAt0, FaultType::StuckAt1]
    }

    /// Name used by the inference service
    pub fn name(&self) -> &'static str {
        match self {
            FaultType::BitFlip => "bit_flip",
            FaultType::StuckAt0 => "stuck_at_0",
            FaultType::StuckAt1 => "stuck_at_1",
            FaultType::RandomNoise => "random_noise",
        }
    }

    /// Name used by the hardware simulation service
    pub fn hardware_name(&self) -> Option<&'static str> {
        match self {
            FaultType::BitFlip => Some("bitflip"),
            FaultType::StuckAt0 => Some("stuck_at_0"),
            FaultType::StuckAt1 => Some("stuck_at_1"),
            FaultType::RandomNoise => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FaultType::BitFlip => "Bit Flip",
            FaultType::StuckAt0 => "Stuck-at-0",
            FaultType::StuckAt1 => "Stuck-at-1",
            FaultType::RandomNoise => "Random Noise",
        }
    }

    /// Parse either naming convention
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bit_flip" | "bitflip" => Ok(FaultType::BitFlip),
            "stuck_at_0" | "stuckat0" => Ok(FaultType::StuckAt0),
            "stuck_at_1" | "stuckat1" => Ok(FaultType::StuckAt1),
            "random_noise" => Ok(FaultType::RandomNoise),
            _ => Err(ValidationError::UnknownFaultType(name.to_string())),
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fault kind together with its parameters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum FaultKind {
    #[default]
    BitFlip,
    StuckAt0,
    StuckAt1,
    RandomNoise { std_dev: f64 },
}

impl FaultKind {
    /// Random noise with a validated standard deviation
    pub fn random_noise(std_dev: f64) -> Result<Self, ValidationError> {
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(ValidationError::InvalidStdDev(std_dev));
        }
        Ok(FaultKind::RandomNoise { std_dev })
    }

    /// Build a kind from its wire type and optional noise parameter
    pub fn from_type(fault_type: FaultType, std_dev: Option<f64>) -> Result<Self, ValidationError> {
        match fault_type {
            FaultType::BitFlip => Ok(FaultKind::BitFlip),
            FaultType::StuckAt0 => Ok(FaultKind::StuckAt0),
            FaultType::StuckAt1 => Ok(FaultKind::StuckAt1),
            FaultType::RandomNoise => {
                FaultKind::random_noise(std_dev.unwrap_or(DEFAULT_NOISE_STD_DEV))
            }
        }
    }

    pub fn fault_type(&self) -> FaultType {
        match self {
            FaultKind::BitFlip => FaultType::BitFlip,
            FaultKind::StuckAt0 => FaultType::StuckAt0,
            FaultKind::StuckAt1 => FaultType::StuckAt1,
            FaultKind::RandomNoise { .. } => FaultType::RandomNoise,
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        match self {
            FaultKind::RandomNoise { std_dev } => Some(*std_dev),
            _ => None,
        }
    }

    /// Whether this kind addresses individual bits
    pub fn is_bit_level(&self) -> bool {
        !matches!(self, FaultKind::RandomNoise { .. })
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::RandomNoise { std_dev } => write!(f, "random_noise(std_dev={})", std_dev),
            other => f.write_str(other.fault_type().name()),
        }
    }
}
