//! Hardware register faults
//!
//! Faults on synthesized VHDL coefficients are flat entries addressed by
//! register name. Bit positions are stored MSB-first, the way the simulation
//! service expects them; entries coming from an LSB-first selector are
//! converted on the way in with [`to_hardware_bit`].

use crate::bits::to_hardware_bit;
use crate::catalog::{RegisterCatalog, RegisterKind};
use crate::error::{Result, ValidationError};
use crate::fault::{FaultKind, FaultType};
use crate::position::required_fields_present;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Numbering convention of incoming bit positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitNumbering {
    /// 0 = least significant (human-facing selector)
    #[default]
    LsbFirst,
    /// 0 = most significant (hardware register order)
    MsbFirst,
}

/// Register a hardware fault lands on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareTarget {
    Filter { name: String, row: usize, col: usize },
    Bias { name: String },
}

impl HardwareTarget {
    pub fn name(&self) -> &str {
        match self {
            HardwareTarget::Filter { name, .. } | HardwareTarget::Bias { name } => name,
        }
    }

    pub fn register_kind(&self) -> RegisterKind {
        match self {
            HardwareTarget::Filter { .. } => RegisterKind::Filter,
            HardwareTarget::Bias { .. } => RegisterKind::Bias,
        }
    }
}

impl fmt::Display for HardwareTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareTarget::Filter { name, row, col } => write!(f, "{}[{}][{}]", name, row, col),
            HardwareTarget::Bias { name } => f.write_str(name),
        }
    }
}

/// One fault on a hardware register
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareFaultEntry {
    pub target: HardwareTarget,
    /// MSB-first bit index
    pub bit_position: u8,
    pub kind: FaultKind,
}

impl HardwareFaultEntry {
    /// Same bit, LSB-first. Fails if `bit_position` does not fit the register.
    pub fn user_bit(&self) -> std::result::Result<u8, ValidationError> {
        to_hardware_bit(i64::from(self.bit_position), self.target.register_kind().width())
    }
}

// ============================================================================
// Wire payload
// ============================================================================

/// Filter fault as sent to the simulation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFaultRequest {
    pub filter_name: String,
    pub row: usize,
    pub col: usize,
    pub bit_position: u8,
    pub fault_type: String,
}

/// Bias fault as sent to the simulation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasFaultRequest {
    pub bias_name: String,
    pub bit_position: u8,
    pub fault_type: String,
}

/// Hardware fault request body. Bit positions are MSB-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareFaultRequest {
    #[serde(default)]
    pub filter_faults: Vec<FilterFaultRequest>,
    #[serde(default)]
    pub bias_faults: Vec<BiasFaultRequest>,
}

// ============================================================================
// Fault plan
// ============================================================================

/// Filter and bias faults to inject into one synthesized layer
#[derive(Debug, Clone, Default)]
pub struct HardwareFaultPlan {
    filter_faults: Vec<HardwareFaultEntry>,
    bias_faults: Vec<HardwareFaultEntry>,
    /// Known registers; an empty catalog accepts any register name
    registers: RegisterCatalog,
}

impl HardwareFaultPlan {
    pub fn new(registers: RegisterCatalog) -> Self {
        Self {
            filter_faults: Vec::new(),
            bias_faults: Vec::new(),
            registers,
        }
    }

    pub fn filter_faults(&self) -> &[HardwareFaultEntry] {
        &self.filter_faults
    }

    pub fn bias_faults(&self) -> &[HardwareFaultEntry] {
        &self.bias_faults
    }

    pub fn len(&self) -> usize {
        self.filter_faults.len() + self.bias_faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a fault on one coefficient of a filter register
    pub fn add_filter_fault(
        &mut self,
        filter_name: &str,
        row: i64,
        col: i64,
        bit: i64,
        numbering: BitNumbering,
        kind: FaultKind,
    ) -> Result<&HardwareFaultEntry> {
        let entry = self.check_entry(RegisterKind::Filter, filter_name, Some((row, col)), bit, numbering, kind)?;
        self.filter_faults.push(entry);
        Ok(&self.filter_faults[self.filter_faults.len() - 1])
    }

    /// Add a fault on a bias register
    pub fn add_bias_fault(
        &mut self,
        bias_name: &str,
        bit: i64,
        numbering: BitNumbering,
        kind: FaultKind,
    ) -> Result<&HardwareFaultEntry> {
        let entry = self.check_entry(RegisterKind::Bias, bias_name, None, bit, numbering, kind)?;
        self.bias_faults.push(entry);
        Ok(&self.bias_faults[self.bias_faults.len() - 1])
    }

    /// `FMAP_1[0][0]`, hardware bit 0, bit flip
    pub fn add_default_filter_fault(&mut self) -> Result<&HardwareFaultEntry> {
        self.add_filter_fault("FMAP_1", 0, 0, 0, BitNumbering::MsbFirst, FaultKind::BitFlip)
    }

    /// `BIAS_VAL_1`, hardware bit 0, bit flip
    pub fn add_default_bias_fault(&mut self) -> Result<&HardwareFaultEntry> {
        self.add_bias_fault("BIAS_VAL_1", 0, BitNumbering::MsbFirst, FaultKind::BitFlip)
    }

    pub fn remove_filter_fault(&mut self, index: usize) -> Option<HardwareFaultEntry> {
        (index < self.filter_faults.len()).then(|| self.filter_faults.remove(index))
    }

    pub fn remove_bias_fault(&mut self, index: usize) -> Option<HardwareFaultEntry> {
        (index < self.bias_faults.len()).then(|| self.bias_faults.remove(index))
    }

    /// Add an untyped entry (a JSON object as produced by a form or file).
    ///
    /// Every required field is checked before anything else so the error
    /// names the first missing, empty or NaN field.
    pub fn add_raw_entry(
        &mut self,
        kind: RegisterKind,
        entry: &Map<String, Value>,
        numbering: BitNumbering,
    ) -> Result<&HardwareFaultEntry> {
        required_fields_present(entry, kind.required_fields())?;

        let name = string_field(entry, kind.name_field())?;
        let bit = integer_field(entry, "bit_position")?;
        let fault_type = FaultType::parse(&string_field(entry, "fault_type")?)?;
        let fault = FaultKind::from_type(fault_type, None)?;

        match kind {
            RegisterKind::Filter => {
                let row = integer_field(entry, "row")?;
                let col = integer_field(entry, "col")?;
                self.add_filter_fault(&name, row, col, bit, numbering, fault)
            }
            RegisterKind::Bias => self.add_bias_fault(&name, bit, numbering, fault),
        }
    }

    /// Build a plan from `{filter_faults: [...], bias_faults: [...]}` holding
    /// untyped entries
    pub fn from_raw_json(
        value: &Value,
        numbering: BitNumbering,
        registers: RegisterCatalog,
    ) -> Result<Self> {
        let mut plan = Self::new(registers);
        for (field, kind) in [
            ("filter_faults", RegisterKind::Filter),
            ("bias_faults", RegisterKind::Bias),
        ] {
            let Some(entries) = value.get(field) else {
                continue;
            };
            let entries = entries.as_array().ok_or_else(|| ValidationError::InvalidField {
                field: field.to_string(),
                reason: "expected a list of fault entries".to_string(),
            })?;
            for entry in entries {
                let entry = entry.as_object().ok_or_else(|| ValidationError::InvalidField {
                    field: field.to_string(),
                    reason: "expected a fault entry object".to_string(),
                })?;
                plan.add_raw_entry(kind, entry, numbering)?;
            }
        }
        Ok(plan)
    }

    /// Build the service payload. An empty plan is rejected.
    pub fn to_request(&self) -> Result<HardwareFaultRequest> {
        if self.is_empty() {
            return Err(ValidationError::EmptyHardwarePlan.into());
        }

        let mut request = HardwareFaultRequest::default();
        for entry in self.filter_faults.iter().chain(&self.bias_faults) {
            let fault_type = hardware_type_name(entry.kind)?.to_string();
            match &entry.target {
                HardwareTarget::Filter { name, row, col } => {
                    request.filter_faults.push(FilterFaultRequest {
                        filter_name: name.clone(),
                        row: *row,
                        col: *col,
                        bit_position: entry.bit_position,
                        fault_type,
                    })
                }
                HardwareTarget::Bias { name } => request.bias_faults.push(BiasFaultRequest {
                    bias_name: name.clone(),
                    bit_position: entry.bit_position,
                    fault_type,
                }),
            }
        }

        log::debug!(
            "Built hardware fault request: {} filter, {} bias",
            request.filter_faults.len(),
            request.bias_faults.len()
        );
        Ok(request)
    }

    fn check_entry(
        &self,
        kind: RegisterKind,
        name: &str,
        coords: Option<(i64, i64)>,
        bit: i64,
        numbering: BitNumbering,
        fault: FaultKind,
    ) -> Result<HardwareFaultEntry> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField(kind.name_field().to_string()).into());
        }
        hardware_type_name(fault)?;

        let width = kind.width();
        let bit_position = match numbering {
            BitNumbering::LsbFirst => to_hardware_bit(bit, width)?,
            BitNumbering::MsbFirst => width.check(bit)?,
        };

        let register = if self.registers.is_empty() {
            None
        } else {
            Some(self.registers.lookup(name, kind)?)
        };

        let target = match (kind, coords) {
            (RegisterKind::Filter, Some((row, col))) => HardwareTarget::Filter {
                name: name.to_string(),
                row: check_coordinate("row", row, register.and_then(|r| r.rows))?,
                col: check_coordinate("col", col, register.and_then(|r| r.cols))?,
            },
            (RegisterKind::Filter, None) => {
                return Err(ValidationError::MissingField("row".to_string()).into())
            }
            (RegisterKind::Bias, _) => HardwareTarget::Bias {
                name: name.to_string(),
            },
        };

        Ok(HardwareFaultEntry {
            target,
            bit_position,
            kind: fault,
        })
    }
}

fn hardware_type_name(kind: FaultKind) -> std::result::Result<&'static str, ValidationError> {
    let fault_type = kind.fault_type();
    fault_type
        .hardware_name()
        .ok_or_else(|| ValidationError::UnsupportedFaultType {
            fault_type: fault_type.name().to_string(),
            target: "hardware registers".to_string(),
        })
}

fn check_coordinate(
    field: &str,
    value: i64,
    bound: Option<usize>,
) -> std::result::Result<usize, ValidationError> {
    let in_bounds = value >= 0 && bound.map_or(true, |b| (value as u64) < b as u64);
    if !in_bounds {
        let reason = match bound {
            Some(b) => format!("{} is outside 0..{}", value, b),
            None => format!("{} is negative", value),
        };
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason,
        });
    }
    Ok(value as usize)
}

fn string_field(entry: &Map<String, Value>, field: &str) -> std::result::Result<String, ValidationError> {
    match entry.get(field) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        _ => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

/// Integer field; numeric strings are accepted since form inputs often
/// arrive as text
fn integer_field(entry: &Map<String, Value>, field: &str) -> std::result::Result<i64, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    };
    match entry.get(field) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                    _ => Err(invalid("expected an integer")),
                }
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid("expected an integer")),
        _ => Err(invalid("expected an integer")),
    }
}
