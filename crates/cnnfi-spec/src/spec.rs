//! Fault specification aggregate
//!
//! A [`FaultSpec`] holds the fault intent of one campaign domain: which layers
//! are targeted, with which fault kind, and where. It never injects anything
//! itself; it is turned into a request payload for the inference service.
//!
//! All mutators validate first and mutate second, so a rejected call leaves the
//! spec exactly as it was.

use crate::bits::{bit_mask, BitMask, BitPreset, BitWidth};
use crate::catalog::{LayerCatalog, WeightTensor};
use crate::error::{Result, SpecError, ValidationError};
use crate::fault::FaultKind;
use crate::position::{Position, TensorShape};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fault rate given to newly added activation layers
pub const DEFAULT_FAULT_RATE: f64 = 0.01;
/// Bit recorded for a position added without an explicit bit set
pub const DEFAULT_WEIGHT_BIT: u8 = 15;
/// Software values are IEEE-754 single precision
pub const SOFTWARE_WIDTH: BitWidth = BitWidth::Bits32;

// ============================================================================
// Layer configuration
// ============================================================================

/// Which values of the network a spec targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultDomain {
    Activation,
    Weight,
}

impl FaultDomain {
    pub fn name(&self) -> &'static str {
        match self {
            FaultDomain::Activation => "activation",
            FaultDomain::Weight => "weight",
        }
    }
}

impl fmt::Display for FaultDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One weight element and the bits to corrupt in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightFaultSite {
    pub position: Position,
    pub bits: BitMask,
}

/// Domain-specific part of a layer configuration
#[derive(Debug, Clone, PartialEq)]
pub enum LayerFaults {
    /// Probabilistic faults on the layer's output activations. An empty mask
    /// leaves bit selection to the inference service.
    Activation { rate: f64, bits: BitMask },
    /// Explicit faults on one weight tensor of the layer
    Weight {
        target: WeightTensor,
        sites: Vec<WeightFaultSite>,
    },
}

/// Fault configuration of a single layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFaultConfig {
    kind: FaultKind,
    faults: LayerFaults,
}

impl LayerFaultConfig {
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn faults(&self) -> &LayerFaults {
        &self.faults
    }

    /// Activation fault rate
    pub fn rate(&self) -> Option<f64> {
        match &self.faults {
            LayerFaults::Activation { rate, .. } => Some(*rate),
            LayerFaults::Weight { .. } => None,
        }
    }

    /// Activation bit mask
    pub fn bits(&self) -> Option<&BitMask> {
        match &self.faults {
            LayerFaults::Activation { bits, .. } => Some(bits),
            LayerFaults::Weight { .. } => None,
        }
    }

    /// Targeted weight tensor
    pub fn target(&self) -> Option<WeightTensor> {
        match &self.faults {
            LayerFaults::Weight { target, .. } => Some(*target),
            LayerFaults::Activation { .. } => None,
        }
    }

    /// Recorded weight fault sites
    pub fn sites(&self) -> &[WeightFaultSite] {
        match &self.faults {
            LayerFaults::Weight { sites, .. } => sites,
            LayerFaults::Activation { .. } => &[],
        }
    }

    /// Whether this layer asks for any fault at all
    pub fn has_faults(&self) -> bool {
        match &self.faults {
            LayerFaults::Activation { rate, .. } => *rate > 0.0,
            LayerFaults::Weight { sites, .. } => !sites.is_empty(),
        }
    }
}

// ============================================================================
// Fault specification
// ============================================================================

/// Fault intent of one campaign domain
#[derive(Debug, Clone)]
pub struct FaultSpec {
    domain: FaultDomain,
    enabled: bool,
    layers: IndexMap<String, LayerFaultConfig>,
    /// Weight tensor shapes, consulted by the weight domain
    catalog: LayerCatalog,
}

impl FaultSpec {
    /// Empty, disabled activation-domain spec
    pub fn activation() -> Self {
        Self {
            domain: FaultDomain::Activation,
            enabled: false,
            layers: IndexMap::new(),
            catalog: LayerCatalog::new(),
        }
    }

    /// Empty, disabled weight-domain spec over the given layers
    pub fn weight(catalog: LayerCatalog) -> Self {
        Self {
            domain: FaultDomain::Weight,
            enabled: false,
            layers: IndexMap::new(),
            catalog,
        }
    }

    pub fn domain(&self) -> FaultDomain {
        self.domain
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Gate the whole spec. Layer contents are kept either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn layer(&self, layer_id: &str) -> Option<&LayerFaultConfig> {
        self.layers.get(layer_id)
    }

    /// Configured layers in insertion order, regardless of the enabled gate
    pub fn layers(&self) -> impl Iterator<Item = (&str, &LayerFaultConfig)> {
        self.layers.iter().map(|(id, cfg)| (id.as_str(), cfg))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers that would actually receive faults: none while disabled
    pub fn active_layers(&self) -> impl Iterator<Item = (&str, &LayerFaultConfig)> {
        let enabled = self.enabled;
        self.layers().filter(move |(_, cfg)| enabled && cfg.has_faults())
    }

    /// Whether submitting this spec would inject anything
    pub fn contributes_faults(&self) -> bool {
        self.active_layers().next().is_some()
    }

    /// Start configuring `layer_id` with `default_kind`.
    ///
    /// Activation layers start at [`DEFAULT_FAULT_RATE`] with no bit mask.
    /// Weight layers start on the kernel with no positions and must be known
    /// to the layer catalog.
    pub fn add_layer(&mut self, layer_id: &str, default_kind: FaultKind) -> Result<&LayerFaultConfig> {
        if layer_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("layer_id".to_string()).into());
        }
        if self.layers.contains_key(layer_id) {
            return Err(SpecError::DuplicateLayer(layer_id.to_string()));
        }

        let faults = match self.domain {
            FaultDomain::Activation => LayerFaults::Activation {
                rate: DEFAULT_FAULT_RATE,
                bits: BitMask::new(),
            },
            FaultDomain::Weight => {
                if !self.catalog.contains(layer_id) {
                    return Err(SpecError::UnknownLayer(layer_id.to_string()));
                }
                LayerFaults::Weight {
                    target: WeightTensor::Kernel,
                    sites: Vec::new(),
                }
            }
        };

        log::debug!("Adding {} fault layer '{}'", self.domain, layer_id);
        let entry = self
            .layers
            .entry(layer_id.to_string())
            .or_insert(LayerFaultConfig {
                kind: default_kind,
                faults,
            });
        Ok(entry)
    }

    /// Drop `layer_id` from the spec. Absent layers are ignored.
    pub fn remove_layer(&mut self, layer_id: &str) {
        if self.layers.shift_remove(layer_id).is_some() {
            log::debug!("Removed {} fault layer '{}'", self.domain, layer_id);
        }
    }

    /// Change the fault kind of a layer.
    ///
    /// Weight layers lose their recorded positions when the kind changes.
    /// Activation layers lose their bit mask when the new kind is not
    /// bit-level.
    pub fn set_kind(&mut self, layer_id: &str, kind: FaultKind) -> Result<()> {
        let config = self.layer_mut(layer_id)?;
        let changed = config.kind != kind;
        config.kind = kind;
        match &mut config.faults {
            LayerFaults::Weight { sites, .. } => {
                if changed {
                    sites.clear();
                }
            }
            LayerFaults::Activation { bits, .. } => {
                if !kind.is_bit_level() {
                    bits.clear();
                }
            }
        }
        Ok(())
    }

    /// Set the activation fault probability of a layer
    pub fn set_rate(&mut self, layer_id: &str, rate: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ValidationError::RateOutOfRange(rate).into());
        }
        match &mut self.layer_mut(layer_id)?.faults {
            LayerFaults::Activation { rate: r, .. } => {
                *r = rate;
                Ok(())
            }
            LayerFaults::Weight { .. } => Err(SpecError::WrongDomain {
                operation: "set_rate",
                domain: "weight",
            }),
        }
    }

    /// Replace the activation bit mask of a layer
    pub fn set_bits(&mut self, layer_id: &str, bit_indices: &[i64]) -> Result<()> {
        let mask = bit_mask(bit_indices, SOFTWARE_WIDTH)?;
        self.replace_mask(layer_id, mask)
    }

    /// Replace the activation bit mask of a layer with a preset selection
    pub fn apply_preset(&mut self, layer_id: &str, preset: BitPreset) -> Result<()> {
        self.replace_mask(layer_id, preset.bits())
    }

    fn replace_mask(&mut self, layer_id: &str, mask: BitMask) -> Result<()> {
        match &mut self.layer_mut(layer_id)?.faults {
            LayerFaults::Activation { bits, .. } => {
                *bits = mask;
                Ok(())
            }
            LayerFaults::Weight { .. } => Err(SpecError::WrongDomain {
                operation: "set_bits",
                domain: "weight",
            }),
        }
    }

    /// Switch the weight tensor a layer targets. Recorded positions belong to
    /// the old tensor's shape and are cleared.
    pub fn set_target(&mut self, layer_id: &str, tensor: WeightTensor) -> Result<()> {
        match &mut self.layer_mut(layer_id)?.faults {
            LayerFaults::Weight { target, sites } => {
                if *target != tensor {
                    *target = tensor;
                    sites.clear();
                }
                Ok(())
            }
            LayerFaults::Activation { .. } => Err(SpecError::WrongDomain {
                operation: "set_target",
                domain: "activation",
            }),
        }
    }

    /// Shape of the tensor a weight layer currently targets
    pub fn tensor_shape(&self, layer_id: &str) -> Result<&TensorShape> {
        let config = self
            .layers
            .get(layer_id)
            .ok_or_else(|| SpecError::UnknownLayer(layer_id.to_string()))?;
        let target = config.target().ok_or(SpecError::WrongDomain {
            operation: "tensor_shape",
            domain: "activation",
        })?;
        self.catalog
            .get(layer_id)
            .map(|shapes| shapes.shape(target))
            .ok_or_else(|| SpecError::UnknownLayer(layer_id.to_string()))
    }

    /// Record a fault on one weight element
    pub fn add_position(&mut self, layer_id: &str, position: &[i64], bit_indices: &[i64]) -> Result<()> {
        let shape = self.tensor_shape(layer_id)?;
        let position = Position::checked(position, shape)?;
        let bits = bit_mask(bit_indices, SOFTWARE_WIDTH)?;
        self.push_site(layer_id, WeightFaultSite { position, bits })
    }

    /// Record a fault on the tensor's first element, bit [`DEFAULT_WEIGHT_BIT`]
    pub fn add_default_position(&mut self, layer_id: &str) -> Result<()> {
        let position = self.tensor_shape(layer_id)?.origin();
        let bits = BitMask::from([DEFAULT_WEIGHT_BIT]);
        self.push_site(layer_id, WeightFaultSite { position, bits })
    }

    fn push_site(&mut self, layer_id: &str, site: WeightFaultSite) -> Result<()> {
        match &mut self.layer_mut(layer_id)?.faults {
            LayerFaults::Weight { sites, .. } => {
                sites.push(site);
                Ok(())
            }
            LayerFaults::Activation { .. } => Err(SpecError::WrongDomain {
                operation: "add_position",
                domain: "activation",
            }),
        }
    }

    /// Remove the `index`-th fault site of a weight layer, if there is one
    pub fn remove_position(&mut self, layer_id: &str, index: usize) -> Result<Option<WeightFaultSite>> {
        match &mut self.layer_mut(layer_id)?.faults {
            LayerFaults::Weight { sites, .. } => {
                Ok((index < sites.len()).then(|| sites.remove(index)))
            }
            LayerFaults::Activation { .. } => Err(SpecError::WrongDomain {
                operation: "remove_position",
                domain: "activation",
            }),
        }
    }

    fn layer_mut(&mut self, layer_id: &str) -> Result<&mut LayerFaultConfig> {
        self.layers
            .get_mut(layer_id)
            .ok_or_else(|| SpecError::UnknownLayer(layer_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_spec() -> FaultSpec {
        FaultSpec::weight(LayerCatalog::lenet5())
    }

    #[test]
    fn test_add_layer_defaults() {
        let mut spec = FaultSpec::activation();
        let layer = spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();
        assert_eq!(layer.rate(), Some(DEFAULT_FAULT_RATE));
        assert!(layer.bits().unwrap().is_empty());

        let mut spec = weight_spec();
        let layer = spec.add_layer("dense_1", FaultKind::BitFlip).unwrap();
        assert_eq!(layer.target(), Some(WeightTensor::Kernel));
        assert!(layer.sites().is_empty());
    }

    #[test]
    fn test_duplicate_layer_rejected() {
        let mut spec = FaultSpec::activation();
        spec.add_layer("dense_6", FaultKind::StuckAt0).unwrap();
        assert!(matches!(
            spec.add_layer("dense_6", FaultKind::BitFlip),
            Err(SpecError::DuplicateLayer(id)) if id == "dense_6"
        ));
        // Original kind untouched
        assert_eq!(spec.layer("dense_6").unwrap().kind(), FaultKind::StuckAt0);
    }

    #[test]
    fn test_weight_layer_must_be_cataloged() {
        let mut spec = weight_spec();
        assert!(matches!(
            spec.add_layer("flatten", FaultKind::BitFlip),
            Err(SpecError::UnknownLayer(_))
        ));
        assert!(spec.is_empty());
    }

    #[test]
    fn test_remove_layer_idempotent() {
        let mut spec = FaultSpec::activation();
        spec.remove_layer("missing");
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();
        spec.remove_layer("conv2d_1");
        spec.remove_layer("conv2d_1");
        assert!(spec.is_empty());
    }

    #[test]
    fn test_set_kind_clears_weight_positions() {
        let mut spec = weight_spec();
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();
        spec.add_position("conv2d_1", &[0, 1, 0, 5], &[30, 31]).unwrap();
        assert_eq!(spec.layer("conv2d_1").unwrap().sites().len(), 1);

        // Same kind again keeps the positions
        spec.set_kind("conv2d_1", FaultKind::BitFlip).unwrap();
        assert_eq!(spec.layer("conv2d_1").unwrap().sites().len(), 1);

        spec.set_kind("conv2d_1", FaultKind::StuckAt1).unwrap();
        let layer = spec.layer("conv2d_1").unwrap();
        assert_eq!(layer.kind(), FaultKind::StuckAt1);
        assert!(layer.sites().is_empty());
    }

    #[test]
    fn test_add_position_validation_leaves_spec_unchanged() {
        let mut spec = weight_spec();
        spec.add_layer("dense_3", FaultKind::BitFlip).unwrap();
        spec.add_position("dense_3", &[83, 9], &[0]).unwrap();

        let err = spec.add_position("dense_3", &[84, 0], &[0]).unwrap_err();
        assert!(matches!(
            err,
            SpecError::Validation(ValidationError::InvalidPosition { .. })
        ));

        let err = spec.add_position("dense_3", &[0, 0], &[12, 32]).unwrap_err();
        assert!(matches!(
            err,
            SpecError::Validation(ValidationError::InvalidBits { .. })
        ));

        assert_eq!(spec.layer("dense_3").unwrap().sites().len(), 1);
    }

    #[test]
    fn test_set_target_switches_shape() {
        let mut spec = weight_spec();
        spec.add_layer("dense_3", FaultKind::BitFlip).unwrap();
        spec.add_default_position("dense_3").unwrap();

        spec.set_target("dense_3", WeightTensor::Bias).unwrap();
        assert!(spec.layer("dense_3").unwrap().sites().is_empty());
        assert_eq!(spec.tensor_shape("dense_3").unwrap().dims(), &[10]);

        // Kernel rank no longer accepted
        assert!(spec.add_position("dense_3", &[0, 0], &[1]).is_err());
        spec.add_position("dense_3", &[9], &[1]).unwrap();
    }

    #[test]
    fn test_default_position() {
        let mut spec = weight_spec();
        spec.add_layer("conv2d_2", FaultKind::BitFlip).unwrap();
        spec.add_default_position("conv2d_2").unwrap();
        let site = &spec.layer("conv2d_2").unwrap().sites()[0];
        assert_eq!(site.position.coords(), &[0, 0, 0, 0]);
        assert_eq!(site.bits, BitMask::from([DEFAULT_WEIGHT_BIT]));
    }

    #[test]
    fn test_remove_position() {
        let mut spec = weight_spec();
        spec.add_layer("dense_2", FaultKind::BitFlip).unwrap();
        spec.add_position("dense_2", &[1, 1], &[3]).unwrap();
        spec.add_position("dense_2", &[2, 2], &[4]).unwrap();

        let removed = spec.remove_position("dense_2", 0).unwrap().unwrap();
        assert_eq!(removed.position.coords(), &[1, 1]);
        assert!(spec.remove_position("dense_2", 7).unwrap().is_none());
        assert_eq!(spec.layer("dense_2").unwrap().sites().len(), 1);
    }

    #[test]
    fn test_rate_and_bits() {
        let mut spec = FaultSpec::activation();
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();

        assert!(matches!(
            spec.set_rate("conv2d_1", 1.5),
            Err(SpecError::Validation(ValidationError::RateOutOfRange(_)))
        ));
        spec.set_rate("conv2d_1", 0.25).unwrap();
        assert_eq!(spec.layer("conv2d_1").unwrap().rate(), Some(0.25));

        spec.set_bits("conv2d_1", &[31, 30, 30]).unwrap();
        assert_eq!(spec.layer("conv2d_1").unwrap().bits().unwrap().len(), 2);
        assert!(spec.set_bits("conv2d_1", &[40]).is_err());
        assert_eq!(spec.layer("conv2d_1").unwrap().bits().unwrap().len(), 2);

        spec.apply_preset("conv2d_1", BitPreset::Significant).unwrap();
        assert_eq!(spec.layer("conv2d_1").unwrap().bits().unwrap().len(), 11);

        spec.set_kind("conv2d_1", FaultKind::random_noise(0.2).unwrap())
            .unwrap();
        assert!(spec.layer("conv2d_1").unwrap().bits().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_layer_mutations() {
        let mut spec = FaultSpec::activation();
        assert!(matches!(
            spec.set_kind("nope", FaultKind::BitFlip),
            Err(SpecError::UnknownLayer(_))
        ));
        assert!(matches!(
            spec.set_rate("nope", 0.5),
            Err(SpecError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_wrong_domain() {
        let mut spec = FaultSpec::activation();
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();
        assert!(matches!(
            spec.add_position("conv2d_1", &[0], &[0]),
            Err(SpecError::WrongDomain { .. })
        ));

        let mut spec = weight_spec();
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();
        assert!(matches!(
            spec.set_rate("conv2d_1", 0.1),
            Err(SpecError::WrongDomain { .. })
        ));
    }

    #[test]
    fn test_disabled_spec_contributes_nothing() {
        let mut spec = FaultSpec::activation();
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();
        assert!(!spec.is_enabled());
        assert!(!spec.contributes_faults());
        assert_eq!(spec.active_layers().count(), 0);

        spec.set_enabled(true);
        assert!(spec.contributes_faults());

        spec.set_rate("conv2d_1", 0.0).unwrap();
        assert!(!spec.contributes_faults());
    }
}
