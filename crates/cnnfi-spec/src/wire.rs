//! Request payloads for the inference service
//!
//! Payloads are plain serde types. Converting a [`FaultSpec`] into a payload
//! is infallible apart from domain mismatches; converting a payload back
//! replays it through the spec's validated mutators, so anything accepted
//! here obeys the same rules as interactive edits.

use crate::catalog::{LayerCatalog, WeightTensor};
use crate::error::{Result, SpecError, ValidationError};
use crate::fault::{FaultKind, FaultType};
use crate::spec::{FaultDomain, FaultSpec, LayerFaults, DEFAULT_FAULT_RATE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Largest number of test images a campaign may request
pub const MAX_CAMPAIGN_SAMPLES: u64 = 1000;

fn default_fault_rate() -> f64 {
    DEFAULT_FAULT_RATE
}

/// Extra parameters of a random-noise fault
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseParameters {
    pub std_dev: f64,
}

// ============================================================================
// Activation faults
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationLayerRequest {
    pub fault_type: FaultType,
    #[serde(default = "default_fault_rate")]
    pub fault_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<NoiseParameters>,
    /// Sorted; omitted when the mask is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_positions: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationFaultRequest {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub layers: IndexMap<String, ActivationLayerRequest>,
}

// ============================================================================
// Weight faults
// ============================================================================

/// One entry of a weight layer's `positions` list.
///
/// Either bare coordinates sharing the layer-level `bit_positions`, or a
/// position object. A position object without its own bits also falls back
/// to the layer-level bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightSiteEntry {
    Coords(Vec<i64>),
    Site {
        position: Vec<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bit_positions: Option<Vec<i64>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightLayerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_type: Option<FaultType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<NoiseParameters>,
    #[serde(default)]
    pub target_type: WeightTensor,
    #[serde(default)]
    pub positions: Vec<WeightSiteEntry>,
    /// Bits shared by bare-coordinate entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_positions: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightFaultRequest {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub layers: IndexMap<String, WeightLayerRequest>,
}

// ============================================================================
// FaultSpec conversions
// ============================================================================

fn noise_parameters(kind: FaultKind) -> Option<NoiseParameters> {
    kind.std_dev().map(|std_dev| NoiseParameters { std_dev })
}

impl FaultSpec {
    /// Activation payload. Fails on a weight-domain spec.
    pub fn to_activation_request(&self) -> Result<ActivationFaultRequest> {
        self.expect_domain(FaultDomain::Activation, "to_activation_request")?;

        let mut layers = IndexMap::new();
        for (id, config) in self.layers() {
            let LayerFaults::Activation { rate, bits } = config.faults() else {
                continue;
            };
            let bit_positions =
                (!bits.is_empty()).then(|| bits.iter().map(|&b| i64::from(b)).collect());
            layers.insert(
                id.to_string(),
                ActivationLayerRequest {
                    fault_type: config.kind().fault_type(),
                    fault_rate: *rate,
                    parameters: noise_parameters(config.kind()),
                    bit_positions,
                },
            );
        }

        Ok(ActivationFaultRequest {
            enabled: self.is_enabled(),
            layers,
        })
    }

    /// Weight payload in the per-position form. Fails on an activation-domain
    /// spec.
    pub fn to_weight_request(&self) -> Result<WeightFaultRequest> {
        self.expect_domain(FaultDomain::Weight, "to_weight_request")?;

        let mut layers = IndexMap::new();
        for (id, config) in self.layers() {
            let LayerFaults::Weight { target, sites } = config.faults() else {
                continue;
            };
            let positions = sites
                .iter()
                .map(|site| WeightSiteEntry::Site {
                    position: site.position.to_raw(),
                    bit_positions: Some(site.bits.iter().map(|&b| i64::from(b)).collect()),
                })
                .collect();
            layers.insert(
                id.to_string(),
                WeightLayerRequest {
                    fault_type: Some(config.kind().fault_type()),
                    parameters: noise_parameters(config.kind()),
                    target_type: *target,
                    positions,
                    bit_positions: None,
                },
            );
        }

        Ok(WeightFaultRequest {
            enabled: self.is_enabled(),
            layers,
        })
    }

    /// Rebuild an activation spec from its payload
    pub fn from_activation_request(request: &ActivationFaultRequest) -> Result<Self> {
        let mut spec = FaultSpec::activation();
        for (id, layer) in &request.layers {
            let kind = FaultKind::from_type(layer.fault_type, layer.parameters.map(|p| p.std_dev))?;
            spec.add_layer(id, kind)?;
            spec.set_rate(id, layer.fault_rate)?;
            if let Some(bits) = &layer.bit_positions {
                if kind.is_bit_level() {
                    spec.set_bits(id, bits)?;
                } else {
                    log::debug!("Ignoring bit positions of '{}': {} is not bit-level", id, kind);
                }
            }
        }
        spec.set_enabled(request.enabled);
        Ok(spec)
    }

    /// Rebuild a weight spec from its payload. Both the per-position and the
    /// shared `bit_positions` forms are accepted.
    pub fn from_weight_request(request: &WeightFaultRequest, catalog: LayerCatalog) -> Result<Self> {
        let mut spec = FaultSpec::weight(catalog);
        for (id, layer) in &request.layers {
            let fault_type = layer.fault_type.unwrap_or(FaultType::BitFlip);
            let kind = FaultKind::from_type(fault_type, layer.parameters.map(|p| p.std_dev))?;
            spec.add_layer(id, kind)?;
            spec.set_target(id, layer.target_type)?;

            for entry in &layer.positions {
                let (position, own_bits) = match entry {
                    WeightSiteEntry::Site {
                        position,
                        bit_positions,
                    } => (position, bit_positions.as_deref()),
                    WeightSiteEntry::Coords(position) => (position, None),
                };
                let bits = own_bits
                    .or(layer.bit_positions.as_deref())
                    .ok_or_else(|| ValidationError::MissingField("bit_positions".to_string()))?;
                spec.add_position(id, position, bits)?;
            }
        }
        spec.set_enabled(request.enabled);
        Ok(spec)
    }

    fn expect_domain(&self, domain: FaultDomain, operation: &'static str) -> Result<()> {
        if self.domain() != domain {
            return Err(SpecError::WrongDomain {
                operation,
                domain: self.domain().name(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Campaign requests
// ============================================================================

/// Settings shared by both campaign kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSettings {
    pub model_path: String,
    pub num_samples: u64,
    pub image_dir: String,
}

impl CampaignSettings {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.model_path.trim().is_empty() {
            return Err(ValidationError::EmptyField("model_path".to_string()));
        }
        if self.image_dir.trim().is_empty() {
            return Err(ValidationError::EmptyField("image_dir".to_string()));
        }
        if !(1..=MAX_CAMPAIGN_SAMPLES).contains(&self.num_samples) {
            return Err(ValidationError::SampleCountOutOfRange(self.num_samples));
        }
        Ok(())
    }
}

/// Activation fault campaign submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationCampaignRequest {
    #[serde(flatten)]
    pub settings: CampaignSettings,
    pub fault_config: ActivationFaultRequest,
}

impl ActivationCampaignRequest {
    pub fn new(settings: CampaignSettings, spec: &FaultSpec) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            fault_config: spec.to_activation_request()?,
            settings,
        })
    }
}

/// Weight fault campaign submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightCampaignRequest {
    #[serde(flatten)]
    pub settings: CampaignSettings,
    pub weight_fault_config: WeightFaultRequest,
}

impl WeightCampaignRequest {
    pub fn new(settings: CampaignSettings, spec: &FaultSpec) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            weight_fault_config: spec.to_weight_request()?,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::format_mask;
    use serde_json::json;

    fn settings(num_samples: u64) -> CampaignSettings {
        CampaignSettings {
            model_path: "models/lenet5.h5".to_string(),
            num_samples,
            image_dir: "images/mnist".to_string(),
        }
    }

    #[test]
    fn test_activation_payload_shape() {
        let mut spec = FaultSpec::activation();
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();
        spec.set_bits("conv2d_1", &[30, 2, 30, 5]).unwrap();
        spec.add_layer("dense_1", FaultKind::random_noise(0.2).unwrap()).unwrap();
        spec.set_enabled(true);

        let value = serde_json::to_value(spec.to_activation_request().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "enabled": true,
                "layers": {
                    "conv2d_1": {"fault_type": "bit_flip", "fault_rate": 0.01, "bit_positions": [2, 5, 30]},
                    "dense_1": {"fault_type": "random_noise", "fault_rate": 0.01, "parameters": {"std_dev": 0.2}}
                }
            })
        );
    }

    #[test]
    fn test_activation_request_replayed_through_mutators() {
        let request: ActivationFaultRequest = serde_json::from_value(json!({
            "enabled": true,
            "layers": {"conv2d_2": {"fault_type": "stuck_at_1", "fault_rate": 1.5}}
        }))
        .unwrap();
        assert!(matches!(
            FaultSpec::from_activation_request(&request),
            Err(SpecError::Validation(ValidationError::RateOutOfRange(_)))
        ));

        let request: ActivationFaultRequest = serde_json::from_value(json!({
            "enabled": true,
            "layers": {"conv2d_2": {"fault_type": "stuck_at_1", "bit_positions": [31, 0]}}
        }))
        .unwrap();
        let spec = FaultSpec::from_activation_request(&request).unwrap();
        let layer = spec.layer("conv2d_2").unwrap();
        assert_eq!(layer.kind(), FaultKind::StuckAt1);
        assert_eq!(layer.rate(), Some(DEFAULT_FAULT_RATE));
        assert_eq!(layer.bits().unwrap().len(), 2);
        assert!(spec.contributes_faults());
    }

    #[test]
    fn test_weight_payload_per_position() {
        let mut spec = FaultSpec::weight(LayerCatalog::lenet5());
        spec.add_layer("dense_3", FaultKind::BitFlip).unwrap();
        spec.add_position("dense_3", &[83, 9], &[31, 0]).unwrap();
        spec.set_enabled(true);

        let value = serde_json::to_value(spec.to_weight_request().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "enabled": true,
                "layers": {
                    "dense_3": {
                        "fault_type": "bit_flip",
                        "target_type": "kernel",
                        "positions": [{"position": [83, 9], "bit_positions": [0, 31]}]
                    }
                }
            })
        );
    }

    #[test]
    fn test_weight_flat_form_accepted() {
        let request: WeightFaultRequest = serde_json::from_value(json!({
            "enabled": true,
            "layers": {
                "conv2d_1": {"target_type": "bias", "positions": [[0], [5]], "bit_positions": [30]}
            }
        }))
        .unwrap();
        let spec = FaultSpec::from_weight_request(&request, LayerCatalog::lenet5()).unwrap();
        let layer = spec.layer("conv2d_1").unwrap();
        assert_eq!(layer.target(), Some(WeightTensor::Bias));
        assert_eq!(layer.sites().len(), 2);

        let out_of_bounds: WeightFaultRequest = serde_json::from_value(json!({
            "layers": {"conv2d_1": {"target_type": "bias", "positions": [[6]], "bit_positions": [0]}}
        }))
        .unwrap();
        assert!(matches!(
            FaultSpec::from_weight_request(&out_of_bounds, LayerCatalog::lenet5()),
            Err(SpecError::Validation(ValidationError::InvalidPosition { .. }))
        ));

        let no_bits: WeightFaultRequest = serde_json::from_value(json!({
            "layers": {"conv2d_1": {"positions": [[0, 0, 0, 0]]}}
        }))
        .unwrap();
        assert!(matches!(
            FaultSpec::from_weight_request(&no_bits, LayerCatalog::lenet5()),
            Err(SpecError::Validation(ValidationError::MissingField(field))) if field == "bit_positions"
        ));
    }

    #[test]
    fn test_weight_mixed_form_uses_layer_bits() {
        let request: WeightFaultRequest = serde_json::from_value(json!({
            "enabled": true,
            "layers": {
                "conv2d_1": {
                    "positions": [
                        {"position": [0, 0, 0, 0]},
                        {"position": [1, 1, 0, 2], "bit_positions": [3]},
                        {"position": [2, 2, 0, 1], "bit_positions": []}
                    ],
                    "bit_positions": [30]
                }
            }
        }))
        .unwrap();
        let spec = FaultSpec::from_weight_request(&request, LayerCatalog::lenet5()).unwrap();
        let sites = spec.layer("conv2d_1").unwrap().sites();
        assert_eq!(sites.len(), 3);
        assert_eq!(format_mask(&sites[0].bits), "[30]");
        assert_eq!(format_mask(&sites[1].bits), "[3]");
        assert!(sites[2].bits.is_empty());

        let no_bits: WeightFaultRequest = serde_json::from_value(json!({
            "layers": {"conv2d_1": {"positions": [{"position": [0, 0, 0, 0]}]}}
        }))
        .unwrap();
        assert!(matches!(
            FaultSpec::from_weight_request(&no_bits, LayerCatalog::lenet5()),
            Err(SpecError::Validation(ValidationError::MissingField(field))) if field == "bit_positions"
        ));
    }

    #[test]
    fn test_wrong_domain_conversion() {
        let spec = FaultSpec::activation();
        assert!(matches!(
            spec.to_weight_request(),
            Err(SpecError::WrongDomain { .. })
        ));
    }

    #[test]
    fn test_campaign_request() {
        let mut spec = FaultSpec::activation();
        spec.add_layer("conv2d_1", FaultKind::BitFlip).unwrap();

        assert!(matches!(
            ActivationCampaignRequest::new(settings(0), &spec),
            Err(SpecError::Validation(ValidationError::SampleCountOutOfRange(0)))
        ));
        assert!(ActivationCampaignRequest::new(settings(1001), &spec).is_err());

        let request = ActivationCampaignRequest::new(settings(1000), &spec).unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["num_samples"], 1000);
        assert_eq!(value["model_path"], "models/lenet5.h5");
        assert_eq!(value["fault_config"]["enabled"], false);

        assert!(WeightCampaignRequest::new(settings(10), &spec).is_err());
    }
}
