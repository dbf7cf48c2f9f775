//! Manifest structure definitions

use crate::error::{ManifestError, Result};
use cnnfi_spec::{
    CampaignSettings, LayerCatalog, LayerShapes, RegisterCatalog, RegisterInfo, RegisterKind,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Complete manifest for a fault injection project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Project metadata
    pub project: Project,

    /// Default campaign settings
    #[serde(default)]
    pub campaign: Option<CampaignConfig>,

    /// Weight tensor shapes of the model (LeNet-5 when empty)
    #[serde(default)]
    pub layers: Vec<LayerConfig>,

    /// Registers of the synthesized layer (first LeNet-5 convolution when absent)
    #[serde(default)]
    pub hardware: Option<HardwareConfig>,

    /// Analysis options
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Project metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Number of output classes of the model
    #[serde(default = "default_num_classes")]
    pub num_classes: u32,
}

fn default_num_classes() -> u32 {
    10
}

/// Campaign settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Trained model, as seen by the inference service
    pub model_path: String,

    /// Test image directory, as seen by the inference service
    pub image_dir: String,

    #[serde(default = "default_num_samples")]
    pub num_samples: u64,
}

fn default_num_samples() -> u64 {
    100
}

/// One model layer and its weight tensor shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,

    #[serde(rename = "type", default)]
    pub layer_type: String,

    pub kernel: Vec<usize>,

    pub bias: Vec<usize>,
}

/// Synthesized coefficient registers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub filters: Vec<FilterRegister>,

    #[serde(default)]
    pub biases: Vec<BiasRegister>,
}

/// Filter coefficient matrix register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRegister {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub description: String,
}

/// Bias register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasRegister {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Analysis options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Count-type metric keys left out of the degradation table. Built-in
    /// exclusions apply when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_metrics: Option<Vec<String>>,
}

impl Manifest {
    /// LeNet-5 on MNIST with the built-in catalogs spelled out
    pub fn default_lenet5() -> Self {
        let layers = LayerCatalog::lenet5()
            .iter()
            .map(|layer| LayerConfig {
                name: layer.name.clone(),
                layer_type: layer.layer_type.clone(),
                kernel: layer.kernel.dims().to_vec(),
                bias: layer.bias.dims().to_vec(),
            })
            .collect();

        let registers = RegisterCatalog::conv1();
        let hardware = HardwareConfig {
            filters: registers
                .of_kind(RegisterKind::Filter)
                .map(|r| FilterRegister {
                    name: r.name.clone(),
                    rows: r.rows.unwrap_or(0),
                    cols: r.cols.unwrap_or(0),
                    description: r.description.clone(),
                })
                .collect(),
            biases: registers
                .of_kind(RegisterKind::Bias)
                .map(|r| BiasRegister {
                    name: r.name.clone(),
                    description: r.description.clone(),
                })
                .collect(),
        };

        Self {
            project: Project {
                name: "lenet5-mnist".to_string(),
                description: Some("LeNet-5 trained on MNIST".to_string()),
                num_classes: default_num_classes(),
            },
            campaign: Some(CampaignConfig {
                model_path: "models/lenet5.h5".to_string(),
                image_dir: "images/mnist".to_string(),
                num_samples: default_num_samples(),
            }),
            layers,
            hardware: Some(hardware),
            analysis: AnalysisConfig::default(),
        }
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ManifestError::Serialize(e.to_string()))
    }

    /// Validate the manifest
    pub fn validate(&self) -> Result<()> {
        self.validate_project()?;
        self.validate_campaign()?;
        self.layer_catalog()?;
        self.register_catalog()?;
        Ok(())
    }

    /// Layer catalog described by `[[layers]]`
    pub fn layer_catalog(&self) -> Result<LayerCatalog> {
        if self.layers.is_empty() {
            return Ok(LayerCatalog::lenet5());
        }

        let mut catalog = LayerCatalog::new();
        for layer in &self.layers {
            if layer.name.trim().is_empty() {
                return Err(ManifestError::InvalidLayer(
                    layer.name.clone(),
                    "Layer name cannot be empty".to_string(),
                ));
            }
            let shapes = LayerShapes::new(
                &layer.name,
                &layer.layer_type,
                layer.kernel.clone(),
                layer.bias.clone(),
            )
            .map_err(|e| ManifestError::InvalidLayer(layer.name.clone(), e.to_string()))?;
            catalog
                .insert(shapes)
                .map_err(|e| ManifestError::InvalidLayer(layer.name.clone(), e.to_string()))?;
        }
        Ok(catalog)
    }

    /// Register catalog described by `[hardware]`
    pub fn register_catalog(&self) -> Result<RegisterCatalog> {
        let Some(hardware) = &self.hardware else {
            return Ok(RegisterCatalog::conv1());
        };

        let mut catalog = RegisterCatalog::new();
        let mut seen = HashSet::new();
        let registers = hardware
            .filters
            .iter()
            .map(|f| (&f.name, RegisterKind::Filter, Some((f.rows, f.cols)), &f.description))
            .chain(
                hardware
                    .biases
                    .iter()
                    .map(|b| (&b.name, RegisterKind::Bias, None, &b.description)),
            );

        for (name, kind, dims, description) in registers {
            if name.trim().is_empty() {
                return Err(ManifestError::InvalidRegister(
                    name.clone(),
                    "Register name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ManifestError::InvalidRegister(
                    name.clone(),
                    "Register declared more than once".to_string(),
                ));
            }
            if let Some((rows, cols)) = dims {
                if rows == 0 || cols == 0 {
                    return Err(ManifestError::InvalidRegister(
                        name.clone(),
                        "Filter dimensions must be positive".to_string(),
                    ));
                }
            }
            catalog.add(RegisterInfo {
                name: name.clone(),
                kind,
                rows: dims.map(|(rows, _)| rows),
                cols: dims.map(|(_, cols)| cols),
                description: description.clone(),
            });
        }
        Ok(catalog)
    }

    /// Campaign settings, if a `[campaign]` table is present
    pub fn campaign_settings(&self) -> Option<CampaignSettings> {
        self.campaign.as_ref().map(|c| CampaignSettings {
            model_path: c.model_path.clone(),
            num_samples: c.num_samples,
            image_dir: c.image_dir.clone(),
        })
    }

    /// Validate project name and class count
    fn validate_project(&self) -> Result<()> {
        let name = &self.project.name;

        let Some(first) = name.chars().next() else {
            return Err(ManifestError::InvalidProjectName(
                "Project name cannot be empty".to_string(),
            ));
        };

        if !first.is_alphabetic() {
            return Err(ManifestError::InvalidProjectName(
                "Project name must start with a letter".to_string(),
            ));
        }

        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ManifestError::InvalidProjectName(
                "Project name can only contain letters, numbers, dashes, and underscores"
                    .to_string(),
            ));
        }

        if self.project.num_classes == 0 {
            return Err(ManifestError::Validation(
                "num_classes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_campaign(&self) -> Result<()> {
        if let Some(settings) = self.campaign_settings() {
            settings
                .validate()
                .map_err(|e| ManifestError::Validation(format!("[campaign] {}", e)))?;
        }
        Ok(())
    }
}
