//! cnnfi project manifest
//!
//! This crate handles parsing and validation of `cnnfi.toml` manifest files,
//! which describe the model's layer shapes, the synthesized hardware
//! registers, and default campaign settings.

pub mod error;
pub mod manifest;

pub use error::{ManifestError, Result};
pub use manifest::{
    AnalysisConfig, BiasRegister, CampaignConfig, FilterRegister, HardwareConfig, LayerConfig,
    Manifest, Project,
};

use std::path::Path;

/// Conventional manifest file name
pub const MANIFEST_FILE: &str = "cnnfi.toml";

/// Parse a manifest from a file path
pub fn from_path(path: impl AsRef<Path>) -> Result<Manifest> {
    let contents =
        std::fs::read_to_string(path.as_ref()).map_err(|e| ManifestError::Io(e.to_string()))?;
    from_str(&contents)
}

/// Parse a manifest from a string
pub fn from_str(s: &str) -> Result<Manifest> {
    toml::from_str(s).map_err(|e| ManifestError::Parse(e.to_string()))
}

/// Write a manifest to a file path
pub fn write_to(manifest: &Manifest, path: impl AsRef<Path>) -> Result<()> {
    let contents = manifest.to_toml_string()?;
    std::fs::write(path.as_ref(), contents).map_err(|e| ManifestError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_manifest_parse() {
        let toml = r#"
            [project]
            name = "lenet5"
        "#;

        let manifest = from_str(toml).unwrap();
        assert_eq!(manifest.project.name, "lenet5");
        assert_eq!(manifest.project.num_classes, 10);
        assert!(manifest.campaign.is_none());
        assert!(manifest.layers.is_empty());
    }

    #[test]
    fn test_manifest_with_campaign() {
        let toml = r#"
            [project]
            name = "lenet5"
            num_classes = 10

            [campaign]
            model_path = "models/lenet5.h5"
            image_dir = "images/mnist"
            num_samples = 250
        "#;

        let manifest = from_str(toml).unwrap();
        let settings = manifest.campaign_settings().unwrap();
        assert_eq!(settings.num_samples, 250);
        assert!(manifest.validate().is_ok());
    }
}
