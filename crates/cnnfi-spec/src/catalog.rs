//! Layer and hardware register catalogs
//!
//! Weight faults are addressed by tensor position, so the spec needs each
//! layer's kernel and bias shapes. Hardware faults are addressed by register
//! name, so the hardware plan needs the list of synthesized registers.

use crate::bits::BitWidth;
use crate::error::{Result, SpecError, ValidationError};
use crate::position::TensorShape;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which weight tensor of a layer a fault targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightTensor {
    #[default]
    Kernel,
    Bias,
}

impl WeightTensor {
    pub fn name(&self) -> &'static str {
        match self {
            WeightTensor::Kernel => "kernel",
            WeightTensor::Bias => "bias",
        }
    }
}

impl fmt::Display for WeightTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Weight tensor shapes of one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerShapes {
    pub name: String,
    /// Layer type as reported by the model (e.g. `Conv2D`, `Dense`)
    pub layer_type: String,
    pub kernel: TensorShape,
    pub bias: TensorShape,
}

impl LayerShapes {
    pub fn new(
        name: &str,
        layer_type: &str,
        kernel: Vec<usize>,
        bias: Vec<usize>,
    ) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            name: name.to_string(),
            layer_type: layer_type.to_string(),
            kernel: TensorShape::new(kernel)?,
            bias: TensorShape::new(bias)?,
        })
    }

    pub fn shape(&self, tensor: WeightTensor) -> &TensorShape {
        match tensor {
            WeightTensor::Kernel => &self.kernel,
            WeightTensor::Bias => &self.bias,
        }
    }
}

/// Known layers of a model, in model order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCatalog {
    layers: IndexMap<String, LayerShapes>,
}

impl LayerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// LeNet-5 as trained on MNIST
    pub fn lenet5() -> Self {
        let layers = [
            ("conv2d_1", "Conv2D", vec![5, 5, 1, 6], vec![6]),
            ("conv2d_2", "Conv2D", vec![5, 5, 6, 16], vec![16]),
            ("dense_1", "Dense", vec![400, 120], vec![120]),
            ("dense_2", "Dense", vec![120, 84], vec![84]),
            ("dense_3", "Dense", vec![84, 10], vec![10]),
        ];
        let mut catalog = Self::new();
        for (name, layer_type, kernel, bias) in layers {
            catalog.layers.insert(
                name.to_string(),
                LayerShapes {
                    name: name.to_string(),
                    layer_type: layer_type.to_string(),
                    kernel: TensorShape::from_known(kernel),
                    bias: TensorShape::from_known(bias),
                },
            );
        }
        catalog
    }

    pub fn insert(&mut self, layer: LayerShapes) -> Result<()> {
        if self.layers.contains_key(&layer.name) {
            return Err(SpecError::DuplicateLayer(layer.name));
        }
        self.layers.insert(layer.name.clone(), layer);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LayerShapes> {
        self.layers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerShapes> {
        self.layers.values()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Width of hardware filter coefficient registers
pub const FILTER_WIDTH: BitWidth = BitWidth::Bits8;
/// Width of hardware bias registers
pub const BIAS_WIDTH: BitWidth = BitWidth::Bits16;

/// Kind of synthesized coefficient register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterKind {
    Filter,
    Bias,
}

impl RegisterKind {
    pub fn width(&self) -> BitWidth {
        match self {
            RegisterKind::Filter => FILTER_WIDTH,
            RegisterKind::Bias => BIAS_WIDTH,
        }
    }

    /// Payload field holding the register name
    pub fn name_field(&self) -> &'static str {
        match self {
            RegisterKind::Filter => "filter_name",
            RegisterKind::Bias => "bias_name",
        }
    }

    /// Fields a raw fault entry for this register kind must carry
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            RegisterKind::Filter => &["filter_name", "row", "col", "bit_position", "fault_type"],
            RegisterKind::Bias => &["bias_name", "bit_position", "fault_type"],
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterKind::Filter => write!(f, "filter register"),
            RegisterKind::Bias => write!(f, "bias register"),
        }
    }
}

/// One synthesized register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInfo {
    pub name: String,
    pub kind: RegisterKind,
    /// Filter matrix rows (filters only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    /// Filter matrix columns (filters only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<usize>,
    #[serde(default)]
    pub description: String,
}

/// Registers exposed by a synthesized layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCatalog {
    registers: IndexMap<String, RegisterInfo>,
}

impl RegisterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// First convolution layer of LeNet-5: six 5x5 filter maps and six biases
    pub fn conv1() -> Self {
        let mut catalog = Self::new();
        for i in 1..=6 {
            catalog.add(RegisterInfo {
                name: format!("FMAP_{}", i),
                kind: RegisterKind::Filter,
                rows: Some(5),
                cols: Some(5),
                description: format!("Filter map {} coefficients", i),
            });
        }
        for i in 1..=6 {
            catalog.add(RegisterInfo {
                name: format!("BIAS_VAL_{}", i),
                kind: RegisterKind::Bias,
                rows: None,
                cols: None,
                description: format!("Bias of filter map {}", i),
            });
        }
        catalog
    }

    /// Insert or replace a register
    pub fn add(&mut self, register: RegisterInfo) {
        self.registers.insert(register.name.clone(), register);
    }

    /// Look up a register of the given kind
    pub fn lookup(
        &self,
        name: &str,
        kind: RegisterKind,
    ) -> std::result::Result<&RegisterInfo, ValidationError> {
        self.registers
            .get(name)
            .filter(|r| r.kind == kind)
            .ok_or_else(|| ValidationError::UnknownRegister(name.to_string()))
    }

    pub fn of_kind(&self, kind: RegisterKind) -> impl Iterator<Item = &RegisterInfo> {
        self.registers.values().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}
