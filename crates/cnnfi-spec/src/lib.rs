//! CNN fault specification and validation
//!
//! This crate describes bit-level faults to inject into a convolutional
//! network, either in its activations, its weight tensors, or the fixed-point
//! coefficient registers of a synthesized layer. It validates positions and
//! bit indices, reconciles IEEE-754 (LSB-first) and hardware (MSB-first) bit
//! numbering, and builds the request payloads sent to the inference and
//! hardware simulation services.
//!
//! Nothing here injects faults; the crate only describes and checks them.

pub mod bits;
pub mod catalog;
pub mod error;
pub mod fault;
pub mod hardware;
pub mod position;
pub mod spec;
pub mod wire;

pub use bits::{
    bit_mask, classify_ieee754_bit, describe_mask, format_mask, to_hardware_bit, BitMask,
    BitPreset, BitWidth, FieldBreakdown, Ieee754Field,
};
pub use catalog::{
    LayerCatalog, LayerShapes, RegisterCatalog, RegisterInfo, RegisterKind, WeightTensor,
    BIAS_WIDTH, FILTER_WIDTH,
};
pub use error::{Result, SpecError, ValidationError};
pub use fault::{FaultKind, FaultType, DEFAULT_NOISE_STD_DEV};
pub use hardware::{
    BitNumbering, HardwareFaultEntry, HardwareFaultPlan, HardwareFaultRequest, HardwareTarget,
};
pub use position::{
    required_fields_present, validate_bits, validate_position, Position, TensorShape,
};
pub use spec::{
    FaultDomain, FaultSpec, LayerFaultConfig, LayerFaults, WeightFaultSite, DEFAULT_FAULT_RATE,
    DEFAULT_WEIGHT_BIT, SOFTWARE_WIDTH,
};
pub use wire::{
    ActivationCampaignRequest, ActivationFaultRequest, CampaignSettings, WeightCampaignRequest,
    WeightFaultRequest, MAX_CAMPAIGN_SAMPLES,
};
