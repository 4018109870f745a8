//! Mensura Units - Quantities and registries
//!
//! Provides:
//! - `Registry` / `UnitRegistry`: unit definitions, parsing and conversion factors
//! - `Converter`: scale, origin-offset and logarithmic unit mappings
//! - `Quantity`: a magnitude tagged with units, with unit-aware arithmetic
//! - `Measurement`: a quantity with an error bar
//! - Element-wise operation policies for array magnitudes

mod config;
mod converter;
mod measurement;
mod parse;
mod policy;
mod quantity;
mod registry;

pub use config::{FormatOptions, RegistryConfig};
pub use converter::Converter;
pub use measurement::{ErrorBar, Measurement};
pub use parse::{parse_definition, parse_expression};
pub use policy::{policy, OpPolicy, OutputUnits, UnitPower};
pub use quantity::{Applied, Operand, Quantity, QuantityArg, Target};
pub use registry::{convert, Registry, UnitRegistry};

/// Re-export core types alongside the quantity API
pub mod prelude {
    pub use crate::{
        ErrorBar, FormatOptions, Measurement, Quantity, QuantityArg, Registry, RegistryConfig, Target,
        UnitRegistry,
    };
    pub use mensura_core::prelude::*;
}
