//! Mensura Core - Fundamental types
//!
//! This crate provides the core types used throughout Mensura:
//! - `Number`: Arbitrary precision decimal conversion factors
//! - `UnitsContainer`: Exponent vectors over unit (or dimension) names
//! - `Magnitude` / `ArrayMagnitude`: Numeric capability traits for quantity payloads
//! - `Array`: One-dimensional `f64` array magnitude
//! - `UnitError`: Structured errors with machine-readable codes

mod array;
mod container;
mod error;
mod magnitude;
mod number;
mod ops;

pub use array::Array;
pub use container::{Exponent, IntoExponent, UnitsContainer};
pub use error::{codes, UnitError};
pub use magnitude::{ArrayMagnitude, Magnitude};
pub use number::{Number, NumberError, DEFAULT_PRECISION};
pub use ops::ElementwiseOp;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, UnitError>;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Array, ArrayMagnitude, ElementwiseOp, Exponent, Magnitude, Number, UnitError, UnitsContainer};
    pub use crate::error::codes;
}
