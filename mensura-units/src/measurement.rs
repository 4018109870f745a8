//! Measurements - a quantity paired with its uncertainty

use std::fmt;

use mensura_core::{Magnitude, Result, UnitError};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::quantity::Quantity;

/// Error bar given to `Quantity::plus_minus`
#[derive(Debug, Clone)]
pub enum ErrorBar<M: Magnitude> {
    /// Error with its own units, converted into the value's units
    Absolute(Quantity<M>),
    /// Bare magnitude: in the value's units, or a fraction of it when relative
    Magnitude(M),
}

impl<M: Magnitude> From<Quantity<M>> for ErrorBar<M> {
    fn from(error: Quantity<M>) -> Self {
        ErrorBar::Absolute(error)
    }
}

/// Value and absolute error, both in the value's units
#[derive(Debug, Clone)]
pub struct Measurement<M: Magnitude = f64> {
    value: Quantity<M>,
    error: Quantity<M>,
}

impl<M: Magnitude> Measurement<M> {
    /// Pair `value` with `error`, expressing the error in the value's units.
    ///
    /// A negative error (any negative element, for arrays) is rejected.
    pub fn new(value: Quantity<M>, error: Quantity<M>) -> Result<Self> {
        let error = error.to(&value)?;
        if error.magnitude().abs() != *error.magnitude() {
            return Err(UnitError::InvalidArgument(
                "The magnitude of the error cannot be negative".to_string(),
            ));
        }
        Ok(Self { value, error })
    }

    pub fn value(&self) -> &Quantity<M> {
        &self.value
    }

    pub fn error(&self) -> &Quantity<M> {
        &self.error
    }

    /// Error as a fraction of the value's magnitude
    pub fn relative_error(&self) -> Result<M> {
        Ok(self.error.magnitude().try_div(&self.value.magnitude().abs())?)
    }
}

impl<M: Magnitude> fmt::Display for Measurement<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(
                f,
                "({:.*} +/- {:.*}) {}",
                p,
                self.value.magnitude(),
                p,
                self.error.magnitude(),
                self.value.units()
            ),
            None => write!(
                f,
                "({} +/- {}) {}",
                self.value.magnitude(),
                self.error.magnitude(),
                self.value.units()
            ),
        }
    }
}

impl<M: Magnitude + Serialize> Serialize for Measurement<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Measurement", 2)?;
        state.serialize_field("value", &self.value)?;
        state.serialize_field("error", &self.error)?;
        state.end()
    }
}

impl<M: Magnitude> Quantity<M> {
    /// Attach an error bar.
    ///
    /// A relative error must be a bare fraction; it is scaled by `|self|`.
    pub fn plus_minus(&self, error: ErrorBar<M>, relative: bool) -> Result<Measurement<M>> {
        let error = match (error, relative) {
            (ErrorBar::Absolute(error), true) => {
                return Err(UnitError::InvalidArgument(format!("{} is not a valid relative error", error)));
            }
            (ErrorBar::Absolute(error), false) => error,
            (ErrorBar::Magnitude(fraction), true) => self.abs().mul_magnitude(&fraction)?,
            (ErrorBar::Magnitude(error), false) => Quantity::new(self.registry().clone(), error, self.units().clone()),
        };
        Measurement::new(self.clone(), error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_registry;

    fn q(magnitude: f64, units: &str) -> Quantity {
        Quantity::with_units(test_registry(), magnitude, units).unwrap()
    }

    #[test]
    fn test_absolute_quantity_error_is_converted() {
        let m = q(2.0, "kilometer").plus_minus(q(50.0, "meter").into(), false).unwrap();
        assert!((m.error().magnitude() - 0.05).abs() < 1e-12);
        assert_eq!(m.error().units(), m.value().units());
    }

    #[test]
    fn test_magnitude_error_takes_value_units() {
        let m = q(9.81, "meter / second ** 2").plus_minus(ErrorBar::Magnitude(0.02), false).unwrap();
        assert_eq!(*m.error().magnitude(), 0.02);
        assert_eq!(m.error().units(), m.value().units());
        assert_eq!(m.to_string(), "(9.81 +/- 0.02) meter / second ** 2");
    }

    #[test]
    fn test_relative_error() {
        let m = q(-200.0, "second").plus_minus(ErrorBar::Magnitude(0.01), true).unwrap();
        assert_eq!(*m.error().magnitude(), 2.0);
        assert_eq!(m.relative_error().unwrap(), 0.01);
    }

    #[test]
    fn test_relative_quantity_is_invalid() {
        let err = q(1.0, "meter").plus_minus(q(0.1, "meter").into(), true).unwrap_err();
        assert_eq!(err.code(), mensura_core::codes::INVALID_ARGUMENT);
    }

    #[test]
    fn test_negative_error_is_rejected() {
        let err = q(1.0, "meter").plus_minus(ErrorBar::Magnitude(-0.1), false).unwrap_err();
        assert_eq!(err.code(), mensura_core::codes::INVALID_ARGUMENT);
        assert!(Measurement::new(q(1.0, "meter"), q(-5.0, "foot")).is_err());
        // Relative errors scale |value|, so a negative value is fine
        assert!(q(-1.0, "meter").plus_minus(ErrorBar::Magnitude(0.1), true).is_ok());
    }

    #[test]
    fn test_incompatible_error_units() {
        let err = q(1.0, "meter").plus_minus(q(0.1, "second").into(), false).unwrap_err();
        assert!(err.is_dimensionality());
    }
}
