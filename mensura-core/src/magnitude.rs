//! Numeric capability traits for quantity magnitudes
//!
//! A quantity is generic over its magnitude. `Magnitude` is the scalar
//! capability set every magnitude provides; `ArrayMagnitude` adds element
//! access and bulk element-wise operations for array backends.

use std::fmt;

use tracing::warn;

use crate::{ElementwiseOp, Exponent, Number, NumberError, DEFAULT_PRECISION};

/// Arithmetic capability set of a quantity magnitude
pub trait Magnitude: Clone + fmt::Debug + fmt::Display + PartialEq + PartialOrd + Send + Sync + 'static {
    /// Short type name used in diagnostics
    fn kind() -> &'static str;

    /// Lift a registry number (parsed value or conversion factor)
    fn from_number(value: &Number) -> Self;

    fn try_add(&self, rhs: &Self) -> Result<Self, NumberError>;
    fn try_sub(&self, rhs: &Self) -> Result<Self, NumberError>;
    fn try_mul(&self, rhs: &Self) -> Result<Self, NumberError>;
    fn try_div(&self, rhs: &Self) -> Result<Self, NumberError>;
    fn try_floor_div(&self, rhs: &Self) -> Result<Self, NumberError>;

    /// Multiply by a conversion factor
    fn scale(&self, factor: &Number) -> Self;

    /// Raise to a rational power
    fn powr(&self, exp: Exponent) -> Result<Self, NumberError>;

    /// `e ** self`, used by logarithmic unit conversion
    fn try_exp(&self) -> Result<Self, NumberError>;
    fn try_ln(&self) -> Result<Self, NumberError>;

    fn abs(&self) -> Self;
    fn neg(&self) -> Self;
    fn round(&self, ndigits: i32) -> Self;

    /// True when every element is zero
    fn is_zero(&self) -> bool;
}

/// Magnitudes with indexable elements and bulk numeric operations
pub trait ArrayMagnitude: Magnitude {
    type Elem: Magnitude;

    /// Number of elements
    fn size(&self) -> usize;
    fn get(&self, index: usize) -> Option<Self::Elem>;
    fn set(&mut self, index: usize, value: Self::Elem) -> Result<(), NumberError>;
    fn elements(&self) -> Vec<Self::Elem>;
    fn from_elements(elements: Vec<Self::Elem>) -> Self;

    /// Apply a non-reducing operation element by element
    fn map_op(&self, op: ElementwiseOp) -> Result<Self, NumberError>;

    /// Collapse all elements with a reducing operation
    fn reduce_op(&self, op: ElementwiseOp) -> Result<Self::Elem, NumberError>;

    /// Limit every element to `[min, max]`
    fn clip(&self, min: Option<&Self::Elem>, max: Option<&Self::Elem>) -> Self;

    /// Insertion point keeping a sorted array sorted (left side)
    fn searchsorted(&self, value: &Self::Elem) -> usize;
}

fn checked_f64(value: f64, what: &str) -> Result<f64, NumberError> {
    if value.is_nan() {
        Err(NumberError::DomainError(format!("{} is undefined", what)))
    } else {
        Ok(value)
    }
}

pub(crate) fn f64_powr(base: f64, exp: Exponent) -> Result<f64, NumberError> {
    let result = match i32::try_from(*exp.numer()) {
        Ok(n) if exp.is_integer() => base.powi(n),
        _ => base.powf(*exp.numer() as f64 / *exp.denom() as f64),
    };
    checked_f64(result, &format!("{} ** {}", base, exp))
}

pub(crate) fn f64_ln(value: f64) -> Result<f64, NumberError> {
    if value <= 0.0 {
        return Err(NumberError::DomainError(format!("ln({}) is undefined", value)));
    }
    checked_f64(value.ln(), &format!("ln({})", value))
}

/// Round half away from zero to `ndigits` decimals (negative rounds to tens,
/// hundreds...). Values the scaling would overflow come back unchanged.
pub(crate) fn f64_round(value: f64, ndigits: i32) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    if ndigits < 0 {
        let step = 10_f64.powi(ndigits.saturating_neg());
        if !step.is_finite() {
            return 0.0_f64.copysign(value);
        }
        let rounded = (value / step).round() * step;
        return if rounded.is_finite() { rounded } else { value };
    }
    // An f64 carries at most 17 significant digits
    let exponent = value.abs().log10().floor() as i32;
    if ndigits > 17 - exponent {
        return value;
    }
    let scale = 10_f64.powi(ndigits);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

impl Magnitude for f64 {
    fn kind() -> &'static str {
        "f64"
    }

    fn from_number(value: &Number) -> Self {
        match value.to_f64() {
            Some(v) => v,
            None => {
                warn!("Number {} has no f64 representation, using NaN", value);
                f64::NAN
            }
        }
    }

    fn try_add(&self, rhs: &Self) -> Result<Self, NumberError> {
        Ok(self + rhs)
    }

    fn try_sub(&self, rhs: &Self) -> Result<Self, NumberError> {
        Ok(self - rhs)
    }

    fn try_mul(&self, rhs: &Self) -> Result<Self, NumberError> {
        Ok(self * rhs)
    }

    fn try_div(&self, rhs: &Self) -> Result<Self, NumberError> {
        if *rhs == 0.0 {
            Err(NumberError::DivisionByZero)
        } else {
            Ok(self / rhs)
        }
    }

    fn try_floor_div(&self, rhs: &Self) -> Result<Self, NumberError> {
        Ok(self.try_div(rhs)?.floor())
    }

    fn scale(&self, factor: &Number) -> Self {
        self * f64::from_number(factor)
    }

    fn powr(&self, exp: Exponent) -> Result<Self, NumberError> {
        f64_powr(*self, exp)
    }

    fn try_exp(&self) -> Result<Self, NumberError> {
        Ok(f64::exp(*self))
    }

    fn try_ln(&self) -> Result<Self, NumberError> {
        f64_ln(*self)
    }

    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    fn neg(&self) -> Self {
        -*self
    }

    fn round(&self, ndigits: i32) -> Self {
        f64_round(*self, ndigits)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Magnitude for Number {
    fn kind() -> &'static str {
        "Number"
    }

    fn from_number(value: &Number) -> Self {
        value.clone()
    }

    fn try_add(&self, rhs: &Self) -> Result<Self, NumberError> {
        Ok(Number::add(self, rhs))
    }

    fn try_sub(&self, rhs: &Self) -> Result<Self, NumberError> {
        Ok(Number::sub(self, rhs))
    }

    fn try_mul(&self, rhs: &Self) -> Result<Self, NumberError> {
        Ok(Number::mul(self, rhs))
    }

    fn try_div(&self, rhs: &Self) -> Result<Self, NumberError> {
        self.checked_div(rhs)
    }

    fn try_floor_div(&self, rhs: &Self) -> Result<Self, NumberError> {
        Number::floor_div(self, rhs)
    }

    fn scale(&self, factor: &Number) -> Self {
        Number::mul(self, factor)
    }

    fn powr(&self, exp: Exponent) -> Result<Self, NumberError> {
        Number::powr(self, exp, DEFAULT_PRECISION)
    }

    fn try_exp(&self) -> Result<Self, NumberError> {
        Ok(Number::exp(self, DEFAULT_PRECISION))
    }

    fn try_ln(&self) -> Result<Self, NumberError> {
        Number::ln(self, DEFAULT_PRECISION)
    }

    fn abs(&self) -> Self {
        Number::abs(self)
    }

    fn neg(&self) -> Self {
        Number::neg(self)
    }

    fn round(&self, ndigits: i32) -> Self {
        Number::round(self, ndigits)
    }

    fn is_zero(&self) -> bool {
        Number::is_zero(self)
    }
}
