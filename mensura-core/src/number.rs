//! Arbitrary precision numbers using dashu
//!
//! Conversion factors between units are carried as `DBig` decimals so that
//! chained prefixes (kilo, milli, micro, ...) and exact definitions such as
//! `0.3048 meter` do not pick up binary rounding on the way.

use dashu_float::DBig;
use dashu_float::ops::Abs;
use dashu_int::IBig;
use dashu_int::ops::BitTest;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

use crate::Exponent;

/// Error type for number operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumberError {
    #[error("Invalid number format: {0}")]
    ParseError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Shape mismatch: {left} elements against {right}")]
    ShapeMismatch { left: usize, right: usize },
}

/// Default precision for calculations (decimal digits)
pub const DEFAULT_PRECISION: usize = 50;

/// Arbitrary precision decimal number
#[derive(Debug, Clone)]
pub struct Number {
    inner: DBig,
}

impl Number {
    // ========== Construction ==========

    fn with_work_precision(val: DBig) -> DBig {
        val.with_precision(DEFAULT_PRECISION).value()
    }

    /// Build `mantissa * 10^exponent` where the mantissa may contain a
    /// decimal point ("1.5", "-42").
    fn from_scientific(mantissa: &str, exponent: isize, original: &str) -> Result<Self, NumberError> {
        let mantissa = mantissa.trim_start_matches('+');
        let (digits, shift) = match mantissa.split_once('.') {
            Some((int_part, frac_part)) => (format!("{}{}", int_part, frac_part), frac_part.len() as isize),
            None => (mantissa.to_string(), 0),
        };
        let significand: IBig = digits.parse()
            .map_err(|_| NumberError::ParseError(original.to_string()))?;
        let value = DBig::from_parts(significand, exponent - shift);
        Ok(Self { inner: Self::with_work_precision(value) })
    }

    /// Create from string representation
    /// Supports: "123", "3.14", "1/3", "1.5e10", "-42"
    pub fn from_str(s: &str) -> Result<Self, NumberError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(NumberError::ParseError(s.to_string()));
        }

        // Rational format "a/b"
        if let Some((num_str, den_str)) = s.split_once('/') {
            let num = Self::from_str(num_str)?;
            let den = Self::from_str(den_str)?;
            return num.checked_div(&den);
        }

        // Scientific notation: "602214076e15", "1.5E-3"
        let lower = s.to_lowercase();
        if let Some((mantissa, exp_str)) = lower.split_once('e') {
            let exponent: isize = exp_str.parse()
                .map_err(|_| NumberError::ParseError(s.to_string()))?;
            return Self::from_scientific(mantissa, exponent, s);
        }

        Self::from_scientific(s, 0, s)
    }

    /// Create from i64 with working precision
    pub fn from_i64(n: i64) -> Self {
        Self { inner: Self::with_work_precision(DBig::from(n)) }
    }

    /// Create from ratio (exact division)
    pub fn from_ratio(num: i64, den: i64) -> Result<Self, NumberError> {
        Self::from_i64(num).checked_div(&Self::from_i64(den))
    }

    /// Create from a rational exponent
    pub fn from_exponent(exp: Exponent) -> Self {
        // Rational64 keeps a non-zero denominator
        Self::from_i64(*exp.numer())
            .checked_div(&Self::from_i64(*exp.denom()))
            .unwrap_or_else(|_| Self::from_i64(0))
    }

    /// Create from f64, keeping the shortest round-trip decimal digits.
    pub fn from_f64(f: f64) -> Result<Self, NumberError> {
        if !f.is_finite() {
            return Err(NumberError::DomainError(format!("non-finite value {}", f)));
        }
        // `{:e}` yields the shortest representation, e.g. "1.5e-20"
        let repr = format!("{:e}", f);
        Self::from_str(&repr)
    }

    pub fn zero() -> Self {
        Self::from_i64(0)
    }

    pub fn one() -> Self {
        Self::from_i64(1)
    }

    /// Re-round to the given number of significant decimal digits
    pub fn with_precision(&self, precision: usize) -> Self {
        Self { inner: self.inner.clone().with_precision(precision.max(1)).value() }
    }

    // ========== Predicates ==========

    pub fn is_zero(&self) -> bool {
        self.inner == DBig::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.inner < DBig::ZERO
    }

    pub fn is_integer(&self) -> bool {
        let floor_val = self.inner.clone().floor();
        self.inner == floor_val
    }

    // ========== Arithmetic ==========

    pub fn add(&self, other: &Self) -> Self {
        Self { inner: &self.inner + &other.inner }
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self { inner: &self.inner - &other.inner }
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self { inner: &self.inner * &other.inner }
    }

    /// Safe division (returns Result, never panics)
    pub fn checked_div(&self, other: &Self) -> Result<Self, NumberError> {
        if other.is_zero() {
            Err(NumberError::DivisionByZero)
        } else {
            Ok(Self { inner: &self.inner / &other.inner })
        }
    }

    /// Division rounded towards negative infinity
    pub fn floor_div(&self, other: &Self) -> Result<Self, NumberError> {
        Ok(self.checked_div(other)?.floor())
    }

    pub fn neg(&self) -> Self {
        Self { inner: -&self.inner }
    }

    /// Integer power by repeated squaring
    pub fn pow(&self, exp: i32) -> Result<Self, NumberError> {
        let mut base = self.clone();
        let mut remaining = exp.unsigned_abs();
        let mut result = Self::one();
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = result.mul(&base);
            }
            base = base.mul(&base);
            remaining >>= 1;
        }

        if exp < 0 {
            Self::one().checked_div(&result)
        } else {
            Ok(result)
        }
    }

    /// Rational power: exact for integral exponents, `exp(y * ln(x))` otherwise
    pub fn powr(&self, exp: Exponent, precision: usize) -> Result<Self, NumberError> {
        if exp.is_integer() {
            if let Ok(e) = i32::try_from(*exp.numer()) {
                return self.pow(e);
            }
        }
        if self.is_zero() {
            return if *exp.numer() > 0 {
                Ok(Self::zero())
            } else {
                Err(NumberError::DivisionByZero)
            };
        }
        if self.is_negative() {
            return Err(NumberError::DomainError(format!(
                "{} raised to the non-integral power {}", self, exp
            )));
        }

        let ln_x = self.inner.clone().with_precision(precision).value().ln();
        let product = &ln_x * &Self::from_exponent(exp).inner;
        Ok(Self { inner: product.exp() })
    }

    /// Natural logarithm, defined for positive values
    pub fn ln(&self, precision: usize) -> Result<Self, NumberError> {
        if self.is_zero() || self.is_negative() {
            return Err(NumberError::DomainError(format!("ln({}) is undefined", self)));
        }
        Ok(Self { inner: self.inner.clone().with_precision(precision).value().ln() })
    }

    pub fn exp(&self, precision: usize) -> Self {
        Self { inner: self.inner.clone().with_precision(precision).value().exp() }
    }

    pub fn abs(&self) -> Self {
        Self { inner: Abs::abs(self.inner.clone()) }
    }

    /// Largest integer <= x
    pub fn floor(&self) -> Self {
        Self { inner: self.inner.clone().floor() }
    }

    /// Round half away from zero to `ndigits` decimal places
    pub fn round(&self, ndigits: i32) -> Self {
        let scale = match Self::from_i64(10).pow(ndigits) {
            Ok(scale) => scale,
            Err(_) => return self.clone(),
        };
        let half = Self { inner: Self::with_work_precision(DBig::from_parts(IBig::from(5), -1)) };
        let shifted = self.abs().mul(&scale).add(&half).floor();
        let magnitude = shifted.checked_div(&scale).unwrap_or_else(|_| self.abs());
        if self.is_negative() {
            magnitude.neg()
        } else {
            magnitude
        }
    }

    // ========== Conversion ==========

    /// Convert to f64 (may lose precision)
    pub fn to_f64(&self) -> Option<f64> {
        // significand * 10^exponent
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();

        let sig_f64: f64 = if significand.bit_len() <= 53 {
            let value: i64 = significand.try_into().ok()?;
            value as f64
        } else {
            // Shift right to fit in 53 bits, accounting for the dropped bits
            let extra_bits = significand.bit_len() - 53;
            let shifted = &significand >> extra_bits;
            let shifted_i64: i64 = shifted.try_into().ok()?;
            shifted_i64 as f64 * 2_f64.powi(extra_bits as i32)
        };

        let result = if exponent == 0 {
            sig_f64
        } else if exponent > 0 && exponent <= 308 {
            sig_f64 * 10_f64.powi(exponent as i32)
        } else if exponent < 0 && exponent >= -308 {
            sig_f64 / 10_f64.powi((-exponent) as i32)
        } else {
            return None;
        };

        if result.is_finite() {
            Some(result)
        } else {
            None
        }
    }
}

// ========== Trait Implementations ==========

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.to_f64(), f.precision()) {
            (Some(v), Some(p)) => write!(f, "{:.*}", p, v),
            (Some(v), None) => write!(f, "{}", v),
            (None, _) => write!(f, "{}", self.inner),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.partial_cmp(&other.inner).unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_forms() {
        assert_eq!(Number::from_str("123").unwrap(), Number::from_i64(123));
        assert_eq!(Number::from_str("1.5e2").unwrap(), Number::from_i64(150));
        let avogadro = Number::from_str("602214076e15").unwrap();
        let expanded = Number::from_str("602214076000000000000000").unwrap();
        assert_eq!(avogadro.cmp(&expanded), Ordering::Equal);
        assert_eq!(Number::from_str("-42").unwrap(), Number::from_i64(-42));
        assert!(Number::from_str("abc").is_err());
        assert!(Number::from_str("").is_err());
    }

    #[test]
    fn test_from_str_fraction() {
        let third = Number::from_str("1/3").unwrap();
        assert!(!third.is_integer());
        assert_eq!(Number::from_str("1/0"), Err(NumberError::DivisionByZero));
    }

    #[test]
    fn test_from_f64_keeps_small_values() {
        let tiny = Number::from_f64(1.5e-20).unwrap();
        assert!(!tiny.is_zero());
        let back = tiny.to_f64().unwrap();
        assert!((back - 1.5e-20).abs() < 1e-30);
        assert!(Number::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn test_pow() {
        let two = Number::from_i64(2);
        assert_eq!(two.pow(10).unwrap(), Number::from_i64(1024));
        assert_eq!(two.pow(0).unwrap(), Number::one());
        assert_eq!(two.pow(-2).unwrap().to_f64(), Some(0.25));
        assert_eq!(Number::zero().pow(-1), Err(NumberError::DivisionByZero));
    }

    #[test]
    fn test_powr_fractional() {
        let four = Number::from_i64(4);
        let root = four.powr(Exponent::new(1, 2), DEFAULT_PRECISION).unwrap();
        assert!((root.to_f64().unwrap() - 2.0).abs() < 1e-12);
        assert!(Number::from_i64(-4).powr(Exponent::new(1, 2), DEFAULT_PRECISION).is_err());
    }

    #[test]
    fn test_round_and_floor_div() {
        let x = Number::from_str("2.345").unwrap();
        assert_eq!(x.round(2), Number::from_str("2.35").unwrap());
        assert_eq!(x.neg().round(1), Number::from_str("-2.3").unwrap());
        let seven = Number::from_i64(7);
        assert_eq!(seven.floor_div(&Number::from_i64(2)).unwrap(), Number::from_i64(3));
        assert_eq!(seven.neg().floor_div(&Number::from_i64(2)).unwrap(), Number::from_i64(-4));
    }

    #[test]
    fn test_display_precision() {
        let x = Number::from_str("0.3048").unwrap();
        assert_eq!(format!("{}", x), "0.3048");
        assert_eq!(format!("{:.2}", x), "0.30");
    }

    #[test]
    fn test_serde_round_trip() {
        let x = Number::from_str("1609.344").unwrap();
        let json = serde_json::to_string(&x).unwrap();
        assert_eq!(json, "\"1609.344\"");
        let back: Number = serde_json::from_str(&json).unwrap();
        assert_eq!(back, x);
    }
}
