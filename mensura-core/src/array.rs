//! One-dimensional `f64` array magnitude
//!
//! Binary operations work element by element. A single-element operand
//! broadcasts against an array of any length; any other length mismatch is
//! a `ShapeMismatch`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::magnitude::{f64_ln, f64_powr, f64_round};
use crate::{ArrayMagnitude, ElementwiseOp, Exponent, Magnitude, Number, NumberError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Array {
    values: Vec<f64>,
}

impl Array {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn zip_with<F>(&self, rhs: &Self, f: F) -> Result<Self, NumberError>
    where
        F: Fn(f64, f64) -> Result<f64, NumberError>,
    {
        let values: Result<Vec<f64>, NumberError> = match (self.values.len(), rhs.values.len()) {
            (l, r) if l == r => self.values.iter().zip(&rhs.values).map(|(a, b)| f(*a, *b)).collect(),
            (_, 1) => self.values.iter().map(|a| f(*a, rhs.values[0])).collect(),
            (1, _) => rhs.values.iter().map(|b| f(self.values[0], *b)).collect(),
            (left, right) => return Err(NumberError::ShapeMismatch { left, right }),
        };
        values.map(Self::new)
    }

    fn map<F: FnMut(f64) -> f64>(&self, mut f: F) -> Self {
        Self::new(self.values.iter().map(|v| f(*v)).collect())
    }

    fn mean(&self) -> Result<f64, NumberError> {
        if self.values.is_empty() {
            return Err(NumberError::DomainError("mean of an empty array".to_string()));
        }
        Ok(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    fn variance(&self) -> Result<f64, NumberError> {
        let mean = self.mean()?;
        let sum_sq: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        Ok(sum_sq / self.values.len() as f64)
    }

    fn extreme(&self, pick: fn(f64, f64) -> f64, what: &str) -> Result<f64, NumberError> {
        self.values
            .iter()
            .copied()
            .reduce(pick)
            .ok_or_else(|| NumberError::DomainError(format!("{} of an empty array", what)))
    }
}

impl From<Vec<f64>> for Array {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v)?,
                None => write!(f, "{}", v)?,
            }
        }
        write!(f, "]")
    }
}

/// Ordered only when every element pair agrees on the same ordering
impl PartialOrd for Array {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.values.len() != other.values.len() {
            return None;
        }
        let mut result = Ordering::Equal;
        for (a, b) in self.values.iter().zip(&other.values) {
            match (a.partial_cmp(b)?, result) {
                (Ordering::Equal, _) => {}
                (ord, Ordering::Equal) => result = ord,
                (ord, current) if ord == current => {}
                _ => return None,
            }
        }
        Some(result)
    }
}

impl Magnitude for Array {
    fn kind() -> &'static str {
        "Array"
    }

    fn from_number(value: &Number) -> Self {
        Self::new(vec![f64::from_number(value)])
    }

    fn try_add(&self, rhs: &Self) -> Result<Self, NumberError> {
        self.zip_with(rhs, |a, b| Ok(a + b))
    }

    fn try_sub(&self, rhs: &Self) -> Result<Self, NumberError> {
        self.zip_with(rhs, |a, b| Ok(a - b))
    }

    fn try_mul(&self, rhs: &Self) -> Result<Self, NumberError> {
        self.zip_with(rhs, |a, b| Ok(a * b))
    }

    fn try_div(&self, rhs: &Self) -> Result<Self, NumberError> {
        self.zip_with(rhs, |a, b| a.try_div(&b))
    }

    fn try_floor_div(&self, rhs: &Self) -> Result<Self, NumberError> {
        self.zip_with(rhs, |a, b| a.try_floor_div(&b))
    }

    fn scale(&self, factor: &Number) -> Self {
        let factor = f64::from_number(factor);
        self.map(|v| v * factor)
    }

    fn powr(&self, exp: Exponent) -> Result<Self, NumberError> {
        let values: Result<Vec<f64>, NumberError> = self.values.iter().map(|v| f64_powr(*v, exp)).collect();
        values.map(Self::new)
    }

    fn try_exp(&self) -> Result<Self, NumberError> {
        Ok(self.map(f64::exp))
    }

    fn try_ln(&self) -> Result<Self, NumberError> {
        let values: Result<Vec<f64>, NumberError> = self.values.iter().map(|v| f64_ln(*v)).collect();
        values.map(Self::new)
    }

    fn abs(&self) -> Self {
        self.map(f64::abs)
    }

    fn neg(&self) -> Self {
        self.map(|v| -v)
    }

    fn round(&self, ndigits: i32) -> Self {
        self.map(|v| f64_round(v, ndigits))
    }

    fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

impl ArrayMagnitude for Array {
    type Elem = f64;

    fn size(&self) -> usize {
        self.values.len()
    }

    fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    fn set(&mut self, index: usize, value: f64) -> Result<(), NumberError> {
        let len = self.values.len();
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NumberError::ShapeMismatch { left: len, right: index + 1 }),
        }
    }

    fn elements(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn from_elements(elements: Vec<f64>) -> Self {
        Self::new(elements)
    }

    fn map_op(&self, op: ElementwiseOp) -> Result<Self, NumberError> {
        if let Some(f) = op.scalar_fn() {
            return Ok(self.map(f));
        }
        match op {
            ElementwiseOp::Cumsum => {
                let mut acc = 0.0;
                Ok(self.map(|v| {
                    acc += v;
                    acc
                }))
            }
            ElementwiseOp::Cumprod => {
                let mut acc = 1.0;
                Ok(self.map(|v| {
                    acc *= v;
                    acc
                }))
            }
            other => Err(NumberError::DomainError(format!("{} is a reduction", other))),
        }
    }

    fn reduce_op(&self, op: ElementwiseOp) -> Result<f64, NumberError> {
        match op {
            ElementwiseOp::Sum => Ok(self.values.iter().sum()),
            ElementwiseOp::Prod => Ok(self.values.iter().product()),
            ElementwiseOp::Mean => self.mean(),
            ElementwiseOp::Var => self.variance(),
            ElementwiseOp::Std => Ok(self.variance()?.sqrt()),
            ElementwiseOp::Max => self.extreme(f64::max, "max"),
            ElementwiseOp::Min => self.extreme(f64::min, "min"),
            ElementwiseOp::Ptp => Ok(self.extreme(f64::max, "ptp")? - self.extreme(f64::min, "ptp")?),
            other => Err(NumberError::DomainError(format!("{} is not a reduction", other))),
        }
    }

    fn clip(&self, min: Option<&f64>, max: Option<&f64>) -> Self {
        self.map(|v| {
            let v = min.map_or(v, |lo| v.max(*lo));
            max.map_or(v, |hi| v.min(*hi))
        })
    }

    fn searchsorted(&self, value: &f64) -> usize {
        self.values.partition_point(|v| v < value)
    }
}
