//! Named element-wise operations on array magnitudes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bulk operation applied to every element (or reducing all elements) of an
/// array magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementwiseOp {
    // Trigonometric
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Arcsin,
    Arccos,
    Arctan,
    Arcsinh,
    Arccosh,
    Arctanh,
    Radians,
    Degrees,

    // Exponential and logarithmic
    Exp,
    Expm1,
    Log,
    Log10,
    Log2,
    Log1p,

    // Cumulative
    Cumsum,
    Cumprod,

    // Rounding and copies
    Ceil,
    Floor,
    Rint,
    Copy,
    Sign,

    // Reductions
    Sum,
    Mean,
    Max,
    Min,
    Ptp,
    Std,
    Var,
    Prod,
}

impl ElementwiseOp {
    /// Reductions collapse the array into a single element
    pub fn is_reduction(&self) -> bool {
        matches!(
            self,
            ElementwiseOp::Sum
                | ElementwiseOp::Mean
                | ElementwiseOp::Max
                | ElementwiseOp::Min
                | ElementwiseOp::Ptp
                | ElementwiseOp::Std
                | ElementwiseOp::Var
                | ElementwiseOp::Prod
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementwiseOp::Sin => "sin",
            ElementwiseOp::Cos => "cos",
            ElementwiseOp::Tan => "tan",
            ElementwiseOp::Sinh => "sinh",
            ElementwiseOp::Cosh => "cosh",
            ElementwiseOp::Tanh => "tanh",
            ElementwiseOp::Arcsin => "arcsin",
            ElementwiseOp::Arccos => "arccos",
            ElementwiseOp::Arctan => "arctan",
            ElementwiseOp::Arcsinh => "arcsinh",
            ElementwiseOp::Arccosh => "arccosh",
            ElementwiseOp::Arctanh => "arctanh",
            ElementwiseOp::Radians => "radians",
            ElementwiseOp::Degrees => "degrees",
            ElementwiseOp::Exp => "exp",
            ElementwiseOp::Expm1 => "expm1",
            ElementwiseOp::Log => "log",
            ElementwiseOp::Log10 => "log10",
            ElementwiseOp::Log2 => "log2",
            ElementwiseOp::Log1p => "log1p",
            ElementwiseOp::Cumsum => "cumsum",
            ElementwiseOp::Cumprod => "cumprod",
            ElementwiseOp::Ceil => "ceil",
            ElementwiseOp::Floor => "floor",
            ElementwiseOp::Rint => "rint",
            ElementwiseOp::Copy => "copy",
            ElementwiseOp::Sign => "sign",
            ElementwiseOp::Sum => "sum",
            ElementwiseOp::Mean => "mean",
            ElementwiseOp::Max => "max",
            ElementwiseOp::Min => "min",
            ElementwiseOp::Ptp => "ptp",
            ElementwiseOp::Std => "std",
            ElementwiseOp::Var => "var",
            ElementwiseOp::Prod => "prod",
        }
    }

    /// Element function for the non-cumulative maps
    pub(crate) fn scalar_fn(&self) -> Option<fn(f64) -> f64> {
        let f: fn(f64) -> f64 = match self {
            ElementwiseOp::Sin => f64::sin,
            ElementwiseOp::Cos => f64::cos,
            ElementwiseOp::Tan => f64::tan,
            ElementwiseOp::Sinh => f64::sinh,
            ElementwiseOp::Cosh => f64::cosh,
            ElementwiseOp::Tanh => f64::tanh,
            ElementwiseOp::Arcsin => f64::asin,
            ElementwiseOp::Arccos => f64::acos,
            ElementwiseOp::Arctan => f64::atan,
            ElementwiseOp::Arcsinh => f64::asinh,
            ElementwiseOp::Arccosh => f64::acosh,
            ElementwiseOp::Arctanh => f64::atanh,
            ElementwiseOp::Radians => f64::to_radians,
            ElementwiseOp::Degrees => f64::to_degrees,
            ElementwiseOp::Exp => f64::exp,
            ElementwiseOp::Expm1 => f64::exp_m1,
            ElementwiseOp::Log => f64::ln,
            ElementwiseOp::Log10 => f64::log10,
            ElementwiseOp::Log2 => f64::log2,
            ElementwiseOp::Log1p => f64::ln_1p,
            ElementwiseOp::Ceil => f64::ceil,
            ElementwiseOp::Floor => f64::floor,
            ElementwiseOp::Rint => round_half_even,
            ElementwiseOp::Copy => identity,
            ElementwiseOp::Sign => sign,
            _ => return None,
        };
        Some(f)
    }
}

fn identity(x: f64) -> f64 {
    x
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}

impl fmt::Display for ElementwiseOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reductions() {
        assert!(ElementwiseOp::Sum.is_reduction());
        assert!(ElementwiseOp::Var.is_reduction());
        assert!(!ElementwiseOp::Cumsum.is_reduction());
        assert!(ElementwiseOp::Sum.scalar_fn().is_none());
    }

    #[test]
    fn test_rint_rounds_half_to_even() {
        let rint = ElementwiseOp::Rint.scalar_fn().unwrap();
        assert_eq!(rint(2.5), 2.0);
        assert_eq!(rint(3.5), 4.0);
        assert_eq!(rint(-2.5), -2.0);
        assert_eq!(rint(1.4), 1.0);
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&ElementwiseOp::Arctan).unwrap();
        assert_eq!(json, "\"arctan\"");
        assert_eq!(ElementwiseOp::Log10.to_string(), "log10");
    }
}
