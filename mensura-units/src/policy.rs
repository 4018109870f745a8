//! Unit policies for element-wise operations
//!
//! Each `ElementwiseOp` carries an optional input-unit requirement (the
//! quantity is converted before the operation runs) and a rule for the
//! units of the result.

use mensura_core::ElementwiseOp;

/// Exponent applied to the input units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPower {
    Fixed(i64),
    /// Raised to the element count (product of all elements)
    Size,
}

/// Units attached to the result of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputUnits {
    /// Fixed unit expression; "" is dimensionless
    Set(&'static str),
    /// Same units as the (possibly converted) input
    Copy,
    /// Input units raised to a power
    Power(UnitPower),
    /// Plain magnitude, no units attached
    Bare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpPolicy {
    /// Units the input is converted to first; "" is dimensionless
    pub require: Option<&'static str>,
    pub output: OutputUnits,
}

impl OpPolicy {
    const fn new(require: Option<&'static str>, output: OutputUnits) -> Self {
        Self { require, output }
    }
}

/// Policy for `op`
pub fn policy(op: ElementwiseOp) -> OpPolicy {
    use ElementwiseOp::*;

    match op {
        Sin | Cos | Tan | Sinh | Cosh | Tanh => OpPolicy::new(Some("radian"), OutputUnits::Set("")),
        Arcsin | Arccos | Arctan | Arcsinh | Arccosh | Arctanh => {
            OpPolicy::new(Some(""), OutputUnits::Set("radian"))
        }
        Radians => OpPolicy::new(Some("degree"), OutputUnits::Set("radian")),
        Degrees => OpPolicy::new(Some("radian"), OutputUnits::Set("degree")),

        Expm1 | Cumprod => OpPolicy::new(Some(""), OutputUnits::Set("")),
        Exp | Log | Log10 | Log2 | Log1p => OpPolicy::new(Some(""), OutputUnits::Bare),

        Copy | Cumsum | Ceil | Floor | Rint => OpPolicy::new(None, OutputUnits::Copy),
        Sum | Mean | Max | Min | Ptp | Std => OpPolicy::new(None, OutputUnits::Copy),
        Var => OpPolicy::new(None, OutputUnits::Power(UnitPower::Fixed(2))),
        Prod => OpPolicy::new(None, OutputUnits::Power(UnitPower::Size)),

        Sign => OpPolicy::new(None, OutputUnits::Bare),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigonometric_policies() {
        assert_eq!(policy(ElementwiseOp::Sin).require, Some("radian"));
        assert_eq!(policy(ElementwiseOp::Sin).output, OutputUnits::Set(""));
        assert_eq!(policy(ElementwiseOp::Arctan).require, Some(""));
        assert_eq!(policy(ElementwiseOp::Arctan).output, OutputUnits::Set("radian"));
        assert_eq!(policy(ElementwiseOp::Radians).require, Some("degree"));
    }

    #[test]
    fn test_power_policies() {
        assert_eq!(policy(ElementwiseOp::Var).output, OutputUnits::Power(UnitPower::Fixed(2)));
        assert_eq!(policy(ElementwiseOp::Prod).output, OutputUnits::Power(UnitPower::Size));
        assert_eq!(policy(ElementwiseOp::Std).output, OutputUnits::Copy);
    }

    #[test]
    fn test_unit_unaware() {
        assert_eq!(policy(ElementwiseOp::Sign), OpPolicy { require: None, output: OutputUnits::Bare });
        assert_eq!(policy(ElementwiseOp::Log).output, OutputUnits::Bare);
    }
}
