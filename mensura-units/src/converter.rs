//! Unit converters - how values of one unit map onto its reference units
//!
//! Most units only scale (`foot = 0.3048 meter`). Temperature scales also
//! shift the origin (`reference = value * scale + offset`), and logarithmic
//! units such as the decibel map through an exponential.

use mensura_core::{Magnitude, Number, Result, DEFAULT_PRECISION};

/// Mapping from a unit's values to values in its reference units
#[derive(Debug, Clone, PartialEq)]
pub enum Converter {
    /// `reference = value * scale`
    Scale(Number),
    /// `reference = value * scale + offset`
    Offset { scale: Number, offset: Number },
    /// `reference = scale * logbase ** (value / logfactor)`
    Log { scale: Number, logbase: Number, logfactor: Number },
}

impl Converter {
    /// Multiplicative part of the mapping
    pub fn scale(&self) -> &Number {
        match self {
            Converter::Scale(scale) | Converter::Offset { scale, .. } | Converter::Log { scale, .. } => scale,
        }
    }

    /// True when converting is a plain multiplication
    pub fn is_multiplicative(&self) -> bool {
        match self {
            Converter::Scale(_) => true,
            Converter::Offset { offset, .. } => offset.is_zero(),
            Converter::Log { .. } => false,
        }
    }

    pub fn is_logarithmic(&self) -> bool {
        matches!(self, Converter::Log { .. })
    }

    /// `ln(logbase) / logfactor`, the exponent rate of a logarithmic unit
    fn log_rate(logbase: &Number, logfactor: &Number) -> Result<Number> {
        Ok(logbase.ln(DEFAULT_PRECISION)?.checked_div(logfactor)?)
    }

    /// Value in this unit -> value in the reference units
    pub fn to_reference<M: Magnitude>(&self, value: &M) -> Result<M> {
        match self {
            Converter::Scale(scale) => Ok(value.scale(scale)),
            Converter::Offset { scale, offset } => Ok(value.scale(scale).try_add(&M::from_number(offset))?),
            Converter::Log { scale, logbase, logfactor } => {
                let rate = Self::log_rate(logbase, logfactor)?;
                Ok(value.scale(&rate).try_exp()?.scale(scale))
            }
        }
    }

    /// Value in the reference units -> value in this unit
    pub fn from_reference<M: Magnitude>(&self, value: &M) -> Result<M> {
        let scale = M::from_number(self.scale());
        match self {
            Converter::Scale(_) => Ok(value.try_div(&scale)?),
            Converter::Offset { offset, .. } => Ok(value.try_sub(&M::from_number(offset))?.try_div(&scale)?),
            Converter::Log { logbase, logfactor, .. } => {
                let per_rate = Number::one().checked_div(&Self::log_rate(logbase, logfactor)?)?;
                Ok(value.try_div(&scale)?.try_ln()?.scale(&per_rate))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> Number {
        Number::from_str(text).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_scale() {
        let foot = Converter::Scale(num("0.3048"));
        assert!(foot.is_multiplicative());
        assert_eq!(foot.to_reference(&Number::from_i64(10)).unwrap(), num("3.048"));
        assert_eq!(foot.from_reference(&num("3.048")).unwrap(), Number::from_i64(10));
    }

    #[test]
    fn test_offset() {
        let celsius = Converter::Offset { scale: Number::one(), offset: num("273.15") };
        assert!(!celsius.is_multiplicative());
        assert_eq!(celsius.to_reference(&Number::from_i64(25)).unwrap(), num("298.15"));
        assert_eq!(celsius.from_reference(&Number::zero()).unwrap(), num("-273.15"));
        assert!(close(celsius.from_reference(&300.0_f64).unwrap(), 26.85));

        let zero_offset = Converter::Offset { scale: Number::from_i64(2), offset: Number::zero() };
        assert!(zero_offset.is_multiplicative());
    }

    #[test]
    fn test_logarithmic() {
        let decibel = Converter::Log { scale: Number::one(), logbase: Number::from_i64(10), logfactor: Number::from_i64(10) };
        assert!(decibel.is_logarithmic());
        assert!(!decibel.is_multiplicative());
        assert!(close(decibel.to_reference(&20.0_f64).unwrap(), 100.0));
        assert!(close(decibel.from_reference(&1000.0_f64).unwrap(), 30.0));
        assert!(decibel.from_reference(&0.0_f64).is_err());
        assert!(decibel.from_reference(&-5.0_f64).is_err());
    }
}
