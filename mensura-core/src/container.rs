//! Unit exponent vectors
//!
//! A `UnitsContainer` maps unit (or dimension) names to signed rational
//! exponents: `meter ** 2 / second` is `{meter: 2, second: -1}`. Containers
//! form a multiplicative group and are immutable; every operation returns a
//! new container.

use num_rational::Rational64;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Exponent of a unit term
pub type Exponent = Rational64;

/// Values usable as an exponent: integers or rationals
pub trait IntoExponent {
    fn into_exponent(self) -> Exponent;
}

impl IntoExponent for i32 {
    fn into_exponent(self) -> Exponent {
        Exponent::from_integer(i64::from(self))
    }
}

impl IntoExponent for i64 {
    fn into_exponent(self) -> Exponent {
        Exponent::from_integer(self)
    }
}

impl IntoExponent for Exponent {
    fn into_exponent(self) -> Exponent {
        self
    }
}

/// Canonical exponent vector over unit names.
///
/// Zero exponents are never stored, so equality and hashing only see the
/// non-zero terms. The empty container is "dimensionless".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, Exponent>", from = "BTreeMap<String, Exponent>")]
pub struct UnitsContainer {
    terms: BTreeMap<String, Exponent>,
}

impl UnitsContainer {
    /// Dimensionless container
    pub fn new() -> Self {
        Self::default()
    }

    /// Container with a single term raised to the first power
    pub fn single(name: impl Into<String>) -> Self {
        Self::from_pairs([(name.into(), Exponent::one())])
    }

    /// Build from `(name, exponent)` pairs; repeated names accumulate.
    ///
    /// Precondition: exponents are finite rationals. Nothing here validates
    /// caller-supplied exponents beyond what `Rational64` already enforces.
    pub fn from_pairs<I, S, E>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, E)>,
        S: Into<String>,
        E: IntoExponent,
    {
        let mut terms: BTreeMap<String, Exponent> = BTreeMap::new();
        for (name, exp) in pairs {
            *terms.entry(name.into()).or_insert_with(Exponent::zero) += exp.into_exponent();
        }
        terms.retain(|_, exp| !exp.is_zero());
        Self { terms }
    }

    /// Exponent of `name` (zero when absent)
    pub fn get(&self, name: &str) -> Exponent {
        self.terms.get(name).copied().unwrap_or_else(Exponent::zero)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.terms.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True for the dimensionless container
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Exponent)> + '_ {
        self.terms.iter().map(|(name, exp)| (name.as_str(), *exp))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.terms.keys().map(|name| name.as_str())
    }

    /// Product: exponents added per key
    pub fn multiply(&self, other: &UnitsContainer) -> UnitsContainer {
        Self::from_pairs(self.iter().chain(other.iter()))
    }

    /// Quotient: exponents of `other` subtracted
    pub fn divide(&self, other: &UnitsContainer) -> UnitsContainer {
        Self::from_pairs(self.iter().chain(other.iter().map(|(name, exp)| (name, -exp))))
    }

    /// Every exponent multiplied by `exp`
    pub fn power(&self, exp: impl IntoExponent) -> UnitsContainer {
        let exp = exp.into_exponent();
        Self::from_pairs(self.iter().map(|(name, e)| (name, e * exp)))
    }

    /// Every exponent negated
    pub fn invert(&self) -> UnitsContainer {
        self.power(-Exponent::one())
    }

    /// Rename every term; terms that collide after renaming are combined
    pub fn rename<F>(&self, mut rename: F) -> UnitsContainer
    where
        F: FnMut(&str) -> String,
    {
        Self::from_pairs(self.iter().map(|(name, exp)| (rename(name), exp)))
    }

    /// Render with each name replaced through `symbol`, e.g. `m ** 2 / s`
    pub fn format_with<F>(&self, symbol: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        self.rename(symbol).to_string()
    }
}

fn write_term(f: &mut fmt::Formatter<'_>, name: &str, exp: Exponent) -> fmt::Result {
    if exp.is_one() {
        write!(f, "{}", name)
    } else if exp.is_integer() {
        write!(f, "{} ** {}", name, exp.numer())
    } else {
        write!(f, "{} ** ({}/{})", name, exp.numer(), exp.denom())
    }
}

impl fmt::Display for UnitsContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "dimensionless");
        }

        let positive: Vec<_> = self.iter().filter(|(_, exp)| *exp > Exponent::zero()).collect();
        let negative: Vec<_> = self.iter().filter(|(_, exp)| *exp < Exponent::zero()).collect();

        if positive.is_empty() {
            write!(f, "1")?;
        }
        for (i, (name, exp)) in positive.iter().enumerate() {
            if i > 0 {
                write!(f, " * ")?;
            }
            write_term(f, name, *exp)?;
        }
        for (name, exp) in negative {
            write!(f, " / ")?;
            write_term(f, name, -exp)?;
        }
        Ok(())
    }
}

impl From<BTreeMap<String, Exponent>> for UnitsContainer {
    fn from(terms: BTreeMap<String, Exponent>) -> Self {
        Self::from_pairs(terms)
    }
}

impl From<UnitsContainer> for BTreeMap<String, Exponent> {
    fn from(container: UnitsContainer) -> Self {
        container.terms
    }
}

impl<S: Into<String>> FromIterator<(S, Exponent)> for UnitsContainer {
    fn from_iter<T: IntoIterator<Item = (S, Exponent)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn velocity() -> UnitsContainer {
        UnitsContainer::from_pairs([("meter", 1), ("second", -1)])
    }

    #[test]
    fn test_canonical_form_drops_zeros() {
        let u = UnitsContainer::from_pairs([("meter", 1), ("second", 0), ("meter", -1)]);
        assert!(u.is_empty());
        assert_eq!(u, UnitsContainer::new());
    }

    #[test]
    fn test_group_laws() {
        let u1 = velocity();
        let u2 = UnitsContainer::from_pairs([("kilogram", 1), ("second", 2)]);
        assert_eq!(u1.multiply(&u2).divide(&u2), u1);
        assert_eq!(u1.power(1), u1);
        assert!(u1.power(0).is_empty());
        assert_eq!(u1.multiply(&u1.invert()), UnitsContainer::new());
    }

    #[test]
    fn test_power_rational() {
        let area = UnitsContainer::from_pairs([("meter", 2)]);
        let root = area.power(Exponent::new(1, 2));
        assert_eq!(root, UnitsContainer::single("meter"));
        assert_eq!(root.get("meter"), Exponent::one());
        assert_eq!(root.get("second"), Exponent::zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(UnitsContainer::new().to_string(), "dimensionless");
        assert_eq!(velocity().to_string(), "meter / second");
        let u = UnitsContainer::from_pairs([("meter", 2), ("second", -2), ("kilogram", 1)]);
        assert_eq!(u.to_string(), "kilogram * meter ** 2 / second ** 2");
        assert_eq!(UnitsContainer::single("second").invert().to_string(), "1 / second");
        let half = UnitsContainer::from_pairs([("meter", Exponent::new(1, 2))]);
        assert_eq!(half.to_string(), "meter ** (1/2)");
    }

    #[test]
    fn test_format_with_symbols() {
        let rendered = velocity().format_with(|name| match name {
            "meter" => "m".to_string(),
            "second" => "s".to_string(),
            other => other.to_string(),
        });
        assert_eq!(rendered, "m / s");
    }

    #[test]
    fn test_hash_ignores_construction_order() {
        use std::collections::HashSet;
        let a = UnitsContainer::from_pairs([("second", -1), ("meter", 1)]);
        let mut set = HashSet::new();
        set.insert(velocity());
        assert!(set.contains(&a));
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&velocity()).unwrap();
        let back: UnitsContainer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, velocity());
    }
}
