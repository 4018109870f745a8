//! Quantity type - a magnitude with associated units
//!
//! A `Quantity` pairs a magnitude with a `UnitsContainer` and a shared
//! registry handle. Additive operations and comparisons require equal
//! dimensionality and convert the right operand into the left operand's
//! units; multiplicative operations combine units algebraically.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

use mensura_core::{
    ArrayMagnitude, ElementwiseOp, IntoExponent, Magnitude, NumberError, Result, UnitError, UnitsContainer,
};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::debug;

use crate::config::FormatOptions;
use crate::policy::{self, OutputUnits, UnitPower};
use crate::registry::{self, Registry};

/// A magnitude tagged with units from a registry
#[derive(Clone)]
pub struct Quantity<M: Magnitude = f64> {
    magnitude: M,
    units: UnitsContainer,
    registry: Arc<dyn Registry>,
    dimensionality: OnceLock<UnitsContainer>,
}

/// One argument of `Quantity::build`
#[derive(Debug, Clone)]
pub enum QuantityArg<M: Magnitude> {
    Text(String),
    Magnitude(M),
    Quantity(Quantity<M>),
    Units(UnitsContainer),
}

impl<M: Magnitude> QuantityArg<M> {
    fn kind(&self) -> &'static str {
        match self {
            QuantityArg::Text(_) => "text",
            QuantityArg::Magnitude(_) => M::kind(),
            QuantityArg::Quantity(_) => "Quantity",
            QuantityArg::Units(_) => "UnitsContainer",
        }
    }
}

impl<M: Magnitude> From<&str> for QuantityArg<M> {
    fn from(text: &str) -> Self {
        QuantityArg::Text(text.to_string())
    }
}

impl<M: Magnitude> From<String> for QuantityArg<M> {
    fn from(text: String) -> Self {
        QuantityArg::Text(text)
    }
}

impl<M: Magnitude> From<Quantity<M>> for QuantityArg<M> {
    fn from(quantity: Quantity<M>) -> Self {
        QuantityArg::Quantity(quantity)
    }
}

impl<M: Magnitude> From<UnitsContainer> for QuantityArg<M> {
    fn from(units: UnitsContainer) -> Self {
        QuantityArg::Units(units)
    }
}

/// Destination of a conversion: a unit expression or existing units
#[derive(Debug, Clone)]
pub enum Target<'a> {
    Text(&'a str),
    Units(UnitsContainer),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(text: &'a str) -> Self {
        Target::Text(text)
    }
}

impl<'a> From<UnitsContainer> for Target<'a> {
    fn from(units: UnitsContainer) -> Self {
        Target::Units(units)
    }
}

impl<'a> From<&'a UnitsContainer> for Target<'a> {
    fn from(units: &'a UnitsContainer) -> Self {
        Target::Units(units.clone())
    }
}

impl<'a, M: Magnitude> From<&'a Quantity<M>> for Target<'a> {
    fn from(quantity: &'a Quantity<M>) -> Self {
        Target::Units(quantity.units.clone())
    }
}

/// A quantity or a bare magnitude (accepted only against dimensionless quantities)
#[derive(Debug, Clone)]
pub enum Operand<M: Magnitude> {
    Quantity(Quantity<M>),
    Magnitude(M),
}

impl<M: Magnitude> From<Quantity<M>> for Operand<M> {
    fn from(quantity: Quantity<M>) -> Self {
        Operand::Quantity(quantity)
    }
}

/// Result of an element-wise operation: unit-aware or plain
#[derive(Debug, Clone)]
pub enum Applied<M: Magnitude> {
    Quantity(Quantity<M>),
    Magnitude(M),
}

impl<M: Magnitude> Applied<M> {
    /// Result magnitude, with or without units
    pub fn magnitude(&self) -> &M {
        match self {
            Applied::Quantity(q) => q.magnitude(),
            Applied::Magnitude(m) => m,
        }
    }

    /// The quantity, or `None` for a bare magnitude
    pub fn into_quantity(self) -> Option<Quantity<M>> {
        match self {
            Applied::Quantity(q) => Some(q),
            Applied::Magnitude(_) => None,
        }
    }
}

fn ordering<M: Magnitude>(lhs: &M, rhs: &M) -> Result<Ordering> {
    lhs.partial_cmp(rhs)
        .ok_or_else(|| UnitError::InvalidArgument(format!("{} and {} are not ordered", lhs, rhs)))
}

impl<M: Magnitude> Quantity<M> {
    // ========== Construction ==========

    /// Quantity from already-resolved units
    pub fn new(registry: Arc<dyn Registry>, magnitude: M, units: UnitsContainer) -> Self {
        Self { magnitude, units, registry, dimensionality: OnceLock::new() }
    }

    /// Quantity with no units
    pub fn dimensionless(registry: Arc<dyn Registry>, magnitude: M) -> Self {
        Self::new(registry, magnitude, UnitsContainer::new())
    }

    /// Parse "9.81 meter / second ** 2" into a quantity
    pub fn parse(registry: Arc<dyn Registry>, text: &str) -> Result<Self> {
        let (value, units) = registry.parse_expression(text)?;
        Ok(Self::new(registry, M::from_number(&value), units))
    }

    /// `magnitude` in the units named by `units`; any leading factor in the
    /// unit text is discarded
    pub fn with_units(registry: Arc<dyn Registry>, magnitude: M, units: &str) -> Result<Self> {
        let (_, units) = registry.parse_expression(units)?;
        Ok(Self::new(registry, magnitude, units))
    }

    /// General constructor.
    ///
    /// - value only: text is parsed, a quantity is copied, a magnitude is dimensionless
    /// - magnitude + units: units given as a container, unit text or another quantity
    pub fn build(registry: Arc<dyn Registry>, value: QuantityArg<M>, units: Option<QuantityArg<M>>) -> Result<Self> {
        match (value, units) {
            (QuantityArg::Text(text), None) => Self::parse(registry, &text),
            (QuantityArg::Quantity(quantity), None) => Ok(quantity),
            (QuantityArg::Magnitude(magnitude), None) => Ok(Self::dimensionless(registry, magnitude)),
            (QuantityArg::Magnitude(magnitude), Some(QuantityArg::Units(units))) => {
                Ok(Self::new(registry, magnitude, units))
            }
            (QuantityArg::Magnitude(magnitude), Some(QuantityArg::Text(text))) => {
                Self::with_units(registry, magnitude, &text)
            }
            (QuantityArg::Magnitude(magnitude), Some(QuantityArg::Quantity(template))) => {
                Ok(Self::new(registry, magnitude, template.units))
            }
            (_, Some(units @ QuantityArg::Magnitude(_))) => Err(UnitError::InvalidArgument(format!(
                "units must be text, Quantity or UnitsContainer; not {}",
                units.kind()
            ))),
            (value, _) => Err(UnitError::InvalidArgument(format!(
                "value must be text, a Quantity or a magnitude; not {}",
                value.kind()
            ))),
        }
    }

    /// Same registry and units, different magnitude
    fn with_magnitude<N: Magnitude>(&self, magnitude: N) -> Quantity<N> {
        Quantity {
            magnitude,
            units: self.units.clone(),
            registry: Arc::clone(&self.registry),
            dimensionality: self.dimensionality.clone(),
        }
    }

    fn set_units(&mut self, units: UnitsContainer) {
        self.units = units;
        self.dimensionality = OnceLock::new();
    }

    // ========== Accessors ==========

    /// Magnitude in this quantity's own units
    pub fn magnitude(&self) -> &M {
        &self.magnitude
    }

    pub fn into_magnitude(self) -> M {
        self.magnitude
    }

    pub fn units(&self) -> &UnitsContainer {
        &self.units
    }

    /// Registry the units are defined in
    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Dimensionality of the units, computed once and memoized
    pub fn dimensionality(&self) -> Result<&UnitsContainer> {
        if let Some(dim) = self.dimensionality.get() {
            return Ok(dim);
        }
        let dim = self.registry.base_dimensionality_of(&self.units)?;
        Ok(self.dimensionality.get_or_init(|| dim))
    }

    /// True when the reference units are empty (no unit at all, not even radian)
    pub fn is_unitless(&self) -> Result<bool> {
        let (_, reference) = self.registry.base_units_of(&self.units)?;
        Ok(reference.is_empty())
    }

    /// True when the dimensionality is empty
    pub fn is_dimensionless(&self) -> Result<bool> {
        Ok(self.dimensionality()?.is_empty())
    }

    fn same_dimensionality(&self, other: &Self) -> Result<()> {
        let lhs = self.dimensionality()?;
        let rhs = other.dimensionality()?;
        if lhs != rhs {
            return Err(UnitError::dimensionality_with(&self.units, &other.units, lhs, rhs));
        }
        Ok(())
    }

    fn require_dimensionless(&self) -> Result<()> {
        if self.is_dimensionless()? {
            Ok(())
        } else {
            Err(UnitError::dimensionality(&self.units, "dimensionless"))
        }
    }

    // ========== Conversion ==========

    fn resolve_target(&self, target: Target<'_>) -> Result<UnitsContainer> {
        match target {
            Target::Text(text) => Ok(self.registry.parse_expression(text)?.1),
            Target::Units(units) => Ok(units),
        }
    }

    /// Rescale in place
    pub fn ito<'a>(&mut self, target: impl Into<Target<'a>>) -> Result<()> {
        let units = self.resolve_target(target.into())?;
        self.magnitude = registry::convert(&*self.registry, &self.magnitude, &self.units, &units)?;
        // Conversion preserves dimensionality, so the memoized value stays valid
        self.units = units;
        Ok(())
    }

    /// Rescaled copy
    pub fn to<'a>(&self, target: impl Into<Target<'a>>) -> Result<Self> {
        let mut converted = self.clone();
        converted.ito(target)?;
        Ok(converted)
    }

    /// Copy rescaled to the registry's reference units
    pub fn convert_to_reference(&self) -> Result<Self> {
        let (_, units) = self.registry.base_units_of(&self.units)?;
        let magnitude = registry::convert(&*self.registry, &self.magnitude, &self.units, &units)?;
        Ok(Self::new(Arc::clone(&self.registry), magnitude, units))
    }

    /// Magnitude of a dimensionless quantity in reference units
    pub fn to_dimensionless_magnitude(&self) -> Result<M> {
        self.require_dimensionless()?;
        Ok(self.convert_to_reference()?.magnitude)
    }

    // ========== Additive arithmetic ==========

    fn iadd_sub(&mut self, other: &Self, op: fn(&M, &M) -> std::result::Result<M, NumberError>) -> Result<()> {
        self.same_dimensionality(other)?;
        self.magnitude = if self.units == other.units {
            op(&self.magnitude, &other.magnitude)?
        } else {
            let rhs = registry::convert(&*self.registry, &other.magnitude, &other.units, &self.units)?;
            op(&self.magnitude, &rhs)?
        };
        Ok(())
    }

    fn iadd_sub_magnitude(
        &mut self,
        other: &M,
        op: fn(&M, &M) -> std::result::Result<M, NumberError>,
    ) -> Result<()> {
        self.require_dimensionless()?;
        self.magnitude = op(&self.magnitude, other)?;
        Ok(())
    }

    /// Add in place; `other` is converted into this quantity's units first.
    ///
    /// Fails when the dimensionalities differ.
    pub fn iadd(&mut self, other: &Self) -> Result<()> {
        self.iadd_sub(other, M::try_add)
    }

    /// Subtract in place, converting `other` like `iadd`
    pub fn isub(&mut self, other: &Self) -> Result<()> {
        self.iadd_sub(other, M::try_sub)
    }

    /// Sum in this quantity's units
    pub fn add(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.iadd(other)?;
        Ok(result)
    }

    /// Difference in this quantity's units
    pub fn sub(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.isub(other)?;
        Ok(result)
    }

    /// Add a bare magnitude; only valid for dimensionless quantities
    pub fn add_magnitude(&self, other: &M) -> Result<Self> {
        let mut result = self.clone();
        result.iadd_sub_magnitude(other, M::try_add)?;
        Ok(result)
    }

    /// Subtract a bare magnitude; only valid for dimensionless quantities
    pub fn sub_magnitude(&self, other: &M) -> Result<Self> {
        let mut result = self.clone();
        result.iadd_sub_magnitude(other, M::try_sub)?;
        Ok(result)
    }

    // ========== Multiplicative arithmetic ==========

    /// Multiply in place. Units multiply without conversion, so
    /// `meter * foot` keeps both units.
    pub fn imul(&mut self, other: &Self) -> Result<()> {
        self.magnitude = self.magnitude.try_mul(&other.magnitude)?;
        let units = self.units.multiply(&other.units);
        self.set_units(units);
        Ok(())
    }

    /// Divide in place; units divide without conversion
    pub fn idiv(&mut self, other: &Self) -> Result<()> {
        self.magnitude = self.magnitude.try_div(&other.magnitude)?;
        let units = self.units.divide(&other.units);
        self.set_units(units);
        Ok(())
    }

    /// Floor-divide in place
    pub fn ifloor_div(&mut self, other: &Self) -> Result<()> {
        self.magnitude = self.magnitude.try_floor_div(&other.magnitude)?;
        let units = self.units.divide(&other.units);
        self.set_units(units);
        Ok(())
    }

    /// Product with multiplied units
    pub fn mul(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.imul(other)?;
        Ok(result)
    }

    /// Quotient with divided units
    pub fn div(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.idiv(other)?;
        Ok(result)
    }

    /// Floored quotient with divided units
    pub fn floor_div(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.ifloor_div(other)?;
        Ok(result)
    }

    /// Scale by a bare magnitude; units unchanged
    pub fn mul_magnitude(&self, other: &M) -> Result<Self> {
        Ok(self.with_magnitude(self.magnitude.try_mul(other)?))
    }

    /// Divide by a bare magnitude; units unchanged
    pub fn div_magnitude(&self, other: &M) -> Result<Self> {
        Ok(self.with_magnitude(self.magnitude.try_div(other)?))
    }

    pub fn floor_div_magnitude(&self, other: &M) -> Result<Self> {
        Ok(self.with_magnitude(self.magnitude.try_floor_div(other)?))
    }

    /// `other / self`: inverted units
    pub fn rdiv_magnitude(&self, other: &M) -> Result<Self> {
        let magnitude = other.try_div(&self.magnitude)?;
        Ok(Self::new(Arc::clone(&self.registry), magnitude, self.units.invert()))
    }

    /// `other // self`: inverted units
    pub fn rfloor_div_magnitude(&self, other: &M) -> Result<Self> {
        let magnitude = other.try_floor_div(&self.magnitude)?;
        Ok(Self::new(Arc::clone(&self.registry), magnitude, self.units.invert()))
    }

    /// Raise magnitude and every unit exponent to `exp`
    pub fn ipow(&mut self, exp: impl IntoExponent) -> Result<()> {
        let exp = exp.into_exponent();
        self.magnitude = self.magnitude.powr(exp)?;
        let units = self.units.power(exp);
        self.set_units(units);
        Ok(())
    }

    /// Copy raised to `exp`, e.g. `area.pow(Exponent::new(1, 2))`
    pub fn pow(&self, exp: impl IntoExponent) -> Result<Self> {
        let mut result = self.clone();
        result.ipow(exp)?;
        Ok(result)
    }

    // ========== Unary operations ==========

    /// Absolute value, same units
    pub fn abs(&self) -> Self {
        self.with_magnitude(self.magnitude.abs())
    }

    pub fn pos(&self) -> Self {
        self.clone()
    }

    /// Negated magnitude, same units
    pub fn neg(&self) -> Self {
        self.with_magnitude(self.magnitude.neg())
    }

    /// Round the magnitude to `ndigits` decimals; negative `ndigits` rounds
    /// to tens, hundreds and so on. Digits beyond what the magnitude can
    /// represent leave it unchanged.
    pub fn round(&self, ndigits: i32) -> Self {
        self.with_magnitude(self.magnitude.round(ndigits))
    }

    // ========== Comparison ==========

    /// Equality with unit awareness.
    ///
    /// Zero magnitudes are equal when dimensionalities match, whatever the
    /// units; incompatible units compare unequal instead of failing.
    pub fn eq_quantity(&self, other: &Self) -> bool {
        if self.magnitude.is_zero() && other.magnitude.is_zero() {
            return match (self.dimensionality(), other.dimensionality()) {
                (Ok(lhs), Ok(rhs)) => lhs == rhs,
                _ => false,
            };
        }

        if self.units == other.units {
            return self.magnitude == other.magnitude;
        }

        match self.to(other) {
            Ok(converted) => converted.magnitude == other.magnitude,
            Err(err) => {
                debug!(error = %err, "quantities compared unequal");
                false
            }
        }
    }

    /// Equality with a bare magnitude: dimensionless and numerically equal
    pub fn eq_magnitude(&self, other: &M) -> bool {
        matches!(self.is_dimensionless(), Ok(true)) && self.magnitude == *other
    }

    /// Order two quantities of equal dimensionality by their reference values
    pub fn compare(&self, other: &Self) -> Result<Ordering> {
        if self.units == other.units {
            return ordering(&self.magnitude, &other.magnitude);
        }
        self.same_dimensionality(other)?;
        let lhs = self.convert_to_reference()?;
        let rhs = other.convert_to_reference()?;
        ordering(&lhs.magnitude, &rhs.magnitude)
    }

    /// Order against a bare magnitude; only valid for dimensionless quantities
    pub fn compare_magnitude(&self, other: &M) -> Result<Ordering> {
        if !self.is_dimensionless()? {
            return Err(UnitError::InvalidArgument(format!(
                "Cannot compare Quantity in '{}' and {}",
                self.units,
                M::kind()
            )));
        }
        ordering(&self.magnitude, other)
    }

    /// `self < other`, after converting `other` into these units
    pub fn lt(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Less)
    }

    pub fn le(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)? != Ordering::Greater)
    }

    pub fn gt(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Greater)
    }

    pub fn ge(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)? != Ordering::Less)
    }

    // ========== Formatting ==========

    /// Render with explicit options
    pub fn format_with(&self, options: &FormatOptions) -> String {
        let units = if options.symbols {
            self.units.format_with(|name| self.registry.get_symbol(name))
        } else {
            self.units.to_string()
        };
        match options.precision {
            Some(precision) => format!("{:.*} {}", precision, self.magnitude, units),
            None => format!("{} {}", self.magnitude, units),
        }
    }

    /// Render with the registry's default options
    pub fn format_default(&self) -> String {
        self.format_with(&self.registry.default_format())
    }
}

// ========== Element access and element-wise operations ==========

impl<M: ArrayMagnitude> Quantity<M> {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.magnitude.size()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.size() == 0
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(UnitError::IndexOutOfRange { index, len: self.len() })
        }
    }

    /// Element `index` with this quantity's units
    pub fn get_item(&self, index: usize) -> Result<Quantity<M::Elem>> {
        let element = self
            .magnitude
            .get(index)
            .ok_or(UnitError::IndexOutOfRange { index, len: self.len() })?;
        Ok(self.with_magnitude(element))
    }

    /// Write a quantity into slot `index`, converted into this quantity's units
    pub fn set_item(&mut self, index: usize, value: &Quantity<M::Elem>) -> Result<()> {
        self.check_index(index)?;
        let ratio = Quantity::new(
            Arc::clone(&self.registry),
            value.magnitude.clone(),
            value.units.divide(&self.units),
        )
        .convert_to_reference()?;
        if !ratio.is_dimensionless()? {
            return Err(UnitError::dimensionality(&value.units, &self.units));
        }
        self.magnitude.set(index, ratio.magnitude)?;
        Ok(())
    }

    /// Write a bare element; only valid for dimensionless quantities
    pub fn set_item_magnitude(&mut self, index: usize, value: M::Elem) -> Result<()> {
        self.check_index(index)?;
        let ratio = Quantity::new(Arc::clone(&self.registry), value, self.units.invert()).convert_to_reference()?;
        if !ratio.is_dimensionless()? {
            return Err(UnitError::dimensionality("dimensionless", &self.units));
        }
        self.magnitude.set(index, ratio.magnitude)?;
        Ok(())
    }

    /// Every element as its own quantity
    pub fn to_list(&self) -> Vec<Quantity<M::Elem>> {
        self.iter().collect()
    }

    /// Elements as quantities sharing these units
    pub fn iter(&self) -> impl Iterator<Item = Quantity<M::Elem>> + '_ {
        self.magnitude.elements().into_iter().map(move |element| self.with_magnitude(element))
    }

    /// Element magnitude expressed in this quantity's units.
    ///
    /// Bare magnitudes are only accepted when this quantity is dimensionless;
    /// `rescale_bare` converts them from plain numbers into these units.
    fn element_in_units(&self, operand: Operand<M::Elem>, rescale_bare: bool) -> Result<M::Elem> {
        match operand {
            Operand::Quantity(q) => Ok(q.to(&self.units)?.magnitude),
            Operand::Magnitude(m) => {
                self.require_dimensionless()?;
                if rescale_bare {
                    registry::convert(&*self.registry, &m, &UnitsContainer::new(), &self.units)
                } else {
                    Ok(m)
                }
            }
        }
    }

    /// Limit every element to `[min, max]`; at least one bound is required
    pub fn clip(&self, min: Option<Operand<M::Elem>>, max: Option<Operand<M::Elem>>) -> Result<Self> {
        if min.is_none() && max.is_none() {
            return Err(UnitError::InvalidArgument("clip requires at least one of min or max".to_string()));
        }
        let min = min.map(|m| self.element_in_units(m, false)).transpose()?;
        let max = max.map(|m| self.element_in_units(m, false)).transpose()?;
        Ok(self.with_magnitude(self.magnitude.clip(min.as_ref(), max.as_ref())))
    }

    /// Set every element to `value`, adopting its units
    pub fn fill(&mut self, value: &Quantity<M::Elem>) {
        self.magnitude = M::from_elements(vec![value.magnitude.clone(); self.len()]);
        self.set_units(value.units.clone());
    }

    /// Write `values` at `indices`, repeating `values` when it is shorter
    pub fn put(&mut self, indices: &[usize], values: Operand<M>) -> Result<()> {
        let values = match values {
            Operand::Quantity(q) => q.to(&self.units)?.magnitude,
            Operand::Magnitude(m) => {
                self.require_dimensionless()?;
                registry::convert(&*self.registry, &m, &UnitsContainer::new(), &self.units)?
            }
        };
        let values = values.elements();
        if values.is_empty() {
            return Err(UnitError::InvalidArgument("put requires at least one value".to_string()));
        }
        for &index in indices {
            self.check_index(index)?;
        }
        for (i, &index) in indices.iter().enumerate() {
            self.magnitude.set(index, values[i % values.len()].clone())?;
        }
        Ok(())
    }

    /// Insertion point of `value` keeping a sorted quantity sorted
    pub fn searchsorted(&self, value: Operand<M::Elem>) -> Result<usize> {
        let value = self.element_in_units(value, true)?;
        Ok(self.magnitude.searchsorted(&value))
    }

    /// Convert in place to a required unit, except a plain number needing radians
    fn ito_if_needed(&mut self, required: &str) -> Result<()> {
        if required == "radian" && self.is_unitless()? {
            return Ok(());
        }
        self.ito(required)
    }

    fn output_units(&self, output: OutputUnits) -> Result<Option<UnitsContainer>> {
        Ok(match output {
            OutputUnits::Set(units) => Some(self.registry.parse_expression(units)?.1),
            OutputUnits::Copy => Some(self.units.clone()),
            OutputUnits::Power(UnitPower::Fixed(exp)) => Some(self.units.power(exp)),
            OutputUnits::Power(UnitPower::Size) => {
                let size = i64::try_from(self.len())
                    .map_err(|_| UnitError::InvalidArgument("too many elements".to_string()))?;
                Some(self.units.power(size))
            }
            OutputUnits::Bare => None,
        })
    }

    fn wrap<N: Magnitude>(&self, value: N, units: Option<UnitsContainer>) -> Applied<N> {
        match units {
            Some(units) => Applied::Quantity(Quantity::new(Arc::clone(&self.registry), value, units)),
            None => Applied::Magnitude(value),
        }
    }

    /// Apply a non-reducing element-wise operation with its unit policy
    pub fn apply(&self, op: ElementwiseOp) -> Result<Applied<M>> {
        if op.is_reduction() {
            return Err(UnitError::InvalidArgument(format!("{} is a reduction; use reduce", op)));
        }
        let policy = policy::policy(op);
        let mut source = self.clone();
        if let Some(required) = policy.require {
            source.ito_if_needed(required)?;
        }
        let value = source.magnitude.map_op(op)?;
        let units = source.output_units(policy.output)?;
        Ok(source.wrap(value, units))
    }

    /// Collapse all elements with a reducing operation and its unit policy
    pub fn reduce(&self, op: ElementwiseOp) -> Result<Applied<M::Elem>> {
        if !op.is_reduction() {
            return Err(UnitError::InvalidArgument(format!("{} is not a reduction; use apply", op)));
        }
        let policy = policy::policy(op);
        let mut source = self.clone();
        if let Some(required) = policy.require {
            source.ito_if_needed(required)?;
        }
        let value = source.magnitude.reduce_op(op)?;
        let units = source.output_units(policy.output)?;
        Ok(source.wrap(value, units))
    }
}

// ========== Trait Implementations ==========

impl<M: Magnitude> fmt::Debug for Quantity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quantity")
            .field("magnitude", &self.magnitude)
            .field("units", &self.units)
            .finish()
    }
}

impl<M: Magnitude> fmt::Display for Quantity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(precision) => write!(f, "{:.*} {}", precision, self.magnitude, self.units),
            None => write!(f, "{} {}", self.magnitude, self.units),
        }
    }
}

impl<M: Magnitude> PartialEq for Quantity<M> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_quantity(other)
    }
}

impl<M: Magnitude> PartialEq<M> for Quantity<M> {
    fn eq(&self, other: &M) -> bool {
        self.eq_magnitude(other)
    }
}

impl<M: Magnitude> PartialOrd for Quantity<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok()
    }
}

impl<M: Magnitude> std::ops::Neg for Quantity<M> {
    type Output = Quantity<M>;

    fn neg(self) -> Self::Output {
        Quantity::neg(&self)
    }
}

impl<M: Magnitude> std::ops::Neg for &Quantity<M> {
    type Output = Quantity<M>;

    fn neg(self) -> Self::Output {
        Quantity::neg(self)
    }
}

impl<M: Magnitude + Serialize> Serialize for Quantity<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Quantity", 2)?;
        state.serialize_field("magnitude", &self.magnitude)?;
        state.serialize_field("units", &self.units)?;
        state.end()
    }
}
