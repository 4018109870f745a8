//! Unit registries
//!
//! `Registry` is the lookup seam every quantity goes through: parsing unit
//! expressions, reference-unit factors and dimensionality. `UnitRegistry` is
//! an in-memory implementation populated through `define_base_unit`,
//! `define_unit` and `define_log_unit`; it carries no built-in catalog.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use mensura_core::{Exponent, Magnitude, Number, Result, UnitError, UnitsContainer, DEFAULT_PRECISION};
use tracing::{debug, warn};

use crate::config::{FormatOptions, RegistryConfig};
use crate::converter::Converter;
use crate::parse;

/// Unit lookup and conversion services shared by quantities and systems
pub trait Registry: fmt::Debug + Send + Sync {
    /// Parse a value/unit expression such as "9.81 meter / second ** 2"
    fn parse_expression(&self, text: &str) -> Result<(Number, UnitsContainer)>;

    /// Factor to the reference units of `units`, and those reference units
    fn base_units_of(&self, units: &UnitsContainer) -> Result<(Number, UnitsContainer)>;

    /// Dimensionality of `units`, keyed by base dimension names such as `[length]`
    fn base_dimensionality_of(&self, units: &UnitsContainer) -> Result<UnitsContainer>;

    /// Display symbol for a unit name (the name itself when it has none)
    fn get_symbol(&self, name: &str) -> String;

    /// True when `name` resolves to a defined unit
    fn contains(&self, name: &str) -> bool;

    /// Expand a single unit into root-unit terms
    fn root_units_of(&self, name: &str) -> Result<(Number, UnitsContainer)> {
        self.base_units_of(&UnitsContainer::single(name))
    }

    /// How values of the unit `name` map onto its root units
    fn converter_of(&self, name: &str) -> Result<Converter> {
        let (factor, _) = self.root_units_of(name)?;
        Ok(Converter::Scale(factor))
    }

    /// Multiplicative factor taking a magnitude in `from` units to `to` units.
    ///
    /// Origin offsets and logarithmic scales are ignored; `convert` honors them.
    fn conversion_factor(&self, from: &UnitsContainer, to: &UnitsContainer) -> Result<Number> {
        if from == to {
            return Ok(Number::one());
        }
        let from_dim = self.base_dimensionality_of(from)?;
        let to_dim = self.base_dimensionality_of(to)?;
        if from_dim != to_dim {
            return Err(UnitError::dimensionality_with(from, to, from_dim, to_dim));
        }
        let (from_factor, _) = self.base_units_of(from)?;
        let (to_factor, _) = self.base_units_of(to)?;
        Ok(from_factor.checked_div(&to_factor)?)
    }

    /// Working precision for conversion factors
    fn precision(&self) -> usize {
        DEFAULT_PRECISION
    }

    fn default_format(&self) -> FormatOptions {
        FormatOptions::default()
    }

    /// System consulted first when a system scope resolves unit names
    fn default_system(&self) -> Option<String> {
        None
    }
}

/// Non-multiplicative converter of `units`, when it is a lone such unit.
///
/// Offset and logarithmic units only convert on their own; combined with
/// other units or raised to a power they are rejected.
fn standalone_converter(registry: &dyn Registry, units: &UnitsContainer) -> Result<Option<Converter>> {
    let mut found = None;
    for (name, exp) in units.iter() {
        let converter = registry.converter_of(name)?;
        if converter.is_multiplicative() {
            continue;
        }
        if units.len() > 1 || exp != Exponent::from_integer(1) {
            return Err(UnitError::InvalidArgument(format!(
                "'{}' is not multiplicative and cannot be converted as part of '{}'", name, units
            )));
        }
        found = Some(converter);
    }
    Ok(found)
}

/// Convert `magnitude` from `from` units to `to` units
pub fn convert<M: Magnitude>(
    registry: &dyn Registry,
    magnitude: &M,
    from: &UnitsContainer,
    to: &UnitsContainer,
) -> Result<M> {
    if from == to {
        return Ok(magnitude.clone());
    }
    let source = standalone_converter(registry, from)?;
    let target = standalone_converter(registry, to)?;
    if source.is_none() && target.is_none() {
        let factor = registry.conversion_factor(from, to)?;
        debug!(%from, %to, %factor, "converting magnitude");
        return Ok(magnitude.scale(&factor));
    }

    let from_dim = registry.base_dimensionality_of(from)?;
    let to_dim = registry.base_dimensionality_of(to)?;
    if from_dim != to_dim {
        return Err(UnitError::dimensionality_with(from, to, from_dim, to_dim));
    }
    let source = match source {
        Some(converter) => converter,
        None => Converter::Scale(registry.base_units_of(from)?.0),
    };
    let target = match target {
        Some(converter) => converter,
        None => Converter::Scale(registry.base_units_of(to)?.0),
    };
    debug!(%from, %to, ?source, ?target, "converting through reference units");
    target.from_reference(&source.to_reference(magnitude)?)
}

/// A defined unit: values map onto `reference` through `converter`
#[derive(Debug, Clone)]
struct UnitDefinition {
    symbol: Option<String>,
    converter: Converter,
    reference: UnitsContainer,
    dimensionality: UnitsContainer,
}

/// In-memory registry of base and derived units
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    config: RegistryConfig,
    units: BTreeMap<String, UnitDefinition>,
    symbols: HashMap<String, String>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Define an irreducible unit of `dimension` (e.g. "[length]").
    ///
    /// An empty dimension defines a dimensionless base unit such as radian.
    pub fn define_base_unit(&mut self, name: &str, symbol: &str, dimension: &str) -> Result<()> {
        let dimension = dimension.trim();
        let dimensionality = if dimension.is_empty() || dimension == "[]" {
            UnitsContainer::new()
        } else if dimension.starts_with('[') && dimension.ends_with(']') {
            UnitsContainer::single(dimension)
        } else {
            return Err(UnitError::Parse(format!(
                "dimension must look like '[length]', got '{}'", dimension
            )));
        };

        self.insert(name, symbol, UnitDefinition {
            symbol: None,
            converter: Converter::Scale(Number::one()),
            reference: UnitsContainer::single(name),
            dimensionality,
        });
        Ok(())
    }

    /// Define `name` as a scaled expression of existing units, e.g.
    /// `define_unit("foot", "ft", "0.3048 meter")`.
    ///
    /// A trailing `+ offset` shifts the origin, in the units of the
    /// expression: `define_unit("degC", "", "kelvin + 273.15")`.
    pub fn define_unit(&mut self, name: &str, symbol: &str, definition: &str) -> Result<()> {
        let precision = self.config.precision;
        let (value, units, offset) =
            parse::parse_definition(definition, &|unit: &str| self.resolve_name(unit), precision)?;
        let (factor, reference) = self.base_units_of(&units)?;
        let dimensionality = self.base_dimensionality_of(&units)?;

        let scale = value.mul(&factor).with_precision(precision);
        let converter = match offset {
            Some(offset) if !offset.is_zero() => {
                self.require_multiplicative(name, &units)?;
                Converter::Offset { scale, offset: offset.mul(&factor).with_precision(precision) }
            }
            _ => Converter::Scale(scale),
        };
        self.insert(name, symbol, UnitDefinition { symbol: None, converter, reference, dimensionality });
        Ok(())
    }

    /// Define a logarithmic unit: `value = logfactor * log_logbase(reference / definition)`.
    ///
    /// `define_log_unit("decibel", "dB", "1", 10, 10)` makes 20 dB equal 100.
    pub fn define_log_unit(
        &mut self,
        name: &str,
        symbol: &str,
        definition: &str,
        logbase: Number,
        logfactor: Number,
    ) -> Result<()> {
        if logbase.is_zero() || logbase.is_negative() || logbase == Number::one() {
            return Err(UnitError::InvalidArgument(format!("invalid logarithm base {} for '{}'", logbase, name)));
        }
        if logfactor.is_zero() {
            return Err(UnitError::InvalidArgument(format!("zero logarithm factor for '{}'", name)));
        }
        let (value, units) = self.parse_expression(definition)?;
        self.require_multiplicative(name, &units)?;
        let (factor, reference) = self.base_units_of(&units)?;
        let dimensionality = self.base_dimensionality_of(&units)?;

        let scale = value.mul(&factor).with_precision(self.config.precision);
        self.insert(name, symbol, UnitDefinition {
            symbol: None,
            converter: Converter::Log { scale, logbase, logfactor },
            reference,
            dimensionality,
        });
        Ok(())
    }

    /// Offset and logarithmic units need plain scaled units to stand on
    fn require_multiplicative(&self, name: &str, units: &UnitsContainer) -> Result<()> {
        for (unit, _) in units.iter() {
            if !self.definition(unit)?.converter.is_multiplicative() {
                return Err(UnitError::InvalidArgument(format!(
                    "'{}' cannot be defined in terms of the non-multiplicative unit '{}'", name, unit
                )));
            }
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, symbol: &str, mut definition: UnitDefinition) {
        if self.units.contains_key(name) {
            warn!("Redefining unit '{}'", name);
        }
        let symbol = symbol.trim();
        if !symbol.is_empty() {
            definition.symbol = Some(symbol.to_string());
            self.symbols.insert(symbol.to_string(), name.to_string());
        }
        self.units.insert(name.to_string(), definition);
    }

    /// Canonical name of a unit given by name or symbol
    pub fn canonical_name(&self, name: &str) -> Result<&str> {
        if let Some((key, _)) = self.units.get_key_value(name) {
            return Ok(key.as_str());
        }
        self.symbols
            .get(name)
            .map(|canonical| canonical.as_str())
            .ok_or_else(|| UnitError::UndefinedUnit(name.to_string()))
    }

    /// All defined unit names
    pub fn unit_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.units.keys().map(|name| name.as_str())
    }

    fn definition(&self, name: &str) -> Result<&UnitDefinition> {
        let canonical = self.canonical_name(name)?;
        self.units
            .get(canonical)
            .ok_or_else(|| UnitError::UndefinedUnit(name.to_string()))
    }

    fn resolve_name(&self, name: &str) -> Result<UnitsContainer> {
        if name == "dimensionless" {
            return Ok(UnitsContainer::new());
        }
        self.canonical_name(name).map(UnitsContainer::single)
    }
}

impl Registry for UnitRegistry {
    fn parse_expression(&self, text: &str) -> Result<(Number, UnitsContainer)> {
        parse::parse_expression(text, &|name: &str| self.resolve_name(name), self.config.precision)
    }

    fn base_units_of(&self, units: &UnitsContainer) -> Result<(Number, UnitsContainer)> {
        let mut factor = Number::one();
        let mut reference = UnitsContainer::new();
        for (name, exp) in units.iter() {
            let definition = self.definition(name)?;
            factor = factor.mul(&definition.converter.scale().powr(exp, self.config.precision)?);
            reference = reference.multiply(&definition.reference.power(exp));
        }
        Ok((factor.with_precision(self.config.precision), reference))
    }

    fn base_dimensionality_of(&self, units: &UnitsContainer) -> Result<UnitsContainer> {
        let mut dimensionality = UnitsContainer::new();
        for (name, exp) in units.iter() {
            let definition = self.definition(name)?;
            dimensionality = dimensionality.multiply(&definition.dimensionality.power(exp));
        }
        Ok(dimensionality)
    }

    fn get_symbol(&self, name: &str) -> String {
        self.definition(name)
            .ok()
            .and_then(|definition| definition.symbol.clone())
            .unwrap_or_else(|| name.to_string())
    }

    fn contains(&self, name: &str) -> bool {
        self.canonical_name(name).is_ok()
    }

    fn converter_of(&self, name: &str) -> Result<Converter> {
        Ok(self.definition(name)?.converter.clone())
    }

    fn precision(&self) -> usize {
        self.config.precision
    }

    fn default_format(&self) -> FormatOptions {
        self.config.default_format.clone()
    }

    fn default_system(&self) -> Option<String> {
        self.config.default_system.clone()
    }
}

/// Small registry shared by the crate's tests
#[cfg(test)]
pub(crate) fn test_registry() -> std::sync::Arc<dyn Registry> {
    let mut registry = UnitRegistry::new();
    registry.define_base_unit("meter", "m", "[length]").unwrap();
    registry.define_base_unit("second", "s", "[time]").unwrap();
    registry.define_base_unit("gram", "g", "[mass]").unwrap();
    registry.define_base_unit("radian", "rad", "").unwrap();
    registry.define_unit("kilogram", "kg", "1000 gram").unwrap();
    registry.define_unit("kilometer", "km", "1000 meter").unwrap();
    registry.define_unit("foot", "ft", "0.3048 meter").unwrap();
    registry.define_unit("minute", "min", "60 second").unwrap();
    registry.define_unit("hour", "h", "60 minute").unwrap();
    registry.define_unit("newton", "N", "kilogram * meter / second ** 2").unwrap();
    registry.define_unit("degree", "deg", "0.017453292519943295 radian").unwrap();
    registry.define_unit("percent", "%", "0.01").unwrap();
    registry.define_base_unit("kelvin", "K", "[temperature]").unwrap();
    registry.define_unit("degC", "", "kelvin + 273.15").unwrap();
    registry.define_unit("rankine", "degR", "5/9 kelvin").unwrap();
    registry.define_unit("degF", "", "rankine + 459.67").unwrap();
    std::sync::Arc::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(text: &str) -> UnitsContainer {
        test_registry().parse_expression(text).unwrap().1
    }

    #[test]
    fn test_symbols_resolve_to_names() {
        let registry = test_registry();
        let (value, parsed) = registry.parse_expression("3 km/h").unwrap();
        assert_eq!(value, Number::from_i64(3));
        assert_eq!(parsed, UnitsContainer::from_pairs([("kilometer", 1), ("hour", -1)]));
        assert!(registry.contains("ft"));
        assert!(!registry.contains("furlong"));
        assert_eq!(registry.get_symbol("newton"), "N");
        assert_eq!(registry.get_symbol("unknown"), "unknown");
    }

    #[test]
    fn test_base_units_of_derived() {
        let registry = test_registry();
        let (factor, reference) = registry.base_units_of(&units("newton")).unwrap();
        assert_eq!(factor, Number::from_i64(1000));
        assert_eq!(reference, UnitsContainer::from_pairs([("gram", 1), ("meter", 1), ("second", -2)]));
    }

    #[test]
    fn test_dimensionality() {
        let registry = test_registry();
        let dim = registry.base_dimensionality_of(&units("foot / minute")).unwrap();
        assert_eq!(dim, UnitsContainer::from_pairs([("[length]", 1), ("[time]", -1)]));
        assert!(registry.base_dimensionality_of(&units("degree")).unwrap().is_empty());
        assert!(registry.base_dimensionality_of(&UnitsContainer::single("furlong")).is_err());
    }

    #[test]
    fn test_conversion_factor() {
        let registry = test_registry();
        let factor = registry.conversion_factor(&units("foot"), &units("meter")).unwrap();
        assert_eq!(factor, Number::from_str("0.3048").unwrap());
        let factor = registry.conversion_factor(&units("hour"), &units("second")).unwrap();
        assert_eq!(factor, Number::from_i64(3600));

        let err = registry.conversion_factor(&units("meter"), &units("second")).unwrap_err();
        assert!(err.is_dimensionality());
        assert_eq!(
            err.to_string(),
            "Cannot convert from 'meter' ([length]) to 'second' ([time])"
        );
    }

    #[test]
    fn test_convert_magnitudes() {
        let registry = test_registry();
        let meters = convert(&*registry, &10.0_f64, &units("foot"), &units("meter")).unwrap();
        assert!((meters - 3.048).abs() < 1e-12);
        let exact = convert(&*registry, &Number::from_i64(10), &units("foot"), &units("meter")).unwrap();
        assert_eq!(exact, Number::from_str("3.048").unwrap());
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_offset_units() {
        let registry = test_registry();
        let celsius = units("degC");
        let kelvin = units("kelvin");
        let fahrenheit = units("degF");

        assert!(close(convert(&*registry, &25.0, &celsius, &kelvin).unwrap(), 298.15));
        assert!(close(convert(&*registry, &0.0, &kelvin, &celsius).unwrap(), -273.15));
        assert!(close(convert(&*registry, &212.0, &fahrenheit, &celsius).unwrap(), 100.0));
        assert!(close(convert(&*registry, &-40.0, &celsius, &fahrenheit).unwrap(), -40.0));
        assert!(close(convert(&*registry, &0.0, &fahrenheit, &units("rankine")).unwrap(), 459.67));

        let exact = convert(&*registry, &Number::from_i64(25), &celsius, &kelvin).unwrap();
        assert_eq!(exact, Number::from_str("298.15").unwrap());

        // Reference factors only carry the scale
        let (factor, reference) = registry.base_units_of(&celsius).unwrap();
        assert_eq!(factor, Number::one());
        assert_eq!(reference, kelvin);
    }

    #[test]
    fn test_offset_units_do_not_combine() {
        let registry = test_registry();
        let err = convert(&*registry, &1.0, &units("degC / second"), &units("kelvin / second")).unwrap_err();
        assert!(matches!(err, UnitError::InvalidArgument(_)));
        assert!(convert(&*registry, &1.0, &units("degC ** 2"), &units("kelvin ** 2")).is_err());
        assert!(convert(&*registry, &1.0, &units("degC"), &units("meter")).unwrap_err().is_dimensionality());
    }

    #[test]
    fn test_offset_definitions() {
        let mut registry = UnitRegistry::new();
        registry.define_base_unit("kelvin", "K", "[temperature]").unwrap();
        registry.define_unit("degC", "", "kelvin + 273.15").unwrap();
        assert!(matches!(
            registry.define_unit("hot", "", "degC + 10"),
            Err(UnitError::InvalidArgument(_))
        ));
        // A zero offset is a plain scale
        registry.define_unit("same", "", "kelvin + 0").unwrap();
        assert!(registry.converter_of("same").unwrap().is_multiplicative());
        assert!(registry.parse_expression("kelvin + 273.15").is_err());
    }

    #[test]
    fn test_logarithmic_units() {
        let mut registry = UnitRegistry::new();
        registry.define_base_unit("watt", "W", "[power]").unwrap();
        registry.define_log_unit("decibel", "dB", "1", Number::from_i64(10), Number::from_i64(10)).unwrap();
        registry.define_log_unit("decibelmilliwatt", "dBm", "1e-3 watt", Number::from_i64(10), Number::from_i64(10)).unwrap();
        let parse = |text: &str| registry.parse_expression(text).unwrap().1;

        assert!(close(convert(&registry, &20.0, &parse("dB"), &UnitsContainer::new()).unwrap(), 100.0));
        assert!(close(convert(&registry, &1000.0, &UnitsContainer::new(), &parse("dB")).unwrap(), 30.0));
        assert!(close(convert(&registry, &0.0, &parse("dBm"), &parse("watt")).unwrap(), 1e-3));
        assert!(close(convert(&registry, &1.0, &parse("watt"), &parse("dBm")).unwrap(), 30.0));
        assert!(convert(&registry, &-1.0, &parse("watt"), &parse("dBm")).is_err());

        assert!(registry.define_log_unit("bad", "", "1", Number::one(), Number::from_i64(10)).is_err());
        assert!(registry.define_log_unit("bad", "", "1", Number::from_i64(10), Number::zero()).is_err());
    }

    #[test]
    fn test_root_units() {
        let registry = test_registry();
        let (factor, root) = registry.root_units_of("kilogram").unwrap();
        assert_eq!(factor, Number::from_i64(1000));
        assert_eq!(root, UnitsContainer::single("gram"));
        let (_, root) = registry.root_units_of("gram").unwrap();
        assert_eq!(root, UnitsContainer::single("gram"));
    }

    #[test]
    fn test_invalid_dimension() {
        let mut registry = UnitRegistry::new();
        assert!(registry.define_base_unit("meter", "m", "length").is_err());
        assert!(matches!(
            registry.define_unit("foot", "ft", "0.3048 meter"),
            Err(UnitError::UndefinedUnit(_))
        ));
    }

    #[test]
    fn test_config_precision() {
        let mut registry = UnitRegistry::with_config(RegistryConfig::new().with_precision(3));
        registry.define_base_unit("meter", "m", "[length]").unwrap();
        registry.define_unit("third", "", "1/3 meter").unwrap();
        let (factor, _) = registry.base_units_of(&UnitsContainer::single("third")).unwrap();
        assert_eq!(factor, Number::from_str("0.333").unwrap());
        assert_eq!(registry.precision(), 3);
    }

    #[test]
    fn test_config_defaults_exposed() {
        let config = RegistryConfig::new()
            .with_default_system("mks")
            .with_default_format(FormatOptions::new().with_symbols(true));
        let registry = UnitRegistry::with_config(config);
        assert_eq!(registry.default_system().as_deref(), Some("mks"));
        assert!(registry.default_format().symbols);
        assert_eq!(UnitRegistry::new().default_system(), None);
    }
}
