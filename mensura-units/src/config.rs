//! Registry and formatting configuration

use mensura_core::DEFAULT_PRECISION;
use serde::{Deserialize, Serialize};

/// How a quantity is rendered by `Quantity::format_with`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Render unit symbols (`m / s`) instead of names (`meter / second`)
    pub symbols: bool,
    /// Decimal places for the magnitude; `None` uses the shortest form
    pub precision: Option<usize>,
}

impl FormatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols(mut self, symbols: bool) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }
}

/// Settings for a `UnitRegistry`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Significant decimal digits kept for conversion factors
    pub precision: usize,
    /// System consulted first when resolving system-prefixed unit names
    pub default_system: Option<String>,
    pub default_format: FormatOptions,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            default_system: None,
            default_format: FormatOptions::default(),
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision.max(1);
        self
    }

    pub fn with_default_system(mut self, system: impl Into<String>) -> Self {
        self.default_system = Some(system.into());
        self
    }

    pub fn with_default_format(mut self, format: FormatOptions) -> Self {
        self.default_format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = RegistryConfig::new()
            .with_precision(0)
            .with_default_system("mks")
            .with_default_format(FormatOptions::new().with_symbols(true).with_precision(3));
        assert_eq!(config.precision, 1);
        assert_eq!(config.default_system.as_deref(), Some("mks"));
        assert!(config.default_format.symbols);
        assert_eq!(config.default_format.precision, Some(3));
    }

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.precision, DEFAULT_PRECISION);
        assert_eq!(config.default_format, FormatOptions::default());
    }
}
