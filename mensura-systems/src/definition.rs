//! System definition blocks
//!
//! ```text
//! @system <name> [using <group 1>, ..., <group N>]
//!     <new unit> : <old unit>
//!     <new unit>
//! @end
//! ```
//!
//! `old unit` is the root unit removed from the system and `new unit` the
//! unit replacing it. When the old unit is omitted it is inferred from the
//! new unit's root expansion.

use std::fmt;

use mensura_core::{Result, UnitError};
use serde::{Deserialize, Serialize};

use crate::source::SourceLines;

/// Group used by a system that names none
pub const DEFAULT_GROUP: &str = "root";

/// One substitution rule with its source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReplacement {
    pub line: usize,
    pub new_unit: String,
    pub old_unit: Option<String>,
}

/// Parsed, immutable system definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemDefinition {
    pub name: String,
    pub unit_replacements: Vec<UnitReplacement>,
    pub using_group_names: Vec<String>,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `@system <name> [using a, b]` into the name and group list
fn parse_header(line: usize, header: &str) -> Result<(String, Vec<String>)> {
    let invalid = || UnitError::system_definition(line, format!("Invalid System header syntax '{}'", header));

    let rest = header.strip_prefix("@system").ok_or_else(invalid)?;
    if !rest.starts_with(char::is_whitespace) {
        return Err(invalid());
    }
    let rest = rest.trim_start();

    let name_end = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
    let (name, rest) = rest.split_at(name_end);
    if name.is_empty() {
        return Err(invalid());
    }

    let rest = rest.trim();
    if rest.is_empty() {
        return Ok((name.to_string(), vec![DEFAULT_GROUP.to_string()]));
    }

    let groups = rest
        .strip_prefix("using")
        .filter(|groups| groups.starts_with(char::is_whitespace))
        .ok_or_else(invalid)?
        .trim();
    if groups.is_empty() {
        return Ok((name.to_string(), vec![DEFAULT_GROUP.to_string()]));
    }

    let names: Vec<String> = groups.split(',').map(|g| g.trim().to_string()).collect();
    if names.iter().any(|g| g.is_empty()) {
        return Err(UnitError::system_definition(line, format!("Empty group name in '{}'", header)));
    }
    Ok((name.to_string(), names))
}

fn parse_rule(line: usize, text: &str) -> Result<UnitReplacement> {
    let (new_unit, old_unit) = match text.split_once(':') {
        Some((new_unit, old_unit)) => {
            let old_unit = old_unit.trim();
            if old_unit.is_empty() || old_unit.contains(':') {
                return Err(UnitError::system_definition(line, format!("Invalid rule '{}'", text)));
            }
            (new_unit.trim(), Some(old_unit.to_string()))
        }
        None => (text, None),
    };
    if new_unit.is_empty() {
        return Err(UnitError::system_definition(line, format!("Invalid rule '{}'", text)));
    }
    Ok(UnitReplacement { line, new_unit: new_unit.to_string(), old_unit })
}

impl SystemDefinition {
    /// Parse a definition from numbered source lines.
    ///
    /// An empty block is reported at line 0.
    pub fn from_source(mut lines: SourceLines<'_>) -> Result<Self> {
        let (header_line, header) = lines
            .next()
            .ok_or_else(|| UnitError::system_definition(0, "Empty system definition"))?;
        let (name, using_group_names) = parse_header(header_line, header)?;

        let unit_replacements = lines
            .map(|(line, text)| parse_rule(line, text))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { name, unit_replacements, using_group_names })
    }

    pub fn from_lines(text: &str) -> Result<Self> {
        Self::from_source(SourceLines::new(text))
    }
}

impl fmt::Display for SystemDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@system {}", self.name)?;
        if self.using_group_names != [DEFAULT_GROUP] {
            write!(f, " using {}", self.using_group_names.join(", "))?;
        }
        writeln!(f)?;
        for rule in &self.unit_replacements {
            match &rule.old_unit {
                Some(old_unit) => writeln!(f, "    {} : {}", rule.new_unit, old_unit)?,
                None => writeln!(f, "    {}", rule.new_unit)?,
            }
        }
        write!(f, "@end")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mensura_core::codes;

    #[test]
    fn test_header_with_groups() {
        let def = SystemDefinition::from_lines("@system mks using international, USCSLengthInternational\n kilogram : gram\n@end").unwrap();
        assert_eq!(def.name, "mks");
        assert_eq!(def.using_group_names, vec!["international", "USCSLengthInternational"]);
        assert_eq!(
            def.unit_replacements,
            vec![UnitReplacement { line: 2, new_unit: "kilogram".to_string(), old_unit: Some("gram".to_string()) }]
        );
    }

    #[test]
    fn test_default_group() {
        let def = SystemDefinition::from_lines("@system mysys").unwrap();
        assert_eq!(def.using_group_names, vec!["root"]);
        assert!(def.unit_replacements.is_empty());
    }

    #[test]
    fn test_bare_rules_keep_line_numbers() {
        let text = "@system cgs\n    centimeter\n\n    # mass\n    gram\n    second\n@end";
        let def = SystemDefinition::from_lines(text).unwrap();
        let rules: Vec<_> = def.unit_replacements.iter().map(|r| (r.line, r.new_unit.as_str(), r.old_unit.clone())).collect();
        assert_eq!(rules, vec![(2, "centimeter", None), (5, "gram", None), (6, "second", None)]);
    }

    #[test]
    fn test_invalid_headers() {
        for header in ["@group mks", "@system", "@system   ", "@systemmks", "@system mks uses x", "@system mks using a,,b"] {
            let err = SystemDefinition::from_lines(header).unwrap_err();
            assert_eq!(err.code(), codes::SYSTEM_DEFINITION, "{}", header);
        }
    }

    #[test]
    fn test_invalid_rules() {
        let err = SystemDefinition::from_lines("@system s\nmeter : \n").unwrap_err();
        assert_eq!(err, UnitError::system_definition(2, "Invalid rule 'meter :'"));
        assert!(SystemDefinition::from_lines("@system s\n: meter").is_err());
        assert!(SystemDefinition::from_lines("@system s\na : b : c").is_err());
    }

    #[test]
    fn test_empty_block() {
        let err = SystemDefinition::from_lines("# nothing here\n").unwrap_err();
        assert!(matches!(err, UnitError::SystemDefinition { line: 0, .. }));
    }

    #[test]
    fn test_display_reparses() {
        let text = "@system imperial using USCS\n    yard\n    pound : gram\n@end";
        let def = SystemDefinition::from_lines(text).unwrap();
        assert_eq!(def.to_string(), text);
        assert_eq!(SystemDefinition::from_lines(&def.to_string()).unwrap(), def);
    }

    #[test]
    fn test_serde() {
        let def = SystemDefinition::from_lines("@system mks\nmeter").unwrap();
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["name"], "mks");
        assert_eq!(json["unit_replacements"][0]["old_unit"], serde_json::Value::Null);
        let back: SystemDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }
}
