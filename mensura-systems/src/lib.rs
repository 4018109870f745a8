//! Mensura Systems - Measurement systems
//!
//! A system is a named set of unit groups plus rules that replace root units
//! with preferred ones (kilogram instead of gram, foot instead of meter).
//! Systems are written as definition blocks:
//!
//! ```text
//! @system mks using international
//!     meter
//!     kilogram : gram
//!     second
//! @end
//! ```

mod definition;
mod group;
mod lister;
mod scope;
mod source;
mod system;

pub use definition::{SystemDefinition, UnitReplacement, DEFAULT_GROUP};
pub use group::{Group, GroupTable, GroupVersion, UnitGroup};
pub use lister::{guard_attribute, Lister};
pub use scope::SystemScope;
pub use source::SourceLines;
pub use system::{RootResolver, System};

/// Re-export the quantity API alongside systems
pub mod prelude {
    pub use crate::{Group, Lister, System, SystemDefinition, SystemScope, UnitGroup};
    pub use mensura_units::prelude::*;
}
