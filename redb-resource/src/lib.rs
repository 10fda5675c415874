//! addressing for federated data sources.
//!
//! A [ResourceAddress] names a precise location inside a database, stream,
//! webhook or tool server, down to a single column, payload field or tool
//! parameter, and round trips through a canonical URI:
//!
//! ```text
//! redb://data/database/db_123/table/users/column/profile#$.address.city
//! ```
//!
//! [parse] reads the canonical form (and the legacy dotted `db://` form),
//! [build] writes it, [validate] checks structural legality per protocol and
//! [check_compatibility] decides whether one address may feed another.  The
//! optional `#` fragment is a [Selector] evaluated against raw payload bytes.

pub mod address;
pub mod build;
pub mod compat;
pub mod err;
pub mod kind;
pub mod parse;
pub mod selector;
pub mod settings;
pub mod validate;

pub use crate::address::{Metadata, PathSegment, ResourceAddress, Target, ValidAddress};
pub use crate::build::{build, build_with};
pub use crate::compat::{check_compatibility, compatibility, CompatibilityReport, Transformation};
pub use crate::err::{BuildErr, ConfigErr, ParseErr, ResourceErr, SelectorErr, ValidationErr};
pub use crate::kind::{
    ObjectType, Protocol, ResourceType, SchemaFormat, Scope, SegmentType, SelectorType,
    StreamProvider, WebhookDirection,
};
pub use crate::parse::template::TemplateAddress;
pub use crate::parse::{parse, parse_with};
pub use crate::selector::{CompiledSelector, Selector};
pub use crate::settings::{Limits, Settings, DEFAULT_SETTINGS};
pub use crate::validate::{validate, validate_with};

/// parse, validate and evaluate the address's selector against `payload` in
/// one step.  An address without a selector yields the whole payload.
pub fn resolve(uri: &str, payload: &[u8]) -> Result<Option<serde_json::Value>, ResourceErr> {
    let address = parse(uri)?.validated()?;
    match &address.selector {
        Some(selector) => Ok(selector.evaluate(payload)?),
        None => Ok(Some(serde_json::from_slice(payload).map_err(SelectorErr::from)?)),
    }
}
