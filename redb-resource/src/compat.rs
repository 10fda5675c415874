//! decides whether a value at one address can feed another.
//!
//! Incompatibility is an ordinary outcome reported in a
//! [CompatibilityReport]; only structurally invalid addresses are errors.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::address::{ResourceAddress, ValidAddress};
use crate::err::ValidationErr;
use crate::kind::{Protocol, Scope};

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Transformation {
    ArrayToString,
    ArrayToJsonArray,
    TypeMapping,
    BatchAggregation,
    Deduplication,
    SchemaConversion,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    /// why the addresses are incompatible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub suggested_transformations: Vec<Transformation>,
    /// reserved; no current check sets it
    #[serde(default)]
    pub type_mismatch: bool,
    #[serde(default)]
    pub requires_transformation: bool,
}

impl CompatibilityReport {
    fn incompatible(reason: String) -> Self {
        Self {
            compatible: false,
            reason: Some(reason),
            ..Default::default()
        }
    }

    fn warn<S>(&mut self, warning: S)
    where
        S: ToString,
    {
        self.warnings.push(warning.to_string());
    }

    fn suggest(&mut self, transformation: Transformation) {
        if !self.suggested_transformations.contains(&transformation) {
            self.suggested_transformations.push(transformation);
        }
    }
}

/// validate both addresses, then compare them
#[instrument(level = "debug", skip_all, fields(source = %source, target = %target))]
pub fn check_compatibility(
    source: &ResourceAddress,
    target: &ResourceAddress,
) -> Result<CompatibilityReport, ValidationErr> {
    let source = source.clone().validated()?;
    let target = target.clone().validated()?;
    Ok(compatibility(&source, &target))
}

pub fn compatibility(source: &ValidAddress, target: &ValidAddress) -> CompatibilityReport {
    let report = analyze(source, target);
    debug!(
        source = %source,
        target = %target,
        compatible = report.compatible,
        warnings = report.warnings.len(),
        suggestions = report.suggested_transformations.len(),
        "compatibility checked"
    );
    report
}

/// `SchemaConversion` is suggested whenever the declared schema formats
/// differ, including when only one side declares a format: a stream carrying
/// `schema/avro` into a database column still has to be decoded.
fn analyze(source: &ResourceAddress, target: &ResourceAddress) -> CompatibilityReport {
    if !source.scope.can_feed(&target.scope) {
        return CompatibilityReport::incompatible(format!(
            "scope '{}' cannot feed scope '{}'",
            source.scope, target.scope
        ));
    }

    let mut report = CompatibilityReport {
        compatible: true,
        ..Default::default()
    };

    let source_protocol = source.protocol();
    let target_protocol = target.protocol();

    if source_protocol == Protocol::Database && target_protocol == Protocol::Stream {
        report.warn(
            "database source feeding a stream target needs continuous synchronization rather than a point read",
        );
    }
    if let (Some(source_provider), Some(target_provider)) =
        (source.stream_provider(), target.stream_provider())
    {
        if source_provider != target_provider {
            report.warn(format!(
                "cross-platform stream mapping from '{}' to '{}'",
                source_provider, target_provider
            ));
        }
    }
    if source_protocol == Protocol::Stream && target_protocol != Protocol::Stream {
        report.warn("streaming source into a non-streaming target requires buffering");
    }
    if source_protocol == Protocol::Webhook {
        report.warn("webhook sources are stateless; values are only available when pushed");
    }
    if source.depth() > target.depth() {
        report.warn(format!(
            "source is nested deeper than target ({} > {} segments); values will be flattened",
            source.depth(),
            target.depth()
        ));
    } else if target.depth() > source.depth() {
        report.warn(format!(
            "target is nested deeper than source ({} > {} segments); missing levels need default values",
            target.depth(),
            source.depth()
        ));
    }

    report.requires_transformation = (source.scope == Scope::Metadata
        && target.scope == Scope::Data)
        || source_protocol != target_protocol
        || source.depth() != target.depth();

    if report.requires_transformation {
        if source.scope == Scope::Metadata {
            let facet = facet(source);
            if facet.contains("name") {
                report.suggest(Transformation::ArrayToString);
                report.suggest(Transformation::ArrayToJsonArray);
            }
            if facet.contains("type") {
                report.suggest(Transformation::TypeMapping);
            }
        }
        if source_protocol == Protocol::Stream && target_protocol == Protocol::Database {
            report.suggest(Transformation::BatchAggregation);
            report.suggest(Transformation::Deduplication);
        }
        if source.schema_format() != target.schema_format() {
            report.suggest(Transformation::SchemaConversion);
        }
    }

    report
}

/// what a metadata address describes: its deepest segment name, or the
/// container name when it has no segments
fn facet(address: &ResourceAddress) -> String {
    address
        .last_segment()
        .and_then(|segment| segment.name.as_deref())
        .unwrap_or(address.object_name.as_str())
        .to_lowercase()
}
