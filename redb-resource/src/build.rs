use core::str::FromStr;
use std::fmt::Display;

use itertools::Itertools;
use tracing::instrument;

use crate::address::{PathSegment, ResourceAddress, Target};
use crate::err::BuildErr;
use crate::kind::{Protocol, Scope, SelectorType};
use crate::parse::indexed_name;
use crate::settings::{Settings, DEFAULT_SETTINGS};
use crate::validate::validate_with;

pub fn build(address: &ResourceAddress) -> Result<String, BuildErr> {
    build_with(address, &DEFAULT_SETTINGS)
}

/// validate `address` and encode it canonically.  An address that would not
/// parse back into an equal address under `settings` is refused.
#[instrument(level = "debug", skip_all, fields(address = %address))]
pub fn build_with(address: &ResourceAddress, settings: &Settings) -> Result<String, BuildErr> {
    validate_with(address, settings)?;
    let protocol = address.protocol();
    if protocol != Protocol::Database && address.scope != Scope::Data {
        return Err(BuildErr::ScopeNotEncodable {
            protocol,
            scope: address.scope,
        });
    }
    encodable(address)?;

    let limits = &settings.limits;
    limit("path segments", address.path_segments.len(), limits.max_path_segments)?;
    if let Some(selector) = &address.selector {
        let inferred = SelectorType::infer(selector.expression());
        if selector.kind() != inferred {
            return Err(BuildErr::SelectorType {
                kind: selector.kind(),
                inferred,
            });
        }
        limit("selector", selector.expression().len(), limits.max_selector_len)?;
        selector.compile()?;
    }

    let encoded = encode(address);
    limit("uri", encoded.len(), limits.max_uri_len)?;
    Ok(encoded)
}

fn limit(what: &'static str, len: usize, max: usize) -> Result<(), BuildErr> {
    if len > max {
        Err(BuildErr::Limit { what, len, max })
    } else {
        Ok(())
    }
}

/// every element must come back unchanged from [crate::parse::parse]
fn encodable(address: &ResourceAddress) -> Result<(), BuildErr> {
    element(address.protocol().identifier_field(), address.identifier())?;
    if let Target::Stream {
        provider,
        schema_format,
        ..
    } = &address.target
    {
        token("provider", provider)?;
        let declared = address
            .path_segments
            .iter()
            .rev()
            .find_map(PathSegment::schema_format);
        if declared.as_ref() != schema_format.as_ref() {
            return Err(BuildErr::unencodable(
                "schema_format",
                schema_format
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ));
        }
    }
    token("object_type", &address.object_type)?;
    if !address.object_name.is_empty() {
        element("object_name", address.object_name.as_str())?;
    }

    let last = address.path_segments.len().saturating_sub(1);
    for (position, segment) in address.path_segments.iter().enumerate() {
        token("segment_type", &segment.segment_type)?;
        match &segment.name {
            // a flag mid path would swallow the next segment's type as its name
            None if position != last => {
                return Err(BuildErr::unencodable("flag segment", segment))
            }
            None => {}
            Some(name) => {
                element("segment name", name.as_str())?;
                let written = match segment.index {
                    Some(index) => format!("{}[{}]", name, index),
                    None => name.clone(),
                };
                if indexed_name(written.as_str()).ok() != Some((name.as_str(), segment.index)) {
                    return Err(BuildErr::unencodable("segment name", written));
                }
            }
        }
    }
    Ok(())
}

/// a path element: non-empty and free of the `/` and `#` delimiters
fn element(field: &'static str, value: &str) -> Result<(), BuildErr> {
    if value.is_empty() || value.contains(&['/', '#'][..]) {
        Err(BuildErr::unencodable(field, value))
    } else {
        Ok(())
    }
}

/// a vocabulary token, which must not read back as a different variant
fn token<T>(field: &'static str, value: &T) -> Result<(), BuildErr>
where
    T: Display + FromStr + PartialEq,
{
    let text = value.to_string();
    element(field, text.as_str())?;
    match T::from_str(text.as_str()) {
        Ok(read) if read == *value => Ok(()),
        _ => Err(BuildErr::unencodable(field, text)),
    }
}

/// the canonical string, without any validation
pub(crate) fn encode(address: &ResourceAddress) -> String {
    let root = match &address.target {
        Target::Database { database_id } => format!(
            "{}://{}/database/{}/{}/{}",
            Protocol::Database.scheme(),
            address.scope,
            database_id,
            address.object_type,
            address.object_name
        ),
        Target::Stream {
            provider,
            connection_id,
            ..
        } => format!(
            "{}://{}/{}/{}/{}",
            Protocol::Stream.scheme(),
            provider,
            connection_id,
            address.object_type,
            address.object_name
        ),
        Target::Webhook { connection_id } => format!(
            "{}://{}/{}",
            Protocol::Webhook.scheme(),
            connection_id,
            address.object_name
        ),
        Target::ToolServer { server_id } => format!(
            "{}://{}/{}/{}",
            Protocol::ToolServer.scheme(),
            server_id,
            address.object_type,
            address.object_name
        ),
    };

    let mut encoded = std::iter::once(root)
        .chain(address.path_segments.iter().map(|segment| segment.to_string()))
        .join("/");

    if let Some(selector) = &address.selector {
        encoded.push('#');
        encoded.push_str(selector.expression());
    }
    encoded
}
