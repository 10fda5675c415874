//! canonical address parsing.
//!
//! ```text
//! redb://{scope}/database/{id}/{object-type}/{name}/...
//! stream://{provider}/{connection-id}/{object-type}/{name}/...
//! webhook://{connection-id}/{request|response}/...
//! mcp://{server-id}/{object-type}/{name}/...
//! db://{database-id}.{object}.{field}                  (legacy)
//! ```
//!
//! `...` is zero or more `{segment-type}/{segment-name}` pairs, optionally
//! ending in a lone `{segment-type}` flag.  Any of the above may carry a
//! trailing `#{selector}`.

use core::str::FromStr;

use nom::bytes::complete::{take_till, take_till1};
use nom::character::complete::char;
use nom::combinator::all_consuming;
use nom::sequence::{delimited, pair};
use tracing::{debug, instrument, warn};

use crate::address::{PathSegment, ResourceAddress};
use crate::err::{ParseErr, SelectorErr};
use crate::kind::{ObjectType, Protocol, Scope, SegmentType, StreamProvider, WebhookDirection};
use crate::parse::util::{result, scheme, Res};
use crate::selector::Selector;
use crate::settings::{Limits, Settings, DEFAULT_SETTINGS};

pub mod template;
pub mod util;

const LEGACY_SCHEME: &str = "db://";

pub fn parse(uri: &str) -> Result<ResourceAddress, ParseErr> {
    parse_with(uri, &DEFAULT_SETTINGS)
}

/// parse `uri` into a complete address, or fail without producing anything.
/// The result is structurally parsed but not validated.
#[instrument(level = "debug", skip(settings))]
pub fn parse_with(uri: &str, settings: &Settings) -> Result<ResourceAddress, ParseErr> {
    let limits = &settings.limits;
    limit("uri", uri.len(), limits.max_uri_len)?;

    let (body, selector) = match uri.split_once('#') {
        None => (uri, None),
        Some((_, "")) => return Err(SelectorErr::Empty.into()),
        Some((body, expression)) => {
            limit("selector", expression.len(), limits.max_selector_len)?;
            (body, Some(Selector::new(expression)))
        }
    };

    let rewritten;
    let body = match body.strip_prefix(LEGACY_SCHEME) {
        Some(legacy) => {
            if !settings.legacy {
                return Err(ParseErr::LegacyDisabled(uri.to_string()));
            }
            rewritten = rewrite_legacy(legacy).ok_or_else(|| ParseErr::Legacy(uri.to_string()))?;
            debug!(legacy = uri, canonical = rewritten.as_str(), "rewrote legacy address");
            rewritten.as_str()
        }
        None => body,
    };

    let (rest, scheme) = scheme(body).map_err(|_| ParseErr::MissingScheme(uri.to_string()))?;
    let protocol = Protocol::from_scheme(scheme).ok_or_else(|| ParseErr::UnknownProtocol {
        scheme: scheme.to_string(),
        known: Protocol::schemes(),
    })?;
    debug!(%protocol, uri, "parsing address");

    let elements: Vec<&str> = rest.split('/').collect();
    let (mut address, consumed) = match protocol {
        Protocol::Database => database(elements.as_slice())?,
        Protocol::Stream => stream(elements.as_slice())?,
        Protocol::Webhook => webhook(elements.as_slice())?,
        Protocol::ToolServer => tool_server(elements.as_slice())?,
    };

    for segment in segments(elements.as_slice(), consumed, limits)? {
        address.push_segment(segment);
    }

    if let Some(selector) = selector {
        selector.compile()?;
        address.selector = Some(selector);
    }

    Ok(address)
}

/// `{id}.{object}.{field}` -> `redb://data/database/{id}/table/{object}/column/{field}`
fn rewrite_legacy(legacy: &str) -> Option<String> {
    let parts: Vec<&str> = legacy.split('.').collect();
    match parts.as_slice() {
        [database_id, object, field]
            if !database_id.is_empty() && !object.is_empty() && !field.is_empty() =>
        {
            Some(format!(
                "redb://{}/database/{}/{}/{}/{}/{}",
                Scope::Data,
                database_id,
                ObjectType::Table,
                object,
                SegmentType::Column,
                field
            ))
        }
        _ => None,
    }
}

fn limit(what: &'static str, len: usize, max: usize) -> Result<(), ParseErr> {
    if len > max {
        Err(ParseErr::Limit { what, len, max })
    } else {
        Ok(())
    }
}

fn required<'a>(elements: &[&'a str], position: usize) -> Result<&'a str, ParseErr> {
    match elements.get(position) {
        Some(element) if !element.is_empty() => Ok(*element),
        _ => Err(ParseErr::EmptyElement(position)),
    }
}

/// the container name may be empty only when it is the final element
fn object_name(elements: &[&str], position: usize) -> Result<String, ParseErr> {
    match elements.get(position) {
        Some(name) if !name.is_empty() || position + 1 == elements.len() => Ok(name.to_string()),
        _ => Err(ParseErr::EmptyElement(position)),
    }
}

fn object_type(token: &str) -> ObjectType {
    ObjectType::from_str(token).unwrap_or_else(|_| ObjectType::_Ext(token.to_string()))
}

fn check_len(protocol: Protocol, elements: &[&str], expected: usize) -> Result<(), ParseErr> {
    if elements.len() < expected {
        Err(ParseErr::too_few(protocol, expected, elements.len()))
    } else {
        Ok(())
    }
}

/// `{scope}/database/{id}/{object-type}/{name}`.  A leading empty element
/// (`redb:///{scope}/...`) puts the scope in the first path position, which
/// older writers produced.
fn database(elements: &[&str]) -> Result<(ResourceAddress, usize), ParseErr> {
    let offset = match elements.first() {
        Some(&"") if elements.len() > 1 => 1,
        _ => 0,
    };
    let elements = &elements[offset..];
    check_len(Protocol::Database, elements, 5)?;

    let scope = Scope::parse(required(elements, 0)?)?;
    match required(elements, 1)? {
        "database" => {}
        found => {
            return Err(ParseErr::MissingToken {
                expected: "database",
                found: found.to_string(),
            })
        }
    }
    let database_id = required(elements, 2)?;
    let object_type = object_type(required(elements, 3)?);
    let object_name = object_name(elements, 4)?;

    Ok((
        ResourceAddress::database(scope, database_id, object_type, object_name),
        offset + 5,
    ))
}

/// `{provider}/{connection-id}/{object-type}/{name}`
fn stream(elements: &[&str]) -> Result<(ResourceAddress, usize), ParseErr> {
    check_len(Protocol::Stream, elements, 4)?;
    let provider = required(elements, 0)?;
    let provider =
        StreamProvider::from_str(provider).unwrap_or_else(|_| StreamProvider::_Ext(provider.to_string()));
    let connection_id = required(elements, 1)?;
    let object_type = object_type(required(elements, 2)?);
    let object_name = object_name(elements, 3)?;

    Ok((
        ResourceAddress::stream(provider, connection_id, object_type, object_name),
        4,
    ))
}

/// `{connection-id}/{request|response}`
fn webhook(elements: &[&str]) -> Result<(ResourceAddress, usize), ParseErr> {
    check_len(Protocol::Webhook, elements, 2)?;
    let connection_id = required(elements, 0)?;
    let direction = WebhookDirection::parse(elements[1])?;
    Ok((ResourceAddress::webhook(connection_id, direction), 2))
}

/// `{server-id}/{object-type}/{name}`
fn tool_server(elements: &[&str]) -> Result<(ResourceAddress, usize), ParseErr> {
    check_len(Protocol::ToolServer, elements, 3)?;
    let server_id = required(elements, 0)?;
    let object_type = object_type(required(elements, 1)?);
    let object_name = object_name(elements, 2)?;
    Ok((
        ResourceAddress::tool_server(server_id, object_type, object_name),
        3,
    ))
}

/// pair up the elements from `offset` on into segments
fn segments(
    elements: &[&str],
    offset: usize,
    limits: &Limits,
) -> Result<Vec<PathSegment>, ParseErr> {
    let rest = elements.get(offset..).unwrap_or_default();
    limit("path segments", rest.len().div_ceil(2), limits.max_path_segments)?;
    rest.chunks(2)
        .enumerate()
        .map(|(i, chunk)| segment(chunk[0], chunk.get(1).copied(), offset + i * 2))
        .collect()
}

/// one segment from its type element at `position` and an optional name
/// element after it.  A name of the form `name[index]` is split; a malformed
/// index is tolerated and the name kept verbatim, but a negative index is an
/// error.
pub(crate) fn segment(
    segment_type: &str,
    name: Option<&str>,
    position: usize,
) -> Result<PathSegment, ParseErr> {
    if segment_type.is_empty() {
        return Err(ParseErr::EmptyElement(position));
    }
    let segment_type = SegmentType::from_str(segment_type)
        .unwrap_or_else(|_| SegmentType::_Ext(segment_type.to_string()));

    let name = match name {
        None => return Ok(PathSegment::flag(segment_type)),
        Some("") => return Err(ParseErr::EmptyElement(position + 1)),
        Some(name) => name,
    };

    match indexed_name(name)? {
        (name, Some(index)) => Ok(PathSegment::indexed(segment_type, name, index)),
        (name, None) => Ok(PathSegment::new(segment_type, name)),
    }
}

pub(crate) fn indexed_name(name: &str) -> Result<(&str, Option<usize>), ParseErr> {
    if !name.contains('[') {
        return Ok((name, None));
    }
    match result(bracketed(name)) {
        Ok((base, index)) => {
            if let Ok(index) = index.parse::<usize>() {
                return Ok((base, Some(index)));
            }
            if index
                .strip_prefix('-')
                .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            {
                return Err(ParseErr::NegativeIndex(name.to_string()));
            }
            warn!(segment = name, "ignoring unparsable index in segment name");
            Ok((name, None))
        }
        Err(_) => {
            warn!(segment = name, "ignoring malformed brackets in segment name");
            Ok((name, None))
        }
    }
}

fn bracketed(input: &str) -> Res<(&str, &str)> {
    all_consuming(pair(
        take_till1(|c: char| c == '['),
        delimited(char('['), take_till(|c: char| c == ']'), char(']')),
    ))(input)
}

#[cfg(test)]
pub mod test {
    use crate::address::PathSegment;
    use crate::err::{ParseErr, SelectorErr};
    use crate::kind::{
        ObjectType, Protocol, SchemaFormat, Scope, SegmentType, SelectorType, StreamProvider,
    };
    use crate::parse::{indexed_name, parse, parse_with};
    use crate::settings::{LimitsBuilder, Settings};
    use crate::test::init_logging;

    #[test]
    pub fn database_address() {
        let address = parse("redb://data/database/db_123/table/users/column/email").unwrap();
        assert_eq!(address.protocol(), Protocol::Database);
        assert_eq!(address.scope, Scope::Data);
        assert_eq!(address.database_id(), Some("db_123"));
        assert_eq!(address.object_type, ObjectType::Table);
        assert_eq!(address.object_name, "users");
        assert_eq!(
            address.path_segments,
            vec![PathSegment::new(SegmentType::Column, "email")]
        );
        assert!(address.selector.is_none());
    }

    #[test]
    pub fn scope_in_first_path_position() {
        let authority = parse("redb://metadata/database/db/table/users").unwrap();
        let path = parse("redb:///metadata/database/db/table/users").unwrap();
        assert_eq!(authority, path);
        assert_eq!(path.scope, Scope::Metadata);
    }

    #[test]
    pub fn database_failures() {
        assert_eq!(
            parse("redb://everything/database/db/table/users"),
            Err(ParseErr::InvalidScope("everything".to_string()))
        );
        assert_eq!(
            parse("redb://data/db/db_123/table/users"),
            Err(ParseErr::MissingToken {
                expected: "database",
                found: "db".to_string()
            })
        );
        assert_eq!(
            parse("redb://data/database/db_123/table"),
            Err(ParseErr::too_few(Protocol::Database, 5, 4))
        );
        assert_eq!(
            parse("redb://data/database//table/users"),
            Err(ParseErr::EmptyElement(2))
        );
    }

    #[test]
    pub fn container_level() {
        let address = parse("redb://data/database/db/table/").unwrap();
        assert_eq!(address.object_name, "");
        assert!(address.path_segments.is_empty());
        assert_eq!(
            parse("redb://data/database/db/table//column/a"),
            Err(ParseErr::EmptyElement(4))
        );
    }

    #[test]
    pub fn stream_address() {
        let address =
            parse("stream://kafka/conn_prod/topic/events/schema/avro/field/user_id").unwrap();
        assert_eq!(address.protocol(), Protocol::Stream);
        assert_eq!(address.scope, Scope::Data);
        assert_eq!(address.stream_provider(), Some(&StreamProvider::Kafka));
        assert_eq!(address.connection_id(), Some("conn_prod"));
        assert_eq!(address.schema_format(), Some(&SchemaFormat::Avro));
        assert_eq!(address.depth(), 2);

        let address = parse("stream://redpanda/c/topic/t").unwrap();
        assert_eq!(
            address.stream_provider(),
            Some(&StreamProvider::_Ext("redpanda".to_string()))
        );
        assert_eq!(address.schema_format(), None);
        assert_eq!(
            parse("stream://kafka/c/topic"),
            Err(ParseErr::too_few(Protocol::Stream, 4, 3))
        );
    }

    #[test]
    pub fn webhook_address() {
        let address = parse("webhook://hook_1/request/body/payload/field/id").unwrap();
        assert_eq!(address.object_type, ObjectType::Endpoint);
        assert_eq!(address.object_name, "request");
        assert_eq!(address.connection_id(), Some("hook_1"));
        assert_eq!(address.depth(), 2);
        assert_eq!(
            parse("webhook://hook_1/reply"),
            Err(ParseErr::InvalidDirection("reply".to_string()))
        );
        assert_eq!(
            parse("webhook://hook_1"),
            Err(ParseErr::too_few(Protocol::Webhook, 2, 1))
        );
    }

    #[test]
    pub fn tool_server_address() {
        let address = parse("mcp://srv/tool/search/parameter/query").unwrap();
        assert_eq!(address.server_id(), Some("srv"));
        assert_eq!(address.object_type, ObjectType::Tool);
        assert_eq!(
            address.path_segments,
            vec![PathSegment::new(SegmentType::Parameter, "query")]
        );
    }

    #[test]
    pub fn scheme_failures() {
        assert!(matches!(
            parse("data/database/db/table/users"),
            Err(ParseErr::MissingScheme(_))
        ));
        match parse("ftp://host/file") {
            Err(ParseErr::UnknownProtocol { scheme, known }) => {
                assert_eq!(scheme, "ftp");
                assert!(known.contains("mcp"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse("template://ns/database/table/users"),
            Err(ParseErr::UnknownProtocol { .. })
        ));
    }

    #[test]
    pub fn flag_segment() {
        let address = parse("webhook://hook_1/response/header/x-trace/body").unwrap();
        assert_eq!(
            address.path_segments,
            vec![
                PathSegment::new(SegmentType::Header, "x-trace"),
                PathSegment::flag(SegmentType::Body)
            ]
        );
    }

    #[test]
    pub fn bracket_index() {
        let address = parse("redb://data/database/db/collection/orders/field/items[2]").unwrap();
        assert_eq!(
            address.path_segments,
            vec![PathSegment::indexed(SegmentType::Field, "items", 2)]
        );
        assert_eq!(
            parse("redb://data/database/db/collection/orders/field/items[-1]"),
            Err(ParseErr::NegativeIndex("items[-1]".to_string()))
        );
    }

    /// malformed indexes keep the name verbatim instead of failing the parse
    #[test]
    pub fn lenient_bracket_index() {
        init_logging();
        for name in ["items[x]", "items[]", "[3]", "items[2", "items[2]x"] {
            assert_eq!(indexed_name(name).unwrap(), (name, None), "{}", name);
        }
        let address = parse("redb://data/database/db/collection/orders/field/items[two]").unwrap();
        assert_eq!(
            address.path_segments,
            vec![PathSegment::new(SegmentType::Field, "items[two]")]
        );
    }

    #[test]
    pub fn selector_fragment() {
        let address =
            parse("redb://data/database/db_123/table/users/column/profile#$.address.city")
                .unwrap();
        let selector = address.selector.as_ref().unwrap();
        assert_eq!(selector.kind(), SelectorType::JsonPath);
        assert_eq!(selector.expression(), "$.address.city");
        assert!(selector.is_compiled());

        assert_eq!(
            parse("redb://data/database/db/table/users#"),
            Err(ParseErr::Selector(SelectorErr::Empty))
        );
        assert!(matches!(
            parse("redb://data/database/db/table/users#$..x"),
            Err(ParseErr::Selector(SelectorErr::JsonPath { .. }))
        ));
        assert!(matches!(
            parse("redb://data/database/db/table/users#$.x").map(|a| a.depth()),
            Ok(0)
        ));
    }

    #[test]
    pub fn legacy() {
        init_logging();
        assert_eq!(
            parse("db://database_id.table.column").unwrap(),
            parse("redb://data/database/database_id/table/table/column/column").unwrap()
        );
        assert_eq!(
            parse("db://a.b"),
            Err(ParseErr::Legacy("db://a.b".to_string()))
        );
        assert!(matches!(parse("db://a..c"), Err(ParseErr::Legacy(_))));
        let settings = Settings {
            legacy: false,
            ..Settings::default()
        };
        assert!(matches!(
            parse_with("db://a.b.c", &settings),
            Err(ParseErr::LegacyDisabled(_))
        ));
    }

    #[test]
    pub fn limits() {
        let settings = Settings::default().with_limits(
            LimitsBuilder::default()
                .max_uri_len(64)
                .max_path_segments(1)
                .max_selector_len(4)
                .build()
                .unwrap(),
        );
        assert!(parse_with("redb://data/database/db/table/t/column/a", &settings).is_ok());
        assert_eq!(
            parse_with("redb://data/database/db/table/t/column/a/field", &settings),
            Err(ParseErr::Limit {
                what: "path segments",
                len: 2,
                max: 1
            })
        );
        assert!(matches!(
            parse_with("redb://data/database/db/table/t#$.abc", &settings),
            Err(ParseErr::Limit {
                what: "selector",
                ..
            })
        ));
        let long = format!("redb://data/database/db/table/{}", "t".repeat(64));
        assert!(matches!(
            parse_with(long.as_str(), &settings),
            Err(ParseErr::Limit { what: "uri", .. })
        ));
    }
}
