use serde_json::Value;
use thiserror::Error;

use crate::kind::{ObjectType, Protocol, Scope, SegmentType, SelectorType};

/// umbrella error for callers that drive several stages at once
/// (parse -> validate -> build, or parse -> evaluate)
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ResourceErr {
    #[error(transparent)]
    Parse(#[from] ParseErr),
    #[error(transparent)]
    Validation(#[from] ValidationErr),
    #[error(transparent)]
    Build(#[from] BuildErr),
    #[error(transparent)]
    Selector(#[from] SelectorErr),
    #[error(transparent)]
    Config(#[from] ConfigErr),
}

/// failures turning text into a [crate::address::ResourceAddress]
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ParseErr {
    #[error("missing scheme in '{0}': expected '<scheme>://...'")]
    MissingScheme(String),
    #[error("unknown protocol scheme '{scheme}' (known schemes: {known})")]
    UnknownProtocol { scheme: String, known: String },
    #[error("a {protocol} address needs at least {expected} path elements but found {found}")]
    TooFewElements {
        protocol: Protocol,
        expected: usize,
        found: usize,
    },
    #[error("empty path element at position {0}")]
    EmptyElement(usize),
    #[error("invalid scope '{0}' (expected one of: data, metadata, schema)")]
    InvalidScope(String),
    #[error("expected literal '{expected}' but found '{found}'")]
    MissingToken {
        expected: &'static str,
        found: String,
    },
    #[error("invalid webhook direction '{0}' (expected 'request' or 'response')")]
    InvalidDirection(String),
    #[error("negative array index in path segment name '{0}'")]
    NegativeIndex(String),
    #[error("{what} exceeds the configured limit: {len} > {max}")]
    Limit {
        what: &'static str,
        len: usize,
        max: usize,
    },
    #[error("malformed legacy address '{0}': expected 'db://<database-id>.<object>.<field>'")]
    Legacy(String),
    #[error("legacy 'db://' addresses are disabled by settings: '{0}'")]
    LegacyDisabled(String),
    #[error("malformed template address '{uri}': {reason}")]
    Template { uri: String, reason: String },
    #[error(transparent)]
    Selector(#[from] SelectorErr),
}

impl ParseErr {
    pub fn too_few(protocol: Protocol, expected: usize, found: usize) -> Self {
        Self::TooFewElements {
            protocol,
            expected,
            found,
        }
    }

    pub fn template<U, R>(uri: U, reason: R) -> Self
    where
        U: ToString,
        R: ToString,
    {
        Self::Template {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// structural illegality found by [crate::validate::validate]
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ValidationErr {
    #[error("required field '{0}' is empty")]
    MissingField(&'static str),
    #[error("a {protocol} address requires a non-empty '{field}'")]
    MissingIdentifier {
        protocol: Protocol,
        field: &'static str,
    },
    #[error("object type '{object_type}' is not legal for protocol '{protocol}'")]
    IllegalObjectType {
        protocol: Protocol,
        object_type: ObjectType,
    },
    #[error(
        "path segment {position}: segment type '{segment_type}' is not legal for object type '{object_type}'"
    )]
    IllegalSegmentType {
        position: usize,
        segment_type: SegmentType,
        object_type: ObjectType,
    },
    #[error("path segment {position}: an array index requires a segment name")]
    IndexWithoutName { position: usize },
    #[error("webhook object name must be 'request' or 'response' but found '{0}'")]
    InvalidDirection(String),
    #[error("selector expression is empty")]
    EmptySelector,
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum BuildErr {
    #[error("cannot build an invalid address: {0}")]
    Invalid(#[from] ValidationErr),
    #[error("{protocol} addresses cannot encode scope '{scope}' (only 'data')")]
    ScopeNotEncodable { protocol: Protocol, scope: Scope },
    #[error("{field} '{value}' cannot be encoded so that it parses back unchanged")]
    Unencodable { field: &'static str, value: String },
    #[error("selector type '{kind}' would be read back as '{inferred}' from its expression")]
    SelectorType {
        kind: SelectorType,
        inferred: SelectorType,
    },
    #[error("{what} exceeds the configured limit: {len} > {max}")]
    Limit {
        what: &'static str,
        len: usize,
        max: usize,
    },
    #[error(transparent)]
    Selector(#[from] SelectorErr),
}

impl BuildErr {
    pub fn unencodable<V>(field: &'static str, value: V) -> Self
    where
        V: ToString,
    {
        Self::Unencodable {
            field,
            value: value.to_string(),
        }
    }
}

/// selector compilation and evaluation failures.  Evaluation failures are
/// always hard errors: there is no partial result.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum SelectorErr {
    #[error("selector expression is empty")]
    Empty,
    #[error("malformed jsonpath '{expression}': {reason}")]
    JsonPath { expression: String, reason: String },
    #[error("xpath expression must start with '/' but found '{0}'")]
    XPathRoot(String),
    #[error("invalid regex '{expression}': {reason}")]
    Regex { expression: String, reason: String },
    #[error("index selector expects a non-negative integer but found '{0}'")]
    IndexLiteral(String),
    #[error("payload is not valid JSON: {0}")]
    Payload(String),
    #[error("payload is not valid UTF-8")]
    Utf8,
    #[error("{step}: expected {expected} but found {found}")]
    Shape {
        step: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("index {index} is out of bounds for an array of length {len}")]
    OutOfBounds { index: usize, len: usize },
    #[error("xpath evaluation is not supported: '{0}'")]
    XPathUnsupported(String),
}

impl SelectorErr {
    pub fn jsonpath<E, R>(expression: E, reason: R) -> Self
    where
        E: ToString,
        R: ToString,
    {
        Self::JsonPath {
            expression: expression.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn shape<S>(step: S, expected: &'static str, found: &Value) -> Self
    where
        S: ToString,
    {
        Self::Shape {
            step: step.to_string(),
            expected,
            found: value_kind(found),
        }
    }
}

impl From<serde_json::Error> for SelectorErr {
    fn from(err: serde_json::Error) -> Self {
        SelectorErr::Payload(err.to_string())
    }
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ConfigErr {
    #[error("settings could not be deserialized: {0}")]
    Yaml(String),
}

impl From<serde_yaml::Error> for ConfigErr {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigErr::Yaml(err.to_string())
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
