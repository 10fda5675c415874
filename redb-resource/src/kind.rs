use core::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::err::ParseErr;

/// implements [Serialize] via [std::fmt::Display] and [Deserialize] via [FromStr] so the
/// vocabularies (including their `_Ext` variants) serialize as the same token
/// that appears in a canonical address.
macro_rules! token_serde {
    ($($ty:ty),* $(,)?) => {
        $(
            impl serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.collect_str(self)
                }
            }

            impl<'de> serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let string = String::deserialize(deserializer)?;
                    <$ty>::from_str(string.as_str())
                        .map_err(|err| serde::de::Error::custom(err.to_string()))
                }
            }
        )*
    };
}

/// the broad family of data source an address points into.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    Database,
    Stream,
    Webhook,
    ToolServer,
}

impl Protocol {
    /// the URI scheme of the canonical encoding
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Database => "redb",
            Protocol::Stream => "stream",
            Protocol::Webhook => "webhook",
            Protocol::ToolServer => "mcp",
        }
    }

    pub fn from_scheme(scheme: &str) -> Option<Self> {
        Self::iter().find(|protocol| protocol.scheme() == scheme)
    }

    /// comma separated list of every known scheme, for diagnostics
    pub fn schemes() -> String {
        Self::iter().map(|p| p.scheme()).collect::<Vec<_>>().join(", ")
    }

    /// name of the root identifier field this protocol requires
    pub fn identifier_field(&self) -> &'static str {
        match self {
            Protocol::Database => "database_id",
            Protocol::Stream | Protocol::Webhook => "connection_id",
            Protocol::ToolServer => "server_id",
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Protocol::Stream | Protocol::Webhook)
    }
}

/// distinguishes addressing a value (`data`) from addressing structural
/// information about it (`metadata`) or its definition (`schema`).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Data,
    Metadata,
    Schema,
}

impl Scope {
    /// parse a scope token, failing with [ParseErr::InvalidScope] for anything
    /// outside `data`, `metadata` and `schema`
    pub fn parse(token: &str) -> Result<Self, ParseErr> {
        Self::from_str(token).map_err(|_| ParseErr::InvalidScope(token.to_string()))
    }

    /// directional scope matrix: may a value at `self` feed a location at `target`?
    pub fn can_feed(&self, target: &Scope) -> bool {
        matches!(
            (self, target),
            (Scope::Data, Scope::Data)
                | (Scope::Metadata, Scope::Data)
                | (Scope::Schema, Scope::Schema)
                | (Scope::Schema, Scope::Metadata)
        )
    }
}

/// the kind of container an address points at.  Tokens outside the builtin
/// vocabulary are preserved in [ObjectType::_Ext] so parsing stays lossless;
/// whether they are legal is the validator's call.
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum ObjectType {
    Table,
    View,
    MaterializedView,
    Collection,
    Node,
    Relationship,
    ExternalTable,
    ForeignTable,
    Topic,
    Queue,
    Stream,
    Partition,
    Endpoint,
    Resource,
    Tool,
    Prompt,
    #[strum(default, to_string = "{0}")]
    _Ext(String),
}

impl ObjectType {
    /// the coarse category this object type belongs to
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self {
            ObjectType::Table
            | ObjectType::View
            | ObjectType::MaterializedView
            | ObjectType::ExternalTable
            | ObjectType::ForeignTable => Some(ResourceType::Tabular),
            ObjectType::Collection => Some(ResourceType::Document),
            ObjectType::Node | ObjectType::Relationship => Some(ResourceType::Graph),
            ObjectType::Topic | ObjectType::Queue | ObjectType::Stream | ObjectType::Partition => {
                Some(ResourceType::Stream)
            }
            ObjectType::Endpoint => Some(ResourceType::Webhook),
            ObjectType::Resource | ObjectType::Tool | ObjectType::Prompt => {
                Some(ResourceType::Tool)
            }
            ObjectType::_Ext(_) => None,
        }
    }

    pub fn is_ext(&self) -> bool {
        matches!(self, ObjectType::_Ext(_))
    }
}

/// coarse, display oriented category of an addressed container.  Always
/// derived from the [ObjectType], never stored.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Tabular,
    Document,
    Graph,
    Stream,
    Webhook,
    Tool,
}

/// one hop of navigation from a container down to a leaf
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum SegmentType {
    Column,
    Field,
    Property,
    Element,
    Key,
    Partition,
    Header,
    Query,
    Parameter,
    Body,
    Path,
    Attributes,
    /// names the structured payload encoding in effect from this hop on
    Schema,
    #[strum(default, to_string = "{0}")]
    _Ext(String),
}

/// the streaming platform behind a `stream://` address
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum StreamProvider {
    Kafka,
    Pulsar,
    Kinesis,
    Rabbitmq,
    Nats,
    Redis,
    Mqtt,
    Eventhubs,
    Pubsub,
    #[strum(default, to_string = "{0}")]
    _Ext(String),
}

/// the structured payload encoding named by a `schema/<format>` segment
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum SchemaFormat {
    Avro,
    Protobuf,
    Json,
    JsonSchema,
    Thrift,
    #[strum(default, to_string = "{0}")]
    _Ext(String),
}

token_serde!(ObjectType, SegmentType, StreamProvider, SchemaFormat);

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebhookDirection {
    Request,
    Response,
}

impl WebhookDirection {
    pub fn parse(token: &str) -> Result<Self, ParseErr> {
        Self::from_str(token).map_err(|_| ParseErr::InvalidDirection(token.to_string()))
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    JsonPath,
    XPath,
    Regex,
    Index,
    Key,
    Wildcard,
}

impl SelectorType {
    /// infer the selector type of a `#fragment` expression from its leading
    /// character(s)
    pub fn infer(expression: &str) -> Self {
        if expression.starts_with('$') {
            SelectorType::JsonPath
        } else if expression.starts_with('/') {
            SelectorType::XPath
        } else if expression == "*" {
            SelectorType::Wildcard
        } else if expression.starts_with('^') {
            SelectorType::Regex
        } else if !expression.is_empty() && expression.chars().all(|c| c.is_ascii_digit()) {
            SelectorType::Index
        } else {
            SelectorType::Key
        }
    }
}
