use core::str::FromStr;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::build::encode;
use crate::err::{ParseErr, ValidationErr};
use crate::kind::{
    ObjectType, Protocol, ResourceType, SchemaFormat, Scope, SegmentType, StreamProvider,
    WebhookDirection,
};
use crate::parse::{parse, segment};
use crate::selector::Selector;
use crate::validate::validate;

/// caller annotations.  Not part of the canonical string.
pub type Metadata = BTreeMap<String, Value>;

/// the protocol specific root of an address.  Each variant carries only the
/// identifiers its protocol uses, so an address can never hold a stray
/// `server_id` on a database target.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "kebab-case")]
pub enum Target {
    Database {
        database_id: String,
    },
    Stream {
        provider: StreamProvider,
        connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema_format: Option<SchemaFormat>,
    },
    Webhook {
        connection_id: String,
    },
    ToolServer {
        server_id: String,
    },
}

impl Target {
    pub fn protocol(&self) -> Protocol {
        match self {
            Target::Database { .. } => Protocol::Database,
            Target::Stream { .. } => Protocol::Stream,
            Target::Webhook { .. } => Protocol::Webhook,
            Target::ToolServer { .. } => Protocol::ToolServer,
        }
    }

    /// the root identifier required by this target's protocol
    pub fn identifier(&self) -> &str {
        match self {
            Target::Database { database_id } => database_id.as_str(),
            Target::Stream { connection_id, .. } | Target::Webhook { connection_id } => {
                connection_id.as_str()
            }
            Target::ToolServer { server_id } => server_id.as_str(),
        }
    }
}

/// a precise location inside a connected data source
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResourceAddress {
    pub scope: Scope,
    pub target: Target,
    pub object_type: ObjectType,
    pub object_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_segments: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl ResourceAddress {
    fn new(scope: Scope, target: Target, object_type: ObjectType, object_name: String) -> Self {
        Self {
            scope,
            target,
            object_type,
            object_name,
            path_segments: vec![],
            selector: None,
            metadata: Metadata::new(),
        }
    }

    pub fn database<I, N>(scope: Scope, database_id: I, object_type: ObjectType, object_name: N) -> Self
    where
        I: ToString,
        N: ToString,
    {
        Self::new(
            scope,
            Target::Database {
                database_id: database_id.to_string(),
            },
            object_type,
            object_name.to_string(),
        )
    }

    pub fn stream<C, N>(
        provider: StreamProvider,
        connection_id: C,
        object_type: ObjectType,
        object_name: N,
    ) -> Self
    where
        C: ToString,
        N: ToString,
    {
        Self::new(
            Scope::Data,
            Target::Stream {
                provider,
                connection_id: connection_id.to_string(),
                schema_format: None,
            },
            object_type,
            object_name.to_string(),
        )
    }

    /// webhook addresses are always `endpoint`s named by their direction
    pub fn webhook<C>(connection_id: C, direction: WebhookDirection) -> Self
    where
        C: ToString,
    {
        Self::new(
            Scope::Data,
            Target::Webhook {
                connection_id: connection_id.to_string(),
            },
            ObjectType::Endpoint,
            direction.to_string(),
        )
    }

    pub fn tool_server<S, N>(server_id: S, object_type: ObjectType, object_name: N) -> Self
    where
        S: ToString,
        N: ToString,
    {
        Self::new(
            Scope::Data,
            Target::ToolServer {
                server_id: server_id.to_string(),
            },
            object_type,
            object_name.to_string(),
        )
    }

    pub fn add_path_segment<N>(mut self, segment_type: SegmentType, name: N) -> Self
    where
        N: ToString,
    {
        self.push_segment(PathSegment::new(segment_type, name));
        self
    }

    pub fn add_path_segment_with_index<N>(
        mut self,
        segment_type: SegmentType,
        name: N,
        index: usize,
    ) -> Self
    where
        N: ToString,
    {
        self.push_segment(PathSegment::indexed(segment_type, name, index));
        self
    }

    /// a trailing type-only segment
    pub fn add_flag_segment(mut self, segment_type: SegmentType) -> Self {
        self.push_segment(PathSegment::flag(segment_type));
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: ToString,
        V: Into<Value>,
    {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// append a segment.  On a stream target a named `schema` segment also
    /// sets the schema format; the last one wins.
    pub fn push_segment(&mut self, segment: PathSegment) {
        if let Target::Stream { schema_format, .. } = &mut self.target {
            if let Some(format) = segment.schema_format() {
                *schema_format = Some(format);
            }
        }
        self.path_segments.push(segment);
    }

    pub fn protocol(&self) -> Protocol {
        self.target.protocol()
    }

    /// derived from the object type; `None` for extension object types
    pub fn resource_type(&self) -> Option<ResourceType> {
        self.object_type.resource_type()
    }

    pub fn identifier(&self) -> &str {
        self.target.identifier()
    }

    pub fn database_id(&self) -> Option<&str> {
        match &self.target {
            Target::Database { database_id } => Some(database_id.as_str()),
            _ => None,
        }
    }

    pub fn connection_id(&self) -> Option<&str> {
        match &self.target {
            Target::Stream { connection_id, .. } | Target::Webhook { connection_id } => {
                Some(connection_id.as_str())
            }
            _ => None,
        }
    }

    pub fn server_id(&self) -> Option<&str> {
        match &self.target {
            Target::ToolServer { server_id } => Some(server_id.as_str()),
            _ => None,
        }
    }

    pub fn stream_provider(&self) -> Option<&StreamProvider> {
        match &self.target {
            Target::Stream { provider, .. } => Some(provider),
            _ => None,
        }
    }

    pub fn schema_format(&self) -> Option<&SchemaFormat> {
        match &self.target {
            Target::Stream { schema_format, .. } => schema_format.as_ref(),
            _ => None,
        }
    }

    /// nesting depth below the container
    pub fn depth(&self) -> usize {
        self.path_segments.len()
    }

    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.path_segments.last()
    }

    pub fn validated(self) -> Result<ValidAddress, ValidationErr> {
        validate(&self)?;
        Ok(ValidAddress(self))
    }
}

/// the canonical encoding, without validation.  Use [crate::build::build] for
/// the validating form.
impl Display for ResourceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(encode(self).as_str())
    }
}

impl FromStr for ResourceAddress {
    type Err = ParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// an address that passed validation.  It cannot be mutated in place;
/// [ValidAddress::into_inner] hands back a plain [ResourceAddress] that must
/// be validated again after any change.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidAddress(ResourceAddress);

impl ValidAddress {
    pub fn into_inner(self) -> ResourceAddress {
        self.0
    }
}

impl Deref for ValidAddress {
    type Target = ResourceAddress;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<ResourceAddress> for ValidAddress {
    fn as_ref(&self) -> &ResourceAddress {
        &self.0
    }
}

impl TryFrom<ResourceAddress> for ValidAddress {
    type Error = ValidationErr;

    fn try_from(address: ResourceAddress) -> Result<Self, Self::Error> {
        address.validated()
    }
}

impl Display for ValidAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// one hop from a container down to a leaf.  Encoded as `type/name[index]`,
/// or just `type` for a flag segment.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn new<N>(segment_type: SegmentType, name: N) -> Self
    where
        N: ToString,
    {
        Self {
            segment_type,
            name: Some(name.to_string()),
            index: None,
        }
    }

    pub fn indexed<N>(segment_type: SegmentType, name: N, index: usize) -> Self
    where
        N: ToString,
    {
        Self {
            segment_type,
            name: Some(name.to_string()),
            index: Some(index),
        }
    }

    pub fn flag(segment_type: SegmentType) -> Self {
        Self {
            segment_type,
            name: None,
            index: None,
        }
    }

    /// the format a named `schema` segment declares
    pub fn schema_format(&self) -> Option<SchemaFormat> {
        match (&self.segment_type, &self.name) {
            (SegmentType::Schema, Some(name)) => Some(
                SchemaFormat::from_str(name.as_str())
                    .unwrap_or_else(|_| SchemaFormat::_Ext(name.clone())),
            ),
            _ => None,
        }
    }

    pub fn is_flag(&self) -> bool {
        self.name.is_none()
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segment_type)?;
        if let Some(name) = &self.name {
            write!(f, "/{}", name)?;
        }
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

impl FromStr for PathSegment {
    type Err = ParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            None => segment(s, None, 0),
            Some((segment_type, name)) => segment(segment_type, Some(name), 0),
        }
    }
}
