use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::address::{ResourceAddress, Target};
use crate::err::ValidationErr;
use crate::kind::{ObjectType, Protocol, SegmentType, StreamProvider, WebhookDirection};
use crate::settings::{Settings, DEFAULT_SETTINGS};

static OBJECT_TYPES: Lazy<HashMap<Protocol, HashSet<ObjectType>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        Protocol::Database,
        HashSet::from([
            ObjectType::Table,
            ObjectType::View,
            ObjectType::MaterializedView,
            ObjectType::Collection,
            ObjectType::Node,
            ObjectType::Relationship,
            ObjectType::ExternalTable,
            ObjectType::ForeignTable,
        ]),
    );
    map.insert(
        Protocol::Stream,
        HashSet::from([
            ObjectType::Topic,
            ObjectType::Queue,
            ObjectType::Stream,
            ObjectType::Partition,
        ]),
    );
    map.insert(Protocol::Webhook, HashSet::from([ObjectType::Endpoint]));
    map.insert(
        Protocol::ToolServer,
        HashSet::from([ObjectType::Resource, ObjectType::Tool, ObjectType::Prompt]),
    );
    map
});

static SEGMENT_TYPES: Lazy<HashMap<ObjectType, HashSet<SegmentType>>> = Lazy::new(|| {
    let tabular = HashSet::from([
        SegmentType::Column,
        SegmentType::Field,
        SegmentType::Element,
        SegmentType::Key,
    ]);
    let graph = HashSet::from([
        SegmentType::Property,
        SegmentType::Attributes,
        SegmentType::Field,
        SegmentType::Element,
        SegmentType::Key,
    ]);
    let stream = HashSet::from([
        SegmentType::Partition,
        SegmentType::Key,
        SegmentType::Header,
        SegmentType::Field,
        SegmentType::Element,
        SegmentType::Schema,
        SegmentType::Body,
    ]);

    let mut map = HashMap::new();
    for object_type in [
        ObjectType::Table,
        ObjectType::View,
        ObjectType::MaterializedView,
        ObjectType::ExternalTable,
        ObjectType::ForeignTable,
    ] {
        map.insert(object_type, tabular.clone());
    }
    map.insert(
        ObjectType::Collection,
        HashSet::from([
            SegmentType::Field,
            SegmentType::Element,
            SegmentType::Key,
            SegmentType::Attributes,
        ]),
    );
    map.insert(ObjectType::Node, graph.clone());
    map.insert(ObjectType::Relationship, graph);
    map.insert(ObjectType::Topic, stream.clone());
    map.insert(ObjectType::Queue, stream.clone());
    map.insert(ObjectType::Stream, stream);
    map.insert(
        ObjectType::Partition,
        HashSet::from([
            SegmentType::Key,
            SegmentType::Header,
            SegmentType::Field,
            SegmentType::Element,
            SegmentType::Schema,
        ]),
    );
    map.insert(
        ObjectType::Endpoint,
        HashSet::from([
            SegmentType::Body,
            SegmentType::Header,
            SegmentType::Query,
            SegmentType::Path,
            SegmentType::Field,
            SegmentType::Element,
        ]),
    );
    map.insert(
        ObjectType::Resource,
        HashSet::from([
            SegmentType::Field,
            SegmentType::Element,
            SegmentType::Key,
            SegmentType::Path,
        ]),
    );
    map.insert(
        ObjectType::Tool,
        HashSet::from([
            SegmentType::Parameter,
            SegmentType::Field,
            SegmentType::Element,
        ]),
    );
    map.insert(
        ObjectType::Prompt,
        HashSet::from([SegmentType::Parameter, SegmentType::Field]),
    );
    map
});

/// is `object_type` one of `protocol`'s builtin object types?
pub fn is_legal_object_type(protocol: Protocol, object_type: &ObjectType) -> bool {
    OBJECT_TYPES
        .get(&protocol)
        .is_some_and(|legal| legal.contains(object_type))
}

/// is `segment_type` legal below `object_type`?  Object types without a
/// table entry (extension types) permit every segment type.
pub fn is_legal_segment_type(object_type: &ObjectType, segment_type: &SegmentType) -> bool {
    SEGMENT_TYPES
        .get(object_type)
        .map_or(true, |legal| legal.contains(segment_type))
}

pub fn validate(address: &ResourceAddress) -> Result<(), ValidationErr> {
    validate_with(address, &DEFAULT_SETTINGS)
}

/// structural legality of `address`.  Scope needs no check here: a
/// [crate::kind::Scope] can only hold one of its three legal values.
pub fn validate_with(address: &ResourceAddress, settings: &Settings) -> Result<(), ValidationErr> {
    let result = check(address, settings);
    if let Err(err) = &result {
        debug!(address = %address, %err, "address failed validation");
    }
    result
}

fn check(address: &ResourceAddress, settings: &Settings) -> Result<(), ValidationErr> {
    let protocol = address.protocol();

    if address.identifier().is_empty() {
        return Err(ValidationErr::MissingIdentifier {
            protocol,
            field: protocol.identifier_field(),
        });
    }
    if let Target::Stream {
        provider: StreamProvider::_Ext(provider),
        ..
    } = &address.target
    {
        if provider.is_empty() {
            return Err(ValidationErr::MissingIdentifier {
                protocol,
                field: "provider",
            });
        }
    }

    if let ObjectType::_Ext(object_type) = &address.object_type {
        if object_type.is_empty() {
            return Err(ValidationErr::MissingField("object_type"));
        }
    }
    if address.object_name.is_empty() && !address.path_segments.is_empty() {
        return Err(ValidationErr::MissingField("object_name"));
    }

    match protocol {
        Protocol::Webhook => {
            if address.object_type != ObjectType::Endpoint {
                return Err(ValidationErr::IllegalObjectType {
                    protocol,
                    object_type: address.object_type.clone(),
                });
            }
            WebhookDirection::parse(address.object_name.as_str())
                .map_err(|_| ValidationErr::InvalidDirection(address.object_name.clone()))?;
        }
        _ => {
            let lenient = !settings.strict_object_types && address.object_type.is_ext();
            if !lenient && !is_legal_object_type(protocol, &address.object_type) {
                return Err(ValidationErr::IllegalObjectType {
                    protocol,
                    object_type: address.object_type.clone(),
                });
            }
        }
    }

    for (position, segment) in address.path_segments.iter().enumerate() {
        if segment.index.is_some() && segment.name.is_none() {
            return Err(ValidationErr::IndexWithoutName { position });
        }
        if !is_legal_segment_type(&address.object_type, &segment.segment_type) {
            return Err(ValidationErr::IllegalSegmentType {
                position,
                segment_type: segment.segment_type.clone(),
                object_type: address.object_type.clone(),
            });
        }
    }

    if let Some(selector) = &address.selector {
        if selector.expression().is_empty() {
            return Err(ValidationErr::EmptySelector);
        }
    }

    Ok(())
}
