//! namespace scoped descriptions of resources that are not yet bound to a
//! concrete database:
//!
//! ```text
//! template://{namespace}/database/{object-type}/{name}[/{segment-type}/{segment-name}][?type={expected-type}]
//! ```

use core::str::FromStr;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::address::{PathSegment, ResourceAddress};
use crate::err::ParseErr;
use crate::kind::{ObjectType, Scope};
use crate::parse::segment;

pub const TEMPLATE_SCHEME: &str = "template://";

/// metadata key under which [TemplateAddress::to_address] records the
/// expected leaf type
pub const EXPECTED_TYPE: &str = "expected-type";

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TemplateAddress {
    pub namespace: String,
    pub object_type: ObjectType,
    pub object_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TemplateQuery {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    expected_type: Option<String>,
}

impl TemplateAddress {
    pub fn new<S, N>(namespace: S, object_type: ObjectType, object_name: N) -> Self
    where
        S: ToString,
        N: ToString,
    {
        Self {
            namespace: namespace.to_string(),
            object_type,
            object_name: object_name.to_string(),
            segment: None,
            expected_type: None,
        }
    }

    pub fn with_segment(mut self, segment: PathSegment) -> Self {
        self.segment = Some(segment);
        self
    }

    pub fn with_expected_type<T>(mut self, expected_type: T) -> Self
    where
        T: ToString,
    {
        self.expected_type = Some(expected_type.to_string());
        self
    }

    pub fn parse(uri: &str) -> Result<Self, ParseErr> {
        let body = uri
            .strip_prefix(TEMPLATE_SCHEME)
            .ok_or_else(|| ParseErr::template(uri, "expected scheme 'template://'"))?;

        let (path, query) = match body.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (body, None),
        };

        let query: TemplateQuery = match query {
            None => TemplateQuery::default(),
            Some(query) => serde_urlencoded::from_str(query)
                .map_err(|err| ParseErr::template(uri, err))?,
        };

        let elements: Vec<&str> = path.split('/').collect();
        if let Some(position) = elements.iter().position(|element| element.is_empty()) {
            return Err(ParseErr::template(
                uri,
                format!("empty path element at position {}", position),
            ));
        }

        let (namespace, object_type, object_name, rest) = match elements.as_slice() {
            [namespace, "database", object_type, object_name, rest @ ..] => {
                (namespace, object_type, object_name, rest)
            }
            [_, found, ..] if *found != "database" => {
                return Err(ParseErr::template(
                    uri,
                    format!("expected literal 'database' but found '{}'", found),
                ))
            }
            _ => {
                return Err(ParseErr::template(
                    uri,
                    "expected '{namespace}/database/{object-type}/{name}'",
                ))
            }
        };

        let segment = match rest {
            [] => None,
            [segment_type, name] => Some(segment(segment_type, Some(*name), 4)?),
            _ => {
                return Err(ParseErr::template(
                    uri,
                    "at most one '{segment-type}/{segment-name}' pair may follow the object name",
                ))
            }
        };

        Ok(Self {
            namespace: namespace.to_string(),
            object_type: ObjectType::from_str(object_type)
                .unwrap_or_else(|_| ObjectType::_Ext(object_type.to_string())),
            object_name: object_name.to_string(),
            segment,
            expected_type: query.expected_type,
        })
    }

    /// bind the template to a concrete database.  The expected type, if any,
    /// is carried as metadata.
    pub fn to_address<D>(&self, database_id: D) -> ResourceAddress
    where
        D: ToString,
    {
        let mut address = ResourceAddress::database(
            Scope::Data,
            database_id,
            self.object_type.clone(),
            self.object_name.clone(),
        );
        if let Some(segment) = &self.segment {
            address.push_segment(segment.clone());
        }
        match &self.expected_type {
            Some(expected_type) => address.with_metadata(EXPECTED_TYPE, expected_type.clone()),
            None => address,
        }
    }
}

impl Display for TemplateAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}/database/{}/{}",
            TEMPLATE_SCHEME, self.namespace, self.object_type, self.object_name
        )?;
        if let Some(segment) = &self.segment {
            write!(f, "/{}", segment)?;
        }
        if self.expected_type.is_some() {
            let query = TemplateQuery {
                expected_type: self.expected_type.clone(),
            };
            let query = serde_urlencoded::to_string(&query).map_err(|_| std::fmt::Error)?;
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

impl FromStr for TemplateAddress {
    type Err = ParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
pub mod test {
    use core::str::FromStr;

    use serde_json::json;

    use crate::address::PathSegment;
    use crate::err::ParseErr;
    use crate::kind::{ObjectType, Scope, SegmentType};
    use crate::parse::template::{TemplateAddress, EXPECTED_TYPE};

    #[test]
    pub fn full_template() {
        let template =
            TemplateAddress::from_str("template://crm/database/table/users/column/email?type=string")
                .unwrap();
        assert_eq!(
            template,
            TemplateAddress::new("crm", ObjectType::Table, "users")
                .with_segment(PathSegment::new(SegmentType::Column, "email"))
                .with_expected_type("string")
        );
        assert_eq!(
            template.to_string(),
            "template://crm/database/table/users/column/email?type=string"
        );
    }

    #[test]
    pub fn container_template() {
        let template = TemplateAddress::from_str("template://crm/database/collection/orders").unwrap();
        assert_eq!(template.segment, None);
        assert_eq!(template.expected_type, None);
        assert_eq!(template.to_string(), "template://crm/database/collection/orders");
    }

    #[test]
    pub fn query_is_decoded() {
        let template = TemplateAddress::from_str(
            "template://crm/database/table/users/column/tags?type=array%3Cstring%3E&unused=1",
        )
        .unwrap();
        assert_eq!(template.expected_type.as_deref(), Some("array<string>"));
        assert_eq!(
            template.to_string(),
            "template://crm/database/table/users/column/tags?type=array%3Cstring%3E"
        );
    }

    #[test]
    pub fn to_address() {
        let template =
            TemplateAddress::from_str("template://crm/database/table/users/column/email?type=string")
                .unwrap();
        let address = template.to_address("db_123");
        assert_eq!(address.scope, Scope::Data);
        assert_eq!(address.database_id(), Some("db_123"));
        assert_eq!(
            address.to_string(),
            "redb://data/database/db_123/table/users/column/email"
        );
        assert_eq!(address.metadata[EXPECTED_TYPE], json!("string"));
    }

    #[test]
    pub fn malformed() {
        for uri in [
            "redb://crm/database/table/users",
            "template://crm/stream/topic/events",
            "template://crm/database/table",
            "template://crm/database/table/users/column",
            "template://crm/database/table/users/column/a/field/b",
            "template://crm//table/users",
        ] {
            assert!(
                matches!(TemplateAddress::from_str(uri), Err(ParseErr::Template { .. })),
                "{}",
                uri
            );
        }
    }
}
