use core::str::FromStr;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::err::SelectorErr;
use crate::kind::SelectorType;
use crate::selector::jsonpath::JsonPath;

pub mod jsonpath;

/// fine grained expression for reaching inside a complex leaf value.
///
/// The compiled form is cached on first use.  The cache is a [OnceLock] so a
/// `Selector` shared between threads compiles at most once per racing caller
/// and never observes a torn write.  It takes no part in equality, hashing or
/// serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "type")]
    kind: SelectorType,
    expression: String,
    #[serde(skip)]
    compiled: OnceLock<CompiledSelector>,
}

impl Selector {
    /// a selector whose type is inferred from the expression
    /// (see [SelectorType::infer])
    pub fn new<S>(expression: S) -> Self
    where
        S: ToString,
    {
        let expression = expression.to_string();
        Self::of(SelectorType::infer(expression.as_str()), expression)
    }

    pub fn of<S>(kind: SelectorType, expression: S) -> Self
    where
        S: ToString,
    {
        Self {
            kind,
            expression: expression.to_string(),
            compiled: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> SelectorType {
        self.kind
    }

    pub fn expression(&self) -> &str {
        self.expression.as_str()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// compile the expression, or return the cached compilation
    pub fn compile(&self) -> Result<&CompiledSelector, SelectorErr> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }
        let compiled = CompiledSelector::compile(self.kind, self.expression.as_str())?;
        Ok(self.compiled.get_or_init(|| compiled))
    }

    pub fn evaluate(&self, payload: &[u8]) -> Result<Option<Value>, SelectorErr> {
        self.compile()?.evaluate(payload)
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.expression == other.expression
    }
}

impl Eq for Selector {}

impl Hash for Selector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.expression.hash(state);
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.expression.as_str())
    }
}

/// parses and eagerly compiles an inferred-type selector
impl FromStr for Selector {
    type Err = SelectorErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = Selector::new(s);
        selector.compile()?;
        Ok(selector)
    }
}

/// one variant per [SelectorType] so evaluation is an exhaustive match
#[derive(Debug, Clone)]
pub enum CompiledSelector {
    JsonPath(JsonPath),
    /// XPath is only checked structurally; there is no XML evaluator
    XPath(String),
    Regex(Regex),
    Index(usize),
    Key(String),
    Wildcard,
}

impl CompiledSelector {
    pub fn compile(kind: SelectorType, expression: &str) -> Result<Self, SelectorErr> {
        if expression.is_empty() {
            return Err(SelectorErr::Empty);
        }
        trace!(%kind, expression, "compiling selector");
        match kind {
            SelectorType::JsonPath => Ok(CompiledSelector::JsonPath(JsonPath::compile(
                expression,
            )?)),
            SelectorType::XPath => {
                if expression.starts_with('/') {
                    Ok(CompiledSelector::XPath(expression.to_string()))
                } else {
                    Err(SelectorErr::XPathRoot(expression.to_string()))
                }
            }
            SelectorType::Regex => Regex::new(expression)
                .map(CompiledSelector::Regex)
                .map_err(|err| SelectorErr::Regex {
                    expression: expression.to_string(),
                    reason: err.to_string(),
                }),
            SelectorType::Index => expression
                .parse::<usize>()
                .map(CompiledSelector::Index)
                .map_err(|_| SelectorErr::IndexLiteral(expression.to_string())),
            SelectorType::Key => Ok(CompiledSelector::Key(expression.to_string())),
            SelectorType::Wildcard => match expression {
                "*" => Ok(CompiledSelector::Wildcard),
                other => Err(SelectorErr::Shape {
                    step: other.to_string(),
                    expected: "'*'",
                    found: "another expression",
                }),
            },
        }
    }

    pub fn kind(&self) -> SelectorType {
        match self {
            CompiledSelector::JsonPath(_) => SelectorType::JsonPath,
            CompiledSelector::XPath(_) => SelectorType::XPath,
            CompiledSelector::Regex(_) => SelectorType::Regex,
            CompiledSelector::Index(_) => SelectorType::Index,
            CompiledSelector::Key(_) => SelectorType::Key,
            CompiledSelector::Wildcard => SelectorType::Wildcard,
        }
    }

    /// evaluate against raw payload bytes.  Every variant except
    /// [CompiledSelector::Regex] expects the payload to be JSON.
    pub fn evaluate(&self, payload: &[u8]) -> Result<Option<Value>, SelectorErr> {
        match self {
            CompiledSelector::Regex(regex) => {
                let text = std::str::from_utf8(payload).map_err(|_| SelectorErr::Utf8)?;
                match serde_json::from_str::<Value>(text) {
                    Ok(Value::String(inner)) => Ok(Some(matches(regex, inner.as_str()))),
                    _ => Ok(Some(matches(regex, text))),
                }
            }
            CompiledSelector::XPath(expression) => {
                Err(SelectorErr::XPathUnsupported(expression.clone()))
            }
            _ => {
                let value: Value = serde_json::from_slice(payload)?;
                self.evaluate_value(&value)
            }
        }
    }

    /// evaluate against an already parsed payload
    pub fn evaluate_value(&self, value: &Value) -> Result<Option<Value>, SelectorErr> {
        match self {
            CompiledSelector::JsonPath(path) => path.evaluate(value),
            CompiledSelector::XPath(expression) => {
                Err(SelectorErr::XPathUnsupported(expression.clone()))
            }
            CompiledSelector::Regex(regex) => match value {
                Value::String(text) => Ok(Some(matches(regex, text.as_str()))),
                other => Ok(Some(matches(regex, other.to_string().as_str()))),
            },
            CompiledSelector::Index(index) => match value {
                Value::Array(items) => match items.get(*index) {
                    Some(item) => Ok(Some(item.clone())),
                    None => Err(SelectorErr::OutOfBounds {
                        index: *index,
                        len: items.len(),
                    }),
                },
                other => Err(SelectorErr::shape(format!("[{}]", index), "an array", other)),
            },
            CompiledSelector::Key(key) => match value {
                Value::Object(map) => Ok(map.get(key).cloned()),
                other => Err(SelectorErr::shape(key, "an object", other)),
            },
            CompiledSelector::Wildcard => Ok(Some(value.clone())),
        }
    }
}

fn matches(regex: &Regex, text: &str) -> Value {
    Value::Array(
        regex
            .find_iter(text)
            .map(|m| Value::String(m.as_str().to_string()))
            .collect(),
    )
}

#[cfg(test)]
pub mod test {
    use core::str::FromStr;
    use std::sync::Arc;
    use std::thread;

    use serde_json::json;

    use crate::err::SelectorErr;
    use crate::kind::SelectorType;
    use crate::selector::{CompiledSelector, Selector};

    #[test]
    pub fn compile_is_idempotent() {
        let selector = Selector::new("$.address.city");
        assert!(!selector.is_compiled());
        let first = selector.compile().unwrap() as *const CompiledSelector;
        assert!(selector.is_compiled());
        let second = selector.compile().unwrap() as *const CompiledSelector;
        assert_eq!(first, second);
    }

    #[test]
    pub fn concurrent_compile() {
        let selector = Arc::new(Selector::new("$.a[*].b"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let selector = selector.clone();
                thread::spawn(move || {
                    selector
                        .evaluate(br#"{"a": [{"b": 1}, {"b": 2}]}"#)
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(json!([1, 2])));
        }
    }

    #[test]
    pub fn cache_ignored_by_equality_and_serde() {
        let compiled = Selector::new("$.a");
        compiled.compile().unwrap();
        let fresh = Selector::new("$.a");
        assert_eq!(compiled, fresh);

        let json = serde_json::to_value(&compiled).unwrap();
        assert_eq!(json, json!({"type": "jsonpath", "expression": "$.a"}));
        let back: Selector = serde_json::from_value(json).unwrap();
        assert_eq!(back, fresh);
        assert!(!back.is_compiled());
    }

    #[test]
    pub fn paris() {
        let payload = br#"{"address":{"city":"Paris"}}"#;
        assert_eq!(
            Selector::new("$.address.city").evaluate(payload).unwrap(),
            Some(json!("Paris"))
        );
        assert_eq!(Selector::new("$.missing").evaluate(payload).unwrap(), None);
    }

    #[test]
    pub fn xpath_is_structural_only() {
        assert!(matches!(
            Selector::of(SelectorType::XPath, "root/a").compile(),
            Err(SelectorErr::XPathRoot(_))
        ));
        let selector = Selector::new("/root/a");
        assert!(selector.compile().is_ok());
        assert!(matches!(
            selector.evaluate(b"<root><a>1</a></root>"),
            Err(SelectorErr::XPathUnsupported(_))
        ));
    }

    #[test]
    pub fn index_selector() {
        let selector = Selector::new("1");
        assert_eq!(selector.kind(), SelectorType::Index);
        assert_eq!(selector.evaluate(b"[10, 20]").unwrap(), Some(json!(20)));
        assert_eq!(
            selector.evaluate(b"[10]"),
            Err(SelectorErr::OutOfBounds { index: 1, len: 1 })
        );
        assert!(matches!(
            selector.evaluate(br#"{"a": 1}"#),
            Err(SelectorErr::Shape { .. })
        ));
        assert!(matches!(
            Selector::of(SelectorType::Index, "one").compile(),
            Err(SelectorErr::IndexLiteral(_))
        ));
    }

    #[test]
    pub fn key_selector() {
        let selector = Selector::new("city");
        assert_eq!(selector.kind(), SelectorType::Key);
        assert_eq!(
            selector.evaluate(br#"{"city": "Lyon"}"#).unwrap(),
            Some(json!("Lyon"))
        );
        assert_eq!(selector.evaluate(br#"{"town": "Lyon"}"#).unwrap(), None);
        assert!(selector.evaluate(b"[1]").is_err());
    }

    #[test]
    pub fn wildcard_passes_through() {
        let selector = Selector::new("*");
        assert_eq!(
            selector.evaluate(br#"{"a": [1]}"#).unwrap(),
            Some(json!({"a": [1]}))
        );
        assert!(Selector::of(SelectorType::Wildcard, "**").compile().is_err());
    }

    #[test]
    pub fn regex_selector() {
        let selector = Selector::new("^[a-z]+");
        assert_eq!(selector.kind(), SelectorType::Regex);
        assert_eq!(
            selector.evaluate(b"\"hello world\"").unwrap(),
            Some(json!(["hello"]))
        );
        assert_eq!(
            Selector::of(SelectorType::Regex, "[0-9]+")
                .evaluate(b"a1b22c333")
                .unwrap(),
            Some(json!(["1", "22", "333"]))
        );
        assert!(matches!(
            Selector::of(SelectorType::Regex, "(").compile(),
            Err(SelectorErr::Regex { .. })
        ));
        assert_eq!(
            Selector::of(SelectorType::Regex, "a").evaluate(&[0xff, 0xfe]),
            Err(SelectorErr::Utf8)
        );
    }

    #[test]
    pub fn payload_must_be_json() {
        assert!(matches!(
            Selector::new("$.a").evaluate(b"{not json"),
            Err(SelectorErr::Payload(_))
        ));
    }

    #[test]
    pub fn from_str_compiles() {
        assert!(Selector::from_str("$.a").unwrap().is_compiled());
        assert!(Selector::from_str("$..a").is_err());
        assert_eq!(Selector::from_str(""), Err(SelectorErr::Empty));
    }
}
