//! the JSONPath subset accepted by `#$...` selectors.
//!
//! ```text
//! $                 the whole payload
//! .name             child access
//! ['name']          child access (quoted, may contain '.')
//! [N]               array element N, absent when out of bounds
//! [*]               every array element; the remaining steps apply per element
//! [?...]            filter (not evaluated, passes its input through)
//! ```

use std::fmt::{Display, Formatter};

use nom::branch::alt;
use nom::bytes::complete::{take_till, take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res, success};
use nom::multi::{many0, many1};
use nom::sequence::{delimited, pair, preceded};
use nom::Parser;
use nom_supreme::ParserExt;
use serde_json::Value;
use tracing::trace;

use crate::err::SelectorErr;
use crate::parse::util::{result, Res};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Step {
    Child(String),
    Index(usize),
    Wildcard,
    /// the raw filter text after `?`.  Filters are a known gap: they are
    /// compiled so the expression round trips but evaluation passes the
    /// input through unfiltered.
    Filter(String),
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Child(name) => write!(f, ".{}", name),
            Step::Index(index) => write!(f, "[{}]", index),
            Step::Wildcard => f.write_str("[*]"),
            Step::Filter(filter) => write!(f, "[?{}]", filter),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct JsonPath {
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn compile(expression: &str) -> Result<Self, SelectorErr> {
        if !expression.starts_with('$') {
            return Err(SelectorErr::jsonpath(expression, "expression must start with '$'"));
        }
        let steps = result(all_consuming(json_path)(expression))
            .map_err(|err| SelectorErr::jsonpath(expression, err))?;
        trace!(expression, steps = steps.len(), "compiled jsonpath");
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// walk `root` one step at a time.  A missing child or an out of bounds
    /// index yields `Ok(None)`; a step applied to the wrong shape is an error.
    pub fn evaluate(&self, root: &Value) -> Result<Option<Value>, SelectorErr> {
        apply(self.steps.as_slice(), root)
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("$")?;
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

fn apply(steps: &[Step], current: &Value) -> Result<Option<Value>, SelectorErr> {
    let (step, rest) = match steps.split_first() {
        None => return Ok(Some(current.clone())),
        Some(split) => split,
    };
    trace!(%step, "jsonpath step");
    match step {
        Step::Child(name) => match current {
            Value::Object(map) => match map.get(name) {
                None => Ok(None),
                Some(next) => apply(rest, next),
            },
            other => Err(SelectorErr::shape(step, "an object", other)),
        },
        Step::Index(index) => match current {
            Value::Array(items) => match items.get(*index) {
                None => Ok(None),
                Some(next) => apply(rest, next),
            },
            other => Err(SelectorErr::shape(step, "an array", other)),
        },
        Step::Wildcard => match current {
            Value::Array(items) => {
                let mut projected = vec![];
                for item in items {
                    if let Some(value) = apply(rest, item)? {
                        projected.push(value);
                    }
                }
                Ok(Some(Value::Array(projected)))
            }
            other => Err(SelectorErr::shape(step, "an array", other)),
        },
        Step::Filter(_) => apply(rest, current),
    }
}

fn json_path(input: &str) -> Res<Vec<Step>> {
    preceded(char('$'), pair(many0(bracket), many0(component)))
        .map(|(head, components)| {
            head.into_iter()
                .chain(components.into_iter().flatten())
                .collect::<Vec<_>>()
        })
        .parse(input)
}

/// `.name[..][..]`; the name may only be omitted when brackets follow
fn component(input: &str) -> Res<Vec<Step>> {
    preceded(
        char('.'),
        alt((
            pair(map(name, Some), many0(bracket)),
            pair(success(None), many1(bracket)),
        )),
    )
    .map(|(name, brackets)| {
        name.map(|name| Step::Child(name.to_string()))
            .into_iter()
            .chain(brackets)
            .collect::<Vec<_>>()
    })
    .context("path component")
    .parse(input)
}

fn name(input: &str) -> Res<&str> {
    take_while1(|c: char| c != '.' && c != '[' && c != ']')(input)
}

fn bracket(input: &str) -> Res<Step> {
    delimited(
        char('['),
        alt((wildcard, index, filter, quoted)),
        char(']').cut(),
    )
    .context("bracket")
    .parse(input)
}

fn wildcard(input: &str) -> Res<Step> {
    map(char('*'), |_| Step::Wildcard)(input)
}

fn index(input: &str) -> Res<Step> {
    map_res(digit1, |digits: &str| digits.parse::<usize>().map(Step::Index))(input)
}

fn filter(input: &str) -> Res<Step> {
    map(preceded(char('?'), take_while(|c: char| c != ']')), |filter: &str| {
        Step::Filter(filter.to_string())
    })(input)
}

fn quoted(input: &str) -> Res<Step> {
    let single = delimited(char('\''), take_till(|c: char| c == '\''), char('\''));
    let double = delimited(char('"'), take_till(|c: char| c == '"'), char('"'));
    map(alt((single, double)), |name: &str| Step::Child(name.to_string()))(input)
}
