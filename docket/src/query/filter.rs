use super::ast::{CompareOp, Filter, IdItem, Node, Operand, Predicate};
use crate::collection::{Document, DocumentId};
use crate::common::json::parse_index;
use crate::common::ExactNumber;
use crate::errors::DocketResult;
use itertools::Either;
use regex::Regex;
use serde_json::{Number, Value};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A filter whose placeholders have been replaced by bound values and whose
/// regular expressions have been compiled.
#[derive(Debug, Clone)]
pub(crate) enum BoundFilter {
    Or(Vec<BoundFilter>),
    And(Vec<BoundFilter>),
    Not(Box<BoundFilter>),
    Ids(BTreeSet<DocumentId>),
    All,
    Path(SmallVec<[BoundNode; 4]>),
}

#[derive(Debug, Clone)]
pub(crate) enum BoundNode {
    Field(String),
    Any,
    AnyDeep,
    Pred(BoundPredicate),
}

#[derive(Debug, Clone)]
pub(crate) enum BoundPredicate {
    Or(Vec<BoundPredicate>),
    And(Vec<BoundPredicate>),
    Not(Box<BoundPredicate>),
    Compare(BoundComparison),
}

#[derive(Debug, Clone)]
pub(crate) struct BoundComparison {
    pub field: String,
    pub op: CompareOp,
    pub operand: Value,
    pub regex: Option<Regex>,
}

/// Resolves placeholders while binding a filter.
pub(crate) trait Bindings {
    fn operand(&self, name: &str) -> DocketResult<Value>;
    fn document_id(&self, name: &str) -> DocketResult<DocumentId>;
    fn regex(&self, pattern: &str) -> DocketResult<Regex>;
}

impl BoundFilter {
    pub fn bind(filter: &Filter, bindings: &dyn Bindings) -> DocketResult<BoundFilter> {
        Ok(match filter {
            Filter::Or(items) => BoundFilter::Or(bind_all(items, bindings)?),
            Filter::And(items) => BoundFilter::And(bind_all(items, bindings)?),
            Filter::Not(inner) => BoundFilter::Not(Box::new(BoundFilter::bind(inner, bindings)?)),
            Filter::Ids(items) => {
                let mut ids = BTreeSet::new();
                for item in items {
                    ids.insert(match item {
                        IdItem::Id(id) => DocumentId::new(*id)?,
                        IdItem::Placeholder(name) => bindings.document_id(name)?,
                    });
                }
                BoundFilter::Ids(ids)
            }
            Filter::All => BoundFilter::All,
            Filter::Path(nodes) => {
                let mut bound = SmallVec::new();
                for node in nodes {
                    bound.push(match node {
                        Node::Field(name) => BoundNode::Field(name.clone()),
                        Node::Any => BoundNode::Any,
                        Node::AnyDeep => BoundNode::AnyDeep,
                        Node::Pred(pred) => BoundNode::Pred(bind_predicate(pred, bindings)?),
                    });
                }
                BoundFilter::Path(bound)
            }
        })
    }

    pub fn matches(&self, id: DocumentId, document: &Document) -> bool {
        match self {
            BoundFilter::Or(items) => items.iter().any(|f| f.matches(id, document)),
            BoundFilter::And(items) => items.iter().all(|f| f.matches(id, document)),
            BoundFilter::Not(inner) => !inner.matches(id, document),
            BoundFilter::Ids(ids) => ids.contains(&id),
            BoundFilter::All => true,
            BoundFilter::Path(nodes) => match_nodes(document.as_value(), nodes),
        }
    }
}

fn bind_all(items: &[Filter], bindings: &dyn Bindings) -> DocketResult<Vec<BoundFilter>> {
    items.iter().map(|f| BoundFilter::bind(f, bindings)).collect()
}

fn bind_predicate(predicate: &Predicate, bindings: &dyn Bindings) -> DocketResult<BoundPredicate> {
    let bind_list = |items: &[Predicate]| -> DocketResult<Vec<BoundPredicate>> {
        items.iter().map(|p| bind_predicate(p, bindings)).collect()
    };
    Ok(match predicate {
        Predicate::Or(items) => BoundPredicate::Or(bind_list(items)?),
        Predicate::And(items) => BoundPredicate::And(bind_list(items)?),
        Predicate::Not(inner) => BoundPredicate::Not(Box::new(bind_predicate(inner, bindings)?)),
        Predicate::Compare(cmp) => {
            let operand = match &cmp.operand {
                Operand::Literal(value) => value.clone(),
                Operand::Placeholder(name) => bindings.operand(name)?,
            };
            let regex = match (cmp.op, &operand) {
                (CompareOp::Re, Value::String(pattern)) => Some(bindings.regex(pattern)?),
                _ => None,
            };
            BoundPredicate::Compare(BoundComparison {
                field: cmp.field.clone(),
                op: cmp.op,
                operand,
                regex,
            })
        }
    })
}

fn match_nodes(value: &Value, nodes: &[BoundNode]) -> bool {
    let Some((first, rest)) = nodes.split_first() else {
        return true;
    };
    match first {
        BoundNode::Field(name) => child(value, name).is_some_and(|c| match_nodes(c, rest)),
        BoundNode::Any => children(value).any(|c| match_nodes(c, rest)),
        BoundNode::AnyDeep => {
            match_nodes(value, rest) || children(value).any(|c| match_nodes(c, nodes))
        }
        BoundNode::Pred(predicate) => predicate.test(value) && match_nodes(value, rest),
    }
}

fn child<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(name),
        Value::Array(items) => items.get(parse_index(name)?),
        _ => None,
    }
}

fn children(value: &Value) -> impl Iterator<Item = &Value> {
    match value {
        Value::Object(map) => Either::Left(map.values()),
        Value::Array(items) => Either::Right(items.iter()),
        _ => Either::Right([].iter()),
    }
}

impl BoundPredicate {
    fn test(&self, value: &Value) -> bool {
        match self {
            BoundPredicate::Or(items) => items.iter().any(|p| p.test(value)),
            BoundPredicate::And(items) => items.iter().all(|p| p.test(value)),
            BoundPredicate::Not(inner) => !inner.test(value),
            BoundPredicate::Compare(cmp) => {
                child(value, &cmp.field).is_some_and(|actual| cmp.test_value(actual))
            }
        }
    }
}

impl BoundComparison {
    /// Tests a field value. An array value matches when any element does,
    /// except for `ni`, and for `=`/`!=` against an array operand, which look
    /// at the array as a whole.
    pub fn test_value(&self, actual: &Value) -> bool {
        match actual {
            Value::Array(items)
                if self.op != CompareOp::Ni
                    && (self.op == CompareOp::In || !self.operand.is_array()) =>
            {
                items.iter().any(|item| self.test_scalar(item))
            }
            _ => self.test_scalar(actual),
        }
    }

    fn test_scalar(&self, actual: &Value) -> bool {
        let operand = &self.operand;
        match self.op {
            CompareOp::Eq => values_equal(actual, operand),
            CompareOp::Ne => !values_equal(actual, operand),
            CompareOp::Gt => order(actual, operand) == Some(Ordering::Greater),
            CompareOp::Ge => matches!(order(actual, operand), Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Lt => order(actual, operand) == Some(Ordering::Less),
            CompareOp::Le => matches!(order(actual, operand), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::In => match operand {
                Value::Array(options) => options.iter().any(|o| values_equal(actual, o)),
                scalar => values_equal(actual, scalar),
            },
            CompareOp::Ni => match actual {
                Value::Array(items) => items.iter().any(|item| values_equal(item, operand)),
                _ => false,
            },
            CompareOp::Re => match (actual, &self.regex) {
                (Value::String(text), Some(regex)) => regex.is_match(text),
                _ => false,
            },
        }
    }
}

/// Equality with numeric comparison across integer and float.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numeric_cmp(x, y) == Some(Ordering::Equal),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Ordering for `<`-style operators: numbers numerically, strings
/// lexicographically, anything else is unordered.
pub(crate) fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numeric_cmp(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub(crate) fn numeric_cmp(a: &Number, b: &Number) -> Option<Ordering> {
    Some(ExactNumber::from_number(a)?.cmp(&ExactNumber::from_number(b)?))
}
