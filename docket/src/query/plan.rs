use super::ast::CompareOp;
use super::filter::{BoundComparison, BoundFilter, BoundNode, BoundPredicate};
use crate::collection::{Collection, DocumentId};
use crate::common::json::join_pointer;
use crate::index::{IndexDescriptor, IndexKey, IndexLookup, IndexValueType};
use itertools::Itertools;
use serde_json::Value;
use std::fmt::Display;
use std::ops::Bound;

/// How a query finds its candidate documents.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// The filter is a single `/=` node: visit exactly these IDs.
    IdSet(Vec<DocumentId>),
    /// Candidates come from a secondary index and are re-checked against the
    /// full filter.
    IndexScan(IndexScan),
    /// Walk every document in ID order.
    FullScan,
}

/// Index selection of an [`QueryPlan::IndexScan`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScan {
    index: IndexDescriptor,
    candidates: Vec<IndexDescriptor>,
    index_only: bool,
    pub(crate) lookup: IndexLookup,
}

impl IndexScan {
    /// The chosen index.
    pub fn index(&self) -> &IndexDescriptor {
        &self.index
    }

    /// Every index that could serve the comparison, chosen one included.
    pub fn candidates(&self) -> &[IndexDescriptor] {
        &self.candidates
    }

    /// Whether the index alone decides the result, so counting does not
    /// need to load documents.
    pub fn is_index_only(&self) -> bool {
        self.index_only
    }
}

impl Display for QueryPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryPlan::IdSet(ids) => write!(f, "IdSet [{}]", ids.iter().join(", ")),
            QueryPlan::IndexScan(scan) => {
                write!(f, "IndexScan {}", scan.index)?;
                if scan.index_only {
                    write!(f, " index-only")?;
                }
                Ok(())
            }
            QueryPlan::FullScan => write!(f, "FullScan"),
        }
    }
}

/// Chooses the plan for a bound filter against the collection's current
/// indexes.
///
/// An index is usable when the filter, or the first conjunct of a top-level
/// `and`, is a node path of field nodes ending in a single comparison with
/// `=`, `>`, `>=`, `<`, `<=` or `in`, and the operand can be coerced to the
/// index type. Integer indexes serve only `=` and `in`: a range over an
/// integer index would miss fractional values. Unique indexes are preferred
/// for equality.
pub(crate) fn plan_query(filter: &BoundFilter, collection: Option<&Collection>) -> QueryPlan {
    if let BoundFilter::Ids(ids) = filter {
        return QueryPlan::IdSet(ids.iter().copied().collect());
    }
    let Some(collection) = collection else {
        return QueryPlan::FullScan;
    };
    if !collection.index_manager().has_indexes() {
        return QueryPlan::FullScan;
    }

    let (nodes, whole) = match filter {
        BoundFilter::Path(nodes) => (nodes, true),
        BoundFilter::And(items) => match items.first() {
            Some(BoundFilter::Path(nodes)) => (nodes, false),
            _ => return QueryPlan::FullScan,
        },
        _ => return QueryPlan::FullScan,
    };
    let Some((path, comparison)) = indexable_comparison(nodes) else {
        return QueryPlan::FullScan;
    };

    let mut usable = Vec::new();
    for value_type in [IndexValueType::String, IndexValueType::Integer, IndexValueType::Float] {
        let Some(index) = collection.index_manager().find_index(&path, value_type) else {
            continue;
        };
        if let Some(lookup) = lookup_for(comparison, value_type) {
            usable.push((index.descriptor().clone(), lookup));
        }
    }

    let equality = matches!(comparison.op, CompareOp::Eq | CompareOp::In);
    let candidates: Vec<IndexDescriptor> = usable.iter().map(|(d, _)| d.clone()).collect();
    let best = usable
        .into_iter()
        .enumerate()
        .max_by_key(|(position, (descriptor, _))| {
            // prefer unique for equality, then the earlier value type
            (equality && descriptor.is_unique(), std::cmp::Reverse(*position))
        })
        .map(|(_, chosen)| chosen);

    match best {
        Some((index, lookup)) => QueryPlan::IndexScan(IndexScan {
            index,
            candidates,
            index_only: whole,
            lookup,
        }),
        None => QueryPlan::FullScan,
    }
}

// field nodes followed by exactly one comparison predicate
fn indexable_comparison(nodes: &[BoundNode]) -> Option<(String, &BoundComparison)> {
    let (last, prefix) = nodes.split_last()?;
    let BoundNode::Pred(BoundPredicate::Compare(comparison)) = last else {
        return None;
    };
    let mut tokens = Vec::with_capacity(prefix.len() + 1);
    for node in prefix {
        match node {
            BoundNode::Field(name) => tokens.push(name.as_str()),
            _ => return None,
        }
    }
    tokens.push(comparison.field.as_str());
    Some((join_pointer(&tokens), comparison))
}

fn lookup_for(comparison: &BoundComparison, value_type: IndexValueType) -> Option<IndexLookup> {
    let operand = &comparison.operand;
    match comparison.op {
        CompareOp::Eq => IndexKey::coerce(operand, value_type).map(|key| IndexLookup::Keys(vec![key])),
        CompareOp::In => match operand {
            Value::Array(options) => options
                .iter()
                .map(|option| IndexKey::coerce(option, value_type))
                .collect::<Option<Vec<_>>>()
                .map(IndexLookup::Keys),
            scalar => IndexKey::coerce(scalar, value_type).map(|key| IndexLookup::Keys(vec![key])),
        },
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            if value_type == IndexValueType::Integer {
                return None;
            }
            let key = IndexKey::coerce(operand, value_type)?;
            Some(match comparison.op {
                CompareOp::Gt => IndexLookup::Range(Bound::Excluded(key), Bound::Unbounded),
                CompareOp::Ge => IndexLookup::Range(Bound::Included(key), Bound::Unbounded),
                CompareOp::Lt => IndexLookup::Range(Bound::Unbounded, Bound::Excluded(key)),
                _ => IndexLookup::Range(Bound::Unbounded, Bound::Included(key)),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::index::IndexMode;
    use crate::query::compiler::Query;

    fn plan(collection: &Collection, text: &str) -> QueryPlan {
        let query = Query::new("c", text).unwrap();
        plan_query(&query.bound_filter().unwrap(), Some(collection))
    }

    fn indexed() -> Collection {
        let collection = Collection::new("c").unwrap();
        collection.ensure_index("/name", IndexMode::string().unique()).unwrap();
        collection.ensure_index("/age", IndexMode::integer()).unwrap();
        collection.ensure_index("/score", IndexMode::float()).unwrap();
        collection.ensure_index("/address/city", IndexMode::string()).unwrap();
        collection.put_new(doc!({"name": "A", "age": 20})).unwrap();
        collection
    }

    #[test]
    fn id_filter_plans_id_set() {
        let collection = indexed();
        assert_eq!(
            plan(&collection, "/=[3, 1]"),
            QueryPlan::IdSet(vec![DocumentId::new(1).unwrap(), DocumentId::new(3).unwrap()])
        );
    }

    #[test]
    fn equality_on_indexed_field_uses_index() {
        let collection = indexed();
        let QueryPlan::IndexScan(scan) = plan(&collection, r#"/[name = "A"]"#) else {
            panic!("expected index scan");
        };
        assert_eq!(scan.index().path(), "/name");
        assert!(scan.index().is_unique());
        assert!(scan.is_index_only());
    }

    #[test]
    fn nested_path_uses_index() {
        let collection = indexed();
        let QueryPlan::IndexScan(scan) = plan(&collection, r#"/address/[city = "Oslo"]"#) else {
            panic!("expected index scan");
        };
        assert_eq!(scan.index().path(), "/address/city");
    }

    #[test]
    fn first_conjunct_uses_index_without_index_only() {
        let collection = indexed();
        let QueryPlan::IndexScan(scan) = plan(&collection, "/[age = 20] and /[name = \"A\"]") else {
            panic!("expected index scan");
        };
        assert_eq!(scan.index().path(), "/age");
        assert!(!scan.is_index_only());
    }

    #[test]
    fn type_mismatch_falls_back_to_full_scan() {
        let collection = indexed();
        assert_eq!(plan(&collection, "/[name = 5]"), QueryPlan::FullScan);
        assert_eq!(plan(&collection, r#"/[age = "20"]"#), QueryPlan::FullScan);
        assert_eq!(plan(&collection, "/[age = 20.5]"), QueryPlan::FullScan);
    }

    #[test]
    fn ranges_need_string_or_float_index() {
        let collection = indexed();
        assert_eq!(plan(&collection, "/[age > 20]"), QueryPlan::FullScan);
        assert!(matches!(plan(&collection, "/[score > 1]"), QueryPlan::IndexScan(_)));
        assert!(matches!(plan(&collection, r#"/[name >= "B"]"#), QueryPlan::IndexScan(_)));
    }

    #[test]
    fn unsupported_shapes_use_full_scan() {
        let collection = indexed();
        for text in [
            "/[name != \"A\"]",
            "/[name = \"A\" or age = 1]",
            "/*/[name = \"A\"]",
            "/[name = \"A\"] or /[age = 1]",
            "/*",
            "/[unindexed = 1]",
        ] {
            assert_eq!(plan(&collection, text), QueryPlan::FullScan, "{}", text);
        }
    }

    #[test]
    fn prefers_unique_index_for_equality() {
        let collection = Collection::new("c").unwrap();
        collection.ensure_index("/n", IndexMode::integer()).unwrap();
        collection.ensure_index("/n", IndexMode::float().unique()).unwrap();
        let QueryPlan::IndexScan(scan) = plan(&collection, "/[n = 3]") else {
            panic!("expected index scan");
        };
        assert_eq!(scan.candidates().len(), 2);
        assert_eq!(scan.index().mode(), IndexMode::float().unique());
    }

    #[test]
    fn in_operator_uses_keys() {
        let collection = indexed();
        let QueryPlan::IndexScan(scan) = plan(&collection, "/[age in [20, 30]]") else {
            panic!("expected index scan");
        };
        assert_eq!(
            scan.lookup,
            IndexLookup::Keys(vec![IndexKey::Integer(20), IndexKey::Integer(30)])
        );
        assert_eq!(plan(&collection, r#"/[age in [20, "x"]]"#), QueryPlan::FullScan);
    }
}
