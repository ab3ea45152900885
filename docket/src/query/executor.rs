use super::ast::{Clause, Projection};
use super::compiler::{Query, QueryState};
use super::filter::numeric_cmp;
use super::plan::{plan_query, QueryPlan};
use crate::collection::{apply_patch, Collection, Document, DocumentId, DocumentMap, PatchOperation};
use crate::common::json::value_at;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::store::Catalog;
use itertools::Either;
use serde_json::Value;
use std::cmp::Ordering;

/// What a visitor asks the executor to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Hand over the next match.
    Continue,
    /// Halt now; the execution ends `Cancelled`.
    Stop,
    /// Pass over the next `n` matches without visiting or modifying them.
    Skip(u64),
}

/// Outcome of one query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSummary {
    visited: u64,
    state: QueryState,
}

impl ExecutionSummary {
    /// Number of matches produced, whether or not a visitor saw them.
    pub fn visited(&self) -> u64 {
        self.visited
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == QueryState::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionMode {
    /// Hand matches to the visitor.
    Stream,
    /// Only count matches. Modification clauses are not applied.
    Count,
    /// Apply the modification clause to every match.
    Update,
}

enum Modification {
    Delete,
    Merge(Value),
    Patch(Vec<PatchOperation>),
}

struct ExecutionOptions {
    skip: u64,
    limit: Option<u64>,
    count_only: bool,
    order: Option<(Vec<String>, bool)>,
    modification: Option<Modification>,
    projections: Vec<Projection>,
}

impl ExecutionOptions {
    fn resolve(query: &Query) -> DocketResult<ExecutionOptions> {
        let mut options = ExecutionOptions {
            skip: 0,
            limit: None,
            count_only: false,
            order: None,
            modification: None,
            projections: Vec::new(),
        };
        for clause in &query.ast().clauses {
            match clause {
                Clause::Skip(count) => options.skip = query.count_value(count)?,
                Clause::Limit(count) => options.limit = Some(query.count_value(count)?),
                Clause::Count => options.count_only = true,
                Clause::Order { pointer, descending } => {
                    options.order = Some((pointer.clone(), *descending))
                }
                Clause::Del => options.set_modification(Modification::Delete)?,
                Clause::Apply(payload) => {
                    let modification = match payload {
                        Value::Array(_) => Modification::Patch(PatchOperation::from_value(payload.clone())?),
                        _ => Modification::Merge(payload.clone()),
                    };
                    options.set_modification(modification)?
                }
                Clause::Projection(projection) => options.projections.push(projection.clone()),
            }
        }
        Ok(options)
    }

    fn set_modification(&mut self, modification: Modification) -> DocketResult<()> {
        if self.modification.is_some() {
            log::error!("A query can carry only one of 'apply' and 'del'");
            return Err(DocketError::new(
                "A query can carry only one of 'apply' and 'del'",
                ErrorKind::InvalidArgument,
            ));
        }
        self.modification = Some(modification);
        Ok(())
    }

    fn project(&self, document: Document) -> Document {
        self.projections
            .iter()
            .fold(document, |shaped, projection| projection.apply(&shaped))
    }
}

/// Runs `query` against the catalog and moves it to its final state.
///
/// The query must be `Bound`. Any error leaves it `Failed`.
pub(crate) fn execute_query(
    catalog: &Catalog,
    query: &mut Query,
    mode: ExecutionMode,
    visitor: &mut dyn FnMut(DocumentId, &Document) -> Visit,
) -> DocketResult<ExecutionSummary> {
    query.begin_execution()?;
    let result = run(catalog, query, mode, visitor);
    match &result {
        Ok(summary) => query.finish(summary.state),
        Err(err) => {
            log::error!("Query {} failed: {}", query, err);
            query.finish(QueryState::Failed)
        }
    }
    result
}

/// Chooses the plan the query would run with against the catalog as it is now.
pub(crate) fn explain_query(catalog: &Catalog, query: &Query) -> DocketResult<QueryPlan> {
    let filter = query.bound_filter()?;
    let collection = catalog.get(query.collection());
    Ok(plan_query(&filter, collection.as_ref()))
}

fn run(
    catalog: &Catalog,
    query: &Query,
    mode: ExecutionMode,
    visitor: &mut dyn FnMut(DocumentId, &Document) -> Visit,
) -> DocketResult<ExecutionSummary> {
    let options = ExecutionOptions::resolve(query)?;
    if mode == ExecutionMode::Update && options.modification.is_none() {
        log::error!("Query {} has neither 'apply' nor 'del'", query);
        return Err(DocketError::new(
            "Update requires an 'apply' or 'del' clause",
            ErrorKind::InvalidArgument,
        ));
    }
    let filter = query.bound_filter()?;

    let Some(collection) = catalog.get(query.collection()) else {
        log::debug!("Collection {} does not exist, query has no matches", query.collection());
        return Ok(ExecutionSummary {
            visited: 0,
            state: QueryState::Completed,
        });
    };

    let plan = plan_query(&filter, Some(&collection));
    log::debug!("Executing {} with plan {}", query, plan);

    if mode == ExecutionMode::Count && options.order.is_none() {
        if let Some(ids) = index_only_ids(&collection, &plan) {
            let visited = window(ids.len() as u64, options.skip, options.limit);
            return Ok(ExecutionSummary {
                visited,
                state: QueryState::Completed,
            });
        }
    }

    let candidates = Candidates::new(&collection, &plan);
    let matches = candidates.filter(|(id, document)| filter.matches(*id, document));
    let ordered = match &options.order {
        None => Either::Left(matches),
        Some((pointer, descending)) => {
            let mut all: Vec<(DocumentId, Document)> = matches.collect();
            all.sort_by(|(_, a), (_, b)| {
                let ordering = compare_for_order(value_at(a.as_value(), pointer), value_at(b.as_value(), pointer));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
            Either::Right(all.into_iter())
        }
    };
    let page = ordered
        .skip(usize::try_from(options.skip).unwrap_or(usize::MAX))
        .take(options.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX)));

    let modify = mode != ExecutionMode::Count;
    let mut visited = 0u64;
    let mut passing = 0u64;
    for (id, document) in page {
        if passing > 0 {
            passing -= 1;
            continue;
        }
        let document = match (&options.modification, modify) {
            (Some(modification), true) => match apply_modification(&collection, id, document, modification)? {
                Some(document) => document,
                None => continue,
            },
            _ => document,
        };
        visited += 1;
        if mode != ExecutionMode::Stream || options.count_only {
            continue;
        }
        match visitor(id, &options.project(document)) {
            Visit::Continue => {}
            Visit::Skip(n) => passing = n,
            Visit::Stop => {
                log::debug!("Visitor stopped {} after {} documents", query, visited);
                return Ok(ExecutionSummary {
                    visited,
                    state: QueryState::Cancelled,
                });
            }
        }
    }

    Ok(ExecutionSummary {
        visited,
        state: QueryState::Completed,
    })
}

// Applies the modification through the regular write path. `None` if the
// document disappeared in the meantime.
fn apply_modification(
    collection: &Collection,
    id: DocumentId,
    document: Document,
    modification: &Modification,
) -> DocketResult<Option<Document>> {
    match modification {
        Modification::Delete => Ok(collection.del(id)?.then_some(document)),
        Modification::Merge(patch) => collection.update_with(id, |current| {
            let mut merged = current.clone();
            merged.merge(patch);
            Ok(merged)
        }),
        Modification::Patch(ops) => collection.update_with(id, |current| apply_patch(current, ops)),
    }
}

fn index_only_ids(collection: &Collection, plan: &QueryPlan) -> Option<Vec<DocumentId>> {
    let QueryPlan::IndexScan(scan) = plan else {
        return None;
    };
    if !scan.is_index_only() {
        return None;
    }
    let index = collection
        .index_manager()
        .find_index(scan.index().path(), scan.index().value_type())?;
    let mut ids = index.find(&scan.lookup);
    ids.sort_unstable();
    ids.dedup();
    Some(ids)
}

fn window(total: u64, skip: u64, limit: Option<u64>) -> u64 {
    let remaining = total.saturating_sub(skip);
    limit.map_or(remaining, |limit| remaining.min(limit))
}

/// Candidate documents in ascending ID order, loaded one at a time.
struct Candidates {
    documents: DocumentMap,
    source: CandidateSource,
}

enum CandidateSource {
    Ids(std::vec::IntoIter<DocumentId>),
    Scan(Option<DocumentId>),
    Done,
}

impl Candidates {
    fn new(collection: &Collection, plan: &QueryPlan) -> Self {
        let source = match plan {
            QueryPlan::IdSet(ids) => CandidateSource::Ids(ids.clone().into_iter()),
            QueryPlan::IndexScan(scan) => match collection
                .index_manager()
                .find_index(scan.index().path(), scan.index().value_type())
            {
                Some(index) => {
                    let mut ids = index.find(&scan.lookup);
                    ids.sort_unstable();
                    ids.dedup();
                    CandidateSource::Ids(ids.into_iter())
                }
                // dropped since planning
                None => CandidateSource::Scan(None),
            },
            QueryPlan::FullScan => CandidateSource::Scan(None),
        };
        Candidates {
            documents: collection.documents().clone(),
            source,
        }
    }
}

impl Iterator for Candidates {
    type Item = (DocumentId, Document);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            CandidateSource::Ids(ids) => {
                for id in ids.by_ref() {
                    if let Some(document) = self.documents.get(&id) {
                        return Some((id, document));
                    }
                }
                None
            }
            CandidateSource::Scan(last) => match self.documents.next_after(*last) {
                Some((id, document)) => {
                    *last = Some(id);
                    Some((id, document))
                }
                None => {
                    self.source = CandidateSource::Done;
                    None
                }
            },
            CandidateSource::Done => None,
        }
    }
}

// missing < null < bool < number < string < array < object
fn order_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

fn compare_for_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    order_rank(a).cmp(&order_rank(b)).then_with(|| match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => numeric_cmp(x, y).unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    })
}
