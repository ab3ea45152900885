use super::ast::{Clause, CompareOp, Count, Filter, IdItem, Node, Operand, Predicate, QueryAst};
use super::filter::{Bindings, BoundFilter};
use super::params::{Param, QueryParams};
use super::parser::parse_query;
use crate::collection::{validate_collection_name, DocumentId};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::Display;

/// Lifecycle of a [`Query`].
///
/// `Compiled → Bound → Executing → {Completed | Failed | Cancelled}`. A query
/// without placeholders is `Bound` as soon as it is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Compiled,
    Bound,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl Display for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryState::Compiled => "compiled",
            QueryState::Bound => "bound",
            QueryState::Executing => "executing",
            QueryState::Completed => "completed",
            QueryState::Failed => "failed",
            QueryState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Where a placeholder occurs, which decides the values it accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PlaceholderUse {
    Operand(CompareOp),
    DocumentId,
    Count,
}

/// A compiled query bound to one collection.
///
/// A query is executed at most once; it owns its parameter bindings and
/// compiled regular expressions, all released when it is dropped.
///
/// # Examples
///
/// ```rust
/// use docket::query::{Query, QueryState};
///
/// let mut query = Query::new("users", "/[age > :age] | limit 10").unwrap();
/// assert_eq!(query.state(), QueryState::Compiled);
/// query.bind("age", 29).unwrap();
/// assert_eq!(query.state(), QueryState::Bound);
/// ```
pub struct Query {
    collection: String,
    text: String,
    ast: QueryAst,
    placeholders: IndexMap<String, SmallVec<[PlaceholderUse; 2]>>,
    params: QueryParams,
    regexes: HashMap<String, Regex>,
    state: QueryState,
}

impl Query {
    /// Compiles `text` against `collection`.
    ///
    /// Compilation has no side effects: the collection need not exist.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid collection name, a syntax error (with
    /// its position) or an invalid literal regular expression.
    pub fn new(collection: &str, text: &str) -> DocketResult<Query> {
        validate_collection_name(collection)?;
        let ast = parse_query(text)?;

        let mut placeholders: IndexMap<String, SmallVec<[PlaceholderUse; 2]>> = IndexMap::new();
        let mut regexes = HashMap::new();
        collect_filter(
            &ast.filter,
            &mut |name: &str, usage: PlaceholderUse| {
                placeholders.entry(name.to_string()).or_default().push(usage)
            },
            &mut |pattern: &str| {
                let regex = compile_regex(pattern)?;
                regexes.insert(pattern.to_string(), regex);
                Ok(())
            },
        )?;
        for clause in &ast.clauses {
            if let Clause::Skip(Count::Placeholder(name)) | Clause::Limit(Count::Placeholder(name)) = clause {
                placeholders
                    .entry(name.clone())
                    .or_default()
                    .push(PlaceholderUse::Count);
            }
        }

        let state = if placeholders.is_empty() {
            QueryState::Bound
        } else {
            QueryState::Compiled
        };
        log::debug!("Compiled query on {}: {}", collection, text);
        Ok(Query {
            collection: collection.to_string(),
            text: text.to_string(),
            ast,
            placeholders,
            params: QueryParams::new(),
            regexes,
            state,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        self.placeholders.keys().map(String::as_str).collect()
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Binds a value to a named placeholder.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the query has no such placeholder, the value
    ///   does not suit the placeholder (a `re` pattern must be text and
    ///   compile, an ID must be a positive integer, `skip`/`limit` must be
    ///   non-negative integers), or the name is already bound to a value of
    ///   another type;
    /// - `InvalidOperation` if the query has already been executed.
    pub fn bind(&mut self, name: &str, value: impl Into<Param>) -> DocketResult<()> {
        if !matches!(self.state, QueryState::Compiled | QueryState::Bound) {
            log::error!("Cannot bind :{} on a query in state {}", name, self.state);
            return Err(DocketError::new(
                &format!("Cannot bind parameters on a {} query", self.state),
                ErrorKind::InvalidOperation,
            ));
        }
        let Some(usages) = self.placeholders.get(name) else {
            log::error!("Query {:?} has no placeholder :{}", self.text, name);
            return Err(DocketError::new(
                &format!("Query declares no placeholder ':{}'", name),
                ErrorKind::InvalidArgument,
            ));
        };

        let param = value.into();
        let mut compiled = None;
        for usage in usages {
            check_param(name, *usage, &param)?;
            if let (PlaceholderUse::Operand(CompareOp::Re), Param::Text(pattern)) = (usage, &param) {
                compiled = Some((pattern.clone(), compile_regex(pattern)?));
            }
        }
        self.params.bind(name, param)?;
        if let Some((pattern, regex)) = compiled {
            self.regexes.insert(pattern, regex);
        }

        if self.placeholders.keys().all(|p| self.params.contains(p)) {
            self.state = QueryState::Bound;
        }
        Ok(())
    }

    /// Binds a positional (`:?`) placeholder by its index.
    pub fn bind_positional(&mut self, index: usize, value: impl Into<Param>) -> DocketResult<()> {
        self.bind(&index.to_string(), value)
    }

    /// Binds every entry of `params`.
    pub fn bind_all(&mut self, params: &QueryParams) -> DocketResult<()> {
        for (name, value) in params.iter() {
            self.bind(name, value.clone())?;
        }
        Ok(())
    }

    pub(crate) fn ast(&self) -> &QueryAst {
        &self.ast
    }

    /// Moves a bound query into `Executing`.
    pub(crate) fn begin_execution(&mut self) -> DocketResult<()> {
        match self.state {
            QueryState::Bound => {
                self.state = QueryState::Executing;
                Ok(())
            }
            QueryState::Compiled => {
                let unbound = self
                    .placeholders
                    .keys()
                    .filter(|name| !self.params.contains(name))
                    .map(|name| format!(":{}", name))
                    .join(", ");
                log::error!("Query {:?} has unbound placeholders {}", self.text, unbound);
                Err(DocketError::new(
                    &format!("Unbound placeholders: {}", unbound),
                    ErrorKind::InvalidArgument,
                ))
            }
            state => {
                log::error!("Query {:?} cannot run again, it is {}", self.text, state);
                Err(DocketError::new(
                    &format!("Query has already been executed ({})", state),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    pub(crate) fn finish(&mut self, state: QueryState) {
        self.state = state;
    }

    /// The filter with placeholders resolved. Requires every placeholder of
    /// the filter to be bound.
    pub(crate) fn bound_filter(&self) -> DocketResult<BoundFilter> {
        BoundFilter::bind(&self.ast.filter, self)
    }

    pub(crate) fn count_value(&self, count: &Count) -> DocketResult<u64> {
        match count {
            Count::Value(value) => Ok(*value),
            Count::Placeholder(name) => match self.param(name)? {
                Param::Integer(n) if *n >= 0 => Ok(*n as u64),
                other => Err(invalid_param(name, other, "a non-negative integer")),
            },
        }
    }

    fn param(&self, name: &str) -> DocketResult<&Param> {
        self.params.get(name).ok_or_else(|| {
            log::error!("Placeholder :{} is not bound", name);
            DocketError::new(
                &format!("Placeholder ':{}' is not bound", name),
                ErrorKind::InvalidArgument,
            )
        })
    }
}

impl Bindings for Query {
    fn operand(&self, name: &str) -> DocketResult<Value> {
        self.param(name).map(Param::to_value)
    }

    fn document_id(&self, name: &str) -> DocketResult<DocumentId> {
        match self.param(name)? {
            Param::Integer(id) => DocumentId::try_from(*id),
            other => Err(invalid_param(name, other, "a document id")),
        }
    }

    fn regex(&self, pattern: &str) -> DocketResult<Regex> {
        match self.regexes.get(pattern) {
            Some(regex) => Ok(regex.clone()),
            None => compile_regex(pattern),
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{} {}", self.collection, self.ast)
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("collection", &self.collection)
            .field("text", &self.text)
            .field("state", &self.state)
            .field("params", &self.params)
            .finish()
    }
}

fn collect_filter(
    filter: &Filter,
    on_placeholder: &mut dyn FnMut(&str, PlaceholderUse),
    on_regex: &mut dyn FnMut(&str) -> DocketResult<()>,
) -> DocketResult<()> {
    match filter {
        Filter::Or(items) | Filter::And(items) => {
            for item in items {
                collect_filter(item, on_placeholder, on_regex)?;
            }
        }
        Filter::Not(inner) => collect_filter(inner, on_placeholder, on_regex)?,
        Filter::Ids(items) => {
            for item in items {
                if let IdItem::Placeholder(name) = item {
                    on_placeholder(name, PlaceholderUse::DocumentId);
                }
            }
        }
        Filter::All => {}
        Filter::Path(nodes) => {
            for node in nodes {
                if let Node::Pred(predicate) = node {
                    collect_predicate(predicate, on_placeholder, on_regex)?;
                }
            }
        }
    }
    Ok(())
}

fn collect_predicate(
    predicate: &Predicate,
    on_placeholder: &mut dyn FnMut(&str, PlaceholderUse),
    on_regex: &mut dyn FnMut(&str) -> DocketResult<()>,
) -> DocketResult<()> {
    match predicate {
        Predicate::Or(items) | Predicate::And(items) => {
            for item in items {
                collect_predicate(item, on_placeholder, on_regex)?;
            }
        }
        Predicate::Not(inner) => collect_predicate(inner, on_placeholder, on_regex)?,
        Predicate::Compare(comparison) => match &comparison.operand {
            Operand::Placeholder(name) => on_placeholder(name, PlaceholderUse::Operand(comparison.op)),
            Operand::Literal(Value::String(pattern)) if comparison.op == CompareOp::Re => {
                on_regex(pattern)?
            }
            Operand::Literal(_) => {}
        },
    }
    Ok(())
}

fn check_param(name: &str, usage: PlaceholderUse, param: &Param) -> DocketResult<()> {
    match (usage, param) {
        (PlaceholderUse::Operand(CompareOp::Re), Param::Text(_)) => Ok(()),
        (PlaceholderUse::Operand(CompareOp::Re), other) => Err(invalid_param(name, other, "a text pattern")),
        (PlaceholderUse::Operand(_), Param::Float(f)) if !f.is_finite() => {
            Err(invalid_param(name, param, "a finite number"))
        }
        (PlaceholderUse::Operand(_), _) => Ok(()),
        (PlaceholderUse::DocumentId, Param::Integer(id)) if *id >= 1 => Ok(()),
        (PlaceholderUse::DocumentId, other) => Err(invalid_param(name, other, "a positive integer id")),
        (PlaceholderUse::Count, Param::Integer(n)) if *n >= 0 => Ok(()),
        (PlaceholderUse::Count, other) => Err(invalid_param(name, other, "a non-negative integer")),
    }
}

fn invalid_param(name: &str, param: &Param, expected: &str) -> DocketError {
    log::error!("Placeholder :{} bound to {}, expected {}", name, param, expected);
    DocketError::new(
        &format!(
            "Placeholder ':{}' expects {}, got {} {}",
            name,
            expected,
            param.type_name(),
            param
        ),
        ErrorKind::InvalidArgument,
    )
}

fn compile_regex(pattern: &str) -> DocketResult<Regex> {
    Regex::new(pattern).map_err(|err| {
        log::error!("Invalid regular expression {:?}: {}", pattern, err);
        DocketError::new(
            &format!("Invalid regular expression '{}': {}", pattern, err),
            ErrorKind::InvalidArgument,
        )
    })
}
