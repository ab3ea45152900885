use crate::common::json::join_pointer;
use itertools::Itertools;
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt::Display;

/// Parsed query: a filter plus the clauses that follow it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryAst {
    pub filter: Filter,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    Or(Vec<Filter>),
    And(Vec<Filter>),
    Not(Box<Filter>),
    /// `/=...`: the document ID is in the set.
    Ids(Vec<IdItem>),
    /// `/*`: every document.
    All,
    Path(NodePath),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IdItem {
    Id(u64),
    Placeholder(String),
}

pub(crate) type NodePath = SmallVec<[Node; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// Descend into the named field (or array index).
    Field(String),
    /// `*`: descend into any child.
    Any,
    /// `**`: the current value or any descendant.
    AnyDeep,
    /// `[pred]`: test the current value.
    Pred(Predicate),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare(Comparison),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// value is a member of the operand array
    In,
    /// operand is a member of the array value
    Ni,
    /// string value matches the operand regular expression
    Re,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<CompareOp> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            "in" => Some(CompareOp::In),
            "ni" => Some(CompareOp::Ni),
            "re" => Some(CompareOp::Re),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::In => "in",
            CompareOp::Ni => "ni",
            CompareOp::Re => "re",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Literal(Value),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Count {
    Value(u64),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Clause {
    Skip(Count),
    Limit(Count),
    Count,
    Order { pointer: Vec<String>, descending: bool },
    Del,
    Apply(Value),
    Projection(Projection),
}

/// `all`, or a list of paths, followed by `+path` / `-path` adjustments.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Projection {
    pub all: bool,
    pub include: Vec<Vec<String>>,
    pub exclude: Vec<Vec<String>>,
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Or(items) => write!(f, "({})", items.iter().join(" or ")),
            Filter::And(items) => write!(f, "({})", items.iter().join(" and ")),
            Filter::Not(inner) => write!(f, "not {}", inner),
            Filter::Ids(ids) => write!(f, "/=[{}]", ids.iter().join(", ")),
            Filter::All => write!(f, "/*"),
            Filter::Path(nodes) => {
                for node in nodes {
                    write!(f, "/{}", node)?;
                }
                Ok(())
            }
        }
    }
}

impl Display for IdItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdItem::Id(id) => write!(f, "{}", id),
            IdItem::Placeholder(name) => write!(f, ":{}", name),
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Field(name) => write!(f, "{}", name),
            Node::Any => write!(f, "*"),
            Node::AnyDeep => write!(f, "**"),
            Node::Pred(pred) => write!(f, "[{}]", pred),
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Or(items) => write!(f, "({})", items.iter().join(" or ")),
            Predicate::And(items) => write!(f, "({})", items.iter().join(" and ")),
            Predicate::Not(inner) => write!(f, "not {}", inner),
            Predicate::Compare(cmp) => write!(f, "{}", cmp),
        }
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operand {
            Operand::Literal(value) => write!(f, "{} {} {}", self.field, self.op.symbol(), value),
            Operand::Placeholder(name) => write!(f, "{} {} :{}", self.field, self.op.symbol(), name),
        }
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = |c: &Count| match c {
            Count::Value(v) => v.to_string(),
            Count::Placeholder(name) => format!(":{}", name),
        };
        match self {
            Clause::Skip(c) => write!(f, "skip {}", count(c)),
            Clause::Limit(c) => write!(f, "limit {}", count(c)),
            Clause::Count => write!(f, "count"),
            Clause::Order { pointer, descending } => {
                let dir = if *descending { "desc" } else { "asc" };
                write!(f, "{} {}", dir, join_pointer(pointer))
            }
            Clause::Del => write!(f, "del"),
            Clause::Apply(value) => write!(f, "apply {}", value),
            Clause::Projection(projection) => {
                let mut parts = Vec::new();
                if projection.all {
                    parts.push("all".to_string());
                }
                let mut first = !projection.all;
                for path in &projection.include {
                    let sign = if first { "" } else { "+ " };
                    parts.push(format!("{}{}", sign, join_pointer(path)));
                    first = false;
                }
                for path in &projection.exclude {
                    parts.push(format!("- {}", join_pointer(path)));
                }
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

impl Display for QueryAst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filter)?;
        for clause in &self.clauses {
            write!(f, " | {}", clause)?;
        }
        Ok(())
    }
}
