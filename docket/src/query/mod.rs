//! Query language, compilation, planning and streaming execution.
//!
//! A query selects documents of one collection with a node-path filter and
//! shapes the result with clauses:
//!
//! ```text
//! /[age > :age] and /address/[city = "Paris"] | asc /name | skip 10 | limit 5
//! /=[1, 2, :id] | /{name,age}
//! /[name re "^A"] | apply {"flag": true}
//! ```
//!
//! [`Query`] compiles the text, placeholders are bound with [`Query::bind`],
//! and the store executes the bound query, handing each match to a visitor
//! that answers with a [`Visit`].

mod ast;
mod compiler;
mod executor;
mod filter;
mod lexer;
mod params;
mod parser;
mod plan;
mod projection;

pub use compiler::{Query, QueryState};
pub(crate) use executor::{execute_query, explain_query, ExecutionMode};
pub use executor::{ExecutionSummary, Visit};
pub use params::{Param, QueryParams};
pub use plan::{IndexScan, QueryPlan};
