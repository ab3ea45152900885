use super::ast::{
    Clause, CompareOp, Comparison, Count, Filter, IdItem, Node, NodePath, Operand, Predicate,
    Projection, QueryAst,
};
use super::lexer::{syntax_error, Lexer, Token};
use crate::collection::PatchOperation;
use crate::errors::DocketResult;
use serde_json::{Number, Value};
use smallvec::SmallVec;

/// Parses query text into its syntax tree.
///
/// Parsing has no side effects. Positional placeholders `:?` are named
/// `"0"`, `"1"`, ... in order of appearance.
///
/// # Errors
///
/// Returns `InvalidArgument` with the byte offset of the offending token.
pub(crate) fn parse_query(text: &str) -> DocketResult<QueryAst> {
    let mut parser = Parser {
        lexer: Lexer::new(text),
        positional: 0,
    };
    parser.parse()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    positional: usize,
}

impl Parser<'_> {
    fn parse(&mut self) -> DocketResult<QueryAst> {
        let filter = self.parse_or()?;
        let mut clauses = Vec::new();
        loop {
            let (token, position) = self.lexer.next_token()?;
            match token {
                Token::Eof => break,
                Token::Pipe => clauses.push(self.parse_clause()?),
                other => return Err(unexpected(&other, position, "'|' or end of query")),
            }
        }
        Ok(QueryAst { filter, clauses })
    }

    fn parse_or(&mut self) -> DocketResult<Filter> {
        let mut items = vec![self.parse_and()?];
        while self.at_word("or")? {
            self.lexer.next_token()?;
            items.push(self.parse_and()?);
        }
        Ok(collapse(items, Filter::Or))
    }

    fn parse_and(&mut self) -> DocketResult<Filter> {
        let mut items = vec![self.parse_unary()?];
        while self.at_word("and")? {
            self.lexer.next_token()?;
            items.push(self.parse_unary()?);
        }
        Ok(collapse(items, Filter::And))
    }

    fn parse_unary(&mut self) -> DocketResult<Filter> {
        let (token, position) = self.lexer.next_token()?;
        match token {
            Token::Word(word) if word == "not" => Ok(Filter::Not(Box::new(self.parse_unary()?))),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::SlashEq => Ok(Filter::Ids(self.parse_id_set()?)),
            Token::Slash => {
                let nodes = self.parse_node_path()?;
                if nodes.len() == 1 && nodes[0] == Node::Any {
                    Ok(Filter::All)
                } else {
                    Ok(Filter::Path(nodes))
                }
            }
            other => Err(unexpected(&other, position, "a node path")),
        }
    }

    fn parse_id_set(&mut self) -> DocketResult<Vec<IdItem>> {
        if self.lexer.peek()? != &Token::LBracket {
            return Ok(vec![self.parse_id_item()?]);
        }
        self.lexer.next_token()?;
        let mut items = vec![self.parse_id_item()?];
        loop {
            let (token, position) = self.lexer.next_token()?;
            match token {
                Token::Comma => items.push(self.parse_id_item()?),
                Token::RBracket => return Ok(items),
                other => return Err(unexpected(&other, position, "',' or ']'")),
            }
        }
    }

    fn parse_id_item(&mut self) -> DocketResult<IdItem> {
        let (token, position) = self.lexer.next_token()?;
        match token {
            Token::Integer(id) if id >= 1 => Ok(IdItem::Id(id as u64)),
            Token::Integer(id) => Err(syntax_error(position, &format!("invalid document id {}", id))),
            Token::Placeholder(name) => Ok(IdItem::Placeholder(self.placeholder_name(name))),
            other => Err(unexpected(&other, position, "a document id")),
        }
    }

    // called after the leading '/' has been consumed
    fn parse_node_path(&mut self) -> DocketResult<NodePath> {
        let mut nodes: NodePath = SmallVec::new();
        nodes.push(self.parse_node()?);
        while self.lexer.peek()? == &Token::Slash {
            self.lexer.next_token()?;
            nodes.push(self.parse_node()?);
        }
        Ok(nodes)
    }

    fn parse_node(&mut self) -> DocketResult<Node> {
        let (token, position) = self.lexer.next_token()?;
        match token {
            Token::Star => Ok(Node::Any),
            Token::DoubleStar => Ok(Node::AnyDeep),
            Token::LBracket => {
                let predicate = self.parse_pred_or()?;
                self.expect(Token::RBracket)?;
                Ok(Node::Pred(predicate))
            }
            other => name_of(other, position).map(Node::Field),
        }
    }

    fn parse_pred_or(&mut self) -> DocketResult<Predicate> {
        let mut items = vec![self.parse_pred_and()?];
        while self.at_word("or")? {
            self.lexer.next_token()?;
            items.push(self.parse_pred_and()?);
        }
        Ok(collapse(items, Predicate::Or))
    }

    fn parse_pred_and(&mut self) -> DocketResult<Predicate> {
        let mut items = vec![self.parse_pred_not()?];
        while self.at_word("and")? {
            self.lexer.next_token()?;
            items.push(self.parse_pred_not()?);
        }
        Ok(collapse(items, Predicate::And))
    }

    fn parse_pred_not(&mut self) -> DocketResult<Predicate> {
        if self.at_word("not")? {
            self.lexer.next_token()?;
            return Ok(Predicate::Not(Box::new(self.parse_pred_not()?)));
        }
        if self.lexer.peek()? == &Token::LParen {
            self.lexer.next_token()?;
            let inner = self.parse_pred_or()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        Ok(Predicate::Compare(self.parse_comparison()?))
    }

    fn parse_comparison(&mut self) -> DocketResult<Comparison> {
        let (token, position) = self.lexer.next_token()?;
        let field = name_of(token, position)?;

        let (token, position) = self.lexer.next_token()?;
        let op = match &token {
            Token::Symbol(symbol) => CompareOp::from_symbol(symbol),
            Token::Word(word) => CompareOp::from_symbol(word),
            _ => None,
        }
        .ok_or_else(|| unexpected(&token, position, "a comparison operator"))?;

        let operand = self.parse_operand()?;
        if op == CompareOp::Re {
            if let Operand::Literal(value) = &operand {
                if !value.is_string() {
                    return Err(syntax_error(position, "'re' expects a string pattern"));
                }
            }
        }
        Ok(Comparison { field, op, operand })
    }

    fn parse_operand(&mut self) -> DocketResult<Operand> {
        if matches!(self.lexer.peek_char(), Some('"' | '[' | '{')) {
            return Ok(Operand::Literal(self.lexer.take_json()?));
        }
        let (token, position) = self.lexer.next_token()?;
        let literal = match token {
            Token::Integer(i) => Value::from(i),
            Token::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| syntax_error(position, "number is not finite"))?,
            Token::Word(word) if word == "true" => Value::Bool(true),
            Token::Word(word) if word == "false" => Value::Bool(false),
            Token::Word(word) if word == "null" => Value::Null,
            Token::Placeholder(name) => return Ok(Operand::Placeholder(self.placeholder_name(name))),
            other => return Err(unexpected(&other, position, "a literal or placeholder")),
        };
        Ok(Operand::Literal(literal))
    }

    fn parse_clause(&mut self) -> DocketResult<Clause> {
        if self.lexer.peek()? == &Token::Slash {
            return self.parse_projection(false).map(Clause::Projection);
        }
        let (token, position) = self.lexer.next_token()?;
        let Token::Word(word) = token else {
            return Err(unexpected(&token, position, "a clause"));
        };
        match word.as_str() {
            "skip" => Ok(Clause::Skip(self.parse_count()?)),
            "limit" => Ok(Clause::Limit(self.parse_count()?)),
            "count" => Ok(Clause::Count),
            "asc" | "desc" => {
                self.expect(Token::Slash)?;
                let mut pointer = vec![self.parse_name()?];
                while self.lexer.peek()? == &Token::Slash {
                    self.lexer.next_token()?;
                    pointer.push(self.parse_name()?);
                }
                Ok(Clause::Order {
                    pointer,
                    descending: word == "desc",
                })
            }
            "del" => Ok(Clause::Del),
            "apply" => {
                let payload = self.lexer.take_json()?;
                match &payload {
                    Value::Object(_) => {}
                    Value::Array(_) => {
                        PatchOperation::from_value(payload.clone())?;
                    }
                    _ => {
                        return Err(syntax_error(
                            position,
                            "'apply' expects a merge patch object or a patch array",
                        ))
                    }
                }
                Ok(Clause::Apply(payload))
            }
            "all" => self.parse_projection(true).map(Clause::Projection),
            other => Err(syntax_error(position, &format!("unknown clause '{}'", other))),
        }
    }

    fn parse_count(&mut self) -> DocketResult<Count> {
        let (token, position) = self.lexer.next_token()?;
        match token {
            Token::Integer(n) if n >= 0 => Ok(Count::Value(n as u64)),
            Token::Placeholder(name) => Ok(Count::Placeholder(self.placeholder_name(name))),
            other => Err(unexpected(&other, position, "a non-negative integer")),
        }
    }

    fn parse_projection(&mut self, all: bool) -> DocketResult<Projection> {
        let mut projection = Projection {
            all,
            ..Projection::default()
        };
        if !all {
            projection.include.extend(self.parse_projection_path()?);
        }
        loop {
            match self.lexer.peek()? {
                Token::Plus => {
                    self.lexer.next_token()?;
                    projection.include.extend(self.parse_projection_path()?);
                }
                Token::Minus => {
                    self.lexer.next_token()?;
                    projection.exclude.extend(self.parse_projection_path()?);
                }
                _ => return Ok(projection),
            }
        }
    }

    // '/' name ('/' name)* with an optional trailing '/{a,b}' group
    fn parse_projection_path(&mut self) -> DocketResult<Vec<Vec<String>>> {
        let mut prefix = Vec::new();
        loop {
            self.expect(Token::Slash)?;
            if self.lexer.peek()? == &Token::LBrace {
                self.lexer.next_token()?;
                let mut paths = Vec::new();
                loop {
                    let mut path = prefix.clone();
                    path.push(self.parse_name()?);
                    paths.push(path);
                    let (token, position) = self.lexer.next_token()?;
                    match token {
                        Token::Comma => continue,
                        Token::RBrace => return Ok(paths),
                        other => return Err(unexpected(&other, position, "',' or '}'")),
                    }
                }
            }
            prefix.push(self.parse_name()?);
            if self.lexer.peek()? != &Token::Slash {
                return Ok(vec![prefix]);
            }
        }
    }

    fn parse_name(&mut self) -> DocketResult<String> {
        let (token, position) = self.lexer.next_token()?;
        name_of(token, position)
    }

    fn placeholder_name(&mut self, name: Option<String>) -> String {
        name.unwrap_or_else(|| {
            let positional = self.positional.to_string();
            self.positional += 1;
            positional
        })
    }

    fn at_word(&mut self, word: &str) -> DocketResult<bool> {
        Ok(matches!(self.lexer.peek()?, Token::Word(w) if w == word))
    }

    fn expect(&mut self, expected: Token) -> DocketResult<()> {
        let (token, position) = self.lexer.next_token()?;
        if token == expected {
            Ok(())
        } else {
            Err(unexpected(&token, position, &expected.to_string()))
        }
    }
}

fn name_of(token: Token, position: usize) -> DocketResult<String> {
    match token {
        Token::Word(word) => Ok(word),
        Token::Str(text) => Ok(text),
        Token::Integer(i) if i >= 0 => Ok(i.to_string()),
        other => Err(unexpected(&other, position, "a field name")),
    }
}

fn collapse<T>(mut items: Vec<T>, combine: fn(Vec<T>) -> T) -> T {
    if items.len() == 1 {
        if let Some(item) = items.pop() {
            return item;
        }
    }
    combine(items)
}

fn unexpected(token: &Token, position: usize, expected: &str) -> crate::errors::DocketError {
    syntax_error(position, &format!("expected {}, found {}", expected, token))
}
