use crate::errors::{DocketError, DocketResult, ErrorKind};
use serde_json::Value;
use std::fmt::Display;

/// A lexical token of the query language.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// `/`
    Slash,
    /// `/=`, the ID-set node
    SlashEq,
    /// `*`
    Star,
    /// `**`
    DoubleStar,
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Pipe,
    Plus,
    Minus,
    /// `=`, `!=`, `>`, `>=`, `<`, `<=`
    Symbol(&'static str),
    /// Bare identifiers and keywords.
    Word(String),
    /// Double-quoted JSON string.
    Str(String),
    Integer(i64),
    Float(f64),
    /// `:name`, or `:?` (`None`).
    Placeholder(Option<String>),
    Eof,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Slash => write!(f, "'/'"),
            Token::SlashEq => write!(f, "'/='"),
            Token::Star => write!(f, "'*'"),
            Token::DoubleStar => write!(f, "'**'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::Comma => write!(f, "','"),
            Token::Pipe => write!(f, "'|'"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Symbol(s) => write!(f, "'{}'", s),
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::Placeholder(Some(name)) => write!(f, "':{}'", name),
            Token::Placeholder(None) => write!(f, "':?'"),
            Token::Eof => write!(f, "end of query"),
        }
    }
}

/// Pull-based tokenizer over query text.
///
/// The parser pulls tokens one at a time and may ask for a raw JSON value
/// at the current position (`apply` payloads and array/object/string
/// operands), which is decoded by `serde_json` directly from the source.
pub(crate) struct Lexer<'a> {
    source: &'a str,
    position: usize,
    peeked: Option<(Token, usize)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            position: 0,
            peeked: None,
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> DocketResult<&Token> {
        if self.peeked.is_none() {
            let token = self.scan()?;
            self.peeked = Some(token);
        }
        match &self.peeked {
            Some((token, _)) => Ok(token),
            None => Err(syntax_error(self.position, "unexpected end of query")),
        }
    }

    /// Consumes and returns the next token with its byte offset.
    pub fn next_token(&mut self) -> DocketResult<(Token, usize)> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    /// First non-whitespace character at the current position. Must not be
    /// called while a token is peeked.
    pub fn peek_char(&mut self) -> Option<char> {
        debug_assert!(self.peeked.is_none());
        self.skip_whitespace();
        self.rest().chars().next()
    }

    /// Decodes one JSON value starting at the current position.
    pub fn take_json(&mut self) -> DocketResult<Value> {
        debug_assert!(self.peeked.is_none());
        self.skip_whitespace();
        let start = self.position;
        let mut stream = serde_json::Deserializer::from_str(self.rest()).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                self.position = start + stream.byte_offset();
                Ok(value)
            }
            Some(Err(err)) => Err(syntax_error(start, &format!("invalid JSON value: {}", err))),
            None => Err(syntax_error(start, "expected a JSON value")),
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.position += rest.len() - trimmed.len();
    }

    fn scan(&mut self) -> DocketResult<(Token, usize)> {
        self.skip_whitespace();
        let start = self.position;
        let rest = self.rest();
        let mut chars = rest.chars();
        let Some(c) = chars.next() else {
            return Ok((Token::Eof, start));
        };
        let next = chars.next();

        let (token, width) = match c {
            '/' if next == Some('=') => (Token::SlashEq, 2),
            '/' => (Token::Slash, 1),
            '*' if next == Some('*') => (Token::DoubleStar, 2),
            '*' => (Token::Star, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '{' => (Token::LBrace, 1),
            '}' => (Token::RBrace, 1),
            ',' => (Token::Comma, 1),
            '|' => (Token::Pipe, 1),
            '+' => (Token::Plus, 1),
            '=' => (Token::Symbol("="), 1),
            '!' if next == Some('=') => (Token::Symbol("!="), 2),
            '>' if next == Some('=') => (Token::Symbol(">="), 2),
            '>' => (Token::Symbol(">"), 1),
            '<' if next == Some('=') => (Token::Symbol("<="), 2),
            '<' => (Token::Symbol("<"), 1),
            '-' if next.is_some_and(|n| n.is_ascii_digit()) => self.scan_number(start)?,
            '-' => (Token::Minus, 1),
            '0'..='9' => self.scan_number(start)?,
            '"' => self.scan_string(start)?,
            ':' => self.scan_placeholder(start)?,
            c if is_word_start(c) => {
                let word: String = rest.chars().take_while(|c| is_word_char(*c)).collect();
                let width = word.len();
                (Token::Word(word), width)
            }
            other => {
                return Err(syntax_error(start, &format!("unexpected character '{}'", other)));
            }
        };
        self.position = start + width;
        Ok((token, start))
    }

    fn scan_number(&self, start: usize) -> DocketResult<(Token, usize)> {
        let text = &self.source[start..];
        let mut width = 0;
        let mut is_float = false;
        for (i, c) in text.char_indices() {
            let accepted = match c {
                '0'..='9' => true,
                '-' if i == 0 => true,
                '.' | 'e' | 'E' => {
                    is_float = true;
                    true
                }
                '+' | '-' => matches!(text[..i].chars().last(), Some('e' | 'E')),
                _ => false,
            };
            if !accepted {
                break;
            }
            width = i + c.len_utf8();
        }
        let literal = &text[..width];
        let token = if is_float {
            literal.parse::<f64>().ok().filter(|f| f.is_finite()).map(Token::Float)
        } else {
            literal.parse::<i64>().ok().map(Token::Integer)
        };
        token
            .map(|token| (token, width))
            .ok_or_else(|| syntax_error(start, &format!("invalid number '{}'", literal)))
    }

    fn scan_string(&self, start: usize) -> DocketResult<(Token, usize)> {
        let text = &self.source[start..];
        let mut escaped = false;
        for (i, c) in text.char_indices().skip(1) {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    let literal = &text[..=i];
                    let value: String = serde_json::from_str(literal).map_err(|err| {
                        syntax_error(start, &format!("invalid string literal: {}", err))
                    })?;
                    return Ok((Token::Str(value), i + 1));
                }
                _ => escaped = false,
            }
        }
        Err(syntax_error(start, "unterminated string literal"))
    }

    fn scan_placeholder(&self, start: usize) -> DocketResult<(Token, usize)> {
        let text = &self.source[start + 1..];
        if text.starts_with('?') {
            return Ok((Token::Placeholder(None), 2));
        }
        let name: String = text.chars().take_while(|c| is_word_char(*c)).collect();
        if name.is_empty() {
            return Err(syntax_error(start, "expected a placeholder name after ':'"));
        }
        let width = name.len() + 1;
        Ok((Token::Placeholder(Some(name)), width))
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$' || c == '@'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '@' || c == '.'
}

pub(crate) fn syntax_error(position: usize, message: &str) -> DocketError {
    log::error!("Query syntax error at position {}: {}", position, message);
    DocketError::new(
        &format!("Query syntax error at position {}: {}", position, message),
        ErrorKind::InvalidArgument,
    )
}
