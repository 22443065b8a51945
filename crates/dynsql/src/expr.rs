//! Boolean test expressions.
//!
//! A small recursive-descent language evaluated against a parameter bag:
//!
//! ```text
//! or      := and (("or" | "||") and)*
//! and     := not (("and" | "&&") not)*
//! not     := ("not" | "!") not | cmp
//! cmp     := operand (("==" | "!=" | "<" | "<=" | ">" | ">=") operand)?
//! operand := field | literal | "(" or ")" | call
//! call    := ("eq" | "ne" | "lt" | "le" | "gt" | "ge") arg arg+
//!          | ("and" | "or") arg+
//! arg     := field | literal | "(" or ")"
//! ```
//!
//! Fields are written `.name` (dotted paths walk nested objects). Literals are
//! integers, floats, quoted strings, `true`, `false` and `null` (alias `nil`).
//!
//! A bare field is a truthiness test: a missing key, `null`, `false`, `0`,
//! `""` and empty arrays/objects are all false. Comparisons require both
//! operands to exist and be of compatible kinds.

use crate::error::{DynSqlError, DynSqlResult};
use crate::params::{Parameters, kind_name};
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "lt" => Self::Lt,
            "le" => Self::Le,
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            _ => return None,
        })
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(Vec<String>),
    Literal(Value),
    Word(String),
    Cmp(CmpOp),
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Field(Vec<String>),
    Literal(Value),
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
    Compare(CmpOp, Box<Node>, Box<Node>),
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> DynSqlResult<Vec<(usize, Token)>> {
        let mut tokens = Vec::new();
        loop {
            let (pos, token) = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push((pos, token));
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> DynSqlError {
        DynSqlError::syntax(self.src, pos, message)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|&(_, c)| c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn next_token(&mut self) -> DynSqlResult<(usize, Token)> {
        while self.chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
            self.chars.next();
        }
        let Some((pos, c)) = self.chars.next() else {
            return Ok((self.src.len(), Token::Eof));
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '=' if self.eat('=') => Token::Cmp(CmpOp::Eq),
            '!' if self.eat('=') => Token::Cmp(CmpOp::Ne),
            '!' => Token::Bang,
            '<' if self.eat('=') => Token::Cmp(CmpOp::Le),
            '<' => Token::Cmp(CmpOp::Lt),
            '>' if self.eat('=') => Token::Cmp(CmpOp::Ge),
            '>' => Token::Cmp(CmpOp::Gt),
            '&' if self.eat('&') => Token::AndAnd,
            '|' if self.eat('|') => Token::OrOr,
            '.' => self.field(pos)?,
            '\'' | '"' => self.string(pos, c)?,
            '-' if self.chars.peek().is_some_and(|&(_, n)| n.is_ascii_digit()) => {
                self.number(pos, "-".to_string())?
            }
            c if c.is_ascii_digit() => self.number(pos, c.to_string())?,
            c if c.is_alphabetic() || c == '_' => {
                let mut word = c.to_string();
                word.push_str(&self.take_while(|c| c.is_alphanumeric() || c == '_'));
                match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" | "nil" => Token::Literal(Value::Null),
                    _ => Token::Word(word),
                }
            }
            other => return Err(self.error(pos, format!("unexpected character '{other}'"))),
        };
        Ok((pos, token))
    }

    fn field(&mut self, pos: usize) -> DynSqlResult<Token> {
        let mut path = Vec::new();
        loop {
            let seg = self.take_while(|c| c.is_alphanumeric() || c == '_');
            if seg.is_empty() {
                return Err(self.error(pos, "expected field name after '.'"));
            }
            path.push(seg);
            if !self.eat('.') {
                return Ok(Token::Field(path));
            }
        }
    }

    fn string(&mut self, pos: usize, quote: char) -> DynSqlResult<Token> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c == quote => return Ok(Token::Literal(Value::String(out))),
                c => out.push(c),
            }
        }
        Err(self.error(pos, "unterminated string literal"))
    }

    fn number(&mut self, pos: usize, mut text: String) -> DynSqlResult<Token> {
        text.push_str(&self.take_while(|c| c.is_ascii_digit()));

        let mut is_float = false;
        let mut ahead = self.chars.clone();
        ahead.next();
        let fraction_follows = ahead.peek().is_some_and(|&(_, c)| c.is_ascii_digit());
        if fraction_follows && self.eat('.') {
            is_float = true;
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        let value = if is_float {
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        } else {
            text.parse::<i64>().ok().map(Value::from)
        };
        value
            .map(Token::Literal)
            .ok_or_else(|| self.error(pos, format!("invalid number '{text}'")))
    }
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> DynSqlError {
        DynSqlError::syntax(self.src, self.offset(), message)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Word(w) if w == word)
    }

    fn starts_arg(&self) -> bool {
        matches!(
            self.peek(),
            Token::Field(_) | Token::Literal(_) | Token::LParen
        )
    }

    fn parse(mut self) -> DynSqlResult<Node> {
        if *self.peek() == Token::Eof {
            return Err(self.error("empty expression"));
        }
        let node = self.parse_or()?;
        match self.peek() {
            Token::Eof => Ok(node),
            other => Err(self.error(format!("unexpected trailing token {other:?}"))),
        }
    }

    fn parse_or(&mut self) -> DynSqlResult<Node> {
        let mut items = vec![self.parse_and()?];
        while *self.peek() == Token::OrOr || self.is_word("or") {
            self.bump();
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Node::Or(items)
        })
    }

    fn parse_and(&mut self) -> DynSqlResult<Node> {
        let mut items = vec![self.parse_not()?];
        while *self.peek() == Token::AndAnd || self.is_word("and") {
            self.bump();
            items.push(self.parse_not()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Node::And(items)
        })
    }

    fn parse_not(&mut self) -> DynSqlResult<Node> {
        if *self.peek() == Token::Bang || self.is_word("not") {
            self.bump();
            return Ok(Node::Not(Box::new(self.parse_not()?)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> DynSqlResult<Node> {
        let left = self.parse_operand()?;
        if let Token::Cmp(op) = *self.peek() {
            self.bump();
            let right = self.parse_operand()?;
            return Ok(Node::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_operand(&mut self) -> DynSqlResult<Node> {
        if let Token::Word(word) = self.peek() {
            let word = word.clone();
            return self.parse_call(&word);
        }
        self.parse_arg()
    }

    fn parse_arg(&mut self) -> DynSqlResult<Node> {
        match self.bump() {
            Token::Field(path) => Ok(Node::Field(path)),
            Token::Literal(value) => Ok(Node::Literal(value)),
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.bump() {
                    Token::RParen => Ok(inner),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Token::Eof => Err(self.error("unexpected end of expression")),
            other => Err(self.error(format!("expected operand, found {other:?}"))),
        }
    }

    fn parse_args(&mut self) -> DynSqlResult<Vec<Node>> {
        let mut args = Vec::new();
        while self.starts_arg() {
            args.push(self.parse_arg()?);
        }
        Ok(args)
    }

    fn parse_call(&mut self, word: &str) -> DynSqlResult<Node> {
        if let Some(op) = CmpOp::from_word(word) {
            self.bump();
            let mut args = self.parse_args()?;
            if args.len() < 2 {
                return Err(self.error(format!("{word} expects two arguments")));
            }
            let left = args.remove(0);
            return match (op, args.len()) {
                (_, 1) => Ok(Node::Compare(
                    op,
                    Box::new(left),
                    Box::new(args.remove(0)),
                )),
                // `eq a b c` matches a against any of the rest
                (CmpOp::Eq, _) => Ok(Node::Or(
                    args.into_iter()
                        .map(|arg| Node::Compare(op, Box::new(left.clone()), Box::new(arg)))
                        .collect(),
                )),
                _ => Err(self.error(format!("{word} expects two arguments"))),
            };
        }

        match word {
            "and" | "or" => {
                self.bump();
                let args = self.parse_args()?;
                if args.is_empty() {
                    return Err(self.error(format!("{word} expects at least one argument")));
                }
                Ok(if word == "and" {
                    Node::And(args)
                } else {
                    Node::Or(args)
                })
            }
            _ => Err(self.error(format!("unknown identifier '{word}'"))),
        }
    }
}

/// A compiled boolean test expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Compile an expression.
    pub fn compile(source: &str) -> DynSqlResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        let root = Parser {
            src: source,
            tokens,
            pos: 0,
        }
        .parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// The source text this expression was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a parameter bag.
    pub fn evaluate(&self, params: &dyn Parameters) -> DynSqlResult<bool> {
        Eval {
            source: &self.source,
            params,
        }
        .truth(&self.root)
    }
}

struct Eval<'a> {
    source: &'a str,
    params: &'a dyn Parameters,
}

impl<'a> Eval<'a> {
    fn fail(&self, message: impl std::fmt::Display) -> DynSqlError {
        DynSqlError::execution(format!("{}: {}", self.source, message))
    }

    fn lookup(&self, path: &[String]) -> Option<&'a Value> {
        let params: &'a dyn Parameters = self.params;
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(params.get(first)?, |value, seg| value.get(seg.as_str()))
    }

    fn truth(&self, node: &Node) -> DynSqlResult<bool> {
        match node {
            Node::Field(path) => Ok(self.lookup(path).is_some_and(truthy)),
            Node::Literal(value) => Ok(truthy(value)),
            Node::Not(inner) => Ok(!self.truth(inner)?),
            Node::And(items) => {
                for item in items {
                    if !self.truth(item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Node::Or(items) => {
                for item in items {
                    if self.truth(item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Node::Compare(op, left, right) => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                self.compare(*op, &left, &right)
            }
        }
    }

    fn operand(&self, node: &Node) -> DynSqlResult<Cow<'a, Value>> {
        match node {
            Node::Field(path) => self
                .lookup(path)
                .map(Cow::Borrowed)
                .ok_or_else(|| self.fail(format!("undefined field .{}", path.join(".")))),
            Node::Literal(value) => Ok(Cow::Owned(value.clone())),
            other => Ok(Cow::Owned(Value::Bool(self.truth(other)?))),
        }
    }

    fn compare(&self, op: CmpOp, left: &Value, right: &Value) -> DynSqlResult<bool> {
        let incompatible = || {
            self.fail(format!(
                "incompatible types for comparison: {} {} {}",
                kind_name(left),
                op.symbol(),
                kind_name(right)
            ))
        };

        if matches!(op, CmpOp::Eq | CmpOp::Ne) {
            let equal = match (left, right) {
                (Value::Null, _) | (_, Value::Null) => left.is_null() && right.is_null(),
                (Value::Number(_), Value::Number(_)) => {
                    order_numbers(left, right) == Some(Ordering::Equal)
                }
                (Value::String(a), Value::String(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
                    left == right
                }
                _ => return Err(incompatible()),
            };
            return Ok(equal == (op == CmpOp::Eq));
        }

        let ordering = match (left, right) {
            (Value::Number(_), Value::Number(_)) => {
                order_numbers(left, right).ok_or_else(incompatible)?
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => return Err(incompatible()),
        };
        Ok(match op {
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
        })
    }
}

fn order_numbers(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return Some(a.cmp(&b));
    }
    left.as_f64()?.partial_cmp(&right.as_f64()?)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests;
