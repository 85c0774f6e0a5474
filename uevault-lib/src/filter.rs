//! Row filters for the dataset view.
//!
//! A query is either the name of a preset (`owned`, `category(Env)`), the
//! name of a saved filter, or a boolean expression over record fields:
//!
//! ```text
//! owned and (price < 20 || `Must buy`) and not category ~ characters
//! category(Environments) and not_owned
//! ```
//!
//! Presets may appear anywhere a column may.
//!
//! Operators: `and`/`&&`, `or`/`||`, `not`/`!`, parentheses, and comparisons
//! `== = != < <= > >= ~ !~`. Column names match field names case-insensitively,
//! with underscores standing for spaces; backquotes allow names with spaces.
//! Values containing spaces or operator characters are single or double quoted.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uevault_catalog::record::{parse_bool_literal, split_list};
use uevault_catalog::schema::{self, FieldSpec, ValueType};
use uevault_catalog::{FieldValue, Record, field};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid filter '{query}': {message}")]
    Syntax { query: String, message: String },
}

impl FilterError {
    fn syntax(query: &str, message: impl Into<String>) -> Self {
        Self::Syntax {
            query: query.to_string(),
            message: message.into(),
        }
    }
}

/// How a saved filter's expression is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// A boolean expression over fields.
    #[default]
    StringQuery,
    /// A preset call such as `category(Environments)`.
    NamedCallable,
}

/// A named filter as stored in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterValue {
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub kind: FilterKind,
}

impl FilterValue {
    pub fn query(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            kind: FilterKind::StringQuery,
        }
    }

    pub fn callable(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            kind: FilterKind::NamedCallable,
        }
    }
}

// ── Presets ─────────────────────────────────────────────────────────────────

/// Built-in filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preset {
    Owned,
    NotOwned,
    Obsolete,
    MustBuy,
    Discounted,
    AddedManually,
    /// Rows with a non-empty comment.
    Commented,
    /// Category contains the text.
    Category(String),
    /// One of the origins contains the text.
    Origin(String),
    /// Any field contains the text.
    Text(String),
}

impl Preset {
    /// Names accepted without arguments.
    pub const NAMES: &'static [&'static str] = &[
        "owned",
        "not_owned",
        "obsolete",
        "must_buy",
        "discounted",
        "added_manually",
        "commented",
    ];

    /// Names accepted in the `name(arg)` form.
    pub const CALLABLES: &'static [&'static str] = &["category", "origin", "text"];

    fn by_name(name: &str) -> Option<Self> {
        let preset = match name.to_lowercase().replace(' ', "_").as_str() {
            "owned" => Self::Owned,
            "not_owned" => Self::NotOwned,
            "obsolete" => Self::Obsolete,
            "must_buy" => Self::MustBuy,
            "discounted" => Self::Discounted,
            "added_manually" => Self::AddedManually,
            "commented" => Self::Commented,
            _ => return None,
        };
        Some(preset)
    }

    /// Parse `name` or `name(arg)`. `Ok(None)` means the text is not a preset.
    fn parse(query: &str) -> Result<Option<Self>, FilterError> {
        let text = query.trim();
        if let Some(preset) = Self::by_name(text) {
            return Ok(Some(preset));
        }
        let Some((name, rest)) = text.split_once('(') else {
            return Ok(None);
        };
        let name = name.trim().to_lowercase();
        if !Self::CALLABLES.contains(&name.as_str()) {
            return Ok(None);
        }
        // Anything beyond a single call is left to the expression parser.
        let Some(arg) = rest.strip_suffix(')').filter(|a| !a.contains(['(', ')'])) else {
            return Ok(None);
        };
        let arg = unquote(arg.trim()).to_string();
        if arg.is_empty() {
            return Err(FilterError::syntax(query, format!("{name}() needs an argument")));
        }
        Ok(Some(Self::call(&name, arg)))
    }

    /// Build a callable preset. `name` must be one of [`Self::CALLABLES`].
    fn call(name: &str, arg: String) -> Self {
        match name {
            "category" => Self::Category(arg),
            "origin" => Self::Origin(arg),
            _ => Self::Text(arg),
        }
    }

    fn matches(&self, record: &Record) -> bool {
        let flag = |name: &str| record.get(name).and_then(FieldValue::as_bool).unwrap_or(false);
        match self {
            Self::Owned => flag(field::OWNED),
            Self::NotOwned => !flag(field::OWNED),
            Self::Obsolete => flag(field::OBSOLETE),
            Self::MustBuy => flag(field::MUST_BUY),
            Self::Discounted => flag(field::DISCOUNTED),
            Self::AddedManually => flag(field::ADDED_MANUALLY),
            Self::Commented => record.get(field::COMMENT).is_some_and(|v| !v.is_empty()),
            Self::Category(wanted) => contains_ci(&cell(record, field::CATEGORY), wanted),
            Self::Origin(wanted) => {
                let origins = match record.get(field::ORIGIN) {
                    Some(FieldValue::List(items)) => items.clone(),
                    Some(other) => split_list(&other.to_cell()),
                    None => Vec::new(),
                };
                origins.iter().any(|o| contains_ci(o, wanted))
            }
            Self::Text(wanted) => record
                .iter()
                .any(|(_, value)| contains_ci(&value.to_cell(), wanted)),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned => f.write_str("owned"),
            Self::NotOwned => f.write_str("not_owned"),
            Self::Obsolete => f.write_str("obsolete"),
            Self::MustBuy => f.write_str("must_buy"),
            Self::Discounted => f.write_str("discounted"),
            Self::AddedManually => f.write_str("added_manually"),
            Self::Commented => f.write_str("commented"),
            Self::Category(arg) => write!(f, "category({arg})"),
            Self::Origin(arg) => write!(f, "origin({arg})"),
            Self::Text(arg) => write!(f, "text({arg})"),
        }
    }
}

fn cell(record: &Record, name: &str) -> String {
    record.get(name).map(FieldValue::to_cell).unwrap_or_default()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

// ── Expressions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    NotContains,
}

impl CompareOp {
    fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    fn is_negated(self) -> bool {
        matches!(self, Self::Ne | Self::NotContains)
    }

    fn ordering_holds(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Self::Lt => ord == Less,
            Self::Le => ord != Greater,
            Self::Gt => ord == Greater,
            Self::Ge => ord != Less,
            Self::Eq | Self::Contains => ord == Equal,
            Self::Ne | Self::NotContains => ord != Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Text(String),
    Number(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        field: &'static FieldSpec,
        op: CompareOp,
        value: Operand,
    },
    /// Bare column: true for a set flag, or any non-empty value.
    Truthy(&'static FieldSpec),
    Preset(Preset),
}

impl Expr {
    fn eval(&self, record: &Record) -> bool {
        match self {
            Self::And(a, b) => a.eval(record) && b.eval(record),
            Self::Or(a, b) => a.eval(record) || b.eval(record),
            Self::Not(inner) => !inner.eval(record),
            Self::Preset(preset) => preset.matches(record),
            Self::Truthy(spec) => match record.get(spec.name) {
                Some(value) if spec.value_type == ValueType::Bool => {
                    value.as_bool().unwrap_or(false)
                }
                Some(value) => !value.is_empty(),
                None => false,
            },
            Self::Compare { field, op, value } => {
                let stored = record.get(field.name).unwrap_or(&FieldValue::Empty);
                compare(stored, *op, value)
            }
        }
    }
}

fn compare(stored: &FieldValue, op: CompareOp, operand: &Operand) -> bool {
    match operand {
        Operand::Number(wanted) => match stored.as_f64() {
            Some(have) => have
                .partial_cmp(wanted)
                .is_some_and(|ord| op.ordering_holds(ord)),
            None => op.is_negated(),
        },
        Operand::Bool(wanted) => {
            let have = stored.as_bool().unwrap_or(false);
            (have == *wanted) != op.is_negated()
        }
        Operand::Text(wanted) => {
            let have = stored.to_cell().to_lowercase();
            let wanted = wanted.to_lowercase();
            if op.is_ordering() {
                op.ordering_holds(have.as_str().cmp(wanted.as_str()))
            } else {
                have.contains(&wanted) != op.is_negated()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Op(CompareOp),
    Word(String),
    Quoted(String),
    Name(String),
}

fn tokenize(query: &str) -> Result<Vec<Token>, FilterError> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            (c, _) if c.is_whitespace() => {
                i += 1;
                continue;
            }
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('!', Some('=')) => (Token::Op(CompareOp::Ne), 2),
            ('!', Some('~')) => (Token::Op(CompareOp::NotContains), 2),
            ('!', _) => (Token::Not, 1),
            ('=', Some('=')) => (Token::Op(CompareOp::Eq), 2),
            ('=', _) => (Token::Op(CompareOp::Eq), 1),
            ('~', _) => (Token::Op(CompareOp::Contains), 1),
            ('<', Some('=')) => (Token::Op(CompareOp::Le), 2),
            ('<', _) => (Token::Op(CompareOp::Lt), 1),
            ('>', Some('=')) => (Token::Op(CompareOp::Ge), 2),
            ('>', _) => (Token::Op(CompareOp::Gt), 1),
            ('&' | '|', _) => {
                return Err(FilterError::syntax(query, format!("lone '{c}' at {i}")));
            }
            ('`' | '"' | '\'', _) => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| FilterError::syntax(query, format!("unclosed {c} at {i}")))?;
                let inner: String = chars[i + 1..i + 1 + close].iter().collect();
                let token = if c == '`' {
                    Token::Name(inner)
                } else {
                    Token::Quoted(inner)
                };
                (token, close + 2)
            }
            _ => {
                let len = chars[i..]
                    .iter()
                    .take_while(|&&ch| !ch.is_whitespace() && !"()&|!=~<>`\"'".contains(ch))
                    .count();
                let word: String = chars[i..i + len].iter().collect();
                let token = match word.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Word(word),
                };
                (token, len)
            }
        };
        tokens.push(token);
        i += width;
    }
    Ok(tokens)
}

struct Parser<'a> {
    query: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> FilterError {
        FilterError::syntax(self.query, message)
    }

    fn parse(mut self) -> Result<Expr, FilterError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty expression"));
        }
        let expr = self.or_expr()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(self.error(format!("unexpected {token:?}"))),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.bump();
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, FilterError> {
        if self.peek() == Some(&Token::Not) {
            self.bump();
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FilterError> {
        match self.bump() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("missing closing parenthesis")),
                }
            }
            Some(Token::Word(name)) if self.peek() == Some(&Token::LParen) => self.call(&name),
            Some(Token::Word(name) | Token::Name(name)) => self.comparison(&name),
            Some(token) => Err(self.error(format!("expected a column, found {token:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    /// `name(arg)` preset call; the current token is the opening parenthesis.
    fn call(&mut self, name: &str) -> Result<Expr, FilterError> {
        let name = name.to_lowercase();
        if !Preset::CALLABLES.contains(&name.as_str()) {
            return Err(self.error(format!("unknown preset '{name}'")));
        }
        self.bump();
        let mut words = Vec::new();
        loop {
            match self.bump() {
                Some(Token::RParen) => break,
                Some(Token::Word(w) | Token::Quoted(w) | Token::Name(w)) => words.push(w),
                _ => return Err(self.error(format!("{name}( is not closed"))),
            }
        }
        let arg = words.join(" ");
        if arg.is_empty() {
            return Err(self.error(format!("{name}() needs an argument")));
        }
        Ok(Expr::Preset(Preset::call(&name, arg)))
    }

    fn comparison(&mut self, name: &str) -> Result<Expr, FilterError> {
        let Some(spec) = schema::find_field(name) else {
            return match Preset::by_name(name) {
                Some(preset) if !matches!(self.peek(), Some(Token::Op(_))) => {
                    Ok(Expr::Preset(preset))
                }
                _ => Err(self.error(format!("unknown column '{name}'"))),
            };
        };
        let Some(Token::Op(op)) = self.peek().cloned() else {
            return Ok(Expr::Truthy(spec));
        };
        self.bump();
        let raw = match self.bump() {
            Some(Token::Word(w) | Token::Quoted(w) | Token::Name(w)) => w,
            _ => return Err(self.error(format!("missing value after '{name}'"))),
        };
        let value = self.operand(spec, op, raw)?;
        Ok(Expr::Compare {
            field: spec,
            op,
            value,
        })
    }

    fn operand(
        &self,
        spec: &FieldSpec,
        op: CompareOp,
        raw: String,
    ) -> Result<Operand, FilterError> {
        match spec.value_type {
            ValueType::Integer | ValueType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Operand::Number)
                .map_err(|_| self.error(format!("'{}' needs a number, got '{raw}'", spec.name))),
            ValueType::Bool => {
                if op.is_ordering() {
                    return Err(self.error(format!("'{}' cannot be ordered", spec.name)));
                }
                parse_bool_literal(&raw)
                    .map(Operand::Bool)
                    .ok_or_else(|| self.error(format!("'{}' needs true or false", spec.name)))
            }
            ValueType::Text | ValueType::List | ValueType::DateTime => Ok(Operand::Text(raw)),
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Preset(Preset),
    Expr(Expr),
}

/// A filter ready to test records.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    source: String,
    predicate: Predicate,
}

impl CompiledFilter {
    pub fn matches(&self, record: &Record) -> bool {
        match &self.predicate {
            Predicate::Preset(preset) => preset.matches(record),
            Predicate::Expr(expr) => expr.eval(record),
        }
    }

    /// The query this filter was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn preset(&self) -> Option<&Preset> {
        match &self.predicate {
            Predicate::Preset(preset) => Some(preset),
            Predicate::Expr(_) => None,
        }
    }
}

/// Compiles queries, resolving saved filter names first.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    saved: Vec<FilterValue>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saved(saved: impl IntoIterator<Item = FilterValue>) -> Self {
        let mut engine = Self::new();
        for value in saved {
            engine.register(value);
        }
        engine
    }

    /// Add or replace a saved filter.
    pub fn register(&mut self, value: FilterValue) {
        match self
            .saved
            .iter_mut()
            .find(|v| v.name.eq_ignore_ascii_case(&value.name))
        {
            Some(existing) => *existing = value,
            None => self.saved.push(value),
        }
    }

    pub fn saved(&self) -> &[FilterValue] {
        &self.saved
    }

    pub fn compile(&self, query: &str) -> Result<CompiledFilter, FilterError> {
        let trimmed = query.trim();
        if let Some(value) = self
            .saved
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(trimmed))
        {
            return Self::compile_value(value);
        }
        Self::compile_query(trimmed)
    }

    /// Compile a saved filter according to its kind.
    pub fn compile_value(value: &FilterValue) -> Result<CompiledFilter, FilterError> {
        match value.kind {
            FilterKind::NamedCallable => match Preset::parse(&value.expression)? {
                Some(preset) => Ok(CompiledFilter {
                    source: value.expression.clone(),
                    predicate: Predicate::Preset(preset),
                }),
                None => Err(FilterError::syntax(&value.expression, "not a known preset")),
            },
            FilterKind::StringQuery => Self::compile_query(value.expression.trim()),
        }
    }

    fn compile_query(query: &str) -> Result<CompiledFilter, FilterError> {
        if let Some(preset) = Preset::parse(query)? {
            return Ok(CompiledFilter {
                source: query.to_string(),
                predicate: Predicate::Preset(preset),
            });
        }
        let parser = Parser {
            query,
            tokens: tokenize(query)?,
            pos: 0,
        };
        let expr = parser.parse()?;
        Ok(CompiledFilter {
            source: query.to_string(),
            predicate: Predicate::Expr(expr),
        })
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
