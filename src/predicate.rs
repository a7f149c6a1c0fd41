//! Guard and test predicate mini-language
//!
//! Guards on transducer rules and `test=` expressions in stylesheet bodies
//! are linear conjunctions/disjunctions of atomic comparisons
//! `EXPR OP LITERAL`. This module parses them into a small AST, gives them
//! a canonical textual form (used for deduplication), and decides whether
//! a predicate implies a schema facet. Input outside the grammar is
//! preserved verbatim as [`Predicate::Opaque`] and contributes no
//! constraint.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==` (also the legacy single `=`)
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison literal: exact number or single-quoted string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Numeric literal, kept exact
    Number(Decimal),
    /// String literal
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// Parsed predicate AST
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Atomic comparison `path OP literal`
    Compare {
        /// Path expression rooted at the matched node
        path: String,
        /// Comparison operator
        op: CompareOp,
        /// Right-hand literal
        literal: Literal,
    },
    /// Conjunction
    And(Vec<Predicate>),
    /// Disjunction
    Or(Vec<Predicate>),
    /// Negation
    Not(Box<Predicate>),
    /// Out-of-grammar input, preserved verbatim
    Opaque(String),
}

impl Predicate {
    /// Parse a predicate. Never fails: out-of-grammar input becomes
    /// [`Predicate::Opaque`] carrying the (entity-unescaped) source text.
    pub fn parse(text: &str) -> Predicate {
        let unescaped = unescape_entities(text);
        let tokens = match lex(&unescaped) {
            Some(tokens) => tokens,
            None => return Predicate::Opaque(unescaped.trim().to_string()),
        };

        let mut parser = Parser { tokens, pos: 0 };
        match parser.parse_or() {
            Some(pred) if parser.at_end() => pred,
            _ => Predicate::Opaque(unescaped.trim().to_string()),
        }
    }

    /// Top-level conjuncts: the members of an `and`, otherwise the
    /// predicate itself. A top-level disjunction stays one unit.
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::And(parts) => parts.iter().collect(),
            other => vec![other],
        }
    }

    /// Whether any information was extracted from the source text
    pub fn is_opaque(&self) -> bool {
        matches!(self, Predicate::Opaque(_))
    }

    /// Whether this predicate guarantees the bound facet `key = value` on
    /// `field`. Supported keys: minInclusive, maxInclusive, minExclusive,
    /// maxExclusive.
    pub fn implies_bound(&self, field: &str, key: &str, value: &str) -> bool {
        let Ok(bound) = Decimal::from_str(value) else {
            return false;
        };

        self.conjuncts().iter().any(|conjunct| {
            let Predicate::Compare {
                path,
                op,
                literal: Literal::Number(w),
            } = conjunct
            else {
                return false;
            };
            if !path_refers_to(path, field) {
                return false;
            }
            let w = *w;
            let integral = w.fract().is_zero() && bound.fract().is_zero();
            match key {
                // f >= w with w >= v; f > w implies f >= w so the same
                // bound works, and for integral fields f > w means
                // f >= w + 1.
                "minInclusive" => match op {
                    CompareOp::Ge => w >= bound,
                    CompareOp::Gt => w >= bound || (integral && w >= bound - Decimal::ONE),
                    CompareOp::Eq => w >= bound,
                    _ => false,
                },
                "maxInclusive" => match op {
                    CompareOp::Le => w <= bound,
                    CompareOp::Lt => w <= bound || (integral && w <= bound + Decimal::ONE),
                    CompareOp::Eq => w <= bound,
                    _ => false,
                },
                "minExclusive" => match op {
                    CompareOp::Gt => w >= bound,
                    CompareOp::Ge => w > bound,
                    CompareOp::Eq => w > bound,
                    _ => false,
                },
                "maxExclusive" => match op {
                    CompareOp::Lt => w <= bound,
                    CompareOp::Le => w < bound,
                    CompareOp::Eq => w < bound,
                    _ => false,
                },
                _ => false,
            }
        })
    }

    /// Whether this predicate guarantees membership of `field` in the
    /// enumeration: some conjunct is a disjunction of equalities on
    /// `field` whose values all lie in `allowed`.
    pub fn implies_enumeration(&self, field: &str, allowed: &[&str]) -> bool {
        self.conjuncts()
            .iter()
            .any(|conjunct| enum_disjunction_covered(conjunct, field, allowed))
    }
}

fn enum_disjunction_covered(pred: &Predicate, field: &str, allowed: &[&str]) -> bool {
    let arms: Vec<&Predicate> = match pred {
        Predicate::Or(parts) => parts.iter().collect(),
        single @ Predicate::Compare { .. } => vec![single],
        _ => return false,
    };

    !arms.is_empty()
        && arms.iter().all(|arm| {
            matches!(
                arm,
                Predicate::Compare {
                    path,
                    op: CompareOp::Eq,
                    literal: Literal::Str(value),
                } if path_refers_to(path, field) && allowed.contains(&value.as_str())
            )
        })
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { path, op, literal } => {
                write!(f, "{} {} {}", path, op, literal)
            }
            Predicate::And(parts) => {
                let joined: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", joined.join(" and "))
            }
            Predicate::Or(parts) => {
                let joined: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", joined.join(" or "))
            }
            Predicate::Not(inner) => write!(f, "not({})", inner),
            Predicate::Opaque(text) => write!(f, "{}", text),
        }
    }
}

/// Whether a path expression refers to the given field: exact match, or
/// the final `/`- or `.`-separated segment equals it (ignoring a leading
/// `@`).
pub fn path_refers_to(expr: &str, field: &str) -> bool {
    if expr == field {
        return true;
    }
    let tail = expr
        .rsplit(['/', '.'])
        .next()
        .unwrap_or(expr)
        .trim_start_matches('@');
    tail == field
}

/// Resolve the XML entity escape forms predicates must tolerate
fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Op(CompareOp),
    Number(Decimal),
    Str(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn lex(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return None; // unterminated string
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                } else {
                    return None;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Le));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    i += 1;
                }
            }
            '=' => {
                // Legacy single = means equality
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                } else {
                    i += 1;
                }
                tokens.push(Token::Op(CompareOp::Eq));
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(Decimal::from_str(&text).ok()?));
            }
            c if c.is_alphabetic() || c == '_' || c == '@' || c == '.' || c == '/' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_alphanumeric()
                        || matches!(chars[i], '_' | '@' | '.' | '/' | '-' | ':'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "not" => tokens.push(Token::Not),
                    _ => tokens.push(Token::Path(word)),
                }
            }
            _ => return None,
        }
    }

    Some(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token) -> Option<()> {
        if self.peek() == Some(token) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn parse_or(&mut self) -> Option<Predicate> {
        let mut parts = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            parts.push(self.parse_and()?);
        }
        Some(if parts.len() == 1 {
            parts.pop().unwrap()
        } else {
            Predicate::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Option<Predicate> {
        let mut parts = vec![self.parse_atom()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            parts.push(self.parse_atom()?);
        }
        Some(if parts.len() == 1 {
            parts.pop().unwrap()
        } else {
            Predicate::And(parts)
        })
    }

    fn parse_atom(&mut self) -> Option<Predicate> {
        match self.bump()? {
            Token::Not => {
                self.expect(&Token::LParen)?;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Some(Predicate::Not(Box::new(inner)))
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Some(inner)
            }
            Token::Path(path) => {
                let Some(Token::Op(op)) = self.bump() else {
                    return None;
                };
                let literal = match self.bump()? {
                    Token::Number(n) => Literal::Number(n),
                    Token::Str(s) => Literal::Str(s),
                    _ => return None,
                };
                Some(Predicate::Compare { path, op, literal })
            }
            _ => None,
        }
    }
}
