//! A small arithmetic expression interpreter (§6, §9).
//!
//! Formulas are supplied as symbolic assignments, e.g. `X3 = X1*Z2 + X2*Z1`.
//! Rather than embedding a general-purpose expression evaluator (or, worse,
//! relying on host-language `eval`), each right-hand side is parsed once, at
//! load time, into an [`Expr`] tree and interpreted against a binding
//! environment of [`FieldElement`]s and integer literals. The grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := power (('*' | '/') power)*
//! power   := unary ('**' unary)*
//! unary   := '-' unary | atom
//! atom    := NUMBER | IDENT | '(' expr ')'
//! ```
//!
//! `**` binds tighter than unary minus on its left (`-x**2 == -(x**2)`) and is
//! right-associative, matching ordinary mathematical convention.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::field::FieldElement;

/// A parsed arithmetic expression over field-element variables and integer literals.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    Var(String),
    Lit(i64),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
}

/// A single `output := expression` assignment, as used by [`crate::formula::Formula`]
/// and by the `CurveModel`/`CoordinateModel` symbolic templates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assignment {
    pub output: String,
    pub expr: Expr,
}

impl Assignment {
    /// Parses a single `name = expr` or `name := expr` line.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (output, rhs) = split_assignment(line)
            .ok_or_else(|| Error::ExprParse(line.to_string()))?;
        let expr = Expr::parse(rhs)?;
        Ok(Assignment { output: output.trim().to_string(), expr })
    }
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    if let Some(idx) = line.find(":=") {
        return Some((&line[..idx], &line[idx + 2..]));
    }
    // A bare `=` that isn't part of `==`, `<=`, `>=`, `!=`.
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'=' {
            let prev_eq = i > 0 && bytes[i - 1] == b'=';
            let next_eq = i + 1 < bytes.len() && bytes[i + 1] == b'=';
            if !prev_eq && !next_eq {
                return Some((&line[..i], &line[i + 1..]));
            }
        }
    }
    None
}

impl Expr {
    /// Parses a bare expression (no assignment, no leading identifier).
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens: &tokens, pos: 0 };
        let expr = parser.parse_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(Error::ExprParse(input.to_string()));
        }
        Ok(expr)
    }

    /// Evaluates the expression against a binding environment.
    ///
    /// An unbound variable fails with [`Error::UnboundVariable`] rather than
    /// panicking or defaulting to zero — callers (`Point::to_affine`,
    /// `Point::to_model`) are expected to catch this and apply the fallback
    /// rules spec §4.4 describes.
    pub fn eval(&self, env: &BTreeMap<String, FieldElement>) -> Result<FieldElement> {
        match self {
            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnboundVariable(name.clone())),
            Expr::Lit(n) => {
                let modulus = env
                    .values()
                    .find_map(FieldElement::modulus)
                    .ok_or_else(|| Error::UnboundVariable("<modulus>".to_string()))?;
                Ok(FieldElement::from_i64(*n, modulus))
            }
            Expr::Neg(a) => a.eval(env)?.neg(),
            Expr::Add(a, b) => a.eval(env)?.add(&b.eval(env)?),
            Expr::Sub(a, b) => a.eval(env)?.sub(&b.eval(env)?),
            Expr::Mul(a, b) => a.eval(env)?.mul(&b.eval(env)?),
            Expr::Div(a, b) => a.eval(env)?.div(&b.eval(env)?),
            Expr::Pow(a, b) => {
                let exponent = match b.as_ref() {
                    Expr::Lit(n) => *n,
                    Expr::Neg(inner) => match inner.as_ref() {
                        Expr::Lit(n) => -*n,
                        _ => return Err(Error::ExprParse("non-literal exponent".to_string())),
                    },
                    _ => return Err(Error::ExprParse("non-literal exponent".to_string())),
                };
                a.eval(env)?.pow(exponent)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Lit(n) => write!(f, "{n}"),
            Expr::Neg(a) => write!(f, "-({a})"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Pow(a, b) => write!(f, "({a} ** {b})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(i64),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    tokens.push(Token::StarStar);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse()
                    .map_err(|_| Error::ExprParse(input.to_string()))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(Error::ExprParse(input.to_string())),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    let rhs = self.parse_term()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.bump();
                    let rhs = self.parse_term()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_power()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    let rhs = self.parse_power()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.bump();
                    let rhs = self.parse_power()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_unary()?;
        if let Some(Token::StarStar) = self.peek() {
            self.bump();
            // Right-associative.
            let exponent = self.parse_power()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if let Some(Token::Minus) = self.peek() {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.bump().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Lit(n)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::ExprParse("expected `)`".to_string())),
                }
            }
            _ => Err(Error::ExprParse("expected expression".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use std::collections::BTreeMap;

    fn env(p: u64, pairs: &[(&str, i64)]) -> BTreeMap<String, FieldElement> {
        let modulus = BigUint::from(p);
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldElement::from_i64(*v, &modulus)))
            .collect()
    }

    #[test]
    fn parses_and_evaluates_simple_assignment() {
        let a = Assignment::parse("X3 = X1*Z2 + X2*Z1").unwrap();
        assert_eq!(a.output, "X3");
        let e = env(101, &[("X1", 3), ("Z2", 5), ("X2", 7), ("Z1", 2)]);
        let v = a.expr.eval(&e).unwrap();
        assert_eq!(v, FieldElement::from_i64(3 * 5 + 7 * 2, &BigUint::from(101u64)));
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_neg() {
        let e = Expr::parse("-x**2").unwrap();
        let env = env(101, &[("x", 3)]);
        // -(3**2) mod 101 == -9 mod 101 == 92
        assert_eq!(e.eval(&env).unwrap(), FieldElement::from_i64(-9, &BigUint::from(101u64)));
    }

    #[test]
    fn unbound_variable_fails() {
        let e = Expr::parse("x + y").unwrap();
        let env = env(101, &[("x", 1)]);
        assert!(matches!(e.eval(&env), Err(Error::UnboundVariable(_))));
    }

    #[test]
    fn division_and_parens() {
        let e = Expr::parse("(x + y) / 2").unwrap();
        let env = env(101, &[("x", 3), ("y", 7)]);
        assert_eq!(e.eval(&env).unwrap(), FieldElement::from_i64(5, &BigUint::from(101u64)));
    }
}
