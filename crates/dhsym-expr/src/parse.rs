//! Recursive-descent parser for the infix wire syntax.
//!
//! Grammar (no division; exponents are integers):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary ('*' unary)*
//! unary   := '-' unary | power
//! power   := primary ('^' integer)?
//! primary := number | symbol | ("sin" | "cos") '(' expr ')' | '(' expr ')'
//! symbol  := ("t" | "td" | "d" | "dd") digits
//! ```

use crate::error::ParseError;
use crate::expr::{Expr, Trig, Var};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let at = i;
        match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'+' => {
                tokens.push((at, Token::Plus));
                i += 1;
            }
            b'-' => {
                tokens.push((at, Token::Minus));
                i += 1;
            }
            b'*' => {
                tokens.push((at, Token::Star));
                i += 1;
            }
            b'^' => {
                tokens.push((at, Token::Caret));
                i += 1;
            }
            b'(' => {
                tokens.push((at, Token::LParen));
                i += 1;
            }
            b')' => {
                tokens.push((at, Token::RParen));
                i += 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // Scientific notation tail: 1.5e-3
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &input[start..i];
                let value: f64 = text
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(text.to_string()))?;
                tokens.push((start, Token::Num(value)));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                tokens.push((start, Token::Ident(input[start..i].to_string())));
            }
            other => {
                return Err(ParseError::UnexpectedChar {
                    ch: other as char,
                    at,
                });
            }
        }
    }
    Ok(tokens)
}

/// Parse an identifier token into a typed symbol.
fn parse_symbol(text: &str) -> Option<Var> {
    let (prefix, digits) = text.split_at(text.len() - text.chars().rev().take_while(|c| c.is_ascii_digit()).count());
    let index: u32 = digits.parse().ok()?;
    match prefix {
        "t" => Some(Var::Theta(index)),
        "td" => Some(Var::ThetaDot(index)),
        "d" => Some(Var::D(index)),
        "dd" => Some(Var::DDot(index)),
        _ => None,
    }
}

/// Negate a parsed sub-expression, folding constants so `(-3)` parses to
/// `Const(-3.0)` rather than `(-1)*3`.
fn negate(e: Expr) -> Expr {
    match e {
        Expr::Const(c) => Expr::num(-c),
        other => -other,
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn at(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(usize::MAX, |(at, _)| *at)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ParseError> {
        match self.advance() {
            Some(t) if t == *token => Ok(()),
            Some(_) => Err(ParseError::UnexpectedToken {
                at: self.tokens[self.pos - 1].0,
                expected,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.term()?];
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    terms.push(self.term()?);
                }
                Some(Token::Minus) => {
                    self.advance();
                    terms.push(negate(self.term()?));
                }
                _ => break,
            }
        }
        Ok(Expr::sum(terms))
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut factors = vec![self.unary()?];
        while matches!(self.peek(), Some(Token::Star)) {
            self.advance();
            factors.push(self.unary()?);
        }
        Ok(Expr::product(factors))
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(negate(self.unary()?));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.primary()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let negative = if matches!(self.peek(), Some(Token::Minus)) {
                self.advance();
                true
            } else {
                false
            };
            // Allow a parenthesized exponent, as printed for negatives.
            let parenthesized = if matches!(self.peek(), Some(Token::LParen)) {
                self.advance();
                true
            } else {
                false
            };
            let inner_negative = if parenthesized && matches!(self.peek(), Some(Token::Minus)) {
                self.advance();
                true
            } else {
                false
            };
            let at = self.at();
            let Some(Token::Num(value)) = self.advance() else {
                return Err(ParseError::UnexpectedToken {
                    at,
                    expected: "integer exponent",
                });
            };
            if parenthesized {
                self.expect(&Token::RParen, "')'")?;
            }
            if value.fract() != 0.0 {
                return Err(ParseError::UnexpectedToken {
                    at,
                    expected: "integer exponent",
                });
            }
            let mut exponent = value as i32;
            if negative ^ inner_negative {
                exponent = -exponent;
            }
            return Ok(base.powi(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let at = self.at();
        match self.advance() {
            Some(Token::Num(value)) => Ok(Expr::num(value)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "sin" | "cos" => {
                    let func = if name == "sin" { Trig::Sin } else { Trig::Cos };
                    self.expect(&Token::LParen, "'('")?;
                    let angle = self.expr()?;
                    self.expect(&Token::RParen, "')'")?;
                    Ok(Expr::Call(func, Box::new(angle)))
                }
                _ => parse_symbol(&name)
                    .map(Expr::Sym)
                    .ok_or(ParseError::UnknownIdent(name)),
            },
            Some(_) => Err(ParseError::UnexpectedToken {
                at,
                expected: "number, symbol, function, or '('",
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

impl Expr {
    /// Parse an expression from the infix wire syntax.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = Parser {
            tokens: tokenize(input)?,
            pos: 0,
        };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(ParseError::UnexpectedToken {
                at: parser.at(),
                expected: "end of input",
            });
        }
        Ok(expr)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
