//! Unit expression parsing - "0.3048 meter", "kg*m/s^2", "meter ** (1/2)"
//!
//! Supported forms:
//! - Leading magnitude: "9.81 m/s^2", "-3 kg", "1.5e3 gram"
//! - Products: "kg*m", "kg m", "kg·m"
//! - Quotients: "m/s" (binds to the next factor only, left to right)
//! - Powers: "m^2", "s**-1", "m ** 0.5", "meter ** (1/2)"
//! - Grouping: "J/(kg*K)"
//! - Origin offsets, in unit definitions only: "kelvin + 273.15"
//!
//! Unit names are resolved through a caller-supplied function so the parser
//! stays independent of any particular registry.

use mensura_core::{Exponent, Number, Result, UnitError, UnitsContainer};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Name(String),
    Star,
    Slash,
    Power,
    Minus,
    Plus,
    LParen,
    RParen,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '°' || c == '%'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '°'
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = s.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Power);
                i += 2;
            }
            '*' | '·' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Power);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
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
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Scientific suffix only when digits follow: "1e3", "2.5E-4"
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '-' || chars[j] == '+') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if is_name_start(c) => {
                let start = i;
                i += 1;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => {
                return Err(UnitError::Parse(format!("unexpected character '{}' in '{}'", other, s)));
            }
        }
    }

    Ok(tokens)
}

/// Exact rational from a decimal literal: "0.5" -> 1/2, "3" -> 3
fn parse_exponent_literal(s: &str) -> Result<Exponent> {
    let invalid = || UnitError::Parse(format!("invalid exponent: {}", s));
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    let digits = format!("{}{}", int_part, frac_part);
    let numer: i64 = digits.parse().map_err(|_| invalid())?;
    let denom = u32::try_from(frac_part.len())
        .ok()
        .and_then(|places| 10_i64.checked_pow(places))
        .ok_or_else(invalid)?;
    Ok(Exponent::new(numer, denom))
}

type Term = (Number, UnitsContainer);

struct Parser<'a, F> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
    resolve: &'a F,
    precision: usize,
}

impl<'a, F> Parser<'a, F>
where
    F: Fn(&str) -> Result<UnitsContainer>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: &str) -> UnitError {
        UnitError::Parse(format!("{} in '{}'", message, self.source))
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(ref token) if *token == expected => Ok(()),
            _ => Err(self.error(&format!("expected {:?}", expected))),
        }
    }

    fn expression(&mut self) -> Result<Term> {
        let mut acc = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    acc = (acc.0.mul(&rhs.0), acc.1.multiply(&rhs.1));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    acc = (acc.0.checked_div(&rhs.0)?, acc.1.divide(&rhs.1));
                }
                // Juxtaposition multiplies: "0.3048 meter", "kg m"
                Some(Token::Number(_)) | Some(Token::Name(_)) | Some(Token::LParen) => {
                    let rhs = self.factor()?;
                    acc = (acc.0.mul(&rhs.0), acc.1.multiply(&rhs.1));
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<Term> {
        let (value, units) = self.primary()?;
        if self.peek() != Some(&Token::Power) {
            return Ok((value, units));
        }
        self.pos += 1;
        let exp = self.exponent()?;
        Ok((value.powr(exp, self.precision)?, units.power(exp)))
    }

    fn primary(&mut self) -> Result<Term> {
        match self.next() {
            Some(Token::Number(text)) => Ok((Number::from_str(&text)?, UnitsContainer::new())),
            Some(Token::Name(name)) => Ok((Number::one(), (self.resolve)(&name)?)),
            Some(Token::Minus) => {
                let (value, units) = self.primary()?;
                Ok((value.neg(), units))
            }
            Some(Token::Plus) => self.primary(),
            Some(Token::LParen) => {
                let term = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(term)
            }
            _ => Err(self.error("expected a number or unit name")),
        }
    }

    fn signed_literal(&mut self) -> Result<Exponent> {
        let negative = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                true
            }
            Some(Token::Plus) => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        let value = match self.next() {
            Some(Token::Number(text)) => parse_exponent_literal(&text)?,
            _ => return Err(self.error("expected an exponent")),
        };
        Ok(if negative { -value } else { value })
    }

    fn exponent(&mut self) -> Result<Exponent> {
        if self.peek() != Some(&Token::LParen) {
            return self.signed_literal();
        }
        self.pos += 1;
        let mut exp = self.signed_literal()?;
        if self.peek() == Some(&Token::Slash) {
            self.pos += 1;
            let denom = self.signed_literal()?;
            if denom == Exponent::from_integer(0) {
                return Err(self.error("zero exponent denominator"));
            }
            exp /= denom;
        }
        self.expect(Token::RParen)?;
        Ok(exp)
    }
}

/// Parse `text` into a leading factor and a container of resolved unit names.
///
/// An empty expression is the dimensionless value 1.
pub fn parse_expression<F>(text: &str, resolve: &F, precision: usize) -> Result<(Number, UnitsContainer)>
where
    F: Fn(&str) -> Result<UnitsContainer>,
{
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Ok((Number::one(), UnitsContainer::new()));
    }

    let mut parser = Parser { tokens, pos: 0, source: text, resolve, precision };
    let term = parser.expression()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(term)
}

/// Parse a unit definition: an expression optionally followed by an origin
/// offset in the same units, as in "kelvin + 273.15" or "5/9 kelvin + 459.67 * 5/9".
pub fn parse_definition<F>(text: &str, resolve: &F, precision: usize) -> Result<(Number, UnitsContainer, Option<Number>)>
where
    F: Fn(&str) -> Result<UnitsContainer>,
{
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Ok((Number::one(), UnitsContainer::new(), None));
    }

    let mut parser = Parser { tokens, pos: 0, source: text, resolve, precision };
    let (value, units) = parser.expression()?;
    let negative = match parser.peek() {
        Some(Token::Plus) => false,
        Some(Token::Minus) => true,
        _ if parser.pos < parser.tokens.len() => return Err(parser.error("unexpected trailing input")),
        _ => return Ok((value, units, None)),
    };
    parser.pos += 1;
    let (offset, offset_units) = parser.expression()?;
    if !offset_units.is_empty() {
        return Err(parser.error("offset must be a plain number"));
    }
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok((value, units, Some(if negative { offset.neg() } else { offset })))
}
