//! Unit string parser.
//!
//! Scenario files spell the same unit in many ways. All of these parse to
//! `{W: 1, m: -2}`: `W/m^2`, `W / m ^ 2`, `W m^-2`, `W per m^2`, `W/m**2`,
//! `W/m2`.
//!
//! Parsing happens in two passes. The input is split into [`Token`]s, then
//! folded into a [`ParsedUnit`]. Within one parenthesised group every factor
//! after the first `/` (or `per`) is in the denominator, so
//! `W/m^2 delta_degC` reads as `W / (m^2 delta_degC)`.

use super::dimension::Dimension;
use super::registry::UnitRegistry;
use super::UnitError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// A unit expression as a product of symbols raised to integer powers.
///
/// `W/m^2` is stored as `{W: 1, m: -2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUnit {
    components: BTreeMap<String, i32>,
}

impl ParsedUnit {
    #[must_use]
    pub fn dimensionless() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    fn from_components(components: BTreeMap<String, i32>) -> Self {
        Self {
            components: components
                .into_iter()
                .filter(|(_, exp)| *exp != 0)
                .collect(),
        }
    }

    /// Parses a unit string.
    ///
    /// The registry is consulted to tell a symbol with trailing digits
    /// (`CO2`) apart from an implicit exponent (`m2`).
    pub fn parse(input: &str, registry: &UnitRegistry) -> Result<Self, UnitError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(UnitError::EmptyUnit);
        }
        if input == "1" || input.eq_ignore_ascii_case("dimensionless") {
            return Ok(Self::dimensionless());
        }

        let tokens = tokenize(input, registry)?;
        fold(input, &tokens)
    }

    pub fn components(&self) -> &BTreeMap<String, i32> {
        &self.components
    }

    /// Resolves the overall dimension and SI factor of the expression.
    pub fn resolve(&self, registry: &UnitRegistry) -> Result<(Dimension, f64), UnitError> {
        let mut dimension = Dimension::dimensionless();
        let mut factor = 1.0;

        for (symbol, &exp) in &self.components {
            let info = registry
                .lookup(symbol)
                .ok_or_else(|| UnitError::UnknownUnit(symbol.clone()))?;
            let overflow = || UnitError::InvalidExponent(format!("{symbol}^{exp}"));
            let exp_i8 = i8::try_from(exp).map_err(|_| overflow())?;
            dimension = info
                .dimension
                .checked_pow(exp_i8)
                .and_then(|d| dimension.checked_mul(&d))
                .ok_or_else(overflow)?;
            factor *= info.to_si_factor.powi(exp);
            if !factor.is_finite() || factor == 0.0 {
                return Err(overflow());
            }
        }

        Ok((dimension, factor))
    }

    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let mut components = self.components.clone();
        for (symbol, exp) in &other.components {
            let total = components.entry(symbol.clone()).or_insert(0);
            *total = total.saturating_add(*exp);
        }
        Self::from_components(components)
    }

    #[must_use]
    pub fn divide(&self, other: &Self) -> Self {
        self.multiply(&other.pow(-1))
    }

    #[must_use]
    pub fn pow(&self, exp: i32) -> Self {
        Self::from_components(
            self.components
                .iter()
                .map(|(k, v)| (k.clone(), v.saturating_mul(exp)))
                .collect(),
        )
    }

    /// Canonical representation: positive exponents, then `/`, then
    /// negative exponents, each group in alphabetical order.
    #[must_use]
    pub fn normalized(&self) -> String {
        let format_part = |positive: bool| -> String {
            self.components
                .iter()
                .filter(|(_, &e)| (e > 0) == positive)
                .map(|(s, &e)| match e.abs() {
                    1 => s.clone(),
                    n => format!("{s}^{n}"),
                })
                .collect::<Vec<_>>()
                .join(" ")
        };

        let num = format_part(true);
        let den = format_part(false);

        match (num.is_empty(), den.is_empty()) {
            (true, true) => "1".to_string(),
            (false, true) => num,
            (true, false) => format!("1 / {den}"),
            (false, false) => format!("{num} / {den}"),
        }
    }
}

impl fmt::Display for ParsedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Symbol(String),
    /// A literal `1`, as in `1/yr`.
    One,
    Exponent(i32),
    Times,
    Divide,
    Open,
    Close,
}

fn parse_error(input: &str, reason: impl Into<String>) -> UnitError {
    UnitError::Parse {
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn tokenize(input: &str, registry: &UnitRegistry) -> Result<Vec<Token>, UnitError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '*' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '*').is_some() {
                    tokens.push(Token::Exponent(read_exponent(input, &mut chars)?));
                } else {
                    tokens.push(Token::Times);
                }
            }
            '^' => {
                chars.next();
                tokens.push(Token::Exponent(read_exponent(input, &mut chars)?));
            }
            '\u{00B7}' => {
                chars.next();
                tokens.push(Token::Times);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Divide);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
                // `(m s)2`
                if chars.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                    tokens.push(Token::Exponent(read_exponent(input, &mut chars)?));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some((i, c)) = chars.next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_') {
                    end = i + c.len_utf8();
                }
                push_word(&input[start..end], registry, &mut tokens)?;
            }
            '1' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                    return Err(parse_error(input, "numeric factors are not supported"));
                }
                tokens.push(Token::One);
            }
            c => return Err(parse_error(input, format!("unexpected character '{c}'"))),
        }
    }

    Ok(tokens)
}

/// Splits a word into a symbol and an implicit exponent (`m2`) unless the
/// whole word is a registered unit (`CO2`).
fn push_word(word: &str, registry: &UnitRegistry, tokens: &mut Vec<Token>) -> Result<(), UnitError> {
    if word == "per" {
        tokens.push(Token::Divide);
        return Ok(());
    }

    let digits_from = word.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits_from == word.len() || registry.contains(word) {
        tokens.push(Token::Symbol(word.to_string()));
    } else {
        let (symbol, digits) = word.split_at(digits_from);
        let exponent = digits
            .parse()
            .map_err(|_| UnitError::InvalidExponent(digits.to_string()))?;
        tokens.push(Token::Symbol(symbol.to_string()));
        tokens.push(Token::Exponent(exponent));
    }
    Ok(())
}

fn read_exponent(input: &str, chars: &mut Peekable<CharIndices>) -> Result<i32, UnitError> {
    while chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}

    let start = chars.peek().map_or(input.len(), |&(i, _)| i);
    let mut end = start;
    if let Some((i, c)) = chars.next_if(|&(_, c)| c == '-') {
        end = i + c.len_utf8();
    }
    while let Some((i, c)) = chars.next_if(|&(_, c)| c.is_ascii_digit()) {
        end = i + c.len_utf8();
    }

    let text = &input[start..end];
    text.parse()
        .map_err(|_| UnitError::InvalidExponent(text.to_string()))
}

/// One parenthesised group while folding.
struct Group {
    product: ParsedUnit,
    /// The latest factor, kept apart until its exponent is known.
    pending: Option<ParsedUnit>,
    has_exponent: bool,
    in_denominator: bool,
    expects_factor: bool,
}

impl Group {
    fn new() -> Self {
        Self {
            product: ParsedUnit::dimensionless(),
            pending: None,
            has_exponent: false,
            in_denominator: false,
            expects_factor: true,
        }
    }

    fn commit(&mut self) {
        if let Some(factor) = self.pending.take() {
            let factor = if self.in_denominator {
                factor.pow(-1)
            } else {
                factor
            };
            self.product = self.product.multiply(&factor);
        }
        self.has_exponent = false;
    }

    fn push_factor(&mut self, factor: ParsedUnit) {
        self.commit();
        self.pending = Some(factor);
        self.expects_factor = false;
    }

    fn finish(mut self, input: &str) -> Result<ParsedUnit, UnitError> {
        if self.expects_factor {
            return Err(parse_error(input, "expected unit symbol"));
        }
        self.commit();
        Ok(self.product)
    }
}

fn fold(input: &str, tokens: &[Token]) -> Result<ParsedUnit, UnitError> {
    let mut stack = vec![Group::new()];

    for token in tokens {
        let Some(group) = stack.last_mut() else {
            return Err(parse_error(input, "unbalanced parentheses"));
        };
        match token {
            Token::Symbol(symbol) => {
                group.push_factor(ParsedUnit::from_components(BTreeMap::from([(
                    symbol.clone(),
                    1,
                )])))
            }
            Token::One => group.push_factor(ParsedUnit::dimensionless()),
            Token::Exponent(exp) => match group.pending.as_mut() {
                Some(factor) if !group.has_exponent => {
                    *factor = factor.pow(*exp);
                    group.has_exponent = true;
                }
                _ => return Err(parse_error(input, "exponent without a unit")),
            },
            Token::Times | Token::Divide if group.expects_factor => {
                return Err(parse_error(input, "expected unit symbol"));
            }
            Token::Times => group.expects_factor = true,
            Token::Divide => {
                group.commit();
                group.in_denominator = true;
                group.expects_factor = true;
            }
            Token::Open => stack.push(Group::new()),
            Token::Close => {
                let inner = match stack.pop() {
                    Some(inner) if !stack.is_empty() => inner.finish(input)?,
                    _ => return Err(parse_error(input, "unbalanced parentheses")),
                };
                if let Some(outer) = stack.last_mut() {
                    outer.push_factor(inner);
                }
            }
        }
    }

    match stack.pop() {
        Some(group) if stack.is_empty() => group.finish(input),
        _ => Err(parse_error(input, "missing closing parenthesis")),
    }
}
