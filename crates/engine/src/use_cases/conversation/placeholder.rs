//! `{context.<key>}` substitution and the small integer arithmetic the
//! conversation scripts use in parameters and condition values.

use std::sync::LazyLock;

use atlas_domain::ContextMap;
use regex_lite::{Captures, Regex};

const LEGACY_PREFIX: &str = "context.";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{context\.([A-Za-z0-9_]+)\}").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaceholderError {
    #[error("context key '{0}' not found")]
    UnknownKey(String),
    #[error("value '{0}' is not a valid integer")]
    NotNumeric(String),
    #[error("division by zero in '{0}'")]
    DivisionByZero(String),
    #[error("arithmetic overflow in '{0}'")]
    Overflow(String),
}

/// Resolves a single value. Every `{context.<key>}` must be present; a bare
/// `context.<key>` is looked up as well. Anything else is a literal.
pub fn resolve(value: &str, variables: &ContextMap) -> Result<String, PlaceholderError> {
    if let Some(key) = value.strip_prefix(LEGACY_PREFIX) {
        return variables
            .get(key)
            .cloned()
            .ok_or_else(|| PlaceholderError::UnknownKey(key.to_string()));
    }

    let mut missing = None;
    let replaced = PLACEHOLDER_RE.replace_all(value, |caps: &Captures| {
        let key = &caps[1];
        match variables.get(key) {
            Some(found) => found.clone(),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(key) => Err(PlaceholderError::UnknownKey(key)),
        None => Ok(replaced.into_owned()),
    }
}

/// Display-text substitution: unknown keys are left as written.
pub fn replace_placeholders(text: &str, variables: &ContextMap) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Parses an already-resolved value: a plain integer, `-N`, or `A op B`
/// with a single `+`, `-`, `*` or `/`.
pub fn evaluate_int(value: &str) -> Result<i64, PlaceholderError> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(n);
    }

    if let Some((lhs, op, rhs)) = split_binary(trimmed) {
        let a = parse_operand(lhs, trimmed)?;
        let b = parse_operand(rhs, trimmed)?;
        let overflow = || PlaceholderError::Overflow(trimmed.to_string());
        return match op {
            '+' => a.checked_add(b).ok_or_else(overflow),
            '-' => a.checked_sub(b).ok_or_else(overflow),
            '*' => a.checked_mul(b).ok_or_else(overflow),
            _ if b == 0 => Err(PlaceholderError::DivisionByZero(trimmed.to_string())),
            _ => a.checked_div(b).ok_or_else(overflow),
        };
    }

    // A negated value that is itself negative, e.g. a resolved "-{context.x}".
    if let Some(rest) = trimmed.strip_prefix('-') {
        let n = parse_operand(rest, trimmed)?;
        return n
            .checked_neg()
            .ok_or_else(|| PlaceholderError::Overflow(trimmed.to_string()));
    }

    Err(PlaceholderError::NotNumeric(trimmed.to_string()))
}

/// [`resolve`] followed by [`evaluate_int`].
pub fn resolve_int(value: &str, variables: &ContextMap) -> Result<i64, PlaceholderError> {
    evaluate_int(&resolve(value, variables)?)
}

fn parse_operand(operand: &str, whole: &str) -> Result<i64, PlaceholderError> {
    operand
        .trim()
        .parse::<i64>()
        .map_err(|_| PlaceholderError::NotNumeric(whole.to_string()))
}

/// Finds the operator, skipping a leading sign on the left operand.
fn split_binary(expr: &str) -> Option<(&str, char, &str)> {
    let start = usize::from(expr.starts_with('-'));
    expr.char_indices()
        .skip(start)
        .find(|(i, c)| {
            matches!(c, '+' | '-' | '*' | '/')
                && !expr[..*i].trim().is_empty()
                && !expr[..*i].trim_end().ends_with(['+', '-', '*', '/'])
        })
        .map(|(i, op)| (&expr[..i], op, &expr[i + 1..]))
}
