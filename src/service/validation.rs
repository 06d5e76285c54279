//! Request body validation from static per-field rules.

use crate::error::AppError;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
}

/// Constraints for one body field.
#[derive(Clone, Copy, Debug)]
pub struct FieldRule {
    pub kind: FieldKind,
    pub required: bool,
    /// Nulls are rejected unless set.
    pub nullable: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub format: Option<Format>,
}

impl FieldRule {
    pub const fn text() -> Self {
        FieldRule {
            kind: FieldKind::Text,
            required: false,
            nullable: false,
            min_length: None,
            max_length: None,
            format: None,
        }
    }

    pub const fn boolean() -> Self {
        FieldRule {
            kind: FieldKind::Bool,
            ..Self::text()
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub const fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub const fn email(mut self) -> Self {
        self.format = Some(Format::Email);
        self
    }
}

pub type Rules = &'static [(&'static str, FieldRule)];

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body: required fields present, every field known.
    pub fn validate(body: &Map<String, Value>, rules: Rules) -> Result<(), AppError> {
        for (col, rule) in rules {
            if rule.required && body.get(*col).map_or(true, Value::is_null) {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
        }
        Self::validate_partial(body, rules)
    }

    /// Validate only the fields present (PATCH). Unknown fields are rejected.
    pub fn validate_partial(body: &Map<String, Value>, rules: Rules) -> Result<(), AppError> {
        for (col, v) in body {
            if is_ignored(col) {
                continue;
            }
            match rules.iter().find(|(name, _)| name == col) {
                Some((_, rule)) => validate_field(col, v, rule)?,
                None => return Err(AppError::Validation(format!("unknown field {}", col))),
            }
        }
        Ok(())
    }
}

/// Keys the store sets itself; accepted in bodies and dropped.
fn is_ignored(col: &str) -> bool {
    matches!(col, "id" | "tenant_id" | "created_at" | "updated_at")
}

fn validate_field(col: &str, v: &Value, rule: &FieldRule) -> Result<(), AppError> {
    if v.is_null() {
        if rule.nullable {
            return Ok(());
        }
        return Err(AppError::Validation(format!("{} must not be null", col)));
    }
    match rule.kind {
        FieldKind::Bool => {
            if !v.is_boolean() {
                return Err(AppError::Validation(format!("{} must be a boolean", col)));
            }
        }
        FieldKind::Text => {
            let s = v
                .as_str()
                .ok_or_else(|| AppError::Validation(format!("{} must be a string", col)))?;
            let len = s.chars().count();
            if let Some(max) = rule.max_length {
                if len > max {
                    return Err(AppError::Validation(format!(
                        "{} must be at most {} characters",
                        col, max
                    )));
                }
            }
            if let Some(min) = rule.min_length {
                if len < min {
                    return Err(AppError::Validation(format!(
                        "{} must be at least {} characters",
                        col, min
                    )));
                }
            }
            if let Some(Format::Email) = rule.format {
                validate_email(col, s)?;
            }
        }
    }
    Ok(())
}

fn validate_email(col: &str, s: &str) -> Result<(), AppError> {
    let valid = match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(AppError::Validation(format!("{} must be a valid email", col)));
    }
    Ok(())
}
