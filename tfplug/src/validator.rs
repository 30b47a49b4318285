//! Built-in attribute validators

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};

/// Accepts only strings from a fixed set
pub struct StringOneOf {
    allowed: Vec<String>,
}

impl StringOneOf {
    pub fn create(allowed: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();

        if let Dynamic::String(s) = &request.config_value.value {
            if !self.allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("Expected one of [{}], got \"{}\"", self.allowed.join(", "), s),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

/// Bounds a number, inclusive on both ends
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRange {
    pub fn create(min: Option<f64>, max: Option<f64>) -> Box<dyn Validator> {
        Box::new(Self { min, max })
    }
}

impl Validator for NumberRange {
    fn description(&self) -> String {
        format!("value must be within {:?}..={:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();

        if let Dynamic::Number(n) = request.config_value.value {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at least {}", request.path, min),
                            format!("Got {}", n),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at most {}", request.path, max),
                            format!("Got {}", n),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
        }

        ValidatorResponse { diagnostics }
    }
}

/// Rejects empty strings
pub struct StringNotEmpty;

impl StringNotEmpty {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for StringNotEmpty {
    fn description(&self) -> String {
        "value must not be empty".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();

        if request.config_value.value.as_str() == Some("") {
            diagnostics.push(
                Diagnostic::error(
                    format!("{} must not be empty", request.path),
                    "An empty string is not a valid value for this attribute",
                )
                .with_attribute(request.path),
            );
        }

        ValidatorResponse { diagnostics }
    }
}
