//! A lightweight field-validation trait for types that don't need a full
//! third-party schema library. Bridged into the [`crate::schema::Schema`]
//! seam by [`crate::schema::ValidateAdapter`].
//!
//! ```rust,ignore
//! impl Validate for CreateUserInput {
//!     fn validate(&self) -> Result<(), Vec<Issue>> {
//!         let mut issues = ValidationRules::new()
//!             .required("name", !self.name.is_empty())
//!             .min_length("name", &self.name, 2)
//!             .range("age", self.age, 0, 150)
//!             .build();
//!         if issues.is_empty() { Ok(()) } else { Err(issues) }
//!     }
//! }
//! ```

use crate::schema::Issue;

/// Implemented by input/output types that can check their own field-level
/// invariants without a schema object.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<Issue>>;
}

/// Blanket impl: a type with no invariants always validates.
impl Validate for () {
    fn validate(&self) -> Result<(), Vec<Issue>> {
        Ok(())
    }
}

/// A small accumulator for building up field issues, mirroring the rule
/// chain style of dedicated validator crates without depending on one.
#[derive(Default)]
pub struct ValidationRules {
    issues: Vec<Issue>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, field: &str, present: bool) -> Self {
        if !present {
            self.issues
                .push(Issue::new(format!("{field} is required")).at(field));
        }
        self
    }

    pub fn min_length(mut self, field: &str, value: &str, min: usize) -> Self {
        if value.len() < min {
            self.issues
                .push(Issue::new(format!("{field} must be at least {min} characters")).at(field));
        }
        self
    }

    pub fn max_length(mut self, field: &str, value: &str, max: usize) -> Self {
        if value.len() > max {
            self.issues
                .push(Issue::new(format!("{field} must be at most {max} characters")).at(field));
        }
        self
    }

    pub fn range<T: PartialOrd + std::fmt::Display + Copy>(
        mut self,
        field: &str,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        if value < min || value > max {
            self.issues
                .push(Issue::new(format!("{field} must be between {min} and {max}")).at(field));
        }
        self
    }

    pub fn matches(mut self, field: &str, value: &str, pattern: &regex::Regex) -> Self {
        if !pattern.is_match(value) {
            self.issues
                .push(Issue::new(format!("{field} has an invalid format")).at(field));
        }
        self
    }

    pub fn custom(mut self, field: &str, ok: bool, message: impl Into<String>) -> Self {
        if !ok {
            self.issues.push(Issue::new(message).at(field));
        }
        self
    }

    pub fn build(self) -> Vec<Issue> {
        self.issues
    }
}
