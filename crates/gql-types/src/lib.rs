//! Shared types for the gql-runtime workspace.
//!
//! This crate holds the descriptors every other crate agrees on, so the
//! transport, cache, and fetch layers never depend on each other just to
//! name an operation:
//!
//! - [`Operation`] / [`OperationKind`] - one GraphQL operation and its root selections
//! - [`ResponseField`] / [`FieldType`] - the field-by-field contract a generated
//!   mapper would otherwise provide
//! - [`ArgumentValue`] / [`Condition`] - field arguments and `@skip`/`@include`/type conditions
//! - [`Variables`] - runtime operation variables
//! - [`env_utils`] - environment variable parsing for configuration

pub mod env_utils;
pub mod field;
pub mod operation;
pub mod variables;

pub use env_utils::{env_string_or, env_var, env_var_or};
pub use field::{ArgumentValue, Condition, FieldType, ResponseField};
pub use operation::{
    Operation, OperationKind, MUTATION_ROOT_KEY, QUERY_ROOT_KEY, SUBSCRIPTION_ROOT_KEY,
};
pub use variables::{VariableError, Variables};

use std::time::Duration;

/// Configuration for retry behavior on network operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Number of retry attempts after the first failure.
    pub retries: usize,
    /// Initial backoff duration between retries.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Create a new RetryConfig with the specified parameters.
    pub fn new(retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// A config that never retries.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Backoff to wait before retry number `attempt` (1-based), doubling up to `max_backoff`.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(5000),
        }
    }
}
