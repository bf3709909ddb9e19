//! GraphQL operation descriptors.

use serde::{Deserialize, Serialize};

use crate::field::ResponseField;
use crate::variables::Variables;

/// Root record key for query data.
pub const QUERY_ROOT_KEY: &str = "QUERY_ROOT";
/// Root record key for mutation payloads.
pub const MUTATION_ROOT_KEY: &str = "MUTATION_ROOT";
/// Root record key for subscription payloads.
pub const SUBSCRIPTION_ROOT_KEY: &str = "SUBSCRIPTION_ROOT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// The record key the operation's root selections normalize under.
    pub fn root_key(&self) -> &'static str {
        match self {
            OperationKind::Query => QUERY_ROOT_KEY,
            OperationKind::Mutation => MUTATION_ROOT_KEY,
            OperationKind::Subscription => SUBSCRIPTION_ROOT_KEY,
        }
    }
}

/// One executable operation: its document text (forwarded to the server
/// untouched), runtime variables, and the root selection set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub kind: OperationKind,
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub variables: Variables,
    pub selections: Vec<ResponseField>,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        name: impl Into<String>,
        document: impl Into<String>,
        selections: Vec<ResponseField>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            document: document.into(),
            variables: Variables::new(),
            selections,
        }
    }

    pub fn query(
        name: impl Into<String>,
        document: impl Into<String>,
        selections: Vec<ResponseField>,
    ) -> Self {
        Self::new(OperationKind::Query, name, document, selections)
    }

    pub fn mutation(
        name: impl Into<String>,
        document: impl Into<String>,
        selections: Vec<ResponseField>,
    ) -> Self {
        Self::new(OperationKind::Mutation, name, document, selections)
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn root_key(&self) -> &'static str {
        self.kind.root_key()
    }
}
