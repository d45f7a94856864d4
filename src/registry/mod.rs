//! Rule registry interface
//!
//! The registry owns the canonical rule collection. It reports every mutation
//! to its subscribers and accepts create/delete requests asynchronously; a
//! successful request is confirmed by the matching event, not by the return
//! value.

mod file;

pub use file::FileRuleRegistry;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

use crate::rule::{Rule, RuleId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    RuleAdded(Rule),
    RuleRemoved(Rule),
    RuleChanged(Rule),
    /// The backing configuration was re-read; query `rules()` for the new set
    ConfigReloaded,
}

/// Callback invoked on whatever thread performed the mutation
pub type EventHandler = Box<dyn Fn(RegistryEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("rule '{0}' already exists")]
    DuplicateRule(RuleId),

    #[error("rule '{0}' not found")]
    NotFound(RuleId),

    #[error("rule '{0}' cannot be removed")]
    Protected(RuleId),

    #[error("failed to read rules from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write rules to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("registry task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait RuleRegistry: Send + Sync {
    /// Current snapshot, in registry order
    fn rules(&self) -> Vec<Rule>;

    /// Register `handler` for every later event. It runs on the mutating thread.
    fn subscribe(&self, handler: EventHandler) -> SubscriptionId;

    /// Returns false if the subscription was already gone
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Persist a new rule, then emit `RuleAdded`
    async fn add_rule(&self, rule: Rule) -> Result<(), RegistryError>;

    /// Delete a rule, then emit `RuleRemoved`
    async fn remove_rule(&self, id: &RuleId) -> Result<(), RegistryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOp {
    Add,
    Remove,
}

impl fmt::Display for RegistryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryOp::Add => f.write_str("add"),
            RegistryOp::Remove => f.write_str("remove"),
        }
    }
}

/// A failed async registry command, reported back to the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub op: RegistryOp,
    pub rule: RuleId,
    pub message: String,
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to {} rule '{}': {}", self.op, self.rule, self.message)
    }
}
