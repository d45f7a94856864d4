//! JSON-file backed rule registry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::{EventHandler, RegistryError, RegistryEvent, RuleRegistry, SubscriptionId};
use crate::constants::config::{APP_DIR, RULES_FILENAME};
use crate::rule::{Rule, RuleId};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<Rule>,
}

type SharedHandler = Arc<dyn Fn(RegistryEvent) + Send + Sync>;

/// Rule registry persisted as `rules.json`.
///
/// Every mutation is written to disk before its event fires, so a subscriber
/// that re-reads the file after an event sees the change. Mutations are
/// serialized; reads (`rules()`) never wait on disk I/O.
pub struct FileRuleRegistry {
    path: Option<PathBuf>,
    rules: Mutex<Vec<Rule>>,
    subscribers: Mutex<Vec<(SubscriptionId, SharedHandler)>>,
    next_subscription: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileRuleRegistry {
    /// `rules.json` under the platform config dir
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(RULES_FILENAME);
        path
    }

    /// Load rules from `path`. A missing file starts with just the Global rule.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let rules = load_rules(&path)?;
        info!(path = %path.display(), rules = rules.len(), "Rule registry opened");
        Ok(Self::with_rules(Some(path), rules))
    }

    /// Registry without a backing file; rules are taken as given
    pub fn in_memory(rules: Vec<Rule>) -> Self {
        Self::with_rules(None, rules)
    }

    fn with_rules(path: Option<PathBuf>, rules: Vec<Rule>) -> Self {
        Self {
            path,
            rules: Mutex::new(rules),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Backing file; `None` for in-memory registries
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Replace the settings of an existing rule
    pub async fn update_rule(&self, rule: Rule) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.rules();
        let Some(slot) = next.iter_mut().find(|r| r.id == rule.id) else {
            return Err(RegistryError::NotFound(rule.id));
        };
        *slot = rule.clone();

        self.commit(next).await?;
        info!(rule = %rule.id, "Rule updated");
        self.emit(RegistryEvent::RuleChanged(rule));
        Ok(())
    }

    /// Re-read the backing file and tell subscribers to rebuild
    pub async fn reload(&self) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock().await;

        if let Some(path) = self.path.clone() {
            let rules = tokio::task::spawn_blocking(move || load_rules(&path))
                .await
                .map_err(|e| RegistryError::Task(e.to_string()))??;
            *self.rules.lock().unwrap_or_else(PoisonError::into_inner) = rules;
        }

        info!(rules = self.rules().len(), "Rule configuration reloaded");
        self.emit(RegistryEvent::ConfigReloaded);
        Ok(())
    }

    async fn commit(&self, next: Vec<Rule>) -> Result<(), RegistryError> {
        if let Some(path) = self.path.clone() {
            let snapshot = next.clone();
            tokio::task::spawn_blocking(move || save_rules(&path, snapshot))
                .await
                .map_err(|e| RegistryError::Task(e.to_string()))??;
        }
        *self.rules.lock().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    fn emit(&self, event: RegistryEvent) {
        // Handlers run outside the lock so they may call back into the registry
        let handlers: Vec<SharedHandler> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        debug!(event = ?event, subscribers = handlers.len(), "Dispatching registry event");
        for handler in handlers {
            handler(event.clone());
        }
    }
}

#[async_trait]
impl RuleRegistry for FileRuleRegistry {
    fn rules(&self) -> Vec<Rule> {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::from(handler)));
        debug!(subscription = id.0, "Registry subscriber added");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        let removed = subscribers.len() != before;
        debug!(subscription = id.0, removed, "Registry subscriber removed");
        removed
    }

    async fn add_rule(&self, rule: Rule) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.rules();
        if next.iter().any(|r| r.id == rule.id) {
            return Err(RegistryError::DuplicateRule(rule.id));
        }
        next.push(rule.clone());

        self.commit(next).await?;
        info!(rule = %rule.id, "Rule added");
        self.emit(RegistryEvent::RuleAdded(rule));
        Ok(())
    }

    async fn remove_rule(&self, id: &RuleId) -> Result<(), RegistryError> {
        if id.is_global() {
            return Err(RegistryError::Protected(id.clone()));
        }
        let _guard = self.write_lock.lock().await;

        let mut next = self.rules();
        let Some(index) = next.iter().position(|r| r.id == *id) else {
            return Err(RegistryError::NotFound(id.clone()));
        };
        let removed = next.remove(index);

        self.commit(next).await?;
        info!(rule = %id, "Rule removed");
        self.emit(RegistryEvent::RuleRemoved(removed));
        Ok(())
    }
}

fn load_rules(path: &Path) -> Result<Vec<Rule>, RegistryError> {
    let mut rules = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: RulesFile =
            serde_json::from_str(&contents).map_err(|source| RegistryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        file.rules
    } else {
        info!(path = %path.display(), "Rules file not found, starting with global rule only");
        Vec::new()
    };

    for rule in rules.iter_mut().filter(|r| r.id.is_global()) {
        rule.id.pattern.clear();
    }
    rules.retain(|r| {
        if !r.id.has_pattern() {
            warn!(rule = %r.id, "Rule without a pattern in rules file, ignoring");
        }
        r.id.has_pattern()
    });

    if !rules.iter().any(|r| r.id.is_global()) {
        rules.insert(0, Rule::new(RuleId::global()));
    }

    // Keep the first occurrence of any repeated identity
    let mut seen = std::collections::HashSet::new();
    rules.retain(|r| {
        let first = seen.insert(r.id.clone());
        if !first {
            warn!(rule = %r.id, "Duplicate rule in rules file, ignoring");
        }
        first
    });
    Ok(rules)
}

fn save_rules(path: &Path, rules: Vec<Rule>) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RegistryError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let contents = serde_json::to_string_pretty(&RulesFile { rules })?;
    fs::write(path, contents).map_err(|source| RegistryError::Write {
        path: path.to_path_buf(),
        source,
    })
}
