//! Pane synchronization engine
//!
//! Keeps the ordered pane roster of the settings window in step with the rule
//! registry. The General pane always sits at index 0; every other pane maps
//! to exactly one rule identity, in the order the rules were added. Selection
//! is tracked by identity so it survives in-place replacement and reloads.
//!
//! The engine is not thread-safe and does not try to be: the window that owns
//! it is the only thing allowed to call it (see [`crate::window`]).

use tracing::{debug, info, warn};

use crate::pane::{PaneItem, PaneKey};
use crate::pending::PendingSelectionTracker;
use crate::registry::OperationFailure;
use crate::rule::{Rule, RuleId};

/// Index-based roster notifications, in the order they were applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    /// Roster emptied; followed by `Inserted` for every rebuilt item
    Reset,
    Inserted { index: usize, item: PaneItem },
    Removed { index: usize, item: PaneItem },
    Replaced { index: usize, item: PaneItem },
}

/// Receives everything the UI needs to mirror the roster
pub trait RosterObserver {
    fn roster_changed(&mut self, change: &RosterChange);

    /// Called with the newly selected item, also when the selected item was
    /// replaced in place by a newer version of the same rule
    fn selection_changed(&mut self, selected: &PaneItem);

    /// An async registry command issued from the window failed
    fn operation_failed(&mut self, _failure: &OperationFailure) {}
}

pub struct PaneSyncEngine<O: RosterObserver> {
    roster: Vec<PaneItem>,
    selected: PaneKey,
    pending: PendingSelectionTracker,
    observer: O,
}

impl<O: RosterObserver> PaneSyncEngine<O> {
    /// Build the roster from a registry snapshot: General first, then one
    /// pane per rule in snapshot order. Selection starts on General.
    pub fn initialize(snapshot: Vec<Rule>, observer: O) -> Self {
        let mut engine = Self {
            roster: Vec::new(),
            selected: PaneKey::General,
            pending: PendingSelectionTracker::new(),
            observer,
        };
        engine.populate(snapshot);
        engine.notify_selection();
        info!(panes = engine.roster.len(), "Pane roster initialized");
        engine
    }

    /// Panes in display order, General first
    pub fn roster(&self) -> &[PaneItem] {
        &self.roster
    }

    /// Number of panes, including General
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Key of the selected pane
    pub fn selected(&self) -> &PaneKey {
        &self.selected
    }

    /// The selected pane itself
    pub fn selected_item(&self) -> &PaneItem {
        // Selection always resolves; General is index 0 as a last resort
        self.position(&self.selected)
            .map(|index| &self.roster[index])
            .unwrap_or(&self.roster[0])
    }

    /// Rule behind the selected pane; `None` on General
    pub fn selected_rule(&self) -> Option<&Rule> {
        self.selected_item().rule()
    }

    /// Only process and class rule panes can be deleted
    pub fn can_remove_selected(&self) -> bool {
        self.selected_item().is_removable()
    }

    /// Roster index of the pane for `key`
    pub fn position(&self, key: &PaneKey) -> Option<usize> {
        self.roster.iter().position(|item| item.matches(key))
    }

    /// Whether a pane exists for rule `id`
    pub fn contains(&self, id: &RuleId) -> bool {
        self.roster.iter().any(|item| item.is_rule(id))
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Drop the engine and hand back its observer
    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Select `draft` once the registry reports it added
    pub fn set_pending(&mut self, draft: RuleId) {
        debug!(draft = %draft, "Pending selection recorded");
        self.pending.set_pending(draft);
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Cancel the pending draft only if it is `id`
    pub fn clear_pending_for(&mut self, id: &RuleId) -> bool {
        self.pending.clear_if_matches(id)
    }

    /// Draft awaiting confirmation, if any
    pub fn pending(&self) -> Option<&RuleId> {
        self.pending.pending()
    }

    /// User picked a pane. Unknown keys are ignored.
    pub fn select(&mut self, key: PaneKey) -> bool {
        if self.position(&key).is_none() {
            warn!(pane = %key, "Ignoring selection of pane not in roster");
            return false;
        }
        if self.selected != key {
            self.selected = key;
            self.notify_selection();
        }
        true
    }

    pub fn on_rule_added(&mut self, rule: Rule) {
        let id = rule.id.clone();

        if let Some(index) = self.rule_position(&id) {
            // Duplicate delivery: keep one pane per identity
            debug!(rule = %id, index, "Add for rule already in roster, replacing in place");
            self.replace_at(index, rule);
        } else {
            let index = self.roster.len();
            let item = PaneItem::Rule(rule);
            self.roster.push(item.clone());
            self.observer
                .roster_changed(&RosterChange::Inserted { index, item });
            info!(rule = %id, index, "Pane added");
        }

        if self.pending.consume_if_matches(&id) {
            info!(rule = %id, "Selecting newly created rule");
            self.selected = PaneKey::Rule(id);
            self.notify_selection();
        }
    }

    pub fn on_rule_removed(&mut self, id: &RuleId) {
        let Some(index) = self.rule_position(id) else {
            debug!(rule = %id, "Remove for rule not in roster, ignoring");
            return;
        };

        let item = self.roster.remove(index);
        self.observer
            .roster_changed(&RosterChange::Removed { index, item });
        info!(rule = %id, index, "Pane removed");

        if self.selected.rule_id() == Some(id) {
            self.selected = PaneKey::General;
            self.notify_selection();
        }
    }

    pub fn on_rule_changed(&mut self, rule: Rule) {
        let Some(index) = self.rule_position(&rule.id) else {
            debug!(rule = %rule.id, "Change for rule not in roster, ignoring");
            return;
        };
        self.replace_at(index, rule);
    }

    /// Rebuild from a fresh snapshot, restoring the selection by identity when
    /// it survived the reload. Order follows the new snapshot.
    pub fn on_config_reloaded(&mut self, snapshot: Vec<Rule>) {
        let previous = self.selected.clone();

        self.roster.clear();
        self.observer.roster_changed(&RosterChange::Reset);
        self.populate(snapshot);

        self.selected = if self.position(&previous).is_some() {
            previous
        } else {
            info!(previous = %previous, "Selected pane gone after reload, falling back to General");
            PaneKey::General
        };
        self.notify_selection();
        info!(panes = self.roster.len(), "Pane roster reloaded");
    }

    fn populate(&mut self, snapshot: Vec<Rule>) {
        self.push_item(PaneItem::General);
        for rule in snapshot {
            if self.contains(&rule.id) {
                warn!(rule = %rule.id, "Snapshot lists rule twice, keeping first");
                continue;
            }
            self.push_item(PaneItem::Rule(rule));
        }
    }

    fn push_item(&mut self, item: PaneItem) {
        let index = self.roster.len();
        self.roster.push(item.clone());
        self.observer
            .roster_changed(&RosterChange::Inserted { index, item });
    }

    fn replace_at(&mut self, index: usize, rule: Rule) {
        let id = rule.id.clone();
        let item = PaneItem::Rule(rule);
        self.roster[index] = item.clone();
        self.observer
            .roster_changed(&RosterChange::Replaced { index, item });
        debug!(rule = %id, index, "Pane replaced");

        if self.selected.rule_id() == Some(&id) {
            self.notify_selection();
        }
    }

    fn rule_position(&self, id: &RuleId) -> Option<usize> {
        self.roster.iter().position(|item| item.is_rule(id))
    }

    fn notify_selection(&mut self) {
        let item = self.selected_item().clone();
        self.observer.selection_changed(&item);
    }
}
