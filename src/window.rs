//! Settings window session
//!
//! Owns the pane engine and is the only place it is touched. Registry events
//! fire on whatever thread mutated the registry; the subscription handler just
//! posts them into this window's inbox, and the owner applies them in order
//! with [`SettingsWindow::pump`]. Create and delete requests run on the tokio
//! runtime and report failures through the same inbox.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::engine::{PaneSyncEngine, RosterObserver};
use crate::pane::PaneKey;
use crate::placement::{self, Placement};
use crate::registry::{
    OperationFailure, RegistryEvent, RegistryOp, RuleRegistry, SubscriptionId,
};
use crate::rule::{Rule, RuleId};
use crate::settings_store::SettingsStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMessage {
    Registry(RegistryEvent),
    OperationFailed(OperationFailure),
}

pub struct SettingsWindow<O: RosterObserver> {
    engine: Option<PaneSyncEngine<O>>,
    registry: Arc<dyn RuleRegistry>,
    store: Arc<dyn SettingsStore>,
    runtime: Handle,
    inbox: Receiver<WindowMessage>,
    sender: Sender<WindowMessage>,
    subscription: Option<SubscriptionId>,
    restored_placement: Option<Placement>,
}

impl<O: RosterObserver> SettingsWindow<O> {
    /// Subscribe to the registry, restore the saved placement and build the
    /// pane roster from the current rule snapshot.
    pub fn open(
        registry: Arc<dyn RuleRegistry>,
        store: Arc<dyn SettingsStore>,
        runtime: Handle,
        observer: O,
    ) -> Self {
        let (sender, inbox) = mpsc::channel();

        // Subscribe before taking the snapshot; events that overlap the
        // snapshot are absorbed by the engine.
        let post = sender.clone();
        let subscription = registry.subscribe(Box::new(move |event| {
            if post.send(WindowMessage::Registry(event)).is_err() {
                debug!("Settings window gone, dropping registry event");
            }
        }));

        let restored_placement = placement::restore_placement(store.as_ref());
        let engine = PaneSyncEngine::initialize(registry.rules(), observer);
        info!(panes = engine.len(), "Settings window opened");

        Self {
            engine: Some(engine),
            registry,
            store,
            runtime,
            inbox,
            sender,
            subscription: Some(subscription),
            restored_placement,
        }
    }

    /// False once [`close`](Self::close) has run
    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    /// Placement read at open time; `None` means use the platform default
    pub fn restored_placement(&self) -> Option<Placement> {
        self.restored_placement
    }

    /// The pane engine, or `None` after close
    pub fn engine(&self) -> Option<&PaneSyncEngine<O>> {
        self.engine.as_ref()
    }

    /// Handle for posting into this window's inbox from any thread
    pub fn poster(&self) -> Sender<WindowMessage> {
        self.sender.clone()
    }

    /// Select a pane; false if closed or the pane is unknown
    pub fn select(&mut self, key: PaneKey) -> bool {
        match self.engine.as_mut() {
            Some(engine) => engine.select(key),
            None => false,
        }
    }

    /// Create a rule for a process name. Blank names are refused.
    pub fn add_process_rule(&mut self, process_name: &str) -> bool {
        self.add_rule(Rule::new(RuleId::process(process_name.trim())))
    }

    /// Create a rule for a window class name. Blank names are refused.
    pub fn add_class_rule(&mut self, class_name: &str) -> bool {
        self.add_rule(Rule::new(RuleId::class(class_name.trim())))
    }

    /// Ask the registry to create `rule` and select it once it shows up.
    /// The roster is untouched until the registry confirms.
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            warn!(rule = %rule.id, "Add requested on closed settings window");
            return false;
        };
        if !rule.id.has_pattern() {
            warn!(rule = %rule.id, "Refusing to add rule with an empty pattern");
            return false;
        }
        let id = rule.id.clone();
        engine.set_pending(id.clone());

        let registry = Arc::clone(&self.registry);
        let post = self.sender.clone();
        self.runtime.spawn(async move {
            if let Err(e) = registry.add_rule(rule).await {
                error!(rule = %id, error = %e, "Failed to add rule");
                let failure = OperationFailure {
                    op: RegistryOp::Add,
                    rule: id,
                    message: e.to_string(),
                };
                if post.send(WindowMessage::OperationFailed(failure)).is_err() {
                    debug!("Settings window gone, dropping failure report");
                }
            }
        });
        true
    }

    /// Remove the selected rule pane. Selection moves to General right away;
    /// the pane itself disappears when the registry confirms.
    pub fn remove_selected_rule(&mut self) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        if !engine.can_remove_selected() {
            debug!(pane = %engine.selected(), "Selected pane cannot be removed");
            return false;
        }
        let Some(id) = engine.selected().rule_id().cloned() else {
            return false;
        };
        engine.select(PaneKey::General);

        let registry = Arc::clone(&self.registry);
        let post = self.sender.clone();
        self.runtime.spawn(async move {
            if let Err(e) = registry.remove_rule(&id).await {
                error!(rule = %id, error = %e, "Failed to remove rule");
                let failure = OperationFailure {
                    op: RegistryOp::Remove,
                    rule: id,
                    message: e.to_string(),
                };
                if post.send(WindowMessage::OperationFailed(failure)).is_err() {
                    debug!("Settings window gone, dropping failure report");
                }
            }
        });
        true
    }

    /// Apply every queued message without blocking. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.dispatch(message);
            handled += 1;
        }
        handled
    }

    /// Block up to `timeout` for the first message, then drain the rest
    pub fn wait_and_pump(&mut self, timeout: Duration) -> usize {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => {
                self.dispatch(message);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            // We hold a sender ourselves, so this cannot happen while open
            Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn dispatch(&mut self, message: WindowMessage) {
        let Some(engine) = self.engine.as_mut() else {
            debug!(message = ?message, "Settings window closed, ignoring late message");
            return;
        };

        match message {
            WindowMessage::Registry(RegistryEvent::RuleAdded(rule)) => engine.on_rule_added(rule),
            WindowMessage::Registry(RegistryEvent::RuleRemoved(rule)) => {
                engine.on_rule_removed(&rule.id)
            }
            WindowMessage::Registry(RegistryEvent::RuleChanged(rule)) => {
                engine.on_rule_changed(rule)
            }
            WindowMessage::Registry(RegistryEvent::ConfigReloaded) => {
                engine.on_config_reloaded(self.registry.rules())
            }
            WindowMessage::OperationFailed(failure) => {
                if failure.op == RegistryOp::Add && engine.clear_pending_for(&failure.rule) {
                    debug!(rule = %failure.rule, "Cleared pending selection after failed add");
                }
                warn!(failure = %failure, "Registry operation failed");
                engine.observer_mut().operation_failed(&failure);
            }
        }
    }

    /// Tear the window down: unsubscribe, persist `placement` when given and
    /// release the engine. Later messages become no-ops. Returns the observer
    /// on the first call only.
    pub fn close(&mut self, placement: Option<Placement>) -> Option<O> {
        let engine = self.engine.take()?;

        if let Some(id) = self.subscription.take() {
            self.registry.unsubscribe(id);
        }

        if let Some(placement) = placement {
            if let Err(e) = placement::save_placement(self.store.as_ref(), &placement) {
                error!(error = %e, "Failed to save window placement");
            }
        }

        // Anything still queued belongs to the old roster
        let dropped = self.inbox.try_iter().count();
        info!(dropped, "Settings window closed");
        Some(engine.into_observer())
    }
}

impl<O: RosterObserver> Drop for SettingsWindow<O> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.registry.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::RecordingObserver;
    use crate::placement::{Rect, ShowState};
    use crate::registry::FileRuleRegistry;
    use crate::settings_store::MemorySettingsStore;
    use tokio::runtime::Runtime;

    const WAIT: Duration = Duration::from_secs(5);

    struct Fixture {
        runtime: Runtime,
        registry: Arc<FileRuleRegistry>,
        store: Arc<MemorySettingsStore>,
    }

    impl Fixture {
        fn new(rules: &[&str]) -> Self {
            let rules = rules.iter().map(|n| Rule::new(RuleId::process(*n))).collect();
            Self {
                runtime: Runtime::new().unwrap(),
                registry: Arc::new(FileRuleRegistry::in_memory(rules)),
                store: Arc::new(MemorySettingsStore::new()),
            }
        }

        fn open(&self) -> SettingsWindow<RecordingObserver> {
            SettingsWindow::open(
                self.registry.clone(),
                self.store.clone(),
                self.runtime.handle().clone(),
                RecordingObserver::default(),
            )
        }
    }

    fn key(name: &str) -> PaneKey {
        PaneKey::Rule(RuleId::process(name))
    }

    fn keys(window: &SettingsWindow<RecordingObserver>) -> Vec<PaneKey> {
        window
            .engine()
            .unwrap()
            .roster()
            .iter()
            .map(|item| item.key())
            .collect()
    }

    #[test]
    fn test_events_apply_only_when_pumped() {
        let fixture = Fixture::new(&["a"]);
        let mut window = fixture.open();

        fixture
            .runtime
            .block_on(fixture.registry.add_rule(Rule::new(RuleId::process("b"))))
            .unwrap();

        // Delivered to the inbox, not yet to the roster
        assert_eq!(keys(&window), vec![PaneKey::General, key("a")]);
        assert_eq!(window.pump(), 1);
        assert_eq!(keys(&window), vec![PaneKey::General, key("a"), key("b")]);
    }

    #[test]
    fn test_events_from_worker_thread_are_marshalled() {
        let fixture = Fixture::new(&[]);
        let mut window = fixture.open();

        let registry = fixture.registry.clone();
        let handle = fixture.runtime.handle().clone();
        std::thread::spawn(move || {
            for name in ["x", "y", "z"] {
                handle
                    .block_on(registry.add_rule(Rule::new(RuleId::process(name))))
                    .unwrap();
            }
        })
        .join()
        .unwrap();

        assert_eq!(window.pump(), 3);
        assert_eq!(
            keys(&window),
            vec![PaneKey::General, key("x"), key("y"), key("z")]
        );
    }

    #[test]
    fn test_add_selects_confirmed_rule() {
        let fixture = Fixture::new(&["a"]);
        let mut window = fixture.open();

        assert!(window.add_process_rule(" new.exe "));
        assert_eq!(window.engine().unwrap().pending(), Some(&RuleId::process("new.exe")));

        assert!(window.wait_and_pump(WAIT) >= 1);
        let engine = window.engine().unwrap();
        assert_eq!(engine.selected(), &key("new.exe"));
        assert_eq!(engine.pending(), None);
    }

    #[test]
    fn test_blank_names_are_not_sent() {
        let fixture = Fixture::new(&["a"]);
        let mut window = fixture.open();

        assert!(!window.add_process_rule("   "));
        assert!(!window.add_class_rule(""));
        assert_eq!(window.engine().unwrap().pending(), None);

        assert_eq!(window.wait_and_pump(Duration::from_millis(200)), 0);
        assert_eq!(
            fixture.registry.rules(),
            vec![Rule::new(RuleId::process("a"))]
        );
    }

    #[test]
    fn test_failed_add_clears_pending_and_reports() {
        let fixture = Fixture::new(&["dup.exe"]);
        let mut window = fixture.open();
        window.select(key("dup.exe"));

        assert!(window.add_process_rule("dup.exe"));
        assert!(window.wait_and_pump(WAIT) >= 1);

        let engine = window.engine().unwrap();
        assert_eq!(engine.pending(), None);
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.selected(), &key("dup.exe"));
        let failures = &engine.observer().failures;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].op, RegistryOp::Add);
        assert_eq!(failures[0].rule, RuleId::process("dup.exe"));
    }

    #[test]
    fn test_remove_selected_rule() {
        let fixture = Fixture::new(&["a", "b"]);
        let mut window = fixture.open();

        // General is not removable
        assert!(!window.remove_selected_rule());

        window.select(key("a"));
        assert!(window.remove_selected_rule());
        assert_eq!(window.engine().unwrap().selected(), &PaneKey::General);

        assert!(window.wait_and_pump(WAIT) >= 1);
        assert_eq!(keys(&window), vec![PaneKey::General, key("b")]);
    }

    #[test]
    fn test_reload_uses_registry_snapshot() {
        let fixture = Fixture::new(&["a", "b"]);
        let mut window = fixture.open();
        window.select(key("b"));

        fixture.runtime.block_on(fixture.registry.reload()).unwrap();
        assert_eq!(window.pump(), 1);
        assert_eq!(keys(&window), vec![PaneKey::General, key("a"), key("b")]);
        assert_eq!(window.engine().unwrap().selected(), &key("b"));
    }

    #[test]
    fn test_close_unsubscribes_and_ignores_late_messages() {
        let fixture = Fixture::new(&["a"]);
        let mut window = fixture.open();
        let poster = window.poster();
        assert_eq!(fixture.registry.subscriber_count(), 1);

        let observer = window.close(None).unwrap();
        assert!(!window.is_open());
        assert_eq!(fixture.registry.subscriber_count(), 0);

        let changes_at_close = observer.changes.len();
        poster
            .send(WindowMessage::Registry(RegistryEvent::RuleAdded(Rule::new(
                RuleId::process("late"),
            ))))
            .unwrap();
        assert_eq!(window.pump(), 1);
        assert!(window.engine().is_none());
        assert!(window.close(None).is_none());
        assert!(!window.add_process_rule("after-close"));
        assert_eq!(observer.changes.len(), changes_at_close);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let fixture = Fixture::new(&[]);
        let window = fixture.open();
        assert_eq!(fixture.registry.subscriber_count(), 1);
        drop(window);
        assert_eq!(fixture.registry.subscriber_count(), 0);
    }

    #[test]
    fn test_placement_saved_on_close_and_restored_on_open() {
        let fixture = Fixture::new(&[]);
        let mut window = fixture.open();
        assert_eq!(window.restored_placement(), None);

        let placement = Placement::new(Rect::new(10, 20, 810, 620), ShowState::Normal);
        window.close(Some(placement));

        let reopened = fixture.open();
        assert_eq!(reopened.restored_placement(), Some(placement));
    }

    #[test]
    fn test_corrupt_placement_falls_back_to_default() {
        let fixture = Fixture::new(&[]);
        fixture
            .store
            .set_value(crate::constants::settings::WINDOW_PLACEMENT_KEY, b"garbage".to_vec())
            .unwrap();

        let window = fixture.open();
        assert_eq!(window.restored_placement(), None);
        assert!(window.is_open());
    }
}
