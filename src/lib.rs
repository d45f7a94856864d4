//! Pane synchronization core for a rule-based window-effects settings window
//!
//! - [`engine`]: keeps the pane roster in step with registry events
//! - [`pending`]: remembers which rule to select once its creation is confirmed
//! - [`placement`]: versioned codec for the saved window placement
//! - [`window`]: the single-threaded session that owns the engine
//! - [`registry`] / [`settings_store`]: the external collaborators, with file-backed impls

#![forbid(unsafe_code)]

pub mod choices;
pub mod constants;
pub mod engine;
pub mod pane;
pub mod pending;
pub mod placement;
pub mod registry;
pub mod rule;
pub mod settings_store;
pub mod window;

pub use engine::{PaneSyncEngine, RosterChange, RosterObserver};
pub use pane::{PaneItem, PaneKey, PaneKind};
pub use pending::PendingSelectionTracker;
pub use placement::{Placement, PlacementError, Rect, ShowState};
pub use registry::{FileRuleRegistry, OperationFailure, RegistryError, RegistryEvent, RuleRegistry};
pub use rule::{Rule, RuleId, RuleKind, RuleSettings};
pub use settings_store::{FileSettingsStore, MemorySettingsStore, SettingsStore};
pub use window::{SettingsWindow, WindowMessage};
