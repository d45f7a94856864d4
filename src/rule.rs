//! Rules as the registry owns them
//!
//! The engine only ever looks at [`RuleId`]; everything else on a [`Rule`]
//! is carried through untouched for whoever renders the rule editor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::rule_id;

/// What a rule matches windows by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Applies to every window not matched by a more specific rule
    Global,
    /// Matches by executable name
    Process,
    /// Matches by window class name
    Class,
}

/// Stable identity of a rule: kind plus match pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId {
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
}

impl RuleId {
    pub fn global() -> Self {
        Self {
            kind: RuleKind::Global,
            pattern: String::new(),
        }
    }

    pub fn process(name: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Process,
            pattern: name.into(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Class,
            pattern: name.into(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.kind == RuleKind::Global
    }

    /// Process and class rules need something to match against
    pub fn has_pattern(&self) -> bool {
        self.is_global() || !self.pattern.is_empty()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RuleKind::Global => f.write_str(rule_id::GLOBAL),
            RuleKind::Process => write!(f, "{}{}", rule_id::PROCESS_PREFIX, self.pattern),
            RuleKind::Class => write!(f, "{}{}", rule_id::CLASS_PREFIX, self.pattern),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleIdParseError {
    #[error("empty rule identifier")]
    Empty,

    #[error("rule '{0}' is missing a match pattern")]
    MissingPattern(String),

    #[error("unknown rule identifier '{0}' (expected global, process:<name> or class:<name>)")]
    Unknown(String),
}

impl FromStr for RuleId {
    type Err = RuleIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RuleIdParseError::Empty);
        }
        if s.eq_ignore_ascii_case(rule_id::GLOBAL) {
            return Ok(RuleId::global());
        }

        let (kind, pattern) = if let Some(rest) = s.strip_prefix(rule_id::PROCESS_PREFIX) {
            (RuleKind::Process, rest)
        } else if let Some(rest) = s.strip_prefix(rule_id::CLASS_PREFIX) {
            (RuleKind::Class, rest)
        } else {
            return Err(RuleIdParseError::Unknown(s.to_string()));
        };

        if pattern.is_empty() {
            return Err(RuleIdParseError::MissingPattern(s.to_string()));
        }
        Ok(RuleId {
            kind,
            pattern: pattern.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackdropType {
    #[default]
    Default,
    None,
    Mica,
    Acrylic,
    Tabbed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitlebarColorMode {
    #[default]
    Default,
    System,
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerPreference {
    #[default]
    Default,
    Square,
    Rounded,
    RoundedSmall,
}

/// Visual treatment a rule asks for. Opaque to the pane engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSettings {
    #[serde(default)]
    pub backdrop: BackdropType,
    #[serde(default)]
    pub titlebar_color: TitlebarColorMode,
    #[serde(default)]
    pub corner_preference: CornerPreference,
    #[serde(default)]
    pub extend_frame_into_client_area: bool,
    #[serde(default)]
    pub blur_behind: bool,
}

/// A configuration entry matching windows by process, class, or globally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(flatten)]
    pub id: RuleId,
    #[serde(default)]
    pub settings: RuleSettings,
}

impl Rule {
    pub fn new(id: RuleId) -> Self {
        Self {
            id,
            settings: RuleSettings::default(),
        }
    }

    pub fn with_settings(id: RuleId, settings: RuleSettings) -> Self {
        Self { id, settings }
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn kind(&self) -> RuleKind {
        self.id.kind
    }
}
