//! Pane items: the UI projection of rules in the settings window

use std::fmt;

use crate::rule::{Rule, RuleId, RuleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneKind {
    /// Application-wide settings, no backing rule
    General,
    Global,
    Process,
    Class,
}

/// Identity of a pane, used for selection and lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaneKey {
    General,
    Rule(RuleId),
}

impl PaneKey {
    pub fn rule_id(&self) -> Option<&RuleId> {
        match self {
            PaneKey::General => None,
            PaneKey::Rule(id) => Some(id),
        }
    }
}

impl From<RuleId> for PaneKey {
    fn from(id: RuleId) -> Self {
        PaneKey::Rule(id)
    }
}

impl fmt::Display for PaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaneKey::General => f.write_str("general"),
            PaneKey::Rule(id) => id.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneItem {
    General,
    Rule(Rule),
}

impl PaneItem {
    pub fn key(&self) -> PaneKey {
        match self {
            PaneItem::General => PaneKey::General,
            PaneItem::Rule(rule) => PaneKey::Rule(rule.id.clone()),
        }
    }

    /// Cheap identity comparison without cloning the key
    pub fn matches(&self, key: &PaneKey) -> bool {
        match (self, key) {
            (PaneItem::General, PaneKey::General) => true,
            (PaneItem::Rule(rule), PaneKey::Rule(id)) => rule.id == *id,
            _ => false,
        }
    }

    pub fn is_rule(&self, id: &RuleId) -> bool {
        matches!(self, PaneItem::Rule(rule) if rule.id == *id)
    }

    pub fn kind(&self) -> PaneKind {
        match self {
            PaneItem::General => PaneKind::General,
            PaneItem::Rule(rule) => match rule.kind() {
                RuleKind::Global => PaneKind::Global,
                RuleKind::Process => PaneKind::Process,
                RuleKind::Class => PaneKind::Class,
            },
        }
    }

    pub fn rule(&self) -> Option<&Rule> {
        match self {
            PaneItem::General => None,
            PaneItem::Rule(rule) => Some(rule),
        }
    }

    /// General and Global panes are permanent
    pub fn is_removable(&self) -> bool {
        matches!(self.kind(), PaneKind::Process | PaneKind::Class)
    }

    pub fn title(&self) -> String {
        match self {
            PaneItem::General => "General".to_string(),
            PaneItem::Rule(rule) => match rule.kind() {
                RuleKind::Global => "Global".to_string(),
                RuleKind::Process | RuleKind::Class => rule.id.pattern.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pane_kind_and_removability() {
        let general = PaneItem::General;
        let global = PaneItem::Rule(Rule::new(RuleId::global()));
        let process = PaneItem::Rule(Rule::new(RuleId::process("a.exe")));
        let class = PaneItem::Rule(Rule::new(RuleId::class("Foo")));

        assert_eq!(general.kind(), PaneKind::General);
        assert_eq!(global.kind(), PaneKind::Global);
        assert!(!general.is_removable());
        assert!(!global.is_removable());
        assert!(process.is_removable());
        assert!(class.is_removable());
    }

    #[test]
    fn test_matches_by_identity() {
        let item = PaneItem::Rule(Rule::new(RuleId::process("a.exe")));
        assert!(item.matches(&PaneKey::Rule(RuleId::process("a.exe"))));
        assert!(!item.matches(&PaneKey::Rule(RuleId::class("a.exe"))));
        assert!(!item.matches(&PaneKey::General));
        assert!(PaneItem::General.matches(&PaneKey::General));
    }

    #[test]
    fn test_titles() {
        assert_eq!(PaneItem::General.title(), "General");
        assert_eq!(PaneItem::Rule(Rule::new(RuleId::global())).title(), "Global");
        assert_eq!(
            PaneItem::Rule(Rule::new(RuleId::process("code.exe"))).title(),
            "code.exe"
        );
    }
}
