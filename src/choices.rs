//! Option lists offered by the rule editor, gated on what the desktop supports

use serde::Serialize;

use crate::rule::{BackdropType, CornerPreference, TitlebarColorMode};

/// Compositor features detected at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisplayCapabilities {
    /// System backdrop attribute (acrylic, tabbed)
    pub backdrop: bool,
    /// Legacy mica toggle
    pub mica: bool,
    pub immersive_dark_mode: bool,
    pub corner_preference: bool,
}

impl DisplayCapabilities {
    pub fn all() -> Self {
        Self {
            backdrop: true,
            mica: true,
            immersive_dark_mode: true,
            corner_preference: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceLists {
    pub backdrop_types: Vec<BackdropType>,
    pub titlebar_color_modes: Vec<TitlebarColorMode>,
    pub corner_preferences: Vec<CornerPreference>,
}

impl ChoiceLists {
    /// `Default` is always offered first; everything else only when supported
    pub fn build(caps: DisplayCapabilities) -> Self {
        let mut backdrop_types = vec![BackdropType::Default];
        if caps.mica {
            backdrop_types.extend([BackdropType::None, BackdropType::Mica]);
        }
        if caps.backdrop {
            backdrop_types.extend([BackdropType::Acrylic, BackdropType::Tabbed]);
        }

        let mut titlebar_color_modes = vec![TitlebarColorMode::Default];
        if caps.immersive_dark_mode {
            titlebar_color_modes.extend([
                TitlebarColorMode::System,
                TitlebarColorMode::Light,
                TitlebarColorMode::Dark,
            ]);
        }

        let mut corner_preferences = vec![CornerPreference::Default];
        if caps.corner_preference {
            corner_preferences.extend([
                CornerPreference::Square,
                CornerPreference::Rounded,
                CornerPreference::RoundedSmall,
            ]);
        }

        Self {
            backdrop_types,
            titlebar_color_modes,
            corner_preferences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_supported_offers_defaults_only() {
        let lists = ChoiceLists::build(DisplayCapabilities::default());
        assert_eq!(lists.backdrop_types, vec![BackdropType::Default]);
        assert_eq!(lists.titlebar_color_modes, vec![TitlebarColorMode::Default]);
        assert_eq!(lists.corner_preferences, vec![CornerPreference::Default]);
    }

    #[test]
    fn test_mica_only() {
        let lists = ChoiceLists::build(DisplayCapabilities {
            mica: true,
            ..Default::default()
        });
        assert_eq!(
            lists.backdrop_types,
            vec![BackdropType::Default, BackdropType::None, BackdropType::Mica]
        );
    }

    #[test]
    fn test_everything_supported() {
        let lists = ChoiceLists::build(DisplayCapabilities::all());
        assert_eq!(lists.backdrop_types.len(), 5);
        assert_eq!(lists.titlebar_color_modes.len(), 4);
        assert_eq!(lists.corner_preferences.last(), Some(&CornerPreference::RoundedSmall));
    }
}
