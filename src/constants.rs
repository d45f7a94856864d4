//! Application-wide constants
//!
//! Keys, file names and schema tags shared by the engine, the stores and the
//! CLI, kept in one place so the persisted layout has a single source of truth.

/// On-disk configuration locations
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "rule-panes";

    /// Rule registry file (JSON)
    pub const RULES_FILENAME: &str = "rules.json";

    /// Key/value settings file (JSON)
    pub const SETTINGS_FILENAME: &str = "settings.json";
}

/// Settings store keys
pub mod settings {
    /// Key holding the encoded window placement blob
    pub const WINDOW_PLACEMENT_KEY: &str = "WindowPlacement";
}

/// Window placement blob layout
pub mod placement {
    /// Leading tag identifying a placement blob
    pub const MAGIC: &[u8; 3] = b"WPL";

    /// Schema version written by this build
    pub const SCHEMA_VERSION: u16 = 1;

    /// Fixed header: magic + u16 version + u32 payload length
    pub const HEADER_LEN: usize = 3 + 2 + 4;

    /// Upper bound on the JSON payload, rejects absurd length prefixes
    pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;
}

/// Text forms of rule identities
pub mod rule_id {
    pub const GLOBAL: &str = "global";
    pub const PROCESS_PREFIX: &str = "process:";
    pub const CLASS_PREFIX: &str = "class:";
}

/// CLI behaviour
pub mod cli {
    /// How long a one-shot command waits for the registry to confirm
    pub const CONFIRM_TIMEOUT_MS: u64 = 2000;

    /// Poll interval of the `watch` loop
    pub const WATCH_POLL_MS: u64 = 250;
}
