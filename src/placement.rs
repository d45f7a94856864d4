//! Window placement persistence
//!
//! The settings window remembers where it was between runs. The record is
//! stored as an opaque blob under a single settings key:
//!
//! ```text
//! "WPL" | schema_version: u16 LE | payload_len: u32 LE | JSON payload
//! ```
//!
//! The payload uses named fields, so a newer build reads older blobs (missing
//! optional fields take defaults) and anything unreadable comes back as a
//! typed [`PlacementError`] instead of a panic.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::placement::{HEADER_LEN, MAGIC, MAX_PAYLOAD_LEN, SCHEMA_VERSION};
use crate::constants::settings::WINDOW_PLACEMENT_KEY;
use crate::settings_store::{SettingsStore, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Widened so any rectangle `decode` accepts has a width
    pub fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.bottom) - i64::from(self.top)
    }

    fn is_valid(&self) -> bool {
        self.right >= self.left && self.bottom >= self.top
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
    Hidden,
}

/// Restored geometry and show state of the settings window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Restored (non-maximized) bounds
    pub normal: Rect,
    #[serde(default)]
    pub show_state: ShowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_position: Option<Point>,
}

impl Placement {
    pub fn new(normal: Rect, show_state: ShowState) -> Self {
        Self {
            normal,
            show_state,
            min_position: None,
            max_position: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("placement blob truncated ({len} bytes, header needs {})", HEADER_LEN)]
    Truncated { len: usize },

    #[error("not a placement blob (bad magic)")]
    BadMagic,

    #[error("unsupported placement schema version {version} (this build reads 1..={supported})")]
    UnsupportedVersion { version: u16, supported: u16 },

    #[error("placement payload length {declared} does not match {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("placement payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("placement payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("placement rectangle is inverted: {0:?}")]
    InvalidGeometry(Rect),
}

/// Encode a placement into a versioned blob
pub fn encode(placement: &Placement) -> Result<Vec<u8>, PlacementError> {
    if !placement.normal.is_valid() {
        return Err(PlacementError::InvalidGeometry(placement.normal));
    }

    let payload = serde_json::to_vec(placement)?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PlacementError::PayloadTooLarge(payload.len()));
    }

    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    blob.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    blob.extend_from_slice(&payload);
    Ok(blob)
}

/// Decode a blob written by [`encode`] from this or an older build
pub fn decode(bytes: &[u8]) -> Result<Placement, PlacementError> {
    if bytes.len() < HEADER_LEN {
        return Err(PlacementError::Truncated { len: bytes.len() });
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(PlacementError::BadMagic);
    }

    let (version_bytes, rest) = rest.split_at(2);
    let version = u16::from_le_bytes([version_bytes[0], version_bytes[1]]);
    if version == 0 || version > SCHEMA_VERSION {
        return Err(PlacementError::UnsupportedVersion {
            version,
            supported: SCHEMA_VERSION,
        });
    }

    let (len_bytes, payload) = rest.split_at(4);
    let declared = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if declared > MAX_PAYLOAD_LEN {
        return Err(PlacementError::PayloadTooLarge(declared));
    }
    if declared != payload.len() {
        return Err(PlacementError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    let placement: Placement = serde_json::from_slice(payload)?;
    if !placement.normal.is_valid() {
        return Err(PlacementError::InvalidGeometry(placement.normal));
    }
    Ok(placement)
}

/// Read the saved placement. Absent or unreadable blobs yield `None` and the
/// caller keeps the platform default.
pub fn restore_placement(store: &dyn SettingsStore) -> Option<Placement> {
    let bytes = match store.get_value(WINDOW_PLACEMENT_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!("No saved window placement, using default");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Failed to read saved window placement, using default");
            return None;
        }
    };

    match decode(&bytes) {
        Ok(placement) => {
            info!(
                width = placement.normal.width(),
                height = placement.normal.height(),
                show_state = ?placement.show_state,
                "Restored window placement"
            );
            Some(placement)
        }
        Err(e) => {
            warn!(error = %e, len = bytes.len(), "Saved window placement unreadable, using default");
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SavePlacementError {
    #[error(transparent)]
    Encode(#[from] PlacementError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn save_placement(store: &dyn SettingsStore, placement: &Placement) -> Result<(), SavePlacementError> {
    let blob = encode(placement)?;
    store.set_value(WINDOW_PLACEMENT_KEY, blob)?;
    info!(placement = ?placement, "Saved window placement");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings_store::MemorySettingsStore;

    fn sample() -> Placement {
        Placement {
            normal: Rect::new(-1200, 40, -200, 840),
            show_state: ShowState::Maximized,
            min_position: Some(Point { x: -1, y: -1 }),
            max_position: None,
        }
    }

    fn blob_with(version: u16, payload: &[u8]) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&version.to_le_bytes());
        blob.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        blob.extend_from_slice(payload);
        blob
    }

    #[test]
    fn test_round_trip() {
        let placement = sample();
        let blob = encode(&placement).unwrap();
        assert_eq!(decode(&blob).unwrap(), placement);

        let plain = Placement::new(Rect::new(0, 0, 800, 600), ShowState::Normal);
        assert_eq!(decode(&encode(&plain).unwrap()).unwrap(), plain);
    }

    #[test]
    fn test_header_layout() {
        let blob = encode(&sample()).unwrap();
        assert_eq!(&blob[..3], b"WPL");
        assert_eq!(u16::from_le_bytes([blob[3], blob[4]]), SCHEMA_VERSION);
        let len = u32::from_le_bytes([blob[5], blob[6], blob[7], blob[8]]) as usize;
        assert_eq!(len, blob.len() - HEADER_LEN);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(decode(&[]), Err(PlacementError::Truncated { len: 0 })));
        assert!(matches!(decode(b"WPL\x01"), Err(PlacementError::Truncated { .. })));
        assert!(matches!(
            decode(b"\x00\x01\x00\x00\x00\x0b\x00\x00\x00\xff\xfe"),
            Err(PlacementError::BadMagic)
        ));
        assert!(matches!(
            decode(&blob_with(1, b"not json")),
            Err(PlacementError::Payload(_))
        ));
    }

    #[test]
    fn test_version_checks() {
        let payload = br#"{"normal":{"left":0,"top":0,"right":10,"bottom":10}}"#;
        assert!(matches!(
            decode(&blob_with(0, payload)),
            Err(PlacementError::UnsupportedVersion { version: 0, .. })
        ));
        assert!(matches!(
            decode(&blob_with(SCHEMA_VERSION + 1, payload)),
            Err(PlacementError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_length_prefix_checks() {
        let mut blob = encode(&sample()).unwrap();
        blob.pop();
        assert!(matches!(decode(&blob), Err(PlacementError::LengthMismatch { .. })));

        let mut huge = blob_with(1, b"{}");
        huge[5..9].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&huge), Err(PlacementError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_sparse_and_extended_payloads() {
        // Older writer: only the rectangle
        let sparse = br#"{"normal":{"left":1,"top":2,"right":3,"bottom":4}}"#;
        let placement = decode(&blob_with(1, sparse)).unwrap();
        assert_eq!(placement, Placement::new(Rect::new(1, 2, 3, 4), ShowState::Normal));

        // Unknown fields are skipped
        let extended = br#"{"normal":{"left":1,"top":2,"right":3,"bottom":4},"show_state":"hidden","dpi":144}"#;
        assert_eq!(decode(&blob_with(1, extended)).unwrap().show_state, ShowState::Hidden);
    }

    #[test]
    fn test_inverted_rect_rejected() {
        let bad = Placement::new(Rect::new(100, 0, 0, 10), ShowState::Normal);
        assert!(matches!(encode(&bad), Err(PlacementError::InvalidGeometry(_))));

        let payload = br#"{"normal":{"left":0,"top":50,"right":10,"bottom":0}}"#;
        assert!(matches!(
            decode(&blob_with(1, payload)),
            Err(PlacementError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_extreme_rect_dimensions() {
        let wide = Placement::new(Rect::new(i32::MIN, 0, i32::MAX, 10), ShowState::Normal);
        let decoded = decode(&encode(&wide).unwrap()).unwrap();
        assert_eq!(decoded.normal.width(), u32::MAX as i64);
        assert_eq!(decoded.normal.height(), 10);
    }

    #[test]
    fn test_store_helpers() {
        let store = MemorySettingsStore::new();
        assert_eq!(restore_placement(&store), None);

        save_placement(&store, &sample()).unwrap();
        assert_eq!(restore_placement(&store), Some(sample()));

        store.set_value(WINDOW_PLACEMENT_KEY, vec![1, 2, 3]).unwrap();
        assert_eq!(restore_placement(&store), None);
    }
}
