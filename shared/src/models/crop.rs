//! Crop base-water table
//!
//! The one table consulted by target synthesis, dataset engineering, request
//! validation and the crop lookup endpoint. Changing an entry invalidates every
//! previously trained artifact (the fingerprint recorded in the artifact will no
//! longer match).

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Baseline liters per hectare for crops that are not in the table
pub const DEFAULT_BASE_WATER: f64 = 4000.0;

/// Known crops and their baseline water requirement (liters per hectare)
pub const CROP_BASE_WATER: &[(&str, f64)] = &[
    ("rice", 6500.0),
    ("maize", 5000.0),
    ("pomegranate", 4400.0),
    ("banana", 5100.0),
    ("mango", 4600.0),
    ("watermelon", 4700.0),
    ("papaya", 4850.0),
];

/// Lower-case and trim a raw crop name
pub fn normalize_crop_type(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Look up the base water for an already normalized crop name
pub fn known_base_water(crop_type: &str) -> Option<f64> {
    CROP_BASE_WATER
        .iter()
        .find(|(name, _)| *name == crop_type)
        .map(|(_, base)| *base)
}

/// Base water for any crop name; unknown crops resolve to [`DEFAULT_BASE_WATER`]
pub fn crop_water_base(crop_type: &str) -> f64 {
    known_base_water(&normalize_crop_type(crop_type)).unwrap_or(DEFAULT_BASE_WATER)
}

/// Whether the crop (after normalization) has its own table entry
pub fn is_known_crop(crop_type: &str) -> bool {
    known_base_water(&normalize_crop_type(crop_type)).is_some()
}

/// The table as an ordered map, for JSON responses
pub fn crop_table() -> BTreeMap<String, f64> {
    CROP_BASE_WATER
        .iter()
        .map(|(name, base)| (name.to_string(), *base))
        .collect()
}

/// Stable hex digest over the sorted entries and the default.
///
/// Artifacts record this value so a model trained against another table is
/// refused at load time.
pub fn crop_table_fingerprint() -> String {
    let mut hasher = Sha256::new();
    for (name, base) in crop_table() {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(base.to_le_bytes());
        hasher.update(b";");
    }
    hasher.update(b"default=");
    hasher.update(DEFAULT_BASE_WATER.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_crops() {
        assert_eq!(crop_water_base("rice"), 6500.0);
        assert_eq!(crop_water_base("papaya"), 4850.0);
        assert_eq!(crop_table().len(), 7);
    }

    #[test]
    fn test_normalization_applies_before_lookup() {
        assert_eq!(crop_water_base("  Rice "), 6500.0);
        assert_eq!(crop_water_base("MAIZE"), 5000.0);
        assert!(is_known_crop("Banana\t"));
    }

    #[test]
    fn test_unknown_crop_uses_default() {
        assert_eq!(crop_water_base("coffee"), DEFAULT_BASE_WATER);
        assert_eq!(crop_water_base(""), DEFAULT_BASE_WATER);
        assert!(!is_known_crop("kidneybeans"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(crop_table_fingerprint(), crop_table_fingerprint());
        assert_eq!(crop_table_fingerprint().len(), 64);
    }
}
