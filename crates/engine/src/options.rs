//! Canonicalization of raw option selections.
//!
//! Raw selections arrive as free-form name/value pairs harvested from form
//! controls and variant context. Normalization trims values, drops
//! placeholder entries, and promotes the aliases different page templates
//! use for the same concept (`size`/`Size`/`option2`, `color`/`Color`/
//! `option3`) into single canonical slots. Package selections get their
//! own synthetic `packageVariant` slot so the merge rule sees one key
//! regardless of which control carried the value.

use std::collections::BTreeMap;

use local_cart_core::SelectedOptions;

/// Raw option selections keyed by source field name.
///
/// Ordered map so normalization output is deterministic regardless of
/// harvest order.
pub type RawOptionMap = BTreeMap<String, String>;

/// Canonical slot for a recognized package selection.
pub const PACKAGE_VARIANT_SLOT: &str = "packageVariant";

/// Canonical slot for size-like options.
pub const SIZE_SLOT: &str = "size";

/// Canonical slot for color-like options.
pub const COLOR_SLOT: &str = "color";

/// Values that mean "nothing selected" and are dropped entirely.
fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "null"
}

/// Normalize raw selections into the canonical option map.
///
/// Entries with placeholder values are dropped; surviving values are
/// trimmed. Alias keys collapse into their canonical slot, first alias in
/// priority order wins (`size` beats `Size` beats `option2`). Keys that
/// are neither placeholders nor aliases pass through under their own
/// name.
#[must_use]
pub fn normalize_options(raw: &RawOptionMap) -> SelectedOptions {
    let mut normalized = SelectedOptions::new();

    for (key, value) in raw {
        if is_placeholder(value) {
            continue;
        }
        if canonical_slot_for(key).is_some() {
            continue; // aliases are promoted below, not passed through
        }
        normalized.insert(key.clone(), value.trim().to_string());
    }

    promote(raw, &mut normalized, PACKAGE_VARIANT_SLOT, &["packageVariant", "package"]);
    promote(raw, &mut normalized, SIZE_SLOT, &["size", "Size", "option2"]);
    promote(raw, &mut normalized, COLOR_SLOT, &["color", "Color", "option3"]);

    normalized
}

/// The canonical slot an alias key maps to, if it is an alias at all.
fn canonical_slot_for(key: &str) -> Option<&'static str> {
    match key {
        "packageVariant" | "package" => Some(PACKAGE_VARIANT_SLOT),
        "size" | "Size" | "option2" => Some(SIZE_SLOT),
        "color" | "Color" | "option3" => Some(COLOR_SLOT),
        _ => None,
    }
}

/// Fill `slot` from the first alias carrying a non-placeholder value.
fn promote(raw: &RawOptionMap, normalized: &mut SelectedOptions, slot: &str, aliases: &[&str]) {
    for alias in aliases {
        if let Some(value) = raw.get(*alias)
            && !is_placeholder(value)
        {
            normalized.insert(slot.to_string(), value.trim().to_string());
            return;
        }
    }
}
