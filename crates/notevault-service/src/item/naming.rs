//! Collision-free name generation for restored items.
//!
//! A restored item that would collide with a live sibling gets a numeric
//! suffix: `notes` becomes `notes_1`, then `notes_2`, and so on. Both
//! functions are pure; the caller supplies the existing sibling names.

/// Strip one trailing `_<digits>` suffix, if present.
///
/// `"notes_3"` normalizes to `"notes"`; a name without a numeric suffix
/// is returned unchanged.
pub fn normalize_name(name: &str) -> &str {
    match split_suffix(name) {
        Some((stem, _)) => stem,
        None => name,
    }
}

/// Produce a fresh name of the form `stem_<n>` that collides with none of
/// `existing`.
///
/// The stem is `base_name` with any numeric suffix stripped; `n` is one
/// greater than the largest suffix already used by a sibling of that stem
/// (starting at 1 when none exists).
pub fn generate_new_name(base_name: &str, existing: &[String]) -> String {
    let stem = normalize_name(base_name);

    let max_suffix = existing
        .iter()
        .filter_map(|name| split_suffix(name))
        .filter(|(other_stem, _)| *other_stem == stem)
        .map(|(_, n)| n)
        .max()
        .unwrap_or(0);

    format!("{stem}_{}", max_suffix + 1)
}

/// Split `name` into `(stem, suffix)` when it ends in `_<digits>`.
fn split_suffix(name: &str) -> Option<(&str, u64)> {
    let (stem, digits) = name.rsplit_once('_')?;
    if stem.is_empty() || digits.is_empty() {
        return None;
    }
    let n = digits.parse::<u64>().ok()?;
    Some((stem, n))
}
