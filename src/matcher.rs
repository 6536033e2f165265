//! Inventory-aware catalog matching.
//!
//! Two-stage policy per extracted item: a case-insensitive substring pass
//! over the catalog snapshot first, then approximate matching by
//! similarity ratio. Ties always resolve to the earliest catalog row, so
//! repeated runs over the same snapshot return identical results.

use crate::models::{ExtractedLineItem, InventoryItem, MatchResult};

/// General-purpose fuzzy lookup threshold (direct name searches).
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.6;

/// Stricter threshold applied when no substring match existed at all —
/// avoids low-confidence auto-matches during submission.
pub const FUZZY_FALLBACK_THRESHOLD: f64 = 0.75;

/// Match every extracted item against a catalog snapshot.
///
/// The snapshot must be in catalog insertion order; the first qualifying
/// row wins on ties.
pub fn match_items(items: &[ExtractedLineItem], catalog: &[InventoryItem]) -> Vec<MatchResult> {
    items
        .iter()
        .map(|item| match_one(item, catalog))
        .collect()
}

fn match_one(item: &ExtractedLineItem, catalog: &[InventoryItem]) -> MatchResult {
    let needle = item.name.to_lowercase();

    // Substring pass: either direction, first catalog hit wins.
    for candidate in catalog {
        let hay = candidate.name.to_lowercase();
        if hay.contains(&needle) || needle.contains(&hay) {
            return MatchResult {
                line_item: item.clone(),
                matched: Some(candidate.clone()),
                confidence: 1.0,
            };
        }
    }

    // Fuzzy fallback, stricter threshold since no substring evidence exists.
    match closest_item(&needle, catalog, FUZZY_FALLBACK_THRESHOLD) {
        Some((candidate, ratio)) => MatchResult {
            line_item: item.clone(),
            matched: Some(candidate.clone()),
            confidence: ratio,
        },
        None => MatchResult {
            line_item: item.clone(),
            matched: None,
            confidence: 0.0,
        },
    }
}

/// Fuzzy catalog search for direct name lookups (admin/pharmacist search
/// box). Uses the general threshold.
pub fn search_catalog<'a>(
    name: &str,
    catalog: &'a [InventoryItem],
) -> Option<(&'a InventoryItem, f64)> {
    closest_item(&name.to_lowercase(), catalog, FUZZY_MATCH_THRESHOLD)
}

/// Best catalog row by similarity ratio, if it clears the threshold.
/// Strict `>` comparison keeps the earliest row on equal ratios.
fn closest_item<'a>(
    needle: &str,
    catalog: &'a [InventoryItem],
    threshold: f64,
) -> Option<(&'a InventoryItem, f64)> {
    let mut best: Option<(&InventoryItem, f64)> = None;
    for candidate in catalog {
        let ratio = similarity(needle, &candidate.name.to_lowercase());
        match best {
            Some((_, best_ratio)) if ratio <= best_ratio => {}
            _ => best = Some((candidate, ratio)),
        }
    }
    best.filter(|(_, ratio)| *ratio >= threshold)
}

/// Normalized edit-distance ratio in [0, 1]: 1.0 for identical strings,
/// 0.0 when every character differs.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
