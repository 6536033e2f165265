use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::normalize::clean_line;
use crate::models::enums::ItemKind;
use crate::models::ExtractedLineItem;

/// Header words that appear on prescriptions but are never medicines.
/// A candidate whose name consists entirely of these is discarded.
const NON_MEDICINE_FIELDS: &[&str] = &[
    "patient",
    "name",
    "date",
    "age",
    "gender",
    "dr",
    "doctor",
    "rx",
    "prescription",
    "diagnosis",
    "signature",
    "advice",
    "review",
    "address",
];

/// Dosage-form words stripped from captured names.
const DOSE_FORM_STOPWORDS: &[&str] = &["tab", "tablet", "capsule"];

/// `<name><separator><dose><unit>` — the line pattern for prescribed items.
static LINE_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z][a-z\s]*?)[-:\s]*(\d+\s*(?:mg|ml|mcg|g))\b").unwrap());

/// Parse normalized prescription text into ordered candidate line items.
///
/// Processes the text line by line; de-duplicates on (name, strength) with
/// the first occurrence winning. An empty result means "no medicines
/// found" — a business outcome for the caller, not an error.
pub fn extract_line_items(raw: &str) -> Vec<ExtractedLineItem> {
    let mut items = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for line in raw.lines() {
        let line = clean_line(line).to_lowercase();

        for caps in LINE_ITEM.captures_iter(&line) {
            let raw_name = caps[1].trim().to_string();
            let strength: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();

            let name = strip_dose_forms(&raw_name);
            if name.is_empty() || is_header_only(&name) {
                continue;
            }

            let key = (name.clone(), strength.clone());
            if !seen.insert(key) {
                continue;
            }

            let kind = ItemKind::classify(&name);
            items.push(ExtractedLineItem {
                raw_name,
                name,
                strength,
                quantity: 1,
                kind,
            });
        }
    }

    items
}

/// Drop dosage-form tokens and collapse the rest back together.
fn strip_dose_forms(name: &str) -> String {
    name.split_whitespace()
        .filter(|token| !DOSE_FORM_STOPWORDS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_header_only(name: &str) -> bool {
    name.split_whitespace()
        .all(|token| NON_MEDICINE_FIELDS.contains(&token))
}
