use std::sync::LazyLock;

use regex::Regex;

static NON_ASCII_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\x20-\x7E]+").unwrap());
static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize raw extracted text into a matchable form: non-printable and
/// non-ASCII runs become single spaces, whitespace runs collapse to single
/// spaces, the result is trimmed. Pure function; empty in, empty out.
///
/// Newlines do not survive — use [`clean_line`] per line when line
/// structure matters downstream.
pub fn clean_raw_text(raw: &str) -> String {
    let ascii = NON_ASCII_RUNS.replace_all(raw, " ");
    WHITESPACE_RUNS.replace_all(&ascii, " ").trim().to_string()
}

/// Normalize a single line, preserving the caller's line split.
pub fn clean_line(line: &str) -> String {
    clean_raw_text(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(clean_raw_text("Amoxicillin   500mg"), "Amoxicillin 500mg");
    }

    #[test]
    fn replaces_non_ascii_runs_with_one_space() {
        assert_eq!(clean_raw_text("Rx\u{2192}\u{2192}Paracetamol"), "Rx Paracetamol");
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(clean_raw_text("Dose:\x00\x01 500mg"), "Dose: 500mg");
    }

    #[test]
    fn trims_ends() {
        assert_eq!(clean_raw_text("  ibuprofen 200mg  "), "ibuprofen 200mg");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(clean_raw_text(""), "");
        assert_eq!(clean_raw_text("   \u{00A0}  "), "");
    }

    #[test]
    fn newlines_collapse_in_whole_text_form() {
        assert_eq!(clean_raw_text("a\nb"), "a b");
    }
}
