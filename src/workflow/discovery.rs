//! Clean-up of the discovery stage's raw output.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Lines models like to open with instead of getting to the content.
static FRAMING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:# Release Notes for|# Changelog for|Here are the|Here is the)")
        .expect("Invalid regex")
});

/// Remove vendor framing lines ("Here are the release notes:", a
/// "# Changelog for vX" title, ...) together with one blank line after each,
/// then trim surrounding whitespace.
pub fn strip_framing_headers(content: &str) -> String {
    let mut kept = Vec::new();
    let mut skip_blank = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if FRAMING_LINE.is_match(trimmed) {
            skip_blank = true;
            continue;
        }
        if skip_blank && trimmed.is_empty() {
            skip_blank = false;
            continue;
        }
        skip_blank = false;
        kept.push(line);
    }

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_preamble_and_one_blank_line() {
        let raw = "Here are the release notes for v1.2.0:\n\n### Added\n- Thing\n";
        assert_eq!(strip_framing_headers(raw), "### Added\n- Thing");
    }

    #[test]
    fn strips_markdown_titles() {
        let raw = "# Release Notes for v2.0.0\n\n### Fixed\n- Crash on start";
        assert_eq!(strip_framing_headers(raw), "### Fixed\n- Crash on start");

        let raw = "  # Changelog for 0.3\n### Changed\n- Faster";
        assert_eq!(strip_framing_headers(raw), "### Changed\n- Faster");
    }

    #[test]
    fn only_one_blank_line_is_consumed() {
        let raw = "Here is the changelog:\n\n\n- Item";
        assert_eq!(strip_framing_headers(raw), "- Item");

        let raw = "- First\nHere is the rest:\n\n\n- Second";
        assert_eq!(strip_framing_headers(raw), "- First\n\n- Second");
    }

    #[test]
    fn clean_content_is_only_trimmed() {
        let raw = "\n### Added\n\n- New flag\n\n";
        assert_eq!(strip_framing_headers(raw), "### Added\n\n- New flag");
    }

    #[test]
    fn similar_but_different_lines_survive() {
        let raw = "## Release Notes\n- Here are the new APIs: foo, bar";
        assert_eq!(strip_framing_headers(raw), raw);
    }
}
