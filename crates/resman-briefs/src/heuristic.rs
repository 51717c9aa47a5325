use regex::Regex;
use resman_core::Brief;
use std::path::Path;
use std::sync::LazyLock;

/// Longest fallback one-liner, in characters.
pub const ONE_LINER_MAX_CHARS: usize = 220;

static ONE_LINER_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)one.?liner\s*[:\-]\s*(.+)").unwrap());

static HEADING_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s*").unwrap());

/// One-line description of a memo: an explicit `One-liner:` header wins,
/// otherwise the second non-blank line (the first when there is only one),
/// without heading markers, cut to [`ONE_LINER_MAX_CHARS`].
pub fn one_liner(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for line in &lines {
        if let Some(caps) = ONE_LINER_HEADER.captures(line) {
            let value = caps[1].trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    let raw = match lines.as_slice() {
        [] => "",
        [only] => *only,
        [_, second, ..] => *second,
    };
    HEADING_MARKER
        .replace(raw, "")
        .chars()
        .take(ONE_LINER_MAX_CHARS)
        .collect()
}

/// Brief built without the summarizer. `project_name` is the file stem.
pub fn heuristic_brief(path: &Path, text: &str) -> Brief {
    let project_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Brief {
        project_name,
        one_liner: one_liner(text),
        heuristic: true,
        ..Brief::default()
    }
}
