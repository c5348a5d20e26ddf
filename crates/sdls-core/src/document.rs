//! Splitting documents into entries and joining them back.
//!
//! Documents on disk are either a JSON array of entry objects or, for
//! constants categories, one bare object. The engine works per entry, so array
//! documents have their brackets stripped and the body is cut at top-level
//! commas.
//!
//! Splitting is textual, so a malformed entry stays isolated in its own
//! segment and the rest of the document still parses.

/// Separator placed between entries by [`join`].
pub const ENTRY_SEPARATOR: &str = ",";

/// Split a comma-separated run of top-level JSON values into trimmed segments.
///
/// A comma only separates entries when it sits outside every `{...}` span and
/// outside string literals. Square brackets are not counted, so commas inside
/// a bare top-level array split it. Segments that are bare scalars come back
/// as-is. Empty input yields a single empty segment; callers skip empty
/// segments before parsing.
///
/// ```
/// use sdls_core::document::split_top_level_objects;
///
/// let parts = split_top_level_objects(r#"{"a":1},{"b":{"c":2}},3"#);
/// assert_eq!(parts, [r#"{"a":1}"#, r#"{"b":{"c":2}}"#, "3"]);
/// ```
#[must_use]
pub fn split_top_level_objects(text: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                entries.push(text[start..i].trim().to_owned());
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(text[start..].trim().to_owned());
    entries
}

/// Join entries with `separator`. No validation is performed.
#[must_use]
pub fn join(entries: &[String], separator: &str) -> String {
    entries.join(separator)
}

/// Remove surrounding whitespace, a UTF-8 byte-order mark, and one pair of
/// enclosing array brackets if present.
#[must_use]
pub fn strip_array_brackets(text: &str) -> &str {
    let trimmed = trim_document(text);
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map_or(trimmed, str::trim)
}

/// Wrap an already-joined body in array brackets.
#[must_use]
pub fn wrap_array(body: &str) -> String {
    format!("[{body}]")
}

fn trim_document(text: &str) -> &str {
    text.trim_start_matches('\u{feff}').trim()
}

/// How a category's documents are framed on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentShape {
    /// `[entry, entry, ...]`
    Array,
    /// A single bare object.
    Constants,
}

impl DocumentShape {
    /// Remove on-disk framing, leaving the entry body.
    #[must_use]
    pub fn unwrap<'a>(self, text: &'a str) -> &'a str {
        match self {
            Self::Array => strip_array_brackets(text),
            Self::Constants => trim_document(text),
        }
    }

    /// Re-apply on-disk framing to a joined body.
    #[must_use]
    pub fn wrap(self, body: &str) -> String {
        match self {
            Self::Array => wrap_array(body),
            Self::Constants => body.to_owned(),
        }
    }

    /// Cut a body into entry segments. Constants documents are never split.
    #[must_use]
    pub fn split(self, body: &str) -> Vec<String> {
        match self {
            Self::Array => split_top_level_objects(body),
            Self::Constants => vec![body.trim().to_owned()],
        }
    }
}
