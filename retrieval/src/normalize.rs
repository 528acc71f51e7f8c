use serde::{Deserialize, Serialize};

/// Switches for [`normalize`]; the steps always run in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    #[serde(default = "default_true")]
    pub lowercase: bool,

    #[serde(default = "default_true")]
    pub trim_whitespace: bool,

    /// Collapse whitespace runs to a single space
    #[serde(default = "default_true")]
    pub remove_extra_spaces: bool,

    /// Replace everything outside `[a-zA-Z0-9\s]` with a space
    #[serde(default)]
    pub remove_special_chars: bool,

    /// Keep `-` when removing special characters
    #[serde(default = "default_true")]
    pub preserve_hyphens: bool,

    /// Keep `_` when removing special characters
    #[serde(default)]
    pub preserve_underscores: bool,

    /// When false, digit runs are deleted
    #[serde(default = "default_true")]
    pub preserve_numbers: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            trim_whitespace: true,
            remove_extra_spaces: true,
            remove_special_chars: false,
            preserve_hyphens: true,
            preserve_underscores: false,
            preserve_numbers: true,
        }
    }
}

/// Canonical form of a raw query, produced once and shared by both channels
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub normalized: String,
    pub original: String,
}

impl NormalizedQuery {
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Normalize a raw query. Never fails: empty input yields empty strings.
pub fn normalize(raw: &str, options: &NormalizeOptions) -> NormalizedQuery {
    if raw.is_empty() {
        return NormalizedQuery::default();
    }

    NormalizedQuery {
        normalized: normalize_text(raw, options),
        original: raw.to_string(),
    }
}

/// The string transform behind [`normalize`]
pub fn normalize_text(text: &str, options: &NormalizeOptions) -> String {
    let mut normalized = if options.trim_whitespace {
        text.trim().to_string()
    } else {
        text.to_string()
    };

    if options.remove_extra_spaces {
        normalized = collapse_whitespace(&normalized);
    }

    if options.lowercase {
        normalized = normalized.to_lowercase();
    }

    if options.remove_special_chars {
        let replaced: String = normalized
            .chars()
            .map(|c| if is_kept_char(c, options) { c } else { ' ' })
            .collect();
        normalized = collapse_whitespace(&replaced).trim().to_string();
    }

    if !options.preserve_numbers {
        let stripped: String = normalized.chars().filter(|c| !c.is_ascii_digit()).collect();
        normalized = collapse_whitespace(&stripped).trim().to_string();
    }

    normalized
}

fn is_kept_char(c: char, options: &NormalizeOptions) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || (c == '-' && options.preserve_hyphens)
        || (c == '_' && options.preserve_underscores)
}

/// Replace every whitespace run with one space, keeping a single space at the edges.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}
