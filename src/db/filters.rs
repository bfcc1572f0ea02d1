use mongodb::bson::Regex;

/// Escape regex metacharacters so user input matches literally.
pub fn escape_regex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Case-insensitive substring match.
pub fn contains_ci(value: &str) -> Regex {
    Regex {
        pattern: escape_regex(value.trim()),
        options: "i".to_string(),
    }
}

/// Case-insensitive whole-value match.
pub fn equals_ci(value: &str) -> Regex {
    Regex {
        pattern: format!("^{}$", escape_regex(value.trim())),
        options: "i".to_string(),
    }
}

/// In-memory counterpart of [`equals_ci`].
pub fn same_ci(stored: &str, wanted: &str) -> bool {
    stored.to_lowercase() == wanted.trim().to_lowercase()
}
