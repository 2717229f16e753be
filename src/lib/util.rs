//! String helpers shared by the syntaxes and the graph builder.

use std::collections::HashMap;

fn invalid_name_char(c: char) -> bool {
    !c.is_ascii_alphanumeric() && c != '_'
}

/// Replace every character that cannot appear in an identifier by `replace`.
pub fn create_valid_name(name: &str, replace: char) -> String {
    name.chars()
        .map(|c| if invalid_name_char(c) { replace } else { c })
        .collect()
}

/// Check that `name` only contains identifier characters.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(invalid_name_char)
}

/// Increment the numeric suffix of a name, or append `2` if it has none.
///
/// # Example
/// ```
/// use shadergen::util::increment_name;
///
/// assert_eq!(increment_name("add_out"), "add_out2");
/// assert_eq!(increment_name("add_out2"), "add_out3");
/// assert_eq!(increment_name("mix19"), "mix20");
/// ```
pub fn increment_name(name: &str) -> String {
    let split = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();

    if split < name.len() {
        let (prefix, suffix) = name.split_at(split);
        if let Ok(number) = suffix.parse::<u64>() {
            return format!("{prefix}{}", number + 1);
        }
    }

    format!("{name}2")
}

/// Split on any of the characters in `separators`, dropping empty parts.
pub fn split_string(text: &str, separators: &str) -> Vec<String> {
    text.split(|c| separators.contains(c))
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Replace every occurrence of each key by its value, left to right, without re-scanning
/// replaced text.
pub fn replace_substrings(text: &str, substitutions: &HashMap<String, String>) -> String {
    let mut result = text.to_owned();

    for (from, to) in substitutions.iter().filter(|(from, _)| !from.is_empty()) {
        let mut pos = 0;
        while let Some(found) = result[pos..].find(from.as_str()) {
            let start = pos + found;
            result.replace_range(start..start + from.len(), to);
            pos = start + to.len();
        }
    }

    result
}
