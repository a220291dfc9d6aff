//! Utility functions for link parsing and file handling

use regex::Regex;
use std::path::Path;

/// Characters that are not allowed in a download's file name
const FORBIDDEN_FILE_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Get a named capture group from the first match of `re` in `text`
///
/// Returns `None` when there is no match or the group matched an empty string.
///
/// # Examples
///
/// ```
/// use pack_builder::utils::regex_group;
/// use regex::Regex;
///
/// let re = Regex::new(r"resources/.+?\.(?P<id>[0-9]*)").unwrap();
/// assert_eq!(regex_group(&re, "id", "resources/example.123"), Some("123".to_string()));
/// assert_eq!(regex_group(&re, "id", "resources/example."), None);
/// ```
pub fn regex_group(re: &Regex, name: &str, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.name(name))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Make a display name usable as a file name
///
/// Path separators and characters rejected by common filesystems are replaced
/// with `_`, surrounding whitespace and dots are trimmed. An empty result
/// becomes `"plugin"`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN_FILE_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_matches('.');
    if trimmed.is_empty() {
        "plugin".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Remove a directory tree, treating a missing directory as success
pub async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
