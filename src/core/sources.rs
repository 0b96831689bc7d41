use std::path::Path;

use crate::error::{WatchError, Result};

/// Read a newline-delimited list (URLs or mail recipients). Lines are
/// trimmed and blank lines dropped; a missing file is a configuration error.
pub fn load_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WatchError::Config(format!("cannot read list {}: {}", path.display(), e))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_blank_lines_are_ignored() {
        let dir = assert_fs::TempDir::new().unwrap();
        let file = dir.child("urls.txt");
        file.write_str("https://a.example\n\n  \r\nhttps://b.example/ \r\n").unwrap();

        let urls = load_list(file.path()).unwrap();
        assert_eq!(urls, vec!["https://a.example", "https://b.example/"]);
    }

    #[test]
    fn test_missing_list_is_config_error() {
        let dir = assert_fs::TempDir::new().unwrap();
        let result = load_list(&dir.path().join("emails.txt"));
        assert!(matches!(result, Err(WatchError::Config(_))));
    }
}
