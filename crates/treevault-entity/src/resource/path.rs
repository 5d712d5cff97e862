//! Relative path and name rules.

use treevault_core::error::AppError;
use treevault_core::result::AppResult;

/// Maximum length of a single path segment.
pub const MAX_NAME_LEN: usize = 255;

/// Build a child's store-relative path from its parent's.
///
/// The store root has the empty path, so its children are `/name`.
pub fn join_relative_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

/// Reject names that cannot be a single path segment.
pub fn validate_name(name: &str) -> AppResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if trimmed != name {
        return Err(AppError::validation(
            "Name cannot start or end with whitespace",
        ));
    }
    if name == "." || name == ".." {
        return Err(AppError::validation(format!("'{name}' is a reserved name")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(AppError::validation(format!(
            "Name '{name}' contains a path separator"
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "Name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_from_root() {
        assert_eq!(join_relative_path("", "docs"), "/docs");
        assert_eq!(join_relative_path("/docs", "a.txt"), "/docs/a.txt");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(" padded").is_err());
    }
}
