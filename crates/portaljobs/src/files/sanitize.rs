//! Validation of user-supplied file name components.

use std::path::Path;

use crate::error::ResolveError;

/// Rejects names that could escape the downloads directory.
///
/// Applied to every file name and site component taken from a request.
pub fn validate_component(name: &str) -> Result<&str, ResolveError> {
    if name.is_empty()
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(ResolveError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Replaces every non-alphanumeric character with `_`.
///
/// Output files embed the sanitized job id, which is how a job finds them.
pub fn sanitize_job_id(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Returns only the filename component of a path, for log fields.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_traversal() {
        for name in ["../etc/passwd", "..", "a/b.csv", "a\\b.csv", "", "x..y.csv"] {
            assert!(
                matches!(validate_component(name), Err(ResolveError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_plain_names() {
        assert_eq!(
            validate_component("WPR_2024_Week_03.csv").unwrap(),
            "WPR_2024_Week_03.csv"
        );
        assert!(validate_component("north site_demo_data.csv").is_ok());
    }

    #[test]
    fn test_sanitize_job_id() {
        assert_eq!(sanitize_job_id("vendor_job_1717"), "vendor_job_1717");
        assert_eq!(sanitize_job_id("job-1.2 x"), "job_1_2_x");
    }

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/srv/app/downloads/jonas/report.html")),
            "report.html"
        );
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }
}
