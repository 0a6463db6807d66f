//! Shared utilities: text sanitization and small formatting helpers.

/// Text sanitization for persisted JSON.
pub mod sanitize;

/// Builds a concise document-group title from a mission request.
///
/// Uses the first line of the request, truncated to leave room for the
/// `R: ` prefix (max ~50 chars total).
pub fn group_title(user_request: &str) -> String {
    const MAX_LENGTH: usize = 45;

    let first_line = user_request.lines().next().unwrap_or(user_request).trim();

    if first_line.chars().count() > MAX_LENGTH {
        let truncated: String = first_line.chars().take(MAX_LENGTH).collect();
        format!("R: {}...", truncated)
    } else {
        format!("R: {}", first_line)
    }
}

/// Extracts a report title from the first `# ` markdown heading, if any.
pub fn extract_report_title(report: &str) -> Option<String> {
    report.lines().find_map(|line| {
        line.trim()
            .strip_prefix("# ")
            .map(|title| title.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_title_short_request() {
        assert_eq!(group_title("History of the transistor"), "R: History of the transistor");
    }

    #[test]
    fn test_group_title_uses_first_line() {
        let request = "Compare RISC-V vector extensions\nwith additional context below";
        assert_eq!(group_title(request), "R: Compare RISC-V vector extensions");
    }

    #[test]
    fn test_group_title_truncates_long_request() {
        let request = "a".repeat(100);
        let title = group_title(&request);
        assert!(title.starts_with("R: "));
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 3 + 45 + 3);
    }

    #[test]
    fn test_extract_report_title() {
        let report = "\n# Quantum Error Correction\n\nBody text";
        assert_eq!(
            extract_report_title(report),
            Some("Quantum Error Correction".to_string())
        );
        assert_eq!(extract_report_title("no heading here"), None);
        // Only a level-1 heading counts
        assert_eq!(extract_report_title("## Subsection"), None);
    }
}
