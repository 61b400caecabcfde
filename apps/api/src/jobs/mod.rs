//! Tracked job applications and scraped postings.

pub mod handlers;
pub mod repository;

pub use repository::{save_scraped_jobs, PersistSummary};

/// Comma-separated skill filter, lower-cased. Empty input means no filter.
pub fn parse_skill_filter(raw: Option<&str>) -> Option<Vec<String>> {
    let skills: Vec<String> = raw?
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    (!skills.is_empty()).then_some(skills)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skill_filter() {
        assert_eq!(
            parse_skill_filter(Some("Rust, SQL ,,")),
            Some(vec!["rust".to_string(), "sql".to_string()])
        );
        assert_eq!(parse_skill_filter(Some(" , ")), None);
        assert_eq!(parse_skill_filter(None), None);
    }
}
