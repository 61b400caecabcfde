use std::collections::{BTreeSet, HashSet};

/// Technology skills recognised in posting text.
pub const COMMON_SKILLS: &[&str] = &[
    // languages
    "python", "java", "javascript", "js", "typescript", "ts", "c#", "c++", "rust", "golang",
    "ruby", "php", "kotlin", "swift", "scala",
    // frameworks
    "react", "angular", "vue", "node", "node.js", "django", "flask", "spring", "express",
    "next.js", ".net",
    // data stores
    "sql", "nosql", "mongodb", "postgresql", "mysql", "oracle", "redis", "elasticsearch",
    // cloud and ops
    "aws", "azure", "gcp", "docker", "kubernetes", "terraform", "git", "ci/cd", "jenkins",
    "github", "gitlab", "linux",
    // data and ml
    "machine learning", "ml", "ai", "deep learning", "nlp", "data science", "data analysis",
    "statistics", "data visualization", "pandas", "spark",
    // web
    "html", "css", "sass", "less",
    // practice
    "agile", "scrum", "kanban", "jira", "rest api", "restful", "graphql", "microservices",
    "testing", "tdd", "junit", "selenium",
];

fn is_plain_word(skill: &str) -> bool {
    skill.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Skills mentioned in `text`, sorted and de-duplicated.
///
/// Plain single-word skills must match a whole token so that "ts" does not
/// fire on "requirements"; phrases and symbol-bearing skills ("c++", "ci/cd")
/// match as substrings.
pub fn extract_skills(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let tokens: HashSet<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let found: BTreeSet<&str> = COMMON_SKILLS
        .iter()
        .copied()
        .filter(|skill| {
            if is_plain_word(skill) {
                tokens.contains(skill)
            } else {
                lower.contains(skill)
            }
        })
        .collect();

    found.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_words_and_phrases() {
        let skills = extract_skills(
            "We use Python, Django and PostgreSQL on AWS. Experience with CI/CD \
             and machine learning is a plus. C++ welcome.",
        );
        assert_eq!(
            skills,
            vec![
                "aws",
                "c++",
                "ci/cd",
                "django",
                "machine learning",
                "postgresql",
                "python",
            ]
        );
    }

    #[test]
    fn test_no_partial_word_matches() {
        let skills = extract_skills("Requirements: strong communication, leadership");
        assert!(skills.is_empty(), "{skills:?}");
    }

    #[test]
    fn test_empty_text() {
        assert!(extract_skills("").is_empty());
    }
}
