//! Keyword heuristics over posting text: job type, seniority, requirement
//! lines and the employer name.

use std::sync::OnceLock;

use regex::Regex;

pub const DEFAULT_JOB_TYPE: &str = "full-time";
pub const UNKNOWN_EXPERIENCE: &str = "not-specified";

const JOB_TYPE_PATTERNS: &[(&str, &[&str])] = &[
    ("full-time", &["full time", "full-time", "fulltime", "permanent"]),
    ("part-time", &["part time", "part-time", "parttime"]),
    ("contract", &["contract", "temporary", "fixed term", "fixed-term", "freelance"]),
    ("internship", &["internship", "intern", "graduate program"]),
];

/// Markers that open the requirements part of a posting.
const REQUIREMENT_MARKERS: &[&str] = &[
    "requirements",
    "qualifications",
    "what you'll need",
    "what you will need",
    "what we're looking for",
    "skills",
];

/// Hosts that never name the employer.
const JOB_BOARD_DOMAINS: &[&str] = &[
    "linkedin", "indeed", "seek", "glassdoor", "monster", "ziprecruiter", "careerbuilder",
    "simplyhired", "dice", "lever", "greenhouse", "workday", "myworkdayjobs", "smartrecruiters",
    "jobs", "careers", "www", "apply", "boards",
];

fn years_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*\+?\s*(?:years?|yrs?)").expect("static regex")
    })
}

fn company_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"(?i)^about\s+(.{2,60}?)[:.!]?$",
            r"(?i)^(.{2,60}?)\s+is\s+(?:hiring|looking|seeking)\b",
            r"(?i)welcome\s+to\s+(.{2,60}?)[.!,]",
            r"(?i)join\s+(?:the\s+)?(.{2,60}?)\s+(?:team|today|now)\b",
            r"(?i)work(?:ing)?\s+(?:at|with|for)\s+(.{2,60}?)[.,!]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

/// Phrases the company patterns capture that are not employers.
const NOT_A_COMPANY: &[&str] = &[
    "us", "the role", "the team", "the job", "this role", "you", "the position", "the company",
    "our team", "the opportunity",
];

/// Explicit job type mentioned in `text`, if any.
pub fn job_type_hint(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    JOB_TYPE_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(job_type, _)| *job_type)
}

pub fn detect_job_type(text: &str) -> &'static str {
    job_type_hint(text).unwrap_or(DEFAULT_JOB_TYPE)
}

/// Seniority from title keywords, then from the largest "N years" mention.
pub fn detect_experience_level(title: &str, description: &str) -> &'static str {
    let text = format!("{title} {description}").to_lowercase();
    let has_word = |w: &str| {
        text.split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '-'))
            .any(|token| token == w)
    };

    if ["senior", "sr.", "lead", "principal", "staff"].iter().any(|&w| has_word(w)) {
        return "senior";
    }
    if ["mid-level", "mid", "intermediate"].iter().any(|&w| has_word(w)) {
        return "mid-level";
    }
    if ["junior", "jr.", "entry", "entry-level", "graduate"].iter().any(|&w| has_word(w)) {
        return "entry-level";
    }

    let max_years = years_re()
        .captures_iter(&text)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max();
    match max_years {
        Some(years) if years >= 5 => "senior",
        Some(years) if years >= 3 => "mid-level",
        Some(_) => "entry-level",
        None => UNKNOWN_EXPERIENCE,
    }
}

/// Byte offset of the earliest requirements marker in `text`.
pub fn requirements_start(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    REQUIREMENT_MARKERS
        .iter()
        .filter_map(|marker| lower.find(marker))
        .min()
}

/// Up to `max` bullet-ish lines longer than ten characters.
pub fn extract_requirements(section: &str, max: usize) -> Vec<String> {
    section
        .split(['•', '\n', '★', '·', '*'])
        .flat_map(|line| line.split(" - "))
        .map(|line| line.trim().trim_start_matches('-').trim())
        .filter(|line| line.chars().count() > 10)
        .filter(|line| requirements_start(line) != Some(0) || line.chars().count() > 40)
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Employer named in the posting body, via phrase patterns.
pub fn company_from_text(text: &str) -> Option<String> {
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        for re in company_patterns() {
            if let Some(caps) = re.captures(line) {
                let candidate = caps[1].trim().trim_matches(|c: char| !c.is_alphanumeric());
                if candidate.len() >= 2
                    && !NOT_A_COMPANY.contains(&candidate.to_lowercase().as_str())
                {
                    return Some(candidate.to_string());
                }
            }
        }
    }
    None
}

/// "Backend Engineer at Acme" → "Acme".
pub fn company_from_title(title: &str) -> Option<String> {
    let idx = title.to_ascii_lowercase().rfind(" at ")?;
    let company = title[idx + 4..]
        .split(['|', '-', '('])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    (!company.is_empty()).then(|| company.to_string())
}

/// "careers.acme.com" → "Acme", skipping job-board and generic labels.
pub fn company_from_host(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return None;
    }
    // drop the public suffix, keeping "co"/"com" style second levels out too
    let mut candidates: Vec<&str> = labels[..labels.len() - 1].to_vec();
    while candidates
        .last()
        .is_some_and(|l| matches!(*l, "co" | "com" | "org" | "net" | "gov" | "edu"))
    {
        candidates.pop();
    }
    let name = candidates.last()?;
    if JOB_BOARD_DOMAINS.iter().any(|d| name.eq_ignore_ascii_case(d)) {
        return None;
    }
    let mut chars = name.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
