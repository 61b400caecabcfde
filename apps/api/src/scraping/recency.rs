//! Posting age parsed from the free-text dates boards publish
//! ("3 days ago", "yesterday", "2024-05-01").

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostedAge {
    Today,
    Yesterday,
    Days(u32),
    /// Mentions days but carries no number.
    UnparsedDays,
    Weeks(u32),
    Months(u32),
    Unknown,
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

fn days_ago_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bdays?\s+ago\b").expect("static regex"))
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})").expect("static regex"))
}

fn first_number(text: &str) -> Option<u32> {
    number_re().find(text).and_then(|m| m.as_str().parse().ok())
}

impl PostedAge {
    pub fn parse(raw: &str, today: NaiveDate) -> Self {
        if let Some(caps) = iso_date_re().captures(raw) {
            if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
                return Self::from_days((today - date).num_days());
            }
        }

        let text = raw.to_lowercase();
        if text.contains("just now")
            || text.contains("today")
            || text.contains("hour")
            || text.contains("minute")
        {
            PostedAge::Today
        } else if text.contains("yesterday") {
            PostedAge::Yesterday
        } else if days_ago_re().is_match(&text) {
            match first_number(&text) {
                Some(days) => PostedAge::Days(days),
                None => PostedAge::UnparsedDays,
            }
        } else if text.contains("week") {
            PostedAge::Weeks(first_number(&text).unwrap_or(1))
        } else if text.contains("month") {
            PostedAge::Months(first_number(&text).unwrap_or(1))
        } else {
            PostedAge::Unknown
        }
    }

    fn from_days(days: i64) -> Self {
        match days {
            d if d <= 0 => PostedAge::Today,
            1 => PostedAge::Yesterday,
            d => PostedAge::Days(u32::try_from(d).unwrap_or(u32::MAX)),
        }
    }

    /// Freshness in `[0.1, 1.0]`.
    pub fn score(&self) -> f64 {
        match *self {
            PostedAge::Today => 1.0,
            PostedAge::Yesterday => 0.9,
            PostedAge::Days(d) => (1.0 - f64::from(d) / 30.0).max(0.5),
            PostedAge::UnparsedDays => 0.5,
            PostedAge::Weeks(_) => 0.4,
            PostedAge::Months(_) => 0.2,
            PostedAge::Unknown => 0.1,
        }
    }

    /// Approximate age in days; lower sorts as newer.
    pub fn sort_key(&self) -> u32 {
        match *self {
            PostedAge::Today => 0,
            PostedAge::Yesterday => 1,
            PostedAge::Days(d) => d,
            PostedAge::UnparsedDays => 1000,
            PostedAge::Weeks(n) => n.saturating_mul(7),
            PostedAge::Months(n) => n.saturating_mul(30),
            PostedAge::Unknown => 9999,
        }
    }
}
