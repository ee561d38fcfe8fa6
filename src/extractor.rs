use crate::candidate::Contacts;
use crate::error::ConfigError;
use regex::Regex;

pub const DEFAULT_EMAIL_PATTERN: &str = r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}";
// Domestic (0X-XXXX-XXXX, full-width dashes included) and international forms.
pub const DEFAULT_PHONE_PATTERN: &str =
    r"(?:\+\d{1,3}[-.\s]?)?\(?0?\d{1,4}\)?[-.\s‐－ー]?\d{1,4}[-.\s‐－ー]?\d{3,4}";

const IMAGE_SUFFIXES: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// Contact regexes shared by every site adapter.
#[derive(Debug, Clone)]
pub struct Extractor {
    email_regex: Regex,
    phone_regex: Regex,
    count_regex: Regex,
    number_regex: Regex,
}

impl Extractor {
    pub fn new() -> Self {
        Extractor::with_patterns(None, None).expect("default contact patterns compile")
    }

    pub fn with_patterns(phone: Option<&str>, email: Option<&str>) -> Result<Self, ConfigError> {
        let phone_regex = Regex::new(phone.unwrap_or(DEFAULT_PHONE_PATTERN)).map_err(|source| {
            ConfigError::Pattern {
                field: "phonePattern",
                source,
            }
        })?;
        let email_regex = Regex::new(email.unwrap_or(DEFAULT_EMAIL_PATTERN)).map_err(|source| {
            ConfigError::Pattern {
                field: "emailPattern",
                source,
            }
        })?;
        Ok(Extractor {
            email_regex,
            phone_regex,
            count_regex: Regex::new(r"(\d[\d,]*)\s*(?:名|人|people|persons?)").expect("static pattern"),
            number_regex: Regex::new(r"\d[\d,]*").expect("static pattern"),
        })
    }

    /// Emails in document order, lowercased, image file names excluded.
    pub fn extract_emails(&self, text: &str) -> Vec<String> {
        let mut emails = Vec::new();
        for m in self.email_regex.find_iter(text) {
            let email = m.as_str().to_lowercase();
            if IMAGE_SUFFIXES.iter().any(|s| email.ends_with(s)) {
                continue;
            }
            if !emails.contains(&email) {
                emails.push(email);
            }
        }
        emails
    }

    /// Phone numbers in document order; matches with fewer than 10 or more
    /// than 13 digits are discarded.
    pub fn extract_phones(&self, text: &str) -> Vec<String> {
        let mut phones = Vec::new();
        for m in self.phone_regex.find_iter(text) {
            let p = m.as_str().trim().to_string();
            let digits = p.chars().filter(|c| c.is_ascii_digit()).count();
            if (10..=13).contains(&digits) && !phones.contains(&p) {
                phones.push(p);
            }
        }
        phones
    }

    /// First phone and first email found in `text`.
    pub fn contacts(&self, text: &str) -> Contacts {
        Contacts {
            phone: self.extract_phones(text).into_iter().next(),
            email: self.extract_emails(text).into_iter().next(),
        }
    }

    /// Mean of the per-year hire counts in a hiring-results cell, e.g.
    /// "2023: 12名 / 2022: 8名" gives 10.0.
    pub fn average_hires(&self, text: &str) -> Option<f64> {
        let counts: Vec<f64> = self
            .count_regex
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
            .collect();
        if counts.is_empty() {
            return None;
        }
        Some(counts.iter().sum::<f64>() / counts.len() as f64)
    }

    /// First integer in the text ("1,200名" gives 1200).
    pub fn first_number(&self, text: &str) -> Option<u64> {
        self.number_regex
            .find(text)
            .and_then(|m| m.as_str().replace(',', "").parse().ok())
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::new()
    }
}

/// Headcount bracket used in the ledger.
pub fn size_bracket(employees: u64) -> &'static str {
    match employees {
        0..=49 => "1-49",
        50..=299 => "50-299",
        300..=999 => "300-999",
        _ => "1000+",
    }
}
