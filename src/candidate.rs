use chrono::Local;

pub const NOT_FOUND: &str = "not found";
pub const EXTRACTION_FAILED: &str = "extraction failed";
/// Ledger label for companies whose name could not be read.
pub const UNNAMED: &str = "(unnamed company)";

/// Best-effort auxiliary attributes of a company.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub industry: String,
    pub head_office: String,
    pub company_size: String,
    pub avg_hires: String,
    /// `key: value` pairs of the outline table joined with ` | `.
    pub detail_table: String,
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes {
            industry: EXTRACTION_FAILED.to_string(),
            head_office: EXTRACTION_FAILED.to_string(),
            company_size: EXTRACTION_FAILED.to_string(),
            avg_hires: String::new(),
            detail_table: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contacts {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// One program/course sub-page of a company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseCandidate {
    pub url: String,
    pub contacts: Contacts,
}

impl CourseCandidate {
    /// 3 = phone and email, 2 = phone only, 1 = email only, 0 = neither.
    pub fn score(&self) -> u8 {
        match (self.contacts.phone.is_some(), self.contacts.email.is_some()) {
            (true, true) => 3,
            (true, false) => 2,
            (false, true) => 1,
            (false, false) => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.score() == 3
    }
}

/// Stable sort by descending score and take the head, so ties keep
/// encounter order.
pub fn select_best(mut courses: Vec<CourseCandidate>) -> Option<CourseCandidate> {
    courses.sort_by(|a, b| b.score().cmp(&a.score()));
    courses.into_iter().next()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Ok,
    /// The detail listing could not be derived; no contact lookup happened.
    NoDetail,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Ok => "ok",
            RecordStatus::NoDetail => "no_detail",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyCandidate {
    pub raw_name: String,
    pub identity: String,
    pub phone: String,
    pub email: String,
    pub attributes: Attributes,
    pub source_url: String,
    pub status: RecordStatus,
}

impl CompanyCandidate {
    pub fn new(
        raw_name: &str,
        identity: String,
        attributes: Attributes,
        source_url: &str,
        status: RecordStatus,
        contacts: Option<&Contacts>,
    ) -> Self {
        let phone = contacts.and_then(|c| c.phone.clone());
        let email = contacts.and_then(|c| c.email.clone());
        CompanyCandidate {
            raw_name: raw_name.to_string(),
            identity,
            phone: phone.unwrap_or_else(|| NOT_FOUND.to_string()),
            email: email.unwrap_or_else(|| NOT_FOUND.to_string()),
            attributes,
            source_url: source_url.to_string(),
            status,
        }
    }

    /// Name written to the ledger: the normalized identity, or a fixed
    /// label when the page gave none.
    pub fn display_name(&self) -> &str {
        if self.identity.is_empty() {
            UNNAMED
        } else {
            &self.identity
        }
    }

    /// Row in [`LEDGER_HEADER`](crate::ledger::LEDGER_HEADER) order.
    pub fn to_row(&self) -> Vec<String> {
        self.to_row_at(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
    }

    pub fn to_row_at(&self, captured_at: &str) -> Vec<String> {
        let a = &self.attributes;
        vec![
            self.display_name().to_string(),
            self.phone.clone(),
            self.email.clone(),
            a.industry.clone(),
            a.head_office.clone(),
            a.company_size.clone(),
            a.avg_hires.clone(),
            self.source_url.clone(),
            a.detail_table.clone(),
            self.status.as_str().to_string(),
            captured_at.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LEDGER_HEADER;

    fn course(url: &str, phone: bool, email: bool) -> CourseCandidate {
        CourseCandidate {
            url: url.to_string(),
            contacts: Contacts {
                phone: phone.then(|| "03-1234-5678".to_string()),
                email: email.then(|| "hr@example.com".to_string()),
            },
        }
    }

    #[test]
    fn scores_follow_completeness() {
        assert_eq!(course("a", true, true).score(), 3);
        assert_eq!(course("a", true, false).score(), 2);
        assert_eq!(course("a", false, true).score(), 1);
        assert_eq!(course("a", false, false).score(), 0);
    }

    #[test]
    fn best_course_wins_regardless_of_position() {
        let picked = select_best(vec![
            course("zero", false, false),
            course("two", true, false),
            course("three", true, true),
            course("one", false, true),
        ]);
        assert_eq!(picked.map(|c| c.url), Some("three".to_string()));
    }

    #[test]
    fn ties_keep_encounter_order() {
        let picked = select_best(vec![
            course("first", false, true),
            course("second", false, true),
        ]);
        assert_eq!(picked.map(|c| c.url), Some("first".to_string()));
        assert_eq!(select_best(Vec::new()), None);
    }

    #[test]
    fn missing_contacts_become_markers() {
        let c = CompanyCandidate::new(
            "Acme",
            "Acme".into(),
            Attributes::default(),
            "https://example.com/acme",
            RecordStatus::NoDetail,
            None,
        );
        let row = c.to_row_at("2024-01-01 00:00:00");
        assert_eq!(row.len(), LEDGER_HEADER.len());
        assert_eq!(row[1], NOT_FOUND);
        assert_eq!(row[2], NOT_FOUND);
        assert_eq!(row[3], EXTRACTION_FAILED);
        assert_eq!(row[9], "no_detail");
    }

    #[test]
    fn empty_identity_uses_fallback_label() {
        let c = CompanyCandidate::new("", String::new(), Attributes::default(), "", RecordStatus::Ok, None);
        assert_eq!(c.to_row_at("t")[0], UNNAMED);
    }
}
