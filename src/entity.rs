use crate::browser::{Link, PageQuery};
use crate::candidate::{select_best, CompanyCandidate, CourseCandidate, RecordStatus};
use crate::error::CrawlError;
use crate::extractor::Extractor;
use crate::ledger::{DedupLedger, LedgerWriter};
use crate::relay::Relay;
use crate::site::SiteAdapter;
use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    Inserted,
    /// Identity turned out to be known after visiting the company.
    Duplicate,
    /// Known before navigating; nothing was fetched.
    Skipped,
    Failed,
}

/// Ledger file plus the optional remote relay.
pub struct RecordSink {
    writer: LedgerWriter,
    relay: Option<Relay>,
}

impl RecordSink {
    pub fn new(writer: LedgerWriter, relay: Option<Relay>) -> Self {
        RecordSink { writer, relay }
    }

    /// Flushes the row locally, then relays it. The relay is attempted
    /// whatever the local write did, and its failure never fails the call.
    pub fn persist(&mut self, row: &[String]) -> Result<(), CrawlError> {
        let written = self.writer.append(row);
        if let Some(relay) = &self.relay {
            relay.send(row);
        }
        written
    }
}

pub struct EntityExtractor<'a> {
    adapter: &'a dyn SiteAdapter,
    extractor: &'a Extractor,
    ledger: &'a DedupLedger,
    sink: &'a mut RecordSink,
}

impl<'a> EntityExtractor<'a> {
    pub fn new(
        adapter: &'a dyn SiteAdapter,
        extractor: &'a Extractor,
        ledger: &'a DedupLedger,
        sink: &'a mut RecordSink,
    ) -> Self {
        EntityExtractor {
            adapter,
            extractor,
            ledger,
            sink,
        }
    }

    /// Never returns an error: any failure is logged and reported as
    /// [`EntityOutcome::Failed`].
    pub fn process(&mut self, page: &dyn PageQuery, link: &Link) -> EntityOutcome {
        if self.ledger.exists(&link.text) {
            info!("Skip (already captured): {}", link.text.trim());
            return EntityOutcome::Skipped;
        }

        let candidate = match self.build(page, link) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to extract '{}': {}", link.text.trim(), e);
                return EntityOutcome::Failed;
            }
        };
        self.persist(candidate)
    }

    fn build(&self, page: &dyn PageQuery, link: &Link) -> Result<CompanyCandidate, CrawlError> {
        page.goto(&link.href)?;

        let raw_name = self
            .adapter
            .canonical_name(page)
            .unwrap_or_else(|| link.text.clone());
        let identity = self.ledger.normalize(&raw_name);
        let attributes = self.adapter.extract_attributes(page, self.extractor);
        let source_url = page.current_url();

        let Some(detail_url) = self.adapter.detail_url(page) else {
            info!("No detail listing for '{}'.", identity);
            return Ok(CompanyCandidate::new(
                &raw_name,
                identity,
                attributes,
                &source_url,
                RecordStatus::NoDetail,
                None,
            ));
        };

        page.goto(&detail_url)?;
        let course_links = self.adapter.course_links(page);
        let best = if course_links.is_empty() {
            CourseCandidate {
                url: detail_url.clone(),
                contacts: self.adapter.extract_contacts(page, self.extractor),
            }
        } else {
            let courses = self.collect_courses(page, &course_links);
            match select_best(courses) {
                Some(c) => c,
                // Every course page failed to load; fall back to the listing.
                None => {
                    page.goto(&detail_url)?;
                    CourseCandidate {
                        url: detail_url.clone(),
                        contacts: self.adapter.extract_contacts(page, self.extractor),
                    }
                }
            }
        };

        Ok(CompanyCandidate::new(
            &raw_name,
            identity,
            attributes,
            &source_url,
            RecordStatus::Ok,
            Some(&best.contacts),
        ))
    }

    /// Visits course pages in order and stops at the first one that has
    /// both phone and email.
    fn collect_courses(&self, page: &dyn PageQuery, links: &[Link]) -> Vec<CourseCandidate> {
        let mut courses = Vec::with_capacity(links.len());
        for link in links {
            if let Err(e) = page.goto(&link.href) {
                warn!("Course page {} failed: {}", link.href, e);
                continue;
            }
            let course = CourseCandidate {
                url: link.href.clone(),
                contacts: self.adapter.extract_contacts(page, self.extractor),
            };
            let complete = course.is_complete();
            courses.push(course);
            if complete {
                break;
            }
        }
        courses
    }

    fn persist(&mut self, candidate: CompanyCandidate) -> EntityOutcome {
        if self.ledger.check_and_insert(&candidate.raw_name) {
            info!("Duplicate: {}", candidate.identity);
            return EntityOutcome::Duplicate;
        }
        let row = candidate.to_row();
        match self.sink.persist(&row) {
            Ok(()) => {
                info!(
                    "Saved: {} | {} | {}",
                    candidate.display_name(),
                    candidate.phone,
                    candidate.email
                );
                EntityOutcome::Inserted
            }
            Err(e) => {
                error!("Failed to write ledger row for {}: {}", candidate.display_name(), e);
                EntityOutcome::Failed
            }
        }
    }
}
