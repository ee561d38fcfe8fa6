use crate::browser::{Browser, PageQuery};
use crate::control::{Checkpoint, RunControl, RunState};
use crate::delay_manager::Delays;
use crate::entity::{EntityExtractor, EntityOutcome};
use crate::error::CrawlError;
use crate::site::{NextPage, SiteAdapter};
use log::{info, warn};

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub start_url: String,
    /// 1-based; companies on earlier pages are not processed.
    pub start_page: usize,
    pub max_inserts: Option<usize>,
    pub delays: Delays,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NoNextPage,
    NextDisabled,
    StopRequested,
    LimitReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Last page index reached.
    pub last_page: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    pub reason: StopReason,
}

pub struct PaginationDriver<'a> {
    settings: CrawlSettings,
    adapter: &'a dyn SiteAdapter,
    control: RunControl,
    entities: EntityExtractor<'a>,
    inserted: usize,
    duplicates: usize,
    skipped: usize,
    failed: usize,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        settings: CrawlSettings,
        adapter: &'a dyn SiteAdapter,
        control: RunControl,
        entities: EntityExtractor<'a>,
    ) -> Self {
        PaginationDriver {
            settings,
            adapter,
            control,
            entities,
            inserted: 0,
            duplicates: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn limit_reached(&self) -> bool {
        self.settings
            .max_inserts
            .map(|max| self.inserted >= max)
            .unwrap_or(false)
    }

    /// Runs until the pager ends, the insert cap is hit, or a stop is
    /// requested. The results surface is closed on every exit path.
    pub fn run(&mut self, browser: &dyn Browser) -> Result<CrawlReport, CrawlError> {
        let main = browser.open_page()?;
        let result = self.traverse(browser, main.as_ref());
        main.close();

        let (last_page, reason) = match result {
            Ok(done) => done,
            Err(e) => {
                self.control.update_status(|s| {
                    s.state = RunState::Failed;
                    s.log(format!("Crawl failed: {}", e));
                });
                return Err(e);
            }
        };
        let report = CrawlReport {
            last_page,
            inserted: self.inserted,
            duplicates: self.duplicates,
            skipped: self.skipped,
            failed: self.failed,
            reason,
        };
        self.control.update_status(|s| {
            s.state = RunState::Completed;
            s.log(format!("Crawl finished at page {}: {:?}", last_page, reason));
        });
        info!(
            "Crawl finished at page {} ({:?}): {} inserted, {} duplicates, {} skipped, {} failed.",
            report.last_page, report.reason, report.inserted, report.duplicates, report.skipped, report.failed
        );
        Ok(report)
    }

    fn traverse(&mut self, browser: &dyn Browser, main: &dyn PageQuery) -> Result<(usize, StopReason), CrawlError> {
        let mut page_index = 1;
        main.goto(&self.settings.start_url)?;
        self.control.update_status(|s| s.state = RunState::Running);

        loop {
            self.control.update_status(|s| s.page = page_index);
            if self.control.checkpoint() == Checkpoint::Stop {
                return Ok((page_index, StopReason::StopRequested));
            }
            if self.limit_reached() {
                return Ok((page_index, StopReason::LimitReached));
            }

            if page_index < self.settings.start_page {
                info!("Page {}: before start page {}, skipping.", page_index, self.settings.start_page);
            } else {
                if !self.adapter.wait_for_results(main) {
                    warn!("Page {}: results list did not appear.", page_index);
                }
                if let Some(reason) = self.process_page(browser, main, page_index)? {
                    return Ok((page_index, reason));
                }
            }

            match self.adapter.next_page(main) {
                NextPage::Absent => {
                    info!("Page {}: no next page.", page_index);
                    return Ok((page_index, StopReason::NoNextPage));
                }
                NextPage::Disabled => {
                    info!("Page {}: next page control disabled.", page_index);
                    return Ok((page_index, StopReason::NextDisabled));
                }
                NextPage::Available { selector, href } => {
                    page_index += 1;
                    self.settings.delays.page_delay();
                    info!("Moving to page {}.", page_index);
                    match href {
                        Some(url) => main.goto(&url)?,
                        None => main.click(&selector)?,
                    }
                }
            }
        }
    }

    /// Processes every company link of the loaded page on one shared
    /// auxiliary surface. Returns a reason when the run must end here.
    fn process_page(
        &mut self,
        browser: &dyn Browser,
        main: &dyn PageQuery,
        page_index: usize,
    ) -> Result<Option<StopReason>, CrawlError> {
        let links = self.adapter.entity_links(main);
        info!("Page {}: {} companies.", page_index, links.len());
        if links.is_empty() {
            return Ok(None);
        }

        let aux = browser.open_page()?;
        let mut early = None;
        for (i, link) in links.iter().enumerate() {
            if self.control.checkpoint() == Checkpoint::Stop {
                early = Some(StopReason::StopRequested);
                break;
            }
            if self.limit_reached() {
                info!("Insert limit reached.");
                early = Some(StopReason::LimitReached);
                break;
            }

            self.control.update_status(|s| s.current_company = link.text.trim().to_string());
            let outcome = self.entities.process(aux.as_ref(), link);
            match outcome {
                EntityOutcome::Inserted => self.inserted += 1,
                EntityOutcome::Duplicate => self.duplicates += 1,
                EntityOutcome::Skipped => self.skipped += 1,
                EntityOutcome::Failed => self.failed += 1,
            }
            self.control.update_status(|s| {
                match outcome {
                    EntityOutcome::Inserted => s.inserted += 1,
                    EntityOutcome::Duplicate => s.duplicates += 1,
                    EntityOutcome::Skipped => s.skipped += 1,
                    EntityOutcome::Failed => s.failed += 1,
                }
                s.log(format!("{:?}: {}", outcome, link.text.trim()));
            });

            let fetched = outcome != EntityOutcome::Skipped;
            if fetched && i + 1 < links.len() {
                self.settings.delays.entity_delay();
            }
        }
        aux.close();

        if early.is_none() && self.limit_reached() {
            info!("Insert limit reached.");
            early = Some(StopReason::LimitReached);
        }
        Ok(early)
    }
}
