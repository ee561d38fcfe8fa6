use contact_crawler_lib::browser::{Browser, Fetch, HtmlBrowser, Link, PageQuery};
use contact_crawler_lib::candidate::NOT_FOUND;
use contact_crawler_lib::delay_manager::Delays;
use contact_crawler_lib::error::CrawlError;
use contact_crawler_lib::ledger::csv::parse_rows;
use contact_crawler_lib::site::{OutlineSite, ProgramSite, SiteAdapter};
use contact_crawler_lib::{
    CrawlReport, CrawlSettings, DedupLedger, EntityExtractor, Extractor, LedgerWriter, Normalizer,
    PaginationDriver, RecordSink, RunControl, StopReason,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const BASE: &str = "https://jobs.test";

/// In-memory site that records every fetch and can raise the stop or
/// pause flag when a given URL is requested.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    visits: Mutex<Vec<String>>,
    stop_at: Option<(String, RunControl)>,
    pause_at: Option<(String, RunControl)>,
}

impl FakeSite {
    fn add(&mut self, path: &str, html: String) {
        self.pages.insert(format!("{}{}", BASE, path), html);
    }

    fn visited(&self, path: &str) -> bool {
        let url = format!("{}{}", BASE, path);
        self.visits.lock().unwrap().iter().any(|v| *v == url)
    }

    fn visits_containing(&self, needle: &str) -> Vec<String> {
        self.visits
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.contains(needle))
            .cloned()
            .collect()
    }
}

impl Fetch for FakeSite {
    fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        self.visits.lock().unwrap().push(url.to_string());
        if let Some((stop_url, control)) = &self.stop_at {
            if stop_url == url {
                control.request_stop();
            }
        }
        if let Some((pause_url, control)) = &self.pause_at {
            if pause_url == url {
                control.set_paused(true);
            }
        }
        self.pages.get(url).cloned().ok_or_else(|| CrawlError::Navigation {
            url: url.to_string(),
            reason: "HTTP 404".into(),
        })
    }
}

enum Pager {
    Next,
    Disabled,
    Missing,
}

fn search_path(n: usize) -> String {
    format!("/search?page={}", n)
}

fn outline_results(page: usize, entries: &[(u32, &str)], pager: Pager) -> String {
    let items: String = entries
        .iter()
        .map(|(id, text)| {
            format!(
                r#"<li class="result"><h2><a href="/company/{}/outline.html">{}</a></h2></li>"#,
                id, text
            )
        })
        .collect();
    let pager = match pager {
        Pager::Next => format!(r#"<a class="next" href="{}">Next</a>"#, search_path(page + 1)),
        Pager::Disabled => r#"<a class="next disabled" href="">Next</a>"#.to_string(),
        Pager::Missing => String::new(),
    };
    format!(
        r#"<html><body><ul class="search-results">{}</ul><div class="pager">{}</div></body></html>"#,
        items, pager
    )
}

fn add_outline_company(site: &mut FakeSite, id: u32, name: &str) {
    site.add(
        &format!("/company/{}/outline.html", id),
        format!(
            r#"<html><body><h1 class="company-name">{}</h1>
            <table class="outline">
              <tr><th>業種</th><td>ソフトウェア</td></tr>
              <tr><th>本社所在地</th><td>東京都千代田区</td></tr>
              <tr><th>従業員数</th><td>120名</td></tr>
              <tr><th>採用実績（人数）</th><td>2023年 4名 2022年 6名</td></tr>
            </table></body></html>"#,
            name
        ),
    );
    site.add(
        &format!("/company/{}/employment.html", id),
        format!(
            r#"<html><body><div class="contact">採用担当 TEL 03-1234-56{:02} / hr{}@example.com</div></body></html>"#,
            id, id
        ),
    );
}

struct Outcome {
    report: CrawlReport,
    rows: Vec<Vec<String>>,
}

/// Search pages whose pager is script-driven: the next control has no
/// usable href, so `click` is the only way forward.
struct ScriptedPager {
    inner: HtmlBrowser<FakeSite>,
    clicks: Arc<Mutex<Vec<String>>>,
}

impl Browser for ScriptedPager {
    fn open_page(&self) -> Result<Box<dyn PageQuery>, CrawlError> {
        Ok(Box::new(ScriptedPage {
            inner: self.inner.open_page()?,
            clicks: self.clicks.clone(),
        }))
    }
}

struct ScriptedPage {
    inner: Box<dyn PageQuery>,
    clicks: Arc<Mutex<Vec<String>>>,
}

impl PageQuery for ScriptedPage {
    fn goto(&self, url: &str) -> Result<(), CrawlError> {
        self.inner.goto(url)
    }
    fn current_url(&self) -> String {
        self.inner.current_url()
    }
    fn find_links(&self, selector: &str) -> Vec<Link> {
        self.inner.find_links(selector)
    }
    fn find_text(&self, selector: &str) -> Option<String> {
        self.inner.find_text(selector)
    }
    fn find_texts(&self, selector: &str) -> Vec<String> {
        self.inner.find_texts(selector)
    }
    fn find_table(&self, row_selector: &str) -> Vec<(String, String)> {
        self.inner.find_table(row_selector)
    }
    fn attribute(&self, selector: &str, name: &str) -> Option<String> {
        self.inner.attribute(selector, name)
    }
    fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        self.inner.wait_for(selector, timeout)
    }
    fn click(&self, selector: &str) -> Result<(), CrawlError> {
        self.clicks.lock().unwrap().push(selector.to_string());
        let target = self
            .inner
            .attribute(selector, "data-page")
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(|| CrawlError::Browser(format!("'{}' has no script target", selector)))?;
        self.inner.goto(&format!("{}{}", BASE, search_path(target)))
    }
    fn close(&self) {
        self.inner.close()
    }
}

fn crawl(
    site: Arc<FakeSite>,
    adapter: &dyn SiteAdapter,
    ledger_path: &Path,
    start_page: usize,
    max_inserts: Option<usize>,
    control: RunControl,
) -> Outcome {
    let browser = HtmlBrowser::from_shared(site);
    crawl_with(&browser, adapter, ledger_path, start_page, max_inserts, control)
}

fn crawl_with(
    browser: &dyn Browser,
    adapter: &dyn SiteAdapter,
    ledger_path: &Path,
    start_page: usize,
    max_inserts: Option<usize>,
    control: RunControl,
) -> Outcome {
    let ledger = DedupLedger::new(Normalizer::default(), 0);
    let (writer, existing) = LedgerWriter::open(ledger_path).unwrap();
    ledger.seed(&existing);
    let extractor = Extractor::new();
    let mut sink = RecordSink::new(writer, None);
    let settings = CrawlSettings {
        start_url: format!("{}{}", BASE, search_path(1)),
        start_page,
        max_inserts,
        delays: Delays::none(),
    };

    let report = {
        let entities = EntityExtractor::new(adapter, &extractor, &ledger, &mut sink);
        let mut driver = PaginationDriver::new(settings, adapter, control, entities);
        driver.run(browser).unwrap()
    };

    let text = fs::read_to_string(ledger_path).unwrap();
    Outcome {
        report,
        rows: parse_rows(&text).into_iter().skip(1).collect(),
    }
}

fn three_page_site(last_pager: Pager) -> FakeSite {
    let mut site = FakeSite::default();
    site.add(&search_path(1), outline_results(1, &[(1, "Alpha"), (2, "Beta")], Pager::Next));
    site.add(&search_path(2), outline_results(2, &[(3, "Gamma")], Pager::Next));
    site.add(&search_path(3), outline_results(3, &[(4, "Delta")], last_pager));
    for (id, name) in [(1, "Alpha"), (2, "Beta"), (3, "Gamma"), (4, "Delta")] {
        add_outline_company(&mut site, id, name);
    }
    site
}

#[test]
fn traverses_until_next_control_is_absent() {
    let dir = tempdir().unwrap();
    let site = Arc::new(three_page_site(Pager::Missing));
    let out = crawl(site.clone(), &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    assert_eq!(out.report.last_page, 3);
    assert_eq!(out.report.reason, StopReason::NoNextPage);
    assert_eq!(site.visits_containing("/search?page=").len(), 3);

    let names: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Delta"]);

    let alpha = &out.rows[0];
    assert_eq!(alpha[1], "03-1234-5601");
    assert_eq!(alpha[2], "hr1@example.com");
    assert_eq!(alpha[3], "ソフトウェア");
    assert_eq!(alpha[4], "東京都千代田区");
    assert_eq!(alpha[5], "50-299");
    assert_eq!(alpha[6], "5.0");
    assert_eq!(alpha[7], format!("{}/company/1/outline.html", BASE));
    assert_eq!(alpha[9], "ok");
}

#[test]
fn disabled_next_control_ends_the_run() {
    let dir = tempdir().unwrap();
    let mut site = three_page_site(Pager::Next);
    site.add(&search_path(2), outline_results(2, &[(3, "Gamma")], Pager::Disabled));
    let site = Arc::new(site);
    let out = crawl(site.clone(), &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    assert_eq!(out.report.last_page, 2);
    assert_eq!(out.report.reason, StopReason::NextDisabled);
    assert!(!site.visited(&search_path(3)));
    assert_eq!(out.rows.len(), 3);
}

#[test]
fn insert_cap_stops_before_the_next_company() {
    let dir = tempdir().unwrap();
    let site = Arc::new(three_page_site(Pager::Missing));
    let out = crawl(site.clone(), &OutlineSite::default(), &dir.path().join("l.csv"), 1, Some(2), RunControl::new());

    assert_eq!(out.report.inserted, 2);
    assert_eq!(out.report.reason, StopReason::LimitReached);
    assert_eq!(out.rows.len(), 2);
    assert!(!site.visited("/company/3/outline.html"));
    assert!(!site.visited(&search_path(2)));
}

#[test]
fn cap_reached_mid_page_does_not_start_next_company() {
    let dir = tempdir().unwrap();
    let site = Arc::new(three_page_site(Pager::Missing));
    let out = crawl(site.clone(), &OutlineSite::default(), &dir.path().join("l.csv"), 1, Some(1), RunControl::new());

    assert_eq!(out.report.inserted, 1);
    assert_eq!(out.report.last_page, 1);
    assert!(!site.visited("/company/2/outline.html"));
}

#[test]
fn pages_before_start_page_are_not_processed() {
    let dir = tempdir().unwrap();
    let site = Arc::new(three_page_site(Pager::Missing));
    let out = crawl(site.clone(), &OutlineSite::default(), &dir.path().join("l.csv"), 2, None, RunControl::new());

    assert!(site.visited(&search_path(1)));
    assert!(!site.visited("/company/1/outline.html"));
    assert!(!site.visited("/company/2/outline.html"));
    let names: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Gamma", "Delta"]);
}

#[test]
fn each_identity_is_persisted_once() {
    let dir = tempdir().unwrap();
    let mut site = FakeSite::default();
    site.add(
        &search_path(1),
        outline_results(1, &[(1, "Alpha"), (2, "Beta"), (1, "Alpha")], Pager::Next),
    );
    // Same company under a different listing name and a marker-prefixed title.
    site.add(&search_path(2), outline_results(2, &[(5, "Alpha (Osaka branch)")], Pager::Missing));
    add_outline_company(&mut site, 1, "Alpha");
    add_outline_company(&mut site, 2, "Beta");
    add_outline_company(&mut site, 5, "PR\n  Alpha");
    let site = Arc::new(site);

    let out = crawl(site.clone(), &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    let names: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);
    assert_eq!(out.report.inserted, 2);
    assert_eq!(out.report.skipped, 1);
    assert_eq!(out.report.duplicates, 1);
    // The repeated listing was skipped before any navigation.
    assert_eq!(site.visits_containing("/company/1/outline.html").len(), 1);
}

#[test]
fn badge_markup_in_company_title_keeps_one_identity() {
    let dir = tempdir().unwrap();
    let mut site = FakeSite::default();
    site.add(
        &search_path(1),
        outline_results(1, &[(1, "Acme Corp"), (2, "Acme Corp (Osaka)")], Pager::Missing),
    );
    add_outline_company(&mut site, 1, "Acme Corp");
    add_outline_company(&mut site, 2, r#"<span class="badge">PR</span>Acme Corp"#);

    let out = crawl(Arc::new(site), &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    let names: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Acme Corp"]);
    assert_eq!(out.report.duplicates, 1);
}

#[test]
fn script_driven_pager_is_clicked() {
    let dir = tempdir().unwrap();
    let mut site = FakeSite::default();
    site.add(
        &search_path(1),
        r##"<ul class="search-results"><li class="result"><h2><a href="/company/1/outline.html">Alpha</a></h2></li></ul>
           <a class="next" href="#" data-page="2">Next</a>"##
            .to_string(),
    );
    site.add(&search_path(2), outline_results(2, &[(2, "Beta")], Pager::Missing));
    add_outline_company(&mut site, 1, "Alpha");
    add_outline_company(&mut site, 2, "Beta");
    let clicks = Arc::new(Mutex::new(Vec::new()));
    let browser = ScriptedPager {
        inner: HtmlBrowser::new(site),
        clicks: clicks.clone(),
    };

    let out = crawl_with(&browser, &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    assert_eq!(*clicks.lock().unwrap(), vec!["a.next".to_string()]);
    assert_eq!(out.report.last_page, 2);
    assert_eq!(out.report.reason, StopReason::NoNextPage);
    let names: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);
}

#[test]
fn pause_during_a_company_holds_the_next_one() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("l.csv");
    let control = RunControl::new();
    let mut site = three_page_site(Pager::Missing);
    site.pause_at = Some((format!("{}/company/1/outline.html", BASE), control.clone()));
    let site = Arc::new(site);

    let watcher = {
        let (site, control, path) = (site.clone(), control.clone(), path.clone());
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !control.is_paused() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            // Let the crawl reach its next checkpoint and sit there.
            thread::sleep(Duration::from_millis(800));
            let rows = parse_rows(&fs::read_to_string(&path).unwrap()).len() - 1;
            let finished_current = site.visited("/company/1/employment.html");
            let started_next = site.visited("/company/2/outline.html");
            control.set_paused(false);
            (rows, finished_current, started_next)
        })
    };

    let out = crawl(site, &OutlineSite::default(), &path, 1, None, control);
    let (rows_while_paused, finished_current, started_next) = watcher.join().unwrap();

    assert!(finished_current);
    assert!(!started_next);
    assert_eq!(rows_while_paused, 1);
    assert_eq!(out.rows.len(), 4);
    assert_eq!(out.report.reason, StopReason::NoNextPage);
}

#[test]
fn previous_ledger_rows_are_skipped_and_kept() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("l.csv");
    let first = crawl(
        Arc::new(three_page_site(Pager::Missing)),
        &OutlineSite::default(),
        &path,
        1,
        Some(2),
        RunControl::new(),
    );
    assert_eq!(first.rows.len(), 2);
    let before = fs::read_to_string(&path).unwrap();

    let site = Arc::new(three_page_site(Pager::Missing));
    let second = crawl(site.clone(), &OutlineSite::default(), &path, 1, None, RunControl::new());

    assert!(!site.visited("/company/1/outline.html"));
    assert!(!site.visited("/company/2/outline.html"));
    assert_eq!(second.report.skipped, 2);
    assert_eq!(second.report.inserted, 2);
    assert!(fs::read_to_string(&path).unwrap().starts_with(&before));
    assert_eq!(second.rows.len(), 4);
}

#[test]
fn stop_lets_current_company_finish_then_unwinds() {
    let dir = tempdir().unwrap();
    let control = RunControl::new();
    let mut site = three_page_site(Pager::Missing);
    site.add(
        &search_path(1),
        outline_results(1, &[(1, "Alpha"), (2, "Beta"), (3, "Gamma")], Pager::Next),
    );
    site.stop_at = Some((format!("{}/company/2/outline.html", BASE), control.clone()));
    let site = Arc::new(site);

    let out = crawl(site.clone(), &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, control);

    assert_eq!(out.report.reason, StopReason::StopRequested);
    assert_eq!(out.report.last_page, 1);
    let names: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);
    assert!(site.visited("/company/2/employment.html"));
    assert!(!site.visited("/company/3/outline.html"));
    assert!(!site.visited(&search_path(2)));
}

#[test]
fn failing_company_does_not_abort_the_page() {
    let dir = tempdir().unwrap();
    let mut site = three_page_site(Pager::Missing);
    site.pages.remove(&format!("{}/company/2/outline.html", BASE));
    let site = Arc::new(site);

    let out = crawl(site, &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    assert_eq!(out.report.failed, 1);
    assert_eq!(out.report.inserted, 3);
}

#[test]
fn company_without_detail_listing_gets_minimal_record() {
    let dir = tempdir().unwrap();
    let mut site = FakeSite::default();
    site.add(
        &search_path(1),
        r#"<ul class="search-results"><li class="result"><h2><a href="/company/9/about.html">Omega</a></h2></li></ul>"#
            .to_string(),
    );
    site.add("/company/9/about.html", r#"<h1 class="company-name">Omega</h1>"#.to_string());
    let site = Arc::new(site);

    let out = crawl(site, &OutlineSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    assert_eq!(out.rows.len(), 1);
    let row = &out.rows[0];
    assert_eq!(row[0], "Omega");
    assert_eq!(row[1], NOT_FOUND);
    assert_eq!(row[2], NOT_FOUND);
    assert_eq!(row[9], "no_detail");
}

fn program_site(courses: &[&str]) -> FakeSite {
    let mut site = FakeSite::default();
    site.add(
        &search_path(1),
        r#"<div class="corp-card"><a class="corp-name" href="/corp/1/">Sigma Works</a></div>"#.to_string(),
    );
    site.add(
        "/corp/1/",
        r#"<h1 class="corp-title">Sigma Works</h1>
           <table class="corp-data"><tr><th>業種</th><td>製造</td></tr></table>
           <nav class="corp-tabs"><a class="programs" href="/corp/1/programs/">Programs</a></nav>"#
            .to_string(),
    );
    let items: String = (0..courses.len())
        .map(|k| format!(r#"<li><a class="program-link" href="/corp/1/programs/{}">Course {}</a></li>"#, k, k))
        .collect();
    site.add(
        "/corp/1/programs/",
        format!(
            r#"<ul class="program-list">{}</ul><p>代表 TEL 03-9999-0000 info@sigma.example</p>"#,
            items
        ),
    );
    for (k, text) in courses.iter().enumerate() {
        site.add(
            &format!("/corp/1/programs/{}", k),
            format!(r#"<div class="program-contact">{}</div>"#, text),
        );
    }
    site
}

#[test]
fn complete_course_is_chosen_and_ends_enumeration() {
    let dir = tempdir().unwrap();
    let site = Arc::new(program_site(&[
        "担当: 人事部",
        "TEL 03-1111-2222",
        "TEL 03-3333-4444 / jobs@sigma.example",
        "recruit@sigma.example",
    ]));

    let out = crawl(site.clone(), &ProgramSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    let row = &out.rows[0];
    assert_eq!(row[0], "Sigma Works");
    assert_eq!(row[1], "03-3333-4444");
    assert_eq!(row[2], "jobs@sigma.example");
    assert_eq!(row[3], "製造");
    assert!(site.visited("/corp/1/programs/2"));
    assert!(!site.visited("/corp/1/programs/3"));
}

#[test]
fn best_partial_course_wins_when_none_is_complete() {
    let dir = tempdir().unwrap();
    let site = Arc::new(program_site(&["recruit@sigma.example", "TEL 03-1111-2222", "none"]));

    let out = crawl(site, &ProgramSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    let row = &out.rows[0];
    assert_eq!(row[1], "03-1111-2222");
    assert_eq!(row[2], NOT_FOUND);
}

#[test]
fn listing_without_courses_is_read_directly() {
    let dir = tempdir().unwrap();
    let site = Arc::new(program_site(&[]));

    let out = crawl(site, &ProgramSite::default(), &dir.path().join("l.csv"), 1, None, RunControl::new());

    let row = &out.rows[0];
    assert_eq!(row[1], "03-9999-0000");
    assert_eq!(row[2], "info@sigma.example");
}
