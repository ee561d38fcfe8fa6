use clap::Parser;
use contact_crawler_lib::browser::{Browser, ChromeBrowser, HtmlBrowser, HttpFetcher};
use contact_crawler_lib::config::Backend;
use contact_crawler_lib::control::{listener, server};
use contact_crawler_lib::delay_manager::Delays;
use contact_crawler_lib::ledger::csv::parse_rows;
use contact_crawler_lib::relay::Relay;
use contact_crawler_lib::session::{self, ChromeCapture, SessionStore, SheetFetcher};
use contact_crawler_lib::{
    logger, site, Config, ControlChannel, CrawlSettings, DedupLedger, EntityExtractor, LedgerWriter,
    Normalizer, PaginationDriver, RecordSink, RunControl,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Crawl job-listing search results into a deduplicated company contact ledger")]
struct Args {
    /// JSON configuration file.
    #[arg(short, long, default_value = "crawler.json")]
    config: PathBuf,
    /// Overrides `startPage`.
    #[arg(long)]
    start_page: Option<usize>,
    /// Overrides `maxInserts`.
    #[arg(long)]
    max_inserts: Option<usize>,
    /// Overrides `controlPort`.
    #[arg(long)]
    control_port: Option<u16>,
    /// Do not read operator commands from stdin.
    #[arg(long)]
    no_stdin: bool,
}

fn default_chrome() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe")
    } else if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
    } else {
        PathBuf::from("google-chrome")
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    let args = Args::parse();
    info!("Starting contact crawler...");

    // 1. Configuration
    let mut config = Config::load(&args.config)?;
    if let Some(page) = args.start_page {
        config.start_page = page;
    }
    if args.max_inserts.is_some() {
        config.max_inserts = args.max_inserts;
    }
    if args.control_port.is_some() {
        config.control_port = args.control_port;
    }
    config.validate()?;

    // 2. Operator control
    let control = RunControl::new();
    let (channel, auth_signal) = ControlChannel::new(control.clone());
    listener::install_signal_handler(&channel);
    if !args.no_stdin {
        listener::spawn_stdin_listener(channel.clone());
    }
    if let Some(port) = config.control_port {
        server::spawn(channel.clone(), port);
    }

    // 3. Ledger and dedup seed
    let extractor = config.extractor()?;
    let ledger = DedupLedger::new(Normalizer::new(&config.promo_marker), config.identity_column);
    let (writer, existing) = LedgerWriter::open(&config.ledger_path)?;
    ledger.seed(&existing);

    // 4. Optional spreadsheet seed list
    if let Some(sheet) = config.sheet()? {
        let store = SessionStore::new(&config.session_path);
        let capture = ChromeCapture {
            chrome_path: config.chrome_path.clone().unwrap_or_else(default_chrome),
            debug_port: config.debug_port,
            profile_dir: config.chrome_profile_dir.clone(),
            target_url: sheet.edit_url(),
            timeout: config.capture_timeout(),
            signal: auth_signal,
            control: control.clone(),
        };
        let body = session::fetch_with_session(&store, &SheetFetcher::new(sheet), &capture)?;
        let rows = parse_rows(&body);
        info!("Spreadsheet returned {} data rows.", rows.len().saturating_sub(1));
        ledger.seed_rows(rows.iter().skip(1));
    }

    // 5. Output
    let relay = match config.relay_url() {
        Some(url) => Some(Relay::new(url, config.relay_token(), config.relay_timeout())?),
        None => None,
    };
    let mut sink = RecordSink::new(writer, relay);

    // 6. Crawl
    let browser: Box<dyn Browser> = match config.backend {
        Backend::Chrome => Box::new(ChromeBrowser::launch(config.headless, config.chrome_path.clone())?),
        Backend::Http => Box::new(HtmlBrowser::new(HttpFetcher::new()?)),
    };
    let adapter = site::adapter_for(config.site);
    let settings = CrawlSettings {
        start_url: config.start_url.trim().to_string(),
        start_page: config.start_page,
        max_inserts: config.max_inserts,
        delays: Delays {
            page: Duration::from_millis(config.page_delay_ms),
            entity: Duration::from_millis(config.entity_delay_ms),
        },
    };
    let entities = EntityExtractor::new(adapter.as_ref(), &extractor, &ledger, &mut sink);
    let mut driver = PaginationDriver::new(settings, adapter.as_ref(), control.clone(), entities);
    let report = driver.run(browser.as_ref())?;

    info!(
        "Done. Last page {}, {} new companies written to {:?}.",
        report.last_page,
        report.inserted,
        config.ledger_path
    );
    Ok(())
}
