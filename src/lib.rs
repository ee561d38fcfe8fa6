pub mod browser;
pub mod candidate;
pub mod config;
pub mod control;
pub mod delay_manager;
pub mod entity;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod ledger;
pub mod logger;
pub mod pagination;
pub mod relay;
pub mod session;
pub mod site;

// Exporting types for convenience
pub use candidate::{CompanyCandidate, CourseCandidate};
pub use config::Config;
pub use control::{ControlChannel, RunControl};
pub use entity::{EntityExtractor, EntityOutcome, RecordSink};
pub use extractor::Extractor;
pub use identity::Normalizer;
pub use ledger::{DedupLedger, LedgerWriter};
pub use pagination::{CrawlReport, CrawlSettings, PaginationDriver, StopReason};
