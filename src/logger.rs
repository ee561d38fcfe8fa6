use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

/// Timestamped single-line logger. `RUST_LOG` overrides the `info` default.
pub fn init() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .filter_module("headless_chrome", LevelFilter::Warn)
        .filter_module("tungstenite", LevelFilter::Warn)
        .parse_default_env()
        .init();

    log::info!("Logger initialized.");
}
