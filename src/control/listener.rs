use crate::control::{ControlChannel, ControlCommand};
use log::{info, warn};
use std::io::{self, BufRead};
use std::thread;

/// Maps Ctrl-C / SIGTERM onto the stop flag instead of exiting, so the
/// crawl can finish its current company and close the browser.
pub fn install_signal_handler(channel: &ControlChannel) {
    let control = channel.control().clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Termination signal received.");
        control.request_stop();
    }) {
        warn!("Failed to install termination handler: {}", e);
    }
}

/// Reads operator commands from stdin on a background thread.
pub fn spawn_stdin_listener(channel: ControlChannel) {
    info!("Commands: 'p' pause/resume, 's' stop, Enter confirms login during session capture.");
    let spawned = thread::Builder::new()
        .name("stdin-control".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!("stdin closed: {}", e);
                        break;
                    }
                };
                match line.parse::<ControlCommand>() {
                    Ok(cmd) => channel.dispatch(cmd),
                    Err(e) => warn!("{}", e),
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Could not start stdin listener: {}", e);
    }
}
