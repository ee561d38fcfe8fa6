use log::info;
use rand::Rng;
use std::thread;
use std::time::Duration;

/// Pacing between navigations.
#[derive(Debug, Clone, Copy)]
pub struct Delays {
    pub page: Duration,
    /// Base delay between companies; up to the same amount of random
    /// jitter is added.
    pub entity: Duration,
}

impl Delays {
    pub fn none() -> Self {
        Delays {
            page: Duration::ZERO,
            entity: Duration::ZERO,
        }
    }

    pub fn page_delay(&self) {
        if self.page.is_zero() {
            return;
        }
        info!("Waiting {} ms (Page Delay)...", self.page.as_millis());
        thread::sleep(self.page);
    }

    pub fn entity_delay(&self) {
        let base = self.entity.as_millis() as u64;
        if base == 0 {
            return;
        }
        let jitter = rand::thread_rng().gen_range(0..=base);
        thread::sleep(Duration::from_millis(base + jitter));
    }
}
