//! Human-behavior simulation for login interactions
//!
//! Bounded randomized pauses and a small scroll gesture inserted before
//! typing and before submit. Purely advisory: a pause never sleeps past its
//! configured maximum, and a failed gesture is ignored.

use crate::config::BehaviorConfig;
use chromiumoxide::page::Page;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct HumanBehavior {
    min_delay: Duration,
    max_delay: Duration,
    scroll_jitter: bool,
}

impl HumanBehavior {
    pub fn new(config: &BehaviorConfig) -> Self {
        let min = config.min_delay_ms.min(config.max_delay_ms);
        let max = config.max_delay_ms.max(config.min_delay_ms);
        Self {
            min_delay: Duration::from_millis(min),
            max_delay: Duration::from_millis(max),
            scroll_jitter: config.scroll_jitter,
        }
    }

    /// Sleep for a random duration within the configured bounds.
    pub async fn pause(&self) {
        let delay = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.min_delay.as_millis() as u64..=self.max_delay.as_millis() as u64)
        };
        sleep(Duration::from_millis(delay)).await;
    }

    /// Short inter-keystroke pause, a fraction of the configured bounds.
    pub async fn keystroke_pause(&self) {
        let delay = {
            let mut rng = rand::thread_rng();
            rng.gen_range(30..=150)
        };
        sleep(Duration::from_millis(delay)).await;
    }

    /// Emit a small scroll gesture on the page, if enabled. Best-effort.
    pub async fn scroll_gesture(&self, page: &Page) {
        if !self.scroll_jitter {
            return;
        }
        let amount: i64 = {
            let mut rng = rand::thread_rng();
            rng.gen_range(80..=320)
        };
        let _ = page
            .evaluate(format!("window.scrollBy(0, {amount});"))
            .await;
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}
