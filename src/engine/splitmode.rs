//! Net-split sentinel.
//!
//! When the visible network shrinks below configured floors, the server
//! assumes it is on the wrong side of a split and restricts channel
//! creation and (optionally) joins until the topology recovers. A recheck
//! timer runs only while split-mode is suspected; a healthy server pays
//! nothing for the feature.

use crate::config::SplitConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct SplitSentinel {
    cfg: SplitConfig,
    active: AtomicBool,
    armed: AtomicBool,
}

impl SplitSentinel {
    /// Construct from config, seeded with the topology of a freshly started
    /// server: itself and nobody else.
    pub fn new(cfg: SplitConfig) -> Self {
        let active = Self::below_floor(&cfg, 1, 0);
        Self {
            cfg,
            active: AtomicBool::new(active),
            armed: AtomicBool::new(false),
        }
    }

    fn below_floor(cfg: &SplitConfig, servers: u32, users: u32) -> bool {
        servers < cfg.min_servers || users < cfg.min_users
    }

    /// Re-evaluate against a fresh topology count. Returns the new state
    /// and logs transitions.
    pub fn update(&self, servers: u32, users: u32) -> bool {
        let now_active = Self::below_floor(&self.cfg, servers, users);
        let was_active = self.active.swap(now_active, Ordering::AcqRel);
        if now_active && !was_active {
            warn!(servers, users, "entering split-mode");
        } else if !now_active && was_active {
            info!(servers, users, "leaving split-mode");
        }
        now_active
    }

    pub fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether creating a new channel is refused right now.
    pub fn blocks_create(&self) -> bool {
        self.active() && self.cfg.no_create
    }

    /// Whether joining any channel is refused right now.
    pub fn blocks_join(&self) -> bool {
        self.active() && self.cfg.no_join
    }

    /// Arm the recheck timer if split-mode is active and no timer is
    /// already running. The task polls `counts` every `recheck_secs` and
    /// exits as soon as the topology recovers, disarming itself.
    pub fn maybe_arm<F>(self: Arc<Self>, counts: F)
    where
        F: Fn() -> (u32, u32) + Send + Sync + 'static,
    {
        if !self.active() {
            return;
        }
        if self.armed.swap(true, Ordering::AcqRel) {
            return;
        }
        tokio::spawn(async move {
            let interval = Duration::from_secs(self.cfg.recheck_secs.max(1));
            loop {
                tokio::time::sleep(interval).await;
                let (servers, users) = counts();
                if !self.update(servers, users) {
                    break;
                }
            }
            self.armed.store(false, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SplitConfig {
        SplitConfig {
            min_servers: 3,
            min_users: 10,
            no_create: true,
            no_join: false,
            recheck_secs: 1,
        }
    }

    #[test]
    fn test_starts_suspected_when_floors_unmet() {
        let sentinel = SplitSentinel::new(cfg());
        assert!(sentinel.active());
        assert!(sentinel.blocks_create());
        assert!(!sentinel.blocks_join());
    }

    #[test]
    fn test_update_transitions_both_ways() {
        let sentinel = SplitSentinel::new(cfg());
        assert!(!sentinel.update(3, 10));
        assert!(!sentinel.active());
        // Either floor failing re-engages.
        assert!(sentinel.update(3, 9));
        assert!(sentinel.update(2, 50));
    }

    #[test]
    fn test_no_join_floor() {
        let mut c = cfg();
        c.no_join = true;
        let sentinel = SplitSentinel::new(c);
        assert!(sentinel.blocks_join());
        sentinel.update(5, 100);
        assert!(!sentinel.blocks_join());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recheck_disarms_on_recovery() {
        let sentinel = Arc::new(SplitSentinel::new(cfg()));
        assert!(sentinel.active());

        Arc::clone(&sentinel).maybe_arm(|| (5, 100));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!sentinel.active());
    }
}
