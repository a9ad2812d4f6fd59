//! Index refresh scheduling
//!
//! Content sync lives outside this crate; it only needs to call
//! [`ChangeNotifier::content_changed`]. The [`RefreshScheduler`] turns those
//! signals and a periodic timer into coalesced index rebuilds.

use crate::config::RefreshConfig;
use crate::service::{RefreshTrigger, SkillService};
use std::future;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Zero-argument "content changed" signal
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    notify: Arc<Notify>,
}

impl ChangeNotifier {
    /// Create a notifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that the content directory changed
    ///
    /// Signals raised while no one is waiting collapse into one.
    pub fn content_changed(&self) {
        self.notify.notify_one();
    }

    /// Wait for the next signal
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

/// Drives rebuilds from the timer and the change notifier
pub struct RefreshScheduler {
    service: Arc<SkillService>,
    config: RefreshConfig,
    notifier: ChangeNotifier,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Create a stopped scheduler
    #[must_use]
    pub fn new(service: Arc<SkillService>, config: RefreshConfig, notifier: ChangeNotifier) -> Self {
        Self {
            service,
            config,
            notifier,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawn the scheduling task
    ///
    /// With periodic refresh disabled, only change notifications trigger rebuilds.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let ticker = self.config.enabled.then(|| {
            let period = self.config.interval();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        info!(
            periodic = self.config.enabled,
            interval_minutes = self.config.interval_minutes,
            "Refresh scheduler started"
        );

        let service = Arc::clone(&self.service);
        let notifier = self.notifier.clone();
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(async move {
            run_scheduler(service, ticker, notifier, cancel).await;
        }));
    }

    /// Stop the scheduling task, letting an in-flight rebuild finish
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Refresh scheduler task failed: {}", e);
            }
            info!("Refresh scheduler stopped");
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

async fn run_scheduler(
    service: Arc<SkillService>,
    mut ticker: Option<Interval>,
    notifier: ChangeNotifier,
    cancel: CancellationToken,
) {
    loop {
        let trigger = tokio::select! {
            () = cancel.cancelled() => break,
            () = tick(&mut ticker) => RefreshTrigger::Scheduled,
            () = notifier.changed() => RefreshTrigger::ContentChanged,
        };

        if let Err(e) = service.refresh(trigger).await {
            error!(trigger = ?trigger, "Scheduled refresh failed: {}", e);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{MatchingConfig, SkillsConfig};
    use crate::index::SkillIndex;
    use crate::telemetry::NoopTelemetry;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_notification_triggers_rebuild() {
        let tmp = TempDir::new().unwrap();
        let index = Arc::new(SkillIndex::new(tmp.path(), MatchingConfig::default()));
        let service = Arc::new(SkillService::new(
            Arc::clone(&index),
            &SkillsConfig::default(),
            Arc::new(NoopTelemetry),
        ));

        let notifier = ChangeNotifier::new();
        let config = RefreshConfig {
            enabled: false,
            ..RefreshConfig::default()
        };
        let mut scheduler = RefreshScheduler::new(service, config, notifier.clone());
        scheduler.start();

        std::fs::write(
            tmp.path().join("deploy.md"),
            "---\nkeywords: [deploy]\ndescription: Deploy\n---\nShip it\n",
        )
        .unwrap();
        notifier.content_changed();

        for _ in 0..200 {
            if index.len().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(index.len().await, 1);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let tmp = TempDir::new().unwrap();
        let index = Arc::new(SkillIndex::new(tmp.path(), MatchingConfig::default()));
        let service = Arc::new(SkillService::new(
            index,
            &SkillsConfig::default(),
            Arc::new(NoopTelemetry),
        ));
        let mut scheduler =
            RefreshScheduler::new(service, RefreshConfig::default(), ChangeNotifier::new());
        scheduler.stop().await;
    }
}
