//! Fire-and-forget usage telemetry
//!
//! Operations emit events through a [`TelemetrySink`]. The [`Tracker`] sink
//! only pushes onto an unbounded channel; a [`TelemetryService`] task owns
//! the receiving end, buffers events and appends them as JSON lines to the
//! buffer file on every flush tick and on shutdown.

use crate::config::TelemetryConfig;
use skillhub_types::TelemetryEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Receives telemetry events; must never block or fail
pub trait TelemetrySink: Send + Sync {
    /// Record one event
    fn emit(&self, event: TelemetryEvent);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Sink feeding a [`TelemetryService`]
#[derive(Debug, Clone)]
pub struct Tracker {
    tx: UnboundedSender<TelemetryEvent>,
}

impl TelemetrySink for Tracker {
    fn emit(&self, event: TelemetryEvent) {
        if self.tx.send(event).is_err() {
            debug!("Telemetry service stopped, event dropped");
        }
    }
}

/// Background buffer-and-flush task with an explicit lifecycle
pub struct TelemetryService {
    config: TelemetryConfig,
    tx: UnboundedSender<TelemetryEvent>,
    rx: Option<UnboundedReceiver<TelemetryEvent>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TelemetryService {
    /// Create a stopped service
    #[must_use]
    pub fn new(config: TelemetryConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            tx,
            rx: Some(rx),
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Sink for operations: a [`Tracker`] when enabled, otherwise [`NoopTelemetry`]
    #[must_use]
    pub fn sink(&self) -> Arc<dyn TelemetrySink> {
        if self.config.enabled {
            Arc::new(Tracker {
                tx: self.tx.clone(),
            })
        } else {
            Arc::new(NoopTelemetry)
        }
    }

    /// Spawn the flush task; a no-op when disabled or already started
    pub fn start(&mut self) {
        if !self.config.enabled {
            debug!("Telemetry disabled");
            return;
        }
        let Some(rx) = self.rx.take() else {
            return;
        };

        let buffer_file = self.config.resolved_buffer_file();
        let period = self.config.flush_interval();
        let cancel = self.cancel.clone();
        info!(
            buffer_file = ?buffer_file,
            flush_secs = period.as_secs(),
            "Telemetry started"
        );

        self.handle = Some(tokio::spawn(async move {
            run_flusher(rx, buffer_file, period, cancel).await;
        }));
    }

    /// Stop the flush task after a final flush
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Telemetry task failed: {}", e);
            }
            info!("Telemetry stopped");
        }
    }
}

async fn run_flusher(
    mut rx: UnboundedReceiver<TelemetryEvent>,
    buffer_file: Option<PathBuf>,
    period: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    let mut buffer: Vec<TelemetryEvent> = Vec::new();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            Some(event) = rx.recv() => {
                debug!(event_type = ?event.event_type, data = ?event.data, "Telemetry event");
                buffer.push(event);
            }
            _ = ticker.tick() => flush(buffer_file.as_deref(), &mut buffer).await,
        }
    }

    while let Ok(event) = rx.try_recv() {
        buffer.push(event);
    }
    flush(buffer_file.as_deref(), &mut buffer).await;
}

/// Append buffered events to the buffer file; failures are logged and the batch dropped
async fn flush(buffer_file: Option<&Path>, buffer: &mut Vec<TelemetryEvent>) {
    if buffer.is_empty() {
        return;
    }
    let batch = std::mem::take(buffer);
    let Some(path) = buffer_file else {
        debug!("No telemetry buffer file, dropping {} events", batch.len());
        return;
    };

    let mut lines = String::new();
    for event in &batch {
        match serde_json::to_string(event) {
            Ok(line) => {
                lines.push_str(&line);
                lines.push('\n');
            }
            Err(e) => error!("Failed to serialize telemetry event: {}", e),
        }
    }

    if let Err(e) = append(path, lines.as_bytes()).await {
        error!("Failed to flush {} telemetry events to {:?}: {}", batch.len(), path, e);
    } else {
        debug!("Flushed {} telemetry events", batch.len());
    }
}

async fn append(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use skillhub_types::EventType;
    use tempfile::TempDir;

    fn config(dir: &TempDir, enabled: bool) -> TelemetryConfig {
        TelemetryConfig {
            enabled,
            buffer_file: Some(dir.path().join("nested/buffer.jsonl")),
            flush_interval_seconds: 3600,
            server_id: "test-server".to_string(),
        }
    }

    fn event(event_type: EventType) -> TelemetryEvent {
        let data = json!({"skill_path": "ui/react/auth"});
        TelemetryEvent::new(event_type, "test-server", data.as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn test_events_flushed_on_stop() {
        let tmp = TempDir::new().unwrap();
        let mut service = TelemetryService::new(config(&tmp, true));
        service.start();

        let sink = service.sink();
        sink.emit(event(EventType::SkillServed));
        sink.emit(event(EventType::AssetServed));
        service.stop().await;

        let content = std::fs::read_to_string(tmp.path().join("nested/buffer.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "skill_served");
        assert_eq!(lines[1]["type"], "asset_served");
        assert_eq!(lines[0]["server_id"], "test-server");
        assert_eq!(lines[0]["data"]["skill_path"], "ui/react/auth");
    }

    #[tokio::test]
    async fn test_flush_appends_and_clears() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("buffer.jsonl");

        let mut buffer = vec![event(EventType::NoMatch)];
        flush(Some(&path), &mut buffer).await;
        assert!(buffer.is_empty());

        buffer.push(event(EventType::AmbiguousMatch));
        flush(Some(&path), &mut buffer).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_flush_without_file_drops_batch() {
        let mut buffer = vec![event(EventType::NoMatch)];
        flush(None, &mut buffer).await;
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_service_records_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut service = TelemetryService::new(config(&tmp, false));
        service.start();
        service.sink().emit(event(EventType::SkillServed));
        service.stop().await;

        assert!(!tmp.path().join("nested/buffer.jsonl").exists());
    }

    #[test]
    fn test_emit_after_stop_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        Tracker { tx }.emit(event(EventType::RefreshPerformed));
    }
}
