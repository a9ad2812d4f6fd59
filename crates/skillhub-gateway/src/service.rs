use crate::config::Config;
use crate::dispatch::{self, Dispatcher};
use anyhow::{Context, Result};
use skillhub_skills::{
    ChangeNotifier, RefreshScheduler, SkillIndex, SkillService, TelemetryService,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};

/// Gateway service - main orchestrator
pub struct GatewayService {
    config: Config,
}

impl GatewayService {
    /// Create a new gateway service
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the gateway service
    pub async fn run(self) -> Result<()> {
        // Initialize logging
        skillhub_logging::init_logging(&self.config.logging.level, &self.config.logging.format)?;
        info!("Starting SkillHub Gateway Service");

        // The content directory is the one thing we cannot run without
        let skills_dir = self.config.resolved_skills_dir();
        std::fs::read_dir(&skills_dir)
            .with_context(|| format!("Skills directory not readable: {}", skills_dir.display()))?;
        info!("Using skills directory: {}", skills_dir.display());

        let skills_config = self.config.skills_config();
        info!(
            "Matching config: min_score={}, max_results={}, ambiguity_threshold={}",
            skills_config.matching.min_score,
            skills_config.matching.max_results,
            skills_config.matching.ambiguity_threshold
        );
        if !skills_config.scripts.enabled {
            warn!("Script execution is disabled");
        }

        // Build the index
        let index = SkillIndex::build(&skills_dir, skills_config.matching.clone()).await?;
        info!("Indexed {} skills", index.len().await);

        // Telemetry
        let mut telemetry = TelemetryService::new(skills_config.telemetry.clone());
        telemetry.start();

        let service = Arc::new(SkillService::new(
            Arc::new(index),
            &skills_config,
            telemetry.sink(),
        ));

        // Refresh scheduling
        let notifier = ChangeNotifier::new();
        let mut scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            skills_config.refresh.clone(),
            notifier.clone(),
        );
        scheduler.start();
        spawn_hangup_listener(notifier);

        let dispatcher = Arc::new(Dispatcher::new(service));

        // Setup signal handler for graceful shutdown
        let shutdown = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
            info!("Received shutdown signal");
        };

        // Serve stdio
        info!("Serving JSON-lines requests on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        tokio::select! {
            result = dispatch::serve(dispatcher, stdin, stdout) => {
                if let Err(e) = result {
                    error!("Stdio transport error: {}", e);
                }
            }
            () = shutdown => {
                info!("Shutting down gracefully...");
            }
        }

        scheduler.stop().await;
        telemetry.stop().await;

        info!("Gateway service stopped");
        Ok(())
    }
}

/// SIGHUP re-indexes the content directory
#[cfg(unix)]
fn spawn_hangup_listener(notifier: ChangeNotifier) {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::hangup()) {
        Ok(mut hangup) => {
            tokio::spawn(async move {
                while hangup.recv().await.is_some() {
                    info!("Received SIGHUP, refreshing skills");
                    notifier.content_changed();
                }
            });
        }
        Err(e) => warn!("Failed to install SIGHUP handler: {}", e),
    }
}

#[cfg(not(unix))]
fn spawn_hangup_listener(_notifier: ChangeNotifier) {}
