//! Tool-facing skill operations
//!
//! Every operation returns a structured value; failures come back as
//! [`SkillError`] so the invocation surface can render an
//! [`ErrorResponse`](crate::error::ErrorResponse) instead of failing the call.

use crate::assets::{is_binary_file, mime_type, read_base64, read_text};
use crate::config::{AssetsConfig, MatchingConfig, SkillsConfig};
use crate::error::{Result, SkillError};
use crate::index::{SearchHit, SkillIndex};
use crate::inheritance::{self, ChainFile};
use crate::sandbox::{ScriptRun, ScriptSandbox};
use crate::telemetry::TelemetrySink;
use serde::Serialize;
use serde_json::{json, Value};
use skillhub_types::{
    AssetType, EventType, Inherited, ResolvedAsset, ResolvedScript, SkillTreeNode, TelemetryEvent,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a skill search
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SkillMatch {
    /// One skill clearly won
    Selected(Box<SelectedSkill>),
    /// The top scores were too close to pick one
    Ambiguous {
        /// Best candidates, highest first
        candidates: Vec<Candidate>,
        /// Hint for the caller
        message: String,
    },
    /// Nothing reached the minimum score
    NoMatch {
        /// Hint for the caller
        message: String,
    },
}

/// A served skill with inheritance applied
#[derive(Debug, Clone, Serialize)]
pub struct SelectedSkill {
    /// Skill path
    pub skill_path: String,
    /// Relevance score, three decimals
    pub score: f64,
    /// Keywords that matched
    pub matched_keywords: Vec<String>,
    /// One-line description
    pub description: String,
    /// Body merged with ancestor bodies
    pub content: String,
    /// Assets declared by the skill itself
    pub assets: Vec<ResolvedAsset>,
    /// Scripts declared by the skill itself
    pub scripts: Vec<ResolvedScript>,
    /// Assets contributed by ancestors
    pub inherited_assets: Vec<Inherited<ResolvedAsset>>,
    /// Scripts contributed by ancestors
    pub inherited_scripts: Vec<Inherited<ResolvedScript>>,
}

/// One option in an ambiguous result
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    /// Skill path
    pub skill_path: String,
    /// Relevance score, three decimals
    pub score: f64,
    /// One-line description
    pub description: String,
    /// Keywords that matched
    pub matched_keywords: Vec<String>,
}

/// Whether a served file was declared as an asset or a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedKind {
    /// Declared under `assets`
    Asset,
    /// Declared under `scripts`
    Script,
}

/// File content, as text or base64
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AssetBody {
    /// Text file
    Text {
        /// Decoded content
        content: String,
    },
    /// Binary file
    Binary {
        /// Base64-encoded bytes
        content_base64: String,
        /// MIME type from the extension
        mime_type: String,
    },
}

/// A served asset or script file
#[derive(Debug, Clone, Serialize)]
pub struct AssetPayload {
    /// Skill the file was requested from
    pub skill_path: String,
    /// File as declared
    pub file: String,
    /// Declaration kind
    pub kind: ServedKind,
    /// Declared asset type, absent for scripts
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    /// Size on disk
    pub size_bytes: u64,
    /// Content
    #[serde(flatten)]
    pub body: AssetBody,
    /// Ancestor that declared the file, when inherited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_from: Option<String>,
}

/// What caused a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    /// A caller asked for it
    Manual,
    /// The periodic timer fired
    Scheduled,
    /// The change notifier fired
    ContentChanged,
}

/// Result of a refresh request
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    /// The request was handled
    pub success: bool,
    /// Skills in the index afterwards
    pub skills_reindexed: usize,
    /// Generation now being served
    pub generation: u64,
    /// Another rebuild was already running
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    /// Why the request was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Acknowledgement of a usage report
#[derive(Debug, Clone, Serialize)]
pub struct UsageReceipt {
    /// Always true
    pub recorded: bool,
}

/// The skill operations over one live index
pub struct SkillService {
    index: Arc<SkillIndex>,
    sandbox: ScriptSandbox,
    assets: AssetsConfig,
    telemetry: Arc<dyn TelemetrySink>,
    server_id: String,
}

fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

impl SkillService {
    /// Create a service over an index
    pub fn new(index: Arc<SkillIndex>, config: &SkillsConfig, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            index,
            sandbox: ScriptSandbox::new(config.scripts.clone()),
            assets: config.assets.clone(),
            telemetry,
            server_id: config.telemetry.server_id.clone(),
        }
    }

    /// Underlying index
    #[must_use]
    pub fn index(&self) -> &Arc<SkillIndex> {
        &self.index
    }

    fn matching(&self) -> &MatchingConfig {
        self.index.matching()
    }

    fn emit(&self, event_type: EventType, data: Value) {
        if let Value::Object(map) = data {
            self.telemetry
                .emit(TelemetryEvent::new(event_type, self.server_id.as_str(), map));
        }
    }

    /// Pick the skill that best fits a task description
    pub async fn get_skill(&self, context: &str) -> SkillMatch {
        let tree = self.index.snapshot().await;
        let hits = tree.search(context, self.matching());

        let Some(top) = hits.first() else {
            debug!("No skill matched: {}", context);
            self.emit(EventType::NoMatch, json!({ "context": context }));
            return SkillMatch::NoMatch {
                message: format!(
                    "No skill matched this context (minimum score {}). \
                     Use list_skills to browse available skills.",
                    self.matching().min_score
                ),
            };
        };

        if let Some(second) = hits.get(1) {
            if top.score - second.score < self.matching().ambiguity_threshold {
                let candidates: Vec<Candidate> = hits
                    .iter()
                    .take(self.matching().max_results)
                    .map(candidate)
                    .collect();
                let paths: Vec<&str> = candidates.iter().map(|c| c.skill_path.as_str()).collect();
                info!("Ambiguous match for '{}': {:?}", context, paths);
                self.emit(
                    EventType::AmbiguousMatch,
                    json!({ "context": context, "candidates": paths }),
                );
                return SkillMatch::Ambiguous {
                    message: "Several skills match equally well. Call get_skill again with a \
                              more specific context, or pick a candidate path."
                        .to_string(),
                    candidates,
                };
            }
        }

        let skill = &top.skill;
        let score = round3(top.score);
        let inherited_assets = inheritance::resolve_assets(&tree, skill)
            .into_iter()
            .filter(|a| !a.is_own())
            .collect();
        let inherited_scripts = inheritance::resolve_scripts(&tree, skill)
            .into_iter()
            .filter(|s| !s.is_own())
            .collect();

        info!(skill = %skill.path, score, "Serving skill");
        self.emit(
            EventType::SkillServed,
            json!({
                "skill_path": skill.path,
                "score": score,
                "matched_keywords": top.matched_keywords,
                "context": context,
            }),
        );

        SkillMatch::Selected(Box::new(SelectedSkill {
            skill_path: skill.path.clone(),
            score,
            matched_keywords: top.matched_keywords.clone(),
            description: skill.frontmatter.description.clone(),
            content: inheritance::resolve_content(&tree, skill),
            assets: skill.assets.clone(),
            scripts: skill.scripts.clone(),
            inherited_assets,
            inherited_scripts,
        }))
    }

    /// Browse the skill hierarchy, optionally from a subtree
    pub async fn list_skills(&self, path: Option<&str>) -> SkillTreeNode {
        self.index.tree(path).await
    }

    /// Read a declared asset or script file from a skill or its ancestors
    ///
    /// # Errors
    /// Unknown skill, path traversal, undeclared file, file missing on disk,
    /// file over the size ceiling, or an I/O failure
    pub async fn get_asset(&self, skill_path: &str, file: &str) -> Result<AssetPayload> {
        let tree = self.index.snapshot().await;
        let skill = tree
            .get(skill_path)
            .ok_or_else(|| SkillError::SkillNotFound(skill_path.to_string()))?;

        if crate::assets::has_path_traversal(file) {
            return Err(SkillError::PathTraversal(file.to_string()));
        }

        let (found, resolved_from) = inheritance::find_in_chain(&tree, skill, file).ok_or_else(|| {
            SkillError::AssetNotFound {
                skill: skill_path.to_string(),
                file: file.to_string(),
            }
        })?;

        let path = found.absolute_path();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(SkillError::AssetFileMissing(file.to_string()));
        }

        let (kind, asset_type) = match &found {
            ChainFile::Asset(asset) => (ServedKind::Asset, Some(asset.asset_type)),
            ChainFile::Script(_) => (ServedKind::Script, None),
        };

        let binary = is_binary_file(file);
        let (body, size_bytes) = if binary {
            let read = read_base64(path, self.assets.max_size_bytes).await?;
            (
                AssetBody::Binary {
                    content_base64: read.content,
                    mime_type: mime_type(file).to_string(),
                },
                read.size_bytes,
            )
        } else {
            let read = read_text(path, self.assets.max_size_bytes).await?;
            (AssetBody::Text { content: read.content }, read.size_bytes)
        };

        debug!(skill = %skill_path, file, size_bytes, "Serving asset");
        self.emit(
            EventType::AssetServed,
            json!({
                "skill_path": skill_path,
                "file": file,
                "size_bytes": size_bytes,
                "binary": binary,
                "resolved_from": resolved_from,
            }),
        );

        Ok(AssetPayload {
            skill_path: skill_path.to_string(),
            file: file.to_string(),
            kind,
            asset_type,
            size_bytes,
            body,
            resolved_from,
        })
    }

    /// Run a server-side script declared by a skill
    ///
    /// # Errors
    /// See [`ScriptSandbox::run`]
    pub async fn run_script(
        &self,
        skill_path: &str,
        file: &str,
        args: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<ScriptRun> {
        let tree = self.index.snapshot().await;
        let result = self.sandbox.run(&tree, skill_path, file, args, cwd).await;

        match &result {
            Ok(run) => self.emit(
                EventType::ScriptExecuted,
                json!({
                    "skill_path": skill_path,
                    "script": file,
                    "success": run.success,
                    "exit_code": run.exit_code,
                    "duration_ms": run.duration_ms,
                    "timed_out": false,
                }),
            ),
            Err(SkillError::ExecutionTimeout { duration_ms, .. }) => self.emit(
                EventType::ScriptExecuted,
                json!({
                    "skill_path": skill_path,
                    "script": file,
                    "success": false,
                    "duration_ms": duration_ms,
                    "timed_out": true,
                }),
            ),
            Err(_) => {}
        }

        result
    }

    /// Rebuild the index on request
    ///
    /// # Errors
    /// Scan failures other than a rebuild already being in flight
    pub async fn refresh_skills(&self) -> Result<RefreshOutcome> {
        self.refresh(RefreshTrigger::Manual).await
    }

    /// Rebuild the index, coalescing with any rebuild already running
    ///
    /// # Errors
    /// Scan failures other than a rebuild already being in flight
    pub async fn refresh(&self, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
        match self.index.try_rebuild().await {
            Ok(tree) => {
                info!(
                    trigger = ?trigger,
                    skills = tree.len(),
                    generation = tree.generation(),
                    "Skills refreshed"
                );
                self.emit(
                    EventType::RefreshPerformed,
                    json!({
                        "trigger": trigger,
                        "skills_reindexed": tree.len(),
                        "generation": tree.generation(),
                    }),
                );
                Ok(RefreshOutcome {
                    success: true,
                    skills_reindexed: tree.len(),
                    generation: tree.generation(),
                    skipped: false,
                    reason: None,
                })
            }
            Err(SkillError::IndexUnavailable) => {
                debug!(trigger = ?trigger, "Rebuild already running, skipping");
                let tree = self.index.snapshot().await;
                Ok(RefreshOutcome {
                    success: true,
                    skills_reindexed: tree.len(),
                    generation: tree.generation(),
                    skipped: true,
                    reason: Some(SkillError::IndexUnavailable.code().to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Record caller feedback about a served skill
    pub fn report_usage(&self, skill_path: &str, useful: bool, comment: Option<&str>) -> UsageReceipt {
        info!(skill = %skill_path, useful, "Usage reported");
        self.emit(
            EventType::SkillFeedback,
            json!({
                "skill_path": skill_path,
                "useful": useful,
                "comment": comment,
            }),
        );
        UsageReceipt { recorded: true }
    }
}

fn candidate(hit: &SearchHit) -> Candidate {
    Candidate {
        skill_path: hit.skill.path.clone(),
        score: round3(hit.score),
        description: hit.skill.frontmatter.description.clone(),
        matched_keywords: hit.matched_keywords.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<TelemetryEvent>>);

    impl TelemetrySink for Recorder {
        fn emit(&self, event: TelemetryEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_round3() {
        assert!((round3(0.666_666) - 0.667).abs() < f64::EPSILON);
        assert!((round3(1.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_match_serializes_with_status_tag() {
        let no_match = SkillMatch::NoMatch {
            message: "none".into(),
        };
        let value = serde_json::to_value(&no_match).unwrap();
        assert_eq!(value["status"], "no_match");
        assert_eq!(value["message"], "none");
    }

    #[test]
    fn test_binary_body_flattens() {
        let payload = AssetPayload {
            skill_path: "ui".into(),
            file: "logo.png".into(),
            kind: ServedKind::Asset,
            asset_type: Some(AssetType::Image),
            size_bytes: 4,
            body: AssetBody::Binary {
                content_base64: "iVBORw==".into(),
                mime_type: "image/png".into(),
            },
            resolved_from: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["content_base64"], "iVBORw==");
        assert_eq!(value["mime_type"], "image/png");
        assert_eq!(value["type"], "image");
        assert!(value.get("content").is_none());
        assert!(value.get("resolved_from").is_none());
    }

    #[tokio::test]
    async fn test_feedback_is_emitted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = Arc::new(SkillIndex::new(tmp.path(), MatchingConfig::default()));
        let recorder = Arc::new(Recorder::default());
        let service = SkillService::new(index, &SkillsConfig::default(), recorder.clone());

        let receipt = service.report_usage("ui/react/auth", true, Some("spot on"));
        assert!(receipt.recorded);

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::SkillFeedback);
        assert_eq!(events[0].data["comment"], "spot on");
    }

    #[tokio::test]
    async fn test_refresh_on_empty_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = Arc::new(SkillIndex::new(tmp.path(), MatchingConfig::default()));
        let recorder = Arc::new(Recorder::default());
        let service = SkillService::new(index, &SkillsConfig::default(), recorder.clone());

        let outcome = service.refresh_skills().await.unwrap();
        assert!(outcome.success);
        assert!(!outcome.skipped);
        assert_eq!(outcome.skills_reindexed, 0);
        assert_eq!(recorder.0.lock().unwrap()[0].event_type, EventType::RefreshPerformed);
    }
}
