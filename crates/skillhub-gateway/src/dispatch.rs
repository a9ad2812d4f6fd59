//! JSON-lines invocation surface
//!
//! One request per line on stdin:
//! `{"id": 1, "tool": "get_skill", "params": {"context": "..."}}`
//! One response per line on stdout: `{"id": 1, "result": ...}`. Failures are
//! regular results carrying an `ErrorResponse`. Requests run concurrently,
//! so responses may arrive out of order and are matched by `id`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillhub_skills::{ErrorKind, ErrorResponse, SkillService};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Value,
    pub result: Value,
}

#[derive(Debug, Deserialize)]
struct GetSkillParams {
    context: String,
}

#[derive(Debug, Deserialize)]
struct ListSkillsParams {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetAssetParams {
    skill_path: String,
    file: String,
}

#[derive(Debug, Deserialize)]
struct RunScriptParams {
    skill_path: String,
    file: String,
    #[serde(default)]
    args: HashMap<String, Value>,
    #[serde(default)]
    cwd: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ReportUsageParams {
    skill_path: String,
    useful: bool,
    #[serde(default)]
    comment: Option<String>,
}

type ToolResult = std::result::Result<Value, ErrorResponse>;

fn validation_error(code: &str, message: impl Into<String>) -> ErrorResponse {
    ErrorResponse::new(ErrorKind::ValidationFailed, code, message)
}

fn parse_params<T: DeserializeOwned>(params: Value) -> std::result::Result<T, ErrorResponse> {
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| validation_error("invalid_params", format!("Invalid params: {e}")))
}

fn to_result<T: Serialize>(value: &T) -> ToolResult {
    serde_json::to_value(value).map_err(|e| {
        ErrorResponse::new(ErrorKind::ExecutionFailed, "serialization_failed", e.to_string())
    })
}

/// Script arguments arrive as JSON scalars and are passed on as text
fn stringify_args(args: HashMap<String, Value>) -> HashMap<String, String> {
    args.into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, text)
        })
        .collect()
}

/// Routes tool calls to the skill service
pub struct Dispatcher {
    service: Arc<SkillService>,
}

impl Dispatcher {
    pub fn new(service: Arc<SkillService>) -> Self {
        Self { service }
    }

    /// Handle one request line
    pub async fn handle_line(&self, line: &str) -> Response {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                let error = validation_error("malformed_request", format!("Malformed request: {e}"));
                return Response {
                    id: Value::Null,
                    result: serde_json::to_value(error).unwrap_or(Value::Null),
                };
            }
        };

        debug!(tool = %request.tool, "Dispatching request");
        let result = match self.call(&request.tool, request.params).await {
            Ok(value) => value,
            Err(error) => serde_json::to_value(error).unwrap_or(Value::Null),
        };

        Response {
            id: request.id,
            result,
        }
    }

    async fn call(&self, tool: &str, params: Value) -> ToolResult {
        match tool {
            "get_skill" => {
                let p: GetSkillParams = parse_params(params)?;
                to_result(&self.service.get_skill(&p.context).await)
            }
            "list_skills" => {
                let p: ListSkillsParams = parse_params(params)?;
                to_result(&self.service.list_skills(p.path.as_deref()).await)
            }
            "get_asset" => {
                let p: GetAssetParams = parse_params(params)?;
                let payload = self.service.get_asset(&p.skill_path, &p.file).await?;
                to_result(&payload)
            }
            "run_script" => {
                let p: RunScriptParams = parse_params(params)?;
                let args = stringify_args(p.args);
                let run = self
                    .service
                    .run_script(&p.skill_path, &p.file, &args, p.cwd.as_deref())
                    .await?;
                to_result(&run)
            }
            "refresh_skills" => {
                let outcome = self.service.refresh_skills().await?;
                to_result(&outcome)
            }
            "report_usage" => {
                let p: ReportUsageParams = parse_params(params)?;
                to_result(&self.service.report_usage(
                    &p.skill_path,
                    p.useful,
                    p.comment.as_deref(),
                ))
            }
            other => Err(validation_error(
                "unknown_tool",
                format!(
                    "Unknown tool '{other}'. Available: get_skill, list_skills, get_asset, \
                     run_script, refresh_skills, report_usage"
                ),
            )),
        }
    }
}

/// Serve requests until the input closes and every in-flight request has answered
///
/// Each line is handled on its own task; a single writer emits responses as
/// they complete.
pub async fn serve<R, W>(dispatcher: Arc<Dispatcher>, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let mut tx = Some(tx);
    let mut tasks = JoinSet::new();
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line(), if tx.is_some() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Some(tx) = &tx {
                        let tx = tx.clone();
                        let dispatcher = Arc::clone(&dispatcher);
                        tasks.spawn(async move {
                            let response = dispatcher.handle_line(&line).await;
                            if tx.send(response).is_err() {
                                debug!("Response dropped, writer is gone");
                            }
                        });
                    }
                }
                None => {
                    info!("Input closed, waiting for {} in-flight requests", tasks.len());
                    tx = None;
                }
            },
            Some(response) = rx.recv() => {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
            Some(joined) = tasks.join_next() => {
                if let Err(e) = joined {
                    warn!("Request task failed: {}", e);
                }
            }
            else => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillhub_skills::config::SkillsConfig;
    use skillhub_skills::{NoopTelemetry, SkillIndex};
    use std::fs;

    async fn dispatcher(tmp: &tempfile::TempDir) -> Arc<Dispatcher> {
        fs::create_dir_all(tmp.path().join("deploy/scripts")).unwrap();
        fs::write(
            tmp.path().join("deploy.md"),
            concat!(
                "---\nkeywords: [deploy, release]\ndescription: Deployments\n",
                "scripts:\n  - file: scripts/slow.sh\n    execution: server\n",
                "---\nShip carefully.\n",
            ),
        )
        .unwrap();
        fs::write(tmp.path().join("deploy/scripts/slow.sh"), "sleep 3\necho done\n").unwrap();
        let config = SkillsConfig::default();
        let index = SkillIndex::build(tmp.path(), config.matching.clone())
            .await
            .unwrap();
        let service = SkillService::new(Arc::new(index), &config, Arc::new(NoopTelemetry));
        Arc::new(Dispatcher::new(Arc::new(service)))
    }

    async fn run(dispatcher: &Arc<Dispatcher>, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(Arc::clone(dispatcher), input.as_bytes(), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn by_id<'a>(responses: &'a [Value], id: &Value) -> &'a Value {
        responses
            .iter()
            .find(|r| &r["id"] == id)
            .unwrap_or_else(|| panic!("no response with id {id}"))
    }

    #[tokio::test]
    async fn test_get_skill_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp).await;

        let responses = run(
            &dispatcher,
            "{\"id\": 7, \"tool\": \"get_skill\", \"params\": {\"context\": \"deploy release\"}}\n",
        )
        .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 7);
        assert_eq!(responses[0]["result"]["status"], "selected");
        assert_eq!(responses[0]["result"]["skill_path"], "deploy");
    }

    #[tokio::test]
    async fn test_list_skills_without_params() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp).await;

        let responses = run(&dispatcher, "{\"id\": \"a\", \"tool\": \"list_skills\"}\n\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["result"]["children"][0]["path"], "deploy");
    }

    #[tokio::test]
    async fn test_errors_are_results() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp).await;

        let input = concat!(
            "not json\n",
            "{\"id\": 1, \"tool\": \"launch_rockets\"}\n",
            "{\"id\": 2, \"tool\": \"get_asset\", \"params\": {\"skill_path\": \"deploy\"}}\n",
            "{\"id\": 3, \"tool\": \"get_asset\", \"params\": {\"skill_path\": \"nope\", \"file\": \"a.md\"}}\n",
        );
        let responses = run(&dispatcher, input).await;
        assert_eq!(responses.len(), 4);

        let malformed = by_id(&responses, &Value::Null);
        let unknown = by_id(&responses, &serde_json::json!(1));
        let invalid = by_id(&responses, &serde_json::json!(2));
        assert_eq!(malformed["result"]["code"], "malformed_request");
        assert_eq!(unknown["result"]["code"], "unknown_tool");
        assert_eq!(invalid["result"]["code"], "invalid_params");
        for response in [malformed, unknown, invalid] {
            assert_eq!(response["result"]["kind"], "validation_failed");
            assert_eq!(response["result"]["error"], true);
        }
        let missing = by_id(&responses, &serde_json::json!(3));
        assert_eq!(missing["result"]["kind"], "not_found");
        assert_eq!(missing["result"]["code"], "skill_not_found");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_script_does_not_block_other_requests() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp).await;

        let input = concat!(
            "{\"id\": 1, \"tool\": \"run_script\", \"params\": {\"skill_path\": \"deploy\", \"file\": \"scripts/slow.sh\"}}\n",
            "{\"id\": 2, \"tool\": \"list_skills\"}\n",
        );
        let responses = run(&dispatcher, input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 2);
        assert_eq!(responses[1]["id"], 1);
        assert_eq!(responses[1]["result"]["success"], true);
        assert_eq!(responses[1]["result"]["stdout"], "done\n");
    }

    #[test]
    fn test_script_args_are_stringified() {
        let args = HashMap::from([
            ("count".to_string(), serde_json::json!(3)),
            ("dry_run".to_string(), serde_json::json!(true)),
            ("name".to_string(), serde_json::json!("prod")),
            ("unset".to_string(), Value::Null),
        ]);
        let args = stringify_args(args);
        assert_eq!(args["count"], "3");
        assert_eq!(args["dry_run"], "true");
        assert_eq!(args["name"], "prod");
        assert!(!args.contains_key("unset"));
    }
}
