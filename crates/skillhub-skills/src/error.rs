//! Error types for skill operations

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Broad error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed frontmatter or declaration
    InvalidDeclaration,
    /// Skill, asset or script absent
    NotFound,
    /// A path tried to escape its resource directory
    PathTraversalRejected,
    /// File larger than the configured ceiling
    SizeExceeded,
    /// A script execution precondition failed
    ValidationFailed,
    /// Script exceeded its wall-clock budget
    ExecutionTimeout,
    /// Script could not be spawned or awaited
    ExecutionFailed,
    /// A rebuild is already running
    IndexUnavailable,
    /// A file or directory could not be read
    ReadFailed,
}

/// Skill system errors
#[derive(Debug, Error)]
pub enum SkillError {
    /// Frontmatter missing required fields or not parseable
    #[error("Invalid declaration in '{file}': {reason}")]
    InvalidDeclaration {
        /// Document path relative to the content root
        file: String,
        /// What was wrong
        reason: String,
    },

    /// Script execution is switched off
    #[error("Script execution is disabled globally.")]
    ExecutionDisabled,

    /// No skill with this path in the current index
    #[error("Skill '{0}' not found.")]
    SkillNotFound(String),

    /// Requested file path escapes the resource directory
    #[error("Path traversal is not allowed: '{0}'")]
    PathTraversal(String),

    /// Asset not declared by the skill or its ancestors
    #[error("Asset '{file}' not found for skill '{skill}'.")]
    AssetNotFound {
        /// Skill path
        skill: String,
        /// Requested file
        file: String,
    },

    /// Asset declared but absent on disk
    #[error("Asset file '{0}' declared but not found on filesystem.")]
    AssetFileMissing(String),

    /// Script not declared in the skill's own frontmatter
    #[error("Script '{file}' not found in skill '{skill}' frontmatter.")]
    ScriptNotDeclared {
        /// Skill path
        skill: String,
        /// Requested file
        file: String,
    },

    /// Script is meant to be run by the calling agent
    #[error(
        "Script '{file}' has execution: '{mode}'. Only scripts with execution: 'server' can be run \
         via run_script. Use get_asset to retrieve the script content and run it locally."
    )]
    WrongExecutionMode {
        /// Requested file
        file: String,
        /// Declared execution mode
        mode: String,
    },

    /// Required arguments absent from the call
    #[error("Missing required arguments: {}", .0.join(", "))]
    MissingArguments(Vec<String>),

    /// Script extension not on the allow-list
    #[error("Extension '{extension}' is not allowed. Allowed: {}", .allowed.join(", "))]
    ExtensionNotAllowed {
        /// Extension of the script file
        extension: String,
        /// Configured allow-list
        allowed: Vec<String>,
    },

    /// Script declared but absent on disk
    #[error("Script file '{0}' declared but not found on filesystem.")]
    ScriptFileMissing(String),

    /// No interpreter configured for the extension
    #[error("No runner configured for extension '{0}'.")]
    NoInterpreter(String),

    /// File exceeds the size ceiling
    #[error("Asset exceeds size limit ({size} > {limit} bytes)")]
    SizeExceeded {
        /// Actual size in bytes
        size: u64,
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// Script ran past its timeout and was terminated
    #[error("Script '{script}' killed: timeout of {timeout_secs}s exceeded.")]
    ExecutionTimeout {
        /// Script file
        script: String,
        /// Configured timeout in seconds
        timeout_secs: u64,
        /// Output captured before termination
        stdout: String,
        /// Error output captured before termination
        stderr: String,
        /// Wall-clock time until termination
        duration_ms: u64,
    },

    /// Interpreter could not be spawned or awaited
    #[error("Failed to run script '{script}': {reason}")]
    ExecutionFailed {
        /// Script file
        script: String,
        /// Failure reason
        reason: String,
    },

    /// A rebuild is already in progress
    #[error("Index rebuild already in progress")]
    IndexUnavailable,

    /// Filesystem error while reading content
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SkillError {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SkillError::Io {
            path: path.into(),
            source,
        }
    }

    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SkillError::InvalidDeclaration { .. } => ErrorKind::InvalidDeclaration,
            SkillError::SkillNotFound(_)
            | SkillError::AssetNotFound { .. }
            | SkillError::AssetFileMissing(_)
            | SkillError::ScriptNotDeclared { .. }
            | SkillError::ScriptFileMissing(_) => ErrorKind::NotFound,
            SkillError::PathTraversal(_) => ErrorKind::PathTraversalRejected,
            SkillError::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            SkillError::ExecutionDisabled
            | SkillError::WrongExecutionMode { .. }
            | SkillError::MissingArguments(_)
            | SkillError::ExtensionNotAllowed { .. }
            | SkillError::NoInterpreter(_) => ErrorKind::ValidationFailed,
            SkillError::ExecutionTimeout { .. } => ErrorKind::ExecutionTimeout,
            SkillError::ExecutionFailed { .. } => ErrorKind::ExecutionFailed,
            SkillError::Io { .. } => ErrorKind::ReadFailed,
            SkillError::IndexUnavailable => ErrorKind::IndexUnavailable,
        }
    }

    /// Stable machine-readable code, distinct per variant
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SkillError::InvalidDeclaration { .. } => "invalid_declaration",
            SkillError::ExecutionDisabled => "execution_disabled",
            SkillError::SkillNotFound(_) => "skill_not_found",
            SkillError::PathTraversal(_) => "path_traversal",
            SkillError::AssetNotFound { .. } => "asset_not_found",
            SkillError::AssetFileMissing(_) => "asset_file_missing",
            SkillError::ScriptNotDeclared { .. } => "script_not_declared",
            SkillError::WrongExecutionMode { .. } => "wrong_execution_mode",
            SkillError::MissingArguments(_) => "missing_arguments",
            SkillError::ExtensionNotAllowed { .. } => "extension_not_allowed",
            SkillError::ScriptFileMissing(_) => "script_file_missing",
            SkillError::NoInterpreter(_) => "no_interpreter",
            SkillError::SizeExceeded { .. } => "size_exceeded",
            SkillError::ExecutionTimeout { .. } => "execution_timeout",
            SkillError::ExecutionFailed { .. } => "spawn_failed",
            SkillError::IndexUnavailable => "index_unavailable",
            SkillError::Io { .. } => "io",
        }
    }
}

/// Structured error returned to callers instead of raising
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Always `true`, lets callers branch without inspecting the shape
    pub error: bool,
    /// Broad category
    pub kind: ErrorKind,
    /// Specific code
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Extra data, such as partial output of a timed out script
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Build an error response outside the [`SkillError`] taxonomy
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: true,
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&SkillError> for ErrorResponse {
    fn from(err: &SkillError) -> Self {
        let details = match err {
            SkillError::ExecutionTimeout {
                script,
                stdout,
                stderr,
                duration_ms,
                ..
            } => Some(serde_json::json!({
                "script": script,
                "stdout": stdout,
                "stderr": stderr,
                "duration_ms": duration_ms,
                "timed_out": true,
            })),
            _ => None,
        };

        Self {
            error: true,
            kind: err.kind(),
            code: err.code().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

impl From<SkillError> for ErrorResponse {
    fn from(err: SkillError) -> Self {
        ErrorResponse::from(&err)
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, SkillError>;
