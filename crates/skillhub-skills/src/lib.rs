//! SkillHub Skills Core
//!
//! Serves structured skill documents (markdown with YAML frontmatter) to an
//! agent on demand.
//!
//! ## Features
//!
//! - Directory-tree index with parent/child derivation and atomic rebuilds
//! - Keyword scoring with fuzzy containment and ambiguity detection
//! - Root-to-leaf inheritance of content, assets and scripts (leaf wins)
//! - Size-checked asset reads, base64 for binary files
//! - Sandboxed script execution: allow-listed interpreters, timeouts with
//!   SIGTERM/SIGKILL escalation, capped output
//! - Fire-and-forget telemetry and scheduled refresh collaborators
//!
//! ## Architecture
//!
//! Build: scan `*.md` files, parse frontmatter, resolve declared files, link parents
//! Serve: every operation reads one immutable tree generation
//! Refresh: rebuild off to the side, then swap the generation in one step

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod assets;
pub mod config;
pub mod error;
pub mod index;
pub mod inheritance;
pub mod matcher;
pub mod parser;
pub mod refresh;
pub mod sandbox;
pub mod service;
pub mod telemetry;

pub use config::SkillsConfig;
pub use error::{ErrorKind, ErrorResponse, Result, SkillError};
pub use index::{SearchHit, SkillIndex, SkillTree};
pub use refresh::{ChangeNotifier, RefreshScheduler};
pub use sandbox::{ScriptRun, ScriptSandbox};
pub use service::{SkillMatch, SkillService};
pub use telemetry::{NoopTelemetry, TelemetryService, TelemetrySink, Tracker};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ChangeNotifier, RefreshScheduler, SkillError, SkillIndex, SkillMatch, SkillService,
        SkillsConfig, TelemetryService,
    };
}
