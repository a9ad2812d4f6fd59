//! SkillHub Types - Core types for the SkillHub skill server
//!
//! This module defines the data model shared by the index, the resolvers and
//! the gateway: frontmatter declarations, indexed skills, resolved assets and
//! scripts, and the display tree used for listing.

pub mod events;

pub use events::{EventType, TelemetryEvent};

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Skill path reserved for the top-level root document
pub const ROOT_SKILL_PATH: &str = "_root";

/// Base name of a directory aggregator document
pub const AGGREGATOR_NAME: &str = "_index";

// ============================================================================
// Frontmatter Declarations
// ============================================================================

/// Kind of a declared asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Template,
    Config,
    Example,
    Schema,
    Image,
    #[default]
    #[serde(other)]
    Other,
}

/// Who is expected to run a declared script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Fetched by the calling agent and run on its side
    #[default]
    #[serde(alias = "claude")]
    Agent,
    /// Run by this server through the script sandbox
    Server,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Agent => write!(f, "agent"),
            ExecutionMode::Server => write!(f, "server"),
        }
    }
}

/// Named argument accepted by a declared script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptArg {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
}

/// Asset entry as written in frontmatter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDeclaration {
    pub file: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub asset_type: AssetType,
}

/// Script entry as written in frontmatter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDeclaration {
    pub file: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub execution: ExecutionMode,
    #[serde(default)]
    pub args: Vec<ScriptArg>,
}

/// Validated frontmatter of a skill document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frontmatter {
    pub keywords: Vec<String>,
    pub description: String,
    pub inherit: bool,
    pub priority: f64,
    pub assets: Vec<AssetDeclaration>,
    pub scripts: Vec<ScriptDeclaration>,
}

impl Frontmatter {
    /// Minimal frontmatter with the two required fields and all defaults
    pub fn new(keywords: Vec<String>, description: impl Into<String>) -> Self {
        Self {
            keywords,
            description: description.into(),
            inherit: true,
            priority: 0.0,
            assets: Vec::new(),
            scripts: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Accept any YAML/JSON scalar and keep its textual form
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ============================================================================
// Resolved Entries
// ============================================================================

/// Asset declaration bound to a location on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAsset {
    pub file: String,
    #[serde(skip_serializing)]
    pub absolute_path: PathBuf,
    pub description: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(skip_serializing)]
    pub is_binary: bool,
}

/// Script declaration bound to a location on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedScript {
    pub file: String,
    #[serde(skip_serializing)]
    pub absolute_path: PathBuf,
    pub description: String,
    pub execution: ExecutionMode,
    pub args: Vec<ScriptArg>,
}

/// An entry merged from the inheritance chain
///
/// `from` names the ancestor skill that declared the entry; `None` means the
/// entry belongs to the skill itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inherited<T> {
    #[serde(flatten)]
    pub entry: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl<T> Inherited<T> {
    /// Whether the entry was declared by the skill itself
    pub fn is_own(&self) -> bool {
        self.from.is_none()
    }
}

// ============================================================================
// Skills
// ============================================================================

/// One indexed skill document
#[derive(Debug, Clone)]
pub struct Skill {
    /// Hierarchical identifier, e.g. `ui/react/auth` or `ui/_index`
    pub path: String,
    /// Document location relative to the content root, e.g. `ui/react/auth.md`
    pub source_file: String,
    pub frontmatter: Frontmatter,
    /// Markdown content without the frontmatter block
    pub body: String,
    /// Path of the nearest existing ancestor, resolved at index build
    pub parent: Option<String>,
    pub assets: Vec<ResolvedAsset>,
    pub scripts: Vec<ResolvedScript>,
    /// Sibling directory holding this skill's files, when present
    pub resource_dir: Option<PathBuf>,
}

impl Skill {
    /// Whether this is the reserved root skill
    pub fn is_root(&self) -> bool {
        self.path == ROOT_SKILL_PATH
    }

    /// Whether this skill takes part in inheritance
    pub fn inherits(&self) -> bool {
        self.frontmatter.inherit
    }

    /// Short display name: the last path segment, or the directory name for aggregators
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "root";
        }
        let mut segments = self.path.rsplit('/');
        let last = segments.next().unwrap_or(&self.path);
        if last == AGGREGATOR_NAME {
            segments.next().unwrap_or("index")
        } else {
            last
        }
    }
}

/// Display-oriented projection of the skill hierarchy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillTreeNode {
    pub name: String,
    pub path: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub asset_count: usize,
    pub script_count: usize,
    pub children: Vec<SkillTreeNode>,
}

impl SkillTreeNode {
    /// Leaf node describing a single skill
    pub fn from_skill(skill: &Skill) -> Self {
        Self {
            name: skill.name().to_string(),
            path: skill.path.clone(),
            description: skill.frontmatter.description.clone(),
            keywords: skill.frontmatter.keywords.clone(),
            asset_count: skill.assets.len(),
            script_count: skill.scripts.len(),
            children: Vec::new(),
        }
    }

    /// Placeholder root used when no root document exists
    pub fn empty_root() -> Self {
        Self {
            name: "root".to_string(),
            path: ROOT_SKILL_PATH.to_string(),
            description: String::new(),
            keywords: Vec::new(),
            asset_count: 0,
            script_count: 0,
            children: Vec::new(),
        }
    }

    /// Depth-first search for a node by path
    pub fn find(&self, path: &str) -> Option<&SkillTreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }
}
