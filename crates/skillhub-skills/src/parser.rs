//! Skill document parsing
//!
//! Each skill is a markdown file with a YAML frontmatter block:
//!
//! ```text
//! ---
//! keywords: [react, auth]
//! description: Authentication flows for React apps
//! ---
//! # Body
//! ```

use crate::error::{Result, SkillError};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use skillhub_types::{AssetDeclaration, Frontmatter, ScriptDeclaration};
use tracing::warn;

/// A document split into validated frontmatter and body
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Validated frontmatter
    pub frontmatter: Frontmatter,
    /// Trimmed markdown body
    pub body: String,
}

/// Frontmatter parser, compiled once per index build
pub struct DocumentParser {
    frontmatter_re: Regex,
}

impl DocumentParser {
    /// Compile the frontmatter pattern
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile
    pub fn new() -> Result<Self> {
        let frontmatter_re =
            Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n(.*))?\z").map_err(
                |e| SkillError::InvalidDeclaration {
                    file: String::new(),
                    reason: format!("Failed to compile frontmatter regex: {e}"),
                },
            )?;
        Ok(Self { frontmatter_re })
    }

    /// Parse one document; `file` is only used in diagnostics
    ///
    /// # Errors
    /// Returns [`SkillError::InvalidDeclaration`] when the frontmatter is
    /// missing, unparseable, or lacks `keywords`/`description`
    pub fn parse(&self, file: &str, content: &str) -> Result<ParsedDocument> {
        let invalid = |reason: String| SkillError::InvalidDeclaration {
            file: file.to_string(),
            reason,
        };

        let captures = self
            .frontmatter_re
            .captures(content)
            .ok_or_else(|| invalid("no YAML frontmatter found".to_string()))?;

        let yaml_str = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str()).trim().to_string();

        let raw: Value = if yaml_str.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(yaml_str).map_err(|e| invalid(format!("bad YAML: {e}")))?
        };

        let Value::Mapping(map) = raw else {
            return Err(invalid(
                "frontmatter must be a mapping with keywords and description".to_string(),
            ));
        };

        let frontmatter = frontmatter_from_mapping(file, &map).map_err(invalid)?;
        Ok(ParsedDocument { frontmatter, body })
    }
}

fn frontmatter_from_mapping(
    file: &str,
    map: &Mapping,
) -> std::result::Result<Frontmatter, String> {
    let keywords: Vec<String> = match map.get("keywords") {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    };
    if keywords.is_empty() {
        return Err("keywords must be a non-empty list".to_string());
    }

    let description = match map.get("description") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err("description must be a non-empty string".to_string()),
    };

    // Anything but an explicit `false` keeps inheritance on
    let inherit = !matches!(map.get("inherit"), Some(Value::Bool(false)));

    let priority = map
        .get("priority")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let assets: Vec<AssetDeclaration> = declarations(file, "assets", map.get("assets"));
    let scripts: Vec<ScriptDeclaration> = declarations(file, "scripts", map.get("scripts"));

    for script in &scripts {
        for arg in script.args.iter().filter(|a| a.required && a.default.is_some()) {
            warn!(
                "{}: argument '{}' of script '{}' is required but also has a default; \
                 the default is ignored for the missing-argument check",
                file, arg.name, script.file
            );
        }
    }

    Ok(Frontmatter {
        keywords,
        description,
        inherit,
        priority,
        assets,
        scripts,
    })
}

/// Deserialize each list entry on its own so one bad entry does not sink the document
fn declarations<T: DeserializeOwned>(file: &str, field: &str, value: Option<&Value>) -> Vec<T> {
    let Some(Value::Sequence(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_yaml::from_value::<T>(item.clone()) {
            Ok(decl) => Some(decl),
            Err(e) => {
                warn!("{}: skipping malformed entry in '{}': {}", file, field, e);
                None
            }
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use skillhub_types::{AssetType, ExecutionMode};

    fn parser() -> DocumentParser {
        DocumentParser::new().unwrap()
    }

    #[test]
    fn test_parse_full_document() {
        let content = r"---
keywords: [react, auth, 2fa]
description: Authentication components for React
priority: 5
assets:
  - file: assets/auth-config.example.ts
    description: Example config
    type: example
scripts:
  - file: scripts/validate-auth-config.ts
    description: Validate config
    execution: server
    args:
      - name: config_path
        description: Path to the config
---

# React Auth

Use the provider pattern.
";
        let doc = parser().parse("ui/react/auth.md", content).unwrap();
        assert_eq!(doc.frontmatter.keywords, vec!["react", "auth", "2fa"]);
        assert!(doc.frontmatter.inherit);
        assert!((doc.frontmatter.priority - 5.0).abs() < f64::EPSILON);
        assert_eq!(doc.frontmatter.assets[0].asset_type, AssetType::Example);
        assert_eq!(doc.frontmatter.scripts[0].execution, ExecutionMode::Server);
        assert!(doc.frontmatter.scripts[0].args[0].required);
        assert!(doc.body.starts_with("# React Auth"));
    }

    #[test]
    fn test_missing_keywords_is_invalid() {
        let content = "---\ndescription: No keywords here\n---\nBody\n";
        let err = parser().parse("x.md", content).unwrap_err();
        assert!(matches!(err, SkillError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_empty_description_is_invalid() {
        let content = "---\nkeywords: [a]\ndescription: \"\"\n---\nBody\n";
        assert!(parser().parse("x.md", content).is_err());
    }

    #[test]
    fn test_no_frontmatter_is_invalid() {
        assert!(parser().parse("x.md", "# Just markdown\n").is_err());
    }

    #[test]
    fn test_inherit_false_and_numeric_keywords() {
        let content = "---\nkeywords: [http, 404]\ndescription: Errors\ninherit: false\n---\n";
        let doc = parser().parse("x.md", content).unwrap();
        assert!(!doc.frontmatter.inherit);
        assert_eq!(doc.frontmatter.keywords, vec!["http", "404"]);
        assert_eq!(doc.body, "");
    }

    #[test]
    fn test_malformed_asset_entry_is_skipped() {
        let content = r"---
keywords: [a]
description: d
assets:
  - description: missing file field
  - file: ok.txt
---
body";
        let doc = parser().parse("x.md", content).unwrap();
        assert_eq!(doc.frontmatter.assets.len(), 1);
        assert_eq!(doc.frontmatter.assets[0].file, "ok.txt");
    }
}
