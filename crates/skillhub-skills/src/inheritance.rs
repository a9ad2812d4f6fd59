//! Inheritance resolution along the root-to-leaf chain
//!
//! A skill inherits from every ancestor that itself takes part in
//! inheritance. Content is concatenated root first; declared files are merged
//! by basename with the most specific declaration winning.

use crate::index::SkillTree;
use skillhub_types::{Inherited, ResolvedAsset, ResolvedScript, Skill, AGGREGATOR_NAME};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Section label used for the root skill
pub const ROOT_LABEL: &str = "GLOBAL RULES";

/// A file found somewhere in a skill's chain
#[derive(Debug, Clone)]
pub enum ChainFile {
    /// Declared as an asset
    Asset(ResolvedAsset),
    /// Declared as a script
    Script(ResolvedScript),
}

impl ChainFile {
    /// Absolute location on disk
    #[must_use]
    pub fn absolute_path(&self) -> &Path {
        match self {
            ChainFile::Asset(asset) => &asset.absolute_path,
            ChainFile::Script(script) => &script.absolute_path,
        }
    }
}

/// Header label for a skill section
#[must_use]
pub fn section_label(skill: &Skill) -> String {
    if skill.is_root() {
        return ROOT_LABEL.to_string();
    }
    skill
        .path
        .split('/')
        .filter(|segment| *segment != AGGREGATOR_NAME)
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" > ")
}

/// Chain members that contribute to `skill`, root first, `skill` last
fn contributing_chain(tree: &SkillTree, skill: &Arc<Skill>) -> Vec<Arc<Skill>> {
    if !skill.inherits() {
        return vec![Arc::clone(skill)];
    }
    tree.chain(skill)
        .into_iter()
        .filter(|member| member.inherits() || member.path == skill.path)
        .collect()
}

/// Merge a skill's body with its ancestors' bodies
///
/// Without inheritance this is the skill's own body, untouched.
#[must_use]
pub fn resolve_content(tree: &SkillTree, skill: &Arc<Skill>) -> String {
    if !skill.inherits() {
        return skill.body.clone();
    }

    contributing_chain(tree, skill)
        .iter()
        .map(|member| {
            format!(
                "=== {} (from {}) ===\n\n{}",
                section_label(member),
                member.source_file,
                member.body
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn basename(file: &str) -> &str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}

fn merge_by_basename<T, F>(tree: &SkillTree, skill: &Arc<Skill>, entries: F) -> Vec<Inherited<T>>
where
    T: Clone + HasFile,
    F: Fn(&Skill) -> &[T],
{
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, Inherited<T>> = HashMap::new();

    for member in contributing_chain(tree, skill) {
        let from = (member.path != skill.path).then(|| member.path.clone());
        for entry in entries(&member) {
            let key = basename(entry.file()).to_string();
            if !merged.contains_key(&key) {
                order.push(key.clone());
            }
            merged.insert(
                key,
                Inherited {
                    entry: entry.clone(),
                    from: from.clone(),
                },
            );
        }
    }

    order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect()
}

/// Declared entries that carry a relative file path
pub trait HasFile {
    /// Declared relative path
    fn file(&self) -> &str;
}

impl HasFile for ResolvedAsset {
    fn file(&self) -> &str {
        &self.file
    }
}

impl HasFile for ResolvedScript {
    fn file(&self) -> &str {
        &self.file
    }
}

/// Assets visible to a skill, merged root to leaf, leaf wins on basename
#[must_use]
pub fn resolve_assets(tree: &SkillTree, skill: &Arc<Skill>) -> Vec<Inherited<ResolvedAsset>> {
    merge_by_basename(tree, skill, |s| s.assets.as_slice())
}

/// Scripts visible to a skill, merged root to leaf, leaf wins on basename
#[must_use]
pub fn resolve_scripts(tree: &SkillTree, skill: &Arc<Skill>) -> Vec<Inherited<ResolvedScript>> {
    merge_by_basename(tree, skill, |s| s.scripts.as_slice())
}

/// Find a declared file by its exact relative path, leaf first
///
/// Checks the skill's own assets then scripts; ancestors are only consulted
/// when the skill inherits. Returns the match and the ancestor path it came
/// from (`None` for the skill's own files).
#[must_use]
pub fn find_in_chain(
    tree: &SkillTree,
    skill: &Arc<Skill>,
    file: &str,
) -> Option<(ChainFile, Option<String>)> {
    let mut members = contributing_chain(tree, skill);
    members.reverse();

    members.iter().find_map(|member| {
        let found = member
            .assets
            .iter()
            .find(|a| a.file == file)
            .map(|a| ChainFile::Asset(a.clone()))
            .or_else(|| {
                member
                    .scripts
                    .iter()
                    .find(|s| s.file == file)
                    .map(|s| ChainFile::Script(s.clone()))
            })?;
        let from = (member.path != skill.path).then(|| member.path.clone());
        Some((found, from))
    })
}
