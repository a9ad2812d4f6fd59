//! In-memory skill index
//!
//! The index is built in two passes over the content root:
//! - Pass 1: parse every markdown document and resolve its declared files
//! - Pass 2: link each skill to its nearest existing ancestor
//!
//! A build produces an immutable [`SkillTree`] generation. Rebuilds construct a
//! fresh generation off to the side and swap a single `Arc`, so readers always
//! see a complete tree.

use crate::assets::{resolve_assets, resolve_scripts};
use crate::config::MatchingConfig;
use crate::error::{Result, SkillError};
use crate::matcher;
use crate::parser::DocumentParser;
use skillhub_types::{Skill, SkillTreeNode, AGGREGATOR_NAME, ROOT_SKILL_PATH};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const ROOT_FILE: &str = "_root.md";

/// A scored search candidate
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Matching skill
    pub skill: Arc<Skill>,
    /// Relevance score
    pub score: f64,
    /// Keywords that matched, lowercased
    pub matched_keywords: Vec<String>,
}

/// One immutable generation of indexed skills
#[derive(Debug, Default)]
pub struct SkillTree {
    generation: u64,
    skills: HashMap<String, Arc<Skill>>,
}

impl SkillTree {
    /// Build a generation from already-parsed skills, linking parents
    #[must_use]
    pub fn from_skills(generation: u64, skills: Vec<Skill>) -> Self {
        let mut by_path: HashMap<String, Skill> = HashMap::with_capacity(skills.len());
        for skill in skills {
            insert_unique(&mut by_path, skill);
        }

        // Pass 2: parent links, computed before any skill is shared
        let parents: Vec<(String, Option<String>)> = by_path
            .keys()
            .map(|path| (path.clone(), nearest_existing_parent(path, &by_path)))
            .collect();
        for (path, parent) in parents {
            if let Some(skill) = by_path.get_mut(&path) {
                skill.parent = parent;
            }
        }

        let skills = by_path
            .into_iter()
            .map(|(path, skill)| (path, Arc::new(skill)))
            .collect();

        Self { generation, skills }
    }

    /// Scan a content root (blocking filesystem access)
    ///
    /// Invalid or unreadable documents are logged and skipped.
    ///
    /// # Errors
    /// Returns an error only if the frontmatter parser cannot be built
    pub fn scan(content_root: &Path, generation: u64) -> Result<Self> {
        if !content_root.is_dir() {
            warn!("Content root is not a directory: {:?}", content_root);
            return Ok(Self {
                generation,
                skills: HashMap::new(),
            });
        }

        let parser = DocumentParser::new()?;
        let mut skills = Vec::new();
        let mut skipped = 0usize;

        let walker = WalkDir::new(content_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            let file_path = entry.path();
            if !entry.file_type().is_file()
                || file_path.extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }

            match load_skill(&parser, content_root, file_path) {
                Ok(skill) => {
                    debug!("Indexed skill: {} from {}", skill.path, skill.source_file);
                    skills.push(skill);
                }
                Err(e) => {
                    warn!("Skipping {:?}: {}", file_path, e);
                    skipped += 1;
                }
            }
        }

        let tree = Self::from_skills(generation, skills);
        info!(
            skills = tree.len(),
            skipped,
            generation,
            "Indexed skills from {:?}",
            content_root
        );
        Ok(tree)
    }

    /// Generation number of this tree
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Look up a skill by path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Arc<Skill>> {
        self.skills.get(path)
    }

    /// Number of indexed skills
    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether the tree holds no skills
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// All skill paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.skills.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Ancestor chain from the root down to `skill`, inclusive
    #[must_use]
    pub fn chain(&self, skill: &Arc<Skill>) -> Vec<Arc<Skill>> {
        let mut chain = vec![Arc::clone(skill)];
        let mut current = skill.parent.as_deref();

        while let Some(path) = current {
            if chain.len() > self.skills.len() {
                warn!("Parent chain of '{}' does not terminate", skill.path);
                break;
            }
            let Some(parent) = self.skills.get(path) else {
                break;
            };
            chain.push(Arc::clone(parent));
            current = parent.parent.as_deref();
        }

        chain.reverse();
        chain
    }

    /// Score every skill against `context`
    ///
    /// Keeps hits at or above `min_score`, best first, at most
    /// `2 * max_results` so callers can detect ambiguity.
    #[must_use]
    pub fn search(&self, context: &str, matching: &MatchingConfig) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .skills
            .values()
            .filter_map(|skill| {
                let scored = matcher::score(
                    context,
                    &skill.frontmatter.keywords,
                    skill.frontmatter.priority,
                );
                (scored.score > 0.0 && scored.score >= matching.min_score).then(|| SearchHit {
                    skill: Arc::clone(skill),
                    score: scored.score,
                    matched_keywords: scored.matched_keywords,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.skill.path.cmp(&b.skill.path))
        });
        hits.truncate(matching.max_results.saturating_mul(2));
        hits
    }

    /// Project the skills into a display tree
    ///
    /// With a filter, returns the subtree at that path or at its aggregator
    /// (`<path>/_index`); an unknown filter yields the full tree.
    #[must_use]
    pub fn project(&self, filter: Option<&str>) -> SkillTreeNode {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for path in self.paths() {
            if path == ROOT_SKILL_PATH {
                continue;
            }
            let parent = self
                .skills
                .get(path)
                .and_then(|s| s.parent.as_deref())
                .filter(|p| self.skills.contains_key(*p))
                .unwrap_or(ROOT_SKILL_PATH);
            children.entry(parent).or_default().push(path);
        }

        let mut root = self
            .skills
            .get(ROOT_SKILL_PATH)
            .map_or_else(SkillTreeNode::empty_root, |s| SkillTreeNode::from_skill(s));
        root.children = self.project_children(ROOT_SKILL_PATH, &children);

        let Some(filter) = filter.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) else {
            return root;
        };

        let aggregator = format!("{filter}/{AGGREGATOR_NAME}");
        if let Some(node) = root.find(filter).or_else(|| root.find(&aggregator)) {
            return node.clone();
        }
        debug!("Tree filter '{}' matched nothing, returning full tree", filter);
        root
    }

    fn project_children(
        &self,
        parent: &str,
        children: &HashMap<&str, Vec<&str>>,
    ) -> Vec<SkillTreeNode> {
        children
            .get(parent)
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(|path| self.skills.get(*path))
                    .map(|skill| {
                        let mut node = SkillTreeNode::from_skill(skill);
                        node.children = self.project_children(&skill.path, children);
                        node
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Keep the first skill per path; at the root, `_root.md` beats `_index.md`
fn insert_unique(skills: &mut HashMap<String, Skill>, skill: Skill) {
    match skills.get(&skill.path) {
        None => {
            skills.insert(skill.path.clone(), skill);
        }
        Some(existing) if skill.is_root() && skill.source_file == ROOT_FILE => {
            warn!(
                "Both {} and {} claim the root; using {}",
                existing.source_file, skill.source_file, ROOT_FILE
            );
            skills.insert(skill.path.clone(), skill);
        }
        Some(existing) => {
            warn!(
                "Duplicate skill path '{}': keeping {}, skipping {}",
                skill.path, existing.source_file, skill.source_file
            );
        }
    }
}

/// Convert a document location (relative, `/`-separated) to a skill path
///
/// `_root.md` and a top-level `_index.md` map to the root; every other
/// document keeps its relative path without the extension, so a directory
/// aggregator becomes `<dir>/_index`.
#[must_use]
pub fn skill_path_for(relative_file: &str) -> String {
    let normalized = relative_file.replace('\\', "/");
    let stem = normalized.strip_suffix(".md").unwrap_or(&normalized);
    if stem == ROOT_SKILL_PATH || stem == AGGREGATOR_NAME {
        ROOT_SKILL_PATH.to_string()
    } else {
        stem.to_string()
    }
}

/// Parent implied by the path structure alone
///
/// An aggregator's parent is the aggregator one directory up; any other
/// skill's parent is the aggregator of its own directory. Top-level skills
/// hang off the root.
#[must_use]
pub fn structural_parent(path: &str) -> Option<String> {
    if path == ROOT_SKILL_PATH {
        return None;
    }

    let mut segments: Vec<&str> = path.split('/').collect();
    let last = segments.pop().unwrap_or_default();
    if last == AGGREGATOR_NAME {
        segments.pop();
    }

    if segments.is_empty() {
        Some(ROOT_SKILL_PATH.to_string())
    } else {
        Some(format!("{}/{}", segments.join("/"), AGGREGATOR_NAME))
    }
}

/// Walk up structural parents until one exists in `skills`
fn nearest_existing_parent(path: &str, skills: &HashMap<String, Skill>) -> Option<String> {
    let mut candidate = structural_parent(path);
    while let Some(parent) = candidate {
        if skills.contains_key(&parent) {
            return Some(parent);
        }
        candidate = structural_parent(&parent);
    }
    None
}

fn load_skill(parser: &DocumentParser, content_root: &Path, file_path: &Path) -> Result<Skill> {
    let relative = file_path
        .strip_prefix(content_root)
        .unwrap_or(file_path)
        .to_string_lossy()
        .replace('\\', "/");

    let content =
        std::fs::read_to_string(file_path).map_err(|e| SkillError::io(file_path, e))?;
    let document = parser.parse(&relative, &content)?;

    let resource_dir = resource_dir_for(file_path);
    let assets = resolve_assets(&document.frontmatter.assets, resource_dir.as_deref());
    let scripts = resolve_scripts(&document.frontmatter.scripts, resource_dir.as_deref());

    Ok(Skill {
        path: skill_path_for(&relative),
        source_file: relative,
        frontmatter: document.frontmatter,
        body: document.body,
        parent: None,
        assets,
        scripts,
        resource_dir,
    })
}

/// Sibling directory sharing the document's base name, if it exists
fn resource_dir_for(file_path: &Path) -> Option<PathBuf> {
    let stem = file_path.file_stem()?;
    let dir = file_path.parent()?.join(stem);
    dir.is_dir().then_some(dir)
}

/// Resets the rebuild flag when a rebuild ends, however it ends
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, AtomicOrdering::Release);
    }
}

/// Live skill index with atomic generation swaps
pub struct SkillIndex {
    content_root: PathBuf,
    matching: MatchingConfig,
    current: RwLock<Arc<SkillTree>>,
    next_generation: AtomicU64,
    rebuilding: AtomicBool,
}

impl SkillIndex {
    /// Create an index with an empty generation; call [`SkillIndex::rebuild`] to fill it
    pub fn new(content_root: impl Into<PathBuf>, matching: MatchingConfig) -> Self {
        Self {
            content_root: content_root.into(),
            matching,
            current: RwLock::new(Arc::new(SkillTree::default())),
            next_generation: AtomicU64::new(1),
            rebuilding: AtomicBool::new(false),
        }
    }

    /// Create and build an index
    ///
    /// # Errors
    /// Returns an error if the scan task fails
    pub async fn build(content_root: impl Into<PathBuf>, matching: MatchingConfig) -> Result<Self> {
        let index = Self::new(content_root, matching);
        index.rebuild().await?;
        Ok(index)
    }

    /// Matching thresholds used by [`SkillIndex::search`]
    #[must_use]
    pub fn matching(&self) -> &MatchingConfig {
        &self.matching
    }

    /// Re-scan the content root and swap in the new generation
    ///
    /// Safe to call concurrently. A rebuild that finishes after a newer
    /// generation has landed leaves it in place and returns it instead.
    ///
    /// # Errors
    /// Returns an error if the blocking scan task fails
    pub async fn rebuild(&self) -> Result<Arc<SkillTree>> {
        let generation = self.next_generation.fetch_add(1, AtomicOrdering::Relaxed);
        let root = self.content_root.clone();

        let tree = tokio::task::spawn_blocking(move || SkillTree::scan(&root, generation))
            .await
            .map_err(|e| SkillError::io(&self.content_root, std::io::Error::other(e)))??;
        Ok(self.install(tree).await)
    }

    /// Swap in a scanned generation unless a newer one is already live
    async fn install(&self, tree: SkillTree) -> Arc<SkillTree> {
        let mut current = self.current.write().await;
        if tree.generation() < current.generation() {
            debug!(
                stale = tree.generation(),
                current = current.generation(),
                "Discarding stale index generation"
            );
            return Arc::clone(&current);
        }
        let tree = Arc::new(tree);
        *current = Arc::clone(&tree);
        tree
    }

    /// Rebuild unless another coalesced rebuild is already running
    ///
    /// # Errors
    /// [`SkillError::IndexUnavailable`] when a rebuild is in flight; callers
    /// treat it as a no-op since that rebuild will still land
    pub async fn try_rebuild(&self) -> Result<Arc<SkillTree>> {
        if self
            .rebuilding
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_err()
        {
            return Err(SkillError::IndexUnavailable);
        }
        let _guard = RebuildGuard(&self.rebuilding);
        self.rebuild().await
    }

    /// Current generation
    pub async fn snapshot(&self) -> Arc<SkillTree> {
        Arc::clone(&*self.current.read().await)
    }

    /// Look up a skill in the current generation
    pub async fn get(&self, path: &str) -> Option<Arc<Skill>> {
        self.snapshot().await.get(path).cloned()
    }

    /// Search the current generation
    pub async fn search(&self, context: &str) -> Vec<SearchHit> {
        self.snapshot().await.search(context, &self.matching)
    }

    /// Display tree of the current generation
    pub async fn tree(&self, filter: Option<&str>) -> SkillTreeNode {
        self.snapshot().await.project(filter)
    }

    /// Number of skills in the current generation
    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Whether the current generation is empty
    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, keywords: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            path,
            format!("---\nkeywords: [{keywords}]\ndescription: {rel}\n---\n{body}\n"),
        )
        .unwrap();
    }

    #[test]
    fn test_skill_path_derivation() {
        assert_eq!(skill_path_for("_root.md"), "_root");
        assert_eq!(skill_path_for("_index.md"), "_root");
        assert_eq!(skill_path_for("ui/_index.md"), "ui/_index");
        assert_eq!(skill_path_for("ui/react/auth.md"), "ui/react/auth");
        assert_eq!(skill_path_for("ui\\react\\auth.md"), "ui/react/auth");
    }

    #[test]
    fn test_structural_parents() {
        assert_eq!(structural_parent("_root"), None);
        assert_eq!(structural_parent("ui/_index").as_deref(), Some("_root"));
        assert_eq!(structural_parent("ui/react/_index").as_deref(), Some("ui/_index"));
        assert_eq!(structural_parent("ui/react/auth").as_deref(), Some("ui/react/_index"));
        assert_eq!(structural_parent("deploy").as_deref(), Some("_root"));
    }

    #[test]
    fn test_parent_walks_past_missing_aggregators() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "_root.md", "global", "Root");
        write(tmp.path(), "ui/_index.md", "ui", "UI");
        // no ui/react/_index.md
        write(tmp.path(), "ui/react/auth.md", "auth", "Auth");
        write(tmp.path(), "api/rest/errors.md", "errors", "Errors");

        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.get("_root").unwrap().parent, None);
        assert_eq!(tree.get("ui/_index").unwrap().parent.as_deref(), Some("_root"));
        assert_eq!(
            tree.get("ui/react/auth").unwrap().parent.as_deref(),
            Some("ui/_index")
        );
        assert_eq!(
            tree.get("api/rest/errors").unwrap().parent.as_deref(),
            Some("_root")
        );
    }

    #[test]
    fn test_no_skill_is_its_own_ancestor() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "_root.md", "global", "Root");
        write(tmp.path(), "a/_index.md", "a", "A");
        write(tmp.path(), "a/b/_index.md", "b", "B");
        write(tmp.path(), "a/b/c.md", "c", "C");

        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        for path in tree.paths() {
            let skill = tree.get(path).unwrap();
            let chain = tree.chain(skill);
            assert_eq!(chain.last().unwrap().path, path);
            let ancestors = &chain[..chain.len() - 1];
            assert!(ancestors.iter().all(|a| a.path != path));
        }
    }

    #[test]
    fn test_invalid_documents_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "good.md", "good", "Good");
        fs::write(tmp.path().join("bad.md"), "---\ndescription: no keywords\n---\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "not markdown").unwrap();

        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        assert_eq!(tree.paths(), vec!["good"]);
    }

    #[test]
    fn test_missing_root_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let tree = SkillTree::scan(&tmp.path().join("nope"), 1).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_root_file_wins_over_top_level_index() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "_index.md", "index", "From index");
        write(tmp.path(), "_root.md", "root", "From root");

        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("_root").unwrap().body, "From root");
    }

    #[test]
    fn test_resource_dir_detection() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ui/auth.md", "auth", "Auth");
        write(tmp.path(), "ui/forms.md", "forms", "Forms");
        fs::create_dir_all(tmp.path().join("ui/auth/assets")).unwrap();

        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        assert_eq!(
            tree.get("ui/auth").unwrap().resource_dir.as_deref(),
            Some(tmp.path().join("ui/auth").as_path())
        );
        assert!(tree.get("ui/forms").unwrap().resource_dir.is_none());
    }

    #[test]
    fn test_search_ranks_and_filters() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ui/react/auth.md", "react, auth, component, login", "Auth");
        write(tmp.path(), "ui/react/testing.md", "jest, testing, vitest", "Testing");

        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        let hits = tree.search("react auth component", &MatchingConfig::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].skill.path, "ui/react/auth");
        assert!(hits[0].score >= 0.75);
        assert_eq!(hits[0].matched_keywords, vec!["react", "auth", "component"]);
    }

    #[test]
    fn test_search_caps_at_twice_max_results() {
        let tmp = TempDir::new().unwrap();
        for i in 0..10 {
            write(tmp.path(), &format!("s{i}.md"), "deploy", "Deploy");
        }
        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        let matching = MatchingConfig {
            max_results: 2,
            ..MatchingConfig::default()
        };
        assert_eq!(tree.search("deploy", &matching).len(), 4);
    }

    #[test]
    fn test_project_tree_and_filter() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "_root.md", "global", "Root");
        write(tmp.path(), "ui/_index.md", "ui", "UI");
        write(tmp.path(), "ui/react/_index.md", "react", "React");
        write(tmp.path(), "ui/react/auth.md", "auth", "Auth");
        write(tmp.path(), "api/_index.md", "api", "API");

        let tree = SkillTree::scan(tmp.path(), 1).unwrap();
        let root = tree.project(None);
        assert_eq!(root.name, "root");
        assert_eq!(root.children.len(), 2);

        let react = root.find("ui/react/_index").unwrap();
        assert_eq!(react.name, "react");
        assert_eq!(react.children[0].path, "ui/react/auth");

        assert_eq!(tree.project(Some("api")).path, "api/_index");
        assert_eq!(tree.project(Some("api/_index")).path, "api/_index");
        assert_eq!(tree.project(Some("ui/react/auth")).name, "auth");
        assert_eq!(tree.project(Some("unknown")).path, "_root");
    }

    #[tokio::test]
    async fn test_rebuild_swaps_generation() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "one.md", "one", "One");

        let index = SkillIndex::build(tmp.path(), MatchingConfig::default())
            .await
            .unwrap();
        let before = index.snapshot().await;
        assert_eq!(before.len(), 1);

        write(tmp.path(), "two.md", "two", "Two");
        index.rebuild().await.unwrap();

        let after = index.snapshot().await;
        assert_eq!(after.len(), 2);
        assert!(after.generation() > before.generation());
        // The old generation stays intact for readers still holding it
        assert_eq!(before.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_rebuilds_leave_a_complete_tree() {
        let tmp = TempDir::new().unwrap();
        for i in 0..20 {
            write(tmp.path(), &format!("d{i}/s.md"), "kw", "Body");
        }
        let index = Arc::new(SkillIndex::new(tmp.path(), MatchingConfig::default()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..4 {
            let index = Arc::clone(&index);
            tasks.spawn(async move { index.rebuild().await.map(|t| (t.len(), t.generation())) });
        }
        let mut newest = 0;
        while let Some(result) = tasks.join_next().await {
            let (len, generation) = result.unwrap().unwrap();
            assert_eq!(len, 20);
            newest = newest.max(generation);
        }
        assert_eq!(index.len().await, 20);
        assert_eq!(index.snapshot().await.generation(), newest);
    }

    #[tokio::test]
    async fn test_stale_generation_does_not_replace_newer() {
        let index = SkillIndex::new("/nonexistent", MatchingConfig::default());

        let newer = index.install(SkillTree::from_skills(5, Vec::new())).await;
        assert_eq!(newer.generation(), 5);

        let kept = index.install(SkillTree::from_skills(3, Vec::new())).await;
        assert_eq!(kept.generation(), 5);
        assert_eq!(index.snapshot().await.generation(), 5);

        let next = index.install(SkillTree::from_skills(6, Vec::new())).await;
        assert_eq!(next.generation(), 6);
    }
}
