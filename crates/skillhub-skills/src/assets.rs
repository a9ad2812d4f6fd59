//! Asset and script path resolution and size-checked reads

use crate::error::{Result, SkillError};
use base64::{engine::general_purpose, Engine as _};
use skillhub_types::{AssetDeclaration, ResolvedAsset, ResolvedScript, ScriptDeclaration};
use std::path::{Component, Path};
use tracing::{debug, warn};

/// Extensions served as base64, with their MIME types
const BINARY_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tgz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
];

/// A file read from a resource directory
#[derive(Debug, Clone, PartialEq)]
pub struct AssetContent {
    /// Text, or base64 for binary files
    pub content: String,
    /// Size on disk
    pub size_bytes: u64,
}

/// Whether a declared path tries to leave its resource directory
///
/// Rejects `..` segments and absolute paths, with either separator.
#[must_use]
pub fn has_path_traversal(file: &str) -> bool {
    let normalized = file.replace('\\', "/");
    if normalized.starts_with('/') {
        return true;
    }
    Path::new(&normalized).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Lowercased extension with its leading dot, e.g. `.sh`
#[must_use]
pub fn extension(file: &str) -> String {
    Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Whether a file is served as binary, judged by extension
#[must_use]
pub fn is_binary_file(file: &str) -> bool {
    binary_mime(file).is_some()
}

/// MIME type for a file, `application/octet-stream` when unknown
#[must_use]
pub fn mime_type(file: &str) -> &'static str {
    binary_mime(file).unwrap_or("application/octet-stream")
}

fn binary_mime(file: &str) -> Option<&'static str> {
    let ext = extension(file);
    let ext = ext.trim_start_matches('.');
    BINARY_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, mime)| *mime)
}

/// Bind asset declarations to absolute paths under the resource directory
///
/// Without a resource directory nothing resolves; traversal attempts are dropped.
#[must_use]
pub fn resolve_assets(
    declarations: &[AssetDeclaration],
    resource_dir: Option<&Path>,
) -> Vec<ResolvedAsset> {
    let Some(dir) = resource_dir else {
        if !declarations.is_empty() {
            debug!("{} asset(s) declared without a resource directory", declarations.len());
        }
        return Vec::new();
    };

    declarations
        .iter()
        .filter(|decl| accept_path(&decl.file))
        .map(|decl| ResolvedAsset {
            file: decl.file.clone(),
            absolute_path: dir.join(&decl.file),
            description: decl.description.clone(),
            asset_type: decl.asset_type,
            is_binary: is_binary_file(&decl.file),
        })
        .collect()
}

/// Bind script declarations to absolute paths under the resource directory
#[must_use]
pub fn resolve_scripts(
    declarations: &[ScriptDeclaration],
    resource_dir: Option<&Path>,
) -> Vec<ResolvedScript> {
    let Some(dir) = resource_dir else {
        if !declarations.is_empty() {
            debug!("{} script(s) declared without a resource directory", declarations.len());
        }
        return Vec::new();
    };

    declarations
        .iter()
        .filter(|decl| accept_path(&decl.file))
        .map(|decl| ResolvedScript {
            file: decl.file.clone(),
            absolute_path: dir.join(&decl.file),
            description: decl.description.clone(),
            execution: decl.execution,
            args: decl.args.clone(),
        })
        .collect()
}

fn accept_path(file: &str) -> bool {
    if has_path_traversal(file) {
        warn!("Path traversal rejected: {}", file);
        return false;
    }
    true
}

async fn checked_size(path: &Path, max_size_bytes: u64) -> Result<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| SkillError::io(path, e))?;
    let size = metadata.len();
    if size > max_size_bytes {
        return Err(SkillError::SizeExceeded {
            size,
            limit: max_size_bytes,
        });
    }
    Ok(size)
}

/// Read a text file, refusing files above `max_size_bytes` before reading
///
/// # Errors
/// [`SkillError::SizeExceeded`] for oversized files, [`SkillError::Io`] otherwise
pub async fn read_text(path: &Path, max_size_bytes: u64) -> Result<AssetContent> {
    let size_bytes = checked_size(path, max_size_bytes).await?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SkillError::io(path, e))?;
    Ok(AssetContent {
        content: String::from_utf8_lossy(&bytes).into_owned(),
        size_bytes,
    })
}

/// Read a binary file as base64, refusing files above `max_size_bytes`
///
/// # Errors
/// [`SkillError::SizeExceeded`] for oversized files, [`SkillError::Io`] otherwise
pub async fn read_base64(path: &Path, max_size_bytes: u64) -> Result<AssetContent> {
    let size_bytes = checked_size(path, max_size_bytes).await?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SkillError::io(path, e))?;
    Ok(AssetContent {
        content: general_purpose::STANDARD.encode(bytes),
        size_bytes,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use skillhub_types::AssetType;
    use tempfile::TempDir;

    fn decl(file: &str) -> AssetDeclaration {
        AssetDeclaration {
            file: file.to_string(),
            description: String::new(),
            asset_type: AssetType::Other,
        }
    }

    #[test]
    fn test_path_traversal_detection() {
        assert!(has_path_traversal("../secret.txt"));
        assert!(has_path_traversal("assets/../../etc/passwd"));
        assert!(has_path_traversal("/etc/passwd"));
        assert!(has_path_traversal("..\\windows\\system.ini"));
        assert!(!has_path_traversal("assets/template.tsx"));
        assert!(!has_path_traversal("assets/my..file.txt"));
    }

    #[test]
    fn test_binary_classification() {
        assert!(is_binary_file("assets/logo.PNG"));
        assert!(is_binary_file("fonts/Inter.woff2"));
        assert!(is_binary_file("docs/guide.pdf"));
        assert!(!is_binary_file("assets/config.example.ts"));
        assert!(!is_binary_file("README"));
        assert_eq!(mime_type("a.jpeg"), "image/jpeg");
        assert_eq!(mime_type("a.txt"), "application/octet-stream");
    }

    #[test]
    fn test_resolve_drops_traversal_and_needs_resource_dir() {
        let decls = vec![decl("assets/ok.txt"), decl("../escape.txt"), decl("/abs.txt")];
        assert!(resolve_assets(&decls, None).is_empty());

        let resolved = resolve_assets(&decls, Some(Path::new("/content/ui/auth")));
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved[0].absolute_path,
            Path::new("/content/ui/auth/assets/ok.txt")
        );
        assert!(!resolved[0].is_binary);
    }

    #[tokio::test]
    async fn test_read_text_and_size_limit() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("note.txt");
        std::fs::write(&file, "hello world").unwrap();

        let content = read_text(&file, 1024).await.unwrap();
        assert_eq!(content.content, "hello world");
        assert_eq!(content.size_bytes, 11);

        let err = read_text(&file, 5).await.unwrap_err();
        assert!(matches!(err, SkillError::SizeExceeded { size: 11, limit: 5 }));
    }

    #[tokio::test]
    async fn test_read_base64() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("pixel.png");
        std::fs::write(&file, [0x89_u8, b'P', b'N', b'G']).unwrap();

        let content = read_base64(&file, 1024).await.unwrap();
        assert_eq!(content.content, "iVBORw==");
        assert_eq!(content.size_bytes, 4);
    }
}
