use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::models::scene::SceneDocument;
use crate::BibleError;

/// Read-only access to scene text.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Scene identifiers, in no particular order.
    async fn list_scenes(&self) -> Result<Vec<String>, BibleError>;

    async fn read_scene(&self, scene: &str) -> Result<SceneDocument, BibleError>;
}

/// Scene files (`.md`, `.txt`) under a manuscript directory.
///
/// Scene identifiers are paths relative to the root with `/` separators.
/// Hidden entries (names starting with `.`) are skipped, which keeps the
/// data directory and editor metadata out of the corpus.
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scene identifier for a path under the root.
    pub fn scene_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_scene_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"))
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn list_scenes(&self) -> Result<Vec<String>, BibleError> {
        let mut scenes = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                BibleError::Io(format!("Failed to list {}: {}", dir.display(), e))
            })?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && Self::is_scene_file(&path) {
                    scenes.push(self.scene_id(&path));
                }
            }
        }

        scenes.sort();
        Ok(scenes)
    }

    async fn read_scene(&self, scene: &str) -> Result<SceneDocument, BibleError> {
        let path = self.root.join(scene);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| BibleError::Io(format!("Failed to read {}: {}", scene, e)))?;
        let modified = tokio::fs::metadata(&path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(SceneDocument::new(scene, content).with_modified(modified))
    }
}

/// Fixed set of in-memory scenes.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentSource {
    documents: Vec<SceneDocument>,
}

impl MemoryDocumentSource {
    pub fn new(documents: Vec<SceneDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn list_scenes(&self) -> Result<Vec<String>, BibleError> {
        Ok(self.documents.iter().map(|d| d.path.clone()).collect())
    }

    async fn read_scene(&self, scene: &str) -> Result<SceneDocument, BibleError> {
        self.documents
            .iter()
            .find(|d| d.path == scene)
            .cloned()
            .ok_or_else(|| BibleError::NotFound {
                entity_type: "scene".to_string(),
                id: scene.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lists_scene_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("book1")).unwrap();
        std::fs::create_dir_all(dir.path().join(".storybible")).unwrap();
        std::fs::write(dir.path().join("book1/ch01.md"), "Elena.").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Marcus.").unwrap();
        std::fs::write(dir.path().join("cover.png"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join(".storybible/cache.md"), "x").unwrap();

        let source = FsDocumentSource::new(dir.path());
        assert_eq!(
            source.list_scenes().await.unwrap(),
            vec!["book1/ch01.md".to_string(), "notes.txt".to_string()]
        );

        let doc = source.read_scene("book1/ch01.md").await.unwrap();
        assert_eq!(doc.path, "book1/ch01.md");
        assert_eq!(doc.content, "Elena.");
    }

    #[tokio::test]
    async fn test_unreadable_scene_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.md"), [0xffu8, 0xfe, 0xfd]).unwrap();

        let source = FsDocumentSource::new(dir.path());
        let err = source.read_scene("bad.md").await.unwrap_err();
        assert!(matches!(err, BibleError::Io(_)));
    }

    #[tokio::test]
    async fn test_memory_source_missing_scene() {
        let source = MemoryDocumentSource::new(vec![SceneDocument::new("a.md", "x")]);
        assert_eq!(source.list_scenes().await.unwrap(), vec!["a.md".to_string()]);
        assert!(matches!(
            source.read_scene("b.md").await,
            Err(BibleError::NotFound { .. })
        ));
    }
}
