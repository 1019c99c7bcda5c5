//! Taxonomy management: path resolution, artifact IO, enumeration.
//!
//! The taxonomy is a directory tree rooted at a configured path. Every skill
//! lives in its own directory holding a `SKILL.md` artifact and a
//! `metadata.json` mirror. All external paths go through sanitization and
//! the resolve-strictly-then-compare containment check before touching disk.

pub mod export;
pub mod frontmatter;
pub mod path;

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Result, SkillfabError};

pub use frontmatter::{
    LoadPriority, SkillArtifact, SkillDescriptor, SkillFrontmatter, SkillType, SkillWeight,
};
pub use path::{is_valid_name, name_from_id, TaxonomyPath};

/// Artifact file name inside each skill directory.
pub const SKILL_FILE: &str = "SKILL.md";

/// Internal mirror of the frontmatter, written beside the artifact.
pub const METADATA_FILE: &str = "metadata.json";

/// Staging area for atomic writes, kept under the root as a hidden directory.
const STAGING_DIR: &str = ".staging";

/// Owns the taxonomy root and mediates all access to it.
pub struct TaxonomyManager {
    root: PathBuf,
}

impl TaxonomyManager {
    /// Open (creating if needed) a taxonomy rooted at `root`.
    ///
    /// The root is canonicalized once here; all containment checks compare
    /// against this resolved form.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// The canonicalized taxonomy root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and normalize a raw path string.
    pub fn sanitize_path(raw: &str) -> Result<TaxonomyPath> {
        TaxonomyPath::parse(raw)
    }

    /// Resolve an existing taxonomy path to an absolute filesystem path.
    ///
    /// Canonicalizes strictly (symlinks fully resolved) and only then checks
    /// the result is inside the root, so there is no check-to-use window.
    pub fn resolve_within_root(&self, path: &TaxonomyPath) -> Result<PathBuf> {
        let joined = self.root.join(path.as_str());
        let resolved = joined
            .canonicalize()
            .map_err(|_| SkillfabError::NotFound(format!("skill {}", path)))?;
        if !resolved.starts_with(&self.root) {
            return Err(SkillfabError::PathEscape(path.to_string()));
        }
        Ok(resolved)
    }

    /// Resolve a path that may not fully exist yet (for writes).
    ///
    /// The existing prefix is canonicalized and containment-checked; the
    /// not-yet-existing suffix is appended verbatim, which cannot traverse
    /// out because segments are charset-restricted.
    fn resolve_for_write(&self, path: &TaxonomyPath) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        let mut exists = true;
        for segment in path.segments() {
            let next = resolved.join(segment);
            if exists {
                match next.canonicalize() {
                    Ok(real) => {
                        if !real.starts_with(&self.root) {
                            return Err(SkillfabError::PathEscape(path.to_string()));
                        }
                        resolved = real;
                        continue;
                    }
                    Err(_) => exists = false,
                }
            }
            resolved = next;
        }
        Ok(resolved)
    }

    /// Read and parse one artifact, synchronously.
    pub(crate) fn read_artifact(&self, path: &TaxonomyPath) -> Result<SkillArtifact> {
        let dir = self.resolve_within_root(path)?;
        let file = dir.join(SKILL_FILE);
        let content = std::fs::read_to_string(&file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SkillfabError::NotFound(format!("skill {}", path))
            } else {
                e.into()
            }
        })?;
        SkillArtifact::parse(&content)
    }

    /// Load a skill artifact by taxonomy path.
    pub async fn load_skill(&self, path: &TaxonomyPath) -> Result<SkillArtifact> {
        // Parsing is cheap; the read itself is the only blocking part and
        // artifacts are small, so this stays on the calling task.
        self.read_artifact(path)
    }

    /// Enumerate every taxonomy path holding a valid artifact.
    ///
    /// A lazy finite sequence; re-invoke to restart. Skills that fail to
    /// load are skipped, never aborting the walk.
    pub fn list_skills(&self) -> impl Iterator<Item = TaxonomyPath> + '_ {
        let walker = ignore::WalkBuilder::new(&self.root)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build();

        walker.filter_map(move |entry| {
            let entry = entry.ok()?;
            if !entry.file_type()?.is_dir() {
                return None;
            }
            let rel = entry.path().strip_prefix(&self.root).ok()?;
            let raw = rel.to_str()?.replace(std::path::MAIN_SEPARATOR, "/");
            let path = TaxonomyPath::parse(&raw).ok()?;
            self.read_artifact(&path).ok()?;
            Some(path)
        })
    }

    /// Write an artifact at its declared taxonomy path, atomically.
    ///
    /// Files are staged into a fresh temp directory and renamed into place,
    /// so concurrent writers to the same path cannot interleave partial
    /// states. Returns the final directory.
    pub async fn write_skill(&self, artifact: &SkillArtifact) -> Result<PathBuf> {
        let path = artifact.frontmatter.metadata.skill_id.clone();
        let final_dir = self.resolve_for_write(&path)?;

        let staging_root = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging_root).await?;
        let stage = staging_root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&stage).await?;

        tokio::fs::write(stage.join(SKILL_FILE), artifact.render()?).await?;
        let mirror = serde_json::to_string_pretty(&artifact.frontmatter)
            .map_err(|e| SkillfabError::Persistence(format!("metadata mirror: {}", e)))?;
        tokio::fs::write(stage.join(METADATA_FILE), mirror).await?;

        if let Some(parent) = final_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match tokio::fs::rename(&stage, &final_dir).await {
            Ok(()) => {}
            Err(_) => {
                // Destination already exists: swap the old directory out,
                // move the staged one in, then discard the old copy.
                let trash = staging_root.join(format!("old-{}", Uuid::new_v4()));
                tokio::fs::rename(&final_dir, &trash).await?;
                tokio::fs::rename(&stage, &final_dir).await?;
                let _ = tokio::fs::remove_dir_all(&trash).await;
            }
        }

        tracing::info!(skill = %path, dir = %final_dir.display(), "wrote skill artifact");
        Ok(final_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact_for(id: &str) -> SkillArtifact {
        let path = TaxonomyPath::parse(id).unwrap();
        SkillArtifact {
            frontmatter: SkillFrontmatter {
                name: path.skill_name(),
                description: format!("Skill at {}", id),
                metadata: SkillDescriptor {
                    skill_id: path,
                    version: "1.0.0".into(),
                    skill_type: SkillType::Reference,
                    weight: SkillWeight::Light,
                    load_priority: LoadPriority::Lazy,
                    dependencies: vec![],
                    capabilities: vec![],
                },
            },
            body: "# Heading\n\nBody.\n".into(),
        }
    }

    #[tokio::test]
    async fn write_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();

        let artifact = artifact_for("development/tools/git/aliases");
        let written = mgr.write_skill(&artifact).await.unwrap();
        assert!(written.join(SKILL_FILE).exists());
        assert!(written.join(METADATA_FILE).exists());

        let path = TaxonomyPath::parse("development/tools/git/aliases").unwrap();
        let loaded = mgr.load_skill(&path).await.unwrap();
        assert_eq!(loaded.frontmatter, artifact.frontmatter);
    }

    #[tokio::test]
    async fn overwrite_replaces_existing_artifact() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();

        let mut artifact = artifact_for("a/b");
        mgr.write_skill(&artifact).await.unwrap();

        artifact.frontmatter.description = "updated".into();
        mgr.write_skill(&artifact).await.unwrap();

        let loaded = mgr
            .load_skill(&TaxonomyPath::parse("a/b").unwrap())
            .await
            .unwrap();
        assert_eq!(loaded.frontmatter.description, "updated");
    }

    #[tokio::test]
    async fn load_missing_skill_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();
        let err = mgr
            .load_skill(&TaxonomyPath::parse("no/such").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn list_skills_finds_all_valid_artifacts() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();

        for id in ["a/b", "a/c", "deep/nested/skill"] {
            mgr.write_skill(&artifact_for(id)).await.unwrap();
        }

        let mut found: Vec<String> = mgr.list_skills().map(|p| p.to_string()).collect();
        found.sort();
        assert_eq!(found, vec!["a/b", "a/c", "deep/nested/skill"]);
    }

    #[tokio::test]
    async fn list_skips_malformed_artifacts() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();
        mgr.write_skill(&artifact_for("good/skill")).await.unwrap();

        let bad = dir.path().join("bad").join("skill");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join(SKILL_FILE), "not frontmatter at all").unwrap();

        let found: Vec<String> = mgr.list_skills().map(|p| p.to_string()).collect();
        assert_eq!(found, vec!["good/skill"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escape_is_rejected() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join(SKILL_FILE), "secret").unwrap();

        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("evil")).unwrap();

        let err = mgr
            .resolve_within_root(&TaxonomyPath::parse("evil").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), "path_escape");
    }

    #[test]
    fn sanitize_rejects_traversal_components() {
        for bad in ["../up", "a/..", "a/./b", "a b", "a\tb"] {
            let err = TaxonomyManager::sanitize_path(bad).unwrap_err();
            assert_eq!(err.kind(), "invalid_input", "input {:?}", bad);
        }
    }

    #[tokio::test]
    async fn staging_dir_is_not_listed() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();
        mgr.write_skill(&artifact_for("x/y")).await.unwrap();

        // A leftover staged artifact must not appear as a skill.
        let stale = dir.path().join(STAGING_DIR).join("stale");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(
            stale.join(SKILL_FILE),
            artifact_for("x/y").render().unwrap(),
        )
        .unwrap();

        let found: Vec<String> = mgr.list_skills().map(|p| p.to_string()).collect();
        assert_eq!(found, vec!["x/y"]);
    }
}
