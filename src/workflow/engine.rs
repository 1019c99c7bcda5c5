//! Workflow engine: job scheduling, the phase driver, and finalization.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::cache::TtlCache;
use crate::error::{Result, SkillfabError};
use crate::hitl::HitlCoordinator;
use crate::jobs::model::{Job, JobId, JobInputs, JobStatus, Progress};
use crate::jobs::store::JobStore;
use crate::lm::client::LmClient;
use crate::lm::operators::Operators;
use crate::lm::signature::SignatureRegistry;
use crate::metrics::weights::SkillStyle;
use crate::taxonomy::{
    is_valid_name, LoadPriority, SkillArtifact, SkillDescriptor, SkillFrontmatter, SkillType,
    SkillWeight, TaxonomyManager, TaxonomyPath,
};

/// Engine knobs, filled from settings at bootstrap.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Job retrievability TTL in seconds
    pub job_ttl_secs: i64,
    /// Raise a preview checkpoint after generation
    pub preview_checkpoint: bool,
    /// Raise a confirm checkpoint after planning
    pub confirm_plan: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            job_ttl_secs: 60 * 60,
            preview_checkpoint: false,
            confirm_plan: false,
        }
    }
}

/// Runs skill-creation jobs through the three phases.
pub struct WorkflowEngine {
    pub(super) store: Arc<JobStore>,
    pub(super) hitl: Arc<HitlCoordinator>,
    pub(super) taxonomy: Arc<TaxonomyManager>,
    pub(super) cache: Arc<TtlCache<Vec<String>>>,
    pub(super) lm: Arc<LmClient>,
    pub(super) operators: Arc<Operators>,
    pub(super) registry: Arc<tokio::sync::Mutex<SignatureRegistry>>,
    pub(super) config: EngineConfig,
    tokens: DashMap<JobId, CancellationToken>,
}

impl WorkflowEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<JobStore>,
        hitl: Arc<HitlCoordinator>,
        taxonomy: Arc<TaxonomyManager>,
        cache: Arc<TtlCache<Vec<String>>>,
        lm: Arc<LmClient>,
        operators: Arc<Operators>,
        registry: Arc<tokio::sync::Mutex<SignatureRegistry>>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            hitl,
            taxonomy,
            cache,
            lm,
            operators,
            registry,
            config,
            tokens: DashMap::new(),
        })
    }

    /// Create a job and schedule its workflow body. Returns immediately.
    pub async fn create_skill(self: &Arc<Self>, inputs: JobInputs) -> Result<JobId> {
        inputs.validate()?;
        let job = Job::new(inputs, self.config.job_ttl_secs);
        let id = job.id;
        self.store.create(job).await?;

        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_job(id).await });
        Ok(id)
    }

    /// Cancel a job: transition to `cancelled` and interrupt the workflow at
    /// its next suspension point. In-flight LM calls finish and their
    /// results are discarded.
    pub async fn cancel_job(&self, id: JobId) -> Result<()> {
        self.store
            .update(id, |job| {
                if job.is_terminal() {
                    return Err(SkillfabError::Conflict(format!(
                        "job is already {}",
                        job.status.as_str()
                    )));
                }
                job.prompt = None;
                job.transition(JobStatus::Cancelled)
            })
            .await?;
        if let Some(token) = self.tokens.get(&id) {
            token.cancel();
        }
        self.hitl.wake(id);
        tracing::info!(job_id = %id, "job cancelled");
        Ok(())
    }

    /// The cancellation token for a running job (tests and diagnostics).
    pub fn cancel_token(&self, id: JobId) -> Option<CancellationToken> {
        self.tokens.get(&id).map(|t| t.clone())
    }

    /// Workflow body wrapper: drives the phases and settles terminal state.
    async fn run_job(self: Arc<Self>, id: JobId) {
        let token = CancellationToken::new();
        self.tokens.insert(id, token.clone());

        let outcome = self.drive(id, &token).await;
        match outcome {
            Ok(()) => {}
            Err(SkillfabError::Cancelled) => {
                // The cancel path already settled the status; make sure a
                // cooperative exit that raced it does too.
                let _ = self
                    .store
                    .update(id, |job| {
                        if !job.is_terminal() {
                            job.prompt = None;
                            job.transition(JobStatus::Cancelled)?;
                        }
                        Ok(())
                    })
                    .await;
                tracing::info!(job_id = %id, "workflow exited on cancellation");
            }
            Err(e) => {
                tracing::error!(job_id = %id, kind = e.kind(), "workflow failed: {}", e);
                let _ = self
                    .store
                    .update(id, |job| {
                        job.fail(&e);
                        Ok(())
                    })
                    .await;
            }
        }

        self.tokens.remove(&id);
        self.hitl.forget(id);
    }

    /// The phase driver.
    async fn drive(&self, id: JobId, token: &CancellationToken) -> Result<()> {
        let run_token = self.store.run_token().to_string();
        let inputs = self
            .store
            .update(id, move |job| {
                job.transition(JobStatus::Running)?;
                job.run_token = Some(run_token);
                job.progress = Progress::at("understanding", 0.05, "analyzing the request");
                Ok(job.inputs.clone())
            })
            .await?;

        let understanding = self.phase_understanding(id, &inputs, token).await?;

        let (draft, generate_module) = self
            .phase_generation(id, &inputs, &understanding, token)
            .await?;

        let accepted = self
            .phase_validation(id, &inputs, &understanding, draft, generate_module, token)
            .await?;

        self.finalize(id, &understanding, accepted).await
    }

    pub(super) fn check_cancelled(&self, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            Err(SkillfabError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(super) async fn set_progress(&self, id: JobId, progress: Progress) -> Result<()> {
        self.store
            .update(id, move |job| {
                job.progress = progress;
                Ok(())
            })
            .await
    }

    /// Existing taxonomy paths, memoized under the taxonomy namespace.
    pub(super) async fn existing_paths(&self) -> Result<Vec<String>> {
        const KEY: &str = "taxonomy:paths:global";
        if let Some(paths) = self.cache.get(KEY) {
            return Ok(paths);
        }
        let taxonomy = Arc::clone(&self.taxonomy);
        let paths = tokio::task::spawn_blocking(move || {
            taxonomy
                .list_skills()
                .map(|p| p.to_string())
                .collect::<Vec<String>>()
        })
        .await
        .map_err(|e| SkillfabError::Persistence(format!("taxonomy walk: {}", e)))?;
        self.cache.set(KEY, paths.clone(), crate::cache::TTL_GLOBAL);
        Ok(paths)
    }

    /// Write the accepted artifact, record scores, and complete the job.
    async fn finalize(
        &self,
        id: JobId,
        understanding: &crate::jobs::model::UnderstandingSummary,
        accepted: phases_output::AcceptedDraft,
    ) -> Result<()> {
        let path = understanding.placement.path.clone();
        let artifact = build_artifact(&path, understanding, &accepted)?;

        self.set_progress(id, Progress::at("finalizing", 0.95, "writing the artifact"))
            .await?;
        let dir = self.taxonomy.write_skill(&artifact).await?;
        self.cache.invalidate("taxonomy:*");

        self.store
            .update(id, move |job| {
                job.state.validation = Some(accepted.validation.clone());
                job.state.final_score = Some(accepted.validation.composite);
                job.state.artifact_path = Some(path.to_string());
                job.progress = Progress::at("completed", 1.0, "skill created");
                job.transition(JobStatus::Completed)
            })
            .await?;
        tracing::info!(job_id = %id, dir = %dir.display(), "job completed");
        Ok(())
    }
}

/// Map a style to the artifact type/weight tags.
fn tags_for_style(style: SkillStyle) -> (SkillType, SkillWeight) {
    match style {
        SkillStyle::NavigationHub => (SkillType::Capability, SkillWeight::Light),
        SkillStyle::Comprehensive => (SkillType::Guide, SkillWeight::Heavy),
        SkillStyle::Minimal => (SkillType::Reference, SkillWeight::Light),
    }
}

/// Assemble the on-disk artifact from the accepted draft.
fn build_artifact(
    path: &TaxonomyPath,
    understanding: &crate::jobs::model::UnderstandingSummary,
    accepted: &phases_output::AcceptedDraft,
) -> Result<SkillArtifact> {
    // The LM's name is used when it is well-formed; otherwise the derived
    // name stands in.
    let name = if is_valid_name(&accepted.draft.name) {
        accepted.draft.name.clone()
    } else {
        path.skill_name()
    };
    let mut description = accepted.draft.description.trim().to_string();
    if description.is_empty() {
        description = understanding.plan.summary.clone();
    }
    let max = crate::taxonomy::frontmatter::MAX_DESCRIPTION_LEN;
    if description.len() > max {
        let mut end = max;
        while !description.is_char_boundary(end) {
            end -= 1;
        }
        description.truncate(end);
    }

    let (skill_type, weight) = tags_for_style(accepted.validation.style);
    let dependencies = understanding
        .dependencies
        .dependencies
        .iter()
        .filter_map(|raw| TaxonomyPath::parse(raw).ok())
        .collect();

    let artifact = SkillArtifact {
        frontmatter: SkillFrontmatter {
            name,
            description,
            metadata: SkillDescriptor {
                skill_id: path.clone(),
                version: "1.0.0".to_string(),
                skill_type,
                weight,
                load_priority: LoadPriority::Lazy,
                dependencies,
                capabilities: understanding.dependencies.capabilities.clone(),
            },
        },
        body: accepted.draft.body.clone(),
    };
    artifact.frontmatter.validate()?;
    Ok(artifact)
}

/// Types shared between the phase implementations and the driver.
pub(super) mod phases_output {
    use crate::jobs::model::ValidationSummary;
    use crate::lm::operators::generation::DraftContent;

    /// A draft that cleared (or was explicitly accepted despite) validation.
    #[derive(Debug, Clone)]
    pub struct AcceptedDraft {
        pub draft: DraftContent,
        pub validation: ValidationSummary,
    }
}
