//! The service facade.
//!
//! One `SkillService` is constructed at process start from settings and a
//! provider client, and handed down to every surface (CLI, HTTP). It owns
//! the component handles and exposes the pipeline as a small API: create,
//! status, HITL peek/respond, cancel, export.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::error::Result;
use crate::hitl::{ActionKeywords, HitlCoordinator};
use crate::jobs::durable::JsonFileRepository;
use crate::jobs::model::{HitlPrompt, HitlResponse, Job, JobId, JobInputs};
use crate::jobs::store::{JobStore, StoreConfig};
use crate::lm::client::LmClient;
use crate::lm::operators::Operators;
use crate::lm::signature::SignatureRegistry;
use crate::sessions::SessionRepository;
use crate::settings::{default_data_dir, SkillfabSettings};
use crate::taxonomy::{export::export_taxonomy_xml, TaxonomyManager};
use crate::workflow::{EngineConfig, WorkflowEngine};

/// The assembled pipeline.
pub struct SkillService {
    store: Arc<JobStore>,
    hitl: Arc<HitlCoordinator>,
    engine: Arc<WorkflowEngine>,
    taxonomy: Arc<TaxonomyManager>,
    sessions: Arc<SessionRepository>,
    keywords: ActionKeywords,
}

impl SkillService {
    /// Build the service from settings and a provider client.
    ///
    /// Startup lifecycle: open the tiers, orphan stale running jobs, start
    /// the background sweeper.
    pub async fn initialize(settings: &SkillfabSettings, lm: Arc<LmClient>) -> Result<Arc<Self>> {
        settings.validate()?;

        let data_dir: PathBuf = settings
            .store
            .data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let taxonomy_root: PathBuf = settings
            .taxonomy
            .root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("taxonomy"));

        let repo = JsonFileRepository::open(data_dir.join("jobs")).await?;
        let store = JobStore::new(
            Arc::new(repo),
            StoreConfig {
                capacity: settings.store.capacity,
                ttl: settings.store.ttl(),
                sweep_period: settings.store.sweep_period(),
            },
        );
        let orphaned = store.recover_orphans().await?;
        if orphaned > 0 {
            tracing::warn!(orphaned, "orphaned running jobs from a previous process");
        }
        store.start_sweeper();

        let hitl = Arc::new(HitlCoordinator::new(store.clone()));
        let taxonomy = Arc::new(TaxonomyManager::new(&taxonomy_root)?);
        let sessions = Arc::new(SessionRepository::open(data_dir.join("sessions")).await?);
        let cache = Arc::new(TtlCache::new());
        let operators = Arc::new(Operators::new());
        let registry = Arc::new(tokio::sync::Mutex::new(
            SignatureRegistry::load(&data_dir).await,
        ));

        let engine = WorkflowEngine::new(
            store.clone(),
            hitl.clone(),
            taxonomy.clone(),
            cache,
            lm,
            operators,
            registry,
            EngineConfig {
                job_ttl_secs: settings.workflow.job_ttl_secs,
                preview_checkpoint: settings.workflow.preview_checkpoint,
                confirm_plan: settings.workflow.confirm_plan,
            },
        );

        tracing::info!(
            data_dir = %data_dir.display(),
            taxonomy_root = %taxonomy_root.display(),
            "skill service initialized"
        );
        Ok(Arc::new(Self {
            store,
            hitl,
            engine,
            taxonomy,
            sessions,
            keywords: ActionKeywords::default(),
        }))
    }

    /// Submit a skill-creation request; returns the job id immediately.
    pub async fn create_skill(&self, inputs: JobInputs) -> Result<JobId> {
        self.engine.create_skill(inputs).await
    }

    /// Full job record for status polling.
    pub async fn job_status(&self, id: JobId) -> Result<Job> {
        self.store.get(id).await
    }

    /// The outstanding HITL prompt, if any.
    pub async fn peek_prompt(&self, id: JobId) -> Result<Option<HitlPrompt>> {
        self.hitl.peek_prompt(id).await
    }

    /// Submit a HITL response for a specific prompt key.
    pub async fn submit_response(
        &self,
        id: JobId,
        prompt_key: &str,
        response: HitlResponse,
    ) -> Result<()> {
        self.hitl.submit_response(id, prompt_key, response).await
    }

    /// Cancel a job.
    pub async fn cancel_job(&self, id: JobId) -> Result<()> {
        self.engine.cancel_job(id).await
    }

    /// The canonical action to keyword map (cacheable client-side).
    pub fn keywords(&self) -> &ActionKeywords {
        &self.keywords
    }

    /// The taxonomy discovery document.
    pub async fn export_taxonomy(&self) -> Result<String> {
        let taxonomy = Arc::clone(&self.taxonomy);
        tokio::task::spawn_blocking(move || export_taxonomy_xml(&taxonomy))
            .await
            .map_err(|e| crate::error::SkillfabError::Persistence(format!("export: {}", e)))
    }

    pub fn taxonomy(&self) -> &Arc<TaxonomyManager> {
        &self.taxonomy
    }

    pub fn sessions(&self) -> &Arc<SessionRepository> {
        &self.sessions
    }

    /// Graceful shutdown: flush the store and stop background tasks.
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
        tracing::info!("skill service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::JobStatus;
    use crate::lm::client::ScriptedReply;
    use crate::metrics::weights::SkillStyle;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings_in(dir: &TempDir) -> SkillfabSettings {
        let mut settings = SkillfabSettings::default();
        settings.store.data_dir = Some(dir.path().display().to_string());
        settings
    }

    fn scripted_happy_path() -> Vec<ScriptedReply> {
        let phase1 = json!({
            "requirements": ["r"], "ambiguities": [], "assumptions": [],
            "intent": "i", "audience": "devs", "goals": ["g"],
            "path": "development/tools/git/aliases", "rationale": "fits", "confidence": 0.9,
            "dependencies": [], "capabilities": [],
        });
        let eval = json!({
            "pass": true, "score": 0.9, "critical_issues": [], "warnings": [],
            "skill_quality": 0.9, "semantic_f1": 0.9, "entity_f1": 0.9,
            "readability": 0.9, "coverage": 0.9,
        });
        vec![
            ScriptedReply::Value(phase1.clone()),
            ScriptedReply::Value(phase1.clone()),
            ScriptedReply::Value(phase1.clone()),
            ScriptedReply::Value(phase1),
            ScriptedReply::Value(json!({
                "summary": "git aliases reference",
                "outline": ["Overview"],
                "style": "unspecified",
            })),
            ScriptedReply::Value(json!({
                "name": "git-aliases",
                "description": "A reference of Git aliases.",
                "body": "# Git Aliases\n",
            })),
            ScriptedReply::Value(eval.clone()),
            ScriptedReply::Value(eval),
        ]
    }

    async fn wait_terminal(service: &Arc<SkillService>, id: JobId) -> Job {
        for _ in 0..200 {
            let job = service.job_status(id).await.unwrap();
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never finished");
    }

    #[tokio::test]
    async fn end_to_end_create_and_complete() {
        let dir = TempDir::new().unwrap();
        let lm = Arc::new(LmClient::scripted(scripted_happy_path()));
        let service = SkillService::initialize(&settings_in(&dir), lm)
            .await
            .unwrap();

        let id = service
            .create_skill(JobInputs {
                task_description: "Create a Git aliases reference".into(),
                user_context: None,
                user_id: None,
                style: Some(SkillStyle::Minimal),
            })
            .await
            .unwrap();

        let job = wait_terminal(&service, id).await;
        assert_eq!(job.status, JobStatus::Completed);

        let xml = service.export_taxonomy().await.unwrap();
        assert!(xml.contains("<location>development/tools/git/aliases</location>"));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn status_for_unknown_job_is_not_found() {
        let dir = TempDir::new().unwrap();
        let lm = Arc::new(LmClient::scripted([]));
        let service = SkillService::initialize(&settings_in(&dir), lm)
            .await
            .unwrap();
        let err = service.job_status(uuid::Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn keyword_map_is_served() {
        let dir = TempDir::new().unwrap();
        let lm = Arc::new(LmClient::scripted([]));
        let service = SkillService::initialize(&settings_in(&dir), lm)
            .await
            .unwrap();
        assert!(service.keywords().proceed.contains(&"proceed".to_string()));
    }
}
