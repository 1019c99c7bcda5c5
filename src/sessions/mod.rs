//! Conversation sessions for the interactive variant.
//!
//! A session records the dialogue that drives one or more skill-creation
//! jobs: ordered messages, the current conversation stage, and a queue of
//! further skills the user asked for. Sessions live in a hot map mirrored
//! to durable JSON, the same pattern as the job store's tiers.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SkillfabError};

/// Message author roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The interactive workflow stage a session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Gathering,
    AwaitingClarification,
    ReviewingPlan,
    Generating,
    ReviewingDraft,
    Validating,
    Completed,
    Cancelled,
}

/// A persistent conversation session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSession {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub messages: Vec<SessionMessage>,
    pub state: ConversationState,
    /// Task descriptions queued behind the current one
    #[serde(default)]
    pub skill_queue: Vec<String>,
    /// The job currently driven by this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_job: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConversationSession {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            messages: Vec::new(),
            state: ConversationState::default(),
            skill_queue: Vec::new(),
            active_job: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Append a message, keeping arrival order.
    pub fn push_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(SessionMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    /// Whether the session has passed its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Hot-map session repository mirrored to durable JSON files.
pub struct SessionRepository {
    dir: PathBuf,
    hot: DashMap<Uuid, Arc<ConversationSession>>,
}

impl SessionRepository {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            hot: DashMap::new(),
        })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Persist a session, durable-first.
    pub async fn save(&self, session: ConversationSession) -> Result<()> {
        let json = serde_json::to_string_pretty(&session)
            .map_err(|e| SkillfabError::Persistence(format!("serialize session: {}", e)))?;
        let path = self.path_for(session.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        self.hot.insert(session.id, Arc::new(session));
        Ok(())
    }

    /// Fetch a session from the hot map, falling back to disk.
    pub async fn get(&self, id: Uuid) -> Result<ConversationSession> {
        if let Some(session) = self.hot.get(&id) {
            return Ok(session.as_ref().clone());
        }
        let contents = tokio::fs::read_to_string(self.path_for(id))
            .await
            .map_err(|_| SkillfabError::NotFound(format!("session {}", id)))?;
        let session: ConversationSession = serde_json::from_str(&contents)
            .map_err(|_| SkillfabError::NotFound(format!("session {}", id)))?;
        self.hot.insert(id, Arc::new(session.clone()));
        Ok(session)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.hot.remove(&id);
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop expired sessions from both tiers; returns how many.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let expired: Vec<Uuid> = self
            .hot
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();
        for id in &expired {
            self.delete(*id).await?;
        }
        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let repo = SessionRepository::open(dir.path()).await.unwrap();

        let mut session = ConversationSession::new(Some("alice".into()));
        session.push_message(MessageRole::User, "make a git skill");
        session.push_message(MessageRole::Assistant, "on it");
        session.state = ConversationState::Generating;
        let id = session.id;
        repo.save(session.clone()).await.unwrap();

        let loaded = repo.get(id).await.unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.messages.len(), 2);
    }

    #[tokio::test]
    async fn sessions_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let session = ConversationSession::new(None);
        let id = session.id;
        {
            let repo = SessionRepository::open(dir.path()).await.unwrap();
            repo.save(session).await.unwrap();
        }
        let repo = SessionRepository::open(dir.path()).await.unwrap();
        assert_eq!(repo.get(id).await.unwrap().id, id);
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let dir = TempDir::new().unwrap();
        let repo = SessionRepository::open(dir.path()).await.unwrap();
        let err = repo.get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let dir = TempDir::new().unwrap();
        let repo = SessionRepository::open(dir.path()).await.unwrap();

        let mut expired = ConversationSession::new(None);
        expired.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        let expired_id = expired.id;
        let fresh = ConversationSession::new(None);
        let fresh_id = fresh.id;
        repo.save(expired).await.unwrap();
        repo.save(fresh).await.unwrap();

        assert_eq!(repo.purge_expired().await.unwrap(), 1);
        assert!(repo.get(expired_id).await.is_err());
        assert!(repo.get(fresh_id).await.is_ok());
    }

    #[test]
    fn message_order_is_preserved() {
        let mut session = ConversationSession::new(None);
        for i in 0..5 {
            session.push_message(MessageRole::User, format!("m{}", i));
        }
        let contents: Vec<&str> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn state_tags_are_snake_case() {
        let json = serde_json::to_string(&ConversationState::AwaitingClarification).unwrap();
        assert_eq!(json, "\"awaiting_clarification\"");
    }
}
