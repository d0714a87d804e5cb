use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::InterviewSession;

// Whole-record persistence for sessions: `save` replaces the stored value,
// there are no partial field updates. Keeping the engine behind this trait
// lets tests run against the in-memory store and leaves the door open for
// a durable backend without touching the transition logic.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &InterviewSession) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<InterviewSession>>;

    async fn save(&self, session: &InterviewSession) -> Result<()>;
}

// Sharing a store between an engine and other owners is just cloning the
// handle.
#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn create(&self, session: &InterviewSession) -> Result<()> {
        (**self).create(session).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<InterviewSession>> {
        (**self).find_by_id(id).await
    }

    async fn save(&self, session: &InterviewSession) -> Result<()> {
        (**self).save(session).await
    }
}

/// Process-local store. Sessions live as long as the process does.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, InterviewSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &InterviewSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<InterviewSession>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn save(&self, session: &InterviewSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }
}
