use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use quire_common::protocol::docs::DocSummary;
use quire_common::step::Step;
use tokio::sync::RwLock;
use tracing::{info, info_span, Instrument};

use super::session::{DocumentSession, SessionLimits};

pub const DEFAULT_MAX_SESSIONS: usize = 20;

/// Live document sessions keyed by document id, bounded by `max_sessions`.
///
/// Sessions are created lazily on first reference and only ever removed by
/// capacity eviction, which discards the least recently active one.
pub struct SessionRegistry<S: Step> {
    sessions: RwLock<HashMap<String, Arc<DocumentSession<S>>>>,
    max_sessions: usize,
    limits: SessionLimits,
    clock: AtomicU64,
}

impl<S: Step> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, SessionLimits::default())
    }
}

impl<S: Step> SessionRegistry<S> {
    pub fn new(max_sessions: usize, limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            limits,
            clock: AtomicU64::new(0),
        }
    }

    /// Return the session for `id`, creating an empty one if needed.
    ///
    /// Every call counts as activity; when `ip` is given the caller is
    /// registered as present.
    pub async fn get_or_create(&self, id: &str, ip: Option<&str>) -> Arc<DocumentSession<S>> {
        async move {
            let session = self.lookup_or_insert(id).await;
            session.touch(self.clock.fetch_add(1, Ordering::Relaxed) + 1);
            if let Some(ip) = ip {
                session.register_user(ip);
            }
            session
        }
        .instrument(info_span!("relay.registry.get_or_create", doc_id = %id))
        .await
    }

    pub async fn get(&self, id: &str) -> Option<Arc<DocumentSession<S>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Id and presence count of every live session, ordered by id.
    pub async fn summaries(&self) -> Vec<DocSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<DocSummary> = sessions
            .values()
            .map(|session| DocSummary {
                id: session.id().to_owned(),
                users: session.presence_count(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    async fn lookup_or_insert(&self, id: &str) -> Arc<DocumentSession<S>> {
        if let Some(existing) = self.sessions.read().await.get(id).cloned() {
            return existing;
        }

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(id) {
            return Arc::clone(existing);
        }
        if sessions.len() >= self.max_sessions {
            evict_oldest(&mut sessions);
        }

        let session = Arc::new(DocumentSession::new(id, self.limits));
        sessions.insert(id.to_owned(), Arc::clone(&session));
        info!(doc_id = %id, live_sessions = sessions.len(), "created document session");
        session
    }
}

fn evict_oldest<S: Step>(sessions: &mut HashMap<String, Arc<DocumentSession<S>>>) {
    let oldest = sessions
        .iter()
        .min_by_key(|(_, session)| session.last_active())
        .map(|(id, _)| id.clone());
    let Some(session) = oldest.and_then(|id| sessions.remove(&id)) else {
        return;
    };
    session.stop();
    info!(doc_id = %session.id(), "evicted least recently active session");
}
