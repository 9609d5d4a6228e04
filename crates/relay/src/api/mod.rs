// HTTP surface of the collaboration relay.
//
// Routes:
//   GET  /docs                   -> live sessions with presence counts
//   GET  /docs/{id}              -> full snapshot (creates the session)
//   GET  /docs/{id}/events       -> long-poll for steps and comment events
//   POST /docs/{id}/events       -> submit a step batch

pub mod client_ip;
pub mod docs;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use quire_common::step::Step;
use serde::{de::DeserializeOwned, Serialize};

use crate::collab::SessionRegistry;

pub use client_ip::ClientIp;

/// Shared state for the document routes.
pub struct DocsApiState<S: Step> {
    pub registry: Arc<SessionRegistry<S>>,
    pub poll_timeout: Duration,
}

impl<S: Step> Clone for DocsApiState<S> {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry), poll_timeout: self.poll_timeout }
    }
}

pub fn router<S>(registry: Arc<SessionRegistry<S>>, poll_timeout: Duration) -> Router
where
    S: Step + Serialize + DeserializeOwned,
    S::Doc: Serialize,
{
    Router::new()
        .route("/docs", get(docs::list_docs::<S>))
        .route("/docs/{id}", get(docs::get_doc::<S>))
        .route("/docs/{id}/events", get(docs::poll_events::<S>).post(docs::submit_events::<S>))
        .with_state(DocsApiState { registry, poll_timeout })
}
