// JSON wire types for the `/docs` HTTP protocol.

use serde::{Deserialize, Serialize};

/// An inline annotation anchored to the half-open range `from..to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub from: usize,
    pub to: usize,
    pub text: String,
}

/// A comment mutation, as submitted by clients and as replayed to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommentEvent {
    Create { id: u64, from: usize, to: usize, text: String },
    Delete { id: u64 },
}

impl From<Comment> for CommentEvent {
    fn from(comment: Comment) -> Self {
        Self::Create { id: comment.id, from: comment.from, to: comment.to, text: comment.text }
    }
}

/// Body of `POST /docs/{id}/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitEventsRequest<S> {
    pub version: u64,
    pub steps: Vec<S>,
    #[serde(default)]
    pub comment: Vec<CommentEvent>,
    #[serde(rename = "clientID")]
    pub client_id: u64,
}

/// Success body of `POST /docs/{id}/events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEventsResponse {
    pub version: u64,
    pub comment_version: u64,
}

/// Success body of `GET /docs/{id}/events`.
///
/// `steps` and `client_ids` are parallel: entry `i` of one belongs to entry
/// `i` of the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse<S> {
    pub version: u64,
    pub comment_version: u64,
    pub steps: Vec<S>,
    #[serde(rename = "clientIDs")]
    pub client_ids: Vec<u64>,
    pub comment: Vec<CommentEvent>,
    pub users: usize,
}

/// Body of `GET /docs/{id}`: everything needed to start editing from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSnapshot<D> {
    pub doc: D,
    pub users: usize,
    pub version: u64,
    pub comments: Vec<Comment>,
    pub comment_version: u64,
}

/// One entry of `GET /docs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSummary {
    pub id: String,
    pub users: usize,
}
