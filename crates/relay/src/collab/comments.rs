// Inline comment tracking for one document.
//
// Comments are anchored to `from..to` ranges that follow the document
// through every accepted batch of steps. Mutations are recorded in an
// append-only event log so lagging clients can catch up; create events are
// re-resolved against the live comment set when replayed.

use quire_common::protocol::docs::{Comment, CommentEvent};
use quire_common::step::Mapping;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentEventKind {
    Create,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoggedEvent {
    kind: CommentEventKind,
    id: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CommentTracker {
    comments: Vec<Comment>,
    events: Vec<LoggedEvent>,
    version: u64,
}

impl CommentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of create/delete mutations ever applied.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Re-project every live comment through `mapping`, dropping the ones
    /// whose range collapses.
    pub fn map_through(&mut self, mapping: &Mapping) {
        self.comments.retain_mut(|comment| {
            let from = mapping.map(comment.from, 1);
            let to = mapping.map(comment.to, -1);
            if from >= to {
                return false;
            }
            comment.from = from;
            comment.to = to;
            true
        });
    }

    /// Apply one client-submitted event.
    pub fn apply(&mut self, event: CommentEvent) {
        match event {
            CommentEvent::Create { id, from, to, text } => {
                self.created(Comment { id, from, to, text })
            }
            CommentEvent::Delete { id } => self.deleted(id),
        }
    }

    pub fn created(&mut self, comment: Comment) {
        if self.index(comment.id).is_some() {
            warn!(comment_id = comment.id, "ignoring create for a comment id that is already live");
            return;
        }
        let id = comment.id;
        self.comments.push(comment);
        self.events.push(LoggedEvent { kind: CommentEventKind::Create, id });
        self.version += 1;
    }

    pub fn deleted(&mut self, id: u64) {
        let Some(found) = self.index(id) else {
            return;
        };
        self.comments.remove(found);
        self.events.push(LoggedEvent { kind: CommentEventKind::Delete, id });
        self.version += 1;
    }

    /// Replay the event log from `start`, resolving creates to current
    /// content. Creates for comments that no longer exist are skipped.
    pub fn events_after(&self, start: usize) -> Vec<CommentEvent> {
        self.events
            .iter()
            .skip(start)
            .filter_map(|event| match event.kind {
                CommentEventKind::Delete => Some(CommentEvent::Delete { id: event.id }),
                CommentEventKind::Create => {
                    self.index(event.id).map(|found| self.comments[found].clone().into())
                }
            })
            .collect()
    }

    fn index(&self, id: u64) -> Option<usize> {
        self.comments.iter().position(|comment| comment.id == id)
    }
}
