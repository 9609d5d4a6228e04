// Live state of one collaboratively edited document.
//
// All mutation goes through a single mutex per session: step submission,
// comment mutation, presence recomputation and waiter bookkeeping never
// interleave. Concurrency control is first-committer-wins: a submission
// must be based on the current version or it is rejected.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use quire_common::protocol::docs::{
    CommentEvent, DocSnapshot, EventsResponse, SubmitEventsResponse,
};
use quire_common::step::{Mapping, Step, StepError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::comments::CommentTracker;
use super::waiter::{ParkedPoll, Waiter};

pub const DEFAULT_MAX_HISTORY: usize = 10_000;
pub const DEFAULT_PRESENCE_DEBOUNCE: Duration = Duration::from_secs(5);

/// Per-session bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Accepted steps retained for replay.
    pub max_history: usize,
    /// Delay before presence is re-derived from parked polls.
    pub presence_debounce: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self { max_history: DEFAULT_MAX_HISTORY, presence_debounce: DEFAULT_PRESENCE_DEBOUNCE }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid version {requested}, current version is {current}")]
    InvalidVersion { requested: u64, current: u64 },

    #[error("invalid comment version {requested}, current comment version is {current}")]
    InvalidCommentVersion { requested: u64, current: u64 },

    #[error("version {base} is not current, current version is {current}")]
    VersionConflict { base: u64, current: u64 },

    #[error("history no longer available")]
    HistoryGone,

    #[error("comment {id} has an empty or out-of-document range {from}..{to}")]
    InvalidComment { id: u64, from: usize, to: usize },

    #[error("step {index} could not be applied: {source}")]
    StepFailed {
        index: usize,
        #[source]
        source: StepError,
    },
}

/// An accepted step and the client that submitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry<S> {
    pub step: S,
    pub client_id: u64,
}

/// Everything a client at some baseline is missing.
#[derive(Debug, Clone)]
pub struct Delta<S> {
    pub version: u64,
    pub comment_version: u64,
    pub steps: Vec<HistoryEntry<S>>,
    pub comment: Vec<CommentEvent>,
    pub users: usize,
}

impl<S> Delta<S> {
    pub fn has_changes(&self) -> bool {
        !self.steps.is_empty() || !self.comment.is_empty()
    }

    pub fn into_response(self) -> EventsResponse<S> {
        let (steps, client_ids) =
            self.steps.into_iter().map(|entry| (entry.step, entry.client_id)).unzip();
        EventsResponse {
            version: self.version,
            comment_version: self.comment_version,
            steps,
            client_ids,
            comment: self.comment,
            users: self.users,
        }
    }
}

/// Result of asking for changes: either there is something to send now, or
/// the caller has been parked until the next broadcast.
pub enum PollStart<S: Step> {
    Ready(Delta<S>),
    Parked(ParkedPoll<S>),
}

struct SessionState<S: Step> {
    doc: S::Doc,
    version: u64,
    history: VecDeque<HistoryEntry<S>>,
    comments: CommentTracker,
    last_active: Instant,
    activity_seq: u64,
    presence: HashSet<String>,
    waiters: Vec<Waiter>,
    presence_debounce: Option<JoinHandle<()>>,
    stopped: bool,
}

pub struct DocumentSession<S: Step> {
    id: String,
    limits: SessionLimits,
    state: Mutex<SessionState<S>>,
    next_waiter_id: AtomicU64,
}

impl<S: Step> DocumentSession<S> {
    pub fn new(id: impl Into<String>, limits: SessionLimits) -> Self {
        Self {
            id: id.into(),
            limits,
            state: Mutex::new(SessionState {
                doc: S::Doc::default(),
                version: 0,
                history: VecDeque::new(),
                comments: CommentTracker::new(),
                last_active: Instant::now(),
                activity_seq: 0,
                presence: HashSet::new(),
                waiters: Vec::new(),
                presence_debounce: None,
                stopped: false,
            }),
            next_waiter_id: AtomicU64::new(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> u64 {
        self.state().version
    }

    pub fn comment_version(&self) -> u64 {
        self.state().comments.version()
    }

    pub fn presence_count(&self) -> usize {
        self.state().presence.len()
    }

    pub fn history_len(&self) -> usize {
        self.state().history.len()
    }

    pub fn waiter_count(&self) -> usize {
        self.state().waiters.len()
    }

    pub fn doc(&self) -> S::Doc {
        self.state().doc.clone()
    }

    /// Record an access. `seq` breaks ties between sessions touched within
    /// the same clock tick.
    pub fn touch(&self, seq: u64) {
        let mut state = self.state();
        state.last_active = Instant::now();
        state.activity_seq = seq;
    }

    pub fn last_active(&self) -> (Instant, u64) {
        let state = self.state();
        (state.last_active, state.activity_seq)
    }

    pub fn snapshot(&self) -> DocSnapshot<S::Doc> {
        let state = self.state();
        DocSnapshot {
            doc: state.doc.clone(),
            users: state.presence.len(),
            version: state.version,
            comments: state.comments.comments().to_vec(),
            comment_version: state.comments.version(),
        }
    }

    /// Apply a batch of steps submitted against `base_version`.
    ///
    /// The batch is all-or-nothing: on any error the session is unchanged.
    pub fn submit(
        &self,
        base_version: u64,
        steps: Vec<S>,
        comment_events: Vec<CommentEvent>,
        client_id: u64,
    ) -> Result<SubmitEventsResponse, SessionError> {
        let mut state = self.state();
        check_version(base_version, state.version)?;
        if base_version != state.version {
            return Err(SessionError::VersionConflict {
                base: base_version,
                current: state.version,
            });
        }
        for event in &comment_events {
            if let CommentEvent::Create { id, from, to, .. } = *event {
                if from >= to {
                    return Err(SessionError::InvalidComment { id, from, to });
                }
            }
        }

        let mut doc = state.doc.clone();
        let mut mapping = Mapping::new();
        for (index, step) in steps.iter().enumerate() {
            doc = step.apply(&doc).map_err(|source| SessionError::StepFailed { index, source })?;
            mapping.push(step.step_map());
        }
        // Creates are expressed in post-batch coordinates.
        let size = S::doc_size(&doc);
        for event in &comment_events {
            if let CommentEvent::Create { id, from, to, .. } = *event {
                if to > size {
                    return Err(SessionError::InvalidComment { id, from, to });
                }
            }
        }

        let accepted = steps.len();
        state.doc = doc;
        state.version += accepted as u64;
        state
            .history
            .extend(steps.into_iter().map(|step| HistoryEntry { step, client_id }));
        let overflow = state.history.len().saturating_sub(self.limits.max_history);
        state.history.drain(..overflow);

        state.comments.map_through(&mapping);
        for event in comment_events {
            state.comments.apply(event);
        }

        let result = SubmitEventsResponse {
            version: state.version,
            comment_version: state.comments.version(),
        };
        info!(
            doc_id = %self.id,
            client_id,
            accepted,
            version = result.version,
            comment_version = result.comment_version,
            "accepted step batch"
        );
        self.wake_all(&mut state);
        Ok(result)
    }

    /// Steps and comment events a client at the given baselines is missing.
    pub fn delta(
        &self,
        since_version: u64,
        since_comment_version: u64,
    ) -> Result<Delta<S>, SessionError> {
        delta_locked(&self.state(), since_version, since_comment_version)
    }

    /// Like [`DocumentSession::delta`], but parks the caller when there is
    /// nothing to send. Checking and parking happen under one lock so a
    /// submission cannot slip in between.
    pub fn poll(
        self: &Arc<Self>,
        since_version: u64,
        since_comment_version: u64,
        ip: &str,
    ) -> Result<PollStart<S>, SessionError> {
        let mut state = self.state();
        let delta = delta_locked(&state, since_version, since_comment_version)?;
        if delta.has_changes() {
            return Ok(PollStart::Ready(delta));
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (waiter, wake) = Waiter::new(id, ip);
        state.waiters.push(waiter);
        debug!(doc_id = %self.id, waiter_id = id, ip, waiters = state.waiters.len(), "parked poll");
        Ok(PollStart::Parked(ParkedPoll::new(Arc::clone(self), id, wake)))
    }

    /// The answer for a poll that timed out: current counters, no changes.
    pub fn idle(&self) -> Delta<S> {
        let state = self.state();
        Delta {
            version: state.version,
            comment_version: state.comments.version(),
            steps: Vec::new(),
            comment: Vec::new(),
            users: state.presence.len(),
        }
    }

    /// Mark `ip` as present. A newly seen address wakes every parked poll.
    pub fn register_user(self: &Arc<Self>, ip: &str) {
        let mut state = self.state();
        if self.add_user_locked(&mut state, ip) {
            self.wake_all(&mut state);
        }
    }

    /// Re-derive presence from the addresses behind parked polls.
    pub fn collect_users(self: &Arc<Self>) {
        let mut state = self.state();
        let before = state.presence.len();
        state.presence.clear();
        state.presence_debounce = None;

        let ips: Vec<String> = state.waiters.iter().map(|waiter| waiter.ip.clone()).collect();
        for ip in &ips {
            self.add_user_locked(&mut state, ip);
        }

        let after = state.presence.len();
        debug!(doc_id = %self.id, before, after, "recomputed presence");
        if after != before {
            self.wake_all(&mut state);
        }
    }

    /// Cancel pending timers ahead of discarding the session.
    pub fn stop(&self) {
        let mut state = self.state();
        state.stopped = true;
        if let Some(task) = state.presence_debounce.take() {
            task.abort();
        }
    }

    pub(super) fn remove_waiter(&self, waiter_id: u64) {
        let mut state = self.state();
        if let Some(found) = state.waiters.iter().position(|waiter| waiter.id == waiter_id) {
            state.waiters.swap_remove(found);
            debug!(doc_id = %self.id, waiter_id, "removed parked poll");
        }
    }

    fn add_user_locked(self: &Arc<Self>, state: &mut SessionState<S>, ip: &str) -> bool {
        if !state.presence.insert(ip.to_owned()) {
            return false;
        }
        if state.presence_debounce.is_none() && !state.stopped {
            let session = Arc::downgrade(self);
            let delay = self.limits.presence_debounce;
            state.presence_debounce = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(session) = session.upgrade() {
                    session.collect_users();
                }
            }));
        }
        true
    }

    fn wake_all(&self, state: &mut SessionState<S>) {
        if state.waiters.is_empty() {
            return;
        }
        debug!(doc_id = %self.id, waiters = state.waiters.len(), "waking parked polls");
        for waiter in state.waiters.drain(..) {
            waiter.wake();
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_version(requested: u64, current: u64) -> Result<(), SessionError> {
    if requested > current {
        return Err(SessionError::InvalidVersion { requested, current });
    }
    Ok(())
}

fn delta_locked<S: Step>(
    state: &SessionState<S>,
    since_version: u64,
    since_comment_version: u64,
) -> Result<Delta<S>, SessionError> {
    check_version(since_version, state.version)?;
    let comment_version = state.comments.version();
    if since_comment_version > comment_version {
        return Err(SessionError::InvalidCommentVersion {
            requested: since_comment_version,
            current: comment_version,
        });
    }

    let start = replay_start(state.history.len(), state.version - since_version)?;
    let comment_start = replay_start(
        state.comments.event_count(),
        comment_version - since_comment_version,
    )?;

    Ok(Delta {
        version: state.version,
        comment_version,
        steps: state.history.iter().skip(start).cloned().collect(),
        comment: state.comments.events_after(comment_start),
        users: state.presence.len(),
    })
}

/// Index into a retained log of `retained` entries where a client that is
/// `behind` entries behind should start reading.
fn replay_start(retained: usize, behind: u64) -> Result<usize, SessionError> {
    usize::try_from(behind)
        .ok()
        .and_then(|behind| retained.checked_sub(behind))
        .ok_or(SessionError::HistoryGone)
}
