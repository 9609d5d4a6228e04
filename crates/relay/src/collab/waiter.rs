// Long-poll parking.
//
// A parked poll is a one-shot subscription to the session's next broadcast.
// It ends exactly once: woken by a broadcast, expired by its timeout, or
// dropped because the client went away. Dropping the handle always removes
// the waiter from the session, so a disconnected client leaves nothing
// behind.

use std::sync::Arc;
use std::time::Duration;

use quire_common::step::Step;
use tokio::sync::oneshot;

use super::session::DocumentSession;

/// Session-side half of a parked poll.
pub(crate) struct Waiter {
    pub(crate) id: u64,
    pub(crate) ip: String,
    wake: oneshot::Sender<()>,
}

impl Waiter {
    pub(crate) fn new(id: u64, ip: &str) -> (Self, oneshot::Receiver<()>) {
        let (wake, woken) = oneshot::channel();
        (Self { id, ip: ip.to_owned(), wake }, woken)
    }

    pub(crate) fn wake(self) {
        // The receiver is gone when the poll already ended on its own.
        let _ = self.wake.send(());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Woken,
    TimedOut,
}

/// Request-side half of a parked poll.
pub struct ParkedPoll<S: Step> {
    session: Arc<DocumentSession<S>>,
    id: u64,
    woken: oneshot::Receiver<()>,
}

impl<S: Step> ParkedPoll<S> {
    pub(crate) fn new(
        session: Arc<DocumentSession<S>>,
        id: u64,
        woken: oneshot::Receiver<()>,
    ) -> Self {
        Self { session, id, woken }
    }

    /// Wait for the next broadcast, at most `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> PollOutcome {
        match tokio::time::timeout(timeout, &mut self.woken).await {
            // A closed channel means the waiter was discarded with its
            // session; the caller recomputes against what it holds.
            Ok(_) => PollOutcome::Woken,
            Err(_) => PollOutcome::TimedOut,
        }
    }
}

impl<S: Step> Drop for ParkedPoll<S> {
    fn drop(&mut self) {
        self.session.remove_waiter(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::session::{PollStart, SessionLimits};
    use quire_common::step::text::TextStep;

    fn shared_session() -> Arc<DocumentSession<TextStep>> {
        Arc::new(DocumentSession::new("doc-1", SessionLimits::default()))
    }

    fn park(session: &Arc<DocumentSession<TextStep>>, ip: &str) -> ParkedPoll<TextStep> {
        match session.poll(session.version(), session.comment_version(), ip) {
            Ok(PollStart::Parked(parked)) => parked,
            Ok(PollStart::Ready(_)) => panic!("expected the poll to park"),
            Err(error) => panic!("poll failed: {error}"),
        }
    }

    #[tokio::test]
    async fn poll_with_pending_steps_is_ready_immediately() {
        let session = shared_session();
        session.submit(0, vec![TextStep::insert(0, "x")], vec![], 1).unwrap();

        match session.poll(0, 0, "10.0.0.1").unwrap() {
            PollStart::Ready(delta) => assert_eq!(delta.steps.len(), 1),
            PollStart::Parked(_) => panic!("steps are pending"),
        }
        assert_eq!(session.waiter_count(), 0);
    }

    #[tokio::test]
    async fn idle_poll_times_out_and_unparks() {
        let session = shared_session();
        let parked = park(&session, "10.0.0.1");
        assert_eq!(session.waiter_count(), 1);

        let outcome = parked.wait(Duration::from_millis(50)).await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(session.waiter_count(), 0);
        let idle = session.idle();
        assert!(!idle.has_changes());
        assert_eq!(idle.version, 0);
    }

    #[tokio::test]
    async fn one_submission_wakes_every_parked_poll() {
        let session = shared_session();
        let first = park(&session, "10.0.0.1");
        let second = park(&session, "10.0.0.2");

        let waits = tokio::spawn(async move {
            let timeout = Duration::from_secs(5);
            (first.wait(timeout).await, second.wait(timeout).await)
        });
        tokio::task::yield_now().await;
        session.submit(0, vec![TextStep::insert(0, "hi")], vec![], 7).unwrap();

        let (first, second) = waits.await.expect("wait task should finish");
        assert_eq!(first, PollOutcome::Woken);
        assert_eq!(second, PollOutcome::Woken);
        assert_eq!(session.waiter_count(), 0);

        let delta = session.delta(0, 0).unwrap();
        assert_eq!(delta.steps.len(), 1);
        assert_eq!(delta.steps[0].client_id, 7);
    }

    #[tokio::test]
    async fn dropping_a_parked_poll_removes_it() {
        let session = shared_session();
        let parked = park(&session, "10.0.0.1");
        let _other = park(&session, "10.0.0.2");

        drop(parked);

        assert_eq!(session.waiter_count(), 1);
    }

    #[tokio::test]
    async fn new_user_wakes_parked_polls() {
        let session = shared_session();
        let parked = park(&session, "10.0.0.1");

        session.register_user("10.0.0.9");

        assert_eq!(parked.wait(Duration::from_secs(5)).await, PollOutcome::Woken);
        assert_eq!(session.presence_count(), 1);
        session.stop();
    }
}
