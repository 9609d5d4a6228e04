// Collaboration engine: per-document sessions, comment tracking, long-poll
// parking, and the capacity-bounded session registry.

pub mod comments;
pub mod registry;
pub mod session;
pub mod waiter;

pub use registry::SessionRegistry;
pub use session::{Delta, DocumentSession, PollStart, SessionError, SessionLimits};
pub use waiter::{ParkedPoll, PollOutcome};
