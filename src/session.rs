//! Session context
//!
//! One simulation run is a *session*: a process-wide identifier that
//! namespaces every topic, plus the session-wide stop signal. The context is
//! built once at startup and threaded explicitly into the orchestrator and
//! every device runtime - nothing is looked up from ambient process state.

use crate::protocol;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared session identity and stop signal
///
/// Cheap to clone; all clones observe the same stop signal. The signal is
/// monotone: once set it stays set for the process lifetime.
#[derive(Clone)]
pub struct SessionContext {
    session_id: Arc<str>,
    stop: Arc<AtomicBool>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into().into(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// New session with a random 32-hex-digit identifier
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id: String = (0..32)
            .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap())
            .collect();
        Self::new(id)
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Broadcast command topic for this session
    pub fn command_topic(&self) -> String {
        protocol::command_topic(&self.session_id)
    }

    /// Response topic for this session
    pub fn response_topic(&self) -> String {
        protocol::response_topic(&self.session_id)
    }

    /// Raise the session-wide stop signal (irrevocable)
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Whether the session-wide stop signal has been raised
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_are_namespaced_by_id() {
        let session = SessionContext::new("run-1");
        assert_eq!(session.command_topic(), "session:run-1");
        assert_eq!(session.response_topic(), "session:run-1:response");
    }

    #[test]
    fn test_stop_signal_is_shared_and_monotone() {
        let session = SessionContext::new("run-1");
        let clone = session.clone();
        assert!(!clone.stop_requested());
        session.request_stop();
        assert!(clone.stop_requested());
    }

    #[test]
    fn test_generated_ids_are_hex_and_distinct() {
        let a = SessionContext::generate();
        let b = SessionContext::generate();
        assert_eq!(a.id().len(), 32);
        assert!(a.id().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.id(), b.id());
    }
}
