//! Selection session — one in-flight discovery-to-resolution cycle.
//!
//! The resolver is the only cross-call shared state that must never fire
//! twice; it is held as `Option` and taken on use.

use tokio::sync::oneshot;

/// A peripheral offered to the user in the chooser window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub id: String,
    pub display_name: String,
}

/// Lifecycle of a selection session. `Resolved` is terminal; the engine
/// holds at most one live session and reuses the slot for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingSelection,
    Resolving,
    Resolved,
}

/// Single-use completion handle back to the discovery caller.
///
/// Consumed by value, so the type system rules out a second invocation.
/// An empty device id means "no selection".
pub struct Resolver(oneshot::Sender<String>);

impl Resolver {
    pub fn new(tx: oneshot::Sender<String>) -> Self {
        Self(tx)
    }

    /// Report the outcome. The caller may have gone away; a dropped
    /// receiver is not an error.
    pub fn resolve(self, device_id: impl Into<String>) {
        let _ = self.0.send(device_id.into());
    }
}

pub struct SelectionSession {
    candidates: Vec<DeviceCandidate>,
    resolver: Option<Resolver>,
    state: SessionState,
}

impl SelectionSession {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
            resolver: None,
            state: SessionState::Idle,
        }
    }

    /// Accept a discovery event: candidates and resolver are replaced
    /// wholesale, not merged. A superseded unresolved resolver is answered
    /// with "" first so the earlier discovery caller is not left hanging.
    pub fn begin(&mut self, candidates: Vec<DeviceCandidate>, resolver: Resolver) {
        if let Some(superseded) = self.resolver.take() {
            superseded.resolve("");
        }
        self.candidates = candidates;
        self.resolver = Some(resolver);
        self.state = SessionState::AwaitingSelection;
    }

    /// Fire the resolver with an outcome. Returns `false` when it was
    /// already consumed; repeated outcomes are benign no-ops.
    pub fn resolve(&mut self, device_id: &str) -> bool {
        let Some(resolver) = self.resolver.take() else {
            return false;
        };
        self.state = SessionState::Resolving;
        resolver.resolve(device_id);
        self.state = SessionState::Resolved;
        true
    }

    pub fn has_live_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    pub fn candidates(&self) -> &[DeviceCandidate] {
        &self.candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> DeviceCandidate {
        DeviceCandidate {
            id: id.into(),
            display_name: format!("device {id}"),
        }
    }

    fn resolver() -> (Resolver, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (Resolver::new(tx), rx)
    }

    #[test]
    fn begin_transitions_to_awaiting() {
        let mut session = SelectionSession::new();
        assert_eq!(session.state, SessionState::Idle);

        let (r, _rx) = resolver();
        session.begin(vec![candidate("A")], r);
        assert_eq!(session.state, SessionState::AwaitingSelection);
        assert!(session.has_live_resolver());
        assert_eq!(session.candidates().len(), 1);
    }

    #[test]
    fn resolve_consumes_the_handle() {
        let mut session = SelectionSession::new();
        let (r, mut rx) = resolver();
        session.begin(vec![candidate("A")], r);

        assert!(session.resolve("A"));
        assert_eq!(session.state, SessionState::Resolved);
        assert!(!session.has_live_resolver());
        assert_eq!(rx.try_recv().unwrap(), "A");

        // Second outcome is absorbed.
        assert!(!session.resolve("A"));
    }

    #[test]
    fn begin_replaces_candidates_not_merges() {
        let mut session = SelectionSession::new();
        let (r1, _rx1) = resolver();
        session.begin(vec![candidate("A"), candidate("B")], r1);

        let (r2, _rx2) = resolver();
        session.begin(vec![candidate("C")], r2);
        assert_eq!(session.candidates(), &[candidate("C")]);
    }

    #[test]
    fn superseded_resolver_gets_empty_answer() {
        let mut session = SelectionSession::new();
        let (r1, mut rx1) = resolver();
        session.begin(vec![candidate("A")], r1);

        let (r2, mut rx2) = resolver();
        session.begin(vec![candidate("B")], r2);

        assert_eq!(rx1.try_recv().unwrap(), "");
        assert!(rx2.try_recv().is_err());
        assert!(session.has_live_resolver());
    }
}
