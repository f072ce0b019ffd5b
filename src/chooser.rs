//! Device-chooser coordination engine.
//!
//! Decides when the chooser window appears, guarantees every discovery
//! request gets exactly one answer, coalesces bursts of discovery events,
//! and remembers when the user closed the window on us so we stop asking.
//!
//! All handlers are synchronous state transitions; the async coordinator
//! at the bottom just feeds them from the discovery and GUI channels.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::{Receiver, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::session::{DeviceCandidate, Resolver, SelectionSession};
use crate::signal::{ChooserCommand, ChooserSignal};
use crate::surface::SurfaceController;

/// Discovery events landing inside this window collapse into the session
/// created by the first one.
pub const DISCOVERY_DEBOUNCE: Duration = Duration::from_millis(300);

/// Discovery trigger payload from the monitor: the current candidate list
/// and the oneshot the chosen device id (or "") goes back through.
pub struct SelectionRequest {
    pub candidates: Vec<DeviceCandidate>,
    pub respond: oneshot::Sender<String>,
}

pub struct ChooserEngine {
    session: SelectionSession,
    surface: SurfaceController,
    /// True once the user closed the chooser window without deciding.
    /// While set, discovery events are answered "" without a prompt.
    manually_closed: bool,
    guard_until: Option<Instant>,
    tx_to_gui: UnboundedSender<ChooserSignal>,
}

impl ChooserEngine {
    pub fn new(tx_to_gui: UnboundedSender<ChooserSignal>) -> Self {
        Self {
            session: SelectionSession::new(),
            surface: SurfaceController::new(),
            manually_closed: false,
            guard_until: None,
            tx_to_gui,
        }
    }

    /// A discovery event from the monitor. `now` is passed in so the
    /// debounce window is deterministic under test.
    ///
    /// Inside the debounce window the event is discarded outright; the
    /// live session already carries the freshest list. Dropping the
    /// resolver closes its channel, so the caller still learns nothing
    /// came of it.
    pub fn on_discovery(
        &mut self,
        candidates: Vec<DeviceCandidate>,
        resolver: Resolver,
        now: Instant,
    ) {
        if let Some(until) = self.guard_until {
            if now < until {
                debug!("discovery event inside debounce window, discarded");
                return;
            }
        }
        self.guard_until = Some(now + DISCOVERY_DEBOUNCE);

        if self.manually_closed {
            debug!("chooser suppressed, auto-resolving to no selection");
            resolver.resolve("");
            return;
        }

        self.session.begin(candidates, resolver);
        let action = self.surface.ensure();
        debug!(?action, count = self.session.candidates().len(), "chooser surface ensured");
        self.notify(ChooserSignal::VisibilityChanged(self.surface.is_visible()));
    }

    /// The user picked a device ("" means cancel). Returns whether this
    /// call actually resolved the session; a pick racing an earlier
    /// outcome is a benign no-op.
    pub fn on_pick(&mut self, device_id: &str) -> bool {
        if !self.session.resolve(device_id) {
            debug!("pick with no live session, ignored");
            return false;
        }
        info!(device_id, "device selection resolved");
        self.surface.close();
        self.notify(ChooserSignal::VisibilityChanged(self.surface.is_visible()));
        true
    }

    /// Explicit cancel from the chooser's own cancel control. Unlike a
    /// window close this does not suppress future prompts.
    pub fn on_cancel(&mut self) {
        if self.on_pick("") {
            self.notify(ChooserSignal::SelectionCanceled);
        }
    }

    /// The chooser window was destroyed through its close affordance.
    /// With a decision still pending this is read as "stop asking me":
    /// the session resolves to "" and future discovery events are
    /// suppressed until `reset_suppression`. After a pick it is just the
    /// window going away.
    pub fn on_dismissed(&mut self) {
        if self.session.has_live_resolver() {
            // The user closed the window with a decision still pending.
            info!("chooser window closed by user, suppressing future prompts");
            self.session.resolve("");
            self.manually_closed = true;
        }
        self.surface.mark_dismissed();
        self.notify(ChooserSignal::VisibilityChanged(self.surface.is_visible()));
    }

    /// The user explicitly asked to connect again; prompting is welcome
    /// once more. Idempotent.
    pub fn reset_suppression(&mut self) {
        self.manually_closed = false;
    }

    /// Candidate pull for the chooser window's refresh.
    pub fn send_candidates(&self) {
        self.notify(ChooserSignal::Candidates(self.current_candidates().to_vec()));
    }

    pub fn current_candidates(&self) -> &[DeviceCandidate] {
        self.session.candidates()
    }

    fn notify(&self, signal: ChooserSignal) {
        let _ = self.tx_to_gui.send(signal);
    }
}

/// Feeds the engine from the monitor's discovery channel and the GUI's
/// command channel. Single task, so every handler runs to completion
/// before the next event is looked at.
pub struct ChooserCoordinator {
    engine: ChooserEngine,
    rx_discovery: Receiver<SelectionRequest>,
    rx_commands: UnboundedReceiver<ChooserCommand>,
}

impl ChooserCoordinator {
    pub fn new(
        engine: ChooserEngine,
        rx_discovery: Receiver<SelectionRequest>,
        rx_commands: UnboundedReceiver<ChooserCommand>,
    ) -> Self {
        Self {
            engine,
            rx_discovery,
            rx_commands,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.rx_discovery.recv() => {
                    let Some(request) = request else { break; };
                    self.engine.on_discovery(
                        request.candidates,
                        Resolver::new(request.respond),
                        Instant::now(),
                    );
                }
                command = self.rx_commands.recv() => {
                    let Some(command) = command else { break; };
                    self.handle_command(command);
                }
            }
        }
    }

    fn handle_command(&mut self, command: ChooserCommand) {
        match command {
            ChooserCommand::Pick(device_id) => {
                self.engine.on_pick(&device_id);
            }
            ChooserCommand::Cancel => self.engine.on_cancel(),
            ChooserCommand::Dismissed => self.engine.on_dismissed(),
            ChooserCommand::ResetSuppression => self.engine.reset_suppression(),
            ChooserCommand::RequestCandidates => self.engine.send_candidates(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn engine() -> (ChooserEngine, mpsc::UnboundedReceiver<ChooserSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChooserEngine::new(tx), rx)
    }

    fn candidate(id: &str) -> DeviceCandidate {
        DeviceCandidate {
            id: id.into(),
            display_name: format!("HR-Band {id}"),
        }
    }

    fn resolver() -> (Resolver, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (Resolver::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChooserSignal>) -> Vec<ChooserSignal> {
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    fn visibility(signals: &[ChooserSignal]) -> Vec<bool> {
        signals
            .iter()
            .filter_map(|s| match s {
                ChooserSignal::VisibilityChanged(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn pick_flow_resolves_and_closes() {
        let (mut engine, mut rx) = engine();
        let (r, mut outcome) = resolver();
        let now = Instant::now();

        engine.on_discovery(vec![candidate("A")], r, now);
        assert!(engine.on_pick("A"));

        assert_eq!(outcome.try_recv().unwrap(), "A");
        assert!(!engine.manually_closed);
        let signals = drain(&mut rx);
        assert_eq!(visibility(&signals), vec![true, false]);
        assert!(!signals.contains(&ChooserSignal::SelectionCanceled));
    }

    #[test]
    fn resolver_fires_at_most_once() {
        let (mut engine, mut rx) = engine();
        let (r, mut outcome) = resolver();

        engine.on_discovery(vec![candidate("A")], r, Instant::now());
        assert!(engine.on_pick("A"));
        assert!(!engine.on_pick("A"));
        engine.on_cancel();
        engine.on_dismissed();

        assert_eq!(outcome.try_recv().unwrap(), "A");
        let signals = drain(&mut rx);
        // Later outcomes must not have re-resolved or canceled anything.
        assert!(!signals.contains(&ChooserSignal::SelectionCanceled));
        // Pick already set suppression-neutral resolved state; the stray
        // dismiss only reports the window going away.
        assert!(!engine.manually_closed);
    }

    #[test]
    fn burst_inside_debounce_is_coalesced() {
        let (mut engine, mut rx) = engine();
        let now = Instant::now();

        let (r1, mut o1) = resolver();
        engine.on_discovery(vec![candidate("A")], r1, now);
        let (r2, mut o2) = resolver();
        engine.on_discovery(vec![candidate("B")], r2, now + Duration::from_millis(50));
        let (r3, mut o3) = resolver();
        engine.on_discovery(vec![candidate("C")], r3, now + Duration::from_millis(299));

        // One surface, one visibility notification, session untouched by
        // the burst.
        assert_eq!(visibility(&drain(&mut rx)), vec![true]);
        assert_eq!(engine.current_candidates(), &[candidate("A")]);

        // Discarded resolvers are dropped, not resolved; their channels
        // close without a value.
        assert!(matches!(
            o2.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert!(matches!(
            o3.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));

        // The one live resolver still answers.
        assert!(engine.on_pick("A"));
        assert_eq!(o1.try_recv().unwrap(), "A");
        assert!(matches!(
            o3.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn event_after_debounce_refreshes_live_session() {
        let (mut engine, mut rx) = engine();
        let now = Instant::now();

        let (r1, mut o1) = resolver();
        engine.on_discovery(vec![candidate("A")], r1, now);
        drain(&mut rx);

        // Past the window, user has not decided yet: the live session is
        // refreshed, not duplicated, and the superseded resolver gets "".
        let (r2, mut o2) = resolver();
        engine.on_discovery(
            vec![candidate("A"), candidate("B")],
            r2,
            now + Duration::from_millis(301),
        );

        assert_eq!(o1.try_recv().unwrap(), "");
        assert_eq!(
            engine.current_candidates(),
            &[candidate("A"), candidate("B")]
        );
        assert_eq!(visibility(&drain(&mut rx)), vec![true]);

        assert!(engine.on_pick("B"));
        assert_eq!(o2.try_recv().unwrap(), "B");
    }

    #[test]
    fn dismiss_with_pending_decision_suppresses() {
        let (mut engine, mut rx) = engine();
        let (r, mut outcome) = resolver();

        engine.on_discovery(vec![], r, Instant::now());
        engine.on_dismissed();

        assert_eq!(outcome.try_recv().unwrap(), "");
        assert!(engine.manually_closed);
        assert_eq!(visibility(&drain(&mut rx)), vec![true, false]);
    }

    #[test]
    fn suppressed_discovery_is_auto_resolved_silently() {
        let (mut engine, mut rx) = engine();
        let now = Instant::now();

        let (r1, _o1) = resolver();
        engine.on_discovery(vec![], r1, now);
        engine.on_dismissed();
        drain(&mut rx);

        let (r2, mut o2) = resolver();
        engine.on_discovery(
            vec![candidate("B")],
            r2,
            now + Duration::from_millis(400),
        );

        assert_eq!(o2.try_recv().unwrap(), "");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn cancel_emits_distinct_notification_and_keeps_suppression_clear() {
        let (mut engine, mut rx) = engine();
        let (r, mut outcome) = resolver();

        engine.on_discovery(vec![candidate("A")], r, Instant::now());
        engine.on_cancel();

        assert_eq!(outcome.try_recv().unwrap(), "");
        assert!(!engine.manually_closed);
        let signals = drain(&mut rx);
        assert_eq!(visibility(&signals), vec![true, false]);
        assert!(signals.contains(&ChooserSignal::SelectionCanceled));
    }

    #[test]
    fn cancel_without_live_session_is_a_full_noop() {
        let (mut engine, mut rx) = engine();
        engine.on_cancel();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn reset_reopens_prompting() {
        let (mut engine, mut rx) = engine();
        let now = Instant::now();

        let (r1, _o1) = resolver();
        engine.on_discovery(vec![], r1, now);
        engine.on_dismissed();
        assert!(engine.manually_closed);

        engine.reset_suppression();
        engine.reset_suppression(); // idempotent
        assert!(!engine.manually_closed);
        drain(&mut rx);

        let (r2, mut o2) = resolver();
        engine.on_discovery(
            vec![candidate("B")],
            r2,
            now + Duration::from_secs(1),
        );
        assert_eq!(visibility(&drain(&mut rx)), vec![true]);
        assert!(matches!(
            o2.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn dismiss_after_pick_only_reports_visibility() {
        let (mut engine, mut rx) = engine();
        let (r, _outcome) = resolver();

        engine.on_discovery(vec![candidate("A")], r, Instant::now());
        engine.on_pick("A");
        drain(&mut rx);

        // The platform close event lands after the engine already closed
        // the window; plain cleanup, no suppression.
        engine.on_dismissed();
        assert!(!engine.manually_closed);
        assert_eq!(visibility(&drain(&mut rx)), vec![false]);
    }

    #[test]
    fn empty_candidate_list_is_valid_input() {
        let (mut engine, mut rx) = engine();
        let (r, mut outcome) = resolver();

        engine.on_discovery(vec![], r, Instant::now());
        assert_eq!(visibility(&drain(&mut rx)), vec![true]);
        assert!(engine.current_candidates().is_empty());

        engine.on_cancel();
        assert_eq!(outcome.try_recv().unwrap(), "");
    }

    #[test]
    fn candidate_pull_answers_with_current_list() {
        let (mut engine, mut rx) = engine();
        let (r, _outcome) = resolver();

        engine.on_discovery(vec![candidate("A")], r, Instant::now());
        drain(&mut rx);

        engine.send_candidates();
        let signals = drain(&mut rx);
        assert_eq!(
            signals,
            vec![ChooserSignal::Candidates(vec![candidate("A")])]
        );
    }

    #[tokio::test]
    async fn coordinator_wires_discovery_to_pick() {
        let (tx_notify, mut rx_notify) = mpsc::unbounded_channel();
        let (tx_select, rx_select) = mpsc::channel(16);
        let (tx_cmd, rx_cmd) = mpsc::unbounded_channel();

        let coordinator =
            ChooserCoordinator::new(ChooserEngine::new(tx_notify), rx_select, rx_cmd);
        let handle = tokio::spawn(coordinator.run());

        let (respond, outcome) = oneshot::channel();
        tx_select
            .send(SelectionRequest {
                candidates: vec![candidate("A")],
                respond,
            })
            .await
            .unwrap();

        assert_eq!(
            rx_notify.recv().await.unwrap(),
            ChooserSignal::VisibilityChanged(true)
        );

        tx_cmd.send(ChooserCommand::RequestCandidates).unwrap();
        assert_eq!(
            rx_notify.recv().await.unwrap(),
            ChooserSignal::Candidates(vec![candidate("A")])
        );

        tx_cmd.send(ChooserCommand::Pick("A".into())).unwrap();
        assert_eq!(outcome.await.unwrap(), "A");
        assert_eq!(
            rx_notify.recv().await.unwrap(),
            ChooserSignal::VisibilityChanged(false)
        );

        drop(tx_select);
        drop(tx_cmd);
        handle.await.unwrap();
    }
}
