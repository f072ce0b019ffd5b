use crate::session::DeviceCandidate;

/// Monitor → GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HrSignal {
    HeartRate { bpm: u16 },
    ScanStarted,
    Connected(String),
    Disconnected,
    AdapterUnavailable,
}

/// GUI → monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiSignal {
    Connect,
    Disconnect,
    StartDemo,
    StopDemo,
}

/// Engine → GUI, the one-directional notification channel. Fire and
/// forget; the engine never waits on the GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooserSignal {
    VisibilityChanged(bool),
    SelectionCanceled,
    Candidates(Vec<DeviceCandidate>),
}

/// GUI → engine. `Dismissed` is the window's own close affordance and is
/// deliberately a separate variant from `Cancel`, so the engine never has
/// to guess how the window went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooserCommand {
    Pick(String),
    Cancel,
    Dismissed,
    ResetSuppression,
    RequestCandidates,
}
