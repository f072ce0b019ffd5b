use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::signal::HrSignal;

const DEMO_INTERVAL: Duration = Duration::from_secs(2);

/// Demo mode: resting-to-elevated heart rates out of thin air, for
/// running the app without any hardware.
pub async fn run_demo(tx: Sender<HrSignal>, cancel: CancellationToken) {
    debug!("demo heart rate generator started");
    loop {
        let bpm = rand::thread_rng().gen_range(60..120);
        if tx.send(HrSignal::HeartRate { bpm }).await.is_err() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(DEMO_INTERVAL) => {}
        }
    }
    debug!("demo heart rate generator stopped");
}
