//! BLE heart-rate monitor — scanning, the discovery trigger for the
//! chooser, and streaming of the Heart Rate Measurement characteristic.

use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{Central, CharPropFlags, Manager as _, Peripheral, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral as PlatformPeripheral};
use futures::StreamExt;
use tokio::sync::mpsc::{Sender as TokioSender, UnboundedReceiver};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chooser::SelectionRequest;
use crate::fake;
use crate::session::DeviceCandidate;
use crate::signal::{GuiSignal, HrSignal};

const HEART_RATE_MEASUREMENT_UUID: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// How long one scan pass collects advertisements before the candidate
/// list is handed to the chooser.
const SCAN_WINDOW: Duration = Duration::from_secs(3);

pub struct HrMonitor {
    tx_to_gui: TokioSender<HrSignal>,
    rx_from_gui: UnboundedReceiver<GuiSignal>,
    tx_select: TokioSender<SelectionRequest>,
    demo: Option<CancellationToken>,
}

impl HrMonitor {
    pub fn new(
        tx_to_gui: TokioSender<HrSignal>,
        rx_from_gui: UnboundedReceiver<GuiSignal>,
        tx_select: TokioSender<SelectionRequest>,
    ) -> Self {
        Self {
            tx_to_gui,
            rx_from_gui,
            tx_select,
            demo: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        while let Some(signal) = self.rx_from_gui.recv().await {
            match signal {
                GuiSignal::Connect => {
                    if let Err(err) = self.connect_flow().await {
                        warn!(error = %err, "connect flow failed");
                        let _ = self.tx_to_gui.send(HrSignal::Disconnected).await;
                    }
                }
                // Nothing is streaming at this point.
                GuiSignal::Disconnect => {}
                GuiSignal::StartDemo => self.start_demo(),
                GuiSignal::StopDemo => self.stop_demo(),
            }
        }
        Ok(())
    }

    /// Scan, let the user choose, then stream until disconnect or the
    /// peripheral drops the link.
    async fn connect_flow(&mut self) -> Result<()> {
        let manager = Manager::new().await?;
        let adapter_list = manager.adapters().await?;
        let Some(adapter) = adapter_list.into_iter().next() else {
            warn!("no bluetooth adapter found");
            let _ = self.tx_to_gui.send(HrSignal::AdapterUnavailable).await;
            return Ok(());
        };

        let _ = self.tx_to_gui.send(HrSignal::ScanStarted).await;
        let peripherals = self.scan(&adapter).await?;

        let candidates = candidate_list(&peripherals).await;
        info!(count = candidates.len(), "scan finished");

        let (respond, chosen) = oneshot::channel();
        self.tx_select
            .send(SelectionRequest {
                candidates,
                respond,
            })
            .await
            .map_err(|_| anyhow!("chooser is gone"))?;

        // Burst-discarded requests get their channel closed without a
        // value; treat that the same as "nothing selected".
        let chosen = chosen.await.unwrap_or_default();
        if chosen.is_empty() {
            debug!("no device selected");
            let _ = self.tx_to_gui.send(HrSignal::Disconnected).await;
            return Ok(());
        }

        let Some(peripheral) = peripherals
            .iter()
            .find(|p| p.address().to_string() == chosen)
        else {
            warn!(%chosen, "selected peripheral no longer in range");
            let _ = self.tx_to_gui.send(HrSignal::Disconnected).await;
            return Ok(());
        };

        self.stream_heart_rate(peripheral).await
    }

    async fn scan(&self, adapter: &Adapter) -> Result<Vec<PlatformPeripheral>> {
        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(SCAN_WINDOW).await;
        let peripherals = adapter.peripherals().await?;
        adapter.stop_scan().await?;
        Ok(peripherals)
    }

    async fn stream_heart_rate(&mut self, peripheral: &PlatformPeripheral) -> Result<()> {
        let name = peripheral_name(peripheral)
            .await
            .unwrap_or_else(|| String::from("(unknown device)"));

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| {
                c.uuid == HEART_RATE_MEASUREMENT_UUID
                    && c.properties.contains(CharPropFlags::NOTIFY)
            })
            .ok_or_else(|| anyhow!("{name} has no heart rate measurement characteristic"))?;

        peripheral.subscribe(&characteristic).await?;
        info!(%name, "subscribed to heart rate notifications");
        let _ = self.tx_to_gui.send(HrSignal::Connected(name.clone())).await;

        let mut notifications = peripheral.notifications().await?;
        loop {
            tokio::select! {
                notification = notifications.next() => {
                    let Some(data) = notification else {
                        warn!(%name, "notification stream ended");
                        break;
                    };
                    if data.uuid != HEART_RATE_MEASUREMENT_UUID {
                        continue;
                    }
                    let Some(bpm) = parse_heart_rate(&data.value) else {
                        debug!(value = ?data.value, "unparseable measurement");
                        continue;
                    };
                    let _ = self.tx_to_gui.send(HrSignal::HeartRate { bpm }).await;
                }
                signal = self.rx_from_gui.recv() => {
                    match signal {
                        Some(GuiSignal::Disconnect) | None => break,
                        // Connect and demo requests make no sense while
                        // streaming; absorb them.
                        Some(_) => {}
                    }
                }
            }
        }

        info!(%name, "disconnecting");
        let _ = peripheral.disconnect().await;
        let _ = self.tx_to_gui.send(HrSignal::Disconnected).await;
        Ok(())
    }

    fn start_demo(&mut self) {
        if self.demo.is_some() {
            return;
        }
        let token = CancellationToken::new();
        tokio::spawn(fake::run_demo(self.tx_to_gui.clone(), token.clone()));
        self.demo = Some(token);
    }

    fn stop_demo(&mut self) {
        if let Some(token) = self.demo.take() {
            token.cancel();
        }
    }
}

async fn candidate_list(peripherals: &[PlatformPeripheral]) -> Vec<DeviceCandidate> {
    let mut candidates = Vec::new();
    for peripheral in peripherals {
        // Nameless advertisements are not worth offering to the user.
        let Some(name) = peripheral_name(peripheral).await else {
            continue;
        };
        candidates.push(DeviceCandidate {
            id: peripheral.address().to_string(),
            display_name: name,
        });
    }
    candidates
}

async fn peripheral_name(peripheral: &PlatformPeripheral) -> Option<String> {
    let Ok(Some(properties)) = peripheral.properties().await else {
        return None;
    };
    properties.local_name
}

/// GATT Heart Rate Measurement: flags bit 0 selects an 8-bit or a 16-bit
/// little-endian BPM field after the flags byte.
pub fn parse_heart_rate(value: &[u8]) -> Option<u16> {
    let flags = *value.first()?;
    if flags & 0x01 != 0 {
        let lo = *value.get(1)?;
        let hi = *value.get(2)?;
        Some(u16::from_le_bytes([lo, hi]))
    } else {
        value.get(1).map(|&bpm| u16::from(bpm))
    }
}
