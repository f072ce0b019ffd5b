use std::path::Path;
use std::time::Duration;

use eframe::egui::{self, Align2};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, Receiver as TokioReceiver, UnboundedReceiver, UnboundedSender};
use tracing_subscriber::EnvFilter;

mod chooser;
mod fake;
mod monitor;
mod session;
mod signal;
mod store;
mod surface;
mod widget;

use chooser::{ChooserCoordinator, ChooserEngine};
use monitor::HrMonitor;
use session::DeviceCandidate;
use signal::{ChooserCommand, ChooserSignal, GuiSignal, HrSignal};
use store::{DataStore, HrSample};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (tx_hr, rx_hr) = mpsc::channel(128);
    let (tx_select, rx_select) = mpsc::channel(16);
    let (tx_notify, rx_notify) = mpsc::unbounded_channel();
    let (tx_cmd, rx_cmd) = mpsc::unbounded_channel();
    let (tx_gui, rx_gui) = mpsc::unbounded_channel();

    let coordinator = ChooserCoordinator::new(ChooserEngine::new(tx_notify), rx_select, rx_cmd);
    tokio::spawn(coordinator.run());

    let mut hr_monitor = HrMonitor::new(tx_hr, rx_gui, tx_select);
    tokio::spawn(async move {
        if let Err(err) = hr_monitor.run().await {
            tracing::error!(error = %err, "monitor task failed");
        }
    });

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([600.0, 300.0])
            .with_resizable(false),
        ..Default::default()
    };
    let _ = eframe::run_native(
        "Ink Heart Rate Monitor",
        native_options,
        Box::new(|cc| Ok(Box::new(InkHrApp::new(cc, rx_hr, rx_notify, tx_cmd, tx_gui)))),
    );
}

struct InkHrApp {
    rx_from_monitor: TokioReceiver<HrSignal>,
    rx_from_chooser: UnboundedReceiver<ChooserSignal>,
    tx_chooser: UnboundedSender<ChooserCommand>,
    tx_monitor: UnboundedSender<GuiSignal>,

    live_bpm: u16,
    connected: bool,
    connecting: bool,
    demo: bool,
    active_device: Option<String>,
    status: Option<String>,

    chooser_visible: bool,
    candidates: Vec<DeviceCandidate>,

    samples: Vec<HrSample>,
    store: DataStore,
}

impl InkHrApp {
    fn new(
        _cc: &eframe::CreationContext<'_>,
        rx_from_monitor: TokioReceiver<HrSignal>,
        rx_from_chooser: UnboundedReceiver<ChooserSignal>,
        tx_chooser: UnboundedSender<ChooserCommand>,
        tx_monitor: UnboundedSender<GuiSignal>,
    ) -> Self {
        InkHrApp {
            rx_from_monitor,
            rx_from_chooser,
            tx_chooser,
            tx_monitor,
            live_bpm: 0,
            connected: false,
            connecting: false,
            demo: false,
            active_device: None,
            status: None,
            chooser_visible: false,
            candidates: Vec::new(),
            samples: Vec::new(),
            store: DataStore::new(),
        }
    }

    fn read_channels(&mut self) {
        while let Ok(signal) = self.rx_from_monitor.try_recv() {
            match signal {
                HrSignal::HeartRate { bpm } => {
                    self.live_bpm = bpm;
                    if self.connected {
                        self.samples.push(HrSample::now(bpm));
                    }
                }
                HrSignal::ScanStarted => {
                    self.connecting = true;
                    self.status = Some(
                        match self.store.get("last_device").and_then(Value::as_str) {
                            Some(last) => format!("Scanning for devices... (last used: {last})"),
                            None => String::from("Scanning for devices..."),
                        },
                    );
                }
                HrSignal::Connected(name) => {
                    self.connected = true;
                    self.connecting = false;
                    self.status = None;
                    self.store.set("last_device", json!(name));
                    self.active_device = Some(name);
                }
                HrSignal::Disconnected => {
                    self.connected = false;
                    self.connecting = false;
                    self.live_bpm = 0;
                    self.active_device = None;
                }
                HrSignal::AdapterUnavailable => {
                    self.connecting = false;
                    self.status = Some(String::from("No Bluetooth adapter available"));
                }
            }
        }

        while let Ok(signal) = self.rx_from_chooser.try_recv() {
            match signal {
                ChooserSignal::VisibilityChanged(visible) => {
                    self.chooser_visible = visible;
                    if visible {
                        // Pull the current list for the freshly shown or
                        // refreshed window.
                        let _ = self.tx_chooser.send(ChooserCommand::RequestCandidates);
                    }
                }
                ChooserSignal::SelectionCanceled => {
                    self.connecting = false;
                    self.status = Some(String::from("Selection canceled"));
                }
                ChooserSignal::Candidates(candidates) => self.candidates = candidates,
            }
        }
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if !self.connected && !self.demo {
                if ui.add(widget::action_button("Connect")).clicked() {
                    // An explicit retry always clears "stop asking me".
                    let _ = self.tx_chooser.send(ChooserCommand::ResetSuppression);
                    let _ = self.tx_monitor.send(GuiSignal::Connect);
                    self.connecting = true;
                    self.status = None;
                }
                if ui.add(widget::action_button("Demo")).clicked() {
                    let _ = self.tx_monitor.send(GuiSignal::StartDemo);
                    self.demo = true;
                    self.connected = true;
                    self.status = None;
                }
            } else if ui.add(widget::action_button("Disconnect")).clicked() {
                let signal = if self.demo {
                    GuiSignal::StopDemo
                } else {
                    GuiSignal::Disconnect
                };
                let _ = self.tx_monitor.send(signal);
                self.demo = false;
                self.connected = false;
                self.connecting = false;
                self.live_bpm = 0;
                self.active_device = None;
            }

            if !self.samples.is_empty() && ui.add(widget::action_button("Save")).clicked() {
                self.status = match store::save_samples(
                    Path::new(store::SAMPLES_FILE),
                    &self.samples,
                ) {
                    Ok(()) => Some(format!(
                        "Saved {} samples to {}",
                        self.samples.len(),
                        store::SAMPLES_FILE
                    )),
                    Err(err) => Some(format!("Save failed: {err}")),
                };
            }
        });
    }

    fn render_chooser(&mut self, ctx: &egui::Context) {
        let mut open = true;
        let mut command = None;
        egui::Window::new("Select heart-rate device")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                if self.candidates.is_empty() {
                    ui.label("No heart-rate devices found yet.");
                }
                for candidate in &self.candidates {
                    if ui
                        .add(widget::device_button(&candidate.display_name))
                        .clicked()
                    {
                        command = Some(ChooserCommand::Pick(candidate.id.clone()));
                    }
                }
                ui.separator();
                if ui.button("Cancel").clicked() {
                    command = Some(ChooserCommand::Cancel);
                }
            });

        if !open {
            // The window's own close button: distinct from Cancel, the
            // engine reads it as "stop asking me".
            command = Some(ChooserCommand::Dismissed);
            self.chooser_visible = false;
        }
        if let Some(command) = command {
            let _ = self.tx_chooser.send(command);
        }
    }
}

impl eframe::App for InkHrApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.read_channels();

        let central_panel = egui::CentralPanel::default();
        central_panel.show(ctx, |ui| {
            // The chooser is modal: the main surface takes no input while
            // a decision is pending.
            ui.add_enabled_ui(!self.chooser_visible, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(24.0);
                    ui.add(widget::heart_rate_label(self.live_bpm));
                    ui.add_space(8.0);
                    if let Some(device) = &self.active_device {
                        ui.label(device);
                    }
                    ui.add_space(16.0);
                    self.render_controls(ui);
                    ui.add_space(8.0);
                    ui.add(widget::status_label(self.connected, self.connecting));
                    if let Some(status) = &self.status {
                        ui.label(status);
                    }
                });
            });
        });

        if self.chooser_visible {
            self.render_chooser(ctx);
        }

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
