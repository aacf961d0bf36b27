//! # Setup Window
//!
//! Single egui window for stepping a shutter towards its limit switches:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ ● Connected                  │  status
//! │ [Settings] [Connect] [Disc.] │
//! │ Cover: [Kitchen        ▼]    │  discovered covers
//! │ 42 / 100                     │  live position / fully open
//! │ [Up] [Stop] [Down]           │  ±10 relative steps
//! │ [________________] [Send]    │  raw command
//! └──────────────────────────────┘
//! ```
//!
//! The window holds no protocol state. It reads the shutter core's
//! [`PresentationView`] every frame and forwards button presses as intents.
//! The cover list is re-read only when the core requests a refresh.

pub mod common;
pub mod settings;

use eframe::egui::{self, Button, ComboBox, Id, Modal, TextEdit, Vec2};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::config::{AppConfig, BrokerConfig};
use crate::mqtt::connection::ConnectionState;
use crate::session::Session;
use crate::shutter::{MoveCommand, PresentationView};

use self::common::{section_frame, state_color};
use self::settings::SettingsPanel;

pub struct ShutterSetupUI {
    runtime: Handle,
    session: Arc<Session>,
    view: PresentationView,
    connection_state: watch::Receiver<ConnectionState>,
    config: AppConfig,
    settings: SettingsPanel,
    show_settings: bool,
    selected: String,
    cover_names: Vec<String>,
    raw_command: String,
    dialog: mpsc::UnboundedReceiver<String>,
    error_message: Option<String>,
}

impl ShutterSetupUI {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Handle,
        session: Arc<Session>,
        config: AppConfig,
        dialog: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        let view = session.controller().view();
        Self {
            cover_names: view.device_names(),
            view,
            connection_state: session.connection_state(),
            settings: SettingsPanel::new(&config.broker),
            runtime,
            session,
            config,
            show_settings: false,
            selected: String::new(),
            raw_command: String::new(),
            dialog,
            error_message: None,
        }
    }

    fn apply_settings(&mut self, broker: BrokerConfig) {
        info!("Applying broker settings for {}", broker.url);
        self.config.broker = broker;
        let config = self.config.clone();
        self.runtime.spawn(async move {
            if let Err(e) = config.save().await {
                error!("Settings not saved: {}", e);
            }
        });
    }

    fn connect(&mut self) {
        if let Err(e) = self.session.connect(&self.config.broker) {
            error!("Connect failed: {}", e);
            self.error_message = Some(e.to_string());
        }
    }

    fn render_status(&mut self, ui: &mut egui::Ui) {
        let state = *self.connection_state.borrow();
        ui.horizontal(|ui| {
            ui.colored_label(state_color(state), "\u{2B24}");
            ui.label(self.view.status());
        });

        ui.horizontal(|ui| {
            if ui.button("Settings").clicked() {
                self.show_settings = !self.show_settings;
            }
            if ui.button("Connect").clicked() {
                self.connect();
            }
            if ui
                .add_enabled(self.session.is_running(), Button::new("Disconnect"))
                .clicked()
            {
                self.session.disconnect();
            }
        });

        if self.show_settings {
            if let Some(broker) = self.settings.render(ui) {
                self.apply_settings(broker);
                self.show_settings = false;
            }
        }
    }

    fn render_cover(&mut self, ui: &mut egui::Ui) {
        if let Some(names) = self.view.changed_device_names() {
            self.cover_names = names;
        }
        let mut changed = false;

        section_frame().show(ui, |ui| {
            ComboBox::from_label("Cover")
                .selected_text(self.selected.as_str())
                .width(ui.available_width() - 60.0)
                .show_ui(ui, |ui| {
                    for name in &self.cover_names {
                        if ui
                            .selectable_value(&mut self.selected, name.clone(), name.as_str())
                            .clicked()
                        {
                            changed = true;
                        }
                    }
                });

            ui.heading(self.view.position());
            if let Some(at) = self.view.last_feedback() {
                ui.small(format!("updated {}", at.format("%H:%M:%S")));
            }
        });

        if changed {
            self.session.controller().select(&self.selected);
        }
    }

    fn render_commands(&mut self, ui: &mut egui::Ui) {
        let controller = self.session.controller().clone();
        let width = ui.available_width();
        let size = Vec2::new(width, 48.0);

        for command in [
            MoveCommand::OpenFurther,
            MoveCommand::Stop,
            MoveCommand::CloseFurther,
        ] {
            if ui
                .add(Button::new(command.to_string()).min_size(size))
                .clicked()
            {
                controller.move_cover(command);
            }
        }

        ui.add_space(8.0);
        ui.add(
            TextEdit::singleline(&mut self.raw_command)
                .hint_text("raw command")
                .desired_width(width),
        );
        if ui.add(Button::new("Send").min_size(size)).clicked() {
            controller.send_raw(&self.raw_command);
        }
    }

    fn render_error(&mut self, ctx: &egui::Context) {
        while let Ok(message) = self.dialog.try_recv() {
            self.error_message = Some(message);
        }

        let Some(message) = self.error_message.clone() else {
            return;
        };
        let response = Modal::new(Id::new("error_dialog")).show(ctx, |ui| {
            ui.heading("Error");
            ui.label(message);
            ui.button("OK").clicked()
        });
        if response.inner || response.should_close() {
            self.error_message = None;
        }
    }
}

impl eframe::App for ShutterSetupUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(Duration::from_millis(100));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical(|ui| {
                self.render_status(ui);
                ui.add_space(8.0);
                self.render_cover(ui);
                ui.add_space(8.0);
                self.render_commands(ui);
            });
        });

        self.render_error(ctx);
    }
}
