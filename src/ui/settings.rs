use eframe::egui::{Grid, TextEdit, Ui};

use super::common::section_frame;
use crate::config::BrokerConfig;

/// Editable copy of the broker settings. Changes only leave the panel on "Apply".
pub struct SettingsPanel {
    draft: BrokerConfig,
}

impl SettingsPanel {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            draft: config.clone(),
        }
    }

    /// Renders the form and returns the edited settings when "Apply" was clicked.
    pub fn render(&mut self, ui: &mut Ui) -> Option<BrokerConfig> {
        let mut applied = None;

        section_frame().show(ui, |ui| {
            ui.heading("Settings");

            Grid::new("broker_settings")
                .num_columns(2)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    ui.label("Broker");
                    ui.add(TextEdit::singleline(&mut self.draft.url).hint_text("host:1883"));
                    ui.end_row();

                    ui.label("Client ID");
                    ui.text_edit_singleline(&mut self.draft.client_id);
                    ui.end_row();

                    ui.label("Username");
                    ui.text_edit_singleline(&mut self.draft.user);
                    ui.end_row();

                    ui.label("Password");
                    ui.add(TextEdit::singleline(&mut self.draft.password).password(true));
                    ui.end_row();
                });

            if ui.button("Apply").clicked() {
                applied = Some(self.draft.clone());
            }
        });

        applied
    }
}
