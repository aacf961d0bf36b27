//! Shared colours and frame styling for the setup window.

use crate::mqtt::connection::ConnectionState;
use eframe::egui::{Color32, Frame, Stroke};

pub struct UiColors;

impl UiColors {
    /// Background of grouped sections (RGB: 30, 30, 30)
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    /// Section border (RGB: 60, 60, 60)
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    pub const PENDING: Color32 = Color32::from_rgb(220, 170, 20);

    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);
}

pub fn state_color(state: ConnectionState) -> Color32 {
    match state {
        ConnectionState::Connected => UiColors::ACTIVE,
        ConnectionState::Connecting => UiColors::PENDING,
        ConnectionState::Disconnected => UiColors::INACTIVE,
    }
}

pub fn section_frame() -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, UiColors::BORDER))
        .fill(UiColors::MAIN_BG)
        .inner_margin(8.0)
        .outer_margin(2.0)
}
