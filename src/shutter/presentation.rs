//! Display state observed by the front-end.
//!
//! The core only writes; the front-end holds a [`PresentationView`] and reads
//! the latest values every frame. All values live in `tokio::sync::watch`
//! channels, so writes never block and never fail for lack of readers.

use chrono::{DateTime, Local};
use tokio::sync::watch;

pub struct Presentation {
    devices: watch::Sender<Vec<String>>,
    revision: watch::Sender<u64>,
    status: watch::Sender<String>,
    position: watch::Sender<String>,
    last_feedback: watch::Sender<Option<DateTime<Local>>>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            devices: watch::Sender::new(Vec::new()),
            revision: watch::Sender::new(0),
            status: watch::Sender::new("Disconnected".to_string()),
            position: watch::Sender::new(String::new()),
            last_feedback: watch::Sender::new(None),
        }
    }
}

impl Presentation {
    /// Appends a selectable device name. The list only grows.
    pub fn append_device(&self, name: &str) {
        self.devices.send_modify(|names| names.push(name.to_string()));
    }

    /// Asks the front-end to redraw the device list.
    pub fn request_refresh(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.status.send_replace(status.into());
    }

    pub fn set_position(&self, position: String) {
        self.position.send_replace(position);
        self.last_feedback.send_replace(Some(Local::now()));
    }

    pub fn clear_position(&self) {
        self.position.send_replace(String::new());
        self.last_feedback.send_replace(None);
    }

    pub fn view(&self) -> PresentationView {
        PresentationView {
            devices: self.devices.subscribe(),
            revision: self.revision.subscribe(),
            status: self.status.subscribe(),
            position: self.position.subscribe(),
            last_feedback: self.last_feedback.subscribe(),
        }
    }
}

#[derive(Clone)]
pub struct PresentationView {
    devices: watch::Receiver<Vec<String>>,
    revision: watch::Receiver<u64>,
    status: watch::Receiver<String>,
    position: watch::Receiver<String>,
    last_feedback: watch::Receiver<Option<DateTime<Local>>>,
}

impl PresentationView {
    pub fn device_names(&self) -> Vec<String> {
        self.devices.borrow().clone()
    }

    /// Returns the device list if a refresh was requested since the last call.
    pub fn changed_device_names(&mut self) -> Option<Vec<String>> {
        if !self.revision.has_changed().unwrap_or(false) {
            return None;
        }
        self.revision.mark_unchanged();
        Some(self.device_names())
    }

    #[cfg(test)]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn position(&self) -> String {
        self.position.borrow().clone()
    }

    pub fn last_feedback(&self) -> Option<DateTime<Local>> {
        *self.last_feedback.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_observes_latest_values() {
        let presentation = Presentation::default();
        let view = presentation.view();
        assert_eq!(view.status(), "Disconnected");

        presentation.append_device("Kitchen");
        presentation.append_device("Bedroom");
        presentation.request_refresh();
        presentation.set_status("Connected");
        presentation.set_position("42 / 100".to_string());

        assert_eq!(view.device_names(), vec!["Kitchen", "Bedroom"]);
        assert_eq!(view.revision(), 1);
        assert_eq!(view.status(), "Connected");
        assert_eq!(view.position(), "42 / 100");
        assert!(view.last_feedback().is_some());

        presentation.clear_position();
        assert_eq!(view.position(), "");
        assert!(view.last_feedback().is_none());
    }

    #[test]
    fn device_list_is_handed_out_once_per_refresh() {
        let presentation = Presentation::default();
        let mut view = presentation.view();
        assert_eq!(view.changed_device_names(), None);

        presentation.append_device("Kitchen");
        assert_eq!(view.changed_device_names(), None);

        presentation.request_refresh();
        assert_eq!(view.changed_device_names(), Some(vec!["Kitchen".to_string()]));
        assert_eq!(view.changed_device_names(), None);

        presentation.request_refresh();
        presentation.request_refresh();
        assert_eq!(view.changed_device_names(), Some(vec!["Kitchen".to_string()]));
        assert_eq!(view.changed_device_names(), None);
    }
}
