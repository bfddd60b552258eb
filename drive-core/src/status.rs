//! Per-device test status and the sticky-error update rule.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest message kept in a [`Status`], in bytes.
pub const MAX_MESSAGE_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Running,
    Done,
    Error,
}

impl State {
    /// Markup tag used when rendering a status of this state.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            State::Done => Some("info"),
            State::Error => Some("error"),
            State::Running => None,
        }
    }
}

/// Progress or outcome of one device's test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Status {
    pub state: State,
    pub message: String,
    #[serde(rename = "serialNumber", default)]
    pub serial_number: String,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(state: State, message: impl Into<String>) -> Self {
        Self {
            state,
            message: truncate_message(message.into()),
            serial_number: String::new(),
        }
    }

    /// Combine a recorded status with a newer update.
    ///
    /// An ERROR can only be replaced by another ERROR. The serial number is never
    /// cleared: an update without one keeps the recorded value.
    pub fn merge(old: &Status, next: &Status) -> Status {
        let serial_number = if next.serial_number.is_empty() {
            old.serial_number.clone()
        } else {
            next.serial_number.clone()
        };

        if old.state == State::Error && next.state != State::Error {
            return Status {
                serial_number,
                ..old.clone()
            };
        }

        Status {
            state: next.state,
            message: next.message.clone(),
            serial_number,
        }
    }

    /// Apply an update through [`Status::merge`]. Returns whether it was accepted.
    pub fn update(&mut self, state: State, message: impl Into<String>) -> bool {
        let next = Status::with(state, message);
        let accepted = !(self.state == State::Error && state != State::Error);
        *self = Status::merge(self, &next);
        accepted
    }

    /// Record the device serial number. `None` or an empty value leaves it untouched.
    pub fn set_serial_number(&mut self, serial: Option<&str>) {
        if let Some(serial) = serial.filter(|s| !s.is_empty()) {
            self.serial_number = serial.to_string();
        }
    }

    pub fn is_error(&self) -> bool {
        self.state == State::Error
    }

    /// Message wrapped in its state tag, e.g. `<info>OK</info>`.
    pub fn tagged(&self) -> String {
        match self.state.tag() {
            Some(tag) => format!("<{tag}>{}</{tag}>", self.message),
            None => self.message.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Status> {
        serde_json::from_str(raw)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn truncate_message(mut message: String) -> String {
    if message.len() <= MAX_MESSAGE_LEN {
        return message;
    }
    let mut end = MAX_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
    message
}
