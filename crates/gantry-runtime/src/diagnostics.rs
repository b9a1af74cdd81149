//! Guest diagnostics bridges
//!
//! The guest reports panics and debug logs by streaming text fragments
//! across the boundary; the bridges assemble them into whole events.

use tracing::info;

use crate::types::RuntimeError;

/// Convert a guest-supplied code point to a character.
///
/// Both single-character paths (panic and debug) share this convention:
/// the argument is a numeric Unicode code point, and invalid values decode
/// to U+FFFD like any other malformed diagnostic text.
pub(crate) fn decode_codepoint(codepoint: u32) -> char {
    char::from_u32(codepoint).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Accumulator for a guest panic in flight.
///
/// Fragments arrive in any order and multiplicity before the terminal
/// [`raise`](Self::raise). The accumulator is not reset by a raise: a run
/// that observed a panic discards its whole state rather than reusing the
/// bridge, so stale fragments can never leak into a later event.
#[derive(Debug, Default)]
pub struct PanicBridge {
    message: String,
    file: Option<String>,
    line: u32,
    column: u32,
}

impl PanicBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one character to the message.
    pub fn push_char(&mut self, codepoint: u32) {
        self.message.push(decode_codepoint(codepoint));
    }

    /// Append a text fragment to the message.
    pub fn push_str(&mut self, text: &str) {
        self.message.push_str(text);
    }

    /// Set the source file name, overwriting any prior value.
    pub fn set_file(&mut self, file: &str) {
        self.file = Some(file.to_string());
    }

    /// Set the source position, overwriting any prior value.
    pub fn set_location(&mut self, line: u32, column: u32) {
        self.line = line;
        self.column = column;
    }

    /// Assemble the accumulated fragments into the structured panic fault.
    pub fn raise(&self) -> RuntimeError {
        let file = self.file.clone().unwrap_or_else(|| "?".to_string());
        let message = if self.message.is_empty() {
            format!("<no message, {}:{}:{}>", file, self.line, self.column)
        } else {
            self.message.clone()
        };
        RuntimeError::GuestPanic {
            message,
            file,
            line: self.line,
            column: self.column,
        }
    }
}

/// Accumulator for guest debug output.
///
/// Fragments concatenate in call order until an explicit flush; there is no
/// implicit flush, and fragments still buffered when the run ends are lost.
#[derive(Debug, Default)]
pub struct DebugBridge {
    fragments: Vec<String>,
}

impl DebugBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one character.
    pub fn push_char(&mut self, codepoint: u32) {
        self.fragments.push(decode_codepoint(codepoint).to_string());
    }

    /// Append a text fragment.
    pub fn push_str(&mut self, text: &str) {
        self.fragments.push(text.to_string());
    }

    /// Join everything buffered since the previous flush into one line,
    /// clear the buffer, and emit the line to the log sink.
    pub fn flush(&mut self) -> String {
        let line = self.fragments.concat();
        self.fragments.clear();
        info!(target: "guest", "{line}");
        line
    }
}
