//! Speech output capability.
//!
//! Synthesis itself is external; this module only hands text to whatever
//! can speak it. The command sink shells out to a TTS program and never
//! blocks or fails the caller.

use log::{debug, warn};
use std::process::Command;

pub trait SpeechSink: Send + Sync {
    fn speak(&self, text: &str);
}

/// Speaks by spawning an external TTS program (`espeak`, `say`, ...) with
/// the text as its single argument. Fire and forget.
pub struct CommandSpeech {
    program: String,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SpeechSink for CommandSpeech {
    fn speak(&self, text: &str) {
        debug!("Speaking {} chars via '{}'", text.len(), self.program);
        if let Err(e) = Command::new(&self.program).arg(text).spawn() {
            warn!("Failed to spawn speech command '{}': {}", self.program, e);
        }
    }
}

/// Discards all speech. Used in tests and headless runs.
pub struct NullSpeech;

impl SpeechSink for NullSpeech {
    fn speak(&self, _text: &str) {}
}
