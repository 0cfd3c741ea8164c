//! Ordered accumulator for accepted sign labels.
//!
//! Labels are appended in the order their predictions were accepted and the
//! whole transcript lives only in memory for the lifetime of the session
//! page; there is no persistence and no deduplication.

use crate::speech::SpeechSink;
use log::debug;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Mutex<Vec<String>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an accepted label to the end. No dedup, no cap.
    pub fn append(&self, label: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(label.to_string());
        debug!("Transcript now holds {} entries", entries.len());
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        debug!("Transcript cleared");
    }

    /// The accepted labels joined with single spaces, in acceptance order.
    pub fn to_text(&self) -> String {
        self.entries.lock().unwrap().join(" ")
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Hand the current text to a speech sink. Empty transcripts are not
    /// spoken.
    pub fn speak(&self, sink: &dyn SpeechSink) {
        let text = self.to_text();
        if !text.is_empty() {
            sink.speak(&text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        spoken: StdMutex<Vec<String>>,
    }

    impl SpeechSink for RecordingSink {
        fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let transcript = Transcript::new();
        transcript.append("Hello");
        transcript.append("Thanks");
        assert_eq!(transcript.to_text(), "Hello Thanks");
        assert_eq!(transcript.entries(), vec!["Hello", "Thanks"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let transcript = Transcript::new();
        transcript.append("Hello");
        transcript.append("Hello");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.to_text(), "Hello Hello");
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let transcript = Transcript::new();
        transcript.append("Hello");
        transcript.append("Thanks");
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.to_text(), "");
    }

    #[test]
    fn test_empty_transcript_is_not_spoken() {
        let transcript = Transcript::new();
        let sink = RecordingSink {
            spoken: StdMutex::new(Vec::new()),
        };
        transcript.speak(&sink);
        assert!(sink.spoken.lock().unwrap().is_empty());

        transcript.append("Hello");
        transcript.speak(&sink);
        assert_eq!(*sink.spoken.lock().unwrap(), vec!["Hello"]);
    }
}
