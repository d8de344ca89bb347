use serde::{Deserialize, Serialize};

/// Who a status message is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// Every subscribed observer plus the console.
    Broadcast,
    Console,
    Actor(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub recipient: Recipient,
    pub log_centrally: bool,
}

/// Receives human-readable progress events. Implementations must not block.
pub trait ProgressSink {
    fn report(&mut self, message: &str, recipient: Recipient, log_centrally: bool);

    fn broadcast(&mut self, message: &str) {
        self.report(message, Recipient::Broadcast, true);
    }
}

/// Collects every message in order.
#[derive(Default, Debug)]
pub struct MemorySink {
    pub messages: Vec<StatusMessage>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|m| m.text.as_str())
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.texts().filter(|t| t.contains(needle)).count()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl ProgressSink for MemorySink {
    fn report(&mut self, message: &str, recipient: Recipient, log_centrally: bool) {
        self.messages.push(StatusMessage {
            text: message.to_string(),
            recipient,
            log_centrally,
        });
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn report(&mut self, message: &str, recipient: Recipient, log_centrally: bool) {
        (**self).report(message, recipient, log_centrally);
    }
}
