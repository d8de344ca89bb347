use crossbeam_channel::{Receiver, Sender, TryRecvError};
use hashbrown::HashMap;
use pregen_backend::{ProgressSink, Recipient, StatusMessage};

/// Engine-side end of the status channel. Sending never blocks the tick.
pub struct ChannelSink {
    tx: Sender<StatusMessage>,
}

impl ChannelSink {
    pub fn new(tx: Sender<StatusMessage>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn report(&mut self, message: &str, recipient: Recipient, log_centrally: bool) {
        let msg = StatusMessage {
            text: message.to_string(),
            recipient,
            log_centrally,
        };
        if self.tx.send(msg).is_err() {
            log::debug!(target: "pregen::status", "router gone, dropped: {}", message);
        }
    }
}

/// Host-side end: fans messages out to the console and subscribed actors.
pub struct StatusRouter {
    rx: Receiver<StatusMessage>,
    echo: bool,
    console: Vec<String>,
    inboxes: HashMap<u64, Vec<String>>,
}

impl StatusRouter {
    pub fn new(rx: Receiver<StatusMessage>, echo: bool) -> Self {
        Self {
            rx,
            echo,
            console: Vec::new(),
            inboxes: HashMap::new(),
        }
    }

    pub fn subscribe(&mut self, actor: u64) {
        self.inboxes.entry(actor).or_default();
    }

    /// Routes everything queued so far. Returns the number of messages handled.
    pub fn pump(&mut self) -> usize {
        let mut n = 0;
        loop {
            match self.rx.try_recv() {
                Ok(msg) => {
                    self.route(msg);
                    n += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        n
    }

    pub fn console(&self) -> &[String] {
        &self.console
    }

    pub fn inbox(&self, actor: u64) -> &[String] {
        self.inboxes.get(&actor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn subscribers(&self) -> usize {
        self.inboxes.len()
    }

    fn route(&mut self, msg: StatusMessage) {
        if msg.log_centrally {
            log::info!(target: "pregen::status", "{}", msg.text);
        }
        match msg.recipient {
            Recipient::Broadcast => {
                for inbox in self.inboxes.values_mut() {
                    inbox.push(msg.text.clone());
                }
                self.to_console(msg.text);
            }
            Recipient::Console => self.to_console(msg.text),
            Recipient::Actor(id) => match self.inboxes.get_mut(&id) {
                Some(inbox) => inbox.push(msg.text),
                None => {
                    log::debug!(target: "pregen::status", "actor {} offline, dropped: {}", id, msg.text)
                }
            },
        }
    }

    fn to_console(&mut self, text: String) {
        if self.echo {
            println!("{}", text);
        }
        self.console.push(text);
    }
}
