// Application orchestration.
//
// Owns the jury and the outbound side of the transport. Inbound messages
// arrive over an mpsc channel from the poller; each one is parsed, run
// through the state machine, and every resulting message is delivered in
// order before the next inbound message is looked at.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use jukebox_core::machine::shuffle::{KeepOrder, RandomOrder, Shuffler};
use jukebox_core::machine::{Jury, Outgoing, Rules};
use jukebox_core::protocol::{parse_command, ChatId, InboundMessage};

use crate::config::Config;
use crate::pacing::{self, Pacer};
use crate::report;
use crate::telegram::Transport;

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App<T: ?Sized> {
    jury: Jury,
    transport: Arc<T>,
    /// Group chat announcements go to.
    channel: ChatId,
    pacer: Box<dyn Pacer>,
}

impl<T: Transport + ?Sized> App<T> {
    pub fn new(jury: Jury, transport: Arc<T>, channel: ChatId, pacer: Box<dyn Pacer>) -> Self {
        App {
            jury,
            transport,
            channel,
            pacer,
        }
    }

    /// Wire up the jury and strategies the configuration asks for.
    pub fn from_config(config: &Config, transport: Arc<T>) -> Self {
        let rules = Rules {
            rating_scale: config.game.rating_scale,
            ..Rules::default()
        };
        let shuffler: Box<dyn Shuffler + Send> = if config.game.deterministic {
            Box::new(KeepOrder)
        } else {
            Box::new(RandomOrder::from_entropy())
        };
        let jury = Jury::new(rules, shuffler, report::from_config(&config.results));
        let pacer = pacing::from_config(config.game.deterministic, config.game.review_pacing_max_ms);

        Self::new(jury, transport, ChatId(config.telegram.chat_id), pacer)
    }

    pub fn jury(&self) -> &Jury {
        &self.jury
    }

    /// Process one inbound message to completion.
    pub async fn handle_message(&mut self, msg: InboundMessage) {
        let cmd = match parse_command(&msg) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!("Ignoring message from {}: {}", msg.sender_id, e);
                return;
            }
        };
        debug!(
            "Command `{}` from {} ({}) in state {}",
            cmd.keyword,
            cmd.sender_name,
            cmd.sender,
            self.jury.state()
        );

        let reaction = self.jury.handle(&cmd);
        debug!("Visited states: {:?}", reaction.visited);
        self.deliver(reaction.outgoing).await;
    }

    async fn deliver(&mut self, outgoing: Vec<Outgoing>) {
        for out in outgoing {
            let (chat, text) = match out {
                Outgoing::Channel { text, paced } => {
                    if paced {
                        let delay = self.pacer.delay();
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                    (self.channel, text)
                }
                Outgoing::Reply { chat, text } => (chat, text),
            };

            if let Err(e) = self.transport.send_message(chat, &text).await {
                warn!("Failed to send message to chat {}: {}", chat, e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run until the inbound channel closes.
pub async fn run<T>(mut inbound: mpsc::Receiver<InboundMessage>, mut app: App<T>) -> anyhow::Result<()>
where
    T: Transport + ?Sized,
{
    info!("Application event loop started");

    while let Some(msg) = inbound.recv().await {
        app.handle_message(msg).await;
    }

    info!("Inbound channel closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jukebox_core::machine::State;
    use jukebox_core::protocol::ParticipantId;
    use jukebox_core::report::NullReporter;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::telegram::{TelegramError, Update};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(ChatId, String)>>,
        fail_sends: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn get_updates(&self, _offset: i64, _timeout: u64) -> Result<Vec<Update>, TelegramError> {
            Ok(vec![])
        }

        async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TelegramError> {
            self.sent.lock().unwrap().push((chat, text.to_string()));
            if self.fail_sends {
                return Err(TelegramError::Api {
                    description: "Too Many Requests".into(),
                });
            }
            Ok(())
        }
    }

    struct FixedPacing(Duration);

    impl Pacer for FixedPacing {
        fn delay(&mut self) -> Duration {
            self.0
        }
    }

    fn app_with(transport: Arc<RecordingTransport>, pacer: Box<dyn Pacer>) -> App<RecordingTransport> {
        let jury = Jury::new(Rules::default(), Box::new(KeepOrder), Box::new(NullReporter));
        App::new(jury, transport, ChatId(-100), pacer)
    }

    fn inbound(sender: i64, name: &str, text: &str) -> InboundMessage {
        InboundMessage {
            text: text.to_string(),
            sender_id: ParticipantId(sender),
            username: name.to_string(),
            first_name: String::new(),
            chat_id: ChatId(sender),
        }
    }

    #[tokio::test]
    async fn announcements_go_to_the_group_chat() {
        let transport = Arc::new(RecordingTransport::default());
        let mut app = app_with(Arc::clone(&transport), Box::new(pacing::NoPacing));

        app.handle_message(inbound(1, "Santana", "levyraati aloita")).await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![(
                ChatId(-100),
                "User Santana started a new game, join by using command: levyraati liity".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn replies_go_to_the_sender_chat() {
        let transport = Arc::new(RecordingTransport::default());
        let mut app = app_with(Arc::clone(&transport), Box::new(pacing::NoPacing));

        app.handle_message(inbound(1, "Santana", "levyraati aloita")).await;
        app.handle_message(inbound(1, "Santana", "levyraati liity")).await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.last().unwrap().0, ChatId(1));
        assert_eq!(sent.last().unwrap().1, "You are already in the game");
    }

    #[tokio::test]
    async fn chatter_is_ignored() {
        let transport = Arc::new(RecordingTransport::default());
        let mut app = app_with(Arc::clone(&transport), Box::new(pacing::NoPacing));

        app.handle_message(inbound(1, "Santana", "anyone up for music?")).await;
        app.handle_message(inbound(1, "Santana", "levyraati")).await;

        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(app.jury().state(), State::Init);
    }

    #[tokio::test]
    async fn send_failures_do_not_stop_delivery() {
        let transport = Arc::new(RecordingTransport {
            fail_sends: true,
            ..RecordingTransport::default()
        });
        let mut app = app_with(Arc::clone(&transport), Box::new(pacing::NoPacing));

        app.handle_message(inbound(1, "Santana", "levyraati aloita")).await;
        app.handle_message(inbound(2, "Pjotr", "levyraati liity")).await;
        app.handle_message(inbound(2, "Pjotr", "levyraati jatka")).await;

        // Proceed message plus both instruction messages all attempted.
        assert_eq!(transport.sent.lock().unwrap().len(), 5);
        assert_eq!(app.jury().state(), State::AddItem);
    }

    #[tokio::test(start_paused = true)]
    async fn paced_reveals_wait_for_the_pacer() {
        let transport = Arc::new(RecordingTransport::default());
        let mut app = app_with(
            Arc::clone(&transport),
            Box::new(FixedPacing(Duration::from_millis(500))),
        );

        for (sender, name, text) in [
            (1, "Santana", "levyraati aloita"),
            (2, "Pjotr", "levyraati liity"),
            (2, "Pjotr", "levyraati jatka"),
            (1, "Santana", "levyraati esitä Oye como va https://example.com/oye"),
            (2, "Pjotr", "levyraati esitä Kalinka https://example.com/kalinka"),
        ] {
            app.handle_message(inbound(sender, name, text)).await;
        }

        let before = tokio::time::Instant::now();
        app.handle_message(inbound(2, "Pjotr", "levyraati arvio Smooth 8/10")).await;

        // Exactly one paced reveal in this round.
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(500));
        assert!(waited < Duration::from_millis(1000));
        let sent = transport.sent.lock().unwrap();
        assert!(sent
            .iter()
            .any(|(_, text)| text == "Pjotr wrote: Smooth. The song rating was: 8/10"));
    }

    #[tokio::test]
    async fn run_stops_when_inbound_closes() {
        let transport = Arc::new(RecordingTransport::default());
        let app = app_with(Arc::clone(&transport), Box::new(pacing::NoPacing));
        let (tx, rx) = mpsc::channel(4);

        tx.send(inbound(1, "Santana", "levyraati aloita")).await.unwrap();
        drop(tx);

        run(rx, app).await.unwrap();
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }
}
