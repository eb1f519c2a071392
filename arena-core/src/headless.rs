//! Headless PvP client.
//!
//! Drives a [`PvpMatch`] over a [`Session`] without a UI. A dedicated reader
//! task turns incoming lines into [`MatchEvent`]s on a channel; everything
//! that mutates the match happens on the caller's task. This is what the
//! `arena` binary runs, and what the integration tests use to play matches.
//!
//! # Example
//!
//! ```ignore
//! use arena_core::config::NetConfig;
//! use arena_core::headless::{connect_with_fallback, MatchClient};
//! use arena_core::pvp::{MatchPhase, PvpConfig, PvpMatch};
//!
//! let session = connect_with_fallback(&NetConfig::from_env()?).await?;
//! let mut client = MatchClient::new(session, PvpMatch::new(PvpConfig::default())?);
//!
//! client.wait_for(|phase| *phase == MatchPhase::MyTurn).await;
//! client.attack().await?;
//! for line in client.drain_messages() {
//!     println!("{line}");
//! }
//! ```

use crate::config::NetConfig;
use crate::dice::{Dice, RngDice};
use crate::pvp::{ActionPolicy, MatchAction, MatchError, MatchEvent, MatchPhase, PvpMatch, TrustReported};
use crate::session::{LineReader, LineWriter, Session, SessionError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Depth of the incoming event queue.
const EVENT_QUEUE: usize = 64;

/// Dial the primary host, then the fallback host once.
pub async fn connect_with_fallback(config: &NetConfig) -> Result<Session, SessionError> {
    let mut last_error = SessionError::NoHosts;
    for target in config.pvp_targets() {
        match Session::connect(target.as_str()).await {
            Ok(session) => {
                tracing::info!(%target, "connected to relay");
                return Ok(session);
            }
            Err(e) => {
                tracing::warn!(%target, error = %e, "could not reach relay");
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// A match bound to a live session.
pub struct MatchClient<D = RngDice, P = TrustReported> {
    game: PvpMatch<D, P>,
    writer: LineWriter,
    events: mpsc::Receiver<MatchEvent>,
    reader: JoinHandle<()>,
    messages: Vec<String>,
}

impl<D: Dice, P: ActionPolicy> MatchClient<D, P> {
    pub fn new(session: Session, game: PvpMatch<D, P>) -> Self {
        let (reader, writer) = session.split();
        let (tx, events) = mpsc::channel(EVENT_QUEUE);
        let reader = tokio::spawn(read_events(reader, tx));
        Self {
            game,
            writer,
            events,
            reader,
            messages: Vec::new(),
        }
    }

    pub fn game(&self) -> &PvpMatch<D, P> {
        &self.game
    }

    pub fn phase(&self) -> &MatchPhase {
        self.game.phase()
    }

    /// Player-facing messages produced since the last drain.
    pub fn drain_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    /// Next network event, or `None` once the reader has finished.
    pub async fn recv(&mut self) -> Option<MatchEvent> {
        self.events.recv().await
    }

    /// Feed an event to the match and carry out its actions.
    pub async fn apply(&mut self, event: MatchEvent) {
        let actions = self.game.handle(event);
        self.execute(actions).await;
    }

    /// Receive and apply one event. False once the reader has finished.
    pub async fn next_event(&mut self) -> bool {
        match self.recv().await {
            Some(event) => {
                self.apply(event).await;
                true
            }
            None => false,
        }
    }

    /// Process events until `done` holds for the phase or input runs out.
    pub async fn wait_for(&mut self, done: impl Fn(&MatchPhase) -> bool) -> bool {
        while !done(self.game.phase()) {
            if !self.next_event().await {
                return done(self.game.phase());
            }
        }
        true
    }

    pub async fn attack(&mut self) -> Result<(), MatchError> {
        let actions = self.game.attack()?;
        self.execute(actions).await;
        Ok(())
    }

    pub async fn use_item(&mut self, index: usize) -> Result<(), MatchError> {
        let actions = self.game.use_item(index)?;
        self.execute(actions).await;
        Ok(())
    }

    pub async fn equip(&mut self, index: usize) -> Result<(), MatchError> {
        let actions = self.game.equip(index)?;
        self.execute(actions).await;
        Ok(())
    }

    pub async fn surrender(&mut self) -> Result<(), MatchError> {
        let actions = self.game.surrender()?;
        self.execute(actions).await;
        Ok(())
    }

    pub async fn chat(&mut self, text: &str) -> Result<(), MatchError> {
        let actions = self.game.chat(text)?;
        self.execute(actions).await;
        Ok(())
    }

    /// Close the connection now.
    pub async fn close(&mut self) {
        if let Err(e) = self.writer.close().await {
            tracing::debug!(error = %e, "error closing session");
        }
    }

    async fn execute(&mut self, actions: Vec<MatchAction>) {
        for action in actions {
            match action {
                MatchAction::Send(line) => {
                    if let Err(e) = self.writer.write_line(&line).await {
                        tracing::warn!(error = %e, %line, "send failed");
                        // a failed write is a disconnect; its follow-up is only a notice
                        for follow_up in self.game.handle(MatchEvent::Disconnected(e.to_string())) {
                            if let MatchAction::Notify(text) = follow_up {
                                self.messages.push(text);
                            }
                        }
                        return;
                    }
                }
                MatchAction::Notify(text) => {
                    tracing::debug!(%text, "notify");
                    self.messages.push(text);
                }
                MatchAction::Close { after } => {
                    let writer = self.writer.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        if let Err(e) = writer.close().await {
                            tracing::debug!(error = %e, "error closing session");
                        }
                    });
                }
            }
        }
    }
}

impl<D, P> Drop for MatchClient<D, P> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_events(mut reader: LineReader, tx: mpsc::Sender<MatchEvent>) {
    loop {
        let event = match reader.next_line().await {
            Ok(Some(line)) => MatchEvent::Line(line),
            Ok(None) => {
                let _ = tx
                    .send(MatchEvent::Disconnected("connection closed by peer".to_string()))
                    .await;
                return;
            }
            Err(e) => {
                let _ = tx.send(MatchEvent::Disconnected(e.to_string())).await;
                return;
            }
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
}
