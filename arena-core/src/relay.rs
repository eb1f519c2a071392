//! The relay: pairs PvP clients and forwards their lines untouched.
//!
//! The relay never looks inside ACTION or STATE. After the handshake it is a
//! pair of copy loops, one per direction, each on its own task. When either
//! side goes away both writers are shut down, which ends the match for the
//! survivor as a disconnect.
//!
//! [`ChatRelay`] is a separate listener that fans every received line out to
//! all other connected clients.

use crate::config::NetConfig;
use crate::protocol::{InitState, Message, Side};
use crate::session::{LineReader, LineWriter, Session, SessionError};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Starting HP for both players.
pub const MATCH_HP: i32 = 100;

/// Backlog of chat lines a slow client may fall behind by.
pub const CHAT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Relay listener settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub pvp_addr: String,
    /// Chat is optional; `None` runs PvP only.
    pub chat_addr: Option<String>,
    /// The snapshot every match starts from.
    pub init: InitState,
}

impl RelayConfig {
    pub fn new(pvp_addr: impl Into<String>) -> Self {
        Self {
            pvp_addr: pvp_addr.into(),
            chat_addr: None,
            init: InitState::new_match("Player1", "Player2", MATCH_HP),
        }
    }

    /// Both listeners on the configured bind host.
    pub fn from_net(net: &NetConfig) -> Self {
        Self::new(net.pvp_bind_addr()).with_chat_addr(net.chat_bind_addr())
    }

    pub fn with_chat_addr(mut self, addr: impl Into<String>) -> Self {
        self.chat_addr = Some(addr.into());
        self
    }

    pub fn with_init(mut self, init: InitState) -> Self {
        self.init = init;
        self
    }
}

// ============================================================================
// PvP
// ============================================================================

/// Run one match between two connected sessions.
///
/// Sends `YOU_ARE` and the INIT snapshot to each side, then forwards lines
/// until either side closes. Returns once both writers are shut.
pub async fn pair(first: Session, second: Session, init: &InitState) -> Result<(), SessionError> {
    let (first_reader, first_writer) = first.split();
    let (second_reader, second_writer) = second.split();

    let init_line = Message::Init(init.clone());
    for (writer, side) in [(&first_writer, Side::One), (&second_writer, Side::Two)] {
        writer.send(&Message::YouAre(side)).await?;
        writer.send(&init_line).await?;
    }

    let mut up = tokio::spawn(forward(first_reader, second_writer.clone(), Side::One));
    let mut down = tokio::spawn(forward(second_reader, first_writer.clone(), Side::Two));

    tokio::select! {
        _ = &mut up => down.abort(),
        _ = &mut down => up.abort(),
    }

    for writer in [first_writer, second_writer] {
        if let Err(e) = writer.close().await {
            tracing::debug!(error = %e, "error closing relay writer");
        }
    }
    tracing::info!("match ended");
    Ok(())
}

/// Copy lines from one side to the other until either path fails.
async fn forward(mut from: LineReader, to: LineWriter, side: Side) {
    loop {
        match from.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(%side, %line, "relaying");
                if let Err(e) = to.write_line(&line).await {
                    tracing::info!(%side, error = %e, "opponent unreachable");
                    return;
                }
            }
            Ok(None) => {
                tracing::info!(%side, "player disconnected");
                return;
            }
            Err(e) => {
                tracing::info!(%side, error = %e, "read failed");
                return;
            }
        }
    }
}

/// The PvP listener plus an optional chat listener.
pub struct RelayServer {
    listener: TcpListener,
    chat: Option<ChatRelay>,
    init: InitState,
}

impl RelayServer {
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = bind(&config.pvp_addr).await?;
        let chat = match &config.chat_addr {
            Some(addr) => Some(ChatRelay::bind(addr).await?),
            None => None,
        };
        Ok(Self {
            listener,
            chat,
            init: config.init,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub fn chat_addr(&self) -> Option<SocketAddr> {
        self.chat.as_ref().and_then(ChatRelay::local_addr)
    }

    /// Accept connections forever, pairing them first come, first served.
    pub async fn run(self) {
        if let Some(chat) = self.chat {
            tokio::spawn(chat.run());
        }
        tracing::info!(addr = ?self.listener.local_addr().ok(), "PvP relay waiting for players");

        loop {
            let (first, first_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            tracing::info!(peer = %first_addr, "player 1 connected");

            let (second, second_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed, dropping waiting player");
                    continue;
                }
            };
            tracing::info!(peer = %second_addr, "player 2 connected, starting match");

            let init = self.init.clone();
            tokio::spawn(async move {
                let result = pair(Session::from_tcp(first), Session::from_tcp(second), &init).await;
                if let Err(e) = result {
                    tracing::warn!(error = %e, "match aborted during handshake");
                }
            });
        }
    }
}

async fn bind(addr: &str) -> Result<TcpListener, RelayError> {
    TcpListener::bind(addr).await.map_err(|source| RelayError::Bind {
        addr: addr.to_string(),
        source,
    })
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone)]
struct ChatLine {
    from: SocketAddr,
    text: String,
}

/// Broadcast chat listener.
pub struct ChatRelay {
    listener: TcpListener,
    tx: broadcast::Sender<ChatLine>,
}

impl ChatRelay {
    pub async fn bind(addr: &str) -> Result<Self, RelayError> {
        let listener = bind(addr).await?;
        let (tx, _) = broadcast::channel(CHAT_BUFFER);
        Ok(Self { listener, tx })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub async fn run(self) {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "chat relay listening");
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::info!(peer = %addr, "chat client connected");
                    let rx = self.tx.subscribe();
                    tokio::spawn(chat_client(stream, addr, self.tx.clone(), rx));
                }
                Err(e) => tracing::warn!(error = %e, "chat accept failed"),
            }
        }
    }
}

async fn chat_client(
    stream: TcpStream,
    addr: SocketAddr,
    tx: broadcast::Sender<ChatLine>,
    mut rx: broadcast::Receiver<ChatLine>,
) {
    let (mut reader, writer) = Session::from_tcp(stream).split();
    loop {
        tokio::select! {
            line = reader.next_line() => match line {
                Ok(Some(text)) => {
                    tracing::info!(peer = %addr, %text, "chat");
                    // no receivers is fine
                    let _ = tx.send(ChatLine {
                        from: addr,
                        text: format!("[{addr}] {text}"),
                    });
                }
                Ok(None) | Err(_) => break,
            },
            received = rx.recv() => match received {
                Ok(line) if line.from == addr => {}
                Ok(line) => {
                    if writer.write_line(&line.text).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(peer = %addr, skipped, "chat client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::info!(peer = %addr, "chat client disconnected");
    let _ = writer.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    async fn next(session: &mut Session) -> Option<String> {
        timeout(WAIT, session.next_line()).await.unwrap().unwrap()
    }

    fn in_memory_match() -> (Session, Session, tokio::task::JoinHandle<Result<(), SessionError>>) {
        let (client_one, relay_one) = tokio::io::duplex(4096);
        let (client_two, relay_two) = tokio::io::duplex(4096);
        let init = InitState::new_match("Player1", "Player2", MATCH_HP);
        let relay = tokio::spawn(async move {
            pair(
                Session::from_stream(relay_one),
                Session::from_stream(relay_two),
                &init,
            )
            .await
        });
        (
            Session::from_stream(client_one),
            Session::from_stream(client_two),
            relay,
        )
    }

    #[tokio::test]
    async fn test_handshake_assigns_sides() {
        let (mut one, mut two, _relay) = in_memory_match();
        let init = "INIT p1name=Player1 p1hp=100 p1max=100 p2name=Player2 p2hp=100 p2max=100 round=1 turn=1";

        assert_eq!(next(&mut one).await.as_deref(), Some("YOU_ARE 1"));
        assert_eq!(next(&mut one).await.as_deref(), Some(init));
        assert_eq!(next(&mut two).await.as_deref(), Some("YOU_ARE 2"));
        assert_eq!(next(&mut two).await.as_deref(), Some(init));
    }

    #[tokio::test]
    async fn test_lines_forwarded_verbatim() {
        let (mut one, mut two, _relay) = in_memory_match();
        for _ in 0..2 {
            next(&mut one).await;
            next(&mut two).await;
        }

        one.write_line("ACTION attack head|torso|12").await.unwrap();
        one.write_line("").await.unwrap();
        one.write_line("SOMETHING the relay does not know").await.unwrap();
        two.write_line("CHAT hi").await.unwrap();

        assert_eq!(
            next(&mut two).await.as_deref(),
            Some("ACTION attack head|torso|12")
        );
        assert_eq!(
            next(&mut two).await.as_deref(),
            Some("SOMETHING the relay does not know")
        );
        assert_eq!(next(&mut one).await.as_deref(), Some("CHAT hi"));
    }

    #[tokio::test]
    async fn test_one_side_closing_ends_the_match() {
        let (mut one, mut two, relay) = in_memory_match();
        for _ in 0..2 {
            next(&mut one).await;
            next(&mut two).await;
        }

        one.write_line("END winner=2").await.unwrap();
        one.close().await.unwrap();

        assert_eq!(next(&mut two).await.as_deref(), Some("END winner=2"));
        assert_eq!(next(&mut two).await, None);
        timeout(WAIT, relay).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_chat_broadcasts_without_echo() {
        let chat = ChatRelay::bind("127.0.0.1:0").await.unwrap();
        let addr = chat.local_addr().unwrap();
        tokio::spawn(chat.run());

        let mut alice = Session::connect(addr).await.unwrap();
        let mut bob = Session::connect(addr).await.unwrap();
        // let the listener register both clients
        tokio::time::sleep(Duration::from_millis(100)).await;

        alice.write_line("hello").await.unwrap();
        let line = next(&mut bob).await.unwrap();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] hello"));

        bob.write_line("hey").await.unwrap();
        let line = next(&mut alice).await.unwrap();
        assert!(line.ends_with("] hey"));
    }
}
