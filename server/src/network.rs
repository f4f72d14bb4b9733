//! Server task: accepts connections and serialises every state change

use crate::client_manager::{ClientManager, SessionHandle};
use crate::config::ServerConfig;
use crate::console::{ConsoleCommand, HELP};
use crate::game::GameState;
use crate::session::{dispatch, Session};
use crate::ticker::ScoreTicker;
use log::{debug, error, info, warn};
use shared::{ClientPacket, PlayerId};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the channel feeding the server task
const SERVER_QUEUE: usize = 1024;

/// Everything the server task reacts to
#[derive(Debug)]
pub enum ServerMessage {
    Accepted {
        stream: TcpStream,
        addr: SocketAddr,
    },
    PacketReceived {
        player_id: PlayerId,
        connection_id: u64,
        packet: ClientPacket,
    },
    Disconnected {
        player_id: PlayerId,
        connection_id: u64,
        reason: String,
    },
    Tick,
    Command(ConsoleCommand),
    Shutdown,
}

/// Cloneable way to poke a running server from outside its task
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::Sender<ServerMessage>,
}

impl ServerHandle {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { tx }
    }

    /// Runs one score tick now. Returns false if the server has stopped.
    pub async fn tick(&self) -> bool {
        self.tx.send(ServerMessage::Tick).await.is_ok()
    }

    pub async fn command(&self, command: ConsoleCommand) -> bool {
        self.tx.send(ServerMessage::Command(command)).await.is_ok()
    }

    pub async fn shutdown(&self) -> bool {
        self.tx.send(ServerMessage::Shutdown).await.is_ok()
    }
}

/// Listener, slot table, and authority, driven by one message loop
pub struct Server {
    config: ServerConfig,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    game_state: GameState,
    next_connection_id: u64,
    ticker: Option<ScoreTicker>,

    server_tx: mpsc::Sender<ServerMessage>,
    server_rx: mpsc::Receiver<ServerMessage>,
}

impl Server {
    /// Binds the listener. Failing to bind is the only fatal server error.
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::channel(SERVER_QUEUE);

        Ok(Server {
            clients: ClientManager::new(config.max_players),
            game_state: GameState::new(config.rules.clone()),
            listener: Some(listener),
            local_addr,
            next_connection_id: 0,
            ticker: None,
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(self.server_tx.clone())
    }

    /// Spawns the task that accepts sockets and hands them to the server task
    fn spawn_acceptor(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();

        Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        if server_tx
                            .send(ServerMessage::Accepted { stream, addr })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }))
    }

    /// Binds a fresh socket to a slot, or drops it when the server is full
    fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        for player_id in self.clients.stale_slots() {
            self.disconnect(player_id, None, "session already closed");
        }

        if self.clients.free_slot().is_none() {
            warn!(
                "Server full ({} players), rejecting connection from {}",
                self.clients.capacity(),
                addr
            );
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_queue.max(1));
        let handle = SessionHandle::new(connection_id, addr, outbound_tx);
        let Some(player_id) = self.clients.add_client(handle) else {
            return;
        };

        Session::new(
            player_id,
            connection_id,
            addr,
            stream,
            outbound_rx,
            self.server_tx.clone(),
        )
        .with_idle_timeout(self.config.idle_timeout())
        .spawn();

        info!(
            "Player {} connected from {} ({} / {} players)",
            player_id,
            addr,
            self.clients.len(),
            self.clients.capacity()
        );
        self.clients.announce_join(player_id);
    }

    /// Frees a slot and cleans up after the player who held it
    ///
    /// With a connection id, notices from sessions that no longer own the
    /// slot are ignored.
    fn disconnect(&mut self, player_id: PlayerId, connection_id: Option<u64>, reason: &str) {
        let Some(session) = self.clients.remove_client(player_id, connection_id) else {
            debug!(
                "Ignoring stale disconnect for player {} ({})",
                player_id, reason
            );
            return;
        };

        info!(
            "Player {} ({}) disconnected: {}. {} players remaining",
            player_id,
            session.addr,
            reason,
            self.clients.len()
        );

        // Dropping the handle closes the outbound queue, which closes the socket.
        drop(session);

        self.clients.announce_leave(player_id);
        self.game_state.player_left(player_id, &mut self.clients);
    }

    fn tick(&mut self) {
        if let Some(winner) = self.game_state.score_tick(&mut self.clients) {
            info!(
                "Player {} won match {}",
                winner,
                self.game_state.wins()
            );
        }
    }

    /// Returns false when the command asks the server to stop.
    fn handle_command(&mut self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Scores => println!("{}", self.game_state.score_table()),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Unknown(word) => println!("Unknown command '{}'", word),
            ConsoleCommand::Quit => {
                if let Some(ticker) = self.ticker.take() {
                    ticker.stop();
                }
                info!("Quit requested");
                return false;
            }
        }
        true
    }

    /// Returns false when the server should stop.
    fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Accepted { stream, addr } => self.admit(stream, addr),

            ServerMessage::PacketReceived {
                player_id,
                connection_id,
                packet,
            } => {
                let current = self
                    .clients
                    .get(player_id)
                    .is_some_and(|session| session.connection_id == connection_id);
                if current {
                    dispatch(player_id, packet, &mut self.game_state, &mut self.clients);
                } else {
                    debug!(
                        "Dropping {:?} from old connection {} of player {}",
                        packet.packet_type(),
                        connection_id,
                        player_id
                    );
                }
            }

            ServerMessage::Disconnected {
                player_id,
                connection_id,
                reason,
            } => self.disconnect(player_id, Some(connection_id), &reason),

            ServerMessage::Tick => self.tick(),

            ServerMessage::Command(command) => return self.handle_command(command),

            ServerMessage::Shutdown => {
                info!("Server shutting down");
                return false;
            }
        }
        true
    }

    /// Main server loop
    ///
    /// Starts the acceptor and the score ticker, then handles messages until
    /// `quit` or shutdown. All sessions are released on the way out.
    pub async fn run(mut self) {
        let acceptor = self.spawn_acceptor();
        let ticker = ScoreTicker::spawn(self.config.tick_interval(), self.server_tx.clone());

        info!(
            "Server started: {} slots, score tick every {:?}",
            self.clients.capacity(),
            ticker.period()
        );
        self.ticker = Some(ticker);

        while let Some(message) = self.server_rx.recv().await {
            if !self.handle_message(message) {
                break;
            }
        }

        if let Some(acceptor) = acceptor {
            acceptor.abort();
        }
        self.ticker = None;

        for player_id in self.clients.connected_ids() {
            self.clients.remove_client(player_id, None);
        }
        info!("Server stopped");
    }
}
