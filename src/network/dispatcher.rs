//! Connection Dispatcher
//!
//! One dispatcher per client connection. It decodes inbound frames,
//! resolves the target table from the out-of-band table number, drives
//! the game controller for move envelopes, and runs the fixed sequences
//! for the reserved control tags (resync, game-over claims).
//!
//! Ordering discipline: a table's mutation and the broadcast it triggers
//! happen under the same table write lock, and a joiner's registration
//! plus its snapshot are enqueued under that lock too. Together with each
//! connection's FIFO outbound queue this guarantees a resyncing client
//! never sees a move that is already inside its snapshot, and never
//! misses one that is not.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::game::GameError;
use crate::games::GameKind;
use crate::protocol::{
    control, ClientFrame, Envelope, ErrorCode, GameOverClaim, ServerFrame, WireMessage,
};
use crate::table::{Table, TableDirectory, TableId, TablePhase};

/// Map a game error to the wire code the offending client receives.
fn error_code(error: &GameError) -> ErrorCode {
    match error {
        GameError::UnknownMessageType(_) => ErrorCode::UnknownMessageType,
        GameError::IllegalMove(_) | GameError::ModelMismatch => ErrorCode::IllegalMove,
        GameError::TableClosed => ErrorCode::TableClosed,
        GameError::GameNotStarted => ErrorCode::GameNotStarted,
        GameError::NotSeated => ErrorCode::NotSeated,
        GameError::TableFull => ErrorCode::TableFull,
        GameError::AdjudicationMismatch { .. } => ErrorCode::AdjudicationRejected,
        GameError::Protocol(_) | GameError::Snapshot(_) => ErrorCode::MalformedFrame,
        GameError::BadConfig(_) => ErrorCode::Internal,
    }
}

/// Per-connection dispatch state.
pub struct Dispatcher {
    directory: Arc<TableDirectory>,
    sender: mpsc::Sender<ServerFrame>,
    username: Option<String>,
    joined: BTreeSet<TableId>,
}

impl Dispatcher {
    /// Create a dispatcher for one connection's outbound queue.
    pub fn new(directory: Arc<TableDirectory>, sender: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            directory,
            sender,
            username: None,
            joined: BTreeSet::new(),
        }
    }

    /// Username this connection is bound to, once known.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Handle one decoded inbound frame.
    pub async fn handle_frame(&mut self, frame: ClientFrame) {
        match frame {
            ClientFrame::CreateTable {
                kind,
                config,
                username,
            } => self.handle_create_table(kind, config, username).await,
            ClientFrame::Join {
                table,
                username,
                observer,
            } => self.handle_join(table, username, observer).await,
            ClientFrame::Game { table, envelope } => self.handle_game(table, envelope).await,
            ClientFrame::Leave { table } => self.handle_leave(table).await,
            ClientFrame::Ping { timestamp } => {
                self.send(ServerFrame::Pong { timestamp });
            }
        }
    }

    /// The connection is gone: vacate its seat bindings and tell the
    /// remaining members. The game models are never touched.
    pub async fn connection_closed(&mut self) {
        let joined: Vec<TableId> = self.joined.iter().copied().collect();
        for number in joined {
            self.handle_leave(number).await;
        }
    }

    async fn handle_create_table(
        &mut self,
        kind: GameKind,
        config: BTreeMap<String, String>,
        username: String,
    ) {
        let username = match self.bind_username(username) {
            Some(u) => u,
            None => return,
        };

        let (number, table) = self.directory.create_table(kind, config.into()).await;
        {
            let mut guard = table.write().await;
            guard.attach(&username, self.sender.clone());
            // The creator takes seat 0 on a fresh table; this cannot fail.
            if let Err(e) = guard.take_seat(&username) {
                warn!(table = number, "creator could not sit: {e}");
            }
            self.send(ServerFrame::TableCreated {
                table: number,
                kind,
                seats: guard.seat_count(),
            });
            let seat = guard.seat_of(&username);
            guard.broadcast(
                ServerFrame::Joined {
                    table: number,
                    username: username.clone(),
                    seat,
                },
                None,
            );
        }
        self.joined.insert(number);
        info!(table = number, ?kind, username, "table created");
    }

    async fn handle_join(&mut self, number: TableId, username: String, observer: bool) {
        let username = match self.bind_username(username) {
            Some(u) => u,
            None => return,
        };
        let Some(table) = self.directory.get(number).await else {
            self.send_error(ErrorCode::UnknownTable, format!("no table {number}"));
            return;
        };

        // Everything below happens under one write lock: attaching the
        // member, seating, starting the game when the last seat fills,
        // and the mid-game snapshot. No move broadcast can interleave.
        let mut guard = table.write().await;

        let seat = if observer {
            None
        } else {
            match guard.take_seat(&username) {
                Ok(seat) => Some(seat),
                Err(e) => {
                    self.send_error(error_code(&e), e.to_string());
                    return;
                }
            }
        };

        guard.attach(&username, self.sender.clone());
        self.joined.insert(number);
        guard.broadcast(
            ServerFrame::Joined {
                table: number,
                username: username.clone(),
                seat,
            },
            None,
        );
        info!(table = number, username, ?seat, "joined");

        if guard.phase() == TablePhase::Waiting && guard.seats_filled() {
            match guard.start() {
                Ok(()) => {
                    info!(table = number, kind = ?guard.kind(), "game started");
                    let kind = guard.kind();
                    guard.broadcast(
                        ServerFrame::GameStarted {
                            table: number,
                            kind,
                        },
                        None,
                    );
                }
                Err(e) => {
                    // The table cannot produce a game; escalate to
                    // table-level failure so nobody waits forever.
                    guard.fail(&e.to_string());
                    return;
                }
            }
        } else if guard.phase() == TablePhase::Playing {
            // Late joiner or reconnect: the resync sequence. The snapshot
            // is enqueued before the lock drops, so every subsequent
            // broadcast this client sees postdates it. If the snapshot
            // cannot be enqueued, unicast detaches the member: it must
            // never receive later moves without the snapshot under them.
            match guard.snapshot() {
                Ok(document) => guard.unicast(
                    &username,
                    ServerFrame::Snapshot {
                        table: number,
                        document,
                    },
                ),
                Err(e) => self.send_error(error_code(&e), e.to_string()),
            }
        }
    }

    async fn handle_game(&mut self, number: TableId, envelope: Envelope) {
        let Some(username) = self.username.clone() else {
            self.send_error(
                ErrorCode::NotSeated,
                "join a table before sending game messages".to_string(),
            );
            return;
        };
        let Some(table) = self.directory.get(number).await else {
            self.send_error(ErrorCode::UnknownTable, format!("no table {number}"));
            return;
        };

        match envelope.tag() {
            control::RESYNC => self.run_resync(number, &table, &username).await,
            control::GAME_OVER => self.run_game_over(number, &table, &username, &envelope).await,
            _ => self.run_move(number, &table, &username, envelope).await,
        }
    }

    /// The common path: apply a move envelope through the game controller
    /// and re-broadcast it on success.
    async fn run_move(
        &mut self,
        number: TableId,
        table: &Arc<RwLock<Table>>,
        username: &str,
        mut envelope: Envelope,
    ) {
        // The server stamps the authenticated sender; a client-supplied
        // sender field is never trusted on the way back out.
        envelope.set_sender(username);

        let mut guard = table.write().await;
        match guard.apply(username, &envelope) {
            Ok(policy) => {
                let exclude = match policy {
                    crate::game::EchoPolicy::Others => Some(username),
                    crate::game::EchoPolicy::All => None,
                };
                // Broadcast only after the mutation has fully committed,
                // still under the lock so resyncing joiners sequence
                // correctly against it.
                guard.broadcast(
                    ServerFrame::Game {
                        table: number,
                        envelope,
                    },
                    exclude,
                );
            }
            Err(e @ GameError::UnknownMessageType(_)) => {
                // One malformed or future client must not kill the table:
                // log, drop, keep the connection.
                warn!(table = number, username, "dropping envelope: {e}");
            }
            Err(e) => {
                debug!(table = number, username, "rejected envelope: {e}");
                self.send_error(error_code(&e), e.to_string());
            }
        }
    }

    /// Fixed sequence for a resync request: point-in-time snapshot,
    /// unicast to the requester only. Under the write lock so no move can
    /// slip between the snapshot and its place in the requester's queue,
    /// and so a failed enqueue detaches the requester.
    async fn run_resync(&mut self, number: TableId, table: &Arc<RwLock<Table>>, username: &str) {
        let mut guard = table.write().await;
        match guard.snapshot() {
            Ok(document) => guard.unicast(
                username,
                ServerFrame::Snapshot {
                    table: number,
                    document,
                },
            ),
            Err(e) => self.send_error(error_code(&e), e.to_string()),
        }
    }

    /// Fixed sequence for a game-over claim: verify against the server's
    /// own check; the computed result is what gets broadcast, never the
    /// claim.
    async fn run_game_over(
        &mut self,
        number: TableId,
        table: &Arc<RwLock<Table>>,
        username: &str,
        envelope: &Envelope,
    ) {
        let claim = match GameOverClaim::decode(envelope) {
            Ok(msg) => msg.claim,
            Err(e) => {
                self.send_error(ErrorCode::MalformedFrame, e.to_string());
                return;
            }
        };

        let mut guard = table.write().await;
        match guard.adjudicate_claim(username, claim) {
            Ok(report) => {
                if let Some((claimed, computed)) = report.mismatch {
                    warn!(
                        table = number,
                        username,
                        ?claimed,
                        ?computed,
                        "claim disagreed with server check; broadcasting computed result"
                    );
                }
                info!(table = number, "game over");
                guard.broadcast(
                    ServerFrame::GameOver {
                        table: number,
                        results: report.results,
                    },
                    None,
                );
            }
            Err(e @ GameError::AdjudicationMismatch { .. }) => {
                // The server's check is not terminal: reject the claim,
                // leave the table open.
                warn!(table = number, username, "rejected game-over claim: {e}");
                self.send_error(ErrorCode::AdjudicationRejected, e.to_string());
            }
            Err(e) => {
                debug!(table = number, username, "game-over claim failed: {e}");
                self.send_error(error_code(&e), e.to_string());
            }
        }
    }

    async fn handle_leave(&mut self, number: TableId) {
        let Some(username) = self.username.clone() else {
            return;
        };
        self.joined.remove(&number);
        if let Some(table) = self.directory.get(number).await {
            let mut guard = table.write().await;
            guard.detach(&username);
            guard.broadcast(
                ServerFrame::MemberLeft {
                    table: number,
                    username: username.clone(),
                },
                None,
            );
            info!(table = number, username, "left");
        }
    }

    /// A connection binds to the first username it presents; later frames
    /// must agree.
    fn bind_username(&mut self, username: String) -> Option<String> {
        match &self.username {
            None => {
                self.username = Some(username.clone());
                Some(username)
            }
            Some(bound) if *bound == username => Some(username),
            Some(bound) => {
                self.send_error(
                    ErrorCode::MalformedFrame,
                    format!("connection is bound to `{bound}`"),
                );
                None
            }
        }
    }

    fn send(&self, frame: ServerFrame) {
        if let Err(e) = self.sender.try_send(frame) {
            warn!("dropping frame for own connection: {e}");
        }
    }

    fn send_error(&self, code: ErrorCode, message: String) {
        self.send(ServerFrame::Error { code, message });
    }
}
