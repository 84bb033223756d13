//! Table State
//!
//! One table: its seats, lifecycle phase, start-time configuration, the
//! single live game model, and the outbound channels of every attached
//! connection. All mutation happens under the directory's per-table write
//! lock, which is what serializes concurrent moves for one game.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::game::{Adjudication, EchoPolicy, GameController, GameError, GameModel};
use crate::games::GameKind;
use crate::protocol::{Envelope, SeatResult, ServerFrame};
use crate::snapshot::Document;
use crate::table::{SeatIndex, TableId};

/// Lifecycle phase of a table.
///
/// WAITING → PLAYING happens exactly once, when the last seat fills and
/// the controller's start operation runs. PLAYING → FINISHED happens on an
/// accepted adjudication (or a table-level failure). FINISHED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePhase {
    /// Seats are still filling; no game model exists yet.
    Waiting,
    /// The game is live and accepting moves.
    Playing,
    /// The game ended; no further mutation is accepted.
    Finished,
}

/// Key→string parameters resolved at start-game time (board size, scoring
/// mode). Read-only to the game controller.
#[derive(Debug, Clone, Default)]
pub struct TableConfig(BTreeMap<String, String>);

impl TableConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw parameter text.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parameter parsed as usize, falling back to a default when absent.
    /// Present-but-unparsable is a configuration error, not a silent
    /// fallback.
    pub fn get_usize_or(&self, key: &str, default: usize) -> Result<usize, GameError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| GameError::BadConfig(format!("`{key}` is not a number: `{raw}`"))),
        }
    }

    /// Set a parameter.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl From<BTreeMap<String, String>> for TableConfig {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// A connection attached to a table (seated player or observer).
#[derive(Debug)]
struct TableMember {
    /// Outbound frame queue for this connection.
    sender: mpsc::Sender<ServerFrame>,
}

/// The result of an accepted game-over adjudication.
#[derive(Debug, Clone)]
pub struct GameOverReport {
    /// Server-computed outcome per seat; this is what gets broadcast.
    pub results: Vec<SeatResult>,
    /// Set when the client's claim disagreed with the server's computed
    /// outcome for the claiming seat (claimed, computed). The computed
    /// result still wins; this exists for logging.
    pub mismatch: Option<(Adjudication, Adjudication)>,
}

/// A server-side unit pairing seats with one running game instance.
pub struct Table {
    number: TableId,
    kind: GameKind,
    config: TableConfig,
    phase: TablePhase,
    seats: Vec<Option<String>>,
    members: BTreeMap<String, TableMember>,
    controller: Arc<dyn GameController>,
    model: Option<Box<dyn GameModel>>,
}

impl Table {
    /// Create a waiting table for a game kind.
    pub fn new(number: TableId, kind: GameKind, config: TableConfig) -> Self {
        Self {
            number,
            kind,
            config,
            phase: TablePhase::Waiting,
            seats: vec![None; kind.seat_count()],
            members: BTreeMap::new(),
            controller: kind.controller(),
            model: None,
        }
    }

    /// Table number.
    pub fn number(&self) -> TableId {
        self.number
    }

    /// Game kind this table runs.
    pub fn kind(&self) -> GameKind {
        self.kind
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TablePhase {
        self.phase
    }

    /// Number of seats the game requires.
    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// Seat index of a username, if seated.
    pub fn seat_of(&self, username: &str) -> Option<SeatIndex> {
        self.seats
            .iter()
            .position(|s| s.as_deref() == Some(username))
    }

    /// Username occupying a seat, if any.
    pub fn username_of(&self, seat: SeatIndex) -> Option<&str> {
        self.seats.get(seat).and_then(|s| s.as_deref())
    }

    /// Complement seat index. Well-defined only for exactly-2-seat games.
    pub fn opponent(&self, seat: SeatIndex) -> Option<SeatIndex> {
        if self.seats.len() == 2 && seat < 2 {
            Some(1 - seat)
        } else {
            None
        }
    }

    /// Whether every seat is occupied.
    pub fn seats_filled(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    /// Whether no connections remain attached.
    pub fn is_deserted(&self) -> bool {
        self.members.is_empty()
    }

    /// Attach a connection's outbound queue to this table. Re-attaching an
    /// existing username replaces its queue (reconnect).
    pub fn attach(&mut self, username: &str, sender: mpsc::Sender<ServerFrame>) {
        self.members
            .insert(username.to_string(), TableMember { sender });
    }

    /// Detach a connection. The seat binding is vacated only while the
    /// table is still WAITING; once the game runs, the seat keeps its
    /// username so the player can reconnect and resync. The game model is
    /// never mutated here.
    pub fn detach(&mut self, username: &str) {
        self.members.remove(username);
        if self.phase == TablePhase::Waiting {
            if let Some(seat) = self.seat_of(username) {
                self.seats[seat] = None;
            }
        }
    }

    /// Seat a username at the lowest vacant seat. Rejoining a seat already
    /// bound to this username returns that seat at any phase.
    pub fn take_seat(&mut self, username: &str) -> Result<SeatIndex, GameError> {
        if let Some(seat) = self.seat_of(username) {
            return Ok(seat);
        }
        match self.phase {
            TablePhase::Finished => Err(GameError::TableClosed),
            TablePhase::Playing => Err(GameError::TableFull),
            TablePhase::Waiting => {
                let seat = self
                    .seats
                    .iter()
                    .position(Option::is_none)
                    .ok_or(GameError::TableFull)?;
                self.seats[seat] = Some(username.to_string());
                Ok(seat)
            }
        }
    }

    /// Invoke the controller's start operation. Legal exactly once, when
    /// the required seat count is filled.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase != TablePhase::Waiting {
            return Err(GameError::TableClosed);
        }
        if !self.seats_filled() {
            return Err(GameError::GameNotStarted);
        }
        let model = self.controller.start_game(self.number, &self.config)?;
        self.model = Some(model);
        self.phase = TablePhase::Playing;
        Ok(())
    }

    /// Apply a client envelope through the controller. The sole mutation
    /// path for the live model; errors leave the model untouched.
    pub fn apply(&mut self, username: &str, envelope: &Envelope) -> Result<EchoPolicy, GameError> {
        match self.phase {
            TablePhase::Finished => return Err(GameError::TableClosed),
            TablePhase::Waiting => return Err(GameError::GameNotStarted),
            TablePhase::Playing => {}
        }
        let seat = self.seat_of(username).ok_or(GameError::NotSeated)?;
        let model = self.model.as_mut().ok_or(GameError::GameNotStarted)?;
        self.controller.apply(model.as_mut(), envelope, seat)
    }

    /// Point-in-time snapshot of the live model. Called under the table
    /// lock, so no mutation can be in flight: never a torn read.
    pub fn snapshot(&self) -> Result<Document, GameError> {
        let model = self.model.as_ref().ok_or(GameError::GameNotStarted)?;
        Ok(model.snapshot())
    }

    /// Verify a client's game-over claim. The outcome is recomputed from
    /// the model; the claim itself never propagates. If the server's check
    /// is not terminal the claim is rejected and the table stays open.
    pub fn adjudicate_claim(
        &mut self,
        username: &str,
        claimed: Adjudication,
    ) -> Result<GameOverReport, GameError> {
        match self.phase {
            TablePhase::Finished => return Err(GameError::TableClosed),
            TablePhase::Waiting => return Err(GameError::GameNotStarted),
            TablePhase::Playing => {}
        }
        let claiming_seat = self.seat_of(username).ok_or(GameError::NotSeated)?;
        let model = self.model.as_ref().ok_or(GameError::GameNotStarted)?;

        let computed = self.controller.adjudicate(model.as_ref(), claiming_seat);
        if !computed.is_terminal() {
            return Err(GameError::AdjudicationMismatch { claimed, computed });
        }

        let results = (0..self.seats.len())
            .map(|seat| SeatResult {
                seat,
                username: self.username_of(seat).map(str::to_string),
                outcome: self.controller.adjudicate(model.as_ref(), seat),
            })
            .collect();

        self.phase = TablePhase::Finished;
        Ok(GameOverReport {
            results,
            mismatch: (computed != claimed).then_some((claimed, computed)),
        })
    }

    /// Escalate an unexpected table-level failure: the table closes with
    /// no winner and every member is told.
    pub fn fail(&mut self, reason: &str) {
        self.phase = TablePhase::Finished;
        let results = (0..self.seats.len())
            .map(|seat| SeatResult {
                seat,
                username: self.username_of(seat).map(str::to_string),
                outcome: Adjudication::Undetermined,
            })
            .collect();
        warn!(table = self.number, reason, "table failed");
        self.broadcast(
            ServerFrame::GameOver {
                table: self.number,
                results,
            },
            None,
        );
    }

    /// Queue a frame to every attached connection, optionally excluding
    /// one username. Non-blocking: a member whose queue is full or closed
    /// is detached on the spot rather than stalling the table. A gap in a
    /// member's stream would desynchronize it silently; detaching forces
    /// it to reconnect and resync from a fresh snapshot.
    pub fn broadcast(&mut self, frame: ServerFrame, exclude: Option<&str>) {
        let mut cut = Vec::new();
        for (username, member) in &self.members {
            if Some(username.as_str()) == exclude {
                continue;
            }
            if let Err(e) = member.sender.try_send(frame.clone()) {
                warn!(
                    table = self.number,
                    username, "detaching member with full or closed queue: {e}"
                );
                cut.push(username.clone());
            }
        }
        for username in cut {
            self.detach(&username);
        }
    }

    /// Queue a frame to a single attached connection. Same discipline as
    /// [`broadcast`](Table::broadcast): an unenqueueable member is
    /// detached, never left on the stream with a gap.
    pub fn unicast(&mut self, username: &str, frame: ServerFrame) {
        let Some(member) = self.members.get(username) else {
            return;
        };
        if let Err(e) = member.sender.try_send(frame) {
            warn!(
                table = self.number,
                username, "detaching member with full or closed queue: {e}"
            );
            self.detach(username);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c4_table() -> Table {
        Table::new(1, GameKind::ConnectFour, TableConfig::new())
    }

    fn seated_table() -> Table {
        let mut table = c4_table();
        table.take_seat("alice").unwrap();
        table.take_seat("bob").unwrap();
        table
    }

    fn drop_envelope(column: i64) -> Envelope {
        let mut env = Envelope::new("c4_drop");
        env.set_attr("column", column);
        env
    }

    #[test]
    fn test_seating_fills_lowest_vacant() {
        let mut table = c4_table();
        assert_eq!(table.take_seat("alice").unwrap(), 0);
        assert_eq!(table.take_seat("bob").unwrap(), 1);
        assert_eq!(table.seat_of("bob"), Some(1));
        assert_eq!(table.username_of(0), Some("alice"));
        assert!(table.seats_filled());
    }

    #[test]
    fn test_rejoin_returns_same_seat() {
        let mut table = seated_table();
        table.start().unwrap();
        assert_eq!(table.take_seat("alice").unwrap(), 0);
    }

    #[test]
    fn test_third_player_rejected() {
        let mut table = seated_table();
        assert_eq!(table.take_seat("carol"), Err(GameError::TableFull));
    }

    #[test]
    fn test_opponent_defined_for_two_seats() {
        let table = c4_table();
        assert_eq!(table.opponent(0), Some(1));
        assert_eq!(table.opponent(1), Some(0));
        assert_eq!(table.opponent(2), None);
    }

    #[test]
    fn test_start_requires_full_seats() {
        let mut table = c4_table();
        table.take_seat("alice").unwrap();
        assert_eq!(table.start(), Err(GameError::GameNotStarted));

        table.take_seat("bob").unwrap();
        table.start().unwrap();
        assert_eq!(table.phase(), TablePhase::Playing);

        // Start is invoked exactly once.
        assert_eq!(table.start(), Err(GameError::TableClosed));
    }

    #[test]
    fn test_apply_before_start() {
        let mut table = seated_table();
        let err = table.apply("alice", &drop_envelope(0)).unwrap_err();
        assert_eq!(err, GameError::GameNotStarted);
    }

    #[test]
    fn test_apply_by_stranger() {
        let mut table = seated_table();
        table.start().unwrap();
        let err = table.apply("mallory", &drop_envelope(0)).unwrap_err();
        assert_eq!(err, GameError::NotSeated);
    }

    #[test]
    fn test_apply_after_finished_is_table_closed() {
        let mut table = seated_table();
        table.start().unwrap();
        table.fail("test");
        let err = table.apply("alice", &drop_envelope(0)).unwrap_err();
        assert_eq!(err, GameError::TableClosed);
    }

    #[test]
    fn test_detach_vacates_only_while_waiting() {
        let mut table = seated_table();
        let (tx, _rx) = mpsc::channel(4);
        table.attach("alice", tx);

        table.detach("alice");
        assert_eq!(table.seat_of("alice"), None);

        // Re-seat and start: detaching mid-game keeps the seat bound.
        table.take_seat("alice").unwrap();
        table.start().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        table.attach("alice", tx);
        table.detach("alice");
        assert_eq!(table.seat_of("alice"), Some(0));
    }

    #[test]
    fn test_premature_claim_is_mismatch() {
        let mut table = seated_table();
        table.start().unwrap();
        let err = table
            .adjudicate_claim("alice", Adjudication::Win)
            .unwrap_err();
        assert_eq!(
            err,
            GameError::AdjudicationMismatch {
                claimed: Adjudication::Win,
                computed: Adjudication::Undetermined,
            }
        );
        // Claim rejected: table stays open.
        assert_eq!(table.phase(), TablePhase::Playing);
    }

    #[test]
    fn test_full_queue_member_is_detached() {
        let mut table = seated_table();
        table.start().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        table.attach("alice", tx);

        let frame = ServerFrame::MemberLeft {
            table: 1,
            username: "bob".to_string(),
        };
        table.broadcast(frame.clone(), None);
        assert!(!table.is_deserted());

        // Queue still full: alice is cut from the stream rather than
        // continuing with a gap in it.
        table.broadcast(frame, None);
        assert!(table.is_deserted());
        // The one enqueued frame is intact and the seat binding survives
        // for reconnect.
        assert!(rx.try_recv().is_ok());
        assert_eq!(table.seat_of("alice"), Some(0));
    }

    #[test]
    fn test_unicast_to_full_queue_detaches() {
        let mut table = seated_table();
        table.start().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        table.attach("alice", tx);

        let frame = ServerFrame::MemberLeft {
            table: 1,
            username: "bob".to_string(),
        };
        table.unicast("alice", frame.clone());
        table.unicast("alice", frame);
        assert!(table.is_deserted());
    }

    #[test]
    fn test_config_parse() {
        let mut config = TableConfig::new();
        config.set("board_size", "9");
        assert_eq!(config.get_usize_or("board_size", 15).unwrap(), 9);
        assert_eq!(config.get_usize_or("absent", 15).unwrap(), 15);

        config.set("board_size", "huge");
        assert!(matches!(
            config.get_usize_or("board_size", 15),
            Err(GameError::BadConfig(_))
        ));
    }
}
