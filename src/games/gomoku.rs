//! Gomoku (Five in a Row)
//!
//! Exercises the parts of the mechanism Connect Four does not: one wire
//! tag multiplexing several logical actions behind a status
//! discriminator (place / pass / concede), a configurable board size,
//! and a move history snapshotted as ordered child nodes.

use std::any::Any;

use crate::game::{Adjudication, EchoPolicy, GameController, GameError, GameModel};
use crate::protocol::registry::MessageRegistry;
use crate::protocol::{Envelope, ProtocolError, WireMessage};
use crate::snapshot::{Document, Node, SnapshotError};
use crate::table::{SeatIndex, TableConfig, TableId};

const DEFAULT_SIZE: usize = 15;
const ROW: usize = 5;

const STATUS_PLACE: i32 = 0;
const STATUS_PASS: i32 = 1;
const STATUS_CONCEDE: i32 = 2;

/// One gomoku action. All three ride under a single tag; the envelope's
/// status discriminator says which, and the payload shape varies with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GomokuMessage {
    /// Place a stone at (x, y).
    Place {
        /// Column, 0-indexed.
        x: u16,
        /// Row, 0-indexed.
        y: u16,
    },
    /// Skip the turn.
    Pass,
    /// Give up; the opponent wins.
    Concede,
}

impl WireMessage for GomokuMessage {
    const TAG: &'static str = "gomoku";

    fn encode(&self) -> Envelope {
        match *self {
            GomokuMessage::Place { x, y } => {
                let mut envelope = Envelope::new(Self::TAG).with_status(STATUS_PLACE);
                envelope.set_attr("x", x);
                envelope.set_attr("y", y);
                envelope
            }
            GomokuMessage::Pass => Envelope::new(Self::TAG).with_status(STATUS_PASS),
            GomokuMessage::Concede => Envelope::new(Self::TAG).with_status(STATUS_CONCEDE),
        }
    }

    fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        envelope.expect_tag(Self::TAG)?;
        // Switch on the discriminator before touching the payload; its
        // shape depends on which logical message this is.
        match envelope.status()? {
            STATUS_PLACE => {
                let coord = |attr: &str| -> Result<u16, ProtocolError> {
                    let raw = envelope.attr_int(attr)?;
                    u16::try_from(raw).map_err(|_| ProtocolError::InvalidAttribute {
                        tag: Self::TAG.to_string(),
                        attr: attr.to_string(),
                        value: raw.to_string(),
                    })
                };
                Ok(GomokuMessage::Place {
                    x: coord("x")?,
                    y: coord("y")?,
                })
            }
            STATUS_PASS => Ok(GomokuMessage::Pass),
            STATUS_CONCEDE => Ok(GomokuMessage::Concede),
            status => Err(ProtocolError::UnknownStatus {
                tag: Self::TAG.to_string(),
                status,
            }),
        }
    }
}

/// One applied action, kept for the snapshot history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HistoryEntry {
    seat: SeatIndex,
    kind: i32,
    /// Coordinates for placements, (-1, -1) otherwise.
    x: i64,
    y: i64,
}

/// Live gomoku state.
pub struct GomokuModel {
    size: usize,
    /// -1 empty, otherwise the seat index of the stone.
    cells: Vec<i8>,
    to_move: SeatIndex,
    /// Consecutive passes; two in a row end the game as a draw.
    passes: u8,
    conceded_by: Option<SeatIndex>,
    winner: Option<SeatIndex>,
    drawn: bool,
    history: Vec<HistoryEntry>,
}

impl GomokuModel {
    /// Fresh board with seat 0 to move.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![-1; size * size],
            to_move: 0,
            passes: 0,
            conceded_by: None,
            winner: None,
            drawn: false,
            history: Vec::new(),
        }
    }

    /// Board side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Seat occupying a cell, if any. Out-of-range coordinates are empty.
    pub fn cell(&self, x: usize, y: usize) -> Option<SeatIndex> {
        if x >= self.size || y >= self.size {
            return None;
        }
        let v = self.cells[y * self.size + x];
        (v >= 0).then_some(v as SeatIndex)
    }

    /// Seat whose turn it is.
    pub fn to_move(&self) -> SeatIndex {
        self.to_move
    }

    /// Consecutive passes so far.
    pub fn passes(&self) -> u8 {
        self.passes
    }

    /// Seat that conceded, if any.
    pub fn conceded_by(&self) -> Option<SeatIndex> {
        self.conceded_by
    }

    /// Winning seat, if decided.
    pub fn winner(&self) -> Option<SeatIndex> {
        self.winner
    }

    /// Whether the game drew (full board or double pass).
    pub fn is_draw(&self) -> bool {
        self.drawn
    }

    /// Number of applied actions.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Apply one action for a seat.
    pub fn apply(&mut self, seat: SeatIndex, message: GomokuMessage) -> Result<(), GameError> {
        if self.is_over() {
            return Err(GameError::IllegalMove("game already decided".to_string()));
        }
        match message {
            GomokuMessage::Place { x, y } => {
                if seat != self.to_move {
                    return Err(GameError::IllegalMove(format!(
                        "seat {seat} moved out of turn"
                    )));
                }
                let (x, y) = (x as usize, y as usize);
                if x >= self.size || y >= self.size {
                    return Err(GameError::IllegalMove(format!(
                        "({x},{y}) outside board of size {}",
                        self.size
                    )));
                }
                if self.cells[y * self.size + x] != -1 {
                    return Err(GameError::IllegalMove(format!(
                        "({x},{y}) already occupied"
                    )));
                }

                self.cells[y * self.size + x] = seat as i8;
                self.passes = 0;
                self.history.push(HistoryEntry {
                    seat,
                    kind: STATUS_PLACE,
                    x: x as i64,
                    y: y as i64,
                });

                if self.wins_through(x, y, seat) {
                    self.winner = Some(seat);
                } else if self.cells.iter().all(|&c| c != -1) {
                    self.drawn = true;
                }
                self.to_move = 1 - self.to_move;
            }
            GomokuMessage::Pass => {
                if seat != self.to_move {
                    return Err(GameError::IllegalMove(format!(
                        "seat {seat} passed out of turn"
                    )));
                }
                self.passes += 1;
                self.history.push(HistoryEntry {
                    seat,
                    kind: STATUS_PASS,
                    x: -1,
                    y: -1,
                });
                if self.passes >= 2 {
                    self.drawn = true;
                }
                self.to_move = 1 - self.to_move;
            }
            // Conceding is legal on either turn.
            GomokuMessage::Concede => {
                self.conceded_by = Some(seat);
                self.winner = Some(1 - seat);
                self.history.push(HistoryEntry {
                    seat,
                    kind: STATUS_CONCEDE,
                    x: -1,
                    y: -1,
                });
            }
        }
        Ok(())
    }

    fn wins_through(&self, x: usize, y: usize, seat: SeatIndex) -> bool {
        let dirs = [(1i64, 0i64), (0, 1), (1, 1), (1, -1)];
        dirs.iter().any(|&(dx, dy)| {
            let mut run = 1;
            for sign in [1i64, -1] {
                let (mut cx, mut cy) = (x as i64 + dx * sign, y as i64 + dy * sign);
                while cx >= 0
                    && cy >= 0
                    && (cx as usize) < self.size
                    && (cy as usize) < self.size
                    && self.cells[cy as usize * self.size + cx as usize] == seat as i8
                {
                    run += 1;
                    cx += dx * sign;
                    cy += dy * sign;
                }
            }
            run >= ROW
        })
    }
}

impl GameModel for GomokuModel {
    fn snapshot(&self) -> Document {
        let mut root = Node::new("gomoku");
        root.set_attr("size", self.size);
        root.set_attr("to_move", self.to_move);
        root.set_attr("passes", self.passes);
        root.set_attr("conceded_by", self.conceded_by.map(|s| s as i64).unwrap_or(-1));
        root.set_attr("winner", self.winner.map(|s| s as i64).unwrap_or(-1));
        root.set_attr("drawn", u8::from(self.drawn));
        root.set_int_array("cells", &self.cells.iter().map(|&c| c as i64).collect::<Vec<_>>());

        // The history is a repeated structure: ordered children, one per
        // applied action.
        for entry in &self.history {
            let mut node = Node::new("action");
            node.set_attr("seat", entry.seat);
            node.set_attr("kind", entry.kind);
            node.set_attr("x", entry.x);
            node.set_attr("y", entry.y);
            root.push_child(node);
        }
        root
    }

    fn restore(&mut self, document: &Document) -> Result<(), SnapshotError> {
        document.expect_name("gomoku")?;

        let invalid = |attr: &str, value: String| SnapshotError::InvalidAttribute {
            node: "gomoku".to_string(),
            attr: attr.to_string(),
            value,
        };

        let size = document.attr_int("size")?;
        if size < ROW as i64 {
            return Err(invalid("size", size.to_string()));
        }
        let size = size as usize;

        let to_move = document.attr_int("to_move")?;
        if !(0..2).contains(&to_move) {
            return Err(invalid("to_move", to_move.to_string()));
        }

        let passes = document.attr_int("passes")?;
        if !(0..=2).contains(&passes) {
            return Err(invalid("passes", passes.to_string()));
        }

        let seat_or_none = |attr: &str| -> Result<Option<SeatIndex>, SnapshotError> {
            match document.attr_int(attr)? {
                -1 => Ok(None),
                s @ 0..=1 => Ok(Some(s as SeatIndex)),
                s => Err(invalid(attr, s.to_string())),
            }
        };
        let conceded_by = seat_or_none("conceded_by")?;
        let winner = seat_or_none("winner")?;

        let drawn = match document.attr_int("drawn")? {
            0 => false,
            1 => true,
            d => return Err(invalid("drawn", d.to_string())),
        };

        let raw_cells = document.attr_int_array("cells")?;
        if raw_cells.len() != size * size {
            return Err(invalid("cells", format!("{} values", raw_cells.len())));
        }
        let mut cells = Vec::with_capacity(raw_cells.len());
        for v in raw_cells {
            if !(-1..2).contains(&v) {
                return Err(invalid("cells", v.to_string()));
            }
            cells.push(v as i8);
        }

        let mut history = Vec::new();
        for node in document.children_named("action") {
            let seat = node.attr_int("seat")?;
            if !(0..2).contains(&seat) {
                return Err(invalid("seat", seat.to_string()));
            }
            let kind = node.attr_int("kind")?;
            if !(STATUS_PLACE as i64..=STATUS_CONCEDE as i64).contains(&kind) {
                return Err(invalid("kind", kind.to_string()));
            }
            history.push(HistoryEntry {
                seat: seat as SeatIndex,
                kind: kind as i32,
                x: node.attr_int("x")?,
                y: node.attr_int("y")?,
            });
        }

        self.size = size;
        self.cells = cells;
        self.to_move = to_move as SeatIndex;
        self.passes = passes as u8;
        self.conceded_by = conceded_by;
        self.winner = winner;
        self.drawn = drawn;
        self.history = history;
        Ok(())
    }

    fn outcome_for(&self, seat: SeatIndex) -> Adjudication {
        match (self.winner, self.drawn) {
            (Some(w), _) if w == seat => Adjudication::Win,
            (Some(_), _) => Adjudication::Lose,
            (None, true) => Adjudication::Draw,
            (None, false) => Adjudication::Undetermined,
        }
    }

    fn is_over(&self) -> bool {
        self.winner.is_some() || self.drawn
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Gomoku's plug into the table mechanism.
pub struct GomokuController {
    registry: MessageRegistry,
}

impl GomokuController {
    /// Build the controller and its single multiplexed-tag registry.
    pub fn new() -> Self {
        let mut registry = MessageRegistry::new();
        registry.register(GomokuMessage::TAG, |model, envelope, seat| {
            let msg = GomokuMessage::decode(envelope)?;
            let game = model
                .as_any_mut()
                .downcast_mut::<GomokuModel>()
                .ok_or(GameError::ModelMismatch)?;
            game.apply(seat, msg)?;
            Ok(EchoPolicy::Others)
        });
        Self { registry }
    }
}

impl Default for GomokuController {
    fn default() -> Self {
        Self::new()
    }
}

impl GameController for GomokuController {
    fn start_game(
        &self,
        _table: TableId,
        config: &TableConfig,
    ) -> Result<Box<dyn GameModel>, GameError> {
        let size = config.get_usize_or("board_size", DEFAULT_SIZE)?;
        if !(ROW..=25).contains(&size) {
            return Err(GameError::BadConfig(format!(
                "board size {size} cannot host {ROW}-in-a-row"
            )));
        }
        Ok(Box::new(GomokuModel::new(size)))
    }

    fn registry(&self) -> &MessageRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> GomokuModel {
        GomokuModel::new(DEFAULT_SIZE)
    }

    fn assert_roundtrip(original: &GomokuModel) {
        let mut restored = GomokuModel::new(ROW);
        restored.restore(&original.snapshot()).unwrap();

        assert_eq!(restored.size(), original.size());
        assert_eq!(restored.to_move(), original.to_move());
        assert_eq!(restored.passes(), original.passes());
        assert_eq!(restored.conceded_by(), original.conceded_by());
        assert_eq!(restored.winner(), original.winner());
        assert_eq!(restored.is_draw(), original.is_draw());
        assert_eq!(restored.history, original.history);
        for x in 0..original.size() {
            for y in 0..original.size() {
                assert_eq!(restored.cell(x, y), original.cell(x, y), "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn test_wire_roundtrip_every_discriminator() {
        let messages = [
            GomokuMessage::Place { x: 0, y: 0 },
            GomokuMessage::Place {
                x: (DEFAULT_SIZE - 1) as u16,
                y: (DEFAULT_SIZE - 1) as u16,
            },
            GomokuMessage::Place {
                x: u16::MAX,
                y: u16::MAX,
            },
            GomokuMessage::Pass,
            GomokuMessage::Concede,
        ];
        for msg in messages {
            assert_eq!(GomokuMessage::decode(&msg.encode()).unwrap(), msg);
        }
    }

    #[test]
    fn test_decode_unknown_discriminator() {
        let envelope = Envelope::new("gomoku").with_status(9);
        assert_eq!(
            GomokuMessage::decode(&envelope).unwrap_err(),
            ProtocolError::UnknownStatus {
                tag: "gomoku".to_string(),
                status: 9,
            }
        );
    }

    #[test]
    fn test_decode_without_discriminator() {
        let envelope = Envelope::new("gomoku");
        assert!(matches!(
            GomokuMessage::decode(&envelope),
            Err(ProtocolError::MissingStatus { .. })
        ));
    }

    #[test]
    fn test_place_payload_checked_after_discriminator() {
        // A pass envelope with no coordinates is fine...
        let pass = Envelope::new("gomoku").with_status(STATUS_PASS);
        assert_eq!(GomokuMessage::decode(&pass).unwrap(), GomokuMessage::Pass);

        // ...but a place envelope without them is malformed.
        let place = Envelope::new("gomoku").with_status(STATUS_PLACE);
        assert!(matches!(
            GomokuMessage::decode(&place),
            Err(ProtocolError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_occupied_cell_rejected_without_mutation() {
        let mut m = model();
        m.apply(0, GomokuMessage::Place { x: 7, y: 7 }).unwrap();
        let before = m.snapshot();

        let err = m.apply(1, GomokuMessage::Place { x: 7, y: 7 }).unwrap_err();
        assert!(matches!(err, GameError::IllegalMove(_)));
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut m = model();
        assert!(matches!(
            m.apply(0, GomokuMessage::Place { x: 15, y: 0 }),
            Err(GameError::IllegalMove(_))
        ));
    }

    #[test]
    fn test_cell_out_of_range_is_empty() {
        let mut m = model();
        m.apply(0, GomokuMessage::Place { x: 7, y: 7 }).unwrap();
        assert_eq!(m.cell(7, 7), Some(0));
        assert_eq!(m.cell(DEFAULT_SIZE, 0), None);
        assert_eq!(m.cell(0, usize::MAX), None);
    }

    #[test]
    fn test_five_in_a_row_wins() {
        let mut m = model();
        for x in 0..4u16 {
            m.apply(0, GomokuMessage::Place { x, y: 0 }).unwrap();
            m.apply(1, GomokuMessage::Place { x, y: 10 }).unwrap();
        }
        m.apply(0, GomokuMessage::Place { x: 4, y: 0 }).unwrap();

        assert_eq!(m.winner(), Some(0));
        assert_eq!(m.outcome_for(0), Adjudication::Win);
        assert_eq!(m.outcome_for(1), Adjudication::Lose);
    }

    #[test]
    fn test_double_pass_draws() {
        let mut m = model();
        m.apply(0, GomokuMessage::Place { x: 3, y: 3 }).unwrap();
        m.apply(1, GomokuMessage::Pass).unwrap();
        assert!(!m.is_over());
        m.apply(0, GomokuMessage::Pass).unwrap();

        assert!(m.is_draw());
        assert_eq!(m.outcome_for(0), Adjudication::Draw);
        assert_eq!(m.outcome_for(1), Adjudication::Draw);
    }

    #[test]
    fn test_placement_resets_pass_streak() {
        let mut m = model();
        m.apply(0, GomokuMessage::Pass).unwrap();
        m.apply(1, GomokuMessage::Place { x: 1, y: 1 }).unwrap();
        m.apply(0, GomokuMessage::Pass).unwrap();
        assert!(!m.is_over());
        assert_eq!(m.passes(), 1);
    }

    #[test]
    fn test_concede_off_turn() {
        let mut m = model();
        m.apply(0, GomokuMessage::Place { x: 0, y: 0 }).unwrap();
        // Seat 0 just moved; it may still concede while seat 1 thinks.
        m.apply(0, GomokuMessage::Concede).unwrap();

        assert_eq!(m.conceded_by(), Some(0));
        assert_eq!(m.winner(), Some(1));
        assert_eq!(m.outcome_for(1), Adjudication::Win);
    }

    #[test]
    fn test_roundtrip_preserves_history_order() {
        let mut m = model();
        m.apply(0, GomokuMessage::Place { x: 2, y: 3 }).unwrap();
        m.apply(1, GomokuMessage::Pass).unwrap();
        m.apply(0, GomokuMessage::Place { x: 4, y: 4 }).unwrap();
        m.apply(1, GomokuMessage::Place { x: 9, y: 9 }).unwrap();
        m.apply(0, GomokuMessage::Concede).unwrap();

        let doc = m.snapshot();
        let kinds: Vec<i64> = doc
            .children_named("action")
            .map(|n| n.attr_int("kind").unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec![
                STATUS_PLACE as i64,
                STATUS_PASS as i64,
                STATUS_PLACE as i64,
                STATUS_PLACE as i64,
                STATUS_CONCEDE as i64
            ]
        );

        assert_roundtrip(&m);
    }

    #[test]
    fn test_roundtrip_fresh_board() {
        assert_roundtrip(&model());
    }

    #[test]
    fn test_restore_replaces_prior_state() {
        let mut target = model();
        target.apply(0, GomokuMessage::Place { x: 5, y: 5 }).unwrap();
        target.apply(1, GomokuMessage::Concede).unwrap();

        target.restore(&model().snapshot()).unwrap();
        assert_eq!(target.winner(), None);
        assert_eq!(target.conceded_by(), None);
        assert_eq!(target.history_len(), 0);
        assert_eq!(target.cell(5, 5), None);
    }

    #[test]
    fn test_restore_rejects_bad_history_seat() {
        let mut doc = model().snapshot();
        let mut bogus = Node::new("action");
        bogus.set_attr("seat", 7);
        bogus.set_attr("kind", STATUS_PASS);
        bogus.set_attr("x", -1);
        bogus.set_attr("y", -1);
        doc.push_child(bogus);

        assert!(matches!(
            model().restore(&doc),
            Err(SnapshotError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_controller_board_size_config() {
        let controller = GomokuController::new();
        let mut config = TableConfig::new();
        config.set("board_size", "9");

        let m = controller.start_game(1, &config).unwrap();
        let m = m.as_any().downcast_ref::<GomokuModel>().unwrap();
        assert_eq!(m.size(), 9);

        config.set("board_size", "3");
        assert!(matches!(
            controller.start_game(1, &config),
            Err(GameError::BadConfig(_))
        ));
    }

    #[test]
    fn test_adjudication_never_echoes_claim() {
        // Engineered disagreement: the game is mid-flight, the model's
        // own check says undetermined no matter what anyone claims.
        let controller = GomokuController::new();
        let mut m = model();
        m.apply(0, GomokuMessage::Place { x: 0, y: 0 }).unwrap();

        assert_eq!(controller.adjudicate(&m, 0), Adjudication::Undetermined);
        assert_eq!(controller.adjudicate(&m, 1), Adjudication::Undetermined);
    }
}
