//! Connect Four
//!
//! The simplest engine exercising the full controller contract: a single
//! move message, gravity placement, four-in-a-row win detection, and a
//! snapshot covering every observable field.

use std::any::Any;

use crate::game::{Adjudication, EchoPolicy, GameController, GameError, GameModel};
use crate::protocol::registry::MessageRegistry;
use crate::protocol::{Envelope, ProtocolError, WireMessage};
use crate::snapshot::{Document, Node, SnapshotError};
use crate::table::{SeatIndex, TableConfig, TableId};

const DEFAULT_WIDTH: usize = 7;
const DEFAULT_HEIGHT: usize = 6;
const CONNECT: usize = 4;

/// Drop a disc into a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDrop {
    /// Target column, 0-indexed from the left.
    pub column: u8,
}

impl WireMessage for ColumnDrop {
    const TAG: &'static str = "c4_drop";

    fn encode(&self) -> Envelope {
        let mut envelope = Envelope::new(Self::TAG);
        envelope.set_attr("column", self.column);
        envelope
    }

    fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        envelope.expect_tag(Self::TAG)?;
        let raw = envelope.attr_int("column")?;
        let column = u8::try_from(raw).map_err(|_| ProtocolError::InvalidAttribute {
            tag: Self::TAG.to_string(),
            attr: "column".to_string(),
            value: raw.to_string(),
        })?;
        Ok(Self { column })
    }
}

/// Live Connect Four state. Row 0 is the bottom of the board.
pub struct ConnectFourModel {
    width: usize,
    height: usize,
    /// -1 empty, otherwise the seat index of the disc.
    cells: Vec<i8>,
    to_move: SeatIndex,
    /// Column history in play order.
    moves: Vec<u8>,
    winner: Option<SeatIndex>,
    drawn: bool,
}

impl ConnectFourModel {
    /// Fresh board with seat 0 to move.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![-1; width * height],
            to_move: 0,
            moves: Vec::new(),
            winner: None,
            drawn: false,
        }
    }

    /// Board width in columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Board height in rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Seat occupying a cell, if any. Out-of-range coordinates are empty.
    pub fn cell(&self, x: usize, y: usize) -> Option<SeatIndex> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let v = self.cells[y * self.width + x];
        (v >= 0).then_some(v as SeatIndex)
    }

    /// Seat whose turn it is.
    pub fn to_move(&self) -> SeatIndex {
        self.to_move
    }

    /// Winning seat, if decided.
    pub fn winner(&self) -> Option<SeatIndex> {
        self.winner
    }

    /// Whether the board filled with no winner.
    pub fn is_draw(&self) -> bool {
        self.drawn
    }

    /// Column history in play order.
    pub fn moves(&self) -> &[u8] {
        &self.moves
    }

    /// Apply one drop for a seat. Rejects anything illegal for the current
    /// turn or state without touching the board.
    pub fn drop_disc(&mut self, seat: SeatIndex, column: usize) -> Result<(), GameError> {
        if self.is_over() {
            return Err(GameError::IllegalMove("game already decided".to_string()));
        }
        if seat != self.to_move {
            return Err(GameError::IllegalMove(format!(
                "seat {seat} moved out of turn"
            )));
        }
        if column >= self.width {
            return Err(GameError::IllegalMove(format!(
                "column {column} outside board of width {}",
                self.width
            )));
        }
        let row = (0..self.height)
            .find(|&y| self.cells[y * self.width + column] == -1)
            .ok_or_else(|| GameError::IllegalMove(format!("column {column} is full")))?;

        self.cells[row * self.width + column] = seat as i8;
        self.moves.push(column as u8);

        if self.wins_through(column, row, seat) {
            self.winner = Some(seat);
        } else if self.moves.len() == self.width * self.height {
            self.drawn = true;
        }
        self.to_move = 1 - self.to_move;
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
                    && (cx as usize) < self.width
                    && (cy as usize) < self.height
                    && self.cells[cy as usize * self.width + cx as usize] == seat as i8
                {
                    run += 1;
                    cx += dx * sign;
                    cy += dy * sign;
                }
            }
            run >= CONNECT
        })
    }
}

impl GameModel for ConnectFourModel {
    fn snapshot(&self) -> Document {
        let mut root = Node::new("connect_four");
        root.set_attr("width", self.width);
        root.set_attr("height", self.height);
        root.set_attr("to_move", self.to_move);
        root.set_attr("winner", self.winner.map(|s| s as i64).unwrap_or(-1));
        root.set_attr("drawn", u8::from(self.drawn));
        root.set_int_array("cells", &self.cells.iter().map(|&c| c as i64).collect::<Vec<_>>());
        root.set_int_array("moves", &self.moves.iter().map(|&m| m as i64).collect::<Vec<_>>());
        root
    }

    fn restore(&mut self, document: &Document) -> Result<(), SnapshotError> {
        document.expect_name("connect_four")?;

        // Decode everything into locals first; self is only touched once
        // the whole document has validated.
        let invalid = |attr: &str, value: String| SnapshotError::InvalidAttribute {
            node: "connect_four".to_string(),
            attr: attr.to_string(),
            value,
        };

        let width = document.attr_int("width")?;
        let height = document.attr_int("height")?;
        if width < CONNECT as i64 || height < CONNECT as i64 {
            return Err(invalid("width", format!("{width}x{height}")));
        }
        let (width, height) = (width as usize, height as usize);

        let to_move = document.attr_int("to_move")?;
        if !(0..2).contains(&to_move) {
            return Err(invalid("to_move", to_move.to_string()));
        }

        let winner = match document.attr_int("winner")? {
            -1 => None,
            s @ 0..=1 => Some(s as SeatIndex),
            s => return Err(invalid("winner", s.to_string())),
        };

        let drawn = match document.attr_int("drawn")? {
            0 => false,
            1 => true,
            d => return Err(invalid("drawn", d.to_string())),
        };

        let raw_cells = document.attr_int_array("cells")?;
        if raw_cells.len() != width * height {
            return Err(invalid("cells", format!("{} values", raw_cells.len())));
        }
        let mut cells = Vec::with_capacity(raw_cells.len());
        for v in raw_cells {
            if !(-1..2).contains(&v) {
                return Err(invalid("cells", v.to_string()));
            }
            cells.push(v as i8);
        }

        let raw_moves = document.attr_int_array("moves")?;
        let mut moves = Vec::with_capacity(raw_moves.len());
        for v in raw_moves {
            if v < 0 || v >= width as i64 {
                return Err(invalid("moves", v.to_string()));
            }
            moves.push(v as u8);
        }

        self.width = width;
        self.height = height;
        self.cells = cells;
        self.to_move = to_move as SeatIndex;
        self.moves = moves;
        self.winner = winner;
        self.drawn = drawn;
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

/// Connect Four's plug into the table mechanism.
pub struct ConnectFourController {
    registry: MessageRegistry,
}

impl ConnectFourController {
    /// Build the controller and its one-tag message registry.
    pub fn new() -> Self {
        let mut registry = MessageRegistry::new();
        registry.register(ColumnDrop::TAG, |model, envelope, seat| {
            let msg = ColumnDrop::decode(envelope)?;
            let game = model
                .as_any_mut()
                .downcast_mut::<ConnectFourModel>()
                .ok_or(GameError::ModelMismatch)?;
            game.drop_disc(seat, msg.column as usize)?;
            Ok(EchoPolicy::Others)
        });
        Self { registry }
    }
}

impl Default for ConnectFourController {
    fn default() -> Self {
        Self::new()
    }
}

impl GameController for ConnectFourController {
    fn start_game(
        &self,
        _table: TableId,
        config: &TableConfig,
    ) -> Result<Box<dyn GameModel>, GameError> {
        let width = config.get_usize_or("width", DEFAULT_WIDTH)?;
        let height = config.get_usize_or("height", DEFAULT_HEIGHT)?;
        if !(CONNECT..=32).contains(&width) || !(CONNECT..=32).contains(&height) {
            return Err(GameError::BadConfig(format!(
                "board {width}x{height} cannot host connect-{CONNECT}"
            )));
        }
        Ok(Box::new(ConnectFourModel::new(width, height)))
    }

    fn registry(&self) -> &MessageRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model() -> ConnectFourModel {
        ConnectFourModel::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Snapshot-restore into a fresh instance and compare every accessor.
    fn assert_roundtrip(original: &ConnectFourModel) {
        let mut restored = ConnectFourModel::new(1, 1);
        restored.restore(&original.snapshot()).unwrap();

        assert_eq!(restored.width(), original.width());
        assert_eq!(restored.height(), original.height());
        assert_eq!(restored.to_move(), original.to_move());
        assert_eq!(restored.winner(), original.winner());
        assert_eq!(restored.is_draw(), original.is_draw());
        assert_eq!(restored.moves(), original.moves());
        for x in 0..original.width() {
            for y in 0..original.height() {
                assert_eq!(restored.cell(x, y), original.cell(x, y), "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn test_wire_roundtrip_boundaries() {
        for column in [0u8, 6, u8::MAX] {
            let msg = ColumnDrop { column };
            assert_eq!(ColumnDrop::decode(&msg.encode()).unwrap(), msg);
        }
    }

    #[test]
    fn test_decode_rejects_missing_column() {
        let err = ColumnDrop::decode(&Envelope::new("c4_drop")).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingAttribute { .. }));
    }

    #[test]
    fn test_out_of_turn_rejected_without_mutation() {
        let mut m = model();
        let before = m.snapshot();
        let err = m.drop_disc(1, 3).unwrap_err();
        assert!(matches!(err, GameError::IllegalMove(_)));
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_full_column_rejected() {
        let mut m = model();
        // Alternating drops into one column never connect four vertically.
        for turn in 0..DEFAULT_HEIGHT {
            m.drop_disc(turn % 2, 0).unwrap();
        }
        let before = m.snapshot();
        assert!(matches!(
            m.drop_disc(m.to_move(), 0),
            Err(GameError::IllegalMove(_))
        ));
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_vertical_win() {
        let mut m = model();
        // Seat 0 stacks column 0, seat 1 wastes moves in column 6.
        for _ in 0..3 {
            m.drop_disc(0, 0).unwrap();
            m.drop_disc(1, 6).unwrap();
        }
        m.drop_disc(0, 0).unwrap();

        assert_eq!(m.winner(), Some(0));
        assert_eq!(m.outcome_for(0), Adjudication::Win);
        assert_eq!(m.outcome_for(1), Adjudication::Lose);
        assert!(m.is_over());

        // Terminal state rejects further moves.
        assert!(matches!(m.drop_disc(1, 6), Err(GameError::IllegalMove(_))));
    }

    #[test]
    fn test_diagonal_win() {
        let mut m = model();
        // Build a / diagonal for seat 0: (0,0) (1,1) (2,2) (3,3).
        let script = [
            (0, 0),
            (1, 1),
            (0, 1),
            (1, 2),
            (0, 3),
            (1, 2),
            (0, 2),
            (1, 3),
            (0, 3),
            (1, 6),
            (0, 3),
        ];
        for (seat, column) in script {
            m.drop_disc(seat, column).unwrap();
        }
        assert_eq!(m.winner(), Some(0));
    }

    #[test]
    fn test_undetermined_midgame() {
        let mut m = model();
        m.drop_disc(0, 3).unwrap();
        assert_eq!(m.outcome_for(0), Adjudication::Undetermined);
        assert!(!m.is_over());
    }

    #[test]
    fn test_cell_out_of_range_is_empty() {
        let mut m = model();
        m.drop_disc(0, 0).unwrap();
        assert_eq!(m.cell(0, 0), Some(0));
        assert_eq!(m.cell(DEFAULT_WIDTH, 0), None);
        assert_eq!(m.cell(0, DEFAULT_HEIGHT), None);
        assert_eq!(m.cell(usize::MAX, usize::MAX), None);
    }

    #[test]
    fn test_roundtrip_after_scripted_sequence() {
        let mut m = model();
        // Ten alternating moves, no winner yet.
        for (i, column) in [3, 3, 4, 4, 5, 2, 1, 5, 0, 6].iter().enumerate() {
            m.drop_disc(i % 2, *column).unwrap();
        }
        assert!(!m.is_over());
        assert_roundtrip(&m);
    }

    #[test]
    fn test_roundtrip_of_fresh_and_terminal_states() {
        assert_roundtrip(&model());

        let mut m = model();
        for _ in 0..3 {
            m.drop_disc(0, 0).unwrap();
            m.drop_disc(1, 6).unwrap();
        }
        m.drop_disc(0, 0).unwrap();
        assert_roundtrip(&m);
    }

    #[test]
    fn test_restore_fully_replaces_prior_state() {
        let mut target = model();
        target.drop_disc(0, 2).unwrap();
        target.drop_disc(1, 2).unwrap();

        let fresh = model();
        target.restore(&fresh.snapshot()).unwrap();
        assert_eq!(target.moves(), fresh.moves());
        assert_eq!(target.to_move(), 0);
        assert_eq!(target.cell(2, 0), None);
    }

    #[test]
    fn test_restore_missing_attribute_names_it() {
        let mut doc = model().snapshot();
        // Rebuild the document without `cells`.
        let mut stripped = Node::new("connect_four");
        for key in ["width", "height", "to_move", "winner", "drawn", "moves"] {
            stripped.set_attr(key, doc.attr(key).unwrap());
        }
        doc = stripped;

        let err = model().restore(&doc).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::MissingAttribute {
                node: "connect_four".to_string(),
                attr: "cells".to_string(),
            }
        );
    }

    #[test]
    fn test_restore_rejects_wrong_length_board() {
        let mut doc = model().snapshot();
        doc.set_int_array("cells", &[0, 1, -1]);
        assert!(matches!(
            model().restore(&doc),
            Err(SnapshotError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_controller_start_reads_config() {
        let controller = ConnectFourController::new();
        let mut config = TableConfig::new();
        config.set("width", "9");
        config.set("height", "7");

        let m = controller.start_game(1, &config).unwrap();
        let m = m.as_any().downcast_ref::<ConnectFourModel>().unwrap();
        assert_eq!((m.width(), m.height()), (9, 7));

        config.set("width", "2");
        assert!(matches!(
            controller.start_game(1, &config),
            Err(GameError::BadConfig(_))
        ));
    }

    #[test]
    fn test_controller_dispatch_path() {
        let controller = ConnectFourController::new();
        let mut m: Box<dyn GameModel> = Box::new(model());

        let policy = controller
            .apply(m.as_mut(), &ColumnDrop { column: 3 }.encode(), 0)
            .unwrap();
        assert_eq!(policy, EchoPolicy::Others);

        let err = controller
            .apply(m.as_mut(), &Envelope::new("go_pass"), 1)
            .unwrap_err();
        assert_eq!(err, GameError::UnknownMessageType("go_pass".to_string()));
    }

    proptest! {
        /// Any sequence of legal random drops round-trips exactly.
        #[test]
        fn prop_random_play_roundtrips(columns in proptest::collection::vec(0usize..DEFAULT_WIDTH, 0..42)) {
            let mut m = model();
            for column in columns {
                if m.is_over() {
                    break;
                }
                let _ = m.drop_disc(m.to_move(), column);
            }
            assert_roundtrip(&m);
        }
    }
}
