//! Tic-tac-toe board and win detection.

use std::fmt;

use thiserror::Error;
use turnstile_proto::PlayerSlot;

/// Side length of the board.
pub const BOARD_SIZE: usize = 3;

/// Content of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Symbol {
    /// Nobody has played here
    #[default]
    Empty,
    /// Player one's mark
    Nought,
    /// Player two's mark
    Cross,
}

impl Symbol {
    /// Mark placed by `slot`.
    pub fn of(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::One => Self::Nought,
            PlayerSlot::Two => Self::Cross,
        }
    }

    /// Seat owning this mark.
    pub fn owner(self) -> Option<PlayerSlot> {
        match self {
            Self::Empty => None,
            Self::Nought => Some(PlayerSlot::One),
            Self::Cross => Some(PlayerSlot::Two),
        }
    }

    fn glyph(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Nought => 'O',
            Self::Cross => 'X',
        }
    }
}

/// Why a move was refused. The board is unchanged in both cases.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// Coordinates outside `0..BOARD_SIZE`
    #[error("cell ({row}, {col}) is off the board")]
    OutOfRange {
        /// Requested row
        row: i64,
        /// Requested column
        col: i64,
    },

    /// Cell already holds a mark
    #[error("cell ({row}, {col}) is already taken")]
    Occupied {
        /// Row of the taken cell
        row: usize,
        /// Column of the taken cell
        col: usize,
    },
}

/// Board evaluation after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The given mark completed a line
    Win(Symbol),
    /// Board is full with no line
    Draw,
    /// Play goes on
    Continue,
}

/// 3x3 grid of [`Symbol`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Symbol; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every cell.
    pub fn reset(&mut self) {
        self.cells = Default::default();
    }

    /// Cell content, or `None` off the board.
    pub fn get(&self, row: usize, col: usize) -> Option<Symbol> {
        self.cells.get(row).and_then(|cells| cells.get(col)).copied()
    }

    /// Mark an empty cell. Returns the validated coordinates.
    pub fn place(&mut self, row: i64, col: i64, symbol: Symbol) -> Result<(usize, usize), MoveError> {
        let cell = usize::try_from(row)
            .ok()
            .zip(usize::try_from(col).ok())
            .filter(|&(r, c)| r < BOARD_SIZE && c < BOARD_SIZE);
        let Some((r, c)) = cell else {
            return Err(MoveError::OutOfRange { row, col });
        };

        let slot = &mut self.cells[r][c];
        if *slot != Symbol::Empty {
            return Err(MoveError::Occupied { row: r, col: c });
        }
        *slot = symbol;
        Ok((r, c))
    }

    /// Number of marked cells.
    pub fn marked(&self) -> usize {
        self.cells.iter().flatten().filter(|&&s| s != Symbol::Empty).count()
    }

    /// Whether every cell is marked.
    pub fn is_full(&self) -> bool {
        self.marked() == BOARD_SIZE * BOARD_SIZE
    }

    /// Evaluate the board after a move at `(row, col)`.
    ///
    /// Checks that move's row and column plus both diagonals for the mover's
    /// mark, then falls back to a draw if the board is full.
    pub fn evaluate(&self, row: usize, col: usize) -> Verdict {
        let symbol = match self.get(row, col) {
            Some(Symbol::Empty) | None => return self.fallback(),
            Some(symbol) => symbol,
        };

        let owns = |r: usize, c: usize| self.cells[r][c] == symbol;
        let lines = [
            (0..BOARD_SIZE).all(|c| owns(row, c)),
            (0..BOARD_SIZE).all(|r| owns(r, col)),
            (0..BOARD_SIZE).all(|i| owns(i, i)),
            (0..BOARD_SIZE).all(|i| owns(i, BOARD_SIZE - 1 - i)),
        ];

        if lines.contains(&true) { Verdict::Win(symbol) } else { self.fallback() }
    }

    fn fallback(&self) -> Verdict {
        if self.is_full() { Verdict::Draw } else { Verdict::Continue }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            for cell in row {
                write!(f, "{}", cell.glyph())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(moves: &[(i64, i64, Symbol)]) -> Board {
        let mut board = Board::new();
        for &(row, col, symbol) in moves {
            board.place(row, col, symbol).unwrap();
        }
        board
    }

    #[test]
    fn row_win() {
        let b = board(&[(1, 0, Symbol::Cross), (1, 1, Symbol::Cross), (1, 2, Symbol::Cross)]);
        assert_eq!(b.evaluate(1, 2), Verdict::Win(Symbol::Cross));
    }

    #[test]
    fn column_win() {
        let b = board(&[(0, 2, Symbol::Nought), (1, 2, Symbol::Nought), (2, 2, Symbol::Nought)]);
        assert_eq!(b.evaluate(0, 2), Verdict::Win(Symbol::Nought));
    }

    #[test]
    fn main_diagonal_win_on_last_corner() {
        let mut b = Board::new();
        b.place(0, 0, Symbol::Nought).unwrap();
        b.place(1, 1, Symbol::Nought).unwrap();
        assert_eq!(b.evaluate(1, 1), Verdict::Continue);

        let (row, col) = b.place(2, 2, Symbol::Nought).unwrap();
        assert_eq!(b.evaluate(row, col), Verdict::Win(Symbol::Nought));
    }

    #[test]
    fn anti_diagonal_win() {
        let b = board(&[(0, 2, Symbol::Nought), (1, 1, Symbol::Nought), (2, 0, Symbol::Nought)]);
        assert_eq!(b.evaluate(2, 0), Verdict::Win(Symbol::Nought));
    }

    #[test]
    fn diagonals_are_checked_from_any_cell() {
        // The last move is off the diagonal but the mover already owns it
        let b = board(&[
            (0, 0, Symbol::Nought),
            (1, 1, Symbol::Nought),
            (2, 2, Symbol::Nought),
            (0, 1, Symbol::Nought),
        ]);
        assert_eq!(b.evaluate(0, 1), Verdict::Win(Symbol::Nought));
    }

    #[test]
    fn full_board_without_line_is_draw() {
        use Symbol::{Cross as X, Nought as O};
        let b = board(&[
            (0, 0, O),
            (0, 1, X),
            (0, 2, O),
            (1, 0, O),
            (1, 1, X),
            (1, 2, X),
            (2, 0, X),
            (2, 1, O),
            (2, 2, O),
        ]);
        assert_eq!(b.to_string(), "OXO/OXX/XOO");
        assert_eq!(b.evaluate(2, 2), Verdict::Draw);
    }

    #[test]
    fn open_board_continues() {
        let b = board(&[(0, 0, Symbol::Nought), (1, 1, Symbol::Cross)]);
        assert_eq!(b.evaluate(1, 1), Verdict::Continue);
    }

    #[test]
    fn illegal_moves_leave_board_unchanged() {
        let mut b = board(&[(0, 0, Symbol::Nought)]);
        let before = b.clone();

        assert_eq!(b.place(3, 0, Symbol::Cross), Err(MoveError::OutOfRange { row: 3, col: 0 }));
        assert_eq!(b.place(0, -1, Symbol::Cross), Err(MoveError::OutOfRange { row: 0, col: -1 }));
        assert_eq!(b.place(0, 0, Symbol::Cross), Err(MoveError::Occupied { row: 0, col: 0 }));
        assert_eq!(b, before);
    }

    #[test]
    fn symbols_map_to_seats() {
        assert_eq!(Symbol::of(PlayerSlot::One).owner(), Some(PlayerSlot::One));
        assert_eq!(Symbol::of(PlayerSlot::Two).owner(), Some(PlayerSlot::Two));
        assert_eq!(Symbol::Empty.owner(), None);
    }
}
