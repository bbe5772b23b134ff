use serde::{Deserialize, Serialize};

use crate::grid::{Block, Color, Grid};

/// The seven tetromino kinds. Wire ids are the declaration order 0..6.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Piece {
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
}

impl Piece {
    pub fn all() -> [Piece; 7] {
        [
            Piece::I,
            Piece::J,
            Piece::L,
            Piece::O,
            Piece::S,
            Piece::T,
            Piece::Z,
        ]
    }

    pub fn id(self) -> u8 {
        match self {
            Piece::I => 0,
            Piece::J => 1,
            Piece::L => 2,
            Piece::O => 3,
            Piece::S => 4,
            Piece::T => 5,
            Piece::Z => 6,
        }
    }

    /// Ids outside 0..6 come from untrusted payloads and map to `None`.
    pub fn from_id(id: u8) -> Option<Piece> {
        Piece::all().get(id as usize).copied()
    }

    pub fn color(self) -> Color {
        match self {
            Piece::I => Color::new(0, 255, 255),
            Piece::J => Color::new(0, 0, 255),
            Piece::L => Color::new(255, 170, 0),
            Piece::O => Color::new(255, 255, 0),
            Piece::S => Color::new(0, 255, 0),
            Piece::T => Color::new(153, 0, 254),
            Piece::Z => Color::new(255, 0, 0),
        }
    }

    /// Side length of the piece's bounding box.
    fn box_size(self) -> usize {
        match self {
            Piece::I => 4,
            _ => 3,
        }
    }
}

type Cells = [(usize, usize); 4];

// Per-rotation occupied cells as (column, row) inside the bounding box.
const I_CELLS: [Cells; 4] = [
    [(0, 1), (1, 1), (2, 1), (3, 1)],
    [(2, 0), (2, 1), (2, 2), (2, 3)],
    [(0, 2), (1, 2), (2, 2), (3, 2)],
    [(1, 0), (1, 1), (1, 2), (1, 3)],
];
const J_CELLS: [Cells; 4] = [
    [(1, 1), (0, 0), (0, 1), (2, 1)],
    [(1, 1), (1, 0), (2, 0), (1, 2)],
    [(1, 1), (0, 1), (2, 1), (2, 2)],
    [(1, 1), (1, 0), (0, 2), (1, 2)],
];
const L_CELLS: [Cells; 4] = [
    [(1, 1), (2, 0), (0, 1), (2, 1)],
    [(1, 1), (1, 0), (2, 2), (1, 2)],
    [(1, 1), (0, 1), (2, 1), (0, 2)],
    [(1, 1), (1, 0), (0, 0), (1, 2)],
];
const O_CELLS: [Cells; 4] = [
    [(1, 0), (2, 0), (1, 1), (2, 1)],
    [(1, 0), (2, 0), (1, 1), (2, 1)],
    [(1, 0), (2, 0), (1, 1), (2, 1)],
    [(1, 0), (2, 0), (1, 1), (2, 1)],
];
const S_CELLS: [Cells; 4] = [
    [(1, 1), (1, 0), (2, 0), (0, 1)],
    [(1, 1), (1, 0), (2, 1), (2, 2)],
    [(1, 1), (0, 2), (1, 2), (2, 1)],
    [(1, 1), (0, 0), (0, 1), (1, 2)],
];
const T_CELLS: [Cells; 4] = [
    [(1, 1), (1, 0), (0, 1), (2, 1)],
    [(1, 1), (1, 0), (2, 1), (1, 2)],
    [(1, 1), (0, 1), (2, 1), (1, 2)],
    [(1, 1), (1, 0), (0, 1), (1, 2)],
];
const Z_CELLS: [Cells; 4] = [
    [(1, 1), (0, 0), (1, 0), (2, 1)],
    [(1, 1), (2, 0), (2, 1), (1, 2)],
    [(1, 1), (0, 1), (2, 2), (1, 2)],
    [(1, 1), (1, 0), (0, 1), (0, 2)],
];

/// Build the bounding-box grid for a piece in a given rotation state. Cells
/// are unlocked and pre-colored, ready to stamp onto a board.
pub fn shape(piece: Piece, rot: u8) -> Grid {
    let cells = match piece {
        Piece::I => &I_CELLS,
        Piece::J => &J_CELLS,
        Piece::L => &L_CELLS,
        Piece::O => &O_CELLS,
        Piece::S => &S_CELLS,
        Piece::T => &T_CELLS,
        Piece::Z => &Z_CELLS,
    };
    let size = piece.box_size();
    let block = Block::new(false, piece.color());
    let mut grid = Grid::new(size, size);
    for &(col, row) in &cells[(rot % 4) as usize] {
        grid.set(col, row, Some(block));
    }
    grid
}

// Guideline SRS wall-kick offsets, indexed by (from, to) rotation pair.
// Offsets are applied as (dx, dy) with y growing downward, matching the
// board coordinates.
const JLSTZ_KICKS: [[(i32, i32); 5]; 8] = [
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // 0->1
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // 1->0
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // 1->2
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // 2->1
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // 2->3
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // 3->2
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // 3->0
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // 0->3
];
const I_KICKS: [[(i32, i32); 5]; 8] = [
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // 0->1
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // 1->0
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // 1->2
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // 2->1
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // 2->3
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // 3->2
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // 3->0
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // 0->3
];
const O_KICKS: [(i32, i32); 1] = [(0, 0)];

/// Candidate kick offsets for rotating `piece` from one rotation state to an
/// adjacent one, in the order they must be tried. Non-adjacent transitions
/// have no table entry and yield an empty slice (the rotation is rejected;
/// 180s are performed as two kicked quarter turns).
pub fn kick_data(piece: Piece, from: u8, to: u8) -> &'static [(i32, i32)] {
    let idx = match (from % 4, to % 4) {
        (0, 1) => 0,
        (1, 0) => 1,
        (1, 2) => 2,
        (2, 1) => 3,
        (2, 3) => 4,
        (3, 2) => 5,
        (3, 0) => 6,
        (0, 3) => 7,
        _ => return &[],
    };
    match piece {
        Piece::I => &I_KICKS[idx],
        Piece::O => &O_KICKS,
        _ => &JLSTZ_KICKS[idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADJACENT: [(u8, u8); 8] = [
        (0, 1),
        (1, 0),
        (1, 2),
        (2, 1),
        (2, 3),
        (3, 2),
        (3, 0),
        (0, 3),
    ];

    #[test]
    fn every_shape_has_four_cells() {
        for piece in Piece::all() {
            for rot in 0..4 {
                let grid = shape(piece, rot);
                assert_eq!(grid.occupied(), 4, "{piece:?} rot {rot}");
                assert_eq!(grid.width(), piece.box_size());
            }
        }
    }

    #[test]
    fn shape_cells_are_unlocked_and_piece_colored() {
        for piece in Piece::all() {
            let grid = shape(piece, 0);
            for x in 0..grid.width() as i32 {
                for y in 0..grid.height() as i32 {
                    if let Some(block) = grid.get(x, y) {
                        assert!(!block.locked);
                        assert_eq!(block.color, piece.color());
                    }
                }
            }
        }
    }

    #[test]
    fn colors_are_globally_unique() {
        let colors: Vec<_> = Piece::all().iter().map(|p| p.color()).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn ids_round_trip() {
        for piece in Piece::all() {
            assert_eq!(Piece::from_id(piece.id()), Some(piece));
        }
        assert_eq!(Piece::from_id(7), None);
    }

    #[test]
    fn kick_tables_cover_all_adjacent_transitions() {
        for piece in Piece::all() {
            for (from, to) in ADJACENT {
                let kicks = kick_data(piece, from, to);
                assert!(!kicks.is_empty(), "{piece:?} {from}->{to}");
                assert_eq!(kicks[0], (0, 0));
            }
        }
    }

    #[test]
    fn non_adjacent_transitions_have_no_kicks() {
        for piece in Piece::all() {
            assert!(kick_data(piece, 0, 2).is_empty());
            assert!(kick_data(piece, 1, 3).is_empty());
            assert!(kick_data(piece, 2, 2).is_empty());
        }
    }

    #[test]
    fn kicks_match_srs_reference() {
        assert_eq!(
            kick_data(Piece::J, 0, 1),
            &[(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)]
        );
        assert_eq!(
            kick_data(Piece::I, 0, 1),
            &[(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)]
        );
        assert_eq!(kick_data(Piece::O, 2, 3), &[(0, 0)]);
    }
}
