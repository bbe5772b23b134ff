use serde::{Deserialize, Serialize};

/// 8-bit RGB triple.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// One occupied cell. `locked = false` marks a cell belonging to the piece
/// currently in free fall; `locked = true` marks settled terrain.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Block {
    pub color: Color,
    pub locked: bool,
}

impl Block {
    pub const fn new(locked: bool, color: Color) -> Self {
        Self { color, locked }
    }
}

/// Fixed-size 2D field of optional blocks, addressed `[column][row]` with
/// y growing downward. Both the play field and the small per-piece bounding
/// boxes are `Grid`s, so stamping and collision share one representation.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Grid {
    cols: Vec<Vec<Option<Block>>>,
}

impl Grid {
    /// All cells empty.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cols: vec![vec![None; height]; width],
        }
    }

    /// Every cell set to a copy of `fill`.
    pub fn filled(width: usize, height: usize, fill: Block) -> Self {
        Self {
            cols: vec![vec![Some(fill); height]; width],
        }
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }

    pub fn height(&self) -> usize {
        self.cols.first().map_or(0, Vec::len)
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width() && (y as usize) < self.height()
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&Block> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.cols[x as usize][y as usize].as_ref()
    }

    pub fn set(&mut self, x: usize, y: usize, block: Option<Block>) {
        self.cols[x][y] = block;
    }

    /// Copy every occupied cell of `overlay` into this grid at offset
    /// `(x, y)`, but only where the target cell is in bounds and currently
    /// empty. Occupied and out-of-bounds targets are left untouched, so a
    /// partial overlap is not an error.
    pub fn stamp(&mut self, x: i32, y: i32, overlay: &Grid) {
        for (i, col) in overlay.cols.iter().enumerate() {
            for (j, cell) in col.iter().enumerate() {
                let (bx, by) = (x + i as i32, y + j as i32);
                if !self.in_bounds(bx, by) {
                    continue;
                }
                if self.cols[bx as usize][by as usize].is_none() {
                    if let Some(block) = cell {
                        self.cols[bx as usize][by as usize] = Some(*block);
                    }
                }
            }
        }
    }

    /// True if placing `overlay` at `(x, y)` would conflict. A conflict is
    /// an occupied overlay cell that falls out of bounds, or an unlocked
    /// overlay cell landing on locked terrain. Unlocked-on-unlocked never
    /// collides, which lets the falling piece and its ghost be re-stamped
    /// every tick over their own previous footprint.
    ///
    /// Origins past the far edges fail fast; negative origins are legal
    /// (wall kicks and vertical I placements need them) and are resolved
    /// per cell.
    pub fn collides(&self, x: i32, y: i32, overlay: &Grid) -> bool {
        if x >= self.width() as i32 || y >= self.height() as i32 {
            return true;
        }
        for (i, col) in overlay.cols.iter().enumerate() {
            for (j, cell) in col.iter().enumerate() {
                let (bx, by) = (x + i as i32, y + j as i32);
                let Some(over) = cell else { continue };
                if !self.in_bounds(bx, by) {
                    return true;
                }
                if let Some(base) = &self.cols[bx as usize][by as usize] {
                    if base.locked && !over.locked {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Apply `f` to the color of every occupied cell in place.
    pub fn recolor(&mut self, f: impl Fn(Color) -> Color) {
        for col in &mut self.cols {
            for cell in col.iter_mut() {
                if let Some(block) = cell {
                    block.color = f(block.color);
                }
            }
        }
    }

    /// Number of occupied cells, locked or not.
    pub fn occupied(&self) -> usize {
        self.cols
            .iter()
            .map(|col| col.iter().filter(|c| c.is_some()).count())
            .sum()
    }
}

/// "Over" alpha compositing of `ca` over `cb` with independent coverages.
pub fn apply_alpha(ca: Color, cb: Color, aa: f32, ab: f32) -> Color {
    let a = aa + ab * (1.0 - aa);
    let over = |c1: f32, c2: f32| (c1 * aa + c2 * ab * (1.0 - aa)) / a;
    let channel = |c1: u8, c2: u8| (255.0 * over(c1 as f32 / 255.0, c2 as f32 / 255.0)) as u8;
    Color::new(
        channel(ca.r, cb.r),
        channel(ca.g, cb.g),
        channel(ca.b, cb.b),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked(r: u8) -> Block {
        Block::new(false, Color::new(r, 0, 0))
    }

    fn locked(r: u8) -> Block {
        Block::new(true, Color::new(r, 0, 0))
    }

    #[test]
    fn stamp_fills_only_empty_cells() {
        let mut base = Grid::new(4, 4);
        base.set(1, 1, Some(locked(10)));
        let overlay = Grid::filled(2, 2, unlocked(200));

        base.stamp(0, 0, &overlay);

        // pre-existing cell untouched, empty neighbours filled
        assert_eq!(base.get(1, 1), Some(&locked(10)));
        assert_eq!(base.get(0, 0), Some(&unlocked(200)));
        assert_eq!(base.get(0, 1), Some(&unlocked(200)));
        assert_eq!(base.get(1, 0), Some(&unlocked(200)));
        assert_eq!(base.get(2, 2), None);
    }

    #[test]
    fn stamp_ignores_out_of_bounds_cells() {
        let mut base = Grid::new(3, 3);
        let overlay = Grid::filled(2, 2, unlocked(1));
        base.stamp(2, 2, &overlay);
        assert_eq!(base.occupied(), 1);
        assert!(base.get(2, 2).is_some());
    }

    #[test]
    fn collision_requires_locked_terrain() {
        let mut base = Grid::new(4, 4);
        base.set(1, 1, Some(unlocked(1)));
        let overlay = Grid::filled(1, 1, unlocked(2));
        // unlocked on unlocked never collides
        assert!(!base.collides(1, 1, &overlay));

        base.set(1, 1, Some(locked(1)));
        assert!(base.collides(1, 1, &overlay));

        // a locked overlay cell may pass over locked terrain
        let locked_overlay = Grid::filled(1, 1, locked(2));
        assert!(!base.collides(1, 1, &locked_overlay));
    }

    #[test]
    fn collision_at_bounds() {
        let base = Grid::new(4, 4);
        let overlay = Grid::filled(1, 1, unlocked(1));
        // origin past the far edge fails unconditionally
        assert!(base.collides(4, 0, &overlay));
        assert!(base.collides(0, 4, &overlay));
        // occupied overlay cell hanging off any side collides
        assert!(base.collides(-1, 0, &overlay));
        assert!(base.collides(0, -1, &overlay));
    }

    #[test]
    fn negative_origin_with_empty_leading_columns_is_legal() {
        let base = Grid::new(4, 4);
        // occupied cell sits in column 2 of the overlay, so origin -2 puts
        // it at column 0 of the base
        let mut overlay = Grid::new(3, 1);
        overlay.set(2, 0, Some(unlocked(1)));
        assert!(!base.collides(-2, 0, &overlay));
        assert!(base.collides(-3, 0, &overlay));
    }

    #[test]
    fn recolor_touches_every_occupied_cell() {
        let mut grid = Grid::new(2, 2);
        grid.set(0, 0, Some(unlocked(1)));
        grid.set(1, 1, Some(locked(2)));
        grid.recolor(|_| Color::new(9, 9, 9));
        assert_eq!(grid.get(0, 0).unwrap().color, Color::new(9, 9, 9));
        assert_eq!(grid.get(1, 1).unwrap().color, Color::new(9, 9, 9));
        assert!(grid.get(0, 1).is_none());
    }

    #[test]
    fn alpha_over_black() {
        // 80% white over opaque black
        let blended = apply_alpha(Color::new(255, 255, 255), Color::new(0, 0, 0), 0.8, 1.0);
        assert_eq!(blended, Color::new(204, 204, 204));
        // fully opaque top layer wins
        let solid = apply_alpha(Color::new(10, 20, 30), Color::new(200, 200, 200), 1.0, 1.0);
        assert_eq!(solid, Color::new(10, 20, 30));
    }
}
