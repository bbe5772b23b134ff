pub mod bag;
pub mod engine;
pub mod grid;
pub mod input;
pub mod matchmaker;
pub mod pieces;
pub mod protocol;
pub mod store;

/// Board dimensions shared by the server (board snapshots) and the client
/// engine. The play field is a 10x40 grid; only the bottom 20 rows are
/// visible, the 20 rows above absorb pieces before they scroll into view.
pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 40;
pub const VISIBLE_HEIGHT: usize = 20;
pub const HIDDEN_HEIGHT: usize = BOARD_HEIGHT - VISIBLE_HEIGHT;

/// Spawn position of a fresh piece: its bounding box straddles the seam
/// between the hidden rows and the visible field.
pub const SPAWN_X: i32 = 3;
pub const SPAWN_Y: i32 = 18;
