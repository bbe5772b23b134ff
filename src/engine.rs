use std::collections::VecDeque;

use crate::bag::Bag;
use crate::grid::{apply_alpha, Block, Color, Grid};
use crate::pieces::{self, Piece};
use crate::protocol::MatchSettings;
use crate::{BOARD_HEIGHT, BOARD_WIDTH, HIDDEN_HEIGHT, SPAWN_X, SPAWN_Y};

/// Keep at least this many pieces queued or requested ahead.
const QUEUE_TARGET: usize = 28;

const LOSS_COLOR: Color = Color::new(64, 64, 64);
const GHOST_BACKDROP: Color = Color::new(0, 0, 0);
const GHOST_ALPHA: f32 = 0.8;

/// Player inputs, already decoded from key bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Left,
    Right,
    RotateCw,
    RotateCcw,
    Rotate180,
    SoftDrop,
    HardDrop,
    Hold,
}

/// Side effects the driver must perform on the engine's behalf. Both are
/// fire-and-forget network calls: the tick loop never waits on them, and
/// bag responses must be fed back in request order.
#[derive(Clone, Debug)]
pub enum Effect {
    RequestBag,
    PushState { board: Grid, lost: bool },
}

/// The local falling-piece simulation. All timing is driven by absolute
/// millisecond timestamps supplied by the caller, mirroring the wall-clock
/// bookkeeping the gravity and lock-delay rules are defined in.
pub struct Engine {
    board: Grid,
    queue: VecDeque<Piece>,
    hold: Option<Piece>,
    held: bool,
    play_x: i32,
    play_y: i32,
    play_rot: u8,
    settings: MatchSettings,
    /// Active gravity interval: the level interval, or the soft-drop
    /// interval while soft drop is held.
    gravity_ms: f64,
    land_time: Option<u64>,
    last_gravity: u64,
    lost: bool,
    paused: bool,
    pause_time: u64,
    active: bool,
    locks: u32,
    lines: u32,
    started_at: u64,
    bags_in_flight: usize,
    effects: Vec<Effect>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let settings = MatchSettings::default();
        Self {
            board: Grid::new(BOARD_WIDTH, BOARD_HEIGHT),
            queue: VecDeque::new(),
            hold: None,
            held: false,
            play_x: SPAWN_X,
            play_y: SPAWN_Y,
            play_rot: 0,
            gravity_ms: settings.gravity,
            settings,
            land_time: None,
            last_gravity: 0,
            lost: false,
            paused: false,
            pause_time: 0,
            active: false,
            locks: 0,
            lines: 0,
            started_at: 0,
            bags_in_flight: 0,
            effects: Vec::new(),
        }
    }

    /// Reset to a fresh game with the given settings and begin prefetching
    /// bags. Ticking only has an effect once at least one bag has arrived.
    pub fn start(&mut self, settings: MatchSettings, now: u64) {
        self.board = Grid::new(BOARD_WIDTH, BOARD_HEIGHT);
        self.queue.clear();
        self.hold = None;
        self.held = false;
        self.play_x = SPAWN_X;
        self.play_y = SPAWN_Y;
        self.play_rot = 0;
        self.gravity_ms = settings.gravity;
        self.settings = settings;
        self.land_time = None;
        self.last_gravity = now;
        self.lost = false;
        self.paused = false;
        self.pause_time = now;
        self.active = true;
        self.locks = 0;
        self.lines = 0;
        self.started_at = now;
        self.bags_in_flight = 0;
        self.maybe_request_bags();
    }

    /// Restart with the settings from the previous start (server `reset`).
    pub fn restart(&mut self, now: u64) {
        self.start(self.settings, now);
    }

    /// Stop ticking entirely; `start` brings the engine back.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Append a bag received from the server. Unknown piece ids are
    /// dropped rather than trusted.
    pub fn push_bag(&mut self, bag: Bag) {
        self.bags_in_flight = self.bags_in_flight.saturating_sub(1);
        self.queue
            .extend(bag.iter().filter_map(|&id| Piece::from_id(id)));
    }

    pub fn board(&self) -> &Grid {
        &self.board
    }

    pub fn hold_piece_kind(&self) -> Option<Piece> {
        self.hold
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn lost(&self) -> bool {
        self.lost
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn locks(&self) -> u32 {
        self.locks
    }

    /// Pieces locked per second since the game started.
    pub fn pps(&self, now: u64) -> f64 {
        let elapsed = now.saturating_sub(self.started_at) as f64 / 1000.0;
        if elapsed > 0.0 {
            self.locks as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Queued effects since the last drain, in the order they were raised.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Run one update cycle: apply gravity (and any resulting lock), then
    /// stamp the ghost. No-op while lost, paused, or out of pieces.
    pub fn tick(&mut self, now: u64) {
        if !self.running() || self.queue.is_empty() {
            return;
        }
        self.do_gravity(now);
        self.place_ghost();
    }

    /// Apply one decoded input. `down` is the key edge; most actions only
    /// respond to presses, soft drop tracks both edges.
    pub fn apply(&mut self, action: Action, down: bool, now: u64) {
        if !self.running() || self.queue.is_empty() {
            return;
        }
        match action {
            Action::Left if down => self.shift(-1),
            Action::Right if down => self.shift(1),
            Action::RotateCw if down => {
                self.rotate(1);
            }
            Action::RotateCcw if down => {
                self.rotate(3);
            }
            Action::Rotate180 if down => {
                // two kicked quarter turns; a failed first step aborts
                if self.rotate(1) {
                    self.rotate(1);
                }
            }
            Action::SoftDrop => self.set_soft_drop(down, now),
            Action::HardDrop if down => self.hard_drop(now),
            Action::Hold if down => self.hold_current(now),
            _ => {}
        }
    }

    /// Shift timers across a pause so resuming does not replay the gap as
    /// a burst of catch-up gravity.
    pub fn pause(&mut self, paused: bool, now: u64) {
        self.paused = paused;
        if paused {
            self.pause_time = now;
        } else {
            let gap = now.saturating_sub(self.pause_time);
            self.last_gravity += gap;
            self.started_at += gap;
        }
    }

    fn running(&self) -> bool {
        self.active && !self.lost && !self.paused
    }

    fn current_piece(&self) -> Option<Piece> {
        self.queue.front().copied()
    }

    fn piece_grid(&self, rot: u8) -> Option<Grid> {
        self.current_piece().map(|p| pieces::shape(p, rot))
    }

    /// Issue bag requests until queued plus in-flight pieces reach the
    /// prefetch target.
    fn maybe_request_bags(&mut self) {
        while self.queue.len() + self.bags_in_flight * 7 < QUEUE_TARGET {
            self.effects.push(Effect::RequestBag);
            self.bags_in_flight += 1;
        }
    }

    /// Remove the in-flight piece and ghost from the board (`lock` false),
    /// or commit every free-falling cell as terrain (`lock` true).
    fn clear_play(&mut self, lock: bool) {
        for x in 0..BOARD_WIDTH {
            for y in 0..BOARD_HEIGHT {
                if let Some(block) = self.board.get(x as i32, y as i32) {
                    if !block.locked {
                        let cell = if lock {
                            Some(Block::new(true, block.color))
                        } else {
                            None
                        };
                        self.board.set(x, y, cell);
                    }
                }
            }
        }
    }

    fn stamp_play(&mut self) {
        if let Some(piece) = self.piece_grid(self.play_rot) {
            self.board.stamp(self.play_x, self.play_y, &piece);
        }
    }

    /// Lowest y the current piece can occupy without collision, scanning
    /// down from its present position; `max` caps the scan for gravity.
    fn drop_play(&mut self, max: Option<i32>) -> i32 {
        let Some(piece) = self.piece_grid(self.play_rot) else {
            return self.play_y;
        };
        let max_y = max.map_or(BOARD_HEIGHT as i32, |m| m + 1);
        for y in self.play_y..max_y {
            if self.board.collides(self.play_x, y, &piece) {
                return y - 1;
            }
        }
        max_y - 1
    }

    fn reset_piece(&mut self, now: u64) {
        self.play_x = SPAWN_X;
        self.play_y = SPAWN_Y;
        self.play_rot = 0;
        self.land_time = None;
        self.last_gravity = now;
        self.held = false;
    }

    /// Advance to the next queued piece, topping the queue back up.
    fn next_piece(&mut self, now: u64) {
        self.reset_piece(now);
        self.queue.pop_front();
        self.maybe_request_bags();
    }

    /// Commit the current piece: lock its cells, clear lines, check for
    /// loss, then spawn the next piece and report the board upstream.
    fn lock_play(&mut self, now: u64) {
        self.stamp_play();
        self.clear_play(true);
        self.clear_lines();

        // loss iff any settled cell sits in the hidden rows above the field
        let probe = Grid::filled(
            BOARD_WIDTH,
            HIDDEN_HEIGHT,
            Block::new(false, Color::new(0, 0, 0)),
        );
        if self.board.collides(0, 0, &probe) {
            self.lost = true;
            self.board.recolor(|_| LOSS_COLOR);
        } else {
            self.locks += 1;
            self.next_piece(now);
        }
        self.effects.push(Effect::PushState {
            board: self.board.clone(),
            lost: self.lost,
        });
    }

    /// Single top-to-bottom sweep: full rows are cleared by copying every
    /// row above them down one. All simultaneously full rows are caught in
    /// the one pass; rows that only fill up because of the shift are not
    /// re-checked until the next lock.
    fn clear_lines(&mut self) {
        for row in 0..BOARD_HEIGHT {
            let full = (0..BOARD_WIDTH).all(|col| self.board.get(col as i32, row as i32).is_some());
            if !full {
                continue;
            }
            self.lines += 1;
            for r in (1..=row).rev() {
                for c in 0..BOARD_WIDTH {
                    let above = self.board.get(c as i32, r as i32 - 1).copied();
                    self.board.set(c, r, above);
                }
            }
            for c in 0..BOARD_WIDTH {
                self.board.set(c, 0, None);
            }
        }
    }

    /// Move every whole gravity interval owed since the last application,
    /// then run the lock-delay bookkeeping if the piece is grounded.
    fn do_gravity(&mut self, now: u64) {
        self.clear_play(false);

        // settings come off the wire untrusted: a zero or non-finite
        // interval must not blow up the debt; one board height per pass
        // is the most any drop can use
        let elapsed = now.saturating_sub(self.last_gravity) as f64;
        let debt = (elapsed / self.gravity_ms).min(BOARD_HEIGHT as f64) as i32;
        if debt >= 1 {
            let new_y = self.drop_play(Some(self.play_y + debt));
            self.last_gravity = now;

            if new_y > self.play_y {
                self.land_time = None;
                self.play_y = new_y;
            } else if let Some(landed) = self.land_time {
                if now.saturating_sub(landed) >= self.settings.lock_delay as u64 {
                    self.lock_play(now);
                }
            } else {
                self.land_time = Some(now);
            }
        }

        self.stamp_play();
    }

    /// Stamp a translucent copy of the piece at its landing row. Ghost
    /// cells are unlocked, so they are swept together with the piece at
    /// the start of the next gravity pass and never reach a lock.
    fn place_ghost(&mut self) {
        let Some(piece) = self.current_piece() else {
            return;
        };
        let mut ghost = pieces::shape(piece, self.play_rot);
        ghost.recolor(|color| apply_alpha(color, GHOST_BACKDROP, GHOST_ALPHA, 1.0));
        let y = self.drop_play(None);
        self.board.stamp(self.play_x, y, &ghost);
    }

    fn shift(&mut self, dx: i32) {
        let Some(piece) = self.piece_grid(self.play_rot) else {
            return;
        };
        if !self.board.collides(self.play_x + dx, self.play_y, &piece) {
            self.play_x += dx;
        }
    }

    /// Kicked rotation: try each table offset in order and commit the
    /// first collision-free candidate. Returns whether the piece rotated.
    fn rotate(&mut self, drot: u8) -> bool {
        let Some(piece) = self.current_piece() else {
            return false;
        };
        let to = (self.play_rot + drot) % 4;
        let target = pieces::shape(piece, to);
        for &(dx, dy) in pieces::kick_data(piece, self.play_rot, to) {
            let (kx, ky) = (self.play_x + dx, self.play_y + dy);
            if !self.board.collides(kx, ky, &target) {
                self.play_x = kx;
                self.play_y = ky;
                self.play_rot = to;
                return true;
            }
        }
        false
    }

    /// Swap the active gravity interval, rescaling the time already spent
    /// toward the next drop so the switch neither stalls nor double-counts.
    fn set_soft_drop(&mut self, down: bool, now: u64) {
        let old = self.gravity_ms;
        self.gravity_ms = if down {
            self.settings.soft_drop_speed
        } else {
            self.settings.gravity
        };
        // degenerate intervals make the ratio meaningless; restart the
        // interval instead of rescaling
        if !(old.is_finite() && old > 0.0 && self.gravity_ms.is_finite()) {
            self.last_gravity = now;
            return;
        }
        let coef = self.gravity_ms / old;
        let scaled = (now.saturating_sub(self.last_gravity)) as f64 * coef;
        self.last_gravity = now.saturating_sub(scaled.round() as u64);
    }

    /// Teleport to the landing row and lock immediately, skipping the
    /// lock delay.
    fn hard_drop(&mut self, now: u64) {
        self.play_y = self.drop_play(None);
        self.clear_play(false);
        self.lock_play(now);
    }

    /// Stash the current piece, at most once per spawn. With an empty hold
    /// slot the next queued piece takes over; otherwise the held piece and
    /// the active piece swap, back at spawn position.
    fn hold_current(&mut self, now: u64) {
        if self.held {
            return;
        }
        let Some(current) = self.current_piece() else {
            return;
        };
        match self.hold {
            None => {
                self.hold = Some(current);
                self.next_piece(now);
            }
            Some(held) => {
                self.hold = Some(current);
                if let Some(front) = self.queue.front_mut() {
                    *front = held;
                }
                self.reset_piece(now);
            }
        }
        self.held = true;
    }
}
