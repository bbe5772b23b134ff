use rand::thread_rng;
use tokio::sync::mpsc::UnboundedSender;

use crate::bag::{random_bag, seven_bag, Bag};
use crate::grid::Grid;
use crate::protocol::{MatchSettings, PlayerSnapshot, ServerMessage, StateUpdate, UpdateEvent};
use crate::store::Store;
use crate::{BOARD_HEIGHT, BOARD_WIDTH};

/// Outbound handle for one connection. The transport owns the socket; the
/// player record only holds this weak-ish back-reference, and a send to a
/// closed channel is ignored (the disconnect handler will clean up).
pub type Conn = UnboundedSender<ServerMessage>;

/// Authoritative per-match record.
#[derive(Debug)]
pub struct MatchRecord {
    pub bags: Vec<Bag>,
    pub seven_bag: bool,
    pub started: bool,
    pub paused: bool,
}

impl Default for MatchRecord {
    fn default() -> Self {
        Self {
            bags: Vec::new(),
            seven_bag: true,
            started: false,
            paused: false,
        }
    }
}

/// Per-connection record.
pub struct PlayerRecord {
    pub username: String,
    pub match_id: String,
    pub host: bool,
    pub board: Grid,
    pub lost: bool,
    pub bag_count: usize,
    pub conn: Option<Conn>,
}

/// Authoritative match/player state plus the operations the transport layer
/// dispatches into. Each operation runs to completion; the server binary
/// serializes calls behind one mutex, which is what keeps the
/// read-modify-write sequences (bag generation, all-lost reset) race-free.
#[derive(Default)]
pub struct Matchmaker {
    matches: Store<MatchRecord>,
    players: Store<PlayerRecord>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn match_exists(&self, match_id: &str) -> bool {
        self.matches.get(match_id).is_some()
    }

    /// Register a player in a match. The first player into an empty match
    /// becomes host; the match record is created on demand with default
    /// settings. Returns whether the caller is host.
    pub fn join(&mut self, player_id: &str, match_id: &str, username: &str) -> bool {
        let host = self.players.count_where(|p| p.match_id == match_id) == 0;
        self.players.insert(
            player_id,
            PlayerRecord {
                username: username.to_string(),
                match_id: match_id.to_string(),
                host,
                board: Grid::new(BOARD_WIDTH, BOARD_HEIGHT),
                lost: false,
                bag_count: 0,
                conn: None,
            },
        );
        if self.matches.get(match_id).is_none() {
            self.matches.insert(match_id, MatchRecord::default());
        }
        host
    }

    /// Hand out the next bag for the calling player. Bags are cached per
    /// match: if the player's next index was already generated (by another
    /// player running ahead) the stored bag is returned verbatim, so every
    /// player sees an identical sequence. Advances the player's cursor.
    pub fn request_bag(&mut self, player_id: &str) -> Option<Bag> {
        let player = self.players.get(player_id)?;
        let match_id = player.match_id.clone();
        let index = player.bag_count + 1;

        if let Some(player) = self.players.get_mut(player_id) {
            player.bag_count = index;
        }

        let record = self.matches.get_mut(&match_id)?;
        let bag = if index > record.bags.len() {
            let bag = if record.seven_bag {
                seven_bag(&mut thread_rng())
            } else {
                random_bag(&mut thread_rng())
            };
            record.bags.push(bag);
            bag
        } else {
            record.bags[index - 1]
        };
        Some(bag)
    }

    /// Apply a board/loss or username update, fan it out to the match room,
    /// and reset the match if every player in it has now lost.
    pub fn update_state(&mut self, player_id: &str, update: StateUpdate) {
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        match update {
            StateUpdate::Match { board, lost } => {
                player.board = board;
                player.lost = lost;
            }
            StateUpdate::Username { username } => {
                player.username = username;
            }
        }
        let match_id = player.match_id.clone();
        let event = UpdateEvent::Update {
            player: player_id.to_string(),
            board: player.board.clone(),
            username: player.username.clone(),
            lost: player.lost,
        };
        self.broadcast(&match_id, ServerMessage::Update { event });

        let all_lost = self
            .players
            .filter(|p| p.match_id == match_id)
            .all(|(_, p)| p.lost);
        if all_lost {
            self.reset_match(&match_id);
            self.broadcast(&match_id, ServerMessage::Reset);
        }
    }

    /// Start (or restart) the match. Host-only; non-host calls are silent
    /// no-ops. Resets all per-match progress, applies the global settings
    /// and announces `start` to the room.
    pub fn start_match(&mut self, player_id: &str, settings: MatchSettings) {
        let Some(player) = self.players.get(player_id) else {
            return;
        };
        if !player.host {
            return;
        }
        let match_id = player.match_id.clone();
        self.reset_match(&match_id);
        if let Some(record) = self.matches.get_mut(&match_id) {
            record.seven_bag = settings.seven_bag;
            record.started = true;
            record.paused = false;
        }
        self.broadcast(&match_id, ServerMessage::Start { settings });
    }

    /// Toggle the paused flag. Host-only and only once started.
    pub fn pause_match(&mut self, player_id: &str) {
        let Some(player) = self.players.get(player_id) else {
            return;
        };
        if !player.host {
            return;
        }
        let match_id = player.match_id.clone();
        let paused = match self.matches.get_mut(&match_id) {
            Some(record) if record.started => {
                record.paused = !record.paused;
                record.paused
            }
            _ => return,
        };
        self.broadcast(&match_id, ServerMessage::Pause { paused });
    }

    /// Transport-level join: attach the live connection, send the caller a
    /// snapshot of everyone in the match and announce the arrival.
    pub fn connect(&mut self, player_id: &str, conn: Conn) {
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        player.conn = Some(conn.clone());
        let match_id = player.match_id.clone();
        let username = player.username.clone();

        let players = self
            .players
            .filter(|p| p.match_id == match_id)
            .map(|(id, p)| {
                (
                    id.clone(),
                    PlayerSnapshot {
                        board: p.board.clone(),
                        username: p.username.clone(),
                    },
                )
            })
            .collect();
        let _ = conn.send(ServerMessage::Update {
            event: UpdateEvent::Init { players },
        });
        self.broadcast(
            &match_id,
            ServerMessage::Update {
                event: UpdateEvent::Join {
                    player: player_id.to_string(),
                    username,
                },
            },
        );
    }

    /// Remove a departing player, drop the match when it empties, and hand
    /// the host flag to an arbitrary remaining player if the host left.
    pub fn disconnect(&mut self, player_id: &str) {
        let Some(player) = self.players.remove(player_id) else {
            return;
        };
        let match_id = player.match_id;

        let remaining = self.players.keys_where(|p| p.match_id == match_id);
        if remaining.is_empty() {
            self.matches.remove(&match_id);
        }

        self.broadcast(
            &match_id,
            ServerMessage::Update {
                event: UpdateEvent::Leave {
                    player: player_id.to_string(),
                },
            },
        );

        if player.host {
            if let Some(new_host) = remaining.first() {
                if let Some(record) = self.players.get_mut(new_host) {
                    record.host = true;
                    if let Some(conn) = &record.conn {
                        let _ = conn.send(ServerMessage::Update {
                            event: UpdateEvent::GiveHost,
                        });
                    }
                }
            }
        }
    }

    /// Clear generated bags and per-player progress, returning the match to
    /// its waiting state. Settings survive; they are reapplied on start.
    fn reset_match(&mut self, match_id: &str) {
        if let Some(record) = self.matches.get_mut(match_id) {
            record.bags.clear();
            record.started = false;
        }
        self.players.update_where(
            |p| p.match_id == match_id,
            |p| {
                p.board = Grid::new(BOARD_WIDTH, BOARD_HEIGHT);
                p.lost = false;
                p.bag_count = 0;
            },
        );
    }

    fn broadcast(&self, match_id: &str, msg: ServerMessage) {
        for (_, player) in self.players.filter(|p| p.match_id == match_id) {
            if let Some(conn) = &player.conn {
                let _ = conn.send(msg.clone());
            }
        }
    }

    #[cfg(test)]
    fn player(&self, player_id: &str) -> &PlayerRecord {
        self.players.get(player_id).expect("player record")
    }
}
