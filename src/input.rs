/// Key binding and autorepeat bookkeeping. The driver feeds raw key edges
/// in as they happen and polls once per frame; polling converts held keys
/// into repeated action firings from wall time alone, so a stalled frame
/// loop catches up on repeats the same way gravity catches up on drops.

#[derive(Debug, Default)]
struct KeyState {
    down: bool,
    /// Whether the initial repeat delay has elapsed and the key is now
    /// repeating at the repeat interval.
    repeating: bool,
    when_down: Option<u64>,
    last_action: u64,
    /// Firings owed to the consumer and not yet polled.
    pending: u32,
}

struct Binding<A> {
    key: String,
    action: A,
    auto_repeat: bool,
    state: KeyState,
}

/// Maps physical keys to actions of type `A`, with per-key autorepeat.
pub struct Keymap<A> {
    bindings: Vec<Binding<A>>,
    repeat_delay: u64,
    repeat_interval: u64,
}

impl<A: Copy> Keymap<A> {
    pub fn new(repeat_delay: u64, repeat_interval: u64) -> Self {
        Self {
            bindings: Vec::new(),
            repeat_delay,
            repeat_interval,
        }
    }

    pub fn bind(&mut self, key: impl Into<String>, action: A, auto_repeat: bool) {
        self.bindings.push(Binding {
            key: key.into(),
            action,
            auto_repeat,
            state: KeyState::default(),
        });
    }

    /// Record a raw key edge. Down edges while already down (OS-level key
    /// repeat) are ignored; the repeat schedule here is authoritative.
    /// Release edges also fire once, so actions can react to both edges.
    pub fn key_event(&mut self, key: &str, down: bool, now: u64) {
        for binding in self.bindings.iter_mut().filter(|b| b.key == key) {
            let state = &mut binding.state;
            if down {
                if state.when_down.is_none() {
                    state.down = true;
                    state.when_down = Some(now);
                    state.last_action = now;
                    state.pending += 1;
                }
            } else {
                state.down = false;
                state.repeating = false;
                state.when_down = None;
                state.pending += 1;
            }
        }
    }

    /// Collect every owed firing as `(action, key_is_down)` pairs. Held
    /// auto-repeat keys first wait out the repeat delay, then owe one
    /// firing per whole repeat interval since the last poll.
    pub fn poll(&mut self, now: u64) -> Vec<(A, bool)> {
        let mut fired = Vec::new();
        for binding in &mut self.bindings {
            let state = &mut binding.state;
            if binding.auto_repeat && state.down {
                let held = now.saturating_sub(state.when_down.unwrap_or(now));
                let idle = now.saturating_sub(state.last_action);
                if !state.repeating && held >= self.repeat_delay {
                    state.repeating = true;
                    state.last_action = now;
                    state.pending += 1;
                } else if state.repeating && idle >= self.repeat_interval {
                    state.pending = (idle / self.repeat_interval) as u32;
                    state.last_action = now;
                }
            }
            for _ in 0..state.pending {
                fired.push((binding.action, state.down));
            }
            state.pending = 0;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Act {
        Left,
        Drop,
    }

    fn keymap() -> Keymap<Act> {
        let mut map = Keymap::new(170, 50);
        map.bind("ArrowLeft", Act::Left, true);
        map.bind("Space", Act::Drop, false);
        map
    }

    #[test]
    fn press_fires_once_immediately() {
        let mut map = keymap();
        map.key_event("ArrowLeft", true, 0);
        assert_eq!(map.poll(0), vec![(Act::Left, true)]);
        assert_eq!(map.poll(10), vec![]);
    }

    #[test]
    fn os_level_repeat_edges_are_ignored() {
        let mut map = keymap();
        map.key_event("ArrowLeft", true, 0);
        map.key_event("ArrowLeft", true, 30);
        map.key_event("ArrowLeft", true, 60);
        assert_eq!(map.poll(60).len(), 1);
    }

    #[test]
    fn repeats_start_after_delay_then_follow_interval() {
        let mut map = keymap();
        map.key_event("ArrowLeft", true, 0);
        assert_eq!(map.poll(0).len(), 1);
        // still inside the initial delay
        assert_eq!(map.poll(160).len(), 0);
        // delay elapsed: one repeat, clock rebased
        assert_eq!(map.poll(200).len(), 1);
        // a slow frame owes one firing per whole interval
        assert_eq!(map.poll(320).len(), 2);
    }

    #[test]
    fn release_fires_an_up_edge_and_stops_repeats() {
        let mut map = keymap();
        map.key_event("ArrowLeft", true, 0);
        map.poll(0);
        map.key_event("ArrowLeft", false, 40);
        assert_eq!(map.poll(40), vec![(Act::Left, false)]);
        assert_eq!(map.poll(1000), vec![]);
    }

    #[test]
    fn non_repeating_keys_fire_only_on_edges() {
        let mut map = keymap();
        map.key_event("Space", true, 0);
        assert_eq!(map.poll(0), vec![(Act::Drop, true)]);
        assert_eq!(map.poll(5000), vec![]);
        map.key_event("Space", false, 5001);
        assert_eq!(map.poll(5001), vec![(Act::Drop, false)]);
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut map = keymap();
        map.key_event("KeyQ", true, 0);
        assert_eq!(map.poll(0), vec![]);
    }
}
