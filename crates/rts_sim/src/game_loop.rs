//! Fixed-timestep game loop.
//!
//! Wall-clock time is accumulated and drained in whole ticks, so the
//! simulation always advances by the same `dt` no matter how irregular the
//! frames are. Frames longer than the configured maximum are clamped,
//! which keeps a stall from turning into an ever-growing backlog.
//!
//! ```
//! use std::time::Duration;
//! use rts_sim::config::SimConfig;
//! use rts_sim::game_loop::{GameLoop, GameState};
//! use rts_sim::world::World;
//!
//! let mut game = GameLoop::new(World::default(), &SimConfig::default());
//! game.play();
//! let alpha = game.advance(Duration::from_millis(120));
//! assert_eq!(game.world().tick_count(), 2);
//! assert!((alpha - 0.4).abs() < 1e-9);
//! assert_eq!(game.state(), GameState::Playing);
//! ```

use std::time::{Duration, Instant};

use crate::config::{DispatchPolicy, SimConfig};
use crate::math::Fixed;
use crate::world::World;

/// Top-level state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    /// Not started.
    #[default]
    Menu,
    /// Assets or a save are being loaded.
    Loading,
    /// Simulation running.
    Playing,
    /// Simulation frozen; no time accrues.
    Paused,
    /// Match decided. Needs a new loop to play again.
    GameOver,
}

/// Drives a [`World`] from wall-clock time.
#[derive(Debug)]
pub struct GameLoop {
    world: World,
    state: GameState,
    dt: Fixed,
    tick_duration: Duration,
    max_frame_time: Duration,
    dispatch: DispatchPolicy,
    accumulator: Duration,
    last_update: Option<Instant>,
}

impl GameLoop {
    /// Loop in the `Menu` state.
    #[must_use]
    pub fn new(world: World, config: &SimConfig) -> Self {
        Self {
            world,
            state: GameState::Menu,
            dt: config.dt(),
            tick_duration: config.tick_duration(),
            max_frame_time: config.max_frame_time(),
            dispatch: config.dispatch,
            accumulator: Duration::ZERO,
            last_update: None,
        }
    }

    /// The simulated world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world, for scheduling commands and subscribing to events.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Give the world back.
    #[must_use]
    pub fn into_world(self) -> World {
        self.world
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> GameState {
        self.state
    }

    /// Enter `Loading`. Ignored once the match is over.
    pub fn begin_loading(&mut self) {
        self.transition(GameState::Loading);
    }

    /// Start or resume. The wall-clock reference is reset so time spent
    /// paused is not simulated.
    pub fn play(&mut self) {
        self.last_update = None;
        self.transition(GameState::Playing);
    }

    /// Freeze the simulation.
    pub fn pause(&mut self) {
        if self.state == GameState::Playing {
            self.transition(GameState::Paused);
        }
    }

    fn transition(&mut self, next: GameState) {
        if self.state == GameState::GameOver || self.state == next {
            return;
        }
        tracing::info!(from = ?self.state, to = ?next, tick = self.world.tick_count(), "Game state changed");
        self.state = next;
    }

    /// Measure the time since the previous call and advance by it.
    ///
    /// Returns the interpolation factor for rendering, see
    /// [`advance`](Self::advance).
    pub fn update(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = self
            .last_update
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_update = Some(now);
        self.advance(elapsed)
    }

    /// Advance by `elapsed` wall-clock time, running as many whole ticks as
    /// fit. Only runs while `Playing`.
    ///
    /// Returns the leftover fraction of a tick, in `[0, 1)`, for
    /// interpolating between the last two simulated states.
    pub fn advance(&mut self, elapsed: Duration) -> f64 {
        if self.state != GameState::Playing {
            return self.alpha();
        }

        self.accumulator += elapsed.min(self.max_frame_time);
        while self.accumulator >= self.tick_duration && self.state == GameState::Playing {
            self.accumulator -= self.tick_duration;
            self.world.tick(self.dt);
            if self.dispatch == DispatchPolicy::PerTick {
                self.world.dispatch_events();
            }
            if self.world.outcome().is_some() {
                self.transition(GameState::GameOver);
                self.accumulator = Duration::ZERO;
            }
        }
        if self.dispatch == DispatchPolicy::PerFrame {
            self.world.dispatch_events();
        }
        self.alpha()
    }

    fn alpha(&self) -> f64 {
        if self.tick_duration.is_zero() {
            return 0.0;
        }
        self.accumulator.as_secs_f64() / self.tick_duration.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::events::{EventKind, GameEvent};
    use crate::world::{MatchOutcome, System};

    /// Records how many events are still queued when it runs, then emits
    /// one more.
    struct Chatter {
        backlog: Rc<RefCell<Vec<usize>>>,
    }

    impl System for Chatter {
        fn name(&self) -> &'static str {
            "chatter"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn update(&mut self, world: &mut World, _dt: Fixed) {
            self.backlog.borrow_mut().push(world.pending_events().len());
            world.emit(GameEvent::ChatMessage {
                player: 1,
                text: format!("tick {}", world.tick_count()),
            });
        }
    }

    struct EndAt(u64);

    impl System for EndAt {
        fn name(&self) -> &'static str {
            "end_at"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn update(&mut self, world: &mut World, _dt: Fixed) {
            if world.tick_count() == self.0 {
                world.set_outcome(MatchOutcome {
                    winner: Some(1),
                    tick: self.0,
                });
            }
        }
    }

    fn config(dispatch: DispatchPolicy) -> SimConfig {
        SimConfig {
            dispatch,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_only_runs_while_playing() {
        let mut game = GameLoop::new(World::default(), &SimConfig::default());
        game.advance(Duration::from_millis(200));
        assert_eq!(game.world().tick_count(), 0);

        game.play();
        game.advance(Duration::from_millis(100));
        assert_eq!(game.world().tick_count(), 2);

        game.pause();
        assert_eq!(game.state(), GameState::Paused);
        game.advance(Duration::from_millis(100));
        assert_eq!(game.world().tick_count(), 2);
    }

    #[test]
    fn test_leftover_carries_over() {
        let mut game = GameLoop::new(World::default(), &SimConfig::default());
        game.play();
        game.advance(Duration::from_millis(30));
        assert_eq!(game.world().tick_count(), 0);
        let alpha = game.advance(Duration::from_millis(30));
        assert_eq!(game.world().tick_count(), 1);
        assert!((alpha - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_long_frames_are_clamped() {
        let mut game = GameLoop::new(World::default(), &SimConfig::default());
        game.play();
        game.advance(Duration::from_secs(10));
        // 250 ms at 50 ms per tick
        assert_eq!(game.world().tick_count(), 5);
    }

    #[test]
    fn test_per_tick_dispatch_drains_every_tick() {
        let backlog = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut world = World::default();
        world.add_system(Chatter {
            backlog: Rc::clone(&backlog),
        });
        let sink = Rc::clone(&seen);
        world.events_mut().subscribe(EventKind::ChatMessage, move |event| {
            if let GameEvent::ChatMessage { text, .. } = event {
                sink.borrow_mut().push(text.clone());
            }
        });

        let mut game = GameLoop::new(world, &config(DispatchPolicy::PerTick));
        game.play();
        game.advance(Duration::from_millis(150));

        assert_eq!(backlog.borrow().as_slice(), &[0, 0, 0]);
        assert_eq!(seen.borrow().as_slice(), &["tick 0", "tick 1", "tick 2"]);
    }

    #[test]
    fn test_per_frame_dispatch_batches_catch_up_ticks() {
        let backlog = Rc::new(RefCell::new(Vec::new()));
        let mut world = World::default();
        world.add_system(Chatter {
            backlog: Rc::clone(&backlog),
        });

        let mut game = GameLoop::new(world, &config(DispatchPolicy::PerFrame));
        game.play();
        game.advance(Duration::from_millis(150));
        assert_eq!(backlog.borrow().as_slice(), &[0, 1, 2]);
        assert!(game.world().pending_events().is_empty());
    }

    #[test]
    fn test_outcome_ends_the_loop() {
        let mut world = World::default();
        world.add_system(EndAt(1));
        let mut game = GameLoop::new(world, &SimConfig::default());
        game.play();
        let alpha = game.advance(Duration::from_millis(250));

        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.world().tick_count(), 2);
        assert!(alpha.abs() < f64::EPSILON);

        game.play();
        assert_eq!(game.state(), GameState::GameOver);
        game.advance(Duration::from_millis(250));
        assert_eq!(game.world().tick_count(), 2);
    }
}
