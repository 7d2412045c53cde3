use crate::config::{validate_variance, ConfigError, SimulationConfig};
use crate::debug;
use crate::fight::{Fight, FightOutcome};
use crate::grid::{Grid, GridError};
use crate::mutation::{Mutation, MutationOutcome};
use crate::power::Cell;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::Ordering;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Constructed, no grid yet
    Idle,
    /// Grid built, loop not running
    Ready,
    /// Timed loop active
    Running,
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation has no grid, call initialize() first")]
    NotInitialized,

    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: SimState,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Receives simulation notifications.
///
/// `grid_changed` sees the grid after initialize, after reset and after
/// every completed step; never mid-step.
pub trait Observer {
    fn grid_changed(&mut self, grid: &Grid);

    fn running_changed(&mut self, _running: bool) {}
}

struct GridChanged<F>(F);

impl<F: FnMut(&Grid)> Observer for GridChanged<F> {
    fn grid_changed(&mut self, grid: &Grid) {
        (self.0)(grid)
    }
}

struct RunningChanged<F>(F);

impl<F: FnMut(bool)> Observer for RunningChanged<F> {
    fn grid_changed(&mut self, _grid: &Grid) {}

    fn running_changed(&mut self, running: bool) {
        (self.0)(running)
    }
}

/// Handle for removing a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Summary of one mutate + fight cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Steps completed since the grid was built, including this one
    pub step: u64,
    pub mutation: MutationOutcome,
    pub fight: FightOutcome,
}

/// What a scheduled firing did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firing {
    /// Still running: stepped once, fire again after the interval
    Stepped(StepReport),
    /// Not running: nothing happened, do not reschedule
    Halted,
}

/// Grid plus the operators built for it
struct Engine {
    grid: Grid,
    mutation: Mutation,
    fight: Fight,
}

pub struct Simulation {
    config: SimulationConfig,
    state: SimState,
    engine: Option<Engine>,
    rng: SmallRng,
    steps: u64,
    observers: Vec<(ObserverId, Box<dyn Observer>)>,
    next_observer_id: u64,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state)
            .field("size", &self.config.size)
            .field("steps", &self.steps)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Validate `config` and create an idle simulation. Uses `config.seed`
    /// when present, entropy otherwise.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Ok(Self {
            config,
            state: SimState::Idle,
            engine: None,
            rng,
            steps: 0,
            observers: Vec::new(),
            next_observer_id: 0,
        })
    }

    /// Create an idle simulation with a fixed seed
    pub fn with_seed(config: SimulationConfig, seed: u64) -> Result<Self, SimError> {
        Self::new(SimulationConfig {
            seed: Some(seed),
            ..config
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SimState::Running
    }

    /// Steps completed on the current grid
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Delay between scheduled firings
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms)
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.engine.as_ref().map(|engine| &engine.grid)
    }

    /// Build the grid and operators from the configuration.
    pub fn initialize(&mut self) -> Result<(), SimError> {
        if self.state == SimState::Running {
            return Err(SimError::InvalidTransition {
                action: "initialize",
                state: self.state,
            });
        }

        let grid = self.build_grid(self.config.variance)?;
        self.engine = Some(Engine {
            grid,
            mutation: Mutation::new(self.config.mutation.attempts),
            fight: Fight::new(self.config.fight.attempts),
        });
        self.steps = 0;
        self.state = SimState::Ready;

        debug::log_event(format!(
            "[INIT] {}x{} variance:{}",
            self.config.size.width, self.config.size.height, self.config.variance
        ));

        tracing::info!(
            width = self.config.size.width,
            height = self.config.size.height,
            variance = self.config.variance,
            mutation_attempts = self.config.mutation.attempts,
            fight_attempts = self.config.fight.attempts,
            "simulation initialized"
        );
        self.notify_grid();
        Ok(())
    }

    /// Replace the grid with a fresh one built with `variance`.
    ///
    /// A running loop is stopped first, so the simulation always ends up
    /// ready.
    pub fn reset(&mut self, variance: u8) -> Result<(), SimError> {
        validate_variance(variance)?;
        if self.engine.is_none() {
            return Err(SimError::NotInitialized);
        }

        self.stop();
        let grid = self.build_grid(variance)?;
        if let Some(engine) = self.engine.as_mut() {
            engine.grid = grid;
        }
        self.steps = 0;

        debug::log_event(format!("[RESET] variance:{variance}"));
        self.notify_grid();
        Ok(())
    }

    fn build_grid(&mut self, variance: u8) -> Result<Grid, SimError> {
        let rng = &mut self.rng;
        Grid::try_new(self.config.size, |_| {
            Cell::random(variance, rng).map_err(SimError::from)
        })
    }

    /// Run exactly one mutation pass and one fight pass, then notify
    /// observers. Works whether or not the loop is running.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        let engine = self.engine.as_mut().ok_or(SimError::NotInitialized)?;

        let mutation = engine.mutation.mutate(&mut engine.grid, &mut self.rng)?;
        let fight = engine.fight.fight(&mut engine.grid, &mut self.rng)?;
        self.steps += 1;

        debug::STEPS.fetch_add(1, Ordering::Relaxed);
        debug::MUTATIONS_ACCEPTED.fetch_add(u64::from(mutation.accepted), Ordering::Relaxed);
        debug::MUTATIONS_REJECTED.fetch_add(u64::from(mutation.rejected), Ordering::Relaxed);
        debug::FIGHTS_DECIDED.fetch_add(u64::from(fight.decided()), Ordering::Relaxed);
        debug::FIGHT_TIES.fetch_add(u64::from(fight.ties), Ordering::Relaxed);

        tracing::trace!(
            step = self.steps,
            accepted = mutation.accepted,
            rejected = mutation.rejected,
            decided = fight.decided(),
            ties = fight.ties,
            "step complete"
        );

        self.notify_grid();
        Ok(StepReport {
            step: self.steps,
            mutation,
            fight,
        })
    }

    /// Enter the running state. Idempotent while running.
    pub fn start(&mut self) -> Result<(), SimError> {
        match self.state {
            SimState::Idle => Err(SimError::NotInitialized),
            SimState::Running => Ok(()),
            SimState::Ready => {
                self.state = SimState::Running;
                debug::log_event(format!("[START] step:{}", self.steps));
                self.notify_running();
                Ok(())
            }
        }
    }

    /// Leave the running state. A no-op unless running.
    ///
    /// A firing already scheduled by a [`crate::ticker::Ticker`] still
    /// happens once, but [`Simulation::fire`] sees the flag and does nothing.
    pub fn stop(&mut self) {
        if self.state != SimState::Running {
            return;
        }
        self.state = SimState::Ready;
        debug::log_event(format!("[STOP] step:{}", self.steps));
        self.notify_running();
    }

    /// One scheduled firing of the running loop. The running flag is checked
    /// first; when it is clear nothing happens.
    pub fn fire(&mut self) -> Result<Firing, SimError> {
        if !self.is_running() {
            return Ok(Firing::Halted);
        }
        Ok(Firing::Stepped(self.step()?))
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Register a closure called with the grid after every change
    pub fn on_grid_changed<F>(&mut self, callback: F) -> ObserverId
    where
        F: FnMut(&Grid) + 'static,
    {
        self.add_observer(Box::new(GridChanged(callback)))
    }

    /// Register a closure called with the new state on start/stop
    pub fn on_running_changed<F>(&mut self, callback: F) -> ObserverId
    where
        F: FnMut(bool) + 'static,
    {
        self.add_observer(Box::new(RunningChanged(callback)))
    }

    /// Returns false if `id` was not registered
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    fn notify_grid(&mut self) {
        if let Some(engine) = &self.engine {
            for (_, observer) in &mut self.observers {
                observer.grid_changed(&engine.grid);
            }
        }
    }

    fn notify_running(&mut self) {
        let running = self.is_running();
        for (_, observer) in &mut self.observers {
            observer.running_changed(running);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Size;
    use crate::power::PowerVector;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Grid(u64),
        Running(bool),
    }

    fn config(width: usize, height: usize) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.size = Size::new(width, height);
        config.mutation.attempts = 200;
        config.fight.attempts = 300;
        config
    }

    fn seeded(width: usize, height: usize) -> Simulation {
        Simulation::with_seed(config(width, height), 42).unwrap()
    }

    /// Records notifications; grid events carry the total power of the grid
    fn record(sim: &mut Simulation) -> Rc<RefCell<Vec<Event>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let grid_log = Rc::clone(&log);
        sim.on_grid_changed(move |grid| {
            let total = grid.cells().iter().map(|c| u64::from(c.power.total())).sum();
            grid_log.borrow_mut().push(Event::Grid(total));
        });
        let running_log = Rc::clone(&log);
        sim.on_running_changed(move |running| {
            running_log.borrow_mut().push(Event::Running(running));
        });
        log
    }

    #[test]
    fn test_new_is_idle() {
        let sim = seeded(8, 8);
        assert_eq!(sim.state(), SimState::Idle);
        assert!(sim.grid().is_none());
        assert_eq!(sim.tick_interval(), Duration::from_millis(25));
    }

    #[test]
    fn test_zero_size_fails_at_construction() {
        let result = Simulation::new(config(0, 4));
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn test_invalid_variance_fails_at_construction() {
        let mut cfg = config(4, 4);
        cfg.variance = 9;
        assert!(Simulation::new(cfg).is_err());
    }

    #[test]
    fn test_step_before_initialize_fails() {
        let mut sim = seeded(4, 4);
        assert!(matches!(sim.step(), Err(SimError::NotInitialized)));
        assert!(matches!(sim.start(), Err(SimError::NotInitialized)));
        assert!(matches!(sim.reset(2), Err(SimError::NotInitialized)));
    }

    #[test]
    fn test_initialize_builds_grid() {
        let mut sim = seeded(10, 6);
        let log = record(&mut sim);
        sim.initialize().unwrap();

        assert_eq!(sim.state(), SimState::Ready);
        let grid = sim.grid().unwrap();
        assert_eq!(grid.size(), Size::new(10, 6));
        assert!(grid
            .cells()
            .iter()
            .all(|c| c.power.is_valid() && c.power.is_conserved()));
        assert_eq!(*log.borrow(), vec![Event::Grid(60 * 15)]);
    }

    #[test]
    fn test_initialize_while_running_is_rejected() {
        let mut sim = seeded(4, 4);
        sim.initialize().unwrap();
        sim.start().unwrap();
        assert!(matches!(
            sim.initialize(),
            Err(SimError::InvalidTransition {
                action: "initialize",
                state: SimState::Running
            })
        ));
    }

    #[test]
    fn test_reinitialize_from_ready() {
        let mut sim = seeded(4, 4);
        sim.initialize().unwrap();
        sim.step().unwrap();
        sim.initialize().unwrap();
        assert_eq!(sim.steps(), 0);
        assert_eq!(sim.state(), SimState::Ready);
    }

    #[test]
    fn test_steps_preserve_invariants() {
        let mut sim = seeded(20, 12);
        sim.initialize().unwrap();
        for i in 1..=50 {
            let report = sim.step().unwrap();
            assert_eq!(report.step, i);
            assert_eq!(report.mutation.accepted + report.mutation.rejected, 200);
            assert_eq!(report.fight.decided() + report.fight.ties, 300);
        }
        for cell in sim.grid().unwrap().cells() {
            assert!(cell.power.is_valid());
            assert!(cell.power.is_conserved());
        }
    }

    #[test]
    fn test_grid_observer_fires_after_every_step() {
        let mut sim = seeded(6, 6);
        let log = record(&mut sim);
        sim.initialize().unwrap();
        sim.step().unwrap();
        sim.step().unwrap();

        let expected = Event::Grid(36 * 15);
        assert_eq!(
            *log.borrow(),
            vec![expected.clone(), expected.clone(), expected]
        );
    }

    #[test]
    fn test_start_stop_notifications() {
        let mut sim = seeded(4, 4);
        sim.initialize().unwrap();
        let log = record(&mut sim);

        sim.start().unwrap();
        sim.start().unwrap();
        assert!(sim.is_running());
        sim.stop();
        sim.stop();
        assert_eq!(sim.state(), SimState::Ready);

        assert_eq!(
            *log.borrow(),
            vec![Event::Running(true), Event::Running(false)]
        );
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut sim = seeded(4, 4);
        let log = record(&mut sim);
        sim.stop();
        assert_eq!(sim.state(), SimState::Idle);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_manual_step_while_running() {
        let mut sim = seeded(4, 4);
        sim.initialize().unwrap();
        sim.start().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.steps(), 1);
        assert!(sim.is_running());
    }

    #[test]
    fn test_fire_checks_running_flag() {
        let mut sim = seeded(5, 5);
        sim.initialize().unwrap();
        assert_eq!(sim.fire().unwrap(), Firing::Halted);
        assert_eq!(sim.steps(), 0);

        sim.start().unwrap();
        assert!(matches!(sim.fire().unwrap(), Firing::Stepped(report) if report.step == 1));

        sim.stop();
        assert_eq!(sim.fire().unwrap(), Firing::Halted);
        assert_eq!(sim.steps(), 1);
    }

    #[test]
    fn test_reset_while_running_stops_loop() {
        let mut sim = seeded(8, 4);
        sim.initialize().unwrap();
        sim.start().unwrap();
        sim.step().unwrap();
        let log = record(&mut sim);

        sim.reset(0).unwrap();

        assert_eq!(sim.state(), SimState::Ready);
        assert_eq!(sim.steps(), 0);
        assert_eq!(
            *log.borrow(),
            vec![Event::Running(false), Event::Grid(32 * 15)]
        );
        // Variance 0 means every cell starts balanced
        assert!(sim
            .grid()
            .unwrap()
            .cells()
            .iter()
            .all(|c| c.power == PowerVector::BALANCED));
    }

    #[test]
    fn test_reset_rejects_bad_variance() {
        let mut sim = seeded(4, 4);
        sim.initialize().unwrap();
        assert!(matches!(sim.reset(5), Err(SimError::Config(_))));
        assert_eq!(sim.state(), SimState::Ready);
    }

    #[test]
    fn test_remove_observer() {
        let mut sim = seeded(3, 3);
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        let id = sim.on_grid_changed(move |_| *counter.borrow_mut() += 1);

        sim.initialize().unwrap();
        assert!(sim.remove_observer(id));
        assert!(!sim.remove_observer(id));
        sim.step().unwrap();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_deterministic_replay() {
        let mut a = seeded(16, 16);
        let mut b = seeded(16, 16);
        a.initialize().unwrap();
        b.initialize().unwrap();
        assert_eq!(a.grid(), b.grid());

        for _ in 0..25 {
            a.step().unwrap();
            b.step().unwrap();
        }
        assert_eq!(a.grid(), b.grid());
    }

    #[test]
    fn test_default_operator_attempts() {
        let cfg = SimulationConfig::from_toml_str(
            r#"
            variance = 2
            size = { width = 4, height = 4 }
            "#,
        )
        .unwrap();
        let mut sim = Simulation::with_seed(cfg, 1).unwrap();
        sim.initialize().unwrap();
        let report = sim.step().unwrap();
        assert_eq!(report.mutation.accepted + report.mutation.rejected, 1);
        assert_eq!(report.fight, FightOutcome::default());
    }
}
