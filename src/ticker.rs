use crate::simulation::{Firing, SimError, Simulation};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    /// Time of the next scheduled firing, `None` while no firing is pending
    next_due: Option<Duration>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Ticker using the simulation's configured interval
    pub fn for_simulation(sim: &Simulation) -> Self {
        Self::new(sim.tick_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A firing is scheduled
    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Time left until the pending firing, zero if overdue, `None` if nothing
    /// is scheduled
    pub fn until_due(&self, now: Duration) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_sub(now))
    }

    /// Run the pending firing if it is due. Returns true when a step ran.
    ///
    /// A running simulation with nothing scheduled fires immediately. The
    /// next firing is scheduled one interval after `now` before the step
    /// runs. When the firing finds the simulation stopped, no step runs and
    /// nothing is rescheduled.
    pub fn poll(&mut self, now: Duration, sim: &mut Simulation) -> Result<bool, SimError> {
        let due = match self.next_due {
            Some(due) => due,
            None if sim.is_running() => now,
            None => return Ok(false),
        };
        if due > now {
            self.next_due = Some(due);
            return Ok(false);
        }

        self.next_due = Some(now + self.interval);
        match sim.fire()? {
            Firing::Stepped(_) => Ok(true),
            Firing::Halted => {
                self.next_due = None;
                Ok(false)
            }
        }
    }

    /// Drive the simulation on the current thread until it stops.
    ///
    /// With `max_steps` set, the simulation is stopped once that many
    /// scheduled steps have run. Returns the number of scheduled steps.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn run_blocking(
        &mut self,
        sim: &mut Simulation,
        max_steps: Option<u64>,
    ) -> Result<u64, SimError> {
        let origin = std::time::Instant::now();
        let mut fired = 0;

        loop {
            if max_steps.is_some_and(|max| fired >= max) {
                sim.stop();
            }

            if self.poll(origin.elapsed(), sim)? {
                fired += 1;
            }

            match self.until_due(origin.elapsed()) {
                Some(wait) if !wait.is_zero() => std::thread::sleep(wait),
                Some(_) => {}
                None => break,
            }
        }

        Ok(fired)
    }
}
