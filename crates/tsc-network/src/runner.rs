//! `NetworkRunner`: drive many controllers and their coordinator on one clock.
//!
//! Each step ticks every online controller (on Rayon's pool with the
//! `parallel` feature), then, when the coordinator is due, collects one
//! [`MemberReport`] per online controller and lets the coordinator update.
//! Offline controllers stop reporting and are degraded by the coordinator
//! once their last report goes stale.  A controller brought back online
//! resumes on the runner's clock.

use tracing::debug;
use tsc_control::{ControllerObserver, SignalController, TickReport};
use tsc_core::{ControlClock, IntersectionId};

use crate::{
    CoordinationUpdate, MemberReport, NetworkCoordinator, NetworkError, NetworkResult,
};

/// Output of one [`NetworkRunner::step`].
#[derive(Debug, Default)]
pub struct NetworkTick {
    /// One report per online controller, in registration order.
    pub reports:      Vec<TickReport>,
    /// Set when the coordinator ran this step.
    pub coordination: Option<CoordinationUpdate>,
}

pub struct NetworkRunner {
    controllers: Vec<SignalController>,
    online:      Vec<bool>,
    coordinator: NetworkCoordinator,
    pub clock:   ControlClock,
}

impl NetworkRunner {
    pub fn new(coordinator: NetworkCoordinator, clock: ControlClock) -> Self {
        Self { controllers: Vec::new(), online: Vec::new(), coordinator, clock }
    }

    /// Register a controller with the coordinator and take ownership of it.
    ///
    /// # Errors
    ///
    /// The controller's intersection must be in the topology and not added
    /// already.
    pub fn add(&mut self, controller: SignalController) -> NetworkResult<()> {
        self.coordinator.register(controller.id(), controller.offset_cell())?;
        self.controllers.push(controller);
        self.online.push(true);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn controllers(&self) -> &[SignalController] {
        &self.controllers
    }

    pub fn controller(&self, id: IntersectionId) -> Option<&SignalController> {
        self.controllers.iter().find(|c| c.id() == id)
    }

    pub fn controller_mut(&mut self, id: IntersectionId) -> Option<&mut SignalController> {
        self.controllers.iter_mut().find(|c| c.id() == id)
    }

    /// Take a controller off line (it neither ticks nor reports) or bring it
    /// back.
    pub fn set_online(&mut self, id: IntersectionId, online: bool) -> NetworkResult<()> {
        let i = self
            .controllers
            .iter()
            .position(|c| c.id() == id)
            .ok_or(NetworkError::UnknownIntersection(id))?;
        if online && !self.online[i] {
            self.controllers[i].resync(self.clock.current_tick);
        }
        self.online[i] = online;
        debug!(%id, online, "controller availability changed");
        Ok(())
    }

    pub fn coordinator(&self) -> &NetworkCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut NetworkCoordinator {
        &mut self.coordinator
    }

    /// Advance every online controller by one tick.
    pub fn step(&mut self) -> NetworkTick {
        let now = self.clock.elapsed();

        #[cfg(feature = "parallel")]
        let reports: Vec<TickReport> = {
            use rayon::prelude::*;
            self.controllers
                .par_iter_mut()
                .zip(self.online.par_iter())
                .filter_map(|(c, &on)| on.then(|| c.step()))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let reports: Vec<TickReport> = self
            .controllers
            .iter_mut()
            .zip(&self.online)
            .filter_map(|(c, &on)| on.then(|| c.step()))
            .collect();

        let mut coordination = None;
        if self.coordinator.is_due(now) {
            for (c, _) in self.controllers.iter().zip(&self.online).filter(|(_, on)| **on) {
                self.coordinator.report(MemberReport {
                    id:             c.id(),
                    at:             now,
                    cycle_time:     c.cycle_time(),
                    discharged:     c.discharged(),
                    throughput_vph: c.snapshot().throughput_vph,
                    safety_faults:  c.safety_faults(),
                });
            }
            coordination = Some(self.coordinator.update(now));
        }

        self.clock.advance();
        NetworkTick { reports, coordination }
    }

    /// Run `n` steps, replaying controller reports into `observer` in
    /// registration order.
    pub fn run_ticks<O: ControllerObserver + ?Sized>(&mut self, n: u64, observer: &mut O) {
        for _ in 0..n {
            for report in self.step().reports {
                report.deliver(observer);
            }
        }
    }
}
