//! `ControllerBuilder`: validated construction of a [`SignalController`].

use std::sync::Arc;

use tsc_core::ControlClock;
use tsc_phase::{IntersectionLayout, PhaseError};

use crate::{ControlError, ControlResult, ControllerConfig, ObservationSlot, OffsetCell, SignalController};

/// Builder for [`SignalController`].
///
/// # Example
///
/// ```rust,ignore
/// let controller = ControllerBuilder::new(layout)
///     .config(config)
///     .clock(ControlClock::new(Duration::from_secs(1), 7 * 3_600))
///     .build()?;
/// ```
pub struct ControllerBuilder {
    layout: Arc<IntersectionLayout>,
    config: ControllerConfig,
    clock:  ControlClock,
    slot:   Option<ObservationSlot>,
    offset: Option<Arc<OffsetCell>>,
}

impl ControllerBuilder {
    pub fn new(layout: impl Into<Arc<IntersectionLayout>>) -> Self {
        Self {
            layout: layout.into(),
            config: ControllerConfig::default(),
            clock:  ControlClock::default(),
            slot:   None,
            offset: None,
        }
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: ControlClock) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing observation slot instead of creating one.
    pub fn observation_slot(mut self, slot: ObservationSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Share an offset cell with a network coordinator.
    pub fn offset_cell(mut self, cell: Arc<OffsetCell>) -> Self {
        self.offset = Some(cell);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidConfig`] for inconsistent timing and
    /// [`ControlError::Phase`] for a layout with nothing to serve.
    pub fn build(self) -> ControlResult<SignalController> {
        self.config.validate()?;
        if self.layout.movements.is_empty() {
            return Err(ControlError::Phase(PhaseError::NoMovements));
        }
        Ok(SignalController::assemble(
            self.layout,
            self.config,
            self.clock,
            self.slot.unwrap_or_default(),
            self.offset.unwrap_or_default(),
        ))
    }
}
