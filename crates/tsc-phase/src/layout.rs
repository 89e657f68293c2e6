//! Validated intersection layout and its builder.

use std::collections::HashMap;

use tracing::debug;
use tsc_core::{IntersectionId, LaneId, MovementId};

use crate::{
    ConflictTable, Lane, LaneRole, Movement, MovementKind, MovementSet, PhaseError, PhaseResult,
    TurnKind,
};

// ── IntersectionLayout ────────────────────────────────────────────────────────

/// The static description of one intersection: lanes, movements, and the
/// conflict relation between movements.
///
/// Lanes and movements are arenas indexed by [`LaneId`] and [`MovementId`].
/// Create via [`LayoutBuilder`].
#[derive(Clone, Debug)]
pub struct IntersectionLayout {
    pub id:        IntersectionId,
    pub name:      String,
    pub lanes:     Vec<Lane>,
    pub movements: Vec<Movement>,
    pub conflicts: ConflictTable,
}

impl IntersectionLayout {
    #[inline]
    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id.index())
    }

    #[inline]
    pub fn movement(&self, id: MovementId) -> Option<&Movement> {
        self.movements.get(id.index())
    }

    pub fn lane_by_name(&self, name: &str) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.name == name)
    }

    pub fn movement_by_name(&self, name: &str) -> Option<&Movement> {
        self.movements.iter().find(|m| m.name == name)
    }

    /// The movement a lane feeds.
    pub fn movement_of(&self, lane: LaneId) -> Option<MovementId> {
        self.lane(lane).map(|l| l.movement)
    }

    pub fn movement_ids(&self) -> impl Iterator<Item = MovementId> + '_ {
        self.movements.iter().map(|m| m.id)
    }

    pub fn through_movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.iter().filter(|m| matches!(m.kind, MovementKind::Through))
    }

    pub fn turn_movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.iter().filter(|m| matches!(m.kind, MovementKind::Turn { .. }))
    }

    pub fn pedestrian_movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.iter().filter(|m| m.kind.is_pedestrian())
    }

    /// Turns whose parent is `parent`.
    pub fn turns_of(&self, parent: MovementId) -> impl Iterator<Item = &Movement> {
        self.movements
            .iter()
            .filter(move |m| m.kind.parent() == Some(parent))
    }

    pub fn all_movements(&self) -> MovementSet {
        self.movement_ids().collect()
    }
}

// ── LayoutBuilder ─────────────────────────────────────────────────────────────

/// Incremental construction of an [`IntersectionLayout`].
///
/// Movement and lane handles are returned as they are added so callers can
/// wire conflicts without string lookups.  Validation happens once, in
/// [`build`][LayoutBuilder::build].
///
/// ```rust,ignore
/// let mut b = LayoutBuilder::new(IntersectionId(0), "5th & Main");
/// let north = b.through("north");
/// b.lane("north_1", north, 80.0);
/// let east = b.through("east");
/// b.lane("east_1", east, 80.0);
/// b.conflict(north, east);
/// let layout = b.build()?;
/// ```
pub struct LayoutBuilder {
    id:             IntersectionId,
    name:           String,
    lanes:          Vec<Lane>,
    movements:      Vec<Movement>,
    conflict_pairs: Vec<(MovementId, MovementId)>,
    names:          HashMap<String, usize>,
    duplicates:     Vec<String>,
}

impl LayoutBuilder {
    pub fn new(id: IntersectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            lanes: Vec::new(),
            movements: Vec::new(),
            conflict_pairs: Vec::new(),
            names: HashMap::new(),
            duplicates: Vec::new(),
        }
    }

    fn push_movement(&mut self, name: String, kind: MovementKind) -> MovementId {
        let id = MovementId(self.movements.len() as u16);
        if self.names.insert(format!("m:{name}"), id.index()).is_some() {
            self.duplicates.push(name.clone());
        }
        self.movements.push(Movement { id, name, kind, lanes: Vec::new() });
        id
    }

    /// Add a through movement.
    pub fn through(&mut self, name: impl Into<String>) -> MovementId {
        self.push_movement(name.into(), MovementKind::Through)
    }

    /// Add a turn movement served permissively with `parent` by default.
    pub fn turn(&mut self, name: impl Into<String>, turn: TurnKind, parent: MovementId) -> MovementId {
        self.push_movement(name.into(), MovementKind::Turn { turn, parent })
    }

    /// Add a crosswalk movement together with its detection lane.
    pub fn crosswalk(&mut self, name: impl Into<String>, crossing_distance_m: f32) -> MovementId {
        let name = name.into();
        let m = self.push_movement(name.clone(), MovementKind::Pedestrian { crossing_distance_m });
        self.push_lane(name, m, LaneRole::Crosswalk, 0.0);
        m
    }

    fn push_lane(&mut self, name: String, movement: MovementId, role: LaneRole, capacity_m: f32) -> LaneId {
        let id = LaneId(self.lanes.len() as u32);
        if self.names.insert(format!("l:{name}"), id.index()).is_some() {
            self.duplicates.push(name.clone());
        }
        if let Some(m) = self.movements.get_mut(movement.index()) {
            m.lanes.push(id);
        }
        self.lanes.push(Lane { id, name, movement, role, capacity_m });
        id
    }

    /// Add a detection lane feeding `movement`.
    pub fn lane(&mut self, name: impl Into<String>, movement: MovementId, capacity_m: f32) -> LaneId {
        let role = match self.movements.get(movement.index()).map(|m| &m.kind) {
            Some(MovementKind::Turn { .. }) => LaneRole::TurnBay,
            Some(MovementKind::Pedestrian { .. }) => LaneRole::Crosswalk,
            _ => LaneRole::Approach,
        };
        self.push_lane(name.into(), movement, role, capacity_m)
    }

    /// Declare `a` and `b` mutually exclusive.
    pub fn conflict(&mut self, a: MovementId, b: MovementId) -> &mut Self {
        self.conflict_pairs.push((a, b));
        self
    }

    /// Look up a movement handle by name.
    pub fn movement_id(&self, name: &str) -> Option<MovementId> {
        self.names.get(&format!("m:{name}")).map(|&i| MovementId(i as u16))
    }

    /// Look up a lane handle by name.
    pub fn lane_id(&self, name: &str) -> Option<LaneId> {
        self.names.get(&format!("l:{name}")).map(|&i| LaneId(i as u32))
    }

    fn movement_name(&self, id: MovementId) -> String {
        self.movements
            .get(id.index())
            .map(|m| m.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Validate and freeze the layout.
    pub fn build(self) -> PhaseResult<IntersectionLayout> {
        if self.movements.is_empty() {
            return Err(PhaseError::NoMovements);
        }
        if self.movements.len() > MovementSet::CAPACITY {
            return Err(PhaseError::TooManyMovements(self.movements.len()));
        }
        if let Some(name) = self.duplicates.first() {
            return Err(PhaseError::DuplicateName(name.clone()));
        }
        if let Some(m) = self.movements.iter().find(|m| m.lanes.is_empty()) {
            return Err(PhaseError::EmptyMovement(m.name.clone()));
        }

        let mut conflicts = ConflictTable::new(self.movements.len());
        for &(a, b) in &self.conflict_pairs {
            if a.index() >= self.movements.len() {
                return Err(PhaseError::UnknownMovement(a.to_string()));
            }
            if b.index() >= self.movements.len() {
                return Err(PhaseError::UnknownMovement(b.to_string()));
            }
            if a == b {
                return Err(PhaseError::SelfConflict(self.movement_name(a)));
            }
            conflicts.add(a, b);
        }

        for m in &self.movements {
            if let MovementKind::Turn { parent, .. } = m.kind {
                if parent.index() >= self.movements.len() {
                    return Err(PhaseError::UnknownMovement(parent.to_string()));
                }
                if conflicts.conflicts(m.id, parent) {
                    return Err(PhaseError::ParentConflict {
                        turn:   m.name.clone(),
                        parent: self.movement_name(parent),
                    });
                }
            }
        }

        debug!(
            intersection = %self.id,
            movements = self.movements.len(),
            lanes = self.lanes.len(),
            conflicts = self.conflict_pairs.len(),
            "layout built"
        );
        Ok(IntersectionLayout {
            id:        self.id,
            name:      self.name,
            lanes:     self.lanes,
            movements: self.movements,
            conflicts,
        })
    }
}
