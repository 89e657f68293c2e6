//! Bitset conflict lookup.

use std::fmt;

use tsc_core::MovementId;

/// A set of movements packed into one `u64`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementSet(u64);

impl MovementSet {
    pub const CAPACITY: usize = 64;
    pub const EMPTY: MovementSet = MovementSet(0);

    #[inline]
    pub fn single(m: MovementId) -> Self {
        let mut s = Self::EMPTY;
        s.insert(m);
        s
    }

    #[inline]
    pub fn insert(&mut self, m: MovementId) {
        debug_assert!(m.index() < Self::CAPACITY);
        self.0 |= 1u64 << m.index();
    }

    #[inline]
    pub fn remove(&mut self, m: MovementId) {
        self.0 &= !(1u64 << m.index());
    }

    #[inline]
    pub fn contains(self, m: MovementId) -> bool {
        m.index() < Self::CAPACITY && self.0 & (1u64 << m.index()) != 0
    }

    #[inline]
    pub fn union(self, other: MovementSet) -> MovementSet {
        MovementSet(self.0 | other.0)
    }

    #[inline]
    pub fn intersection(self, other: MovementSet) -> MovementSet {
        MovementSet(self.0 & other.0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in ascending id order.
    pub fn iter(self) -> impl Iterator<Item = MovementId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let i = bits.trailing_zeros();
            bits &= bits - 1;
            Some(MovementId(i as u16))
        })
    }
}

impl FromIterator<MovementId> for MovementSet {
    fn from_iter<I: IntoIterator<Item = MovementId>>(iter: I) -> Self {
        let mut s = MovementSet::EMPTY;
        for m in iter {
            s.insert(m);
        }
        s
    }
}

impl fmt::Debug for MovementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|m| m.0)).finish()
    }
}

// ── ConflictTable ─────────────────────────────────────────────────────────────

/// Symmetric conflict relation over a movement arena.
///
/// Row `i` is the set of movements that must be RED whenever movement `i`
/// is GREEN or YELLOW.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConflictTable {
    rows: Vec<MovementSet>,
}

impl ConflictTable {
    pub fn new(movements: usize) -> Self {
        Self { rows: vec![MovementSet::EMPTY; movements] }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Declare `a` and `b` mutually exclusive.  Out-of-range ids are ignored.
    pub fn add(&mut self, a: MovementId, b: MovementId) {
        if a.index() >= self.rows.len() || b.index() >= self.rows.len() {
            return;
        }
        self.rows[a.index()].insert(b);
        self.rows[b.index()].insert(a);
    }

    #[inline]
    pub fn of(&self, m: MovementId) -> MovementSet {
        self.rows.get(m.index()).copied().unwrap_or_default()
    }

    #[inline]
    pub fn conflicts(&self, a: MovementId, b: MovementId) -> bool {
        self.of(a).contains(b)
    }

    /// Movements that conflict with any member of `set`.
    pub fn of_set(&self, set: MovementSet) -> MovementSet {
        set.iter().fold(MovementSet::EMPTY, |acc, m| acc.union(self.of(m)))
    }

    /// First conflicting pair inside `active`, if any.
    pub fn violation(&self, active: MovementSet) -> Option<(MovementId, MovementId)> {
        active.iter().find_map(|m| {
            self.of(m)
                .intersection(active)
                .iter()
                .next()
                .map(|other| (m, other))
        })
    }

    /// Whether every member of `set` may be non-RED together.
    pub fn is_compatible(&self, set: MovementSet) -> bool {
        self.violation(set).is_none()
    }
}
