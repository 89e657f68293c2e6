//! Corridor network topology.
//!
//! # Data layout
//!
//! Links between intersections are stored in **Compressed Sparse Row** form.
//! Member intersections are kept in registration order; for the member at
//! dense index `i`, its outgoing links occupy
//!
//! ```text
//! link_to[ node_out_start[i] .. node_out_start[i+1] ]
//! ```
//!
//! Corridors are ordered member lists on top of the link graph.  Each
//! consecutive pair in a corridor must be joined by a link.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tsc_core::{IntersectionId, LinkId};

use crate::{IdMap, NetworkError, NetworkResult};

// ── Corridor ──────────────────────────────────────────────────────────────────

/// Corridors with higher priority claim offsets first where they share
/// members.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CorridorPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl FromStr for CorridorPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CorridorPriority::Low),
            "normal" | "medium" => Ok(CorridorPriority::Normal),
            "high" => Ok(CorridorPriority::High),
            other => Err(format!("unknown corridor priority {other:?}")),
        }
    }
}

impl fmt::Display for CorridorPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorridorPriority::Low => "low",
            CorridorPriority::Normal => "normal",
            CorridorPriority::High => "high",
        })
    }
}

/// Intersections in travel order along one progression route.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Corridor {
    pub name:      String,
    pub members:   Vec<IntersectionId>,
    /// Free-form label such as `"eastbound"`.
    pub direction: String,
    pub priority:  CorridorPriority,
}

impl Corridor {
    pub fn new(name: impl Into<String>, members: Vec<IntersectionId>) -> Self {
        Self {
            name: name.into(),
            members,
            direction: String::new(),
            priority: CorridorPriority::Normal,
        }
    }

    pub fn with_direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = direction.into();
        self
    }

    pub fn with_priority(mut self, priority: CorridorPriority) -> Self {
        self.priority = priority;
        self
    }
}

// ── NetworkTopology ───────────────────────────────────────────────────────────

/// Directed intersection graph in CSR format plus corridor definitions.
///
/// Build with [`TopologyBuilder`].
#[derive(Clone, Debug)]
pub struct NetworkTopology {
    /// Member ids in registration order.
    pub nodes:           Vec<IntersectionId>,
    index:               IdMap<IntersectionId, usize>,

    /// CSR row pointer.  Length = `nodes.len() + 1`.
    pub node_out_start:  Vec<u32>,

    pub link_from:       Vec<IntersectionId>,
    pub link_to:         Vec<IntersectionId>,
    pub link_distance_m: Vec<f32>,
    /// Configured travel time; `None` derives it from distance and speed.
    pub link_travel:     Vec<Option<Duration>>,

    pub corridors:       Vec<Corridor>,
}

impl NetworkTopology {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.link_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: IntersectionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Outgoing links of `id`; empty when `id` is not a member.
    pub fn out_links(&self, id: IntersectionId) -> impl Iterator<Item = LinkId> + '_ {
        let range = match self.index.get(&id) {
            Some(&i) => self.node_out_start[i] as usize..self.node_out_start[i + 1] as usize,
            None => 0..0,
        };
        range.map(|l| LinkId(l as u32))
    }

    pub fn link_between(&self, from: IntersectionId, to: IntersectionId) -> Option<LinkId> {
        self.out_links(from).find(|l| self.link_to[l.index()] == to)
    }

    /// Time to traverse `link` at `speed_mps` unless a travel time was
    /// configured for it.
    pub fn travel_time(&self, link: LinkId, speed_mps: f32) -> Duration {
        if let Some(t) = self.link_travel.get(link.index()).copied().flatten() {
            return t;
        }
        let distance = self.link_distance_m.get(link.index()).copied().unwrap_or(0.0);
        if speed_mps > 0.0 && distance.is_finite() {
            Duration::from_secs_f32(distance.max(0.0) / speed_mps)
        } else {
            Duration::ZERO
        }
    }

    pub fn corridor(&self, name: &str) -> Option<&Corridor> {
        self.corridors.iter().find(|c| c.name == name)
    }

    /// Corridors containing `id`.
    pub fn corridors_of(&self, id: IntersectionId) -> impl Iterator<Item = &Corridor> {
        self.corridors.iter().filter(move |c| c.members.contains(&id))
    }
}

// ── TopologyBuilder ───────────────────────────────────────────────────────────

/// Construct a [`NetworkTopology`] incrementally, then call
/// [`build`](Self::build).
///
/// # Example
///
/// ```rust,ignore
/// let mut b = TopologyBuilder::new();
/// b.add_intersection(IntersectionId(1)).add_intersection(IntersectionId(2));
/// b.connect(IntersectionId(1), IntersectionId(2), 400.0, Some(Duration::from_secs(30)));
/// b.corridor(Corridor::new("main", vec![IntersectionId(1), IntersectionId(2)]));
/// let topology = b.build()?;
/// ```
#[derive(Default)]
pub struct TopologyBuilder {
    nodes:     Vec<IntersectionId>,
    raw_links: Vec<RawLink>,
    corridors: Vec<Corridor>,
}

struct RawLink {
    from:       IntersectionId,
    to:         IntersectionId,
    distance_m: f32,
    travel:     Option<Duration>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_intersection(&mut self, id: IntersectionId) -> &mut Self {
        self.nodes.push(id);
        self
    }

    /// Add a **directed** link.
    pub fn connect(
        &mut self,
        from: IntersectionId,
        to: IntersectionId,
        distance_m: f32,
        travel: Option<Duration>,
    ) -> &mut Self {
        self.raw_links.push(RawLink { from, to, distance_m, travel });
        self
    }

    /// Convenience: links in both directions.
    pub fn connect_both(
        &mut self,
        a: IntersectionId,
        b: IntersectionId,
        distance_m: f32,
        travel: Option<Duration>,
    ) -> &mut Self {
        self.connect(a, b, distance_m, travel);
        self.connect(b, a, distance_m, travel)
    }

    pub fn corridor(&mut self, corridor: Corridor) -> &mut Self {
        self.corridors.push(corridor);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// [`NetworkError::InvalidTopology`] listing every problem found:
    /// duplicate members, links to unknown members, non-positive distances or
    /// travel times, and corridors with unknown, repeated, or unlinked members.
    pub fn build(self) -> NetworkResult<NetworkTopology> {
        let mut problems = Vec::new();

        let mut index: IdMap<IntersectionId, usize> = IdMap::default();
        for (i, &id) in self.nodes.iter().enumerate() {
            if index.insert(id, i).is_some() {
                problems.push(format!("intersection {id} listed twice"));
            }
        }

        for l in &self.raw_links {
            for end in [l.from, l.to] {
                if !index.contains_key(&end) {
                    problems.push(format!("link {} -> {} references unknown {end}", l.from, l.to));
                }
            }
            if l.from == l.to {
                problems.push(format!("link from {} to itself", l.from));
            }
            if !(l.distance_m.is_finite() && l.distance_m > 0.0) {
                problems.push(format!(
                    "link {} -> {} distance must be positive, got {}",
                    l.from, l.to, l.distance_m
                ));
            }
            if l.travel.is_some_and(|t| t.is_zero()) {
                problems.push(format!("link {} -> {} travel time must be positive", l.from, l.to));
            }
        }

        let linked = |a: IntersectionId, b: IntersectionId| {
            self.raw_links.iter().any(|l| l.from == a && l.to == b)
        };
        for (ci, c) in self.corridors.iter().enumerate() {
            if self.corridors[..ci].iter().any(|o| o.name == c.name) {
                problems.push(format!("corridor {:?} defined twice", c.name));
            }
            if c.members.is_empty() {
                problems.push(format!("corridor {:?} has no intersections", c.name));
            }
            for (i, &m) in c.members.iter().enumerate() {
                if !index.contains_key(&m) {
                    problems.push(format!("corridor {:?} references unknown {m}", c.name));
                }
                if c.members[..i].contains(&m) {
                    problems.push(format!("corridor {:?} visits {m} twice", c.name));
                }
            }
            for pair in c.members.windows(2) {
                if !linked(pair[0], pair[1]) {
                    problems.push(format!(
                        "corridor {:?} has no link {} -> {}",
                        c.name, pair[0], pair[1]
                    ));
                }
            }
        }

        if !problems.is_empty() {
            return Err(NetworkError::InvalidTopology(problems));
        }

        let node_count = self.nodes.len();
        let mut raw = self.raw_links;
        raw.sort_by_key(|l| index.get(&l.from).copied().unwrap_or(usize::MAX));

        let mut node_out_start = vec![0u32; node_count + 1];
        for l in &raw {
            if let Some(&i) = index.get(&l.from) {
                node_out_start[i + 1] += 1;
            }
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }

        Ok(NetworkTopology {
            nodes: self.nodes,
            index,
            node_out_start,
            link_from: raw.iter().map(|l| l.from).collect(),
            link_to: raw.iter().map(|l| l.to).collect(),
            link_distance_m: raw.iter().map(|l| l.distance_m).collect(),
            link_travel: raw.iter().map(|l| l.travel).collect(),
            corridors: self.corridors,
        })
    }
}
