//! `tsc-config`: file-based setup for controllers and corridor networks.
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`schema`] | serde structs mirroring the JSON files                     |
//! | [`loader`] | validation + resolution into layouts, configs, topologies  |
//! | [`replay`] | CSV replay of recorded detection output                    |
//! | [`error`]  | `ConfigError`, `ConfigResult`                              |
//!
//! # Example
//!
//! ```rust,ignore
//! let setup = tsc_config::load_network(Path::new("corridor.json"))?;
//! let mut runner = setup.into_runner(ControlClock::new(Duration::from_secs(1), 7 * 3_600))?;
//! runner.run_ticks(3_600, &mut NoopObserver);
//! ```

pub mod error;
pub mod loader;
pub mod replay;
pub mod schema;

#[cfg(test)]
mod tests;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    IntersectionSetup, NetworkSetup, load_intersection, load_network, parse_intersection,
    parse_network, resolve_intersection, resolve_network,
};
pub use replay::{ReplayFeed, load_replay_csv, load_replay_reader};
pub use schema::{IntersectionFile, NetworkFile};
