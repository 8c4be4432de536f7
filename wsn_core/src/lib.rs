//! WSN Routing Algorithms
//!
//! Implementations of [`wsn_env::RoutingAlgorithm`]:
//!
//! - [`Reinforcement`]: per-(destination, neighbor) value estimates learned
//!   from round-trip acknowledgements
//! - [`Raser`]: broadcast flooding along a hop-count gradient, one transmit
//!   slot per node
//! - [`Pegasis`]: a greedy furthest-first chain per destination with a token
//!   and a rotating leader
//! - [`Greedy`]: stateless label-greedy forwarding for smoke tests

pub mod greedy;
pub mod pegasis;
pub mod raser;
pub mod reinforcement;

pub use greedy::Greedy;
pub use pegasis::{ChainLink, ChainState, Pegasis, PegasisState, Sweep, DEFAULT_REBUILD_PERIOD};
pub use raser::{GradientSnapshot, Raser, RaserState};
pub use reinforcement::{Reinforcement, TravelLog, ValueTable};
