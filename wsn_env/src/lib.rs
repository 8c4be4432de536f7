//! WSN Simulation Primitives
//!
//! This crate holds everything a routing algorithm runs on top of:
//! nodes, messages, queues, energy accounting and the hop log.
//!
//! # Core Concept: Handles, not pointers
//!
//! Nodes live in a single arena ([`Field`]) and refer to each other by
//! [`NodeId`]. Messages carry the same handles, so a packet can be cloned
//! for broadcast without any shared ownership.
//!
//! # Tick semantics
//!
//! [`Field::tick_node`] runs one node for one tick:
//! - advance the local clock and pay the awake cost
//! - package a sensor reading if the node sensed this tick
//! - run the algorithm's step
//! - transmit at most one outbox item
//!
//! A packet sent while the sender's clock reads `t` becomes visible in the
//! receiver's inbox once the receiver's clock passes `t`.
//!
//! # Example
//!
//! ```ignore
//! use wsn_env::{Field, NodeCtx, RoutingAlgorithm, Message};
//!
//! impl RoutingAlgorithm for Flood {
//!     type NodeState = ();
//!     type MessageState = ();
//!
//!     fn name(&self) -> &'static str { "flood" }
//!
//!     fn step(&mut self, ctx: &mut NodeCtx<'_, Self>, sensed: Option<Message<()>>) {
//!         if let Some(msg) = sensed {
//!             ctx.push_outbox(msg);
//!         }
//!     }
//! }
//! ```

mod algorithm;
mod energy;
mod error;
mod field;
mod logger;
mod message;
mod node;
mod queue;
mod types;

pub use algorithm::RoutingAlgorithm;
pub use energy::{Battery, EnergyModel, ExhaustionPolicy, AWAKE_COST, MSG_RECV_COST, MSG_SEND_COST};
pub use error::SimError;
pub use field::{Field, NodeCtx, SENSOR_CONTENTS};
pub use logger::{HopLogEntry, HopLogger, HOP_LOG_HEADER};
pub use message::{Message, MessageKind};
pub use node::{Node, NodeStats};
pub use queue::MessageQueue;
pub use types::{MessageId, NodeId, Position};
