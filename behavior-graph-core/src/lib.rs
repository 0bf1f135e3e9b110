//! Behavior Graph Core
//!
//! This crate provides a deterministic reactive dataflow engine. Application
//! state lives in *resources*; *behaviors* recompute resources from other
//! resources; the *graph* runs every affected behavior exactly once per
//! event, in dependency order, before releasing side effects.
//!
//! It implements:
//!
//! - Typed resources: persistent [`State`] values and one-shot [`Moment`]s
//! - Behaviors with explicit demand and supply links
//! - Extents for admitting and removing groups of nodes atomically
//! - Incremental topological ranking with cycle detection
//! - An event loop with a strict action, propagation, effect order
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: Arenas, handles, the ordering queue and the scheduler
//! - `reactive`: The event loop and the typed handles built on top of it
//!
//! # Example
//!
//! ```rust
//! use behavior_graph_core::{Extent, Graph};
//!
//! let mut graph = Graph::new();
//! let form = Extent::named(&mut graph, "login");
//! let email = form.state_named(&mut graph, "email", String::new());
//! let password = form.state_named(&mut graph, "password", String::new());
//! let enabled = form.state_named(&mut graph, "enabled", false);
//!
//! form.make_behavior(
//!     &mut graph,
//!     &[email.id(), password.id()],
//!     &[enabled.id()],
//!     move |graph, _| {
//!         let ok = email.value(graph).contains('@') && !password.value(graph).is_empty();
//!         enabled.update(graph, ok, true)
//!     },
//! );
//! form.add_to_graph_with_action(&mut graph).unwrap();
//!
//! graph
//!     .action("fill form", move |graph| {
//!         email.update(graph, "a@b.com".to_string(), true)?;
//!         password.update(graph, "x".to_string(), true)
//!     })
//!     .unwrap();
//!
//! assert!(*enabled.value(&graph));
//! ```

pub mod graph;
pub mod reactive;

mod config;
mod error;
mod event;

pub use config::GraphConfig;
pub use error::{GraphError, GraphResult, UpdateViolation};
pub use event::{Clock, GraphEvent, ManualClock, SystemClock};
pub use reactive::{Behavior, Completion, Extent, Graph, Moment, State, StateEntry};
