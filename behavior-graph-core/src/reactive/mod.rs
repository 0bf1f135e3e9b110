//! Reactive Primitives
//!
//! This module implements the behavior graph runtime: resources, behaviors,
//! extents and the event loop that drives them.
//!
//! # Concepts
//!
//! ## Resources
//!
//! A [`State`] holds a persistent value with history. A [`Moment`] is a pulse
//! that only exists during the event it fired in. Both are typed handles into
//! the graph's arena.
//!
//! ## Behaviors
//!
//! A [`Behavior`] declares the resources it demands and supplies up front.
//! There is no automatic dependency tracking: links are explicit, which is
//! what lets the graph rank behaviors before running any of them.
//!
//! ## Extents
//!
//! An [`Extent`] groups resources and behaviors that enter and leave the
//! graph together.
//!
//! ## Events
//!
//! Every change starts with an action, runs as one event, and ends with the
//! graph settled. Side effects run last. See [`Graph`] for the loop.

mod behavior;
mod context;
mod effect;
mod extent;
mod moment;
mod runtime;
mod state;

pub use behavior::Behavior;
pub use context::{ExecutionContext, Phase};
pub use effect::Completion;
pub use extent::Extent;
pub use moment::Moment;
pub use runtime::Graph;
pub use state::{State, StateEntry};
