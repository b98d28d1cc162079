//! Plugboard: capability connections between confined applications and
//! system resources.
//!
//! Applications declare plugs (consumers) and slots (providers) naming a
//! capability descriptor. Connections are compiled into per-backend policy
//! snippets. Physical devices appearing and disappearing drive a hotplug
//! state machine that creates, updates and retires slots through change
//! task graphs.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attrs;
pub mod config;
pub mod context;
pub mod logging;
pub mod snap;

pub mod compiler;
pub mod interfaces;
pub mod repo;

pub mod hotplug;
pub mod manager;
pub mod state;
pub mod tasks;
