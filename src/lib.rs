//! Rewind Rally - terrain-following drift vehicles on a rewindable timeline
//!
//! The simulation core lives in [`game`]: vehicle physics, per-vehicle
//! timelines, the rewind/fork coordinator and the level session. [`world`]
//! supplies the collision queries it runs against and [`runner`] drives a
//! session at the fixed tick rate.

pub mod config;
pub mod game;
pub mod runner;
pub mod util;
pub mod world;
