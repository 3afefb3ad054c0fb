//! # Fleet Simulation Core
//!
//! The simulation engine for a fleet of vehicles driving real-world routes.
//!
//! ## Overview
//!
//! This crate provides the pure, I/O-free core of the simulator:
//!
//! - **Geodesy**: WGS84↔UTM projection, zone selection, great-circle math
//! - **Route Preprocessing**: directions geometry → UTM-projected,
//!   length-indexed line segments with zone transitions
//! - **Vehicle Kinematics**: position/speed/bearing tracking along a route,
//!   arrival detection
//! - **Jitter Statistics**: rolling window over scheduler timing error
//!
//! ## Key Concepts
//!
//! - **Arclength addressing**: a vehicle's position is a meters-offset from
//!   the route start, resolved to WGS84 through the segment list
//! - **Rate limiting**: speed and bearing chase their desired values at
//!   bounded acceleration and turn rate
//! - **Deterministic math**: every operation is a plain function of its
//!   inputs; wall-clock time is always passed in by the caller
//!
//! The coordination layer (shared store, scheduler, upstream adapters) lives
//! in the `fleet_server` crate.

pub mod directions;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod geodesy;
pub mod jitter;
pub mod route;
pub mod trip;
pub mod vehicle;
