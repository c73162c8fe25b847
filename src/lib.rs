//! Weekly equipment-delivery trip planner: clustering, distance matrix
//! assembly, constrained greedy assignment, TSP reordering, infeasibility
//! cascade, preseason multi-pass deployment, post-game lookahead, and
//! weighted scoring, fronted by a small `axum` HTTP surface.

pub mod clustering;
pub mod config;
pub mod constraints;
pub mod distance;
pub mod domain;
pub mod error;
pub mod geo;
pub mod http;
pub mod lookahead;
pub mod planner;
pub mod scoring;
pub mod store;
