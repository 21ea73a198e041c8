//! Kinetics prediction server
//!
//! HTTP surface over the artifact registry and inference dispatcher.

pub mod api;
pub mod config;
