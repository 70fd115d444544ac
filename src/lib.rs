//! Hi-res event viewer - browse traffic-signal controller event logs
//!
//! This library exposes the core modules for testing and reuse.

pub mod classify;
pub mod common;
pub mod config;
pub mod directory;
pub mod error;
pub mod hires;
pub mod query;
pub mod render;
pub mod routes;
pub mod services;
pub mod url_state;
pub mod viewer;
pub mod window;
