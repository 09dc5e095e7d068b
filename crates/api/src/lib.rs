//! Credit score HTTP service
//!
//! Exposes the router and configuration so integration tests can drive the
//! real service without binding a socket.

pub mod api;
pub mod config;
