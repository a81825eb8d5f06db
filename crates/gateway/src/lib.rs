//! CentralGate gateway: HTTP API, CLI and the chat runtime that ties the
//! access, settings and dispatch layers together.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
