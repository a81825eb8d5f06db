//! Shared types for the CentralGate workspace: identities, conversation
//! turns, persona settings, configuration, errors and trace events.

pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
pub mod persona;
pub mod trace;
