//! HTTP gateway for the Atelier workbench.
//!
//! Routes page loads, resource requests, and WebSocket upgrades; enforces
//! authentication and the administrative disable switch; and delegates
//! session negotiation and socket ownership to the supervised worker.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod assets;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod routes;
pub mod server;
pub mod settings;
pub mod start_path;
pub mod upgrade;
