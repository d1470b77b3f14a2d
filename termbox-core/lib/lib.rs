//! `termbox` is a control plane for short-lived, sandboxed interactive terminal sessions.
//!
//! # Overview
//!
//! A termbox is a single pod in a remote container runtime that users attach a terminal to.
//! This crate holds the box lifecycle manager:
//! - Box creation, listing and exec attachment through an abstract runtime client
//! - TTL-based garbage collection against the runtime's real pod inventory
//! - Keeping a catalog of images warm in the runtime's cache
//! - A recurring job scheduler that runs both background jobs alongside live API traffic
//!
//! # Modules
//!
//! - [`config`] - Defaults and the image catalog
//! - [`runtime`] - The runtime client capability and its implementations
//! - [`management`] - Box registry, background jobs, scheduler and box manager

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod config;
pub mod management;
pub mod runtime;

pub use error::*;
