//! gd-drive: Drive v3 adapter for the gd CLI
//!
//! This crate provides the implementation of the DriveStore trait over the
//! Drive v3 REST API. It is the only crate that talks HTTP.

pub mod client;
pub mod query;

pub use client::DriveClient;
