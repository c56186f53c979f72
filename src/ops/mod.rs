//! Client-side operations against a running config server

pub mod client;

pub use client::{CommandReply, ConfigClient};
