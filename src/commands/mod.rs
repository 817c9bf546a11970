//! Command implementations

pub mod arp;
pub mod cache;
pub mod completions;
pub mod config;
pub mod devices;
pub mod lookup;
