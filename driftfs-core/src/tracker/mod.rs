//! Tracker query operations.
//!
//! The tracker tells clients which storage node to talk to for a given
//! upload or fetch, and exposes cluster-wide group and storage listings.

pub mod client;
pub mod types;

pub use client::TrackerClient;
pub use types::{
    Counter, GROUP_STAT_RECORD_LEN, GroupStat, STORAGE_STAT_RECORD_LEN, StorageStat,
    StorageStatus,
};
