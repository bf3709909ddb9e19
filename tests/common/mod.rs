#![allow(unused_imports)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: Star Wars operations and payloads used across tests
//! - `helpers`: Temp-file and client construction helpers

pub mod fixtures;
pub mod helpers;

pub use fixtures::{
    hero_and_friends, hero_and_friends_payload, hero_name, hero_name_payload, human_by_id,
};
pub use helpers::{replay_client, write_json};
