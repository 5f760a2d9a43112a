//! Test doubles and helpers shared by the unit tests
mod common;
mod scripted_client;

pub use common::*;
pub use scripted_client::*;
