//! Shared integration test helpers

#![allow(dead_code)]

pub mod test_server;

pub use test_server::{extract_json, extract_text, TestServer};
