//! End-to-end verification scenarios
//!
//! Each module drives the public `pageaudit` facade over synthetic data
//! directories built with `common::TestDataDir`.

#[path = "../common/mod.rs"]
mod common;

mod manifest;
mod round_trip;
mod tracking;
