#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod boot;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod ops;
pub mod packages;
pub mod paths;
pub mod progress;
pub mod runner;
pub mod settings;
pub mod sink;
pub mod store;
pub mod version;

#[cfg(test)]
mod testing;
