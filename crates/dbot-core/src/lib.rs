//! Core domain + request pipeline for the disaster classifier bot.
//!
//! This crate is framework-agnostic. Telegram and the ONNX model live behind
//! ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod ports;
pub mod request_log;

pub use errors::{Error, Result};
