//! Shared firmware core for the fieldlink sensor network.
//!
//! This crate is consumed by two binaries: a battery-powered `node` that
//! samples a temperature/humidity sensor and reports it over the radio, and
//! a mains-powered `hub` that listens for readings from a handful of known
//! nodes and renders them on a small display.
//!
//! The crate root stays `no_std` for firmware builds. Host unit tests need
//! `std`'s test harness, so `std` is only linked in under `cfg(test)`.
#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod clock;
pub mod comms;
pub mod config;
pub mod crc16;
pub mod error_log;
pub mod event;
pub mod fifo;
pub mod main_app;
pub mod node_app;
pub mod power;
pub mod radio;
pub mod sensor;
pub mod time;
