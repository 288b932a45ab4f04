#![doc = include_str!("../README.md")]

pub mod ethernet;
pub mod hpav;
pub mod qualcomm;

pub mod discovery;
pub mod transport;

pub mod config;
pub mod exporter;
pub mod report;

#[cfg(feature = "server")]
pub mod server;
