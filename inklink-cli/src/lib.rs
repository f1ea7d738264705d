//! # inklink-cli: BLE e-paper image sender
//!
//! Command-line front end for `inklink-core`: discovers EPD modules,
//! prepares an image (resize, dither, plane packing) and drives a
//! full transfer session over BLE.
//!
//! ## Commands
//!
//! - **scan**: List nearby BLE devices.
//! - **send**: Push an image to a panel and refresh it.

pub mod config;
pub mod render;
