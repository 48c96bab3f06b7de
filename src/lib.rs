#[macro_use]
pub mod named;

pub mod body;
pub mod calibration;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod handoff;
pub mod logging;
pub mod recording;
pub mod session;
pub mod viewer;
