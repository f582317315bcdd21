#![forbid(unsafe_code)]
pub mod config;
pub mod device;
pub mod hardware;
pub mod pin;
pub mod setup;
pub mod worker;
