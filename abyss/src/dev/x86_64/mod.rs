//! Devices found on every x86_64 PC.

pub mod serial;
