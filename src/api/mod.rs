//! API Module
//!
//! REST API for image resolution, hardware version determination, storage
//! usage notification and resource policy validation.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
