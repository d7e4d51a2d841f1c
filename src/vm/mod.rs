//! VM Module
//!
//! Predicates over VM specs and the virtual hardware version policy built
//! on top of them.

pub mod hardware;
pub mod inspect;

pub use hardware::*;
pub use inspect::*;
