//! Wire types shared by the HTTP API

pub mod chat;
pub mod common;
pub mod events;

pub use chat::*;
pub use common::*;
pub use events::*;
