//! Session context and controller

mod context;
mod controller;

pub use context::SessionContext;
pub use controller::{PROFILE_PATH, SessionController};
