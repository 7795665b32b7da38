//! Built-in dynamics engines. Real physics engines live outside this crate
//! and are consumed through [`crate::engine::session::DynamicsEngine`];
//! only the drift stand-in ships here.

pub mod drift;
