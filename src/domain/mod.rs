pub mod models;
pub mod phase_controller;
pub mod session_clock;
