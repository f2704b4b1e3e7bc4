pub mod app;
pub mod catalog;
pub mod core;
pub mod engine;
pub mod session;
