// src/lib.rs
pub mod backing_store;
pub mod clock;
pub mod config;
pub mod desk;
pub mod duplicate_guard;
pub mod error;
pub mod export;
pub mod form;
pub mod lifecycle;
pub mod notice;
pub mod report;
pub mod request;
pub mod roster;
pub mod session;
pub mod store;
pub mod time_value;

#[cfg(test)]
mod session_tests;
