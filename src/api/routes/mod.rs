//! API Route Handlers

pub mod health;
