//! Postgres persistence for mealgrid: weekly plans and their slot items.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
