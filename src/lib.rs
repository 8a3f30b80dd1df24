pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod probe;
pub mod remote;
pub mod scrapers;
