pub mod config;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod router;
pub mod services;
pub mod tracking;

pub use router::create_router;
