pub mod auth;
pub mod models;
pub mod sample_queue;
pub mod session;
pub mod settings;
pub mod streaming;
