pub mod audit;
pub mod catalog;
pub mod client_ip;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod service;
pub mod state;
pub mod store;
pub mod validate;
pub mod worker;
