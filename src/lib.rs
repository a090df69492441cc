pub mod aggregation;
pub mod cache;
pub mod models;
pub mod repositories;
pub mod services;
pub mod session;
pub mod settings;
pub mod validation;
