pub mod api;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod history;
pub mod notify;
pub mod reconcile;
pub mod scheduler;
pub mod state;
pub mod zone;
