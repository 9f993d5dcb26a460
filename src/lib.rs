pub mod cancellation;
pub mod config;
pub mod database;
pub mod error;
pub mod manager;
pub mod messaging;
pub mod models;
pub mod poller;
pub mod routes;
pub mod store;
pub mod supervisor;
pub mod worker;
