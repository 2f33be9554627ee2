//! Folio API: portfolio records, certificate uploads and the HTTP routes over them.

pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod uploads;
