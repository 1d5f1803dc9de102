// Library exports for linkdir
// This allows integration tests and external code to use linkdir modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod forms;
pub mod routes;
pub mod search;
pub mod slug;
pub mod state;
pub mod tracking;
