// Library exports for Yatube
// This allows integration tests and external code to use Yatube modules

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod forms;
pub mod media;
pub mod pagination;
pub mod repository;
pub mod routes;
pub mod state;
