pub mod api_docs;
pub mod app;
pub mod cache;
pub mod cascade;
pub mod config;
pub mod entities;
pub mod identity;
pub mod import;
pub mod maintenance;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
