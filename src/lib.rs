pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod mail;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod schema;
pub mod settings;
pub mod state;
pub mod storage;
pub mod validate;
