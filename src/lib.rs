// src/lib.rs

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod llm;
pub mod models;
pub mod roundrobin;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;
