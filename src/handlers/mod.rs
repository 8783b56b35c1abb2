// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod blog;
pub mod health;
pub mod interaction;
pub mod nucleus;
pub mod providers;
pub mod roundrobin;
