// src/models/mod.rs

pub mod chat;
pub mod comment;
pub mod credit;
pub mod post;
pub mod roundrobin;
pub mod subscription;
pub mod user;
pub mod vote;
