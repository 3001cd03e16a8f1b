//! HTTP request handlers

pub mod health;
pub mod tryon;
pub mod chat;
