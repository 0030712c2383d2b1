//! API Routes
//!
//! Route handlers organized by functionality.

pub mod conversations;
pub mod data;
pub mod export;
pub mod health;
pub mod memory;
pub mod models;
pub mod mood;
pub mod stream;
pub mod summary;
