//! Atlas engine library.
//!
//! NPC conversations and the character service for one or more tenants.
//!
//! ## Structure
//!
//! - `use_cases/` - Conversation and character orchestration
//! - `infrastructure/` - Port traits and their in-process adapters
//! - `api/` - HTTP routes and topic consumers
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
