//! Infrastructure implementations.
//!
//! Contains port trait implementations and the in-process state the engine
//! keeps between messages.

pub mod clock;
pub mod contexts;
pub mod memory;
pub mod message_buffer;
pub mod peers;
pub mod ports;
pub mod producer;
pub mod seed;
pub mod settings;
pub mod temporal;
pub mod tenant_registry;
