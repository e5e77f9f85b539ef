//! HTTP handlers for the talespin service.
//!
//! The chat endpoint never fails towards the caller; everything else is
//! health, metrics and descriptive metadata.

pub mod chat;
pub mod demo;
pub mod health;
