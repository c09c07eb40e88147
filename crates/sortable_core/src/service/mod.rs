//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep controller/CLI layers decoupled from storage details.

pub mod entry_service;
pub mod sort_order_service;
