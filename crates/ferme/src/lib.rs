//! Ferme - farm task store with daily due-date reminders.

// ============================================================================
// Core Infrastructure
// ============================================================================

pub mod build_info;
pub mod config;
pub mod store;
pub mod sync;

// ============================================================================
// Server & HTTP
// ============================================================================

pub mod api;
pub mod handlers;
pub mod server;

// ============================================================================
// Domain
// ============================================================================

pub mod notify;
pub mod reminder;
pub mod task;

// ============================================================================
// Client
// ============================================================================

pub mod client;
