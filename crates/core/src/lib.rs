//! Agência Check Core - Shared domain types.
//!
//! This crate provides the types used across the Agência Check components:
//! - `admin` - Back-office service (users, sales, inventory, backups, notifications)
//! - `cli` - Command-line tools for operators
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage,
//! no HTTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money and status enums
//! - [`permissions`] - Static role to capability mapping

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod permissions;
pub mod types;

pub use permissions::{Permission, permission_keys, permissions_for};
pub use types::*;
