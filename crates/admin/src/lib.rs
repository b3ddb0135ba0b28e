//! Agência Check back-office library.
//!
//! This crate provides the back-office as a library, allowing it to be
//! tested and reused by the CLI.
//!
//! # Components
//!
//! - [`services`] - Users, data store, analytics, notifications and backups
//! - [`routes`] - JSON API over the services
//! - [`state`] - Service wiring and background task startup
//! - [`storage`] / [`artifacts`] - Persisted JSON state and downloadable files
//!
//! All business data lives in memory; only notifications, notification
//! settings, backups and backup schedules are persisted.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod artifacts;
pub mod clock;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod tasks;
