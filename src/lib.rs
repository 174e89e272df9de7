//! Mindfulness alert scheduling and delivery.
//!
//! The library half holds the alert engine: a scheduler that re-arms a
//! single-shot timer per configured interval, a dispatcher that picks
//! delivery channels from page visibility and subscription state, a
//! subscription gateway over the push vendor, and a file-backed store for
//! preferences and counters. The binary half is the notification relay that
//! keeps sending pushes server-side while the page is backgrounded.

pub mod config;
pub mod dispatcher;
pub mod gateway;
pub mod models;
pub mod onesignal;
pub mod routes;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod timing;
pub mod types;
pub mod util;
