//! Atelier Inbox — inbound email ingestion for the jewelry dashboard.
//!
//! Takes forwarded customer/vendor email from a provider webhook and turns
//! it into new business records (quotes, orders, repairs, trade-ins,
//! communication notes) under a strict create-only rule: the pipeline may
//! insert rows, never update or delete them.
//!
//! Delivery flow:
//! webhook → security scan → classify → extract → score → route →
//! {create | queue for confirmation} → processing log → notify.

pub mod classifier;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod records;
pub mod security;
pub mod server;
pub mod store;
