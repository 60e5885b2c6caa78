//! Entitlement Engine - membership tiers, daily quotas and boost packs
//!
//! This crate decides whether a user may invoke a paid capability, enforces
//! a per-day processing quota, and extends that quota with purchasable,
//! time-boxed boost packs. State lives in a durable store fronted by an
//! optional cache.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod telemetry;
