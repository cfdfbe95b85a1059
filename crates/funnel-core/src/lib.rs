//! Core types and pure reporting logic for the landing-page funnel.
//!
//! No HTTP or database code lives here. Storage backends implement
//! [`store::FunnelStore`]; the referral resolver, the backup merge and the
//! variant aggregator operate on snapshots already returned by a store.

pub mod contact;
pub mod error;
pub mod event;
pub mod merge;
pub mod referral;
pub mod registration;
pub mod report;
pub mod setting;
pub mod store;
pub mod variant;
pub mod waitlist;
pub mod wire;

pub use error::{Error, Result};
