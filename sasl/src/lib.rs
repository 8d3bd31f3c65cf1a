//! Provides the `Mechanism` trait and the mechanism implementations used to
//! negotiate and carry out SASL authentication.
//!
//! Mechanism selection is closed by design: every mechanism this crate knows
//! about is a variant of [`client::mechanisms::Mechanisms`], ordered weakest
//! to strongest, and [`client::mechanisms::Mechanisms::select`] picks the
//! strongest one the server advertises and the caller holds credentials for.

pub mod client;
pub mod common;
pub mod error;
