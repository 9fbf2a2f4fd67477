//! Upstream inventory sources
//!
//! - [`HackerOneSource`]: bounty-eligible URL scope of every HackerOne program
//! - [`AnubisSource`]: subdomains of the in-scope registrable domains

pub mod anubis;
pub mod domain;
pub mod hackerone;
pub mod traits;

pub use anubis::AnubisSource;
pub use domain::{extract_domain, registrable_domains};
pub use hackerone::HackerOneSource;
pub use traits::InventorySource;

#[cfg(test)]
pub use traits::MockInventorySource;
