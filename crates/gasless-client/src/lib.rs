//! Async client for gasless trading: session keys, nonce reads, intent signing, relay
//! submission and order lifecycle tracking, routed per call to the right chain.

pub mod api;
pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod nonce_manager;
pub mod session;
pub mod signer;
pub mod submission;
pub mod tracker;

pub use client::{FlowOutcome, OrderLifecycleController, OrderReport, SignerPreference};
pub use error::{ClientError, Result};
