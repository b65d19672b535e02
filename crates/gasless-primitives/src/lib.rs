//! Core types for the gasless trading client
//!
//! This crate holds everything that is a pure function of its inputs: chain descriptors,
//! contract bindings, order intents and their signing hashes, and the session key
//! delegation message. It re-exports the alloy types it is built on so downstream crates
//! stay on one alloy version.

pub mod alloy {
    pub mod primitives {
        pub use alloy::primitives::{
            address, b256, bytes, keccak256, utils, Address, Bytes, FixedBytes,
            PrimitiveSignature, B256, U256,
        };
    }

    pub mod network {
        pub use alloy::network::{Ethereum, EthereumWallet, Network, TransactionBuilder};
    }

    pub mod providers {
        pub use alloy::providers::{Provider, ProviderBuilder};
    }

    pub mod transports {
        pub use alloy::transports::{Transport, TransportError};
    }

    pub mod rpc {
        pub use alloy::rpc::types::{
            Filter, TransactionInput, TransactionReceipt, TransactionRequest,
        };
    }

    pub mod signers {
        pub use alloy::signers::{local::PrivateKeySigner, Signer};
    }

    pub mod sol_types {
        pub use alloy::sol_types::{SolCall, SolEvent, SolValue};
    }

    pub mod contract {
        pub use alloy::contract::Error;
    }
}

pub mod abi;
pub mod chains;
pub mod env;
pub mod error;
pub mod intents;
pub mod session;
pub mod units;

pub use error::{PrimitivesError, Result};
