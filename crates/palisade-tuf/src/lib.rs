//! In-memory TUF engine for palisade
//!
//! Holds the verified role tree for one collection and performs
//! role-specific signing and verification over canonical JSON. The
//! engine never touches the network itself; the pull [`Client`] drives
//! it from a [`palisade_store::RemoteStore`].
//!
//! Role state transitions are explicit: a role's dirty flag changes only
//! through `set_*` (clean — the document came from a trusted source) or
//! a mutation/`sign_*` pair (dirty, then clean again once signed).

pub mod client;
pub mod error;
pub mod keydb;
pub mod repo;
pub mod service;
pub mod verify;

pub use client::Client;
pub use error::{Error, Result};
pub use keydb::KeyDb;
pub use repo::Repo;
pub use service::CryptoService;
pub use verify::{verify_role, verify_root, verify_signed};
