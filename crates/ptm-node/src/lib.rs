//! # PTM Node
//!
//! Wires the PTM core (`ptm-facade`) to in-memory port implementations
//! and runs it as a standalone process. Production domains and
//! production port implementations (a real base ledger submitter, a
//! real key manager, a real peer-to-peer transport) live outside this
//! workspace; the in-memory fakes here are also what the `tests` crate
//! builds its end-to-end scenarios on.

pub mod config;
pub mod fakes;

pub use config::NodeConfig;
