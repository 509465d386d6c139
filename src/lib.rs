//! Workspace root crate.
//!
//! This crate has no public API of its own; it exists to pull in every
//! decorator crate as a dependency so the integration suite under `tests/`
//! can exercise them composed together through [`rpc_callable`].
