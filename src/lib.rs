//! Purpose: Handle-based memory-mapped file engine (`libmmapkit`).
//! Exports: `api` (Rust surface) and `abi` (flat C surface for plugin shims).
//! Role: Library backing the `mmapkit` CLI and native bindings.
//! Invariants: Boundary callers only ever see opaque integer identities.
//! Invariants: Core modules stay private; `api` is the stable Rust path.
mod core;

pub mod abi;
pub mod api;
