//! Purpose: Define the public Rust API for the mapping engine.
//! Exports: `MapEngine`, views, identities, access modes, errors and the catalog.
//! Role: Public, additive-only surface; hides the internal core modules.
//! Invariants: This module is the only public path to the core types.
//! Invariants: Operations taking an identity validate it before anything else.

mod engine;
mod view;

pub use crate::core::catalog::ErrorCode;
pub use crate::core::error::{Error, ErrorKind, to_error_code};
#[cfg(unix)]
pub use crate::core::region::page_size;
pub use crate::core::region::{AccessMode, RawDescriptor, Source};
pub use crate::core::registry::{MappingId, MappingState};
pub use engine::{MapEngine, MappingInfo, error_message, version};
pub use view::{DataView, WritableView};
