// Core modules: error catalog, OS mapping primitive, and the handle registry.
pub mod catalog;
pub mod error;
pub mod region;
pub mod registry;
