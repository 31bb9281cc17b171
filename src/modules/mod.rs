//! Modules: the contract, the catalogue and the list of running instances.
//!
//! ## Contents
//! - [`Module`] trait with [`Layer`], [`ModuleConfig`], [`Canvas`]
//! - [`ConfigSection`] typed key/value accessors
//! - [`ModuleDescriptor`] / [`ModuleRegistry`] static catalogue
//! - [`ActiveModules`] renderer-visible list of running instances
//! - [`ModuleContext`] services handed to `Module::run`

mod active;
mod context;
mod module;
mod registry;
mod section;

pub use active::{ActiveEntry, ActiveId, ActiveModules};
pub use context::ModuleContext;
pub use module::{Canvas, DrawOp, Layer, Module, ModuleConfig, ModuleRef, RecordingCanvas};
pub use registry::{ModuleDescriptor, ModuleFactory, ModuleRegistry};
pub use section::ConfigSection;

#[cfg(test)]
pub(crate) use active::tests::Stub;
