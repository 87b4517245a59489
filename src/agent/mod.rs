//! Handler descriptors and the capability registry

pub mod registry;

pub use registry::{ids, CapabilityRegistry, HandlerDescriptor};
