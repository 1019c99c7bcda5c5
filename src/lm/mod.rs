//! The LM operator layer: signatures, the module runtime, providers, and
//! the operator catalogue.

pub mod client;
pub mod module;
pub mod operators;
pub mod signature;

pub use client::{LmClient, LmConfig, LmReply, LmUsage, ScriptedReply};
pub use module::{LmModule, ModuleOutput};
pub use operators::Operators;
pub use signature::{FieldSpec, FieldType, Signature, SignatureRegistry, SignatureVersion};
