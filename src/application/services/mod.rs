//! Business logic services for the application layer.

pub mod code_service;
pub mod resolver;

pub use code_service::{CodeService, CodeTree};
pub use resolver::{RedirectPolicy, Resolution, Resolver};
