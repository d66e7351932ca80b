//! Core domain entities.
//!
//! - [`Code`] - An issued QR/short-link code
//! - [`NewCode`] - Input for reserving a code
//! - [`ResourceRef`] - The catalog entity or external URL a code points at
//! - [`Namespace`] / [`CodeKind`] - Partition and hierarchy role of a code
//! - [`ReusePolicy`] - When deactivated values may be issued again

pub mod code;

pub use code::{Code, CodeKind, Namespace, NewCode, ResourceRef, ReusePolicy};
