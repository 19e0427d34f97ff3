//! Core value types for the HUD framework.
//!
//! This crate holds the plain data every other layer agrees on: hierarchical
//! [`Tag`]s, owner [`Scope`]s, [`WidgetId`]s, and the type-erased
//! [`WidgetContextHandle`] that carries gameplay data into widget trees. It has
//! no notion of a widget tree or a registry.

/// Type-erased widget context payloads and the handle that shares them.
pub mod context;
/// Error types used throughout the framework.
pub mod error;
/// Identifiers for widget instances.
pub mod id;
/// Owner scopes (local players).
pub mod scope;
/// Hierarchical dotted tags with parent-walk queries.
pub mod tag;

/// Re-export context types.
pub use context::{ObjectContext, WidgetContext, WidgetContextContainer, WidgetContextHandle};
/// Re-export error types.
pub use error::{HudError, HudResult};
/// Re-export widget identifiers.
pub use id::WidgetId;
/// Re-export scope types.
pub use scope::{PlayerId, Scope};
/// Re-export tag types.
pub use tag::Tag;
