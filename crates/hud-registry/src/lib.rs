//! Slot/extension registry for the HUD framework.
//!
//! Widgets on screen declare *slots*; features declare *extensions*. The
//! [`LayoutRegistry`] matches the two by hierarchical tag and scope: an
//! extension registered at `HUD.Slot` reaches every slot tagged `HUD.Slot` or
//! a descendant such as `HUD.Slot.TopBar`, never the other way around.
//!
//! The registry lives inside a [`RegistryHost`] and all mutating operations
//! are provided by [`LayoutRegistryExt`] on the host, so slot callbacks can
//! freely mutate the host (including the registry itself) while a
//! notification is in flight.

/// Events broadcast when extensions are added to or removed from slots.
pub mod event;
/// Extension records and the requests handed to slot callbacks.
pub mod extension;
/// Copyable, invalidatable handles to registry records.
pub mod handle;
/// The registry itself and the host-side operations.
pub mod registry;
/// Slot records and their callbacks.
pub mod slot;

/// Re-export event types.
pub use event::{EventLog, LayoutEvent, LayoutEventKind, ListenerId};
/// Re-export extension types.
pub use extension::{Extension, ExtensionRequest};
/// Re-export handle types.
pub use handle::{ExtensionHandle, RegistryId, SlotHandle};
/// Re-export registry types.
pub use registry::{LayoutRegistry, LayoutRegistryExt, RegistryHost, WidgetClassRef};
/// Re-export slot types.
pub use slot::{Slot, SlotCallback};
