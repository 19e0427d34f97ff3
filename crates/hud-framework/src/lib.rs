//! Widget trees and their runtime for the HUD framework.
//!
//! A [`Hud`] owns every widget, the slot/extension [`LayoutRegistry`], and the
//! subsystems built on them: context propagation down widget trees, view
//! models, widget pools, slot-hosting widgets, and one primary layout of
//! named layers per local player.
//!
//! Everything is single-threaded and synchronous apart from streamed class
//! loads, which complete on [`Hud::update_streaming`].

/// Widget class descriptions.
pub mod class;
/// Session configuration.
pub mod config;
/// Context propagation and view model management.
pub mod context;
/// Layer widgets and extensions switched on together.
pub mod feature;
/// The session object.
pub mod hud;
/// Primary layouts and their layers.
pub mod layout;
/// One primary layout per local player.
pub mod policy;
/// Widget recycling.
pub mod pool;
mod presentation;
mod slot_widget;
/// Soft class paths and deferred class loading.
pub mod streaming;
/// View model trait and factories.
pub mod view_model;
/// Widget instances and the widget arena.
pub mod widget;

/// Re-exports of class types.
pub use class::{ClassRef, ConfigureCallback, InitTreeCallback, SlotSpec, WidgetClass, WidgetClassBuilder};
/// Re-export of [`config::HudConfig`].
pub use config::HudConfig;
/// Re-export of [`context::WidgetContextSubsystem`].
pub use context::WidgetContextSubsystem;
/// Re-exports of feature types.
pub use feature::{FeatureHandle, HudFeature};
/// Re-export of [`hud::Hud`].
pub use hud::Hud;
/// Re-exports of layout types.
pub use layout::{LayerContainer, PrimaryLayout};
/// Re-export of [`policy::LayoutPolicy`].
pub use policy::LayoutPolicy;
/// Re-exports of pool types.
pub use pool::{PoolId, WidgetPool};
/// Re-exports of streaming types.
pub use streaming::{ClassLibrary, StreamHandle, StreamableManager};
/// Re-exports of view model types.
pub use view_model::{BindingView, ViewModel, ViewModelBinding, ViewModelClass, ViewModelRef};
/// Re-exports of widget types.
pub use widget::{Presentation, SlotWidgetState, Widget, WidgetArena, WidgetContextExtension};

/// Re-exports of the registry types a [`Hud`] hosts.
pub use hud_registry::{
    EventLog, ExtensionHandle, ExtensionRequest, LayoutEvent, LayoutEventKind, LayoutRegistry,
    LayoutRegistryExt, ListenerId, SlotHandle,
};
