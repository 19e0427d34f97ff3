use hud_core::Tag;

use crate::class::{ClassRef, WidgetClass};

/// Configuration for a HUD session.
#[derive(Debug, Clone)]
pub struct HudConfig {
    /// Widget class instantiated as every local player's primary layout.
    pub primary_layout_class: ClassRef,
    /// Layers registered on every new primary layout, bottom to top.
    pub layers: Vec<Tag>,
    /// Maximum layout event log size (oldest events dropped when exceeded). 0 = unlimited.
    pub max_events: usize,
    /// Whether layers recycle popped widgets through a widget pool.
    pub pool_layers: bool,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            primary_layout_class: WidgetClass::builder("PrimaryLayout").build(),
            layers: vec![
                Tag::from_static("HUD.Layer.Game"),
                Tag::from_static("HUD.Layer.GameMenu"),
                Tag::from_static("HUD.Layer.Menu"),
                Tag::from_static("HUD.Layer.Modal"),
            ],
            max_events: 0,
            pool_layers: true,
        }
    }
}

impl HudConfig {
    /// Set the widget class used for primary layouts.
    pub fn with_primary_layout_class(mut self, class: ClassRef) -> Self {
        self.primary_layout_class = class;
        self
    }

    /// Replace the default layer tags.
    pub fn with_layers(mut self, layers: impl IntoIterator<Item = Tag>) -> Self {
        self.layers = layers.into_iter().collect();
        self
    }

    /// Set the maximum layout event log size (0 = unlimited).
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Enable or disable widget pooling on layers.
    pub fn with_pool_layers(mut self, pool: bool) -> Self {
        self.pool_layers = pool;
        self
    }
}
