use hud_core::{PlayerId, Tag, WidgetContextHandle, WidgetId};
use hud_registry::{ExtensionHandle, LayoutRegistryExt};
use tracing::{debug, warn};

use crate::class::ClassRef;
use crate::hud::Hud;

/// A bundle of layer widgets and slot extensions switched on and off as one
/// unit for a local player.
///
/// Each layout entry pushes a widget of its class onto the tagged layer of the
/// player's primary layout. Each extension entry registers the class against
/// the tagged slot, scoped to the player.
#[derive(Debug, Clone, Default)]
pub struct HudFeature {
    /// Layer tag and the class pushed onto it.
    pub layouts: Vec<(Tag, ClassRef)>,
    /// Slot tag and the extension class registered for it.
    pub extensions: Vec<(Tag, ClassRef)>,
}

impl HudFeature {
    /// An empty feature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `class` onto `layer` on activation.
    pub fn with_layout(mut self, layer: Tag, class: ClassRef) -> Self {
        self.layouts.push((layer, class));
        self
    }

    /// Register `class` as an extension of `slot` on activation.
    pub fn with_extension(mut self, slot: Tag, class: ClassRef) -> Self {
        self.extensions.push((slot, class));
        self
    }
}

/// What an activated [`HudFeature`] added for one player.
///
/// Hand it back to [`Hud::deactivate_feature`] to remove everything again.
#[derive(Debug, Default)]
pub struct FeatureHandle {
    player: Option<PlayerId>,
    widgets: Vec<WidgetId>,
    extensions: Vec<ExtensionHandle>,
}

impl FeatureHandle {
    /// The player the feature was activated for, until it is deactivated.
    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    /// Layer widgets the feature pushed, in push order.
    pub fn widgets(&self) -> &[WidgetId] {
        &self.widgets
    }

    /// Number of extensions the feature registered.
    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// True until the feature is deactivated.
    pub fn is_active(&self) -> bool {
        self.player.is_some()
    }
}

impl Hud {
    /// Push a feature's layouts and register its extensions for `player`.
    ///
    /// Entries that fail are logged and skipped; the rest still apply.
    pub fn activate_feature(&mut self, player: PlayerId, feature: &HudFeature) -> FeatureHandle {
        let mut handle = FeatureHandle {
            player: Some(player),
            ..FeatureHandle::default()
        };
        for (layer, class) in &feature.layouts {
            match self.try_push_to_layer(Some(player), layer, class, WidgetContextHandle::default()) {
                Ok(widget) => handle.widgets.push(widget),
                Err(e) => warn!(player = %player, layer = %layer, "skipping feature layout {class}: {e}"),
            }
        }
        for (slot, class) in &feature.extensions {
            let extension = self.register_extension(slot.clone(), class.clone(), Some(player));
            if extension.is_valid() {
                handle.extensions.push(extension);
            }
        }
        debug!(
            player = %player,
            widgets = handle.widgets.len(),
            extensions = handle.extensions.len(),
            "feature activated"
        );
        handle
    }

    /// Pop every layer widget and unregister every extension `handle` holds.
    ///
    /// Leaves `handle` inactive. No-op for an inactive handle.
    pub fn deactivate_feature(&mut self, handle: &mut FeatureHandle) {
        let Some(player) = handle.player.take() else {
            return;
        };
        for widget in std::mem::take(&mut handle.widgets) {
            if let Err(e) = self.try_pop_widget(widget) {
                warn!(player = %player, "feature widget {widget} was already gone: {e}");
            }
        }
        for mut extension in std::mem::take(&mut handle.extensions) {
            self.unregister_extension(&mut extension);
        }
        debug!(player = %player, "feature deactivated");
    }
}
