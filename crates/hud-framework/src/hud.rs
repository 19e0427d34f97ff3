use std::collections::HashMap;

use hud_core::{PlayerId, WidgetId};
use hud_registry::{LayoutRegistry, RegistryHost};
use tracing::info;

use crate::class::ClassRef;
use crate::config::HudConfig;
use crate::context::WidgetContextSubsystem;
use crate::policy::LayoutPolicy;
use crate::pool::{PoolId, WidgetPool};
use crate::streaming::{ClassLibrary, StreamableManager};
use crate::widget::WidgetArena;

/// A HUD session: every widget, the layout registry, and the subsystems that
/// act on them.
///
/// Single-threaded. Callbacks receive `&mut Hud` and may call back into any
/// operation; registry notifications iterate snapshots, so callbacks can
/// register and unregister freely.
#[derive(Debug)]
pub struct Hud {
    pub(crate) config: HudConfig,
    pub(crate) widgets: WidgetArena,
    pub(crate) layout: LayoutRegistry<Hud>,
    pub(crate) contexts: WidgetContextSubsystem,
    pub(crate) pools: HashMap<PoolId, WidgetPool>,
    pub(crate) next_pool: u64,
    pub(crate) policy: LayoutPolicy,
    pub(crate) streaming: StreamableManager,
    pub(crate) classes: ClassLibrary,
}

impl Hud {
    /// Create an empty session.
    pub fn new(config: HudConfig) -> Self {
        let layout = LayoutRegistry::new(config.max_events);
        info!(registry = %layout.id(), layers = config.layers.len(), "hud session created");
        Self {
            config,
            widgets: WidgetArena::default(),
            layout,
            contexts: WidgetContextSubsystem::default(),
            pools: HashMap::new(),
            next_pool: 0,
            policy: LayoutPolicy::default(),
            streaming: StreamableManager::default(),
            classes: ClassLibrary::new(),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &HudConfig {
        &self.config
    }

    /// The context subsystem's bookkeeping.
    pub fn contexts(&self) -> &WidgetContextSubsystem {
        &self.contexts
    }

    /// Pending streamed class loads.
    pub fn streaming(&self) -> &StreamableManager {
        &self.streaming
    }

    /// Number of live widget pools.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Remove every local player, cancel pending loads, destroy the remaining
    /// pools, and reset the layout registry.
    pub fn shutdown(&mut self) {
        let players: Vec<PlayerId> = self.policy.players().collect();
        for player in players {
            self.remove_local_player(player);
        }
        self.cancel_all_streams();
        let mut pools: Vec<PoolId> = self.pools.keys().copied().collect();
        pools.sort();
        for pool in pools {
            self.destroy_pool(pool);
        }
        self.layout.reset();
        info!(widgets = self.widgets.len(), "hud session shut down");
    }
}

impl RegistryHost for Hud {
    type Class = ClassRef;
    type Widget = WidgetId;

    fn layout_registry(&self) -> &LayoutRegistry<Self> {
        &self.layout
    }

    fn layout_registry_mut(&mut self) -> &mut LayoutRegistry<Self> {
        &mut self.layout
    }
}
