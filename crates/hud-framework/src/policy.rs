use std::collections::BTreeMap;
use std::rc::Rc;

use hud_core::{HudResult, PlayerId, Tag, WidgetId};
use tracing::{info, warn};

use crate::hud::Hud;
use crate::layout::PrimaryLayout;

/// One primary layout per local player.
#[derive(Debug, Default)]
pub struct LayoutPolicy {
    pub(crate) layouts: BTreeMap<PlayerId, PrimaryLayout>,
}

impl LayoutPolicy {
    /// Players that currently have a layout, in id order.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.layouts.keys().copied()
    }

    /// The player's layout.
    pub fn get(&self, player: PlayerId) -> Option<&PrimaryLayout> {
        self.layouts.get(&player)
    }

    /// Number of layouts.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Returns true if no player has a layout.
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl Hud {
    /// Create and show a primary layout for `player`.
    ///
    /// The layout is built from the configured class, gets the configured
    /// default layers, and is put on the player's screen. Adding a player that
    /// already has a layout only shows it again.
    pub fn add_local_player(&mut self, player: PlayerId) -> HudResult<WidgetId> {
        if let Some(layout) = self.policy.layouts.get(&player) {
            warn!("{player} re-added to the layout policy");
            let root = layout.root();
            self.add_to_viewport(player);
            return Ok(root);
        }

        let class = self.config.primary_layout_class.clone();
        let root = self.try_create_widget(&class, Some(player))?;
        self.policy.layouts.insert(player, PrimaryLayout::new(player, root));
        for layer in self.config.layers.clone() {
            self.register_layer(player, layer);
        }
        self.add_to_viewport(player);
        Ok(root)
    }

    /// Tear down `player`'s primary layout and everything pushed onto it.
    ///
    /// # Panics
    ///
    /// Panics if the layout's presentation is still referenced after it was
    /// taken off screen; something is leaking it.
    pub fn remove_local_player(&mut self, player: PlayerId) {
        if !self.policy.layouts.contains_key(&player) {
            info!("{player} has no primary layout to remove");
            return;
        }
        self.remove_from_viewport(player);
        let layers: Vec<Tag> = self
            .policy
            .get(player)
            .map(|layout| layout.layer_tags().cloned().collect())
            .unwrap_or_default();
        for layer in &layers {
            self.unregister_layer(player, layer);
        }
        if let Some(layout) = self.policy.layouts.remove(&player) {
            self.destroy_widget(layout.root());
        }
        info!("removed primary layout of {player}");
    }

    /// The player's primary layout.
    pub fn primary_layout(&self, player: PlayerId) -> Option<&PrimaryLayout> {
        self.policy.get(player)
    }

    /// All primary layouts.
    pub fn layout_policy(&self) -> &LayoutPolicy {
        &self.policy
    }

    fn add_to_viewport(&mut self, player: PlayerId) {
        let Some(layout) = self.policy.layouts.get_mut(&player) else {
            return;
        };
        if layout.on_screen {
            return;
        }
        layout.on_screen = true;
        let root = layout.root();
        info!("adding primary layout {} to {player}", self.tree_string(root));
        self.construct_widget(root);
    }

    fn remove_from_viewport(&mut self, player: PlayerId) {
        let Some(layout) = self.policy.layouts.get_mut(&player) else {
            return;
        };
        if !layout.on_screen {
            return;
        }
        layout.on_screen = false;
        let root = layout.root();
        let Some(presentation) = self.presentation(root).map(|p| Rc::downgrade(&p)) else {
            return;
        };
        info!("removing primary layout {} from {player}", self.tree_string(root));
        self.destruct_widget(root);
        if presentation.upgrade().is_some() {
            panic!("widget memory leak: {} is still presented", self.tree_string(root));
        }
    }
}
