use std::collections::BTreeMap;

use hud_core::{HudError, HudResult, PlayerId, Scope, Tag, WidgetContextHandle, WidgetId};
use tracing::{debug, error, warn};

use crate::class::ClassRef;
use crate::hud::Hud;
use crate::pool::PoolId;
use crate::streaming::StreamHandle;

/// A stack of activatable widgets on one layer; the top one is active.
#[derive(Debug, Clone, Default)]
pub struct LayerContainer {
    stack: Vec<WidgetId>,
    pool: Option<PoolId>,
}

impl LayerContainer {
    /// Widgets on the layer, bottom first.
    pub fn widgets(&self) -> &[WidgetId] {
        &self.stack
    }

    /// The topmost widget.
    pub fn active_widget(&self) -> Option<WidgetId> {
        self.stack.last().copied()
    }

    /// Pool recycling the layer's widgets, if the layer pools.
    pub fn pool(&self) -> Option<PoolId> {
        self.pool
    }

    /// Number of widgets on the layer.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if nothing is pushed.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// One player's root layout: a root widget plus named layers.
#[derive(Debug)]
pub struct PrimaryLayout {
    player: PlayerId,
    root: WidgetId,
    layers: BTreeMap<Tag, LayerContainer>,
    active_context: WidgetContextHandle,
    add_guard: bool,
    pub(crate) on_screen: bool,
}

impl PrimaryLayout {
    pub(crate) fn new(player: PlayerId, root: WidgetId) -> Self {
        Self {
            player,
            root,
            layers: BTreeMap::new(),
            active_context: WidgetContextHandle::default(),
            add_guard: false,
            on_screen: false,
        }
    }

    /// The owning player.
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// The layout's root widget.
    pub fn root(&self) -> WidgetId {
        self.root
    }

    /// Look up a layer.
    pub fn layer(&self, tag: &Tag) -> Option<&LayerContainer> {
        self.layers.get(tag)
    }

    /// Registered layer tags in tag order.
    pub fn layer_tags(&self) -> impl Iterator<Item = &Tag> {
        self.layers.keys()
    }

    /// Returns true while the layout is shown on its player's screen.
    pub fn is_on_screen(&self) -> bool {
        self.on_screen
    }
}

impl Hud {
    /// Add a layer to a player's primary layout.
    pub fn try_register_layer(&mut self, player: PlayerId, layer: Tag) -> HudResult<()> {
        if !layer.is_valid() {
            return Err(HudError::InvalidTag);
        }
        let layout = self
            .policy
            .layouts
            .get(&player)
            .ok_or(HudError::NoPrimaryLayout(player))?;
        if layout.layers.contains_key(&layer) {
            return Err(HudError::DuplicateLayer(layer));
        }
        let root = layout.root;
        let pool = if self.config.pool_layers {
            Some(self.create_pool(root)?)
        } else {
            None
        };
        if let Some(layout) = self.policy.layouts.get_mut(&player) {
            debug!(player = %player, layer = %layer, pooled = pool.is_some(), "layer registered");
            layout.layers.insert(layer, LayerContainer { stack: Vec::new(), pool });
        }
        Ok(())
    }

    /// Like [`try_register_layer`](Self::try_register_layer), logging failures.
    pub fn register_layer(&mut self, player: PlayerId, layer: Tag) {
        if let Err(e) = self.try_register_layer(player, layer) {
            error!("failed to register layer: {e}");
        }
    }

    /// Remove a layer, popping every widget on it.
    pub fn unregister_layer(&mut self, player: PlayerId, layer: &Tag) {
        let Some(container) = self
            .policy
            .layouts
            .get_mut(&player)
            .and_then(|layout| layout.layers.remove(layer))
        else {
            return;
        };
        let LayerContainer { stack, pool } = container;
        for widget in stack.into_iter().rev() {
            self.remove_layer_widget(widget, pool);
        }
        if let Some(pool) = pool {
            self.destroy_pool(pool);
        }
        debug!(player = %player, layer = %layer, "layer unregistered");
    }

    /// Push a widget of `class` onto a layer of the scope's primary layout.
    ///
    /// A valid `context` is handed to the new widget through the context
    /// subsystem before the widget is shown.
    pub fn try_push_to_layer(
        &mut self,
        scope: Scope,
        layer: &Tag,
        class: &ClassRef,
        context: WidgetContextHandle,
    ) -> HudResult<WidgetId> {
        self.try_push_to_layer_with(scope, layer, class, context, |_, _| {})
    }

    /// Like [`try_push_to_layer`](Self::try_push_to_layer), logging failures.
    pub fn push_to_layer(
        &mut self,
        scope: Scope,
        layer: &Tag,
        class: &ClassRef,
        context: WidgetContextHandle,
    ) -> Option<WidgetId> {
        self.try_push_to_layer(scope, layer, class, context)
            .map_err(|e| error!("failed to push to layer: {e}"))
            .ok()
    }

    /// Push a widget and run `init` on it after its context is applied and
    /// before it is shown.
    ///
    /// # Panics
    ///
    /// Panics if called from inside another push on the same layout.
    pub fn try_push_to_layer_with(
        &mut self,
        scope: Scope,
        layer: &Tag,
        class: &ClassRef,
        context: WidgetContextHandle,
        init: impl FnOnce(&mut Hud, WidgetId),
    ) -> HudResult<WidgetId> {
        let player = scope.ok_or(HudError::MissingScope)?;
        if !layer.is_valid() {
            return Err(HudError::InvalidTag);
        }
        if !class.is_instantiable() {
            return Err(HudError::NonInstantiableClass(class.name().to_string()));
        }
        let layout = self
            .policy
            .layouts
            .get_mut(&player)
            .ok_or(HudError::NoPrimaryLayout(player))?;
        assert!(!layout.add_guard, "a widget is already being pushed for {player}");
        let container = layout
            .layers
            .get(layer)
            .ok_or_else(|| HudError::LayerNotFound(layer.clone()))?;
        let pool = container.pool;
        let root = layout.root;
        layout.add_guard = true;
        layout.active_context = context;

        let created = match pool {
            Some(pool) => self.try_pool_get_or_create(pool, class, |hud, widget| {
                hud.init_activatable_widget(player, widget);
                init(hud, widget);
            }),
            None => self.try_create_widget(class, scope).map(|widget| {
                self.init_activatable_widget(player, widget);
                init(self, widget);
                widget
            }),
        };

        let Some(layout) = self.policy.layouts.get_mut(&player) else {
            if let Ok(widget) = created {
                self.destroy_widget(widget);
            }
            return Err(HudError::NoPrimaryLayout(player));
        };
        let unconsumed = std::mem::take(&mut layout.active_context);
        layout.add_guard = false;
        let widget = created?;
        assert!(
            !unconsumed.is_valid(),
            "context for {} was not consumed",
            self.tree_string(widget)
        );

        self.attach_entry(root, widget)?;
        if let Some(container) = self
            .policy
            .layouts
            .get_mut(&player)
            .and_then(|layout| layout.layers.get_mut(layer))
        {
            container.stack.push(widget);
        }
        debug!(player = %player, layer = %layer, widget = %widget, class = class.name(), "widget pushed");
        Ok(widget)
    }

    /// Like [`try_push_to_layer_with`](Self::try_push_to_layer_with), logging failures.
    pub fn push_to_layer_with(
        &mut self,
        scope: Scope,
        layer: &Tag,
        class: &ClassRef,
        context: WidgetContextHandle,
        init: impl FnOnce(&mut Hud, WidgetId),
    ) -> Option<WidgetId> {
        self.try_push_to_layer_with(scope, layer, class, context, init)
            .map_err(|e| error!("failed to push to layer: {e}"))
            .ok()
    }

    /// Push a widget whose class is loaded from `path` by a later
    /// [`update_streaming`](Self::update_streaming).
    ///
    /// `on_complete` always runs: with the pushed widget, or with `None` if the
    /// class could not be loaded, the push failed, or the load was cancelled.
    /// Returns `None` without queueing anything if the request is malformed.
    pub fn push_to_layer_async(
        &mut self,
        scope: Scope,
        layer: Tag,
        path: impl Into<String>,
        context: WidgetContextHandle,
        on_complete: impl FnOnce(&mut Hud, Option<WidgetId>) + 'static,
    ) -> Option<StreamHandle> {
        if scope.is_none() {
            error!("failed to push to layer: {}", HudError::MissingScope);
            return None;
        }
        if !layer.is_valid() {
            error!("failed to push to layer: {}", HudError::InvalidTag);
            return None;
        }
        let handle = self.request_class_load(path, move |hud, class| {
            let widget = class.and_then(|class| hud.push_to_layer(scope, &layer, &class, context));
            on_complete(hud, widget);
        });
        Some(handle)
    }

    /// Pop `widget` from a layer of the scope's primary layout.
    ///
    /// The widget returns to the layer's pool, or is destroyed if the layer
    /// does not pool.
    pub fn try_pop_from_layer(&mut self, scope: Scope, layer: &Tag, widget: WidgetId) -> HudResult<()> {
        let player = scope.ok_or(HudError::MissingScope)?;
        if !layer.is_valid() {
            return Err(HudError::InvalidTag);
        }
        let container = self
            .policy
            .layouts
            .get_mut(&player)
            .ok_or(HudError::NoPrimaryLayout(player))?
            .layers
            .get_mut(layer)
            .ok_or_else(|| HudError::LayerNotFound(layer.clone()))?;
        let index = container
            .stack
            .iter()
            .position(|id| *id == widget)
            .ok_or_else(|| HudError::NotOnLayer {
                widget,
                layer: layer.clone(),
            })?;
        container.stack.remove(index);
        let pool = container.pool;
        self.remove_layer_widget(widget, pool);
        Ok(())
    }

    /// Like [`try_pop_from_layer`](Self::try_pop_from_layer), logging failures.
    pub fn pop_from_layer(&mut self, scope: Scope, layer: &Tag, widget: WidgetId) {
        if let Err(e) = self.try_pop_from_layer(scope, layer, widget) {
            error!("failed to pop from layer: {e}");
        }
    }

    /// Pop `widget` from whichever layer holds it.
    pub fn try_pop_widget(&mut self, widget: WidgetId) -> HudResult<()> {
        let found = self.policy.layouts.values_mut().find_map(|layout| {
            layout.layers.values_mut().find_map(|container| {
                let index = container.stack.iter().position(|id| *id == widget)?;
                container.stack.remove(index);
                Some(container.pool)
            })
        });
        match found {
            Some(pool) => {
                self.remove_layer_widget(widget, pool);
                Ok(())
            }
            None => Err(HudError::NotOnLayer {
                widget,
                layer: Tag::empty(),
            }),
        }
    }

    /// Like [`try_pop_widget`](Self::try_pop_widget), logging failures.
    pub fn pop_widget(&mut self, widget: WidgetId) {
        if let Err(e) = self.try_pop_widget(widget) {
            error!("failed to pop widget: {e}");
        }
    }

    /// Widgets on a layer, bottom first.
    pub fn layer_widgets(&self, player: PlayerId, layer: &Tag) -> Vec<WidgetId> {
        self.primary_layout(player)
            .and_then(|layout| layout.layer(layer))
            .map(|container| container.widgets().to_vec())
            .unwrap_or_default()
    }

    /// The topmost widget on a layer.
    pub fn active_layer_widget(&self, player: PlayerId, layer: &Tag) -> Option<WidgetId> {
        self.primary_layout(player)
            .and_then(|layout| layout.layer(layer))
            .and_then(LayerContainer::active_widget)
    }

    fn init_activatable_widget(&mut self, player: PlayerId, widget: WidgetId) {
        let Some(layout) = self.policy.layouts.get_mut(&player) else {
            return;
        };
        assert!(layout.add_guard, "activatable widget initialized outside of a push");
        let context = std::mem::take(&mut layout.active_context);
        if !context.is_valid() {
            return;
        }
        let pooled = self.widgets.get(widget).is_some_and(|w| w.pool.is_some());
        if pooled {
            self.initialize_widget_from_pool(widget, context);
        } else {
            self.initialize_widget(widget, context);
        }
    }

    fn remove_layer_widget(&mut self, widget: WidgetId, pool: Option<PoolId>) {
        if let Err(e) = self.detach(widget) {
            warn!("layer widget vanished before removal: {e}");
            return;
        }
        match pool {
            Some(pool) => self.pool_release(pool, widget, false),
            None => self.destroy_widget(widget),
        }
        debug!(widget = %widget, "widget popped");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use hud_core::ObjectContext;

    use super::*;
    use crate::class::WidgetClass;
    use crate::config::HudConfig;

    const P1: PlayerId = PlayerId(1);

    fn game() -> Tag {
        Tag::from_static("HUD.Layer.Game")
    }

    fn menu() -> Tag {
        Tag::from_static("HUD.Layer.Menu")
    }

    fn hud_with_player(config: HudConfig) -> Hud {
        let mut hud = Hud::new(config);
        hud.add_local_player(P1).unwrap();
        hud
    }

    fn named(name: &str) -> WidgetContextHandle {
        WidgetContextHandle::new(ObjectContext::new(Rc::new(name.to_string())))
    }

    fn received_names() -> (ClassRef, Rc<RefCell<Vec<String>>>) {
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let class = WidgetClass::builder("InventoryMenu")
            .on_initialize_tree(move |_: &mut Hud, _, context| {
                let name = context
                    .get::<ObjectContext>()
                    .and_then(|c| c.context_object.clone())
                    .and_then(|o| o.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                sink.borrow_mut().push(name);
            })
            .build();
        (class, seen)
    }

    #[test]
    fn push_initializes_context_and_shows_the_widget() {
        let mut hud = hud_with_player(HudConfig::default());
        let (class, seen) = received_names();

        let widget = hud
            .try_push_to_layer(Some(P1), &menu(), &class, named("backpack"))
            .unwrap();

        assert_eq!(*seen.borrow(), vec!["backpack"]);
        assert_eq!(hud.active_layer_widget(P1, &menu()), Some(widget));
        let shown = hud.widget(widget).unwrap();
        assert!(shown.is_constructed());
        assert!(shown.context_extension().unwrap().from_pool);
        assert_eq!(shown.owner, Some(P1));
    }

    #[test]
    fn pooled_layer_reuses_popped_widgets() {
        let mut hud = hud_with_player(HudConfig::default());
        let (class, seen) = received_names();
        let first = hud
            .try_push_to_layer(Some(P1), &menu(), &class, named("backpack"))
            .unwrap();
        hud.try_pop_from_layer(Some(P1), &menu(), first).unwrap();
        assert!(hud.layer_widgets(P1, &menu()).is_empty());
        assert!(!hud.widget(first).unwrap().is_constructed());

        let second = hud
            .try_push_to_layer(Some(P1), &menu(), &class, named("chest"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(*seen.borrow(), vec!["backpack", "chest"]);
    }

    #[test]
    fn unpooled_layer_destroys_popped_widgets() {
        let mut hud = hud_with_player(HudConfig::default().with_pool_layers(false));
        let (class, _) = received_names();
        let widget = hud
            .try_push_to_layer(Some(P1), &game(), &class, named("hud"))
            .unwrap();
        assert!(!hud.widget(widget).unwrap().context_extension().unwrap().from_pool);
        hud.try_pop_widget(widget).unwrap();
        assert!(hud.widget(widget).is_none());
    }

    #[test]
    fn push_failures_are_reported() {
        let mut hud = hud_with_player(HudConfig::default());
        let class = WidgetClass::builder("Popup").build();
        let ctx = WidgetContextHandle::default;

        assert_eq!(
            hud.try_push_to_layer(None, &menu(), &class, ctx()),
            Err(HudError::MissingScope)
        );
        assert_eq!(
            hud.try_push_to_layer(Some(P1), &Tag::empty(), &class, ctx()),
            Err(HudError::InvalidTag)
        );
        assert_eq!(
            hud.try_push_to_layer(Some(PlayerId(9)), &menu(), &class, ctx()),
            Err(HudError::NoPrimaryLayout(PlayerId(9)))
        );
        let unknown = Tag::from_static("HUD.Layer.Cinematic");
        assert_eq!(
            hud.try_push_to_layer(Some(P1), &unknown, &class, ctx()),
            Err(HudError::LayerNotFound(unknown))
        );
        assert!(hud.push_to_layer(None, &menu(), &class, ctx()).is_none());
    }

    #[test]
    fn pop_of_a_widget_not_on_the_layer_fails() {
        let mut hud = hud_with_player(HudConfig::default());
        let class = WidgetClass::builder("Popup").build();
        let widget = hud
            .try_push_to_layer(Some(P1), &menu(), &class, WidgetContextHandle::default())
            .unwrap();
        assert_eq!(
            hud.try_pop_from_layer(Some(P1), &game(), widget),
            Err(HudError::NotOnLayer {
                widget,
                layer: game()
            })
        );
        hud.pop_widget(widget);
        assert!(matches!(
            hud.try_pop_widget(widget),
            Err(HudError::NotOnLayer { .. })
        ));
    }

    #[test]
    fn layers_stack_with_the_latest_push_active() {
        let mut hud = hud_with_player(HudConfig::default());
        let popup = WidgetClass::builder("Popup").build();
        let confirm = WidgetClass::builder("Confirm").build();
        let modal = Tag::from_static("HUD.Layer.Modal");
        let a = hud
            .try_push_to_layer(Some(P1), &modal, &popup, WidgetContextHandle::default())
            .unwrap();
        let b = hud
            .try_push_to_layer(Some(P1), &modal, &confirm, WidgetContextHandle::default())
            .unwrap();
        assert_eq!(hud.layer_widgets(P1, &modal), vec![a, b]);
        assert_eq!(hud.active_layer_widget(P1, &modal), Some(b));
        hud.pop_widget(b);
        assert_eq!(hud.active_layer_widget(P1, &modal), Some(a));
    }

    #[test]
    fn push_with_runs_init_before_showing() {
        let mut hud = hud_with_player(HudConfig::default());
        let class = WidgetClass::builder("Popup").build();
        let constructed = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&constructed);
        hud.try_push_to_layer_with(
            Some(P1),
            &menu(),
            &class,
            named("x"),
            move |hud, widget| {
                *sink.borrow_mut() = Some(hud.widget(widget).unwrap().is_constructed());
            },
        )
        .unwrap();
        assert_eq!(*constructed.borrow(), Some(false));
    }

    #[test]
    fn layer_registration_rejects_duplicates_and_empty_tags() {
        let mut hud = hud_with_player(HudConfig::default());
        assert_eq!(
            hud.try_register_layer(P1, game()),
            Err(HudError::DuplicateLayer(game()))
        );
        assert_eq!(hud.try_register_layer(P1, Tag::empty()), Err(HudError::InvalidTag));
        let hud_tags: Vec<String> = hud
            .primary_layout(P1)
            .unwrap()
            .layer_tags()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            hud_tags,
            vec!["HUD.Layer.Game", "HUD.Layer.GameMenu", "HUD.Layer.Menu", "HUD.Layer.Modal"]
        );
    }

    #[test]
    fn unregistering_a_layer_clears_its_widgets() {
        let mut hud = hud_with_player(HudConfig::default());
        let class = WidgetClass::builder("Popup").build();
        let widget = hud
            .try_push_to_layer(Some(P1), &menu(), &class, WidgetContextHandle::default())
            .unwrap();
        let pool = hud.primary_layout(P1).unwrap().layer(&menu()).unwrap().pool().unwrap();

        hud.unregister_layer(P1, &menu());

        assert!(hud.primary_layout(P1).unwrap().layer(&menu()).is_none());
        assert!(hud.widget(widget).is_none());
        assert!(hud.pool(pool).is_none());
        assert!(matches!(
            hud.try_push_to_layer(Some(P1), &menu(), &class, WidgetContextHandle::default()),
            Err(HudError::LayerNotFound(_))
        ));
    }

    #[test]
    fn async_push_completes_on_the_streaming_pump() {
        let mut hud = hud_with_player(HudConfig::default());
        let (class, seen) = received_names();
        hud.class_library_mut().register("/Game/UI/Inventory", class);
        let result = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&result);

        hud.push_to_layer_async(
            Some(P1),
            menu(),
            "/Game/UI/Inventory",
            named("backpack"),
            move |_, widget| *sink.borrow_mut() = Some(widget),
        )
        .unwrap();
        assert!(result.borrow().is_none());
        assert!(hud.layer_widgets(P1, &menu()).is_empty());

        hud.update_streaming();

        let widget = result.borrow().flatten().unwrap();
        assert_eq!(hud.layer_widgets(P1, &menu()), vec![widget]);
        assert_eq!(*seen.borrow(), vec!["backpack"]);
    }

    #[test]
    fn cancelled_async_push_completes_with_none() {
        let mut hud = hud_with_player(HudConfig::default());
        let result = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&result);
        let handle = hud
            .push_to_layer_async(
                Some(P1),
                menu(),
                "/Game/UI/Inventory",
                WidgetContextHandle::default(),
                move |_, widget| *sink.borrow_mut() = Some(widget),
            )
            .unwrap();

        assert!(hud.cancel_stream(handle));

        assert_eq!(*result.borrow(), Some(None));
        assert!(hud.layer_widgets(P1, &menu()).is_empty());
    }

    #[test]
    fn malformed_async_push_is_not_queued() {
        let mut hud = hud_with_player(HudConfig::default());
        let handle = hud.push_to_layer_async(
            None,
            menu(),
            "/Game/UI/Inventory",
            WidgetContextHandle::default(),
            |_, _| {},
        );
        assert!(handle.is_none());
        assert_eq!(hud.streaming.pending_count(), 0);
    }
}
