use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use hud_core::{HudError, HudResult, WidgetContextHandle, WidgetId};
use tracing::{debug, error, trace, warn};

use crate::hud::Hud;
use crate::view_model::{ViewModelBinding, ViewModelClass, ViewModelRef};
use crate::widget::WidgetContextExtension;

/// Bookkeeping for context propagation: tree walks in progress and tickable
/// view models.
#[derive(Debug, Default)]
pub struct WidgetContextSubsystem {
    active_trees: Rc<RefCell<Vec<WidgetId>>>,
    tickable: Vec<ViewModelRef>,
}

impl WidgetContextSubsystem {
    /// Roots whose tree walk is currently running, outermost first.
    pub fn active_trees(&self) -> Vec<WidgetId> {
        self.active_trees.borrow().clone()
    }

    /// Number of view models registered for ticking.
    pub fn tickable_count(&self) -> usize {
        self.tickable.len()
    }
}

/// Marks a root as walking until dropped.
struct ActiveTreeGuard {
    trees: Rc<RefCell<Vec<WidgetId>>>,
    root: WidgetId,
}

impl ActiveTreeGuard {
    fn enter(trees: &Rc<RefCell<Vec<WidgetId>>>, root: WidgetId) -> Self {
        let mut active = trees.borrow_mut();
        assert!(!active.contains(&root), "widget tree {root} is already being initialized");
        active.push(root);
        Self {
            trees: Rc::clone(trees),
            root,
        }
    }
}

impl Drop for ActiveTreeGuard {
    fn drop(&mut self) {
        let mut active = self.trees.borrow_mut();
        if let Some(index) = active.iter().position(|id| *id == self.root) {
            active.remove(index);
        }
    }
}

impl Hud {
    /// Attach `context` to a widget without running any initialization.
    ///
    /// Updates the context of an already registered widget in place.
    pub fn register_widget(&mut self, id: WidgetId, context: WidgetContextHandle) -> HudResult<()> {
        let widget = self.widgets.get_mut(id).ok_or(HudError::WidgetNotFound(id))?;
        match &mut widget.context {
            Some(extension) => extension.context = context,
            None => {
                widget.context = Some(WidgetContextExtension {
                    context,
                    initialized: false,
                    from_pool: false,
                });
            }
        }
        Ok(())
    }

    /// Give a widget its context and initialize it and its whole tree.
    ///
    /// A widget can be initialized this way exactly once. If the widget sits
    /// inside a tree walk that is still running, it is only registered and
    /// the running walk initializes it; it also inherits the walk root's
    /// pool ownership.
    pub fn try_initialize_widget(&mut self, id: WidgetId, context: WidgetContextHandle) -> HudResult<()> {
        let widget = self.widgets.get(id).ok_or(HudError::WidgetNotFound(id))?;
        if !widget.class.is_composite() {
            return Err(HudError::NotComposite {
                tree: self.tree_string(id),
            });
        }
        if widget.is_constructed() {
            return Err(HudError::AlreadyConstructed {
                tree: self.tree_string(id),
            });
        }

        let root = self.active_tree_for(id);
        let from_pool = match root {
            Some(root) => {
                let root_extension = self.widgets.get(root).and_then(|w| w.context.as_ref());
                assert!(
                    root_extension.is_some_and(|e| e.initialized),
                    "active tree root is not initialized: {}",
                    self.tree_string(root)
                );
                root_extension.is_some_and(|e| e.from_pool)
            }
            None => false,
        };

        if from_pool {
            if let Some(extension) = self.widgets.get_mut(id).and_then(|w| w.context.as_mut()) {
                extension.initialized = false;
            }
        } else {
            let widget = self.widgets.get(id).ok_or(HudError::WidgetNotFound(id))?;
            if let Some(extension) = &widget.context {
                let tree = self.tree_string(id);
                return Err(if extension.from_pool {
                    HudError::PoolOwned { tree }
                } else {
                    HudError::AlreadyRegistered { tree }
                });
            }
            if widget.view.as_ref().is_some_and(|v| v.sources_initialized) {
                return Err(HudError::SourcesAlreadyInitialized {
                    tree: self.tree_string(id),
                });
            }
        }

        self.create_widget_extension(id, context, from_pool);
        match root {
            Some(root) => trace!(widget = %id, root = %root, "widget registered inside an active tree"),
            None => self.initialize_widget_tree(id),
        }
        Ok(())
    }

    /// Like [`try_initialize_widget`](Self::try_initialize_widget), logging
    /// failures. The widget is left untouched on failure.
    pub fn initialize_widget(&mut self, id: WidgetId, context: WidgetContextHandle) {
        if let Err(e) = self.try_initialize_widget(id, context) {
            error!("failed to initialize widget: {e}");
        }
    }

    /// Re-initialize a widget that is being reused by a widget pool.
    ///
    /// Replaces its context, forces its extension back to uninitialized, and
    /// walks its tree again so view models are rebuilt for the new context.
    pub fn try_initialize_widget_from_pool(
        &mut self,
        id: WidgetId,
        context: WidgetContextHandle,
    ) -> HudResult<()> {
        let widget = self.widgets.get(id).ok_or(HudError::WidgetNotFound(id))?;
        if !widget.class.is_composite() {
            return Err(HudError::NotComposite {
                tree: self.tree_string(id),
            });
        }
        if widget.is_constructed() {
            return Err(HudError::AlreadyConstructed {
                tree: self.tree_string(id),
            });
        }
        if widget.context.as_ref().is_some_and(|e| !e.from_pool) {
            return Err(HudError::NotPoolOwned {
                tree: self.tree_string(id),
            });
        }

        self.create_widget_extension(id, context, true);
        if let Some(extension) = self.widgets.get_mut(id).and_then(|w| w.context.as_mut()) {
            extension.initialized = false;
        }
        if !self.is_part_of_active_tree(id) {
            self.initialize_widget_tree(id);
        }
        Ok(())
    }

    /// Like [`try_initialize_widget_from_pool`](Self::try_initialize_widget_from_pool),
    /// logging failures.
    pub fn initialize_widget_from_pool(&mut self, id: WidgetId, context: WidgetContextHandle) {
        if let Err(e) = self.try_initialize_widget_from_pool(id, context) {
            error!("failed to initialize pooled widget: {e}");
        }
    }

    /// Breadth-first initialization of `root` and every composite widget in
    /// its tree.
    ///
    /// Stops as soon as it reaches a widget that is already initialized: that
    /// widget's tree was covered by a nested walk.
    ///
    /// # Panics
    ///
    /// Panics if `root` is already being walked, or if the walk reaches a
    /// widget whose extension was marked initialized mid-walk.
    pub fn initialize_widget_tree(&mut self, root: WidgetId) {
        if !self.widgets.contains(root) {
            warn!("cannot initialize the tree of missing widget {root}");
            return;
        }
        let _guard = ActiveTreeGuard::enter(&self.contexts.active_trees, root);
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let Some(widget) = self.widgets.get(current) else {
                continue;
            };
            if widget.context.as_ref().is_some_and(|e| e.initialized) {
                trace!(
                    "{} is already initialized; skipping the rest of this tree",
                    self.tree_string(current)
                );
                return;
            }
            self.initialize_widget_internal(current);
            queue.extend(self.widgets.composite_children(current));
        }
        debug!(root = %root, "widget tree initialized");
    }

    fn initialize_widget_internal(&mut self, id: WidgetId) {
        let Some(widget) = self.widgets.get(id) else {
            return;
        };
        let class = widget.class.clone();
        let view = widget.view.as_ref().map(|v| v.sources_initialized);

        if let Some(sources_initialized) = view {
            if sources_initialized {
                self.uninitialize_sources(id);
            }
            self.initialize_sources(id);
        }

        let own_context = match self.widgets.get_mut(id).and_then(|w| w.context.as_mut()) {
            Some(extension) => {
                assert!(!extension.initialized, "widget extension is already initialized");
                extension.initialized = true;
                Some(extension.context.clone())
            }
            None => None,
        };
        trace!(widget = %id, class = class.name(), "widget initialized");

        // Only widgets carrying their own context consume it.
        if let Some(context) = own_context
            && let Some(callback) = class.on_initialize_tree()
        {
            callback(self, id, &context);
        }
        if class.slot().is_some() {
            self.register_slot_widget(id);
        }
    }

    fn create_widget_extension(&mut self, id: WidgetId, context: WidgetContextHandle, from_pool: bool) {
        let existing = self
            .widgets
            .get(id)
            .and_then(|w| w.context.as_ref())
            .map(|e| e.from_pool);
        if let Some(existing) = existing {
            assert!(
                existing == from_pool,
                "pool ownership of a widget cannot change: {}",
                self.tree_string(id)
            );
        }
        let Some(widget) = self.widgets.get_mut(id) else {
            return;
        };
        match &mut widget.context {
            Some(extension) => extension.context = context,
            None => {
                widget.context = Some(WidgetContextExtension {
                    context,
                    initialized: false,
                    from_pool,
                });
            }
        }
    }

    /// The root of the running tree walk that covers `id`, if any.
    pub fn active_tree_for(&self, id: WidgetId) -> Option<WidgetId> {
        let active = self.contexts.active_trees.borrow();
        if active.is_empty() {
            return None;
        }
        let mut current = Some(id);
        while let Some(widget) = current.and_then(|id| self.widgets.get(id)) {
            if active.contains(&widget.id) {
                return Some(widget.id);
            }
            current = widget.parent;
        }
        None
    }

    /// Returns true if a running tree walk covers `id`.
    pub fn is_part_of_active_tree(&self, id: WidgetId) -> bool {
        self.active_tree_for(id).is_some()
    }

    /// Returns true if the widget carries a context extension.
    pub fn is_registered(&self, id: WidgetId) -> bool {
        self.widgets.get(id).is_some_and(|w| w.context.is_some())
    }

    /// The widget's own context; empty (with a warning) if it is not registered.
    pub fn get_context(&self, id: WidgetId) -> WidgetContextHandle {
        match self.widgets.get(id).and_then(|w| w.context.as_ref()) {
            Some(extension) => extension.context.clone(),
            None => {
                warn!("no widget context registered for {}", self.tree_string(id));
                WidgetContextHandle::default()
            }
        }
    }

    /// The nearest registered widget: `id` itself or its closest registered ancestor.
    pub fn find_registered_widget(&self, id: WidgetId) -> Option<WidgetId> {
        let mut current = Some(id);
        while let Some(widget) = current.and_then(|id| self.widgets.get(id)) {
            if widget.context.is_some() {
                return Some(widget.id);
            }
            current = widget.parent;
        }
        None
    }

    /// Context of the nearest registered widget, or an empty handle.
    pub fn resolve_context(&self, id: WidgetId) -> WidgetContextHandle {
        self.find_registered_widget(id)
            .and_then(|w| self.widgets.get(w))
            .and_then(|w| w.context.as_ref())
            .map(|e| e.context.clone())
            .unwrap_or_default()
    }

    /// Create a view model for `widget`, initialized with its resolved context.
    pub fn try_create_view_model(
        &mut self,
        widget: WidgetId,
        class: &ViewModelClass,
    ) -> HudResult<ViewModelRef> {
        let model = class.instantiate();
        let context = self.resolve_context(widget);
        if model.borrow().requires_context() && !context.is_valid() {
            return Err(HudError::MissingContext {
                view_model: class.name().to_string(),
                tree: self.tree_string(widget),
            });
        }
        model.borrow_mut().initialize_with_context(widget, &context);
        if model.borrow().is_allowed_to_tick() {
            self.contexts.tickable.push(Rc::clone(&model));
        }
        Ok(model)
    }

    /// Like [`try_create_view_model`](Self::try_create_view_model); a model
    /// whose context is missing is logged and returned uninitialized.
    pub fn create_view_model(&mut self, widget: WidgetId, class: &ViewModelClass) -> ViewModelBinding {
        match self.try_create_view_model(widget, class) {
            Ok(model) => ViewModelBinding {
                class_name: class.name().to_string(),
                model,
                initialized: true,
            },
            Err(e) => {
                error!("view model left uninitialized: {e}");
                ViewModelBinding {
                    class_name: class.name().to_string(),
                    model: class.instantiate(),
                    initialized: false,
                }
            }
        }
    }

    /// Deinitialize a view model and stop ticking it.
    pub fn release_view_model(&mut self, widget: WidgetId, binding: ViewModelBinding) {
        if !binding.initialized {
            debug!(view_model = binding.class_name, "dropping uninitialized view model");
            return;
        }
        binding.model.borrow_mut().deinitialize(widget);
        self.contexts
            .tickable
            .retain(|model| !Rc::ptr_eq(model, &binding.model));
    }

    /// Tick every registered view model that currently wants it.
    pub fn tick_view_models(&mut self, delta_seconds: f32) {
        if self.contexts.tickable.is_empty() {
            return;
        }
        let models = self.contexts.tickable.clone();
        for model in models {
            let tickable = model.borrow().is_tickable();
            if tickable {
                model.borrow_mut().tick(delta_seconds);
            }
        }
    }

    /// View models currently bound to a widget.
    pub fn view_models(&self, id: WidgetId) -> Vec<ViewModelRef> {
        self.widgets
            .get(id)
            .and_then(|w| w.view.as_ref())
            .map(|v| v.models.iter().map(|b| Rc::clone(&b.model)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn initialize_sources(&mut self, id: WidgetId) {
        let Some(widget) = self.widgets.get_mut(id) else {
            return;
        };
        let Some(view) = widget.view.as_mut() else {
            return;
        };
        if !view.library_loaded {
            view.library_loaded = true;
            trace!(widget = %id, "binding library loaded");
        }
        let classes = widget.class.view_models().to_vec();
        let models = classes
            .iter()
            .map(|class| self.create_view_model(id, class))
            .collect();
        if let Some(view) = self.widgets.get_mut(id).and_then(|w| w.view.as_mut()) {
            view.models = models;
            view.sources_initialized = true;
        }
    }

    pub(crate) fn uninitialize_sources(&mut self, id: WidgetId) {
        let Some(view) = self.widgets.get_mut(id).and_then(|w| w.view.as_mut()) else {
            return;
        };
        if !view.sources_initialized {
            return;
        }
        view.sources_initialized = false;
        let models = std::mem::take(&mut view.models);
        for binding in models {
            self.release_view_model(id, binding);
        }
    }
}
