use std::collections::HashMap;
use std::rc::Rc;

use hud_core::{HudError, HudResult, Scope, WidgetContextHandle, WidgetId};
use hud_registry::{ExtensionHandle, SlotHandle};
use tracing::{trace, warn};

use crate::class::ClassRef;
use crate::hud::Hud;
use crate::pool::PoolId;
use crate::view_model::BindingView;

/// The toolkit-side object that puts a widget on screen.
///
/// Shared: a constructed widget holds one reference and a widget pool may
/// cache another so the widget can be shown again cheaply.
#[derive(Debug, PartialEq, Eq)]
pub struct Presentation {
    /// The widget this presentation renders.
    pub widget: WidgetId,
    /// Class name of that widget.
    pub class_name: String,
}

/// Per-widget context state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetContextExtension {
    /// The widget's context.
    pub context: WidgetContextHandle,
    /// Whether the initialization hook has run for the current activation.
    pub initialized: bool,
    /// Whether the widget is owned by a widget pool.
    pub from_pool: bool,
}

/// Runtime state of a slot-hosting widget.
#[derive(Debug, Clone, Default)]
pub struct SlotWidgetState {
    /// Registration handle while the slot is registered.
    pub handle: SlotHandle,
    /// Materialized extension widgets, in arrival order.
    pub active: Vec<(ExtensionHandle, WidgetId)>,
    /// Pool recycling extension widgets, created on first use.
    pub pool: Option<PoolId>,
}

/// One widget instance.
#[derive(Debug)]
pub struct Widget {
    /// Unique identifier.
    pub id: WidgetId,
    /// The widget's class.
    pub class: ClassRef,
    /// Owning player, if any.
    pub owner: Scope,
    /// Parent in either the structural tree or a container's entries.
    pub parent: Option<WidgetId>,
    /// Structural children instantiated from the class.
    pub children: Vec<WidgetId>,
    /// Dynamic content added by slots and layers.
    pub entries: Vec<WidgetId>,
    /// The pool that created this widget.
    pub pool: Option<PoolId>,
    pub(crate) presentation: Option<Rc<Presentation>>,
    pub(crate) context: Option<WidgetContextExtension>,
    pub(crate) view: Option<BindingView>,
    pub(crate) slot: Option<SlotWidgetState>,
}

impl Widget {
    /// Returns true while the widget is on screen.
    pub fn is_constructed(&self) -> bool {
        self.presentation.is_some()
    }

    /// The widget's context state, if it has been registered.
    pub fn context_extension(&self) -> Option<&WidgetContextExtension> {
        self.context.as_ref()
    }

    /// The widget's binding view, if its class declares view models.
    pub fn view(&self) -> Option<&BindingView> {
        self.view.as_ref()
    }

    /// Slot state, if the widget's class hosts a slot.
    pub fn slot_state(&self) -> Option<&SlotWidgetState> {
        self.slot.as_ref()
    }
}

/// Storage for every live widget.
#[derive(Debug, Default)]
pub struct WidgetArena {
    widgets: HashMap<WidgetId, Widget>,
}

impl WidgetArena {
    /// Look up a widget.
    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.get_mut(&id)
    }

    /// Returns true if the widget exists.
    pub fn contains(&self, id: WidgetId) -> bool {
        self.widgets.contains_key(&id)
    }

    /// Number of live widgets.
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// Returns true if there are no live widgets.
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Ancestry string `Widget -> Parent -> Root` for diagnostics.
    pub fn tree_string(&self, id: WidgetId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(widget) = current.and_then(|id| self.widgets.get(&id)) {
            names.push(widget.class.name().to_string());
            current = widget.parent;
        }
        if names.is_empty() {
            return format!("<missing {id}>");
        }
        names.join(" -> ")
    }

    /// Composite widgets directly inside `id`'s widget tree.
    ///
    /// Looks through primitive children; stops at the first composite on
    /// each branch. Dynamic entries are not part of the tree.
    pub fn composite_children(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut found = Vec::new();
        let mut pending: Vec<WidgetId> = match self.widgets.get(&id) {
            Some(widget) => widget.children.iter().rev().copied().collect(),
            None => return found,
        };
        while let Some(child) = pending.pop() {
            let Some(widget) = self.widgets.get(&child) else {
                continue;
            };
            if widget.class.is_composite() {
                found.push(child);
            } else {
                pending.extend(widget.children.iter().rev().copied());
            }
        }
        found
    }

    fn insert(&mut self, widget: Widget) {
        self.widgets.insert(widget.id, widget);
    }

    fn remove(&mut self, id: WidgetId) -> Option<Widget> {
        self.widgets.remove(&id)
    }
}

impl Hud {
    /// Instantiate `class` and its whole widget tree.
    pub fn try_create_widget(&mut self, class: &ClassRef, owner: Scope) -> HudResult<WidgetId> {
        if !class.is_instantiable() {
            return Err(HudError::NonInstantiableClass(class.name().to_string()));
        }
        Ok(self.instantiate(class, owner, None))
    }

    /// Like [`try_create_widget`](Self::try_create_widget), logging failures.
    pub fn create_widget(&mut self, class: &ClassRef, owner: Scope) -> Option<WidgetId> {
        self.try_create_widget(class, owner)
            .map_err(|e| tracing::error!("failed to create widget: {e}"))
            .ok()
    }

    fn instantiate(&mut self, class: &ClassRef, owner: Scope, parent: Option<WidgetId>) -> WidgetId {
        let id = WidgetId::new();
        let view = (!class.view_models().is_empty()).then(BindingView::default);
        let slot = class.slot().map(|_| SlotWidgetState::default());
        self.widgets.insert(Widget {
            id,
            class: class.clone(),
            owner,
            parent,
            children: Vec::new(),
            entries: Vec::new(),
            pool: None,
            presentation: None,
            context: None,
            view,
            slot,
        });
        let children: Vec<WidgetId> = class
            .children()
            .iter()
            .map(|child| self.instantiate(child, owner, Some(id)))
            .collect();
        if let Some(widget) = self.widgets.get_mut(id) {
            widget.children = children;
        }
        trace!(widget = %id, class = class.name(), "widget created");
        id
    }

    /// Look up a widget.
    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(id)
    }

    /// All widgets.
    pub fn widgets(&self) -> &WidgetArena {
        &self.widgets
    }

    /// Ancestry string of a widget.
    pub fn tree_string(&self, id: WidgetId) -> String {
        self.widgets.tree_string(id)
    }

    /// Indented outline of `root` and everything below it.
    pub fn outline(&self, root: WidgetId) -> String {
        let mut out = String::new();
        let mut pending = vec![(root, 0usize)];
        while let Some((id, depth)) = pending.pop() {
            let Some(widget) = self.widgets.get(id) else {
                continue;
            };
            let mut flags = Vec::new();
            if widget.is_constructed() {
                flags.push("constructed");
            }
            if let Some(extension) = &widget.context {
                flags.push(if extension.initialized { "initialized" } else { "registered" });
            }
            if widget.pool.is_some() {
                flags.push("pooled");
            }
            if let Some(slot) = widget.class.slot() {
                out.push_str(&format!("{}{} [{}]", "  ".repeat(depth), widget.class.name(), slot.tag));
            } else {
                out.push_str(&format!("{}{}", "  ".repeat(depth), widget.class.name()));
            }
            if !flags.is_empty() {
                out.push_str(&format!(" ({})", flags.join(", ")));
            }
            out.push('\n');
            for child in widget.entries.iter().chain(&widget.children).rev() {
                pending.push((*child, depth + 1));
            }
        }
        out
    }

    /// Add `child` as dynamic content of `parent`, constructing it if the
    /// parent is on screen.
    pub fn attach_entry(&mut self, parent: WidgetId, child: WidgetId) -> HudResult<()> {
        if !self.widgets.contains(parent) {
            return Err(HudError::WidgetNotFound(parent));
        }
        self.detach(child)?;
        if let Some(widget) = self.widgets.get_mut(child) {
            widget.parent = Some(parent);
        }
        let parent_constructed = match self.widgets.get_mut(parent) {
            Some(widget) => {
                widget.entries.push(child);
                widget.is_constructed()
            }
            None => false,
        };
        if parent_constructed {
            self.construct_widget(child);
        }
        Ok(())
    }

    /// Remove a widget from its parent, tearing down its presentation.
    pub fn detach(&mut self, child: WidgetId) -> HudResult<()> {
        let widget = self
            .widgets
            .get_mut(child)
            .ok_or(HudError::WidgetNotFound(child))?;
        let Some(parent) = widget.parent.take() else {
            return Ok(());
        };
        if let Some(parent) = self.widgets.get_mut(parent) {
            parent.entries.retain(|id| *id != child);
            parent.children.retain(|id| *id != child);
        }
        self.destruct_widget(child);
        Ok(())
    }

    /// Destroy a widget and everything below it.
    ///
    /// Slots are unregistered and view models released first. Pool-owned
    /// widgets are dropped from their pool's bookkeeping.
    pub fn destroy_widget(&mut self, id: WidgetId) {
        if !self.widgets.contains(id) {
            return;
        }
        if let Err(e) = self.detach(id) {
            warn!("could not detach {id} before destroying it: {e}");
        }
        let mut doomed = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(widget) = self.widgets.get(current) {
                pending.extend(widget.children.iter().chain(&widget.entries).copied());
                doomed.push(current);
            }
        }
        for current in &doomed {
            self.destruct_widget(*current);
            self.unregister_slot_widget(*current);
            self.uninitialize_sources(*current);
        }
        for current in doomed {
            if let Some(widget) = self.widgets.remove(current) {
                if let Some(pool) = widget.pool {
                    self.forget_pooled_widget(pool, current);
                }
                if let Some(pool) = widget.slot.and_then(|slot| slot.pool) {
                    self.destroy_pool(pool);
                }
                trace!(widget = %current, class = widget.class.name(), "widget destroyed");
            }
        }
    }
}
