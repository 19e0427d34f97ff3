use std::rc::Rc;

use hud_core::{ObjectContext, WidgetId};
use hud_registry::{ExtensionRequest, LayoutRegistryExt, SlotCallback};
use tracing::{debug, error, warn};

use crate::class::ClassRef;
use crate::hud::Hud;

impl Hud {
    /// Register the slot a slot widget hosts, if it is not registered yet.
    ///
    /// Matching extensions are materialized as entries of the slot widget
    /// right away and whenever they are registered later.
    pub(crate) fn register_slot_widget(&mut self, id: WidgetId) {
        let Some(widget) = self.widgets.get(id) else {
            return;
        };
        let Some(spec) = widget.class.slot() else {
            return;
        };
        if widget.slot.as_ref().is_some_and(|s| s.handle.is_valid()) {
            return;
        }
        let tag = spec.tag.clone();
        let scope = widget.owner;

        let on_add: SlotCallback<Hud> =
            Rc::new(move |hud: &mut Hud, request: &ExtensionRequest<ClassRef>| hud.add_slot_extension(id, request));
        let on_remove: SlotCallback<Hud> = Rc::new(move |hud: &mut Hud, request: &ExtensionRequest<ClassRef>| {
            hud.remove_slot_extension(id, request)
        });
        let mut handle = self.register_slot(tag.clone(), scope, on_add, on_remove);
        match self.widgets.get_mut(id).and_then(|w| w.slot.as_mut()) {
            Some(state) => state.handle = handle,
            // Destroyed by one of its own replayed extensions.
            None => self.unregister_slot(&mut handle),
        }
        debug!(widget = %id, slot = %tag, "slot widget registered");
    }

    /// Unregister a slot widget's slot, removing every extension widget.
    pub(crate) fn unregister_slot_widget(&mut self, id: WidgetId) {
        let Some(state) = self.widgets.get_mut(id).and_then(|w| w.slot.as_mut()) else {
            return;
        };
        let mut handle = std::mem::take(&mut state.handle);
        if !handle.is_valid() {
            return;
        }
        self.unregister_slot(&mut handle);
        let leftover = self
            .widgets
            .get_mut(id)
            .and_then(|w| w.slot.as_mut())
            .map(|s| std::mem::take(&mut s.active))
            .unwrap_or_default();
        if !leftover.is_empty() {
            warn!(widget = %id, count = leftover.len(), "slot left extension widgets behind");
            for (_, entry) in leftover {
                self.destroy_widget(entry);
            }
        }
        debug!(widget = %id, "slot widget unregistered");
    }

    /// Widgets a slot widget currently shows for its extensions, in arrival order.
    pub fn slot_extension_widgets(&self, id: WidgetId) -> Vec<WidgetId> {
        self.widgets
            .get(id)
            .and_then(|w| w.slot.as_ref())
            .map(|s| s.active.iter().map(|(_, w)| *w).collect())
            .unwrap_or_default()
    }

    fn add_slot_extension(&mut self, slot_widget: WidgetId, request: &ExtensionRequest<ClassRef>) -> Option<WidgetId> {
        let widget = self.widgets.get(slot_widget)?;
        let spec = widget.class.slot()?.clone();
        let owner = widget.owner;
        let context = request.context.clone();

        let entry = if spec.pooled {
            let pool = match widget.slot.as_ref().and_then(|s| s.pool) {
                Some(pool) => pool,
                None => {
                    let pool = self
                        .create_pool(slot_widget)
                        .map_err(|e| error!("slot widget could not create its pool: {e}"))
                        .ok()?;
                    if let Some(state) = self.widgets.get_mut(slot_widget).and_then(|w| w.slot.as_mut()) {
                        state.pool = Some(pool);
                    }
                    pool
                }
            };
            self.pool_get_or_create(pool, &request.class, move |hud, w| {
                hud.initialize_widget_from_pool(w, context);
            })?
        } else {
            let entry = self.create_widget(&request.class, owner)?;
            self.initialize_widget(entry, context);
            entry
        };

        if let Err(e) = self.attach_entry(slot_widget, entry) {
            error!("could not attach extension widget: {e}");
        }
        if let Some(configure) = &spec.configure {
            let data = request
                .context
                .get::<ObjectContext>()
                .and_then(|c| c.data_object.clone());
            configure(self, entry, data);
        }
        if let Some(state) = self.widgets.get_mut(slot_widget).and_then(|w| w.slot.as_mut()) {
            state.active.push((request.handle, entry));
        }
        debug!(slot = %spec.tag, widget = %entry, class = request.class.name(), "extension widget added");
        Some(entry)
    }

    fn remove_slot_extension(
        &mut self,
        slot_widget: WidgetId,
        request: &ExtensionRequest<ClassRef>,
    ) -> Option<WidgetId> {
        let state = self.widgets.get_mut(slot_widget)?.slot.as_mut()?;
        let index = state.active.iter().position(|(handle, _)| *handle == request.handle)?;
        let (_, entry) = state.active.remove(index);
        let pool = state.pool;
        if let Err(e) = self.detach(entry) {
            warn!("extension widget vanished before removal: {e}");
        }
        match pool {
            Some(pool) => self.pool_release(pool, entry, false),
            None => self.destroy_widget(entry),
        }
        debug!(widget = %entry, "extension widget removed");
        Some(entry)
    }
}
