use std::rc::Rc;

use hud_core::WidgetId;
use tracing::trace;

use crate::hud::Hud;
use crate::widget::Presentation;

impl Hud {
    /// Put a widget and everything below it on screen.
    ///
    /// Pool-owned widgets reuse their pool's cached presentation. Binding
    /// sources that were not initialized by a context walk are initialized
    /// now, without context.
    pub fn construct_widget(&mut self, id: WidgetId) {
        let Some(widget) = self.widgets.get(id) else {
            return;
        };
        if widget.is_constructed() {
            return;
        }
        let cached = widget
            .pool
            .and_then(|pool| self.pools.get(&pool))
            .and_then(|pool| pool.cached_presentation(id));
        let reused = cached.is_some();
        let presentation = cached.unwrap_or_else(|| {
            Rc::new(Presentation {
                widget: id,
                class_name: widget.class.name().to_string(),
            })
        });
        let needs_sources = widget.view.as_ref().is_some_and(|v| !v.sources_initialized);
        let hosts_slot = widget.class.slot().is_some();
        if let Some(widget) = self.widgets.get_mut(id) {
            widget.presentation = Some(presentation);
        }
        trace!(widget = %id, reused, "widget constructed");

        if needs_sources {
            self.initialize_sources(id);
        }
        if hosts_slot {
            self.register_slot_widget(id);
        }
        for child in self.below(id) {
            self.construct_widget(child);
        }
    }

    /// Take a widget and everything below it off screen.
    ///
    /// Slot widgets unregister their slot, which removes the widgets their
    /// extensions produced.
    pub fn destruct_widget(&mut self, id: WidgetId) {
        let Some(widget) = self.widgets.get(id) else {
            return;
        };
        if !widget.is_constructed() {
            return;
        }
        self.unregister_slot_widget(id);
        for child in self.below(id) {
            self.destruct_widget(child);
        }
        if let Some(widget) = self.widgets.get_mut(id) {
            widget.presentation = None;
        }
        trace!(widget = %id, "widget destructed");
    }

    /// The widget's presentation while it is constructed.
    pub fn presentation(&self, id: WidgetId) -> Option<Rc<Presentation>> {
        self.widgets.get(id).and_then(|w| w.presentation.clone())
    }

    fn below(&self, id: WidgetId) -> Vec<WidgetId> {
        self.widgets
            .get(id)
            .map(|w| w.children.iter().chain(&w.entries).copied().collect())
            .unwrap_or_default()
    }
}
