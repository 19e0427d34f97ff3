use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use hud_core::{HudError, HudResult, WidgetId};
use tracing::{debug, trace, warn};

use crate::class::ClassRef;
use crate::hud::Hud;
use crate::widget::Presentation;

/// Identifies a widget pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub(crate) u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Recycles widgets of arbitrary classes for one owner.
///
/// Every widget the pool has handed out is either active or inactive, never
/// both.
#[derive(Debug)]
pub struct WidgetPool {
    owner: WidgetId,
    active: Vec<WidgetId>,
    inactive: Vec<WidgetId>,
    cached: HashMap<WidgetId, Rc<Presentation>>,
}

impl WidgetPool {
    fn new(owner: WidgetId) -> Self {
        Self {
            owner,
            active: Vec::new(),
            inactive: Vec::new(),
            cached: HashMap::new(),
        }
    }

    /// The widget whose scope new widgets inherit.
    pub fn owner(&self) -> WidgetId {
        self.owner
    }

    /// Widgets currently handed out.
    pub fn active_widgets(&self) -> &[WidgetId] {
        &self.active
    }

    /// Widgets waiting to be reused.
    pub fn inactive_widgets(&self) -> &[WidgetId] {
        &self.inactive
    }

    /// Returns true if the pool has a cached presentation for `widget`.
    pub fn has_cached_presentation(&self, widget: WidgetId) -> bool {
        self.cached.contains_key(&widget)
    }

    pub(crate) fn cached_presentation(&self, widget: WidgetId) -> Option<Rc<Presentation>> {
        self.cached.get(&widget).cloned()
    }

    fn forget(&mut self, widget: WidgetId) {
        self.active.retain(|id| *id != widget);
        self.inactive.retain(|id| *id != widget);
        self.cached.remove(&widget);
    }
}

impl Hud {
    /// Create an empty pool whose widgets inherit `owner`'s scope.
    pub fn create_pool(&mut self, owner: WidgetId) -> HudResult<PoolId> {
        if !self.widgets.contains(owner) {
            return Err(HudError::WidgetNotFound(owner));
        }
        self.next_pool += 1;
        let id = PoolId(self.next_pool);
        self.pools.insert(id, WidgetPool::new(owner));
        debug!(pool = %id, owner = %owner, "widget pool created");
        Ok(id)
    }

    /// Look up a pool.
    pub fn pool(&self, id: PoolId) -> Option<&WidgetPool> {
        self.pools.get(&id)
    }

    /// Hand out a widget of exactly `class`, reusing an inactive one when
    /// possible, then run `init` on it.
    ///
    /// `init` runs on reused widgets too; it is where the widget gets its new
    /// context.
    pub fn try_pool_get_or_create(
        &mut self,
        pool: PoolId,
        class: &ClassRef,
        init: impl FnOnce(&mut Hud, WidgetId),
    ) -> HudResult<WidgetId> {
        let owner = self.pools.get(&pool).ok_or(HudError::PoolNotInitialized)?.owner;
        let owner_scope = self
            .widgets
            .get(owner)
            .ok_or(HudError::PoolNotInitialized)?
            .owner;
        if !class.is_instantiable() {
            return Err(HudError::NonInstantiableClass(class.name().to_string()));
        }

        let reusable = self.pools.get(&pool).and_then(|p| {
            p.inactive.iter().position(|id| {
                self.widgets
                    .get(*id)
                    .is_some_and(|w| w.class.ptr_eq(class))
            })
        });
        let widget = match reusable {
            Some(index) => {
                let id = self
                    .pools
                    .get_mut(&pool)
                    .ok_or(HudError::PoolNotInitialized)?
                    .inactive
                    .swap_remove(index);
                trace!(pool = %pool, widget = %id, "reusing pooled widget");
                id
            }
            None => {
                let id = self.try_create_widget(class, owner_scope)?;
                if let Some(widget) = self.widgets.get_mut(id) {
                    widget.pool = Some(pool);
                }
                trace!(pool = %pool, widget = %id, class = class.name(), "pool created widget");
                id
            }
        };
        if let Some(entry) = self.pools.get_mut(&pool) {
            entry.active.push(widget);
        }

        init(self, widget);

        let owner_constructed = self.widgets.get(owner).is_some_and(|w| w.is_constructed());
        if owner_constructed
            && let Some(entry) = self.pools.get_mut(&pool)
            && !entry.cached.contains_key(&widget)
        {
            let presentation = match self.widgets.get(widget).and_then(|w| w.presentation.clone()) {
                Some(presentation) => presentation,
                None => Rc::new(Presentation {
                    widget,
                    class_name: class.name().to_string(),
                }),
            };
            entry.cached.insert(widget, presentation);
        }
        Ok(widget)
    }

    /// Like [`try_pool_get_or_create`](Self::try_pool_get_or_create), logging failures.
    pub fn pool_get_or_create(
        &mut self,
        pool: PoolId,
        class: &ClassRef,
        init: impl FnOnce(&mut Hud, WidgetId),
    ) -> Option<WidgetId> {
        self.try_pool_get_or_create(pool, class, init)
            .map_err(|e| warn!("pool could not provide a widget: {e}"))
            .ok()
    }

    /// Move an active widget back to the inactive set.
    ///
    /// The widget's context is marked uninitialized so its next activation
    /// walks its tree again. Callers detach the widget first.
    pub fn pool_release(&mut self, pool: PoolId, widget: WidgetId, release_presentation: bool) {
        let Some(entry) = self.pools.get_mut(&pool) else {
            return;
        };
        let Some(index) = entry.active.iter().position(|id| *id == widget) else {
            return;
        };
        entry.active.swap_remove(index);
        entry.inactive.push(widget);
        if release_presentation {
            entry.cached.remove(&widget);
        }
        if let Some(extension) = self.widgets.get_mut(widget).and_then(|w| w.context.as_mut()) {
            extension.initialized = false;
        }
        trace!(pool = %pool, widget = %widget, "pooled widget released");
    }

    /// Release several widgets.
    pub fn pool_release_many(&mut self, pool: PoolId, widgets: &[WidgetId], release_presentation: bool) {
        for widget in widgets {
            self.pool_release(pool, *widget, release_presentation);
        }
    }

    /// Release every active widget.
    pub fn pool_release_all(&mut self, pool: PoolId, release_presentation: bool) {
        let active = self.pools.get(&pool).map(|p| p.active.clone()).unwrap_or_default();
        self.pool_release_many(pool, &active, release_presentation);
    }

    /// Destroy every inactive widget and stop tracking the active ones.
    pub fn reset_pool(&mut self, pool: PoolId) {
        let Some(entry) = self.pools.get_mut(&pool) else {
            return;
        };
        let inactive = std::mem::take(&mut entry.inactive);
        entry.active.clear();
        entry.cached.clear();
        for widget in inactive {
            self.destroy_widget(widget);
        }
        debug!(pool = %pool, "widget pool reset");
    }

    /// Drop cached presentations of inactive widgets.
    pub fn release_inactive_presentation(&mut self, pool: PoolId) {
        if let Some(entry) = self.pools.get_mut(&pool) {
            let WidgetPool { inactive, cached, .. } = entry;
            for widget in inactive.iter() {
                cached.remove(widget);
            }
        }
    }

    /// Drop every cached presentation.
    pub fn release_all_presentation(&mut self, pool: PoolId) {
        if let Some(entry) = self.pools.get_mut(&pool) {
            entry.cached.clear();
        }
    }

    /// Rebuild cached presentations for active widgets that lack one.
    pub fn rebuild_widgets(&mut self, pool: PoolId) {
        let Some(entry) = self.pools.get(&pool) else {
            return;
        };
        let missing: Vec<(WidgetId, String)> = entry
            .active
            .iter()
            .filter(|id| !entry.cached.contains_key(id))
            .filter_map(|id| self.widgets.get(*id).map(|w| (*id, w.class.name().to_string())))
            .collect();
        let Some(entry) = self.pools.get_mut(&pool) else {
            return;
        };
        for (widget, class_name) in missing {
            entry
                .cached
                .insert(widget, Rc::new(Presentation { widget, class_name }));
        }
    }

    /// Reset a pool and remove it.
    pub fn destroy_pool(&mut self, pool: PoolId) {
        if self.pools.contains_key(&pool) {
            self.reset_pool(pool);
            self.pools.remove(&pool);
        }
    }

    pub(crate) fn forget_pooled_widget(&mut self, pool: PoolId, widget: WidgetId) {
        if let Some(entry) = self.pools.get_mut(&pool) {
            entry.forget(widget);
        }
    }
}

#[cfg(test)]
mod tests {
    use hud_core::{ObjectContext, WidgetContextHandle};
    use proptest::prelude::*;

    use super::*;
    use crate::class::WidgetClass;
    use crate::config::HudConfig;

    fn setup() -> (Hud, PoolId, ClassRef) {
        let mut hud = Hud::new(HudConfig::default());
        let owner_class = WidgetClass::builder("List").build();
        let owner = hud.try_create_widget(&owner_class, None).unwrap();
        let pool = hud.create_pool(owner).unwrap();
        (hud, pool, WidgetClass::builder("Row").build())
    }

    fn activate(hud: &mut Hud, widget: WidgetId) {
        let context = WidgetContextHandle::new(ObjectContext::new(Rc::new(widget.to_string())));
        hud.initialize_widget_from_pool(widget, context);
    }

    #[test]
    fn released_widget_is_reused_and_reinitialized() {
        let (mut hud, pool, row) = setup();
        let first = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        assert!(hud.widget(first).unwrap().context_extension().unwrap().initialized);

        hud.pool_release(pool, first, false);
        let extension = hud.widget(first).unwrap().context_extension().unwrap();
        assert!(extension.from_pool);
        assert!(!extension.initialized);
        assert_eq!(hud.pool(pool).unwrap().inactive_widgets(), &[first]);

        let second = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        assert_eq!(first, second);
        assert!(hud.widget(second).unwrap().context_extension().unwrap().initialized);
        assert!(hud.pool(pool).unwrap().inactive_widgets().is_empty());
    }

    #[test]
    fn reuse_requires_exact_class() {
        let (mut hud, pool, row) = setup();
        let other = WidgetClass::builder("Row").build();
        let first = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        hud.pool_release(pool, first, false);
        let second = hud.try_pool_get_or_create(pool, &other, activate).unwrap();
        assert_ne!(first, second);
        assert_eq!(hud.pool(pool).unwrap().active_widgets(), &[second]);
    }

    #[test]
    fn pooled_widget_rejects_direct_initialization() {
        let (mut hud, pool, row) = setup();
        let widget = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        hud.pool_release(pool, widget, false);
        let err = hud
            .try_initialize_widget(widget, WidgetContextHandle::default())
            .unwrap_err();
        assert!(matches!(err, HudError::PoolOwned { .. }));
    }

    #[test]
    fn directly_registered_widget_rejects_pool_initialization() {
        let (mut hud, _, row) = setup();
        let widget = hud.try_create_widget(&row, None).unwrap();
        hud.register_widget(widget, WidgetContextHandle::default()).unwrap();
        let err = hud
            .try_initialize_widget_from_pool(widget, WidgetContextHandle::default())
            .unwrap_err();
        assert!(matches!(err, HudError::NotPoolOwned { .. }));
    }

    #[test]
    fn missing_pool_is_not_initialized() {
        let (mut hud, _, row) = setup();
        let err = hud
            .try_pool_get_or_create(PoolId(99), &row, |_, _| {})
            .unwrap_err();
        assert_eq!(err, HudError::PoolNotInitialized);
    }

    #[test]
    fn pool_inherits_owner_scope() {
        let mut hud = Hud::new(HudConfig::default());
        let owner_class = WidgetClass::builder("List").build();
        let owner = hud
            .try_create_widget(&owner_class, Some(hud_core::PlayerId(2)))
            .unwrap();
        let pool = hud.create_pool(owner).unwrap();
        let row = WidgetClass::builder("Row").build();
        let widget = hud.try_pool_get_or_create(pool, &row, |_, _| {}).unwrap();
        assert_eq!(hud.widget(widget).unwrap().owner, Some(hud_core::PlayerId(2)));
        assert_eq!(hud.widget(widget).unwrap().pool, Some(pool));
    }

    #[test]
    fn presentations_are_cached_while_the_owner_is_constructed() {
        let (mut hud, pool, row) = setup();
        let owner = hud.pool(pool).unwrap().owner();
        hud.construct_widget(owner);
        let widget = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        assert!(hud.pool(pool).unwrap().has_cached_presentation(widget));

        hud.pool_release(pool, widget, false);
        hud.release_inactive_presentation(pool);
        assert!(!hud.pool(pool).unwrap().has_cached_presentation(widget));

        let again = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        hud.release_all_presentation(pool);
        hud.rebuild_widgets(pool);
        assert!(hud.pool(pool).unwrap().has_cached_presentation(again));
    }

    #[test]
    fn constructing_a_pooled_widget_reuses_the_cached_presentation() {
        let (mut hud, pool, row) = setup();
        let owner = hud.pool(pool).unwrap().owner();
        hud.construct_widget(owner);
        let widget = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        let cached = hud.pool(pool).unwrap().cached_presentation(widget).unwrap();
        hud.attach_entry(owner, widget).unwrap();
        assert!(Rc::ptr_eq(&cached, &hud.presentation(widget).unwrap()));
    }

    #[test]
    fn release_all_and_reset() {
        let (mut hud, pool, row) = setup();
        let a = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        let b = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        hud.pool_release_all(pool, true);
        assert!(hud.pool(pool).unwrap().active_widgets().is_empty());
        assert_eq!(hud.pool(pool).unwrap().inactive_widgets().len(), 2);

        hud.reset_pool(pool);
        assert!(hud.widget(a).is_none());
        assert!(hud.widget(b).is_none());
        assert!(hud.pool(pool).unwrap().inactive_widgets().is_empty());
    }

    #[test]
    fn destroying_a_pooled_widget_forgets_it() {
        let (mut hud, pool, row) = setup();
        let widget = hud.try_pool_get_or_create(pool, &row, activate).unwrap();
        hud.destroy_widget(widget);
        assert!(hud.pool(pool).unwrap().active_widgets().is_empty());
        hud.destroy_pool(pool);
        assert!(hud.pool(pool).is_none());
    }

    proptest! {
        #[test]
        fn every_pooled_widget_is_either_active_or_inactive(
            ops in proptest::collection::vec((any::<bool>(), 0usize..4), 1..40)
        ) {
            let (mut hud, pool, row) = setup();
            let other = WidgetClass::builder("Header").build();
            let mut seen = Vec::new();
            for (acquire, pick) in ops {
                if acquire {
                    let class = if pick % 2 == 0 { &row } else { &other };
                    let widget = hud.try_pool_get_or_create(pool, class, activate).unwrap();
                    if !seen.contains(&widget) {
                        seen.push(widget);
                    }
                } else if let Some(widget) = hud.pool(pool).unwrap().active_widgets().get(pick).copied() {
                    hud.pool_release(pool, widget, pick % 2 == 0);
                }
                let entry = hud.pool(pool).unwrap();
                for widget in &seen {
                    let active = entry.active_widgets().contains(widget);
                    let inactive = entry.inactive_widgets().contains(widget);
                    prop_assert!(active != inactive);
                }
                prop_assert_eq!(
                    entry.active_widgets().len() + entry.inactive_widgets().len(),
                    seen.len()
                );
            }
        }
    }
}
