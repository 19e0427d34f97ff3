use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use hud_core::{HudError, HudResult, Scope, Tag, WidgetContextHandle, scope::scopes_match};
use tracing::{debug, error, trace, warn};

use crate::event::{EventLog, LayoutEvent, LayoutEventKind, ListenerId};
use crate::extension::{Extension, ExtensionRequest};
use crate::handle::{ExtensionHandle, RegistryId, SlotHandle};
use crate::slot::{Slot, SlotCallback};

/// A widget class as the registry sees it.
pub trait WidgetClassRef: Clone + fmt::Debug {
    /// Display name of the class.
    fn class_name(&self) -> &str;

    /// Returns false for abstract classes that cannot be instantiated.
    fn is_instantiable(&self) -> bool;
}

/// The object that owns a [`LayoutRegistry`] and is handed to slot callbacks.
pub trait RegistryHost: Sized + 'static {
    /// Widget class extensions ask slots to instantiate.
    type Class: WidgetClassRef + 'static;
    /// What slot callbacks report back (usually a widget id).
    type Widget: Clone + fmt::Debug + 'static;

    /// The registry owned by this host.
    fn layout_registry(&self) -> &LayoutRegistry<Self>;

    /// Mutable access to the registry owned by this host.
    fn layout_registry_mut(&mut self) -> &mut LayoutRegistry<Self>;
}

type Listener<W> = Rc<dyn Fn(&LayoutEvent<W>)>;

/// Active slots and extensions keyed by tag.
///
/// Read-only queries live here; registration goes through
/// [`LayoutRegistryExt`] on the host.
pub struct LayoutRegistry<H: RegistryHost> {
    id: RegistryId,
    next_record: u64,
    next_sequence: u64,
    slots: BTreeMap<Tag, Vec<Rc<Slot<H>>>>,
    extensions: BTreeMap<Tag, Vec<Rc<Extension<H::Class>>>>,
    slot_tags: HashMap<u64, Tag>,
    extension_tags: HashMap<u64, Tag>,
    next_listener: u64,
    listeners: Vec<(ListenerId, Listener<H::Widget>)>,
    log: EventLog<H::Widget>,
}

impl<H: RegistryHost> LayoutRegistry<H> {
    /// Create an empty registry retaining at most `max_events` events (0 = unlimited).
    pub fn new(max_events: usize) -> Self {
        Self {
            id: RegistryId::new(),
            next_record: 0,
            next_sequence: 0,
            slots: BTreeMap::new(),
            extensions: BTreeMap::new(),
            slot_tags: HashMap::new(),
            extension_tags: HashMap::new(),
            next_listener: 0,
            listeners: Vec::new(),
            log: EventLog::new(max_events),
        }
    }

    /// This registry's identity.
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Number of registered slots.
    pub fn slot_count(&self) -> usize {
        self.slot_tags.len()
    }

    /// Number of registered extensions.
    pub fn extension_count(&self) -> usize {
        self.extension_tags.len()
    }

    /// Returns true if the handle refers to a slot still registered here.
    pub fn is_slot_live(&self, handle: &SlotHandle) -> bool {
        handle.registry() == Some(self.id)
            && handle
                .record_id()
                .is_some_and(|id| self.slot_tags.contains_key(&id))
    }

    /// Returns true if the handle refers to an extension still registered here.
    pub fn is_extension_live(&self, handle: &ExtensionHandle) -> bool {
        handle.registry() == Some(self.id)
            && handle
                .record_id()
                .is_some_and(|id| self.extension_tags.contains_key(&id))
    }

    /// Look up the extension record behind a handle.
    pub fn extension(&self, handle: &ExtensionHandle) -> Option<&Extension<H::Class>> {
        if handle.registry() != Some(self.id) {
            return None;
        }
        let id = handle.record_id()?;
        let tag = self.extension_tags.get(&id)?;
        self.extensions
            .get(tag)?
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.as_ref())
    }

    /// All registered slots, ordered by tag then registration.
    pub fn slots(&self) -> impl Iterator<Item = &Slot<H>> {
        self.slots.values().flatten().map(|s| s.as_ref())
    }

    /// All registered extensions, ordered by tag then registration.
    pub fn extensions(&self) -> impl Iterator<Item = &Extension<H::Class>> {
        self.extensions.values().flatten().map(|e| e.as_ref())
    }

    /// Requests a slot with this tag and scope would receive right now.
    pub fn extensions_for(&self, slot_tag: &Tag, scope: Scope) -> Vec<ExtensionRequest<H::Class>> {
        self.extensions_reaching(slot_tag)
            .iter()
            .filter(|e| scopes_match(scope, e.scope))
            .map(|e| ExtensionRequest::new(self.extension_handle(e), e))
            .collect()
    }

    /// Retained added/removed events.
    pub fn events(&self) -> &EventLog<H::Widget> {
        &self.log
    }

    /// Drop all retained events.
    pub fn clear_events(&mut self) {
        self.log.clear();
    }

    /// Call `listener` for every future added/removed event.
    pub fn subscribe(&mut self, listener: impl Fn(&LayoutEvent<H::Widget>) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Rc::new(listener)));
        id
    }

    /// Stop calling a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Forget every slot and extension without notifying anyone.
    ///
    /// Outstanding handles become stale; unregistering them is a no-op.
    pub fn reset(&mut self) {
        debug!(
            slots = self.slot_count(),
            extensions = self.extension_count(),
            "layout registry reset"
        );
        self.slots.clear();
        self.extensions.clear();
        self.slot_tags.clear();
        self.extension_tags.clear();
    }

    fn next_record_id(&mut self) -> u64 {
        let id = self.next_record;
        self.next_record += 1;
        id
    }

    fn extension_handle(&self, extension: &Extension<H::Class>) -> ExtensionHandle {
        ExtensionHandle::issue(self.id, extension.id)
    }

    fn check_issuer(&self, issuer: Option<RegistryId>) {
        if let Some(issuer) = issuer {
            assert!(
                issuer == self.id,
                "handle issued by registry {issuer} was used with another registry ({})",
                self.id
            );
        }
    }

    fn insert_slot(&mut self, slot: Rc<Slot<H>>) {
        self.slot_tags.insert(slot.id, slot.tag.clone());
        self.slots.entry(slot.tag.clone()).or_default().push(slot);
    }

    fn remove_slot(&mut self, id: u64) -> Option<Rc<Slot<H>>> {
        let tag = self.slot_tags.remove(&id)?;
        let Some(list) = self.slots.get_mut(&tag) else {
            panic!("slot index points at missing tag {tag}");
        };
        let Some(index) = list.iter().position(|r| r.id == id) else {
            panic!("slot {id} missing from tag {tag}");
        };
        let slot = list.remove(index);
        if list.is_empty() {
            self.slots.remove(&tag);
        }
        Some(slot)
    }

    fn insert_extension(&mut self, extension: Rc<Extension<H::Class>>) {
        self.extension_tags
            .insert(extension.id, extension.tag.clone());
        self.extensions
            .entry(extension.tag.clone())
            .or_default()
            .push(extension);
    }

    fn remove_extension(&mut self, id: u64) -> Option<Rc<Extension<H::Class>>> {
        let tag = self.extension_tags.remove(&id)?;
        let Some(list) = self.extensions.get_mut(&tag) else {
            panic!("extension index points at missing tag {tag}");
        };
        let Some(index) = list.iter().position(|r| r.id == id) else {
            panic!("extension {id} missing from tag {tag}");
        };
        let extension = list.remove(index);
        if list.is_empty() {
            self.extensions.remove(&tag);
        }
        Some(extension)
    }

    /// Extensions registered at `slot_tag` or any of its parents, most specific first.
    fn extensions_reaching(&self, slot_tag: &Tag) -> Vec<Rc<Extension<H::Class>>> {
        slot_tag
            .ancestors()
            .filter_map(|level| self.extensions.get(&level))
            .flatten()
            .cloned()
            .collect()
    }

    /// Slots registered at `extension_tag` or any of its descendants.
    fn slots_reached_by(&self, extension_tag: &Tag) -> Vec<Rc<Slot<H>>> {
        self.slots
            .range(extension_tag.clone()..)
            .take_while(|(tag, _)| tag.as_str().starts_with(extension_tag.as_str()))
            .filter(|(tag, _)| tag.matches(extension_tag))
            .flat_map(|(_, slots)| slots.iter().cloned())
            .collect()
    }

    fn broadcast(
        &mut self,
        kind: LayoutEventKind,
        slot: &Slot<H>,
        handle: ExtensionHandle,
        extension: &Extension<H::Class>,
        widget: Option<H::Widget>,
    ) {
        let event = LayoutEvent {
            sequence: self.next_sequence,
            kind,
            slot_tag: slot.tag.clone(),
            extension_tag: extension.tag.clone(),
            extension: handle,
            scope: extension.scope,
            class_name: extension.class.class_name().to_string(),
            widget,
        };
        self.next_sequence += 1;
        trace!(
            slot = %event.slot_tag,
            extension = %event.extension_tag,
            widget = ?event.widget,
            "extension {kind}"
        );
        let listeners: Vec<Listener<H::Widget>> =
            self.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
        for listener in listeners {
            listener(&event);
        }
        self.log.push(event);
    }
}

impl<H: RegistryHost> fmt::Debug for LayoutRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutRegistry")
            .field("id", &self.id)
            .field("slots", &self.slot_count())
            .field("extensions", &self.extension_count())
            .field("listeners", &self.listeners.len())
            .field("events", &self.log.len())
            .finish()
    }
}

/// Registration operations, available on every [`RegistryHost`].
///
/// Each notification snapshots the records it is about to visit, then checks
/// before every callback that both sides are still registered, so callbacks
/// may register or unregister anything.
pub trait LayoutRegistryExt: RegistryHost {
    /// Register a slot and replay every matching extension through `on_add`.
    fn try_register_slot(
        &mut self,
        tag: Tag,
        scope: Scope,
        on_add: SlotCallback<Self>,
        on_remove: SlotCallback<Self>,
    ) -> HudResult<SlotHandle>;

    /// Like [`try_register_slot`](Self::try_register_slot), logging failures
    /// and returning an invalid handle.
    fn register_slot(
        &mut self,
        tag: Tag,
        scope: Scope,
        on_add: SlotCallback<Self>,
        on_remove: SlotCallback<Self>,
    ) -> SlotHandle {
        let shown = tag.to_string();
        match self.try_register_slot(tag, scope, on_add, on_remove) {
            Ok(handle) => handle,
            Err(e) => {
                error!("failed to register layout slot {shown}: {e}");
                SlotHandle::default()
            }
        }
    }

    /// Unregister a slot, replaying matching extensions through its `on_remove`.
    ///
    /// Invalidates `handle`. No-op for invalid or stale handles.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different registry.
    fn unregister_slot(&mut self, handle: &mut SlotHandle);

    /// Register an extension and deliver it to every matching slot.
    fn try_register_extension(
        &mut self,
        tag: Tag,
        class: Self::Class,
        scope: Scope,
        context: WidgetContextHandle,
    ) -> HudResult<ExtensionHandle>;

    /// Register an extension without context, logging failures.
    fn register_extension(&mut self, tag: Tag, class: Self::Class, scope: Scope) -> ExtensionHandle {
        self.register_extension_with_context(tag, class, scope, WidgetContextHandle::default())
    }

    /// Register an extension carrying `context`, logging failures.
    fn register_extension_with_context(
        &mut self,
        tag: Tag,
        class: Self::Class,
        scope: Scope,
        context: WidgetContextHandle,
    ) -> ExtensionHandle {
        let shown = tag.to_string();
        match self.try_register_extension(tag, class, scope, context) {
            Ok(handle) => handle,
            Err(e) => {
                error!("failed to register layout extension {shown}: {e}");
                ExtensionHandle::default()
            }
        }
    }

    /// Unregister an extension, running every matching slot's `on_remove`.
    ///
    /// Invalidates `handle`. No-op for invalid or stale handles.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different registry.
    fn unregister_extension(&mut self, handle: &mut ExtensionHandle);
}

fn deliver<H: RegistryHost>(
    host: &mut H,
    kind: LayoutEventKind,
    slot: &Slot<H>,
    handle: ExtensionHandle,
    extension: &Extension<H::Class>,
) {
    let request = ExtensionRequest::new(handle, extension);
    let callback = match kind {
        LayoutEventKind::ExtensionAdded => Rc::clone(&slot.on_add),
        LayoutEventKind::ExtensionRemoved => Rc::clone(&slot.on_remove),
    };
    let widget = callback(host, &request);
    host.layout_registry_mut()
        .broadcast(kind, slot, handle, extension, widget);
}

impl<H: RegistryHost> LayoutRegistryExt for H {
    fn try_register_slot(
        &mut self,
        tag: Tag,
        scope: Scope,
        on_add: SlotCallback<Self>,
        on_remove: SlotCallback<Self>,
    ) -> HudResult<SlotHandle> {
        if !tag.is_valid() {
            return Err(HudError::InvalidTag);
        }
        let registry = self.layout_registry_mut();
        let slot = Rc::new(Slot {
            id: registry.next_record_id(),
            tag,
            scope,
            on_add,
            on_remove,
        });
        registry.insert_slot(Rc::clone(&slot));
        let handle = SlotHandle::issue(registry.id, slot.id);
        debug!(tag = %slot.tag, scope = ?slot.scope, "slot registered");

        let snapshot = registry.extensions_reaching(&slot.tag);
        for extension in snapshot {
            let registry = self.layout_registry();
            if !registry.slot_tags.contains_key(&slot.id) {
                break;
            }
            if !registry.extension_tags.contains_key(&extension.id) || !slot.accepts(&extension) {
                continue;
            }
            let extension_handle = registry.extension_handle(&extension);
            deliver(self, LayoutEventKind::ExtensionAdded, &slot, extension_handle, &extension);
        }
        Ok(handle)
    }

    fn unregister_slot(&mut self, handle: &mut SlotHandle) {
        if !handle.is_valid() {
            return;
        }
        let registry = self.layout_registry_mut();
        registry.check_issuer(handle.registry());
        let shown = handle.to_string();
        let record = handle.record_id();
        handle.invalidate();

        let Some(slot) = record.and_then(|id| registry.remove_slot(id)) else {
            warn!("{shown} is stale; the slot was already unregistered");
            return;
        };
        debug!(tag = %slot.tag, scope = ?slot.scope, "slot unregistered");

        let snapshot = registry.extensions_reaching(&slot.tag);
        for extension in snapshot {
            let registry = self.layout_registry();
            if !registry.extension_tags.contains_key(&extension.id) || !slot.accepts(&extension) {
                continue;
            }
            let extension_handle = registry.extension_handle(&extension);
            deliver(self, LayoutEventKind::ExtensionRemoved, &slot, extension_handle, &extension);
        }
    }

    fn try_register_extension(
        &mut self,
        tag: Tag,
        class: Self::Class,
        scope: Scope,
        context: WidgetContextHandle,
    ) -> HudResult<ExtensionHandle> {
        if !tag.is_valid() {
            return Err(HudError::InvalidTag);
        }
        if !class.is_instantiable() {
            return Err(HudError::NonInstantiableClass(class.class_name().to_string()));
        }
        let registry = self.layout_registry_mut();
        let extension = Rc::new(Extension {
            id: registry.next_record_id(),
            tag,
            scope,
            class,
            context,
        });
        registry.insert_extension(Rc::clone(&extension));
        let handle = registry.extension_handle(&extension);
        debug!(
            tag = %extension.tag,
            scope = ?extension.scope,
            class = extension.class.class_name(),
            "extension registered"
        );

        let snapshot = registry.slots_reached_by(&extension.tag);
        for slot in snapshot {
            let registry = self.layout_registry();
            if !registry.extension_tags.contains_key(&extension.id) {
                break;
            }
            if !registry.slot_tags.contains_key(&slot.id) || !slot.accepts(&extension) {
                continue;
            }
            deliver(self, LayoutEventKind::ExtensionAdded, &slot, handle, &extension);
        }
        Ok(handle)
    }

    fn unregister_extension(&mut self, handle: &mut ExtensionHandle) {
        if !handle.is_valid() {
            return;
        }
        let registry = self.layout_registry_mut();
        registry.check_issuer(handle.registry());
        let issued = *handle;
        let record = handle.record_id();
        handle.invalidate();

        let Some(extension) = record.and_then(|id| registry.remove_extension(id)) else {
            warn!("{issued} is stale; the extension was already unregistered");
            return;
        };
        debug!(
            tag = %extension.tag,
            scope = ?extension.scope,
            class = extension.class.class_name(),
            "extension unregistered"
        );

        let snapshot = registry.slots_reached_by(&extension.tag);
        for slot in snapshot {
            let registry = self.layout_registry();
            if !registry.slot_tags.contains_key(&slot.id) || !slot.accepts(&extension) {
                continue;
            }
            deliver(self, LayoutEventKind::ExtensionRemoved, &slot, issued, &extension);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use hud_core::PlayerId;
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Class {
        name: &'static str,
        instantiable: bool,
    }

    impl WidgetClassRef for Class {
        fn class_name(&self) -> &str {
            self.name
        }

        fn is_instantiable(&self) -> bool {
            self.instantiable
        }
    }

    fn class(name: &'static str) -> Class {
        Class {
            name,
            instantiable: true,
        }
    }

    struct Host {
        registry: LayoutRegistry<Host>,
        trace: Vec<String>,
        unregister_on_add: Option<ExtensionHandle>,
    }

    impl Host {
        fn new() -> Self {
            Self {
                registry: LayoutRegistry::new(0),
                trace: Vec::new(),
                unregister_on_add: None,
            }
        }

        fn slot(&mut self, tag: &str, scope: Scope) -> SlotHandle {
            let add_label = tag.to_string();
            let remove_label = tag.to_string();
            let on_add: SlotCallback<Host> =
                Rc::new(move |host: &mut Host, req: &ExtensionRequest<Class>| {
                    host.trace
                        .push(format!("{add_label} +{} {}", req.tag, req.class.name));
                    if let Some(mut victim) = host.unregister_on_add.take() {
                        host.unregister_extension(&mut victim);
                    }
                    Some(format!("{}@{add_label}", req.class.name))
                });
            let on_remove: SlotCallback<Host> =
                Rc::new(move |host: &mut Host, req: &ExtensionRequest<Class>| {
                    host.trace
                        .push(format!("{remove_label} -{} {}", req.tag, req.class.name));
                    Some(format!("{}@{remove_label}", req.class.name))
                });
            self.register_slot(tag_of(tag), scope, on_add, on_remove)
        }

        fn extension(&mut self, tag: &str, name: &'static str, scope: Scope) -> ExtensionHandle {
            self.register_extension(tag_of(tag), class(name), scope)
        }
    }

    impl RegistryHost for Host {
        type Class = Class;
        type Widget = String;

        fn layout_registry(&self) -> &LayoutRegistry<Self> {
            &self.registry
        }

        fn layout_registry_mut(&mut self) -> &mut LayoutRegistry<Self> {
            &mut self.registry
        }
    }

    fn tag_of(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    const P1: Scope = Some(PlayerId(1));
    const P2: Scope = Some(PlayerId(2));

    #[test]
    fn extension_at_parent_reaches_descendant_slot() {
        let mut host = Host::new();
        host.extension("A", "W", P1);
        host.slot("A.B.C", P1);
        assert_eq!(host.trace, vec!["A.B.C +A W"]);
    }

    #[test]
    fn slot_at_parent_does_not_receive_child_extension() {
        let mut host = Host::new();
        host.slot("A", P1);
        host.extension("A.B", "W", P1);
        assert!(host.trace.is_empty());
        assert!(host.registry.events().is_empty());
    }

    #[test]
    fn sibling_tags_do_not_match() {
        let mut host = Host::new();
        host.slot("A.B", P1);
        host.slot("AB", P1);
        host.slot("A-B", P1);
        host.extension("A.C", "W", P1);
        host.extension("A.B", "V", P1);
        assert_eq!(host.trace, vec!["A.B +A.B V"]);
    }

    #[test]
    fn registration_order_does_not_change_outcome() {
        let mut slot_first = Host::new();
        slot_first.slot("HUD.Slot.TopBar", P1);
        slot_first.extension("HUD.Slot", "W", P1);

        let mut extension_first = Host::new();
        extension_first.extension("HUD.Slot", "W", P1);
        extension_first.slot("HUD.Slot.TopBar", P1);

        assert_eq!(slot_first.trace, extension_first.trace);
        assert_eq!(slot_first.trace.len(), 1);
    }

    #[test]
    fn top_bar_receives_parent_extension_for_same_player() {
        let mut host = Host::new();
        host.slot("HUD.Slot.TopBar", P1);
        let handle = host.extension("HUD.Slot", "W", P1);

        assert_eq!(host.trace, vec!["HUD.Slot.TopBar +HUD.Slot W"]);
        let events = host.registry.events().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, LayoutEventKind::ExtensionAdded);
        assert_eq!(events[0].extension, handle);
        assert_eq!(events[0].slot_tag, tag_of("HUD.Slot.TopBar"));
        assert_eq!(events[0].extension_tag, tag_of("HUD.Slot"));
        assert_eq!(events[0].widget.as_deref(), Some("W@HUD.Slot.TopBar"));
    }

    #[test]
    fn other_player_extension_is_not_delivered() {
        let mut host = Host::new();
        host.slot("HUD.Slot.TopBar", P1);
        let handle = host.extension("HUD.Slot", "W", P2);
        assert!(handle.is_valid());
        assert!(host.trace.is_empty());
    }

    #[test]
    fn unscoped_extension_reaches_only_unscoped_slots() {
        let mut host = Host::new();
        host.slot("HUD.Slot", None);
        host.slot("HUD.Slot", P1);
        host.extension("HUD.Slot", "Global", None);
        assert_eq!(host.trace, vec!["HUD.Slot +HUD.Slot Global"]);

        host.trace.clear();
        host.extension("HUD.Slot", "Mine", P1);
        assert_eq!(host.trace, vec!["HUD.Slot +HUD.Slot Mine"]);
        assert_eq!(host.registry.extensions_for(&tag_of("HUD.Slot"), None).len(), 1);
    }

    #[test]
    fn unregister_extension_runs_remove_with_same_request() {
        let mut host = Host::new();
        host.slot("HUD.Slot.TopBar", P1);
        let mut handle = host.extension("HUD.Slot", "W", P1);
        let issued = handle;
        host.trace.clear();

        host.unregister_extension(&mut handle);

        assert!(!handle.is_valid());
        assert_eq!(host.trace, vec!["HUD.Slot.TopBar -HUD.Slot W"]);
        assert_eq!(host.registry.extension_count(), 0);
        let removed = host
            .registry
            .events()
            .events_of_kind(LayoutEventKind::ExtensionRemoved);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].extension, issued);
    }

    #[test]
    fn unregister_slot_replays_removals() {
        let mut host = Host::new();
        let mut slot = host.slot("HUD.Slot.TopBar", P1);
        host.extension("HUD", "A", P1);
        host.extension("HUD.Slot.TopBar", "B", P1);
        host.trace.clear();

        host.unregister_slot(&mut slot);

        assert_eq!(
            host.trace,
            vec!["HUD.Slot.TopBar -HUD.Slot.TopBar B", "HUD.Slot.TopBar -HUD A"]
        );
        assert_eq!(host.registry.slot_count(), 0);
    }

    #[test]
    fn unregistering_invalid_handles_is_a_no_op() {
        let mut host = Host::new();
        host.slot("A", None);
        let mut slot = SlotHandle::default();
        let mut extension = ExtensionHandle::default();
        host.unregister_slot(&mut slot);
        host.unregister_extension(&mut extension);
        assert!(host.trace.is_empty());
        assert_eq!(host.registry.slot_count(), 1);
    }

    #[test]
    fn double_unregister_does_nothing_the_second_time() {
        let mut host = Host::new();
        host.slot("A", None);
        let mut handle = host.extension("A", "W", None);
        host.unregister_extension(&mut handle);
        host.trace.clear();
        host.unregister_extension(&mut handle);
        assert!(host.trace.is_empty());
    }

    #[test]
    fn stale_copy_of_a_handle_is_ignored() {
        let mut host = Host::new();
        host.slot("A", None);
        let mut first = host.extension("A", "W", None);
        let mut copy = first;
        host.unregister_extension(&mut first);
        host.trace.clear();

        host.unregister_extension(&mut copy);

        assert!(!copy.is_valid());
        assert!(host.trace.is_empty());
    }

    #[test]
    fn invalid_tag_and_abstract_class_are_rejected() {
        let mut host = Host::new();
        let slot = host.slot("", None);
        assert!(!slot.is_valid());

        let abstract_class = Class {
            name: "Base",
            instantiable: false,
        };
        let err = host
            .try_register_extension(
                tag_of("A"),
                abstract_class.clone(),
                None,
                WidgetContextHandle::default(),
            )
            .unwrap_err();
        assert_eq!(err, HudError::NonInstantiableClass("Base".into()));
        assert!(!host.register_extension(tag_of("A"), abstract_class, None).is_valid());
        assert!(!host.register_extension(Tag::empty(), class("W"), None).is_valid());
        assert_eq!(host.registry.extension_count(), 0);
    }

    #[test]
    fn extensions_unregistered_mid_notification_are_skipped() {
        let mut host = Host::new();
        host.extension("A", "First", None);
        let second = host.extension("A", "Second", None);
        host.unregister_on_add = Some(second);

        host.slot("A", None);

        assert_eq!(host.trace[0], "A +A First");
        assert!(!host.trace.iter().any(|line| line == "A +A Second"));
        assert_eq!(host.registry.extension_count(), 1);
    }

    #[test]
    fn callbacks_may_register_slots_during_notification() {
        let mut host = Host::new();
        let nested = Rc::new(Cell::new(false));
        let flag = Rc::clone(&nested);
        let on_add: SlotCallback<Host> =
            Rc::new(move |host: &mut Host, req: &ExtensionRequest<Class>| -> Option<String> {
                host.trace.push(format!("outer +{}", req.class.name));
                if !flag.replace(true) {
                    host.slot("A.Inner", None);
                }
                None
            });
        let on_remove: SlotCallback<Host> = Rc::new(|_: &mut Host, _: &ExtensionRequest<Class>| -> Option<String> { None });
        host.register_slot(tag_of("A"), None, on_add, on_remove);

        host.extension("A", "W", None);

        assert!(nested.get());
        assert_eq!(host.trace, vec!["outer +W", "A.Inner +A W"]);
    }

    #[test]
    fn listeners_see_every_delivery_until_unsubscribed() {
        let mut host = Host::new();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let listener = host.registry.subscribe(move |_| counter.set(counter.get() + 1));

        host.slot("A.B", None);
        host.slot("A", None);
        host.extension("A", "W", None);
        assert_eq!(seen.get(), 2);

        assert!(host.registry.unsubscribe(listener));
        assert!(!host.registry.unsubscribe(listener));
        host.extension("A", "V", None);
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn reset_forgets_everything_silently() {
        let mut host = Host::new();
        let mut slot = host.slot("A", None);
        let mut extension = host.extension("A", "W", None);
        host.trace.clear();

        host.registry.reset();
        assert_eq!(host.registry.slot_count(), 0);
        assert_eq!(host.registry.extension_count(), 0);
        assert!(!host.registry.is_slot_live(&slot));

        host.unregister_slot(&mut slot);
        host.unregister_extension(&mut extension);
        assert!(host.trace.is_empty());
    }

    #[test]
    fn extension_lookup_by_handle() {
        let mut host = Host::new();
        let handle = host.extension("HUD.Slot", "W", P1);
        let record = host.registry.extension(&handle).unwrap();
        assert_eq!(record.tag, tag_of("HUD.Slot"));
        assert_eq!(record.class, class("W"));
        assert!(host.registry.extension(&ExtensionHandle::default()).is_none());
    }

    #[test]
    #[should_panic(expected = "another registry")]
    fn handle_from_another_registry_panics() {
        let mut issuer = Host::new();
        let mut other = Host::new();
        let mut handle = issuer.extension("A", "W", None);
        other.unregister_extension(&mut handle);
    }

    fn dotted() -> impl Strategy<Value = String> {
        prop::collection::vec("[A-C]", 1..4).prop_map(|segments| segments.join("."))
    }

    proptest! {
        #[test]
        fn delivery_follows_ancestor_walk_in_either_order(slot in dotted(), ext in dotted()) {
            let expected = tag_of(&slot).ancestors().any(|t| t == tag_of(&ext));

            let mut slot_first = Host::new();
            slot_first.slot(&slot, P1);
            slot_first.extension(&ext, "W", P1);

            let mut extension_first = Host::new();
            extension_first.extension(&ext, "W", P1);
            extension_first.slot(&slot, P1);

            prop_assert_eq!(slot_first.trace.len(), usize::from(expected));
            prop_assert_eq!(&slot_first.trace, &extension_first.trace);
        }
    }
}
