use std::fmt;
use std::rc::Rc;

use hud_core::{Scope, Tag, scope::scopes_match};

use crate::extension::{Extension, ExtensionRequest};
use crate::registry::RegistryHost;

/// Callback a slot runs when a matching extension is added or removed.
///
/// Receives the host so it can create widgets or touch the registry. Returns
/// the widget it materialized (on add) or released (on remove), if any.
pub type SlotCallback<H> = Rc<
    dyn Fn(
        &mut H,
        &ExtensionRequest<<H as RegistryHost>::Class>,
    ) -> Option<<H as RegistryHost>::Widget>,
>;

/// A place that wants content, declared by a widget on screen.
pub struct Slot<H: RegistryHost> {
    pub(crate) id: u64,
    /// The slot's tag; extensions at this tag or any ancestor reach it.
    pub tag: Tag,
    /// Owner scope.
    pub scope: Scope,
    pub(crate) on_add: SlotCallback<H>,
    pub(crate) on_remove: SlotCallback<H>,
}

impl<H: RegistryHost> Slot<H> {
    /// Returns true if `extension` may be delivered to this slot.
    pub fn accepts(&self, extension: &Extension<H::Class>) -> bool {
        self.tag.matches(&extension.tag) && scopes_match(self.scope, extension.scope)
    }
}

impl<H: RegistryHost> fmt::Debug for Slot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
