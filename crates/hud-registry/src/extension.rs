use hud_core::{Scope, Tag, WidgetContextHandle};

use crate::handle::ExtensionHandle;

/// Content that wants a place: a widget class to instantiate in every slot
/// its tag reaches.
#[derive(Debug, Clone)]
pub struct Extension<C> {
    pub(crate) id: u64,
    /// Tag of the slots this extension targets (and their descendants).
    pub tag: Tag,
    /// Owner scope; only slots with an equal scope receive the extension.
    pub scope: Scope,
    /// Widget class the slot instantiates.
    pub class: C,
    /// Context handed to the instantiated widget.
    pub context: WidgetContextHandle,
}

/// What a slot callback receives when an extension reaches it.
#[derive(Debug, Clone)]
pub struct ExtensionRequest<C> {
    /// The extension this request came from; slots key their widgets by it.
    pub handle: ExtensionHandle,
    /// The extension's own tag (not the slot's).
    pub tag: Tag,
    /// The extension's scope.
    pub scope: Scope,
    /// Widget class to instantiate.
    pub class: C,
    /// Context to initialize the widget with.
    pub context: WidgetContextHandle,
}

impl<C: Clone> ExtensionRequest<C> {
    pub(crate) fn new(handle: ExtensionHandle, extension: &Extension<C>) -> Self {
        Self {
            handle,
            tag: extension.tag.clone(),
            scope: extension.scope,
            class: extension.class.clone(),
            context: extension.context.clone(),
        }
    }
}
