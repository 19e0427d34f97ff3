use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use hud_core::{Tag, WidgetContextHandle, WidgetId};
use hud_registry::WidgetClassRef;

use crate::hud::Hud;
use crate::view_model::ViewModelClass;

/// Runs when the context walk reaches a widget of this class.
///
/// Receives the widget's own context. Widgets without a context of their
/// own are walked but not called.
pub type InitTreeCallback = Rc<dyn Fn(&mut Hud, WidgetId, &WidgetContextHandle)>;

/// Runs after a slot widget has materialized an extension, with the data
/// object of the extension's [`ObjectContext`](hud_core::ObjectContext), if any.
pub type ConfigureCallback = Rc<dyn Fn(&mut Hud, WidgetId, Option<Rc<dyn Any>>)>;

/// Declares that widgets of a class host a layout slot.
#[derive(Clone)]
pub struct SlotSpec {
    /// Tag the slot registers under.
    pub tag: Tag,
    /// Whether extension widgets are recycled through a widget pool.
    pub pooled: bool,
    /// Called on every materialized extension widget.
    pub configure: Option<ConfigureCallback>,
}

impl SlotSpec {
    /// A slot at `tag` that creates a fresh widget per extension.
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            pooled: false,
            configure: None,
        }
    }

    /// Recycle extension widgets through a pool owned by the slot widget.
    pub fn pooled(mut self) -> Self {
        self.pooled = true;
        self
    }

    /// Set the configure callback.
    pub fn with_configure(
        mut self,
        configure: impl Fn(&mut Hud, WidgetId, Option<Rc<dyn Any>>) + 'static,
    ) -> Self {
        self.configure = Some(Rc::new(configure));
        self
    }
}

impl fmt::Debug for SlotSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotSpec")
            .field("tag", &self.tag)
            .field("pooled", &self.pooled)
            .field("configure", &self.configure.is_some())
            .finish()
    }
}

/// Static description of a kind of widget.
pub struct WidgetClass {
    name: String,
    instantiable: bool,
    composite: bool,
    children: Vec<ClassRef>,
    view_models: Vec<ViewModelClass>,
    slot: Option<SlotSpec>,
    on_initialize_tree: Option<InitTreeCallback>,
}

impl WidgetClass {
    /// Start describing a composite, instantiable class.
    pub fn builder(name: impl Into<String>) -> WidgetClassBuilder {
        WidgetClassBuilder {
            class: WidgetClass {
                name: name.into(),
                instantiable: true,
                composite: true,
                children: Vec::new(),
                view_models: Vec::new(),
                slot: None,
                on_initialize_tree: None,
            },
        }
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns false for abstract classes.
    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    /// Composite widgets own a widget tree and can carry a widget context;
    /// primitives (borders, panels, text) cannot.
    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Classes instantiated as this class's widget tree, in order.
    pub fn children(&self) -> &[ClassRef] {
        &self.children
    }

    /// View models created when the widget's binding sources initialize.
    pub fn view_models(&self) -> &[ViewModelClass] {
        &self.view_models
    }

    /// The slot this class hosts, if any.
    pub fn slot(&self) -> Option<&SlotSpec> {
        self.slot.as_ref()
    }

    pub(crate) fn on_initialize_tree(&self) -> Option<InitTreeCallback> {
        self.on_initialize_tree.clone()
    }
}

impl fmt::Debug for WidgetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetClass")
            .field("name", &self.name)
            .field("instantiable", &self.instantiable)
            .field("composite", &self.composite)
            .field("children", &self.children)
            .field("view_models", &self.view_models)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WidgetClass`].
pub struct WidgetClassBuilder {
    class: WidgetClass,
}

impl WidgetClassBuilder {
    /// Mark the class abstract.
    pub fn abstract_class(mut self) -> Self {
        self.class.instantiable = false;
        self
    }

    /// Mark the class as a primitive widget.
    pub fn primitive(mut self) -> Self {
        self.class.composite = false;
        self
    }

    /// Append a child to the class's widget tree.
    pub fn with_child(mut self, child: &ClassRef) -> Self {
        self.class.children.push(child.clone());
        self
    }

    /// Add a view model to the class's binding view.
    pub fn with_view_model(mut self, view_model: ViewModelClass) -> Self {
        self.class.view_models.push(view_model);
        self
    }

    /// Make widgets of this class host a layout slot.
    pub fn with_slot(mut self, slot: SlotSpec) -> Self {
        self.class.slot = Some(slot);
        self
    }

    /// Set the context-consumer callback.
    pub fn on_initialize_tree(
        mut self,
        callback: impl Fn(&mut Hud, WidgetId, &WidgetContextHandle) + 'static,
    ) -> Self {
        self.class.on_initialize_tree = Some(Rc::new(callback));
        self
    }

    /// Finish the class.
    pub fn build(self) -> ClassRef {
        ClassRef(Rc::new(self.class))
    }
}

/// Shared reference to a [`WidgetClass`]; compares by identity.
#[derive(Clone)]
pub struct ClassRef(Rc<WidgetClass>);

impl ClassRef {
    /// Returns true if both refer to the same class object.
    pub fn ptr_eq(&self, other: &ClassRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for ClassRef {
    type Target = WidgetClass;

    fn deref(&self) -> &WidgetClass {
        &self.0
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ClassRef {}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({})", self.0.name)
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

impl WidgetClassRef for ClassRef {
    fn class_name(&self) -> &str {
        self.name()
    }

    fn is_instantiable(&self) -> bool {
        self.instantiable
    }
}
