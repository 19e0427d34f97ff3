use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hud_core::{WidgetContextHandle, WidgetId};

/// Presentation state bound to a widget and fed from its widget context.
pub trait ViewModel: fmt::Debug {
    /// Called once the model's widget context is known.
    fn initialize_with_context(&mut self, _widget: WidgetId, _context: &WidgetContextHandle) {}

    /// Called when the model is released.
    fn deinitialize(&mut self, _widget: WidgetId) {}

    /// Models that need a valid context are left uninitialized without one.
    fn requires_context(&self) -> bool {
        false
    }

    /// Whether the model is registered for ticking at all.
    fn is_allowed_to_tick(&self) -> bool {
        false
    }

    /// Whether a registered model wants the current tick.
    fn is_tickable(&self) -> bool {
        true
    }

    /// Advance the model.
    fn tick(&mut self, _delta_seconds: f32) {}
}

/// Shared handle to a live view model.
pub type ViewModelRef = Rc<RefCell<dyn ViewModel>>;

/// Factory for one kind of view model.
#[derive(Clone)]
pub struct ViewModelClass {
    name: String,
    factory: Rc<dyn Fn() -> ViewModelRef>,
}

impl ViewModelClass {
    /// A class whose instances come from `factory`.
    pub fn new(name: impl Into<String>, factory: impl Fn() -> ViewModelRef + 'static) -> Self {
        Self {
            name: name.into(),
            factory: Rc::new(factory),
        }
    }

    /// A class whose instances are `T::default()`.
    pub fn of<T: ViewModel + Default + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, || Rc::new(RefCell::new(T::default())) as ViewModelRef)
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn instantiate(&self) -> ViewModelRef {
        (self.factory)()
    }
}

impl fmt::Debug for ViewModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewModelClass({})", self.name)
    }
}

/// A view model created for a widget.
#[derive(Debug, Clone)]
pub struct ViewModelBinding {
    /// Name of the model's class.
    pub class_name: String,
    /// The model.
    pub model: ViewModelRef,
    /// False if the model required a context that could not be resolved.
    pub initialized: bool,
}

/// A widget's data-binding view.
#[derive(Debug, Clone, Default)]
pub struct BindingView {
    /// Whether the binding definitions have been loaded.
    pub library_loaded: bool,
    /// Whether the view models have been created.
    pub sources_initialized: bool,
    /// View models created by the last source initialization.
    pub models: Vec<ViewModelBinding>,
}
