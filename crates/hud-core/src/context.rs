use std::any::{Any, type_name};
use std::fmt;
use std::rc::Rc;

use crate::error::{HudError, HudResult};

/// Payload carried from gameplay code into a widget tree.
///
/// A payload may embed a more general payload and expose it through
/// [`WidgetContext::base`]; handles then treat the payload as derived from the
/// embedded type. Use [`widget_context!`](crate::widget_context) to implement
/// this trait.
pub trait WidgetContext: Any + fmt::Debug {
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Name of the concrete payload type.
    fn context_type_name(&self) -> &'static str;

    /// The embedded more general payload, if this payload extends one.
    fn base(&self) -> Option<&dyn WidgetContext> {
        None
    }
}

/// Implement [`WidgetContext`] for a payload type.
///
/// ```
/// use hud_core::{ObjectContext, WidgetContextHandle, widget_context};
///
/// #[derive(Debug, Default)]
/// struct InventoryContext {
///     object: ObjectContext,
///     slots: usize,
/// }
/// widget_context!(InventoryContext, base = object);
///
/// let handle = WidgetContextHandle::new(InventoryContext::default());
/// assert!(handle.is_derived_from::<ObjectContext>());
/// ```
#[macro_export]
macro_rules! widget_context {
    ($ty:ty) => {
        impl $crate::context::WidgetContext for $ty {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn context_type_name(&self) -> &'static str {
                ::std::any::type_name::<$ty>()
            }
        }
    };
    ($ty:ty, base = $field:ident) => {
        impl $crate::context::WidgetContext for $ty {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn context_type_name(&self) -> &'static str {
                ::std::any::type_name::<$ty>()
            }

            fn base(&self) -> Option<&dyn $crate::context::WidgetContext> {
                Some(&self.$field)
            }
        }
    };
}

/// Shared, type-erased reference to a widget context payload.
///
/// Cloning shares the payload. A handle is either empty or holds exactly one
/// payload; two handles are equal when they share the same payload (or are
/// both empty).
#[derive(Clone, Default)]
pub struct WidgetContextHandle {
    data: Option<Rc<dyn WidgetContext>>,
}

impl WidgetContextHandle {
    /// Wrap a payload in a new handle.
    pub fn new<T: WidgetContext>(context: T) -> Self {
        Self {
            data: Some(Rc::new(context)),
        }
    }

    /// Share an already reference-counted payload.
    pub fn from_rc<T: WidgetContext>(context: Rc<T>) -> Self {
        Self {
            data: Some(context),
        }
    }

    /// Returns true if the handle holds a payload.
    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    /// Drop this handle's share of the payload.
    pub fn invalidate(&mut self) {
        self.data = None;
    }

    /// The raw payload.
    pub fn payload(&self) -> Option<&dyn WidgetContext> {
        self.data.as_deref()
    }

    /// Name of the concrete payload type, or `<empty>`.
    pub fn context_type_name(&self) -> &'static str {
        self.payload()
            .map_or("<empty>", |payload| payload.context_type_name())
    }

    /// Returns true if the payload is exactly a `T`.
    pub fn is_a<T: WidgetContext>(&self) -> bool {
        self.payload().is_some_and(|payload| payload.as_any().is::<T>())
    }

    /// Returns true if the payload is a `T` or embeds one through its base chain.
    pub fn is_derived_from<T: WidgetContext>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// The payload viewed as `T`, walking the base chain.
    pub fn get<T: WidgetContext>(&self) -> Option<&T> {
        let mut current = self.payload();
        while let Some(payload) = current {
            if let Some(found) = payload.as_any().downcast_ref::<T>() {
                return Some(found);
            }
            current = payload.base();
        }
        None
    }

    /// Like [`get`](Self::get), reporting the mismatch as an error.
    pub fn get_checked<T: WidgetContext>(&self) -> HudResult<&T> {
        self.get::<T>().ok_or_else(|| HudError::ContextTypeMismatch {
            expected: type_name::<T>(),
            found: self.context_type_name(),
        })
    }
}

impl PartialEq for WidgetContextHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for WidgetContextHandle {}

impl fmt::Debug for WidgetContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(payload) => f
                .debug_tuple("WidgetContextHandle")
                .field(payload)
                .finish(),
            None => write!(f, "WidgetContextHandle(<empty>)"),
        }
    }
}

/// The general-purpose payload: an owning gameplay object and an optional
/// data object the widget presents.
#[derive(Clone, Default)]
pub struct ObjectContext {
    /// The gameplay object the widget is about (a pawn, an item, ...).
    pub context_object: Option<Rc<dyn Any>>,
    /// Extra data handed to the widget's configure step.
    pub data_object: Option<Rc<dyn Any>>,
}

impl ObjectContext {
    /// A context about `object` with no data object.
    pub fn new(object: Rc<dyn Any>) -> Self {
        Self {
            context_object: Some(object),
            data_object: None,
        }
    }

    /// Attach a data object.
    pub fn with_data(mut self, data: Rc<dyn Any>) -> Self {
        self.data_object = Some(data);
        self
    }
}

impl fmt::Debug for ObjectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectContext")
            .field("context_object", &self.context_object.is_some())
            .field("data_object", &self.data_object.is_some())
            .finish()
    }
}

widget_context!(ObjectContext);

/// Several context handles carried together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetContextContainer {
    /// The held handles, in insertion order.
    pub handles: Vec<WidgetContextHandle>,
}

impl WidgetContextContainer {
    /// Append a handle.
    pub fn push(&mut self, handle: WidgetContextHandle) {
        self.handles.push(handle);
    }

    /// Visit every payload that is exactly a `T`.
    pub fn for_each_context<T: WidgetContext>(&self, mut f: impl FnMut(&T)) {
        for handle in &self.handles {
            if let Some(context) = handle
                .payload()
                .and_then(|payload| payload.as_any().downcast_ref::<T>())
            {
                f(context);
            }
        }
    }
}
