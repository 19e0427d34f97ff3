use std::collections::{HashMap, VecDeque};
use std::fmt;

use hud_core::HudError;
use tracing::{debug, error};

use crate::class::ClassRef;
use crate::hud::Hud;

/// Widget classes that can be loaded by soft path.
#[derive(Debug, Default)]
pub struct ClassLibrary {
    classes: HashMap<String, ClassRef>,
}

impl ClassLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `class` loadable under `path`, replacing any previous class.
    pub fn register(&mut self, path: impl Into<String>, class: ClassRef) {
        self.classes.insert(path.into(), class);
    }

    /// Look up a class by path.
    pub fn resolve(&self, path: &str) -> Option<ClassRef> {
        self.classes.get(path).cloned()
    }

    /// Returns true if `path` is registered.
    pub fn contains(&self, path: &str) -> bool {
        self.classes.contains_key(path)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Identifies a pending class load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(u64);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

type LoadCallback = Box<dyn FnOnce(&mut Hud, Option<ClassRef>)>;

struct PendingLoad {
    handle: StreamHandle,
    path: String,
    on_loaded: LoadCallback,
}

/// Queue of class loads resolved on the next streaming pump.
#[derive(Default)]
pub struct StreamableManager {
    next: u64,
    pending: VecDeque<PendingLoad>,
}

impl StreamableManager {
    /// Number of loads waiting for the next pump.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for StreamableManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<&str> = self.pending.iter().map(|p| p.path.as_str()).collect();
        f.debug_struct("StreamableManager")
            .field("next", &self.next)
            .field("pending", &paths)
            .finish()
    }
}

impl Hud {
    /// Queue a load of the class at `path`.
    ///
    /// `on_loaded` runs during a later [`update_streaming`](Self::update_streaming)
    /// with the class, or with `None` if the path is unknown or the load is
    /// cancelled.
    pub fn request_class_load(
        &mut self,
        path: impl Into<String>,
        on_loaded: impl FnOnce(&mut Hud, Option<ClassRef>) + 'static,
    ) -> StreamHandle {
        self.streaming.next += 1;
        let handle = StreamHandle(self.streaming.next);
        let path = path.into();
        debug!(stream = %handle, path, "class load requested");
        self.streaming.pending.push_back(PendingLoad {
            handle,
            path,
            on_loaded: Box::new(on_loaded),
        });
        handle
    }

    /// Returns true while the load has not completed or been cancelled.
    pub fn is_stream_pending(&self, handle: StreamHandle) -> bool {
        self.streaming.pending.iter().any(|p| p.handle == handle)
    }

    /// Cancel a pending load. Its callback still runs, with `None`.
    ///
    /// Returns false if the load is no longer pending.
    pub fn cancel_stream(&mut self, handle: StreamHandle) -> bool {
        let Some(index) = self.streaming.pending.iter().position(|p| p.handle == handle) else {
            return false;
        };
        let Some(load) = self.streaming.pending.remove(index) else {
            return false;
        };
        debug!(stream = %handle, path = load.path, "class load cancelled");
        (load.on_loaded)(self, None);
        true
    }

    /// Resolve every load requested before this call, in request order.
    ///
    /// Loads requested by the completion callbacks wait for the next pump.
    /// Returns the number of loads completed.
    pub fn update_streaming(&mut self) -> usize {
        let Some(last) = self.streaming.pending.back().map(|p| p.handle) else {
            return 0;
        };
        let mut completed = 0;
        while self.streaming.pending.front().is_some_and(|p| p.handle <= last) {
            let Some(load) = self.streaming.pending.pop_front() else {
                break;
            };
            let class = self.classes.resolve(&load.path);
            if class.is_none() {
                error!("{}", HudError::ClassNotFound(load.path.clone()));
            }
            debug!(stream = %load.handle, path = load.path, found = class.is_some(), "class load completed");
            (load.on_loaded)(self, class);
            completed += 1;
        }
        completed
    }

    /// Classes available to streamed loads.
    pub fn class_library(&self) -> &ClassLibrary {
        &self.classes
    }

    /// Mutable access to the class library.
    pub fn class_library_mut(&mut self) -> &mut ClassLibrary {
        &mut self.classes
    }

    pub(crate) fn cancel_all_streams(&mut self) {
        while let Some(handle) = self.streaming.pending.front().map(|p| p.handle) {
            self.cancel_stream(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::class::WidgetClass;
    use crate::config::HudConfig;

    type Results = Rc<RefCell<Vec<Option<String>>>>;

    fn recorder(results: &Results) -> impl FnOnce(&mut Hud, Option<ClassRef>) + 'static {
        let results = Rc::clone(results);
        move |_, class| results.borrow_mut().push(class.map(|c| c.name().to_string()))
    }

    #[test]
    fn loads_resolve_on_the_next_pump() {
        let mut hud = Hud::new(HudConfig::default());
        hud.class_library_mut()
            .register("/Game/UI/Inventory", WidgetClass::builder("Inventory").build());
        let results = Results::default();

        let handle = hud.request_class_load("/Game/UI/Inventory", recorder(&results));
        hud.request_class_load("/Game/UI/Missing", recorder(&results));
        assert!(hud.is_stream_pending(handle));
        assert!(results.borrow().is_empty());

        assert_eq!(hud.update_streaming(), 2);
        assert_eq!(*results.borrow(), vec![Some("Inventory".to_string()), None]);
        assert!(!hud.is_stream_pending(handle));
        assert_eq!(hud.update_streaming(), 0);
    }

    #[test]
    fn cancelled_load_completes_with_none() {
        let mut hud = Hud::new(HudConfig::default());
        hud.class_library_mut()
            .register("/Game/UI/Map", WidgetClass::builder("Map").build());
        let results = Results::default();
        let handle = hud.request_class_load("/Game/UI/Map", recorder(&results));

        assert!(hud.cancel_stream(handle));
        assert_eq!(*results.borrow(), vec![None]);
        assert!(!hud.cancel_stream(handle));
        assert_eq!(hud.update_streaming(), 0);
    }

    #[test]
    fn loads_queued_by_callbacks_wait_for_the_next_pump() {
        let mut hud = Hud::new(HudConfig::default());
        let results = Results::default();
        let inner = recorder(&results);
        hud.request_class_load("/Game/UI/A", move |hud, _| {
            hud.request_class_load("/Game/UI/B", inner);
        });

        assert_eq!(hud.update_streaming(), 1);
        assert!(results.borrow().is_empty());
        assert_eq!(hud.update_streaming(), 1);
        assert_eq!(*results.borrow(), vec![None]);
    }
}
