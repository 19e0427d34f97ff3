use crate::id::WidgetId;
use crate::scope::PlayerId;
use crate::tag::Tag;

/// Alias for `Result<T, HudError>`.
pub type HudResult<T> = Result<T, HudError>;

/// Caller-contract violations reported by the framework.
///
/// None of these leave partial state behind: an operation that returns one of
/// them has had no effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HudError {
    /// A tag string is not a well-formed dotted tag.
    #[error("malformed tag: \"{0}\"")]
    MalformedTag(String),

    /// An operation required a valid tag and got the empty one.
    #[error("invalid (empty) tag")]
    InvalidTag,

    /// The widget class cannot be instantiated.
    #[error("widget class \"{0}\" cannot be instantiated")]
    NonInstantiableClass(String),

    /// The widget is a primitive and cannot carry a widget context.
    #[error("widget is not a composite widget: {tree}")]
    NotComposite {
        /// Ancestry of the offending widget.
        tree: String,
    },

    /// A widget id does not refer to a live widget.
    #[error("widget not found: {0}")]
    WidgetNotFound(WidgetId),

    /// The widget is already on screen; context must be given before construction.
    #[error("widget is already constructed: {tree}")]
    AlreadyConstructed {
        /// Ancestry of the offending widget.
        tree: String,
    },

    /// The widget already carries a context and cannot be directly initialized again.
    #[error("widget is already registered with a context: {tree}")]
    AlreadyRegistered {
        /// Ancestry of the offending widget.
        tree: String,
    },

    /// The widget belongs to a widget pool and must be initialized through it.
    #[error("widget is pool-owned and must be initialized through its pool: {tree}")]
    PoolOwned {
        /// Ancestry of the offending widget.
        tree: String,
    },

    /// The widget was registered directly and cannot be re-initialized as pooled.
    #[error("widget was not created by a widget pool: {tree}")]
    NotPoolOwned {
        /// Ancestry of the offending widget.
        tree: String,
    },

    /// The widget's binding sources were initialized before context arrived.
    #[error("widget binding sources are already initialized: {tree}")]
    SourcesAlreadyInitialized {
        /// Ancestry of the offending widget.
        tree: String,
    },

    /// A view model requires a context but none could be resolved.
    #[error("view model \"{view_model}\" requires a widget context: {tree}")]
    MissingContext {
        /// Name of the view model class.
        view_model: String,
        /// Ancestry of the widget the model was created for.
        tree: String,
    },

    /// The context payload is not of (or derived from) the requested type.
    #[error("context type mismatch: expected {expected}, found {found}")]
    ContextTypeMismatch {
        /// Requested payload type.
        expected: &'static str,
        /// Actual payload type, or `<empty>`.
        found: &'static str,
    },

    /// No primary layout exists for the given player.
    #[error("no primary layout for {0}")]
    NoPrimaryLayout(PlayerId),

    /// A push or pop required a player scope.
    #[error("operation requires a player scope")]
    MissingScope,

    /// The primary layout has no layer with the given tag.
    #[error("layer not found: {0}")]
    LayerNotFound(Tag),

    /// A layer with the given tag is already registered.
    #[error("layer already registered: {0}")]
    DuplicateLayer(Tag),

    /// The widget is not on the given layer (or on any layer).
    #[error("widget {widget} is not on layer {layer}")]
    NotOnLayer {
        /// The widget that was looked up.
        widget: WidgetId,
        /// The layer that was searched.
        layer: Tag,
    },

    /// The widget pool has no owner capable of creating widgets.
    #[error("widget pool is not initialized")]
    PoolNotInitialized,

    /// A soft class path could not be resolved.
    #[error("widget class not found: \"{0}\"")]
    ClassNotFound(String),
}
