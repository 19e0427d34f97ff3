use std::fmt;

use uuid::Uuid;

/// Identity of one registry instance; every handle remembers its issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(pub Uuid);

impl RegistryId {
    /// Generate a new random registry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

macro_rules! record_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name {
            inner: Option<(RegistryId, u64)>,
        }

        impl $name {
            pub(crate) fn issue(registry: RegistryId, id: u64) -> Self {
                Self {
                    inner: Some((registry, id)),
                }
            }

            /// Returns true until this copy of the handle is invalidated.
            ///
            /// A valid handle may still be stale if another copy was used to
            /// unregister the record.
            pub fn is_valid(&self) -> bool {
                self.inner.is_some()
            }

            /// Forget the record without unregistering it.
            pub fn invalidate(&mut self) {
                self.inner = None;
            }

            /// The registry that issued this handle.
            pub fn registry(&self) -> Option<RegistryId> {
                self.inner.map(|(registry, _)| registry)
            }

            pub(crate) fn record_id(&self) -> Option<u64> {
                self.inner.map(|(_, id)| id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.inner {
                    Some((registry, id)) => write!(f, "{}#{}@{}", $label, id, registry),
                    None => write!(f, "{}#invalid", $label),
                }
            }
        }
    };
}

record_handle!(
    /// Caller's reference to a registered slot.
    SlotHandle,
    "slot"
);

record_handle!(
    /// Caller's reference to a registered extension.
    ExtensionHandle,
    "extension"
);
