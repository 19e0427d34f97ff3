use std::fmt;

use serde::{Deserialize, Serialize};

/// A local player, identified by its controller index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// The owner scope of a slot, extension, or widget.
///
/// `None` is the unscoped value. Two scopes match only when they are equal, so
/// an unscoped extension reaches unscoped slots and nothing else.
pub type Scope = Option<PlayerId>;

/// Returns true if a slot and an extension with these scopes may be paired.
pub fn scopes_match(slot: Scope, extension: Scope) -> bool {
    slot == extension
}
