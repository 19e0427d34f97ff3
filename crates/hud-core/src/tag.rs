use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HudError, HudResult};

/// A hierarchical, dotted identifier such as `HUD.Layer.Game`.
///
/// The empty tag is the invalid tag: it has no parent and matches nothing.
/// Every non-empty tag is well formed (non-empty segments made of ASCII
/// alphanumerics, `_` or `-`), so parent walks never produce garbage.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(Arc<str>);

impl Tag {
    /// Parse and validate a tag.
    pub fn new(s: &str) -> HudResult<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let well_formed = s.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
        if !well_formed {
            return Err(HudError::MalformedTag(s.to_string()));
        }
        Ok(Self(Arc::from(s)))
    }

    /// A tag from a literal known to be well formed.
    ///
    /// # Panics
    ///
    /// Panics if `s` is malformed.
    pub fn from_static(s: &'static str) -> Self {
        match Self::new(s) {
            Ok(tag) => tag,
            Err(e) => panic!("{e}"),
        }
    }

    /// The invalid tag.
    pub fn empty() -> Self {
        Self(Arc::from(""))
    }

    /// Returns true for every tag except the empty one.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// The dotted string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of segments (`0` for the empty tag).
    pub fn depth(&self) -> usize {
        if self.is_valid() {
            self.0.split('.').count()
        } else {
            0
        }
    }

    /// The direct parent: `A.B` for `A.B.C`, `None` for a root tag.
    pub fn parent(&self) -> Option<Tag> {
        self.0
            .rsplit_once('.')
            .map(|(head, _)| Self(Arc::from(head)))
    }

    /// This tag followed by each of its parents up to the root.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.is_valid().then(|| self.clone()),
        }
    }

    /// Returns true if `self` is `other` or one of its descendants.
    ///
    /// `A.B.C` matches `A.B.C`, `A.B` and `A`; `A` does not match `A.B`.
    pub fn matches(&self, other: &Tag) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        match self.0.strip_prefix(&*other.0) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", &*self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "<none>")
        }
    }
}

impl FromStr for Tag {
    type Err = HudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = HudError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0.to_string()
    }
}

/// Iterator over a tag and its parents, most specific first.
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<Tag>,
}

impl Iterator for Ancestors {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}
