//! Domain + event keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Domain used when a binding surface does not name one.
pub const DEFAULT_DOMAIN: &str = "global.default";

/// Separator placed between domain and event in the lookup string.
pub const KEY_SEPARATOR: char = '.';

/// Two-part event key.
///
/// The registry indexes entries by [`EventKey::as_lookup`], a plain
/// `"<domain>.<event>"` concatenation with no escaping. Pairs that
/// concatenate to the same string (`("a.b", "c")` and `("a", "b.c")`)
/// therefore address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub domain: String,
    pub event: String,
}

impl EventKey {
    pub fn new(domain: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            event: event.into(),
        }
    }

    /// Key in [`DEFAULT_DOMAIN`].
    pub fn in_default_domain(event: impl Into<String>) -> Self {
        Self::new(DEFAULT_DOMAIN, event)
    }

    /// Lookup string used by the registry table.
    pub fn as_lookup(&self) -> String {
        let mut lookup = String::with_capacity(self.domain.len() + self.event.len() + 1);
        lookup.push_str(&self.domain);
        lookup.push(KEY_SEPARATOR);
        lookup.push_str(&self.event);
        lookup
    }

    /// Split a lookup string on its last separator.
    ///
    /// Returns `None` when the string contains no separator.
    pub fn parse(lookup: &str) -> Option<Self> {
        lookup
            .rsplit_once(KEY_SEPARATOR)
            .map(|(domain, event)| Self::new(domain, event))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.domain, KEY_SEPARATOR, self.event)
    }
}

impl<D: Into<String>, E: Into<String>> From<(D, E)> for EventKey {
    fn from((domain, event): (D, E)) -> Self {
        Self::new(domain, event)
    }
}
