//! Reserved word tables.
//!
//! Two independent sets: one gates subdomain extraction, the other gates
//! path-prefix extraction. A word in one set is not implied in the other.

use std::collections::HashSet;

/// Infrastructure labels that are never a tenant subdomain.
pub const DEFAULT_RESERVED_SUBDOMAINS: &[&str] =
    &["www", "admin", "api", "app", "mercado", "hml", "dev"];

/// Top-level application routes and framework/asset/API prefixes.
pub const DEFAULT_RESERVED_ROUTES: &[&str] = &[
    "_next",
    "api",
    "favicon.ico",
    "images",
    "fonts",
    "login",
    "register",
    "products",
    "cart",
    "checkout",
    "orders",
    "profile",
    "wallet",
    "wishlist",
    "notifications",
    "chat",
    "terms",
    "privacy",
    "about",
    "categories",
    "search",
    "maintenance",
    "forgot-password",
    "verification",
];

/// Case-insensitive set of reserved tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservedWords {
    words: HashSet<String>,
}

impl ReservedWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn default_subdomains() -> Self {
        Self::new(DEFAULT_RESERVED_SUBDOMAINS)
    }

    pub fn default_routes() -> Self {
        Self::new(DEFAULT_RESERVED_ROUTES)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(&token.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Sorted copy of the table, for config dumps and diagnostics.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut out: Vec<String> = self.words.iter().cloned().collect();
        out.sort();
        out
    }
}
