//! Common types used across sitewarden

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// A logical tenant identified by a domain name.
///
/// The domain may be blank; a blank-domain site has no canonical alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: i64,
    pub domain: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A domain-name-to-site binding.
///
/// Domains are unique case-insensitively in the format `hostname` or
/// `hostname:port`, with `*.suffix` and bare `*` wildcards allowed. The
/// canonical alias for a site always carries the site's current domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Alias {
    pub id: i64,
    pub domain: String,
    pub site_id: i64,
    pub is_canonical: bool,
    pub redirect_to_canonical: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Alias {
    /// The hostname portion of the domain, with any `:port` removed.
    pub fn host(&self) -> &str {
        self.domain.split(':').next().unwrap_or(&self.domain)
    }
}

/// Fields for a not-yet-persisted alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlias {
    pub domain: String,
    pub site_id: i64,
    pub is_canonical: bool,
    pub redirect_to_canonical: bool,
}

impl NewAlias {
    /// The canonical alias for a site, mirroring its domain.
    pub fn canonical(site_id: i64, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            site_id,
            is_canonical: true,
            redirect_to_canonical: true,
        }
    }

    /// An additional, non-canonical alias for a site.
    pub fn non_canonical(site_id: i64, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            site_id,
            is_canonical: false,
            redirect_to_canonical: true,
        }
    }
}

/// Validate an alias domain: `hostname` or `hostname:port`, where the
/// hostname may be a `*.suffix` wildcard or the bare `*`.
pub fn is_valid_alias_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let (host, port) = match domain.split_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (domain, None),
    };

    if let Some(port) = port {
        if port.is_empty() || port.len() > 5 || !port.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }

    if host == "*" {
        return true;
    }
    let host = host.strip_prefix("*.").unwrap_or(host);
    if host.is_empty() || host.contains('*') {
        return false;
    }

    for part in host.split('.') {
        if part.is_empty() || part.len() > 63 {
            return false;
        }
        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }
        if !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}
