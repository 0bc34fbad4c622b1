//! Host-resolution middleware
//!
//! Runs in front of tenant-facing routes: resolves the Host header to an
//! alias, answers 404 (or the configured fallback redirect) for unknown
//! hosts, issues a permanent redirect to the canonical domain for
//! non-canonical matches that ask for it, and otherwise exposes the
//! resolved site to handlers as a request extension.

use axum::{
    extract::{Request, State},
    http::{
        header::{HOST, LOCATION},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use sitewarden_shared::Alias;

use crate::{
    error::ApiError, site_context::with_current_site, state::AppState, store::AliasStore,
};

/// The site a request was resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedSite {
    pub alias: Alias,
}

impl ResolvedSite {
    pub fn site_id(&self) -> i64 {
        self.alias.site_id
    }
}

/// Split a Host header value into hostname and optional port.
/// Handles bracketed IPv6 literals like `[::1]:8080`.
pub fn split_host_port(host_header: &str) -> (&str, Option<&str>) {
    if let Some(rest) = host_header.strip_prefix('[') {
        if let Some((host, after)) = rest.split_once(']') {
            let port = after.strip_prefix(':').filter(|p| !p.is_empty());
            return (host, port);
        }
        return (host_header, None);
    }
    match host_header.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (host, Some(port))
        }
        _ => (host_header, None),
    }
}

/// A 301 to the canonical domain, preserving the request path and query.
/// Built by hand: axum's `Redirect::permanent` issues a 308.
fn canonical_redirect(scheme: &str, domain: &str, path_and_query: &str) -> Response {
    let target = format!("{scheme}://{domain}{path_and_query}");
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, target)]).into_response()
}

/// Resolve the request's Host header to a site.
pub async fn resolve_site(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(host_header) = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
    else {
        return ApiError::BadRequest("missing Host header".to_string()).into_response();
    };

    let (host, port) = split_host_port(&host_header);

    let alias = match state.resolver.resolve(host, port).await {
        Ok(Some(alias)) => alias,
        Ok(None) => {
            tracing::debug!(host = %host_header, "no alias matches host");
            if let Some(url) = &state.config.fallback_redirect_url {
                return Redirect::temporary(url).into_response();
            }
            return ApiError::UnknownHost(host_header).into_response();
        }
        Err(err) => return ApiError::from(err).into_response(),
    };

    if !alias.is_canonical && alias.redirect_to_canonical {
        match state.resolver.store().canonical_for_site(alias.site_id).await {
            Ok(Some(canonical)) => {
                let path_and_query = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                return canonical_redirect(
                    &state.config.canonical_redirect_scheme,
                    &canonical.domain,
                    path_and_query,
                );
            }
            // No canonical alias to redirect to: serve the match as-is.
            Ok(None) => {}
            Err(err) => return ApiError::from(err).into_response(),
        }
    }

    // Install the task-local site context for the handler, seeded with the
    // resolved site so in-scope reads agree with the extension.
    let context = state.current_site();
    context.set(alias.site_id);
    req.extensions_mut().insert(ResolvedSite { alias });
    with_current_site(context, next.run(req)).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn canonical_redirect_is_an_explicit_301() {
        let response = canonical_redirect("https", "example.com", "/a/b?q=1");
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://example.com/a/b?q=1"
        );
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com"), ("example.com", None));
        assert_eq!(split_host_port("example.com:8080"), ("example.com", Some("8080")));
        assert_eq!(split_host_port("localhost:80"), ("localhost", Some("80")));
        assert_eq!(split_host_port("[::1]:8080"), ("::1", Some("8080")));
        assert_eq!(split_host_port("[::1]"), ("::1", None));
        // Not a port: leave the value intact.
        assert_eq!(split_host_port("example.com:abc"), ("example.com:abc", None));
    }
}
