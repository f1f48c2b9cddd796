//! Public URL resolution
//!
//! Works out the base path built assets are served from. Precedence is the
//! `PUBLIC_URL` override, then the manifest's `homepage`, then `/`.

use once_cell::sync::Lazy;
use tracing::debug;
use url::{ParseError, Url};

/// Only used to give relative candidates something to parse against
static STUB_BASE: Lazy<Result<Url, ParseError>> =
    Lazy::new(|| Url::parse("https://kickstart.invalid"));

/// Inputs to [`resolve_public_url`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicUrlOptions<'a> {
    pub is_development: bool,
    pub homepage: Option<&'a str>,
    pub env_override: Option<&'a str>,
}

/// Resolve the public URL or path for a build
pub fn resolve_public_url(options: PublicUrlOptions<'_>) -> String {
    if let Some(candidate) = options.env_override.filter(|s| !s.is_empty()) {
        let candidate = with_trailing_slash(candidate);
        return if !options.is_development {
            candidate
        } else if candidate.starts_with('.') {
            "/".to_string()
        } else {
            path_of(&candidate)
        };
    }

    if let Some(homepage) = options.homepage.filter(|s| !s.is_empty()) {
        let candidate = with_trailing_slash(homepage);
        return if candidate.starts_with('.') {
            if options.is_development {
                "/".to_string()
            } else {
                // Relative homepages are kept as written for asset-relative builds
                homepage.to_string()
            }
        } else {
            path_of(&candidate)
        };
    }

    "/".to_string()
}

fn with_trailing_slash(candidate: &str) -> String {
    if candidate.ends_with('/') {
        candidate.to_string()
    } else {
        format!("{}/", candidate)
    }
}

/// Path component of `candidate` parsed against the stub base
fn path_of(candidate: &str) -> String {
    let joined = match &*STUB_BASE {
        Ok(base) => base.join(candidate),
        Err(err) => Err(*err),
    };
    match joined {
        Ok(url) => url.path().to_string(),
        Err(err) => {
            debug!("Could not parse '{}' as a URL ({}), using /", candidate, err);
            "/".to_string()
        }
    }
}
