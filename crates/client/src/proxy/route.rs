//! Per-request routing decisions.
//!
//! Routing is a pure function of the request, the worker's scope and the
//! blocklist, evaluated in a fixed order:
//!
//! 1. Non-GET requests are never intercepted.
//! 2. Cross-origin requests to blocklisted hosts are never intercepted.
//! 3. Navigations get the app shell.
//! 4. Scripts and styles are served stale-while-revalidate.
//! 5. Images and fonts are served cache-first.
//! 6. Anything else same-origin is served cache-first.
//! 7. Anything else cross-origin is left alone.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use shellcache_core::{Method, ProxyRequest};
use url::Url;

use crate::fetch::is_same_origin;

static ASSET_EXTENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(js|mjs|css)$").expect("asset pattern is valid"));

static MEDIA_EXTENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(png|jpg|jpeg|webp|gif|svg|ico|bmp|woff2?|ttf|otf|eot)$").expect("media pattern is valid")
});

/// Resource class derived from the URL path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// Scripts and styles.
    Asset,
    /// Images and fonts.
    Media,
    Other,
}

impl ResourceClass {
    pub fn of(url: &Url) -> Self {
        let path = url.path();
        if ASSET_EXTENSIONS.is_match(path) {
            Self::Asset
        } else if MEDIA_EXTENSIONS.is_match(path) {
            Self::Media
        } else {
            Self::Other
        }
    }
}

/// Hosts whose traffic must never be intercepted.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    hosts: HashSet<String>,
}

impl Blocklist {
    pub fn new<I, H>(hosts: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: AsRef<str>,
    {
        Self { hosts: hosts.into_iter().map(|h| h.as_ref().trim().to_ascii_lowercase()).collect() }
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Why a request was left to default network handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passthrough {
    NonGet,
    Blocklisted,
    CrossOrigin,
    /// No worker has been activated yet.
    NoController,
}

impl Passthrough {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonGet => "non-get",
            Self::Blocklisted => "blocklisted",
            Self::CrossOrigin => "cross-origin",
            Self::NoController => "no-controller",
        }
    }
}

/// Caching policy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Passthrough(Passthrough),
    /// App shell, cache-first with background refresh.
    Navigation,
    /// Stale-while-revalidate against the assets partition.
    Asset,
    /// Cache-first against the media partition.
    Media,
    /// Cache-first against the assets partition.
    SameOrigin,
}

/// Decide how a request is handled.
pub fn route(request: &ProxyRequest, scope: &Url, blocklist: &Blocklist) -> Route {
    if request.method != Method::Get {
        return Route::Passthrough(Passthrough::NonGet);
    }

    let same_origin = is_same_origin(scope, &request.url);

    if !same_origin && request.url.host_str().is_some_and(|host| blocklist.contains(host)) {
        return Route::Passthrough(Passthrough::Blocklisted);
    }

    if request.is_navigation() {
        return Route::Navigation;
    }

    match ResourceClass::of(&request.url) {
        ResourceClass::Asset => Route::Asset,
        ResourceClass::Media => Route::Media,
        ResourceClass::Other if same_origin => Route::SameOrigin,
        ResourceClass::Other => Route::Passthrough(Passthrough::CrossOrigin),
    }
}
