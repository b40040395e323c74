//! Per-request composition of the framework and application artifacts.

use super::error::{RequestError, Result};
use super::settings::{Config, Endpoints, Platform};
use super::sourcemap::merge_source_maps;
use super::utils::http::Fetcher;
use regex::Regex;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

/// Whole-line `//# sourceMappingURL=` directive, including its line break.
static DIRECTIVE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*//[#@] sourceMappingURL=[^\s'"]*[ \t]*(?:\r?\n|$)"#)
        .expect("static regex is valid")
});

/// Directive trailing other code, anchored to the end of its line so string
/// literals that merely contain the marker are left untouched.
static DIRECTIVE_TRAILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?mR)[ \t]*//[#@] sourceMappingURL=[^\s'"]*[ \t]*$"#)
        .expect("static regex is valid")
});

/// Removes every source map location directive from `code`.
///
/// Directives on their own line are removed with their line break so the
/// remaining code keeps its shape. A directive ending a line of code is
/// removed together with the whitespace before it.
pub fn strip_source_map_directives(code: &str) -> Cow<'_, str> {
    match DIRECTIVE_LINE.replace_all(code, "") {
        Cow::Borrowed(code) => DIRECTIVE_TRAILING.replace_all(code, ""),
        Cow::Owned(code) => Cow::Owned(DIRECTIVE_TRAILING.replace_all(&code, "").into_owned()),
    }
}

/// A resolved `.bundle` or `.map` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    /// Platform being requested
    pub platform: Platform,
    /// Raw query string, forwarded verbatim to the framework packager
    pub query: Option<String>,
}

impl BundleRequest {
    /// Resolves the platform from the `platform` query parameter, or from
    /// `entry_name` when the parameter is absent.
    pub fn resolve(config: &Config, entry_name: &str, query: Option<&str>) -> Result<Self> {
        let requested = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "platform")
                .map(|(_, value)| value.into_owned())
        });
        let platform = config.resolve_platform(requested.as_deref(), entry_name)?;

        Ok(Self {
            platform,
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// `?<query>` or the empty string.
    pub fn search(&self) -> String {
        self.query
            .as_deref()
            .map(|q| format!("?{}", q))
            .unwrap_or_default()
    }
}

/// Fetches both backend artifacts and fuses them.
#[derive(Debug, Clone)]
pub struct Composer {
    config: Arc<Config>,
    endpoints: Endpoints,
    fetcher: Fetcher,
}

impl Composer {
    /// Composer for `config`, fetching through `fetcher`.
    pub fn new(config: Arc<Config>, endpoints: Endpoints, fetcher: Fetcher) -> Self {
        Self {
            config,
            endpoints,
            fetcher,
        }
    }

    /// Configuration this composer serves.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds the script for a `.bundle` request.
    ///
    /// Framework code comes first, application code second, followed by one
    /// directive pointing at this server's own `.map` endpoint.
    pub async fn bundle(&self, request: &BundleRequest) -> Result<String> {
        let framework_url = self
            .endpoints
            .framework_code(request.platform, request.query.as_deref());
        let app_url = self.endpoints.app_code(request.platform);

        let (framework, app) = tokio::try_join!(
            self.fetcher.fetch(&framework_url),
            self.fetcher.fetch(&app_url)
        )?;

        let entry = self.entry_for(request.platform)?;
        Ok(concat_bundle(&framework, &app, entry, &request.search()))
    }

    /// Builds the merged source map for a `.map` request.
    pub async fn source_map(&self, request: &BundleRequest) -> Result<String> {
        let query = request.query.as_deref();
        let framework_code_url = self.endpoints.framework_code(request.platform, query);
        let framework_map_url = self.endpoints.framework_map(request.platform, query);
        let app_code_url = self.endpoints.app_code(request.platform);
        let app_map_url = self.endpoints.app_map(request.platform);

        let (framework_code, framework_map, app_code, app_map) = tokio::try_join!(
            self.fetcher.fetch(&framework_code_url),
            self.fetcher.fetch(&framework_map_url),
            self.fetcher.fetch(&app_code_url),
            self.fetcher.fetch(&app_map_url)
        )?;

        // Merge against the same stripped bodies the `.bundle` route serves
        let merged = merge_source_maps(
            &strip_source_map_directives(&framework_code),
            &framework_map,
            &strip_source_map_directives(&app_code),
            &app_map,
        )?;
        Ok(merged)
    }

    fn entry_for(&self, platform: Platform) -> Result<&str> {
        self.config
            .entry_for(platform)
            .ok_or_else(|| RequestError::UnknownPlatform(platform.to_string()))
    }
}

/// Concatenates the two bodies and appends the footer directive.
pub fn concat_bundle(framework: &str, app: &str, entry: &str, search: &str) -> String {
    let framework = strip_source_map_directives(framework);
    let app = strip_source_map_directives(app);

    let mut bundle = String::with_capacity(framework.len() + app.len() + entry.len() + 64);
    bundle.push_str(&framework);
    bundle.push_str(&app);
    bundle.push_str(&format!("//# sourceMappingURL=/{}.map{}", entry, search));
    bundle
}
