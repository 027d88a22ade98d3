//! Run configuration. Everything is materialized into one struct up front so
//! components take explicit values instead of reading process globals.
use std::path::PathBuf;

use anyhow::Result;

use crate::error::MigrateError;
use crate::util::env::{env_opt, env_parse, env_req, preflight_check};

/// How an asset's remote existence is decided (one per deployment, never per
/// call; the two strategies read incompatible filename conventions).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExistenceStrategy {
    /// A basename that parses as an integer is looked up as that identifier.
    ById,
    /// The extension-stripped basename is matched against remote slugs.
    BySlug,
}

/// Interpretation of the CSV `tags` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagMode {
    /// Comma-separated numeric identifiers, pre-resolved by the operator.
    ById,
    /// Comma-separated names, resolved or created remotely before assembly.
    ByName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Bearer,
}

impl AuthScheme {
    pub fn header_value(&self, token: &str) -> String {
        match self {
            AuthScheme::Basic => format!("Basic {token}"),
            AuthScheme::Bearer => format!("Bearer {token}"),
        }
    }
}

/// Explicit configuration passed into each component.
#[derive(Clone, Debug)]
pub struct MigrateConfig {
    /// Base URL of the remote store's REST prefix, no trailing slash.
    pub base_url: String,
    pub token: String,
    pub auth_scheme: AuthScheme,
    /// Route segment for record creation, e.g. `projects`.
    pub record_route: String,
    pub media_root: PathBuf,
    pub strategy: ExistenceStrategy,
    pub tag_mode: TagMode,
    pub lookup_rps: u32,
    pub upload_rps: u32,
    pub submit_rps: u32,
}

impl MigrateConfig {
    /// Load from the environment. Missing base URL or credential is fatal
    /// before any work starts.
    pub fn from_env() -> Result<Self> {
        preflight_check(
            "folio-migrate",
            &["CONTENT_API_URL", "CONTENT_API_TOKEN"],
            &[
                "CONTENT_API_URL",
                "CONTENT_AUTH_SCHEME",
                "CONTENT_RECORD_ROUTE",
                "MEDIA_ROOT",
                "MEDIA_STRATEGY",
                "TAG_MODE",
            ],
        )
        .map_err(|err| MigrateError::Config(err.to_string()))?;

        let base_url = env_req("CONTENT_API_URL")?
            .trim()
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url)
            .map_err(|err| MigrateError::Config(format!("invalid CONTENT_API_URL: {err}")))?;
        let token = env_req("CONTENT_API_TOKEN")?.trim().to_string();

        let auth_scheme = match env_opt("CONTENT_AUTH_SCHEME").as_deref() {
            Some(s) if s.eq_ignore_ascii_case("bearer") => AuthScheme::Bearer,
            _ => AuthScheme::Basic,
        };
        let strategy = match env_opt("MEDIA_STRATEGY").as_deref() {
            Some(s) if s.eq_ignore_ascii_case("slug") => ExistenceStrategy::BySlug,
            _ => ExistenceStrategy::ById,
        };
        let tag_mode = match env_opt("TAG_MODE").as_deref() {
            Some(s) if s.eq_ignore_ascii_case("name") => TagMode::ByName,
            _ => TagMode::ById,
        };

        Ok(Self {
            base_url,
            token,
            auth_scheme,
            record_route: env_opt("CONTENT_RECORD_ROUTE").unwrap_or_else(|| "projects".into()),
            media_root: PathBuf::from(env_opt("MEDIA_ROOT").unwrap_or_else(|| "media".into())),
            strategy,
            tag_mode,
            lookup_rps: env_parse("LOOKUP_RPS", 3u32),
            upload_rps: env_parse("UPLOAD_RPS", 2u32),
            submit_rps: env_parse("SUBMIT_RPS", 2u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_scheme_header_values() {
        assert_eq!(AuthScheme::Basic.header_value("abc"), "Basic abc");
        assert_eq!(AuthScheme::Bearer.header_value("abc"), "Bearer abc");
    }
}
