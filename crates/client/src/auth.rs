//! Base-URL normalization and split-scope credential resolution.

use sk_domain::config::SkClientConfig;
use sk_domain::error::{Error, Result};

/// Credential scope of a request. `Write` is any non-GET/HEAD/OPTIONS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    Read,
    Write,
}

impl AuthScope {
    pub fn for_method(method: &reqwest::Method) -> Self {
        match *method {
            reqwest::Method::GET | reqwest::Method::HEAD | reqwest::Method::OPTIONS => {
                AuthScope::Read
            }
            _ => AuthScope::Write,
        }
    }
}

/// Normalize a configured base URL to the canonical `<scheme>://host/.../api`.
///
/// Strips a trailing `/api/integrations/openclaw` or `/api` (users paste
/// both shapes) and re-appends `/api`.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config("super-kanban base URL is empty".into()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(Error::Config(format!(
            "super-kanban base URL must be http(s): {trimmed:?}"
        )));
    }

    let root = trimmed
        .strip_suffix("/api/integrations/openclaw")
        .or_else(|| trimmed.strip_suffix("/api"))
        .unwrap_or(trimmed);
    Ok(format!("{root}/api"))
}

/// A resolved `(header-name, header-value)` pair.
pub type HeaderPair = (String, String);

/// Resolves credentials for each scope from the client config.
///
/// Resolution order:
/// 1. per-scope header override
/// 2. legacy global header (only when neither scope header is configured)
/// 3. read → bearer token, else API key
/// 4. write → API key, else bearer token
/// 5. otherwise `AuthMissing`
#[derive(Debug, Clone)]
pub struct AuthScopes {
    read_header: Option<HeaderPair>,
    write_header: Option<HeaderPair>,
    legacy_header: Option<HeaderPair>,
    bearer_token: Option<String>,
    api_key: Option<String>,
}

impl AuthScopes {
    pub fn from_config(config: &SkClientConfig) -> Result<Self> {
        Ok(Self {
            read_header: parse_header_pair(config.read_auth_header.as_deref())?,
            write_header: parse_header_pair(config.write_auth_header.as_deref())?,
            legacy_header: parse_header_pair(config.auth_header.as_deref())?,
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    /// Resolve the header pair to attach for `scope`.
    pub fn resolve(&self, scope: AuthScope) -> Result<HeaderPair> {
        let scoped = match scope {
            AuthScope::Read => &self.read_header,
            AuthScope::Write => &self.write_header,
        };
        if let Some(pair) = scoped {
            return Ok(pair.clone());
        }
        if self.read_header.is_none() && self.write_header.is_none() {
            if let Some(pair) = &self.legacy_header {
                return Ok(pair.clone());
            }
        }

        let bearer = || {
            self.bearer_token
                .as_ref()
                .map(|t| ("Authorization".to_owned(), format!("Bearer {t}")))
        };
        let key = || {
            self.api_key
                .as_ref()
                .map(|k| ("X-Api-Key".to_owned(), k.clone()))
        };

        let resolved = match scope {
            AuthScope::Read => bearer().or_else(key),
            AuthScope::Write => key().or_else(bearer),
        };
        resolved.ok_or_else(|| {
            Error::AuthMissing(format!(
                "no credential resolvable for {} scope",
                match scope {
                    AuthScope::Read => "read",
                    AuthScope::Write => "write",
                }
            ))
        })
    }

    /// Fail fast at startup when neither scope can resolve.
    pub fn check(&self) -> Result<()> {
        self.resolve(AuthScope::Read)?;
        self.resolve(AuthScope::Write)?;
        Ok(())
    }
}

fn parse_header_pair(raw: Option<&str>) -> Result<Option<HeaderPair>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let (name, value) = raw.split_once(':').ok_or_else(|| {
        Error::Config(format!("auth header must be 'Name: value', got {raw:?}"))
    })?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return Err(Error::Config(format!("malformed auth header {raw:?}")));
    }
    Ok(Some((name.to_owned(), value.to_owned())))
}
