//! Design lifecycle configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LOOSEGALLERY_API_KEYS` - Comma-separated API credentials. Each entry is
//!   either `name=key` or a bare key (bare keys are named `default`, `key2`, ...)
//! - `LOOSEGALLERY_RETURN_URL` - Site URL the editor redirects back to
//!
//! ## Optional
//! - `LOOSEGALLERY_API_URL` - GraphQL endpoint (default: `https://api.loosegallery.com/graphql`)
//! - `LOOSEGALLERY_EDITOR_URL` - Editor base URL (default: `https://editor.loosegallery.com`)
//! - `LOOSEGALLERY_LOCK_MODE` - `remote` or `local` (default: `remote`)
//! - `LOOSEGALLERY_LOCK_ON_THANKYOU` - Lock designs on the thank-you page (default: true)
//! - `LOOSEGALLERY_LOCK_ON_COMPLETED` - Lock designs on order completion (default: true)
//! - `LOOSEGALLERY_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `LOOSEGALLERY_FORWARD_API_KEY` - Pass the API key to the editor (default: true)
//! - `LOOSEGALLERY_SESSION_TTL_SECS` - Idle lifetime of visitor designs (default: 7 days)
//! - `LOOSEGALLERY_SESSION_CAPACITY` - Most visitor sessions held in memory
//!   (default: 100000); beyond it sessions are evicted early and a warning is logged
//! - `LOOSEGALLERY_DATABASE_URL` - `PostgreSQL` URL for the durable account tier
//! - `LOOSEGALLERY_EDITOR_{START,EDIT}_{DOMAIN,TEMPLATE,RETURN_URL,API_KEY,PRODUCT,DESIGN}_PARAM` -
//!   Editor query parameter names per operation (defaults: `domain`, `template`,
//!   `return_url`, `api_key`, `productId`, `p`)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::store::DEFAULT_MAX_VISITORS;

/// Default GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api.loosegallery.com/graphql";

/// Default editor base URL.
pub const DEFAULT_EDITOR_URL: &str = "https://editor.loosegallery.com";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Visitor designs idle out after 7 days, matching the storefront session expiry.
const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Whether the remote API supports locking designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockCapability {
    /// Send the `lockAsset` mutation.
    #[default]
    Remote,
    /// The API has no lock concept; locks are recorded locally only.
    LocalOnly,
}

impl std::str::FromStr for LockCapability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" | "local_only" | "local-only" => Ok(Self::LocalOnly),
            _ => Err(format!("expected 'remote' or 'local', got '{s}'")),
        }
    }
}

/// A named API credential.
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct ApiCredential {
    /// Name products use to select this credential.
    pub name: String,
    /// Domain-scoped API key, sent as `x-api-key`.
    pub api_key: SecretString,
}

impl std::fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Remote GraphQL API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// GraphQL endpoint.
    pub endpoint: Url,
    /// Bound on every request.
    pub timeout: Duration,
    /// Whether `lock_design` reaches the remote API.
    pub lock_capability: LockCapability,
    /// Credentials in configuration order; the first is the default.
    pub credentials: Vec<ApiCredential>,
}

/// Query parameter names understood by the editor for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorParamNames {
    pub domain: String,
    pub template: String,
    pub return_url: String,
    pub api_key: String,
    /// Product id the editor should echo back on return.
    pub product: String,
    /// Existing design serial to open for editing.
    pub design: String,
}

impl Default for EditorParamNames {
    fn default() -> Self {
        Self {
            domain: "domain".to_string(),
            template: "template".to_string(),
            return_url: "return_url".to_string(),
            api_key: "api_key".to_string(),
            product: "productId".to_string(),
            design: "p".to_string(),
        }
    }
}

/// Editor deep-link settings.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Editor base URL.
    pub base_url: Url,
    /// Where the editor sends the visitor back to.
    pub return_url: String,
    /// The editor authenticates the domain with the API key in the link.
    pub forward_api_key: bool,
    /// Parameter names for "start design" links.
    pub start_params: EditorParamNames,
    /// Parameter names for "edit design" links.
    pub edit_params: EditorParamNames,
}

/// Which order events lock designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTriggers {
    pub on_thank_you: bool,
    pub on_completed: bool,
}

impl Default for LockTriggers {
    fn default() -> Self {
        Self {
            on_thank_you: true,
            on_completed: true,
        }
    }
}

/// Design lifecycle configuration.
#[derive(Debug, Clone)]
pub struct DesignConfig {
    pub api: ApiConfig,
    pub editor: EditorConfig,
    pub lock_triggers: LockTriggers,
    /// Idle lifetime of the ephemeral (visitor) tier.
    pub session_ttl: Duration,
    /// Most visitor sessions the ephemeral tier holds at once.
    pub session_capacity: u64,
    /// Durable tier database; in-memory when absent.
    pub database_url: Option<SecretString>,
}

impl DesignConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if an API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let credentials = parse_credentials(&vars.required("LOOSEGALLERY_API_KEYS")?)?;
        let endpoint = parse_url(
            "LOOSEGALLERY_API_URL",
            &vars.or_default("LOOSEGALLERY_API_URL", DEFAULT_API_URL),
        )?;
        let timeout = Duration::from_secs(vars.parse_or(
            "LOOSEGALLERY_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        let lock_capability = vars.parse_or("LOOSEGALLERY_LOCK_MODE", LockCapability::Remote)?;

        let editor_base = parse_url(
            "LOOSEGALLERY_EDITOR_URL",
            &vars.or_default("LOOSEGALLERY_EDITOR_URL", DEFAULT_EDITOR_URL),
        )?;
        let return_url = vars.required("LOOSEGALLERY_RETURN_URL")?;
        parse_url("LOOSEGALLERY_RETURN_URL", &return_url)?;

        Ok(Self {
            api: ApiConfig {
                endpoint,
                timeout,
                lock_capability,
                credentials,
            },
            editor: EditorConfig {
                base_url: editor_base,
                return_url,
                forward_api_key: vars.parse_bool_or("LOOSEGALLERY_FORWARD_API_KEY", true)?,
                start_params: editor_params(&vars, "START"),
                edit_params: editor_params(&vars, "EDIT"),
            },
            lock_triggers: LockTriggers {
                on_thank_you: vars.parse_bool_or("LOOSEGALLERY_LOCK_ON_THANKYOU", true)?,
                on_completed: vars.parse_bool_or("LOOSEGALLERY_LOCK_ON_COMPLETED", true)?,
            },
            session_ttl: Duration::from_secs(vars.parse_or(
                "LOOSEGALLERY_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?),
            session_capacity: vars.parse_or("LOOSEGALLERY_SESSION_CAPACITY", DEFAULT_MAX_VISITORS)?,
            database_url: vars.optional("LOOSEGALLERY_DATABASE_URL").map(SecretString::from),
        })
    }

    /// Find a credential by name.
    #[must_use]
    pub fn credential(&self, name: &str) -> Option<&ApiCredential> {
        self.api.credentials.iter().find(|c| c.name == name)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get a required variable; empty counts as missing.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    fn parse_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.optional(key).map_or(Ok(default), |raw| {
            match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidEnvVar(
                    key.to_string(),
                    format!("expected a boolean, got '{raw}'"),
                )),
            }
        })
    }
}

/// Parameter names for one editor operation, each overridable on its own.
fn editor_params<F>(vars: &Vars<'_, F>, operation: &str) -> EditorParamNames
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = EditorParamNames::default();
    let name = |field: &str, default: String| {
        vars.optional(&format!("LOOSEGALLERY_EDITOR_{operation}_{field}_PARAM"))
            .unwrap_or(default)
    };

    EditorParamNames {
        domain: name("DOMAIN", defaults.domain),
        template: name("TEMPLATE", defaults.template),
        return_url: name("RETURN_URL", defaults.return_url),
        api_key: name("API_KEY", defaults.api_key),
        product: name("PRODUCT", defaults.product),
        design: name("DESIGN", defaults.design),
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse `name=key` / bare-key entries.
fn parse_credentials(raw: &str) -> Result<Vec<ApiCredential>, ConfigError> {
    const KEY: &str = "LOOSEGALLERY_API_KEYS";

    let mut credentials: Vec<ApiCredential> = Vec::new();
    for (index, entry) in raw
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .enumerate()
    {
        let (name, key) = match entry.split_once('=') {
            Some((name, key)) => (name.trim().to_string(), key.trim()),
            None if index == 0 => ("default".to_string(), entry),
            None => (format!("key{}", index + 1), entry),
        };

        if name.is_empty() || key.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                KEY.to_string(),
                format!("entry {} must be 'name=key' or a bare key", index + 1),
            ));
        }
        if credentials.iter().any(|c| c.name == name) {
            return Err(ConfigError::InvalidEnvVar(
                KEY.to_string(),
                format!("duplicate credential name '{name}'"),
            ));
        }
        validate_not_placeholder(key, KEY)?;

        credentials.push(ApiCredential {
            name,
            api_key: SecretString::from(key.to_string()),
        });
    }

    if credentials.is_empty() {
        return Err(ConfigError::MissingEnvVar(KEY.to_string()));
    }
    Ok(credentials)
}

/// Reject values copied verbatim from documentation.
fn validate_not_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}
