//! Environment configuration.
//!
//! Everything the service needs from its surroundings is read once at
//! startup into [`Settings`] and shared with the handlers from there.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

const KERNEL_DIR: &str = ".local/share/jupyter/kernels/slurm-provisioner-kernel";
const ALLOCATIONS_FILE: &str = ".local/share/jupyter/runtime/slurm_provisioner.json";

const DEFAULT_DOCUMENTATION_HREF: &str = "slurmeldocumentation";
const DEFAULT_BASE_URL: &str = "/";
const DEFAULT_BIND: &str = "127.0.0.1:8889";
const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Home directory without trailing slash, empty if `HOME` is unset.
    pub home: String,
    pub template_path: Option<PathBuf>,
    pub documentation_href: String,
    /// Options service base URL. `None` means derive it from the request.
    pub hub_api_url: Option<String>,
    pub hub_user: Option<String>,
    pub server_name: Option<String>,
    pub base_url: String,
    /// Token callers must present. `None` only together with
    /// `allow_unauthenticated`.
    pub token: Option<String>,
    /// The token was generated at startup rather than configured.
    pub token_generated: bool,
    pub allow_unauthenticated: bool,
    pub bind: String,
    pub workers: usize,
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Random URL-safe token, 32 characters.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an environment lookup.
    ///
    /// Empty values count as unset, except for the two hub identity values
    /// which are passed through as they are. Without `JUPYTER_TOKEN` a
    /// random token is generated unless
    /// `SLURM_PROVISIONER_ALLOW_UNAUTHENTICATED` is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let opt = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let home = lookup("HOME").unwrap_or_default();

        let allow_unauthenticated = opt("SLURM_PROVISIONER_ALLOW_UNAUTHENTICATED")
            .is_some_and(|v| is_truthy(&v));

        let (token, token_generated) = match opt("JUPYTER_TOKEN") {
            Some(token) => (Some(token), false),
            None if allow_unauthenticated => (None, false),
            None => (Some(generate_token()), true),
        };

        Self {
            home: home.trim_end_matches('/').to_string(),
            template_path: opt("SLURMEL_TEMPLATE_PATH").map(PathBuf::from),
            documentation_href: lookup("SLURMEL_DOCUMENTATION_HREF")
                .unwrap_or_else(|| DEFAULT_DOCUMENTATION_HREF.to_string()),
            hub_api_url: opt("JUPYTERHUB_API_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            hub_user: lookup("JUPYTERHUB_USER"),
            server_name: lookup("JUPYTERHUB_SERVER_NAME"),
            base_url: opt("JUPYTER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token,
            token_generated,
            allow_unauthenticated,
            bind: opt("SLURM_PROVISIONER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            workers: opt("SLURM_PROVISIONER_WORKERS")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_WORKERS),
        }
    }

    /// Settings rooted at an explicit home, everything else defaulted.
    /// No token and no open access: every request is rejected until one of
    /// the two is set.
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref().to_string_lossy();

        Self {
            home: home.trim_end_matches('/').to_string(),
            template_path: None,
            documentation_href: DEFAULT_DOCUMENTATION_HREF.to_string(),
            hub_api_url: None,
            hub_user: None,
            server_name: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            token_generated: false,
            allow_unauthenticated: false,
            bind: DEFAULT_BIND.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn kernel_dir(&self) -> PathBuf {
        PathBuf::from(format!("{}/{}", self.home, KERNEL_DIR))
    }

    pub fn kernel_file(&self) -> PathBuf {
        self.kernel_dir().join("kernel.json")
    }

    pub fn allocations_file(&self) -> PathBuf {
        PathBuf::from(format!("{}/{}", self.home, ALLOCATIONS_FILE))
    }
}
