//! # Credential Store
//!
//! Read-mostly registry of platform credentials keyed by `(site, platform)`,
//! loaded once at process start from environment variables of the form
//! `{SITE}_{PLATFORM}_{FIELD}` (e.g. `STUFFGAMING_FR_TWITTER_API_KEY`).
//! The store is injected into the orchestrator; a missing pair fails the one
//! platform task that needed it and nothing else. Secret values never appear
//! in listings or logs, only field names.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capabilities::{Platform, SiteWeb};

/// Required credential fields per platform.
pub fn required_fields(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Twitter => &[
            "api_key",
            "api_secret",
            "access_token",
            "access_token_secret",
        ],
        Platform::Facebook => &["app_id", "app_secret", "access_token", "page_id"],
        Platform::Instagram => &["access_token", "business_account_id"],
        Platform::Linkedin => &["client_id", "client_secret", "access_token"],
    }
}

/// Optional credential fields per platform.
fn optional_fields(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Twitter => &["bearer_token"],
        Platform::Linkedin => &["organization_id"],
        _ => &[],
    }
}

/// One (site, platform) credential set.
#[derive(Debug, Clone)]
pub struct PlatformCredentials {
    pub site: SiteWeb,
    pub platform: Platform,
    values: HashMap<String, String>,
}

impl PlatformCredentials {
    pub fn new(site: SiteWeb, platform: Platform, values: HashMap<String, String>) -> Self {
        Self {
            site,
            platform,
            values,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Field names only; values stay out of listings and logs.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

/// Masked availability report for one (site, platform) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsStatus {
    pub site: SiteWeb,
    pub platform: Platform,
    pub configured: bool,
    pub fields_present: Vec<String>,
    pub missing_fields: Vec<String>,
}

/// Registry of credentials for every configured (site, platform) pair.
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: DashMap<(SiteWeb, Platform), PlatformCredentials>,
}

impl CredentialStore {
    /// Empty store; pairs are added with [`CredentialStore::insert`].
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Scan the environment for every (site, platform) pair and keep the
    /// pairs whose required fields are all present.
    pub fn from_env() -> Self {
        let store = Self::new();
        for &site in SiteWeb::all() {
            for &platform in Platform::all() {
                if let Some(creds) = Self::load_pair_from_env(site, platform) {
                    debug!(
                        site = %site,
                        platform = %platform,
                        "Loaded credentials from environment"
                    );
                    store.insert(creds);
                }
            }
        }
        store
    }

    fn load_pair_from_env(site: SiteWeb, platform: Platform) -> Option<PlatformCredentials> {
        let mut values = HashMap::new();

        for &field in required_fields(platform) {
            let var = format!(
                "{}_{}_{}",
                site.env_prefix(),
                platform.env_prefix(),
                field.to_uppercase()
            );
            values.insert(field.to_string(), std::env::var(&var).ok()?);
        }

        for &field in optional_fields(platform) {
            let var = format!(
                "{}_{}_{}",
                site.env_prefix(),
                platform.env_prefix(),
                field.to_uppercase()
            );
            if let Ok(value) = std::env::var(&var) {
                values.insert(field.to_string(), value);
            }
        }

        // Instagram Business rides on the Facebook app registration.
        if platform == Platform::Instagram {
            for field in ["app_id", "app_secret"] {
                let var = format!("{}_FACEBOOK_{}", site.env_prefix(), field.to_uppercase());
                if let Ok(value) = std::env::var(&var) {
                    values.insert(field.to_string(), value);
                }
            }
        }

        Some(PlatformCredentials::new(site, platform, values))
    }

    pub fn insert(&self, credentials: PlatformCredentials) {
        self.entries
            .insert((credentials.site, credentials.platform), credentials);
    }

    pub fn has_credentials(&self, site: SiteWeb, platform: Platform) -> bool {
        self.entries.contains_key(&(site, platform))
    }

    pub fn get(&self, site: SiteWeb, platform: Platform) -> Option<PlatformCredentials> {
        self.entries.get(&(site, platform)).map(|e| e.clone())
    }

    /// Availability of one pair, with missing required fields named.
    pub fn check(&self, site: SiteWeb, platform: Platform) -> CredentialsStatus {
        match self.entries.get(&(site, platform)) {
            Some(creds) => CredentialsStatus {
                site,
                platform,
                configured: true,
                fields_present: creds.field_names(),
                missing_fields: Vec::new(),
            },
            None => CredentialsStatus {
                site,
                platform,
                configured: false,
                fields_present: Vec::new(),
                missing_fields: required_fields(platform)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        }
    }

    /// Masked status for every known (site, platform) pair.
    pub fn status_report(&self) -> Vec<CredentialsStatus> {
        let mut report = Vec::new();
        for &site in SiteWeb::all() {
            for &platform in Platform::all() {
                report.push(self.check(site, platform));
            }
        }
        report
    }

    pub fn configured_count(&self) -> usize {
        self.entries.len()
    }
}
