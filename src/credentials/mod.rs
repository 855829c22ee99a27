//! Editing a project's third-party credentials.
//!
//! [`CredentialEditor`] holds unsaved edits for every configured platform.
//! Testing and saving go through caller-supplied collaborators
//! ([`CredentialTester`], [`CredentialStore`]); neither ever discards edits.
//! Secret values are masked on display and in `Debug` output.

mod templates;

pub use templates::{builtin_templates, FieldTemplate, PlatformTemplate};

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::client::ProjectApi;
use crate::models::{CredentialSet, PlatformCredentials};

const MASK_CHAR: char = '•';
const MAX_MASK_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub platform: String,
    pub field: String,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("platform not configured: {0}")]
    NotConfigured(String),

    #[error("unknown field {field} for platform {platform}")]
    UnknownField { platform: String, field: String },

    #[error("{} required field(s) missing", .0.len())]
    MissingFields(Vec<MissingField>),

    #[error("credential test failed: {0}")]
    Test(String),

    #[error("failed to save credentials: {0}")]
    Save(String),
}

/// Checks a platform's credentials against the real service.
#[async_trait]
pub trait CredentialTester: Send + Sync {
    async fn test(&self, platform: &str, credentials: &PlatformCredentials) -> anyhow::Result<bool>;
}

/// Persists a full credential set.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save(&self, credentials: &CredentialSet) -> anyhow::Result<()>;
}

/// [`CredentialStore`] writing to one project through a [`ProjectApi`].
pub struct ProjectCredentialStore {
    api: Arc<dyn ProjectApi>,
    project_id: i64,
}

impl ProjectCredentialStore {
    pub fn new(api: Arc<dyn ProjectApi>, project_id: i64) -> Self {
        Self { api, project_id }
    }
}

#[async_trait]
impl CredentialStore for ProjectCredentialStore {
    async fn save(&self, credentials: &CredentialSet) -> anyhow::Result<()> {
        self.api
            .save_credentials(self.project_id, credentials)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
    Error(String),
}

pub struct CredentialEditor {
    templates: BTreeMap<String, PlatformTemplate>,
    values: CredentialSet,
    revealed: HashSet<(String, String)>,
    test_results: BTreeMap<String, TestOutcome>,
    dirty: bool,
}

impl CredentialEditor {
    pub fn new(templates: Vec<PlatformTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.key.clone(), t)).collect(),
            values: CredentialSet::new(),
            revealed: HashSet::new(),
            test_results: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Start from previously saved credentials.
    pub fn with_existing(templates: Vec<PlatformTemplate>, existing: CredentialSet) -> Self {
        let mut editor = Self::new(templates);
        editor.values = existing;
        editor
    }

    pub fn template(&self, platform: &str) -> Option<&PlatformTemplate> {
        self.templates.get(platform)
    }

    /// Platforms with a template that are not configured yet.
    pub fn available_platforms(&self) -> Vec<&PlatformTemplate> {
        self.templates
            .values()
            .filter(|t| !self.values.contains_key(&t.key))
            .collect()
    }

    pub fn configured_platforms(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.values
    }

    /// True when there are edits that have not been saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Configure `platform` with its template defaults, discarding any earlier values.
    pub fn add_platform(&mut self, platform: &str) -> Result<(), CredentialError> {
        let template = self
            .templates
            .get(platform)
            .ok_or_else(|| CredentialError::UnknownPlatform(platform.to_string()))?;

        let fields = template
            .fields
            .iter()
            .map(|f| (f.key.clone(), f.default.clone()))
            .collect();
        self.values.insert(platform.to_string(), fields);
        self.forget_ui_state(platform);
        self.dirty = true;
        Ok(())
    }

    /// Remove `platform` and every field it had. Returns whether it was configured.
    pub fn remove_platform(&mut self, platform: &str) -> bool {
        let removed = self.values.remove(platform).is_some();
        self.forget_ui_state(platform);
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Edit one templated field of a configured platform.
    ///
    /// Platforms loaded through [`with_existing`](Self::with_existing) without
    /// a template can be kept or removed but not edited.
    pub fn set_field(
        &mut self,
        platform: &str,
        field: &str,
        value: impl Into<String>,
    ) -> Result<(), CredentialError> {
        let template = self
            .templates
            .get(platform)
            .ok_or_else(|| CredentialError::UnknownPlatform(platform.to_string()))?;
        if template.field(field).is_none() {
            return Err(CredentialError::UnknownField {
                platform: platform.to_string(),
                field: field.to_string(),
            });
        }
        let fields = self
            .values
            .get_mut(platform)
            .ok_or_else(|| CredentialError::NotConfigured(platform.to_string()))?;

        fields.insert(field.to_string(), value.into());
        self.test_results.remove(platform);
        self.dirty = true;
        Ok(())
    }

    pub fn field_value(&self, platform: &str, field: &str) -> Option<&str> {
        self.values
            .get(platform)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    pub fn is_secret(&self, platform: &str, field: &str) -> bool {
        self.templates
            .get(platform)
            .and_then(|t| t.field(field))
            .map(|f| f.secret)
            .unwrap_or(false)
    }

    /// Flip whether a secret field shows its value. Returns the new state.
    pub fn toggle_reveal(&mut self, platform: &str, field: &str) -> bool {
        let key = (platform.to_string(), field.to_string());
        if self.revealed.remove(&key) {
            false
        } else {
            self.revealed.insert(key);
            true
        }
    }

    pub fn is_revealed(&self, platform: &str, field: &str) -> bool {
        self.revealed
            .contains(&(platform.to_string(), field.to_string()))
    }

    /// Value as it should be shown: masked for unrevealed secrets.
    pub fn display_value(&self, platform: &str, field: &str) -> Option<String> {
        let value = self.field_value(platform, field)?;
        if self.is_secret(platform, field) && !self.is_revealed(platform, field) {
            Some(mask(value))
        } else {
            Some(value.to_string())
        }
    }

    /// Required fields that are blank, across every configured platform.
    pub fn missing_fields(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        for (platform, fields) in &self.values {
            let Some(template) = self.templates.get(platform) else {
                continue;
            };
            for field in template.fields.iter().filter(|f| f.required) {
                let blank = fields
                    .get(&field.key)
                    .map(|v| v.trim().is_empty())
                    .unwrap_or(true);
                if blank {
                    missing.push(MissingField {
                        platform: platform.clone(),
                        field: field.key.clone(),
                    });
                }
            }
        }
        missing
    }

    pub fn validate(&self) -> Result<(), CredentialError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CredentialError::MissingFields(missing))
        }
    }

    pub fn test_result(&self, platform: &str) -> Option<&TestOutcome> {
        self.test_results.get(platform)
    }

    /// Run `tester` against one platform's current values.
    ///
    /// Without a tester this is a no-op returning `Ok(None)`. Edits are kept
    /// whatever the outcome.
    pub async fn test_platform(
        &mut self,
        platform: &str,
        tester: Option<&dyn CredentialTester>,
    ) -> Result<Option<bool>, CredentialError> {
        let Some(tester) = tester else {
            return Ok(None);
        };
        let fields = self
            .values
            .get(platform)
            .ok_or_else(|| CredentialError::NotConfigured(platform.to_string()))?;

        match tester.test(platform, fields).await {
            Ok(passed) => {
                tracing::info!(platform, passed, "credential test finished");
                let outcome = if passed {
                    TestOutcome::Passed
                } else {
                    TestOutcome::Failed
                };
                self.test_results.insert(platform.to_string(), outcome);
                Ok(Some(passed))
            }
            Err(e) => {
                tracing::warn!(platform, error = %e, "credential test errored");
                self.test_results
                    .insert(platform.to_string(), TestOutcome::Error(e.to_string()));
                Err(CredentialError::Test(e.to_string()))
            }
        }
    }

    /// Validate, then hand the full set to `store`. On failure every edit stays.
    pub async fn save(&mut self, store: &dyn CredentialStore) -> Result<(), CredentialError> {
        self.validate()?;
        match store.save(&self.values).await {
            Ok(()) => {
                tracing::info!(platforms = self.values.len(), "credentials saved");
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "saving credentials failed");
                Err(CredentialError::Save(e.to_string()))
            }
        }
    }

    fn forget_ui_state(&mut self, platform: &str) {
        self.revealed.retain(|(p, _)| p != platform);
        self.test_results.remove(platform);
    }
}

impl fmt::Debug for CredentialEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked: BTreeMap<&str, BTreeMap<&str, String>> = self
            .values
            .iter()
            .map(|(platform, fields)| {
                let fields = fields
                    .iter()
                    .map(|(field, value)| {
                        let shown = if self.is_secret(platform, field) {
                            mask(value)
                        } else {
                            value.clone()
                        };
                        (field.as_str(), shown)
                    })
                    .collect();
                (platform.as_str(), fields)
            })
            .collect();

        f.debug_struct("CredentialEditor")
            .field("values", &masked)
            .field("dirty", &self.dirty)
            .finish()
    }
}

fn mask(value: &str) -> String {
    std::iter::repeat(MASK_CHAR)
        .take(value.chars().count().min(MAX_MASK_LEN))
        .collect()
}
