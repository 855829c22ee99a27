use std::collections::BTreeMap;

/// Field name to value for one platform.
pub type PlatformCredentials = BTreeMap<String, String>;

/// Platform key to its fields, for one project.
pub type CredentialSet = BTreeMap<String, PlatformCredentials>;
