//! Field layouts for the platforms a project can connect to.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplate {
    pub key: String,
    pub label: String,
    pub secret: bool,
    pub required: bool,
    pub default: String,
}

impl FieldTemplate {
    /// A required, non-secret field.
    pub fn text(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            secret: false,
            required: true,
            default: String::new(),
        }
    }

    /// A required field masked on display.
    pub fn secret(key: &str, label: &str) -> Self {
        Self {
            secret: true,
            ..Self::text(key, label)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default = value.to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTemplate {
    pub key: String,
    pub name: String,
    pub fields: Vec<FieldTemplate>,
}

impl PlatformTemplate {
    pub fn new(key: &str, name: &str, fields: Vec<FieldTemplate>) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldTemplate> {
        self.fields.iter().find(|f| f.key == key)
    }
}

pub fn builtin_templates() -> Vec<PlatformTemplate> {
    vec![
        PlatformTemplate::new(
            "github",
            "GitHub",
            vec![
                FieldTemplate::secret("token", "Personal access token"),
                FieldTemplate::text("repository", "Default repository").optional(),
            ],
        ),
        PlatformTemplate::new(
            "openai",
            "OpenAI",
            vec![
                FieldTemplate::secret("api_key", "API key"),
                FieldTemplate::text("model", "Model").with_default("gpt-4o"),
            ],
        ),
        PlatformTemplate::new(
            "twitter",
            "Twitter / X",
            vec![
                FieldTemplate::secret("api_key", "API key"),
                FieldTemplate::secret("api_secret", "API secret"),
                FieldTemplate::secret("access_token", "Access token"),
                FieldTemplate::secret("access_secret", "Access token secret"),
            ],
        ),
        PlatformTemplate::new(
            "wordpress",
            "WordPress",
            vec![
                FieldTemplate::text("site_url", "Site URL").with_default("https://"),
                FieldTemplate::text("username", "Username"),
                FieldTemplate::secret("application_password", "Application password"),
            ],
        ),
    ]
}
