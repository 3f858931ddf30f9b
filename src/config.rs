use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All configuration the tool ever reads, resolved once at startup.
/// Components receive this struct; nothing below `main` touches the
/// environment directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub project: String,

    /// Azure DevOps personal access token. Usually supplied via ADO_PAT
    /// rather than committed to a config file.
    #[serde(default)]
    pub pat: String,

    #[serde(default)]
    pub llm_api_key: String,

    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    pub default_repo: Option<String>,
    pub reviewer_email: Option<String>,
    pub design_tool_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            organization: String::new(),
            project: String::new(),
            pat: String::new(),
            llm_api_key: String::new(),
            llm_base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            default_repo: None,
            reviewer_email: None,
            design_tool_token: None,
        }
    }
}

impl Config {
    /// Two-tier load: `adoprompt.yml` carries committed team defaults,
    /// `adoprompt.local.yml` overrides it and stays out of version control.
    /// Falls back to `~/.adoprompt.yml` when neither exists. Environment
    /// variables override everything so tokens never need to live on disk.
    pub fn load() -> Result<Self> {
        let mut config = if let Some(base) = Self::read_file(Path::new("adoprompt.yml"))? {
            base
        } else if let Some(home) = dirs::home_dir() {
            Self::read_file(&home.join(".adoprompt.yml"))?.unwrap_or_default()
        } else {
            Config::default()
        };

        if let Some(local) = Self::read_file(Path::new("adoprompt.local.yml"))? {
            config.overlay(local);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Non-default values from `other` win.
    fn overlay(&mut self, other: Config) {
        if !other.organization.is_empty() {
            self.organization = other.organization;
        }
        if !other.project.is_empty() {
            self.project = other.project;
        }
        if !other.pat.is_empty() {
            self.pat = other.pat;
        }
        if !other.llm_api_key.is_empty() {
            self.llm_api_key = other.llm_api_key;
        }
        if other.llm_base_url != default_llm_base_url() {
            self.llm_base_url = other.llm_base_url;
        }
        if other.model != default_model() {
            self.model = other.model;
        }
        if other.temperature != default_temperature() {
            self.temperature = other.temperature;
        }
        if other.max_tokens != default_max_tokens() {
            self.max_tokens = other.max_tokens;
        }
        if other.default_repo.is_some() {
            self.default_repo = other.default_repo;
        }
        if other.reviewer_email.is_some() {
            self.reviewer_email = other.reviewer_email;
        }
        if other.design_tool_token.is_some() {
            self.design_tool_token = other.design_tool_token;
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("ADO_ORGANIZATION") {
            self.organization = value;
        }
        if let Ok(value) = std::env::var("ADO_PROJECT") {
            self.project = value;
        }
        if let Ok(value) = std::env::var("ADO_PAT") {
            self.pat = value;
        }
        if let Ok(value) = std::env::var("LLM_API_KEY") {
            self.llm_api_key = value;
        }
        if let Ok(value) = std::env::var("LLM_BASE_URL") {
            self.llm_base_url = value;
        }
        if let Ok(value) = std::env::var("ADO_DEFAULT_REPO") {
            self.default_repo = Some(value);
        }
        if let Ok(value) = std::env::var("ADO_REVIEWER_EMAIL") {
            self.reviewer_email = Some(value);
        }
        if let Ok(value) = std::env::var("DESIGN_TOOL_TOKEN") {
            self.design_tool_token = Some(value);
        }
    }

    pub fn merge_with_cli(
        &mut self,
        model: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<usize>,
    ) {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(temperature) = temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = max_tokens {
            self.max_tokens = max_tokens;
        }
    }

    /// Check tracker credentials. Reports every missing value at once so
    /// the user fixes their environment in a single pass.
    pub fn validate_tracker(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.organization.is_empty() {
            missing.push("organization (ADO_ORGANIZATION)");
        }
        if self.project.is_empty() {
            missing.push("project (ADO_PROJECT)");
        }
        if self.pat.is_empty() {
            missing.push("pat (ADO_PAT)");
        }
        if !missing.is_empty() {
            bail!("Missing required configuration: {}", missing.join(", "));
        }
        Ok(())
    }

    pub fn validate_llm(&self) -> Result<()> {
        if self.llm_api_key.is_empty() {
            bail!("Missing required configuration: llm_api_key (LLM_API_KEY)");
        }
        Ok(())
    }

    pub fn repo_name(&self, cli_repo: Option<String>) -> Result<String> {
        match cli_repo.or_else(|| self.default_repo.clone()) {
            Some(repo) => Ok(repo),
            None => bail!("No repository given. Pass --repo or set ADO_DEFAULT_REPO"),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> usize {
    4000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_prefers_non_empty_values() {
        let mut base = Config {
            organization: "contoso".to_string(),
            project: "shop".to_string(),
            ..Config::default()
        };
        let local = Config {
            project: "shop-web".to_string(),
            default_repo: Some("shop-api".to_string()),
            ..Config::default()
        };

        base.overlay(local);
        assert_eq!(base.organization, "contoso");
        assert_eq!(base.project, "shop-web");
        assert_eq!(base.default_repo.as_deref(), Some("shop-api"));
    }

    #[test]
    fn overlay_carries_llm_tuning_values() {
        let mut base = Config::default();
        let local = Config {
            temperature: 0.9,
            max_tokens: 512,
            ..Config::default()
        };

        base.overlay(local);
        assert_eq!(base.temperature, 0.9);
        assert_eq!(base.max_tokens, 512);

        // A local file that leaves them at the defaults changes nothing.
        let mut tuned = Config {
            temperature: 0.7,
            max_tokens: 1000,
            ..Config::default()
        };
        tuned.overlay(Config::default());
        assert_eq!(tuned.temperature, 0.7);
        assert_eq!(tuned.max_tokens, 1000);
    }

    #[test]
    fn validate_tracker_lists_every_missing_value() {
        let config = Config::default();
        let err = config.validate_tracker().unwrap_err().to_string();
        assert!(err.contains("organization"));
        assert!(err.contains("project"));
        assert!(err.contains("pat"));
    }

    #[test]
    fn repo_name_prefers_cli_over_default() {
        let config = Config {
            default_repo: Some("fallback".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.repo_name(Some("explicit".to_string())).unwrap(),
            "explicit"
        );
        assert_eq!(config.repo_name(None).unwrap(), "fallback");
        let bare = Config::default();
        assert!(bare.repo_name(None).is_err());
    }

    #[test]
    fn read_file_parses_yaml_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adoprompt.yml");
        std::fs::write(&path, "organization: contoso\npat: secret\n").unwrap();

        let config = Config::read_file(&path).unwrap().unwrap();
        assert_eq!(config.organization, "contoso");
        assert_eq!(config.pat, "secret");

        let missing = Config::read_file(&dir.path().join("missing.yml")).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "organization: contoso\nproject: shop\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.organization, "contoso");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, 4000);
    }
}
