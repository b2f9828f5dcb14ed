use clap::Parser;
use once_cell::sync::Lazy;
use thiserror::Error;

/// Page size applied by the document store when a list query carries no limit.
pub const DEFAULT_PAGE_SIZE: u64 = 25;

pub const STUDENT_EMAIL_MAX_ATTEMPTS: usize = 5;
pub const GENERATED_PASSWORD_LENGTH: usize = 12;

pub static APP_CONFIG: Lazy<Config> = Lazy::new(Config::parse);

#[derive(Debug, Parser, Clone)]
pub struct Config {
    #[clap(long, env, default_value_t = 8080)]
    pub port: u16,

    #[clap(long, env, default_value_t = true)]
    pub swagger_enabled: bool,

    #[clap(long, env, default_value = "info")]
    pub log_level: String,

    #[clap(long, env)]
    pub database_url: String,

    #[clap(long, env, default_value = "local")]
    pub app_env: String,

    #[clap(long, env, default_value = "*")]
    pub cors_allowed_origins: String,

    #[clap(long, env, default_value = "faculty")]
    pub faculty_collection_id: String,

    #[clap(long, env, default_value = "section")]
    pub section_collection_id: String,

    #[clap(long, env, default_value = "student")]
    pub student_collection_id: String,

    #[clap(long, env, default_value = "parent")]
    pub parent_collection_id: String,

    #[clap(long, env, default_value = "users")]
    pub user_collection_id: String,

    #[clap(long, env, default_value = "attachments")]
    pub attachment_bucket_id: String,

    /// Base URL of a remote identity service. The in-process signup service is
    /// used when unset.
    #[clap(long, env)]
    pub identity_url: Option<String>,

    #[clap(long, env, default_value = "school.edu")]
    pub student_email_domain: String,

    #[clap(long, env, default_value = "./uploads")]
    pub upload_dir: String,

    #[clap(long, env, default_value = "http://localhost:8080")]
    pub public_base_url: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing collection id for {0}")]
    MissingCollection(&'static str),
}

/// Collection ids the import pipeline reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub faculty: String,
    pub section: String,
    pub student: String,
    pub parent: String,
    pub user: String,
}

impl Collections {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let collections = Self {
            faculty: config.faculty_collection_id.trim().to_string(),
            section: config.section_collection_id.trim().to_string(),
            student: config.student_collection_id.trim().to_string(),
            parent: config.parent_collection_id.trim().to_string(),
            user: config.user_collection_id.trim().to_string(),
        };
        collections.ensure_present()?;
        Ok(collections)
    }

    pub fn ensure_present(&self) -> Result<(), ConfigError> {
        let named = [
            ("faculty", &self.faculty),
            ("section", &self.section),
            ("student", &self.student),
            ("parent", &self.parent),
            ("user", &self.user),
        ];
        for (name, id) in named {
            if id.is_empty() {
                return Err(ConfigError::MissingCollection(name));
            }
        }
        Ok(())
    }
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            faculty: "faculty".to_string(),
            section: "section".to_string(),
            student: "student".to_string(),
            parent: "parent".to_string(),
            user: "users".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_id_is_a_config_error() {
        let config = Config::parse_from([
            "school_admin_api",
            "--database-url",
            "sqlite::memory:",
            "--parent-collection-id",
            " ",
        ]);

        assert_eq!(
            Collections::from_config(&config),
            Err(ConfigError::MissingCollection("parent"))
        );
    }

    #[test]
    fn defaults_resolve_every_collection() {
        let config = Config::parse_from(["school_admin_api", "--database-url", "sqlite::memory:"]);
        let collections = Collections::from_config(&config).unwrap();
        assert_eq!(collections, Collections::default());
    }
}
