//! Secret lookup from the environment or a mounted secrets directory.
//!
//! Secrets are named in kebab-case (`dremio-host`). The environment backend
//! reads `DREMIO_HOST`; the mounted backend reads `<dir>/dremio-host`.

use std::path::PathBuf;

use crate::config::{AppConfig, SecretBackend};
use crate::error::{EnrichError, Result};

/// Where secret values are read from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    Env,
    Mounted { dir: PathBuf },
}

impl From<&AppConfig> for SecretSource {
    fn from(config: &AppConfig) -> Self {
        match config.secrets.source {
            SecretBackend::Env => Self::Env,
            SecretBackend::Mounted => Self::Mounted {
                dir: PathBuf::from(&config.secrets.dir),
            },
        }
    }
}

impl SecretSource {
    /// Look up a secret; `Ok(None)` when it is absent or blank.
    pub fn optional(&self, name: &str) -> Result<Option<String>> {
        let raw = match self {
            Self::Env => std::env::var(env_var_name(name)).ok(),
            Self::Mounted { dir } => {
                let path = dir.join(name);
                match std::fs::read_to_string(&path) {
                    Ok(content) => Some(content),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => return Err(EnrichError::io(path, e)),
                }
            }
        };

        Ok(raw
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    /// Look up a secret that must be present.
    pub fn require(&self, name: &str) -> Result<String> {
        self.optional(name)?.ok_or_else(|| EnrichError::MissingSecret {
            name: name.to_string(),
            hint: self.hint(name),
        })
    }

    fn hint(&self, name: &str) -> String {
        match self {
            Self::Env => format!("set the {} environment variable", env_var_name(name)),
            Self::Mounted { dir } => format!("mount it at {}", dir.join(name).display()),
        }
    }
}

/// `dremio-host` → `DREMIO_HOST`.
pub fn env_var_name(name: &str) -> String {
    name.replace(['-', '.'], "_").to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_name_upper_snake() {
        assert_eq!(env_var_name("dremio-host"), "DREMIO_HOST");
        assert_eq!(env_var_name("purview-account-name"), "PURVIEW_ACCOUNT_NAME");
    }

    #[test]
    fn missing_env_secret_names_variable() {
        let err = SecretSource::Env
            .require("metaenrich-test-nonexistent-secret-12345")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("metaenrich-test-nonexistent-secret-12345"));
        assert!(msg.contains("METAENRICH_TEST_NONEXISTENT_SECRET_12345"));
    }

    #[test]
    fn mounted_secret_is_trimmed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("dremio-user"), "  svc-reader \n").unwrap();
        let source = SecretSource::Mounted {
            dir: tmp.path().to_path_buf(),
        };
        assert_eq!(source.require("dremio-user").unwrap(), "svc-reader");
    }

    #[test]
    fn blank_mounted_secret_counts_as_missing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("dremio-password"), "\n").unwrap();
        let source = SecretSource::Mounted {
            dir: tmp.path().to_path_buf(),
        };
        assert_eq!(source.optional("dremio-password").unwrap(), None);
        assert!(matches!(
            source.require("dremio-password"),
            Err(EnrichError::MissingSecret { .. })
        ));
    }
}
