//! Configuration for the rbac module.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::domain::filter::FILTER_PREPARE_THRESHOLD;
use crate::domain::roles::RoleOptions;

/// Prefix of environment variables overriding the configuration.
pub const ENV_PREFIX: &str = "RBAC__";

/// Configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RbacConfig {
    /// Reject actions the object type does not support instead of denying them.
    pub strict: bool,
    /// Object count from which `filter` prepares once instead of checking each object.
    pub filter_prepare_threshold: usize,
    /// Memoize decisions in the request context's cache.
    pub cache: bool,
    /// Feed the request context's check recorder.
    pub record_checks: bool,
    /// Toggles applied to the built-in roles.
    pub roles: RoleOptions,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            strict: false,
            filter_prepare_threshold: FILTER_PREPARE_THRESHOLD,
            cache: true,
            record_checks: false,
            roles: RoleOptions::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file '{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("invalid rbac configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

impl RbacConfig {
    /// Layer defaults, an optional YAML file and `RBAC__*` environment variables.
    ///
    /// Nested keys are separated by `__` in variable names, e.g.
    /// `RBAC__ROLES__NO_OWNER_WORKSPACE_EXEC=true`.
    ///
    /// # Errors
    /// - [`ConfigError::NotFound`] if `path` is given but does not exist
    /// - [`ConfigError::Invalid`] for unknown keys or ill-typed values
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
            .map_err(ConfigError::from)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|_| {
            assert_eq!(RbacConfig::load(None).unwrap(), RbacConfig::default());
            Ok(())
        });
    }

    #[test]
    fn yaml_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rbac.yaml",
                "strict: true\nfilter_prepare_threshold: 25\ncache: true\n",
            )?;
            jail.set_env("RBAC__CACHE", "false");
            jail.set_env("RBAC__ROLES__NO_OWNER_WORKSPACE_EXEC", "true");

            let cfg = RbacConfig::load(Some(Path::new("rbac.yaml"))).unwrap();
            assert!(cfg.strict);
            assert_eq!(cfg.filter_prepare_threshold, 25);
            assert!(!cfg.cache);
            assert!(!cfg.record_checks);
            assert!(cfg.roles.no_owner_workspace_exec);
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("rbac.yaml", "stritc: true\n")?;
            assert!(matches!(
                RbacConfig::load(Some(Path::new("rbac.yaml"))),
                Err(ConfigError::Invalid(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        Jail::expect_with(|_| {
            assert!(matches!(
                RbacConfig::load(Some(Path::new("nope.yaml"))),
                Err(ConfigError::NotFound(_))
            ));
            Ok(())
        });
    }
}
