use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::acl::model::RoleMap;
use crate::error::{AclError, AclResult};

/// Principal that receives the fallback roles when no governing node exists.
pub const EVERYONE: &str = "EVERYONE";

/// Environment variable naming a JSON config file.
pub const ENV_CONFIG: &str = "TREEACL_CONFIG";
/// Environment variable carrying an inline JSON default-roles object.
pub const ENV_DEFAULT_ROLES: &str = "TREEACL_DEFAULT_ROLES";

static BUILTIN_DEFAULT_ROLES: Lazy<RoleMap> = Lazy::new(|| {
    let mut m = RoleMap::new();
    m.entry(EVERYONE.to_string()).or_default().insert("admin".to_string());
    m
});

/// Built-in fallback policy: everyone is admin until an ACL says otherwise.
pub fn builtin_default_roles() -> RoleMap { BUILTIN_DEFAULT_ROLES.clone() }

/// Names used for the assignment structure and the fallback policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AclConfig {
    /// Name of the assignment container node that holds the records.
    pub container_name: String,
    /// Name given to each assignment record node.
    pub record_name: String,
    /// String property carrying the principal name.
    pub principal_field: String,
    /// String-list property carrying the role names.
    pub role_field: String,
    /// Roles returned when effective resolution finds no governing node.
    pub default_roles: RoleMap,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            container_name: "acl".to_string(),
            record_name: "assignment".to_string(),
            principal_field: "principal".to_string(),
            role_field: "role".to_string(),
            default_roles: builtin_default_roles(),
        }
    }
}

/// Partial config as read from a file or the environment. Unspecified values
/// inherit from the base layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AclConfigOverrides {
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub record_name: Option<String>,
    #[serde(default)]
    pub principal_field: Option<String>,
    #[serde(default)]
    pub role_field: Option<String>,
    #[serde(default)]
    pub default_roles: Option<RoleMap>,
}

impl AclConfig {
    /// Overlay `ov` on `base`.
    pub fn from_layers(base: &AclConfig, ov: &AclConfigOverrides) -> Self {
        Self {
            container_name: ov.container_name.clone().unwrap_or_else(|| base.container_name.clone()),
            record_name: ov.record_name.clone().unwrap_or_else(|| base.record_name.clone()),
            principal_field: ov.principal_field.clone().unwrap_or_else(|| base.principal_field.clone()),
            role_field: ov.role_field.clone().unwrap_or_else(|| base.role_field.clone()),
            default_roles: ov.default_roles.clone().unwrap_or_else(|| base.default_roles.clone()),
        }
    }

    /// Defaults overlaid with the JSON file at `path`.
    pub fn load(path: &Path) -> AclResult<Self> {
        let bytes = std::fs::read(path)?;
        let ov: AclConfigOverrides = serde_json::from_slice(&bytes)
            .map_err(|e| AclError::input("invalid_config", format!("{}: {}", path.display(), e)))?;
        let cfg = Self::from_layers(&Self::default(), &ov);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults, then `TREEACL_CONFIG` (file), then `TREEACL_DEFAULT_ROLES` (inline JSON).
    pub fn from_env() -> AclResult<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG) {
            Ok(p) if !p.trim().is_empty() => Self::load(Path::new(p.trim()))?,
            _ => Self::default(),
        };
        if let Ok(raw) = std::env::var(ENV_DEFAULT_ROLES) {
            let roles: RoleMap = serde_json::from_str(&raw)
                .map_err(|e| AclError::input("invalid_config", format!("{}: {}", ENV_DEFAULT_ROLES, e)))?;
            cfg = Self::from_layers(&cfg, &AclConfigOverrides { default_roles: Some(roles), ..Default::default() });
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AclResult<()> {
        for (label, v) in [
            ("container_name", &self.container_name),
            ("record_name", &self.record_name),
            ("principal_field", &self.principal_field),
            ("role_field", &self.role_field),
        ] {
            if v.trim().is_empty() || v.contains('/') {
                return Err(AclError::input("invalid_config", format!("{} must be a non-empty name without '/'", label)));
            }
        }
        for (principal, roles) in self.default_roles.iter() {
            if principal.trim().is_empty() {
                return Err(AclError::input("invalid_config", "default_roles contains a blank principal"));
            }
            if roles.iter().any(|r| r.trim().is_empty()) {
                return Err(AclError::input("invalid_config", format!("default_roles for '{}' contains a blank role", principal)));
            }
        }
        Ok(())
    }
}
