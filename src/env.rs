//! Launcher environment and `${VAR}` path templates.

use regex::Regex;
use std::sync::LazyLock;

use crate::validate::ValidationError;

/// Base directory of the pyvospace checkout; logs go under `scripts/log`
pub const PYVOSPACE_DIR: &str = "PYVOSPACE_DIR";

/// NGAS storage root; the server config lives under `cfg`
pub const NGAS_STORAGE_DIR: &str = "NGAS_STORAGE_DIR";

static TEMPLATE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("template pattern is valid")
});

/// The two directories the launcher needs, read once at start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub pyvospace_dir: String,
    pub ngas_storage_dir: String,
}

impl Environment {
    /// Build from an arbitrary lookup. Both variables must be set and non-empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            pyvospace_dir: required(&lookup, PYVOSPACE_DIR)?,
            ngas_storage_dir: required(&lookup, NGAS_STORAGE_DIR)?,
        })
    }

    /// Resolve a template variable. The launcher's own variables win over the
    /// process environment so CLI overrides are honoured in templates too.
    pub fn lookup(&self, name: &str) -> Option<String> {
        match name {
            PYVOSPACE_DIR => Some(self.pyvospace_dir.clone()),
            NGAS_STORAGE_DIR => Some(self.ngas_storage_dir.clone()),
            other => std::env::var(other).ok(),
        }
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ValidationError::MissingVar(name.to_string()))
}

/// Replace every `${NAME}` in `template` with its value from `lookup`.
/// A reference to an unset or empty variable is an error naming it.
pub fn expand_template<F>(template: &str, lookup: F) -> Result<String, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(template.len());
    let mut last = 0;

    for caps in TEMPLATE_VAR.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];
        let value = lookup(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ValidationError::UnsetReference {
                template: template.to_string(),
                var: name.to_string(),
            })?;

        expanded.push_str(&template[last..whole.start()]);
        expanded.push_str(&value);
        last = whole.end();
    }

    expanded.push_str(&template[last..]);
    Ok(expanded)
}
