use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::tcl_runtime::RuntimeConfig;

/// Environment variable naming the companion script loaded at session start
pub const STARTUP_SCRIPT_ENV_VAR: &str = "TCL_KERNEL_STARTUP_SCRIPT";

/// Companion script picked up from the working directory when none is configured
pub const DEFAULT_STARTUP_SCRIPT: &str = "kernel_tcl.tcl";

/// Where the session's companion script comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum StartupScript {
    /// Configured explicitly; a missing file is a startup error.
    Required(PathBuf),
    /// The default location; skipped when absent.
    Optional(PathBuf),
    None,
}

impl StartupScript {
    /// The path to evaluate, if any. Errors only for a missing required script.
    pub fn resolve(&self) -> Result<Option<&Path>> {
        match self {
            StartupScript::Required(path) => {
                if !path.is_file() {
                    anyhow::bail!("Startup script {} does not exist", path.display());
                }
                Ok(Some(path))
            }
            StartupScript::Optional(path) if path.is_file() => Ok(Some(path)),
            StartupScript::Optional(path) => {
                tracing::debug!("No startup script at {}, skipping", path.display());
                Ok(None)
            }
            StartupScript::None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub runtime: RuntimeConfig,
    pub startup_script: StartupScript,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            startup_script: StartupScript::Optional(PathBuf::from(DEFAULT_STARTUP_SCRIPT)),
        }
    }
}

impl KernelConfig {
    /// Build the configuration from CLI values, falling back to environment values.
    pub fn from_args_and_env(
        cli_runtime: Option<&str>,
        env_runtime: Option<&str>,
        cli_script: Option<&Path>,
        env_script: Option<&Path>,
    ) -> Result<Self> {
        let runtime = RuntimeConfig::from_args_and_env(cli_runtime, env_runtime)?;
        let startup_script = match cli_script.or(env_script) {
            Some(path) => StartupScript::Required(path.to_path_buf()),
            None => StartupScript::Optional(PathBuf::from(DEFAULT_STARTUP_SCRIPT)),
        };

        Ok(Self {
            runtime,
            startup_script,
        })
    }

    /// A configuration that loads no companion script at all
    pub fn without_startup_script() -> Self {
        Self {
            startup_script: StartupScript::None,
            ..Self::default()
        }
    }
}
