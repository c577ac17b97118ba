use anyhow::{Context, Result, anyhow};
use std::path::Path;

/// Environment variable consulted when no `--runtime` flag is given
pub const RUNTIME_ENV_VAR: &str = "TCL_KERNEL_RUNTIME";

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeType {
    Molt,
    Tcl,
}

impl std::str::FromStr for RuntimeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "molt" => Ok(RuntimeType::Molt),
            "tcl" => Ok(RuntimeType::Tcl),
            _ => Err(anyhow!("Invalid runtime type '{}'. Valid options: molt, tcl", s)),
        }
    }
}

impl RuntimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeType::Molt => "molt",
            RuntimeType::Tcl => "tcl",
        }
    }

    /// Check if this runtime type is available based on compiled features
    pub fn is_available(&self) -> bool {
        match self {
            RuntimeType::Molt => cfg!(feature = "molt"),
            RuntimeType::Tcl => cfg!(feature = "tcl"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub runtime_type: Option<RuntimeType>,
    pub fallback_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_type: None,
            fallback_enabled: true,
        }
    }
}

impl RuntimeConfig {
    /// Create runtime config from CLI args and environment variables
    pub fn from_args_and_env(
        cli_runtime: Option<&str>,
        env_runtime: Option<&str>,
    ) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(env_runtime) = env_runtime {
            config.runtime_type = Some(env_runtime.parse()?);
        }

        // CLI argument overrides environment
        if let Some(cli_runtime) = cli_runtime {
            config.runtime_type = Some(cli_runtime.parse()?);
        }

        Ok(config)
    }
}

/// The embedded interpreter a kernel session evaluates code against.
///
/// Output written by the interpreter (`puts`) goes to the process standard
/// output stream; only the value of the last command comes back from `eval`.
pub trait TclRuntime {
    /// Create a new instance of the TCL runtime
    fn new() -> Self where Self: Sized;

    /// Evaluate a TCL script and return the result
    fn eval(&mut self, script: &str) -> Result<String>;

    /// Read a script file and evaluate it in the session
    fn eval_file(&mut self, path: &Path) -> Result<String> {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read TCL script {}", path.display()))?;
        self.eval(&script)
            .with_context(|| format!("Failed to evaluate TCL script {}", path.display()))
    }

    /// Get runtime name for logging/debugging
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str;
}

#[cfg(feature = "molt")]
mod molt_runtime;
#[cfg(feature = "molt")]
pub use molt_runtime::MoltRuntime;

#[cfg(feature = "tcl")]
mod tcl_interpreter;
#[cfg(feature = "tcl")]
pub use tcl_interpreter::TclInterpreter;

/// Get list of available runtime types based on compiled features
pub fn available_runtimes() -> Vec<RuntimeType> {
    let mut runtimes = Vec::new();

    #[cfg(feature = "molt")]
    runtimes.push(RuntimeType::Molt);

    #[cfg(feature = "tcl")]
    runtimes.push(RuntimeType::Tcl);

    runtimes
}

/// Create runtime with specific configuration
pub fn create_runtime_with_config(config: &RuntimeConfig) -> Result<Box<dyn TclRuntime>> {
    if let Some(requested_type) = &config.runtime_type {
        match create_specific_runtime(requested_type) {
            Ok(runtime) => {
                tracing::info!("Using {} TCL runtime", requested_type.as_str());
                return Ok(runtime);
            }
            Err(e) if config.fallback_enabled => {
                tracing::warn!("Failed to create requested runtime {:?}: {}. Trying fallback.", requested_type, e);
            }
            Err(e) => return Err(e),
        }
    }

    // Auto-select based on available features (prefer Molt)
    #[cfg(feature = "molt")]
    {
        tracing::info!("Auto-selecting Molt TCL runtime");
        return Ok(Box::new(MoltRuntime::new()));
    }

    #[cfg(all(feature = "tcl", not(feature = "molt")))]
    {
        tracing::info!("Auto-selecting official TCL runtime");
        return Ok(Box::new(TclInterpreter::new()));
    }

    #[cfg(all(not(feature = "molt"), not(feature = "tcl")))]
    {
        return Err(anyhow!("No TCL runtime features enabled. Please build with --features molt or --features tcl"));
    }
}

fn create_specific_runtime(runtime_type: &RuntimeType) -> Result<Box<dyn TclRuntime>> {
    match runtime_type {
        RuntimeType::Molt => {
            #[cfg(feature = "molt")]
            {
                Ok(Box::new(MoltRuntime::new()))
            }
            #[cfg(not(feature = "molt"))]
            {
                Err(anyhow!("Molt runtime not available. Build with --features molt"))
            }
        }
        RuntimeType::Tcl => {
            #[cfg(feature = "tcl")]
            {
                Ok(Box::new(TclInterpreter::new()))
            }
            #[cfg(not(feature = "tcl"))]
            {
                Err(anyhow!("TCL runtime not available. Build with --features tcl"))
            }
        }
    }
}

/// Factory function for the default runtime
pub fn create_runtime() -> Result<Box<dyn TclRuntime>> {
    create_runtime_with_config(&RuntimeConfig::default())
}
