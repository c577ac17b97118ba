use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::capture::{default_capture, OutputCapture, PlatformCapture};
use crate::completeness::{check_completeness, Completeness};
use crate::config::KernelConfig;
use crate::tcl_runtime::{create_runtime_with_config, TclRuntime};

pub const IMPLEMENTATION: &str = "Tcl Kernel";
pub const IMPLEMENTATION_VERSION: &str = "1.0";
pub const BANNER: &str = "Tcl Kernel";

/// A code submission from the notebook front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    #[serde(default)]
    pub silent: bool,
    /// Counter maintained by the front-end framework, echoed in the reply
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default = "default_store_history")]
    pub store_history: bool,
    #[serde(default)]
    pub user_expressions: Map<String, Value>,
    #[serde(default)]
    pub allow_stdin: bool,
}

fn default_store_history() -> bool {
    true
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>, execution_count: u64) -> Self {
        Self {
            code: code.into(),
            silent: false,
            execution_count,
            store_history: true,
            user_expressions: Map::new(),
            allow_stdin: false,
        }
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// A unit of published output, tagged as normal or error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub name: StreamName,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteReply {
    pub status: ReplyStatus,
    pub execution_count: u64,
    pub payload: Vec<Value>,
    pub user_expressions: Map<String, Value>,
}

impl ExecuteReply {
    pub fn ok(execution_count: u64) -> Self {
        Self {
            status: ReplyStatus::Ok,
            execution_count,
            payload: Vec::new(),
            user_expressions: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub version: String,
    pub mimetype: String,
    pub file_extension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub implementation: String,
    pub implementation_version: String,
    pub banner: String,
    pub language_info: LanguageInfo,
    /// The embedded interpreter serving this session
    pub runtime: String,
}

/// Where stream messages go. The notebook framework owns the real channel.
pub trait StreamPublisher {
    fn publish_stream(&mut self, message: StreamMessage);
}

impl StreamPublisher for Vec<StreamMessage> {
    fn publish_stream(&mut self, message: StreamMessage) {
        self.push(message);
    }
}

/// Create the session interpreter for `config`.
pub fn create_session(config: &KernelConfig) -> Result<Box<dyn TclRuntime>> {
    create_runtime_with_config(&config.runtime)
}

/// Evaluates notebook cells against one persistent interpreter session.
pub struct TclKernel<C: OutputCapture = PlatformCapture> {
    session: Box<dyn TclRuntime>,
    capture: C,
}

impl TclKernel<PlatformCapture> {
    /// Create the session and load the configured companion script.
    pub fn from_config(config: &KernelConfig) -> Result<Self> {
        let session = create_session(config)?;
        let mut kernel = Self::with_capture(session, default_capture());
        if let Some(path) = config.startup_script.resolve()? {
            kernel.load_startup_script(path)?;
        }
        Ok(kernel)
    }
}

impl<C: OutputCapture> TclKernel<C> {
    pub fn with_capture(session: Box<dyn TclRuntime>, capture: C) -> Self {
        Self { session, capture }
    }

    /// Evaluate a companion script. Its output is captured and logged, never
    /// published.
    pub fn load_startup_script(&mut self, path: &Path) -> Result<()> {
        let session = &mut self.session;
        let captured = self
            .capture
            .run_capturing_output(|| session.eval_file(path))?;
        if !captured.text.is_empty() {
            debug!("Startup script output: {}", captured.text);
        }
        captured.value?;
        info!("Loaded startup script {}", path.display());
        Ok(())
    }

    /// Run a cell and publish what it produced.
    ///
    /// Interpreter errors are published on `stderr` and still yield an `ok`
    /// reply; only a failure of the capture machinery itself returns `Err`.
    pub fn execute(
        &mut self,
        request: &ExecuteRequest,
        publisher: &mut dyn StreamPublisher,
    ) -> Result<ExecuteReply> {
        if request.silent {
            debug!(execution_count = request.execution_count, "Skipping silent request");
            return Ok(ExecuteReply::ok(request.execution_count));
        }

        let session = &mut self.session;
        let code = request.code.as_str();
        let captured = self
            .capture
            .run_capturing_output(|| session.eval(code))
            .context("Failed to capture interpreter output")?;

        // Output printed before an error is kept ahead of the error text.
        let mut text = captured.text;
        let name = match captured.value {
            Ok(value) => {
                text.push_str(&value);
                StreamName::Stdout
            }
            Err(err) => {
                warn!(execution_count = request.execution_count, "TCL evaluation failed: {}", err);
                text.push_str(&err.to_string());
                StreamName::Stderr
            }
        };

        publisher.publish_stream(StreamMessage { name, text });
        Ok(ExecuteReply::ok(request.execution_count))
    }

    pub fn is_complete(&self, code: &str) -> Completeness {
        check_completeness(code)
    }

    pub fn kernel_info(&self) -> KernelInfo {
        KernelInfo {
            implementation: IMPLEMENTATION.to_string(),
            implementation_version: IMPLEMENTATION_VERSION.to_string(),
            banner: BANNER.to_string(),
            language_info: LanguageInfo {
                name: "tcl".to_string(),
                version: self.session.version().to_string(),
                mimetype: "text/plain".to_string(),
                file_extension: ".tcl".to_string(),
            },
            runtime: self.session.name().to_string(),
        }
    }
}
