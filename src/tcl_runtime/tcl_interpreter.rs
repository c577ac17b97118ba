use anyhow::{Result, anyhow};
use super::TclRuntime;

/// Official TCL interpreter implementation using the tcl crate.
///
/// `puts` goes through C stdio here, so its bytes may sit in the C library
/// buffer until the capture window flushes it.
pub struct TclInterpreter {
    interp: tcl::Interpreter,
}

impl TclRuntime for TclInterpreter {
    fn new() -> Self {
        Self {
            interp: tcl::Interpreter::new().expect("Failed to create TCL interpreter"),
        }
    }

    fn eval(&mut self, script: &str) -> Result<String> {
        match self.interp.eval(script) {
            Ok(result) => Ok(result.to_string()),
            Err(err) => Err(anyhow!("{}", err)),
        }
    }

    fn name(&self) -> &'static str {
        "TCL (Official)"
    }

    fn version(&self) -> &'static str {
        "8.6"
    }
}
