use anyhow::{Result, anyhow};
use molt::{ContextID, Exception, Interp, MoltResult, Value, check_args, molt_err, molt_ok};
use std::io::Write;
use super::TclRuntime;

/// Molt TCL interpreter implementation
pub struct MoltRuntime {
    interp: Interp,
}

impl TclRuntime for MoltRuntime {
    fn new() -> Self {
        let mut interp = Interp::new();
        interp.add_command("puts", cmd_puts);
        Self { interp }
    }

    fn eval(&mut self, script: &str) -> Result<String> {
        match self.interp.eval(script) {
            Ok(value) => Ok(value.to_string()),
            Err(exception) => Err(anyhow!("{}", exception.value())),
        }
    }

    fn name(&self) -> &'static str {
        "Molt"
    }

    fn version(&self) -> &'static str {
        "0.3.1"
    }
}

/// `puts ?-nonewline? ?channelId? string`
///
/// Replaces Molt's builtin, which prints with `println!`. Output goes through
/// the locked process handles so it always lands on descriptors 1 and 2.
fn cmd_puts(_interp: &mut Interp, _context_id: ContextID, argv: &[Value]) -> MoltResult {
    check_args(1, argv, 2, 4, "?-nonewline? ?channelId? string")?;

    let mut args = &argv[1..];
    let mut newline = true;
    if args.len() > 1 && args[0].as_str() == "-nonewline" {
        newline = false;
        args = &args[1..];
    }

    let (channel, text) = match args {
        [text] => ("stdout", text.as_str()),
        [channel, text] => (channel.as_str(), text.as_str()),
        _ => return molt_err!("wrong # args: should be \"puts ?-nonewline? ?channelId? string\""),
    };

    let result = match channel {
        "stdout" => write_line(&mut std::io::stdout().lock(), text, newline),
        "stderr" => write_line(&mut std::io::stderr().lock(), text, newline),
        other => return molt_err!("can not find channel named \"{}\"", other),
    };

    match result {
        Ok(()) => molt_ok!(),
        Err(err) => molt_err!("error writing \"{}\": {}", channel, err),
    }
}

fn write_line(out: &mut impl Write, text: &str, newline: bool) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    if newline {
        out.write_all(b"\n")?;
    }
    Ok(())
}
