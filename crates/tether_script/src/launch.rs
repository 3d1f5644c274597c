//! Process arguments published to script as `process.argv`

use crate::coerce;
use rquickjs::{Ctx, Object, Value};

const DEBUG_FLAGS: [&str; 2] = ["--debug-brk", "--nolazy"];

/// Argument vector for one run: the executable, the debug flags when
/// requested, then either the script path or `-e <code>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArgs {
    argv: Vec<String>,
}

impl LaunchArgs {
    fn base(exe: &str, debug: bool) -> Vec<String> {
        let mut argv = vec![exe.to_string()];
        if debug {
            argv.extend(DEBUG_FLAGS.iter().map(|flag| flag.to_string()));
        }
        argv
    }

    pub fn for_file(exe: &str, debug: bool, path: &str) -> Self {
        let mut argv = Self::base(exe, debug);
        argv.push(path.to_string());
        Self { argv }
    }

    /// Inline code; an empty string contributes nothing.
    pub fn for_code(exe: &str, debug: bool, code: &str) -> Self {
        let mut argv = Self::base(exe, debug);
        if !code.is_empty() {
            argv.push("-e".to_string());
            argv.push(code.to_string());
        }
        Self { argv }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.argv
    }
}

fn process_object<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let globals = ctx.globals();
    let existing: Value<'js> = globals.get("process")?;
    if let Some(process) = existing.as_object() {
        return Ok(process.clone());
    }
    let process = Object::new(ctx.clone())?;
    globals.set("process", process.clone())?;
    Ok(process)
}

/// Set `process.argv` and reset `process.exitCode`.
pub(crate) fn publish<'js>(ctx: &Ctx<'js>, args: &LaunchArgs) -> rquickjs::Result<()> {
    let process = process_object(ctx)?;
    process.set("argv", args.argv.clone())?;
    process.set("exitCode", 0)?;
    Ok(())
}

/// `process.exitCode` as set by the script; zero when absent.
pub(crate) fn exit_code<'js>(ctx: &Ctx<'js>) -> i32 {
    let Ok(process) = process_object(ctx) else {
        return 0;
    };
    match process.get::<_, Value<'js>>("exitCode") {
        Ok(code) if !code.is_undefined() && !code.is_null() => coerce::to_int32(ctx, &code),
        _ => 0,
    }
}
