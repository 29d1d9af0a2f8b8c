//! Sandboxed execution of generated analysis code
//!
//! Each code block runs in a fresh Lua 5.4 state with dangerous globals
//! removed, the loaded table bound as `df`, a small `stats` helper
//! namespace, and `print` redirected into a capture buffer. A static
//! denylist scan runs before execution; it is a known-incomplete mitigation
//! layered on top of the stripped-down interpreter, not a boundary by
//! itself.
//!
//! ## Timeout protection
//!
//! Every block gets a hard wall-clock timeout enforced by a hybrid
//! cooperative + watchdog approach:
//! 1. A debug hook runs every 1000 Lua instructions and checks the clock
//! 2. A watchdog thread sets a stop flag after the timeout duration
//! 3. On expiry the block fails with an "execution timeout" result
//!
//! The hook cannot interrupt long-running C library calls (e.g. pattern
//! matching on huge strings); for pure Lua loops and computation it
//! terminates reliably.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mlua::{HookTriggers, Lua, Table, Value, Variadic};
use parking_lot::Mutex;

use crate::state::CodeExecutionResult;
use crate::table::{Cell, DataFrame};

/// Globals stripped from every execution environment
const REMOVED_GLOBALS: &[&str] = &[
    "os",
    "io",
    "require",
    "load",
    "loadstring",
    "dofile",
    "loadfile",
    "debug",
    "package",
    "collectgarbage",
    "coroutine",
];

/// Identifiers whose presence rejects a snippet before execution
const DENYLISTED_IDENTIFIERS: &[&str] = &[
    "os",
    "io",
    "require",
    "load",
    "loadstring",
    "dofile",
    "loadfile",
    "debug",
    "package",
];

/// Runs extracted code blocks against a bound table, capturing output and
/// failures without raising
pub struct SandboxedExecutor {
    timeout: Duration,
}

impl SandboxedExecutor {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run every block independently, in order. One failing block never
    /// aborts the batch.
    pub fn execute_all(&self, blocks: &[String], df: &DataFrame) -> Vec<CodeExecutionResult> {
        blocks
            .iter()
            .map(|code| self.execute_block(code, df))
            .collect()
    }

    /// Run a single block and record its outcome
    pub fn execute_block(&self, code: &str, df: &DataFrame) -> CodeExecutionResult {
        if let Err(reason) = static_safety_check(code) {
            tracing::warn!("code block rejected by safety check: {}", reason);
            return CodeExecutionResult {
                code: code.to_string(),
                output: format!("Rejected by safety check: {}", reason),
                success: false,
            };
        }

        match self.run_sandboxed(code, df) {
            Ok(output) => CodeExecutionResult {
                code: code.to_string(),
                output,
                success: true,
            },
            Err(e) => CodeExecutionResult {
                code: code.to_string(),
                output: format!("Execution error: {}", e),
                success: false,
            },
        }
    }

    fn run_sandboxed(&self, code: &str, df: &DataFrame) -> mlua::Result<String> {
        // Fresh state per block: no bleed between blocks
        let lua = Lua::new();
        let globals = lua.globals();

        for name in REMOVED_GLOBALS {
            globals.raw_set(*name, Value::Nil)?;
        }

        let buffer = Arc::new(Mutex::new(String::new()));
        install_print(&lua, buffer.clone())?;
        install_stats(&lua)?;

        globals.set("df", dataframe_to_lua(&lua, df)?)?;
        globals.set(
            "columns",
            lua.create_sequence_from(df.columns().iter().cloned())?,
        )?;

        // Syntax check before execution; load errors are reported verbatim
        let func = lua.load(code).into_function()?;

        // Timeout: instruction hook checks the clock, watchdog sets a flag
        let should_stop = Arc::new(AtomicBool::new(false));
        let start_time = Instant::now();
        let timeout = self.timeout;

        let hook_stop = should_stop.clone();
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(1000),
            move |_lua, _debug| {
                if hook_stop.load(Ordering::Relaxed) || start_time.elapsed() >= timeout {
                    Err(mlua::Error::external("execution timeout"))
                } else {
                    Ok(())
                }
            },
        );

        let watchdog_stop = should_stop.clone();
        let watchdog = thread::spawn(move || {
            thread::sleep(timeout);
            watchdog_stop.store(true, Ordering::Relaxed);
        });

        let result = func.call::<_, ()>(());

        should_stop.store(true, Ordering::Relaxed);
        lua.remove_hook();
        drop(watchdog);

        result?;
        let output = buffer.lock().clone();
        Ok(output)
    }
}

impl Default for SandboxedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SandboxedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxedExecutor")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Reject snippets that reference denylisted names.
///
/// Identifier-level scan: the snippet is split into identifier tokens and
/// each token is compared whole, so `loads` or `iostream` do not trip on
/// `load`/`io`. Quoted string literals and `--` line comments are skipped,
/// so a data column literally named `os` stays usable; long-bracket strings
/// are still scanned, which can only over-reject.
pub fn static_safety_check(code: &str) -> Result<(), String> {
    fn check(token: &str) -> Result<(), String> {
        if DENYLISTED_IDENTIFIERS.contains(&token) {
            Err(format!("use of '{}' is not allowed", token))
        } else {
            Ok(())
        }
    }

    let mut current = String::new();
    let mut chars = code.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
            continue;
        }
        if !current.is_empty() {
            check(&std::mem::take(&mut current))?;
        }
        match ch {
            '\'' | '"' => {
                // String literal: consume through the closing quote
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        chars.next();
                    } else if c == ch {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                // Comment: consume to end of line
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        check(&current)?;
    }
    Ok(())
}

/// Redirect `print` into the capture buffer, tab-separated like stock Lua
fn install_print(lua: &Lua, buffer: Arc<Mutex<String>>) -> mlua::Result<()> {
    let print = lua.create_function(move |_, args: Variadic<Value>| {
        let mut line = String::new();
        for (i, value) in args.iter().enumerate() {
            if i > 0 {
                line.push('\t');
            }
            line.push_str(&display_value(value));
        }
        line.push('\n');
        buffer.lock().push_str(&line);
        Ok(())
    })?;
    lua.globals().set("print", print)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

/// Install the `stats` helper namespace: column extraction plus the
/// aggregates the analysis prompts advertise
fn install_stats(lua: &Lua) -> mlua::Result<()> {
    let stats = lua.create_table()?;

    stats.set(
        "col",
        lua.create_function(|lua, (rows, name): (Table, String)| {
            let out = lua.create_table()?;
            for row in rows.sequence_values::<Table>() {
                let value: Value = row?.get(name.as_str())?;
                if value != Value::Nil {
                    out.push(value)?;
                }
            }
            Ok(out)
        })?,
    )?;

    stats.set(
        "sum",
        lua.create_function(|_, values: Table| {
            let mut total = 0.0f64;
            for v in values.sequence_values::<f64>() {
                total += v?;
            }
            Ok(total)
        })?,
    )?;

    stats.set(
        "mean",
        lua.create_function(|_, values: Table| {
            let n = values.raw_len();
            if n == 0 {
                return Err(mlua::Error::external("mean of empty sequence"));
            }
            let mut total = 0.0f64;
            for v in values.sequence_values::<f64>() {
                total += v?;
            }
            Ok(total / n as f64)
        })?,
    )?;

    stats.set(
        "min",
        lua.create_function(|_, values: Table| {
            let mut best: Option<f64> = None;
            for v in values.sequence_values::<f64>() {
                let v = v?;
                best = Some(best.map_or(v, |b: f64| b.min(v)));
            }
            best.ok_or_else(|| mlua::Error::external("min of empty sequence"))
        })?,
    )?;

    stats.set(
        "max",
        lua.create_function(|_, values: Table| {
            let mut best: Option<f64> = None;
            for v in values.sequence_values::<f64>() {
                let v = v?;
                best = Some(best.map_or(v, |b: f64| b.max(v)));
            }
            best.ok_or_else(|| mlua::Error::external("max of empty sequence"))
        })?,
    )?;

    stats.set(
        "count",
        lua.create_function(|_, values: Table| Ok(values.raw_len()))?,
    )?;

    lua.globals().set("stats", stats)
}

/// Bind the frame as an array of row records
fn dataframe_to_lua<'l>(lua: &'l Lua, df: &DataFrame) -> mlua::Result<Table<'l>> {
    let rows = lua.create_table_with_capacity(df.n_rows(), 0)?;
    for row in df.rows() {
        let record = lua.create_table_with_capacity(0, df.n_columns())?;
        for (name, cell) in df.columns().iter().zip(row) {
            let value = match cell {
                Cell::Null => Value::Nil,
                Cell::Bool(b) => Value::Boolean(*b),
                Cell::Int(i) => Value::Integer(*i),
                Cell::Float(x) => Value::Number(*x),
                Cell::Str(s) => Value::String(lua.create_string(s)?),
            };
            record.set(name.as_str(), value)?;
        }
        rows.push(record)?;
    }
    Ok(rows)
}
