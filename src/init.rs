//! Session initialization.
//!
//! Builds the execution context a session starts with: preloaded bindings
//! plus an optional startup script (the equivalent of a shell profile),
//! executed synchronously before either thread of the session exists. The
//! bridge itself accepts only an already-prepared context.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use crate::executor::{evaluate, ExecutionContext, Val};
use crate::parser::parse_line;

/// Options for building a session context.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Script executed line by line into the namespace before the session
    /// starts. `await` is not allowed here; nothing is running yet to
    /// resume it.
    pub startup_path: Option<PathBuf>,

    /// Bindings preloaded into the namespace.
    pub bindings: HashMap<String, Val>,
}

/// Builder for constructing [`InitOptions`].
pub struct InitBuilder {
    options: InitOptions,
}

impl InitBuilder {
    pub fn new() -> Self {
        Self {
            options: InitOptions::default(),
        }
    }

    /// Set the startup script path.
    pub fn startup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.startup_path = Some(path.into());
        self
    }

    /// Preload one binding.
    pub fn bind(mut self, name: impl Into<String>, value: Val) -> Self {
        self.options.bindings.insert(name.into(), value);
        self
    }

    /// Build the execution context with the configured options.
    pub fn build(self) -> Result<Arc<ExecutionContext>> {
        initialize(self.options)
    }
}

impl Default for InitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a session context from the given options.
pub fn initialize(options: InitOptions) -> Result<Arc<ExecutionContext>> {
    let ctx = Arc::new(ExecutionContext::with_namespace(options.bindings));
    ctx.set("version", Val::Str(env!("CARGO_PKG_VERSION").to_string()));

    if let Some(path) = &options.startup_path {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read startup script {}", path.display()))?;
        run_startup(&ctx, &source)
            .with_context(|| format!("Failed to run startup script {}", path.display()))?;
    }

    Ok(ctx)
}

fn run_startup(ctx: &ExecutionContext, source: &str) -> Result<()> {
    for (index, raw) in source.lines().enumerate() {
        let lineno = index + 1;

        let unit = parse_line(raw).map_err(|err| anyhow!("line {}: {}", lineno, err))?;
        if unit.has_await {
            bail!("line {}: await is not allowed in startup scripts", lineno);
        }
        evaluate(&unit, ctx).map_err(|err| anyhow!("line {}: {}", lineno, err))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_script(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("cadenza-init-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_context_has_version() {
        let ctx = InitBuilder::new().build().unwrap();
        match ctx.get("version") {
            Some(Val::Str(v)) => assert_eq!(v, env!("CARGO_PKG_VERSION")),
            other => panic!("expected version binding, got {:?}", other),
        }
    }

    #[test]
    fn test_preloaded_bindings() {
        let ctx = InitBuilder::new()
            .bind("greeting", Val::Str("hi".to_string()))
            .build()
            .unwrap();
        assert_eq!(ctx.get("greeting"), Some(Val::Str("hi".to_string())));
    }

    #[test]
    fn test_startup_script_binds_into_namespace() {
        let path = write_temp_script("ok", "x = 40\ny = x + 2\n# comment\n");
        let ctx = InitBuilder::new().startup_path(&path).build().unwrap();
        assert_eq!(ctx.get("y"), Some(Val::Num(42.0)));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_startup_script_rejects_await() {
        let path = write_temp_script("await", "x = await delay(1)\n");
        let err = InitBuilder::new().startup_path(&path).build().unwrap_err();
        assert!(format!("{:#}", err).contains("await is not allowed"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_startup_script_reports_failing_line() {
        let path = write_temp_script("bad", "x = 1\nboom()\n");
        let err = InitBuilder::new().startup_path(&path).build().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_startup_script_is_an_error() {
        let err = InitBuilder::new()
            .startup_path("/definitely/not/a/real/path")
            .build()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read startup script"));
    }
}
