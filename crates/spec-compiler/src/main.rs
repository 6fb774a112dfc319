//! Z-Wave descriptor compiler: checks command class specifications and
//! generates the decoder's descriptor tables.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use zw_cmdtool_diagnostics::{self as diag, Diagnostic};
use zw_cmdtool_spec_compiler::{
    Compilation, CompileError, CompileOptions, FieldEnumIndexing, MultiArrayPolicy, OutputFormat,
    compile_path, emit,
};

#[derive(Parser, Debug)]
#[command(name = "zw-desc-compiler", version)]
struct Cli {
    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compile a specification and report a JSON summary without writing tables
    Check {
        #[command(flatten)]
        compile: CompileArgs,
    },
    /// Compile a specification and write the descriptor table
    Build {
        #[command(flatten)]
        compile: CompileArgs,
        /// Output file, or `-` for stdout.
        #[arg(long)]
        out: PathBuf,
        /// Output representation.
        #[arg(long, value_enum, default_value_t = FormatArg::C)]
        format: FormatArg,
    },
    /// Explain a diagnostic ID (e.g. ZWC2001).
    Explain { id: String },
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Specification file, or a directory of `*.json`/`*.jsonc` files.
    #[arg(long)]
    spec: PathBuf,
    /// Fail when any length-location or optional-offset reference is ambiguous.
    #[arg(long)]
    strict: bool,
    /// Numbering of field-enum value entries.
    #[arg(long = "fieldenum-index", value_enum, default_value_t = FieldEnumIndexArg::Legacy)]
    fieldenum_index: FieldEnumIndexArg,
    /// Handling of MULTI_ARRAY parameters.
    #[arg(long, value_enum, default_value_t = MultiArrayArg::Placeholder)]
    multi_array: MultiArrayArg,
}

/// Field-enum numbering for the CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FieldEnumIndexArg {
    /// Every value entry gets index 0 (compatible with existing tables).
    Legacy,
    /// Value entries are numbered 0, 1, 2, …
    Sequential,
}

impl From<FieldEnumIndexArg> for FieldEnumIndexing {
    fn from(a: FieldEnumIndexArg) -> Self {
        match a {
            FieldEnumIndexArg::Legacy => FieldEnumIndexing::Legacy,
            FieldEnumIndexArg::Sequential => FieldEnumIndexing::Sequential,
        }
    }
}

/// MULTI_ARRAY policy for the CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MultiArrayArg {
    /// Emit a one-byte decimal placeholder.
    Placeholder,
    /// Reject as an unsupported parameter type.
    Reject,
}

impl From<MultiArrayArg> for MultiArrayPolicy {
    fn from(a: MultiArrayArg) -> Self {
        match a {
            MultiArrayArg::Placeholder => MultiArrayPolicy::Placeholder,
            MultiArrayArg::Reject => MultiArrayPolicy::Reject,
        }
    }
}

/// Output representation for the `build` command.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// C descriptor table.
    C,
    /// Serialized descriptor graph.
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::C => OutputFormat::C,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

impl CompileArgs {
    fn options(&self) -> CompileOptions {
        CompileOptions::default()
            .with_strict(self.strict)
            .with_fieldenum_indexing(self.fieldenum_index.into())
            .with_multi_array(self.multi_array.into())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.cmd {
        Cmd::Check { compile } => cmd_check(&compile)?,
        Cmd::Build {
            compile,
            out,
            format,
        } => cmd_build(&compile, &out, format.into())?,
        Cmd::Explain { id } => cmd_explain(&id),
    }
    Ok(())
}

/// Logs go to stderr; stdout carries tables and JSON summaries.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_check(args: &CompileArgs) -> Result<()> {
    match compile_path(&args.spec, &args.options()) {
        Ok(compilation) => {
            print_summary(true, Some(&compilation), &compilation.diagnostics);
            Ok(())
        }
        Err(err) => {
            report_failure(err)?;
            std::process::exit(1);
        }
    }
}

fn cmd_build(args: &CompileArgs, out: &Path, format: OutputFormat) -> Result<()> {
    let compilation = match compile_path(&args.spec, &args.options()) {
        Ok(c) => c,
        Err(err) => {
            report_failure(err)?;
            std::process::exit(1);
        }
    };
    for d in &compilation.diagnostics {
        eprintln!("{d}");
    }

    let text = emit(&compilation.graph, format).context("serializing descriptor graph")?;
    if out.as_os_str() == "-" {
        std::io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .context("writing to stdout")?;
        return Ok(());
    }

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    fs::write(out, text).with_context(|| format!("writing {}", out.display()))?;

    let stats = compilation.graph.stats();
    println!(
        "{}",
        serde_json::json!({
            "ok": true,
            "out": out.display().to_string(),
            "command_classes": stats.command_classes,
            "commands": stats.commands,
            "parameters": stats.parameters,
            "device_classes": stats.device_classes,
            "diagnostics": compilation.diagnostics.len(),
        })
    );
    Ok(())
}

fn cmd_explain(id: &str) {
    match diag::explain(id) {
        Some(text) => println!("{id}: {text}"),
        None => println!("{id}: (no explanation available)"),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn print_summary(ok: bool, compilation: Option<&Compilation>, diagnostics: &[Diagnostic]) {
    let stats = compilation.map(|c| c.graph.stats()).unwrap_or_default();
    println!(
        "{}",
        serde_json::json!({
            "ok": ok,
            "command_classes": stats.command_classes,
            "commands": stats.commands,
            "parameters": stats.parameters,
            "device_classes": stats.device_classes,
            "diagnostics": diagnostics,
        })
    );
}

/// Structural failures become a JSON summary with `ok: false`; load
/// failures (unreadable or malformed files) propagate as errors.
fn report_failure(err: CompileError) -> Result<()> {
    let diagnostics = match err {
        CompileError::StrictReferences { diagnostics } => diagnostics,
        other if other.code().is_some() => vec![other.to_diagnostic()],
        other => return Err(other).context("loading specification"),
    };
    for d in &diagnostics {
        eprintln!("{d}");
    }
    print_summary(false, None, &diagnostics);
    Ok(())
}
