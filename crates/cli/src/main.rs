mod render;

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use edi_toolchain_core::tokenizer::{decode_latin1, encode_latin1};
use edi_toolchain_core::{
    Event, EventRecorder, InterchangeReader, NullHandler, ReadSummary, ReaderConfig, StrSource,
    SyntaxDescriptor, load_config_from_str,
};
use edi_toolchain_diagnostics::{self as diag, Diagnostic, Severity};
use edi_toolchain_plans::{PlanKey, PlanRegistry, Standard, load_plan_from_str};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::render::{Format, print_summary, render_diagnostics};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "edi",
    version,
    about = "EDI toolchain: read X12 and EDIFACT interchanges, report their loop structure, and generate 997 acknowledgments"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Log to stderr: -v for debug, -vv for trace. `RUST_LOG` applies when
    /// not given.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Read an interchange file and print its structure.
    Scan {
        file: String,
        /// Extra loop plan (JSON). Numeric document types register as X12,
        /// others as EDIFACT. May be repeated.
        #[arg(long = "plan")]
        plans: Vec<String>,
        /// Reader configuration (JSON).
        #[arg(long)]
        config: Option<String>,
    },

    /// Read an X12 interchange file and write its 997 acknowledgment.
    Ack {
        file: String,
        /// Write the acknowledgment here instead of stdout.
        #[arg(long)]
        out: Option<String>,
        /// Element delimiter for the acknowledgment (default: the input's).
        #[arg(long)]
        delimiter: Option<char>,
        /// Segment terminator for the acknowledgment (default: the input's).
        #[arg(long)]
        terminator: Option<char>,
        /// Text written after each terminator; `\r`, `\n` and `\t` escapes
        /// are understood.
        #[arg(long)]
        suffix: Option<String>,
        /// Extra loop plan (JSON), as for `scan`.
        #[arg(long = "plan")]
        plans: Vec<String>,
        /// Reader configuration (JSON).
        #[arg(long)]
        config: Option<String>,
    },

    /// List the loop plans available to `scan` and `ack`.
    Plans {
        /// Extra loop plan (JSON), as for `scan`.
        #[arg(long = "plan")]
        plans: Vec<String>,
    },

    /// Explain a diagnostic ID (e.g. EDI2001).
    Explain { id: String },
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = Format::resolve_or_detect(cli.output.as_deref());

    let result = match cli.cmd {
        Cmd::Scan {
            file,
            plans,
            config,
        } => cmd_scan(&file, &plans, config.as_deref(), format),
        Cmd::Ack {
            file,
            out,
            delimiter,
            terminator,
            suffix,
            plans,
            config,
        } => {
            let overrides = SyntaxDescriptor {
                delimiter,
                terminator,
                terminator_suffix: suffix.as_deref().map(unescape),
            };
            cmd_ack(
                &file,
                out.as_deref(),
                overrides,
                &plans,
                config.as_deref(),
                format,
            )
        }
        Cmd::Plans { plans } => cmd_plans(&plans, format),
        Cmd::Explain { id } => cmd_explain(&id, format),
    };

    if let Err(err) = result {
        report_failure(&err, format);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_scan(file: &str, plan_paths: &[String], config: Option<&str>, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let config = load_config(config)?;
    let registry = load_registry(plan_paths)?;

    let mut reader = InterchangeReader::new(StrSource::new(&input), config, &registry)
        .context("invalid reader configuration")?;
    let mut recorder = EventRecorder::new();
    let outcome = reader.read(&mut recorder);
    let (summary, diagnostics) = settle(reader.summary(), outcome);
    let ok = !has_errors(&diagnostics);

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "ok": ok,
                "summary": summary,
                "events": recorder.events,
                "diagnostics": diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            print_tree(&recorder.events);
            render_diagnostics(&input, file, &diagnostics);
            print_summary(&diagnostics);
            eprintln!(
                "{} interchange(s), {} group(s), {} transaction(s), {} segment(s)",
                summary.interchanges, summary.groups, summary.transactions, summary.segments
            );
        }
    }

    exit_on_errors(&diagnostics);
    Ok(())
}

fn cmd_ack(
    file: &str,
    out: Option<&str>,
    overrides: SyntaxDescriptor,
    plan_paths: &[String],
    config: Option<&str>,
    format: Format,
) -> Result<()> {
    let input = read_input(file)?;
    let mut config = load_config(config)?;
    if overrides != SyntaxDescriptor::default() {
        let base = config.ack_syntax.clone().unwrap_or_default();
        config = config.with_ack_syntax(SyntaxDescriptor {
            delimiter: overrides.delimiter.or(base.delimiter),
            terminator: overrides.terminator.or(base.terminator),
            terminator_suffix: overrides.terminator_suffix.or(base.terminator_suffix),
        });
    }
    let registry = load_registry(plan_paths)?;

    let mut reader = InterchangeReader::new(StrSource::new(&input), config, &registry)
        .context("invalid reader configuration")?
        .with_acknowledgment(Vec::new());
    let outcome = reader.read(&mut NullHandler);
    let (summary, diagnostics) = settle(reader.summary(), outcome);
    let ack = String::from_utf8(reader.into_ack_sink().unwrap_or_default())
        .context("acknowledgment is not valid UTF-8")?;

    // Written in the input's encoding.
    let ack_bytes = encode_latin1(&ack);
    if let Some(path) = out {
        fs::write(path, &ack_bytes).with_context(|| format!("failed to write '{path}'"))?;
        debug!(path, bytes = ack_bytes.len(), "acknowledgment written");
    }

    match format {
        Format::Json => {
            let mut result = serde_json::json!({
                "ok": !has_errors(&diagnostics),
                "acknowledgments": summary.acknowledgments,
                "diagnostics": diagnostics,
            });
            match out {
                Some(path) => result["out"] = path.into(),
                None => result["acknowledgment"] = ack.into(),
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Pretty => {
            if out.is_none() && !ack.is_empty() {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&ack_bytes)?;
                if !ack.ends_with('\n') {
                    writeln!(stdout)?;
                }
            }
            render_diagnostics(&input, file, &diagnostics);
            print_summary(&diagnostics);
            if summary.acknowledgments.is_empty() {
                eprintln!("no acknowledgment generated");
            }
        }
    }

    exit_on_errors(&diagnostics);
    Ok(())
}

fn cmd_plans(plan_paths: &[String], format: Format) -> Result<()> {
    let registry = load_registry(plan_paths)?;
    let keys = registry.keys();

    match format {
        Format::Json => {
            let entries: Vec<_> = keys
                .iter()
                .filter_map(|key| registry.get(key).map(|plan| (key, plan)))
                .map(|(key, plan)| {
                    serde_json::json!({
                        "standard": key.standard,
                        "documentType": key.document_type,
                        "version": key.version,
                        "release": key.release,
                        "description": plan.description,
                        "loops": plan.loops.len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Format::Pretty => {
            for key in &keys {
                let Some(plan) = registry.get(key) else {
                    continue;
                };
                println!(
                    "{:<24} {} ({} descriptors)",
                    key.to_string(),
                    plan.description.as_deref().unwrap_or("-"),
                    plan.loops.len()
                );
            }
        }
    }
    Ok(())
}

fn cmd_explain(id: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "id": id,
                "explanation": diag::explain(id),
                "severity": diag::default_severity(id),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            if let Some(text) = diag::explain(id) {
                use ariadne::Fmt;
                println!("{}: {}", id.fg(ariadne::Color::Cyan), text);
            } else {
                println!("{id}: (no explanation available)");
            }
        }
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Read a file and decode it as Latin-1, the widest single-byte EDI charset.
fn read_input(file: &str) -> Result<String> {
    let bytes = fs::read(file).with_context(|| format!("failed to read '{file}'"))?;
    Ok(decode_latin1(&bytes))
}

fn load_config(path: Option<&str>) -> Result<ReaderConfig> {
    let Some(path) = path else {
        return Ok(ReaderConfig::default());
    };
    let json =
        fs::read_to_string(path).with_context(|| format!("failed to read config '{path}'"))?;
    load_config_from_str(&json).with_context(|| format!("invalid config '{path}'"))
}

/// Builtin plans plus the plan files given on the command line. A file
/// replaces a builtin plan for the same document type.
fn load_registry(paths: &[String]) -> Result<PlanRegistry> {
    let mut registry = PlanRegistry::builtin();
    for path in paths {
        let json =
            fs::read_to_string(path).with_context(|| format!("failed to read plan '{path}'"))?;
        let plan = load_plan_from_str(&json).with_context(|| format!("invalid plan '{path}'"))?;
        let key = PlanKey::new(standard_for(&plan.document), &plan.document);
        debug!(%key, path, "registered plan");
        registry.register(key, plan);
    }
    Ok(registry)
}

/// X12 transaction set identifiers are numeric; EDIFACT message types are
/// alphabetic.
fn standard_for(document: &str) -> Standard {
    if document.chars().all(|c| c.is_ascii_digit()) {
        Standard::AnsiX12
    } else {
        Standard::Edifact
    }
}

/// Final summary and the full diagnostic list, with a fatal error appended.
fn settle(
    progress: &ReadSummary,
    outcome: Result<ReadSummary, edi_toolchain_core::EdiError>,
) -> (ReadSummary, Vec<Diagnostic>) {
    match outcome {
        Ok(summary) => {
            let diagnostics = summary.diagnostics.clone();
            (summary, diagnostics)
        }
        Err(err) => {
            debug!(error = %err, "read failed");
            let mut diagnostics = progress.diagnostics.clone();
            diagnostics.push(err.to_diagnostic());
            (progress.clone(), diagnostics)
        }
    }
}

/// Indented outline of the structure to stdout.
fn print_tree(events: &[Event]) {
    let mut base = 0usize;
    let mut loops = 0usize;
    let pad = |n: usize| "  ".repeat(n);
    for event in events {
        match event {
            Event::StartInterchange { interchange } => {
                println!(
                    "{} interchange {} ({} -> {})",
                    interchange.standard,
                    interchange.control_number,
                    interchange.sender,
                    interchange.receiver
                );
                base = 1;
            }
            Event::StartGroup { group } => {
                println!(
                    "{}group {} {}",
                    pad(base),
                    group.function_code,
                    group.control_number
                );
                base = 2;
            }
            Event::StartTransaction { transaction } => {
                println!(
                    "{}{} {}",
                    pad(base),
                    transaction.document_type,
                    transaction.control_number
                );
                base = 3;
                loops = 0;
            }
            Event::StartLoop { name, level } => {
                println!("{}[{name}] level {level}", pad(base + loops));
                loops += 1;
            }
            Event::EndLoop { .. } => loops = loops.saturating_sub(1),
            Event::Segment { name, depth } => println!("{}{name}", pad(base + depth)),
            Event::EndTransaction { .. } => base = 2,
            Event::EndGroup { .. } => base = 1,
            Event::EndInterchange { .. } => base = 0,
        }
    }
}

/// Turn `\r`, `\n` and `\t` escapes into the characters they name.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| matches!(d.severity, Severity::Error))
}

/// Exit with code 1 if any diagnostic is an error.
/// Warnings and info do not cause a non-zero exit.
fn exit_on_errors(diagnostics: &[Diagnostic]) {
    if has_errors(diagnostics) {
        process::exit(1);
    }
}

/// Report a command failure in the requested format.
fn report_failure(err: &anyhow::Error, format: Format) {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "success": false,
                "error": "command_failed",
                "message": format!("{err:#}"),
            });
            println!("{out:#}");
        }
        Format::Pretty => eprintln!("error: {err:#}"),
    }
}
