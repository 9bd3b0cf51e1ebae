//! Argument parsing and the compile pipeline driving spec §6's CLI
//! contract.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use modcc_ast::diagnostics::{Diagnostics, Severity};
use modcc_compiler::printer::{DebugPrinter, Printer, Target};

use crate::config::{ColorPreference, ModccConfig};
use crate::error::{CliError, CliResult};

/// modcc — a source-to-source compiler for neuronal membrane-mechanism
/// modules.
#[derive(Parser, Debug)]
#[command(name = "modcc", version, about = "Compile a membrane-mechanism module into the printer data contract")]
pub struct Args {
    /// Path to the `.mod` source file to compile.
    pub input: PathBuf,

    /// Output path (defaults to stdout).
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Downstream backend target.
    #[arg(short = 't', long = "target")]
    pub target: Option<String>,

    /// Enable verbose tracing.
    #[arg(short = 'V', long = "verbose")]
    pub verbose: bool,

    /// Enable the optional optimisation pass (spec §4.9).
    #[arg(short = 'O', long = "optimize")]
    pub optimize: bool,
}

/// Run the full compile pipeline for `args`, writing the printer
/// contract's rendering to the requested output. Returns the resolved
/// exit status the caller should report to the OS.
pub fn run(args: &Args) -> CliResult<()> {
    let config_start = args.input.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let config = ModccConfig::discover(config_start)?;

    let target_name = args.target.clone().or_else(|| config.target.clone()).unwrap_or_else(|| "cpu".to_string());
    let target = Target::parse(&target_name).ok_or_else(|| CliError::InvalidTarget(target_name.clone()))?;
    let optimize = args.optimize || config.optimize.unwrap_or(false);
    apply_color_preference(config.color.unwrap_or_default());

    tracing::info!(target = target.name(), optimize, input = %args.input.display(), "compiling module");

    let module_name = args.input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| args.input.display().to_string());
    let source = std::fs::read_to_string(&args.input)?;

    let (mut module, mut diags) = modcc_ast::parse(&source);
    if diags.has_errors() {
        print_diagnostics(&diags, &module_name);
        return Err(CliError::CompileFailed(diags.num_errors()));
    }

    let semantic_diags = modcc_compiler::semantic::analyze(&module);
    let had_warnings = !semantic_diags.records().is_empty() && !semantic_diags.has_errors();
    if had_warnings {
        tracing::warn!("semantic analysis reported warnings");
    }
    if semantic_diags.has_errors() {
        print_diagnostics(&semantic_diags, &module_name);
        diags.extend(semantic_diags);
        return Err(CliError::CompileFailed(diags.num_errors()));
    }
    print_diagnostics(&semantic_diags, &module_name);

    tracing::debug!("lowering module to nrn_init/nrn_state/nrn_current");
    modcc_compiler::lowering::lower(&mut module)?;

    if optimize {
        tracing::debug!("running optimisation pass");
        modcc_compiler::optimize::run(&mut module);
    }

    let mut printer = DebugPrinter::new(target);
    match &args.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            printer.print(&module, &mut file)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            printer.print(&module, &mut lock)?;
            lock.flush()?;
        }
    }

    Ok(())
}

/// Apply the resolved `modcc.toml`/CLI color preference to `console`'s
/// global toggle. `Auto` leaves `console`'s own terminal detection alone.
fn apply_color_preference(pref: ColorPreference) {
    match pref {
        ColorPreference::Always => console::set_colors_enabled(true),
        ColorPreference::Never => console::set_colors_enabled(false),
        ColorPreference::Auto => {}
    }
}

/// Write `diags` to stderr, one line per record, with the severity label
/// colorized per `apply_color_preference`'s resolved setting.
fn print_diagnostics(diags: &Diagnostics, module_name: &str) {
    for d in diags.records() {
        let severity = match d.severity {
            Severity::Error => console::style("error").red().bold(),
            Severity::Warning => console::style("warning").yellow().bold(),
        };
        eprintln!("{module_name}:{}: {severity}: {}", d.location, d.message);
    }
}
