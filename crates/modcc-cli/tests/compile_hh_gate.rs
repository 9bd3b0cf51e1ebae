//! End-to-end compile tests driving the library entry point directly
//! (no process spawn — `modcc_cli::run` is the same code path
//! `src/main.rs` calls).

use std::path::PathBuf;

use modcc_cli::{run, Args};

const HH_GATE: &str = "\
NEURON {\n\
    SUFFIX test\n\
    USEION na READ ena WRITE ina\n\
    RANGE gnabar\n\
}\n\
STATE { m }\n\
PARAMETER { gnabar = 0.12 }\n\
ASSIGNED { ina ena }\n\
INITIAL {\n\
    m = 0\n\
}\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
    ina = gnabar * m * (v - ena)\n\
}\n\
DERIVATIVE states {\n\
    m' = (1 - m) / 10\n\
}\n";

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write source");
    path
}

#[test]
fn compiles_a_well_formed_module_to_an_output_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_source(&dir, "hh_gate.mod", HH_GATE);
    let output = dir.path().join("hh_gate.out");

    let args = Args {
        input,
        output: Some(output.clone()),
        target: Some("cpu".to_string()),
        verbose: false,
        optimize: false,
    };
    run(&args).expect("compilation should succeed");

    let rendered = std::fs::read_to_string(&output).expect("read output");
    assert!(rendered.contains("api nrn_init"));
    assert!(rendered.contains("api nrn_state"));
    assert!(rendered.contains("api nrn_current"));
}

#[test]
fn optimize_flag_runs_without_error_on_a_point_process() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = "\
NEURON {\n\
    POINT_PROCESS test\n\
    USEION na READ ena WRITE ina\n\
}\n\
STATE { m }\n\
ASSIGNED { ina ena }\n\
INITIAL { m = 2 * 3 }\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
    ina = 0.12 * m * (v - ena)\n\
}\n\
DERIVATIVE states {\n\
    m' = (1 - m) / 10\n\
}\n";
    let input = write_source(&dir, "point.mod", src);
    let output = dir.path().join("point.out");

    let args = Args {
        input,
        output: Some(output.clone()),
        target: Some("simd".to_string()),
        verbose: false,
        optimize: true,
    };
    run(&args).expect("compilation should succeed");
    let rendered = std::fs::read_to_string(&output).expect("read output");
    assert!(rendered.contains("target = simd"));
}

#[test]
fn unknown_target_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_source(&dir, "hh_gate.mod", HH_GATE);

    let args = Args {
        input,
        output: None,
        target: Some("wasm".to_string()),
        verbose: false,
        optimize: false,
    };
    let err = run(&args).unwrap_err();
    assert!(matches!(err, modcc_cli::CliError::InvalidTarget(t) if t == "wasm"));
}

#[test]
fn a_module_with_a_nonlinear_derivative_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = "\
STATE { m }\n\
INITIAL { m = 0 }\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
}\n\
DERIVATIVE states {\n\
    m' = m * m + 1\n\
}\n";
    let input = write_source(&dir, "nonlinear.mod", src);

    let args = Args { input, output: None, target: None, verbose: false, optimize: false };
    let err = run(&args).unwrap_err();
    assert!(matches!(err, modcc_cli::CliError::Lowering(modcc_compiler::LoweringError::NonlinearDerivative { .. })));
}

#[test]
fn a_module_with_a_syntax_error_reports_a_compile_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_source(&dir, "broken.mod", "NEURON {\n");

    let args = Args { input, output: None, target: None, verbose: false, optimize: false };
    let err = run(&args).unwrap_err();
    assert!(matches!(err, modcc_cli::CliError::CompileFailed(n) if n > 0));
}

#[test]
fn modcc_toml_in_a_parent_directory_supplies_the_default_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("modcc.toml"), "target = \"gpu\"\n").expect("write config");
    let nested = dir.path().join("mechanisms");
    std::fs::create_dir_all(&nested).expect("create nested dir");
    let input_path = nested.join("hh_gate.mod");
    std::fs::write(&input_path, HH_GATE).expect("write source");
    let output = nested.join("hh_gate.out");

    let args = Args { input: input_path, output: Some(output.clone()), target: None, verbose: false, optimize: false };
    run(&args).expect("compilation should succeed");
    let rendered = std::fs::read_to_string(&output).expect("read output");
    assert!(rendered.contains("target = gpu"));
}
