//! `nrn_state` synthesis for a linear `DERIVATIVE` block (spec §8: "a
//! linear state ODE always lowers to a closed-form update").

use modcc_ast::Module;
use modcc_compiler::lowering::lower;

fn compile(src: &str) -> Module {
    let (mut module, diags) = modcc_ast::parse(src);
    assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
    let sem = modcc_compiler::semantic::analyze(&module);
    assert!(!sem.has_errors(), "{}", sem.render("t.mod"));
    lower(&mut module).expect("lowering should succeed");
    module
}

const LINEAR_GATE: &str = "\
NEURON {\n\
    SUFFIX test\n\
}\n\
STATE { m }\n\
PARAMETER { minf = 0.5 tau = 10 }\n\
ASSIGNED { }\n\
INITIAL {\n\
    m = 0\n\
}\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
}\n\
DERIVATIVE states {\n\
    m' = (minf - m) / tau\n\
}\n";

#[test]
fn a_linear_derivative_synthesizes_nrn_state_with_the_cnexp_temporaries() {
    let module = compile(LINEAR_GATE);
    let nrn_state = module.api_methods.iter().find(|m| m.name == "nrn_state").expect("nrn_state synthesized");
    assert!(nrn_state.locals.contains_key("a_"), "expected the coefficient temporary 'a_'");
    assert!(nrn_state.locals.contains_key("ba_"), "expected the 'b/a' temporary 'ba_'");
    assert!(!nrn_state.body.is_empty(), "nrn_state body should not be empty for a solved state");
}

#[test]
fn nrn_states_sole_output_is_the_integrated_state_itself() {
    let module = compile(LINEAR_GATE);
    let nrn_state = module.api_methods.iter().find(|m| m.name == "nrn_state").expect("nrn_state synthesized");
    let m = *module.globals.get("m").expect("state 'm' is a global");
    assert_eq!(nrn_state.outputs.len(), 1);
    assert_eq!(nrn_state.outputs[0].local, m);
    assert_eq!(nrn_state.outputs[0].external, m);
}

#[test]
fn a_breakpoint_with_no_solve_statement_yields_an_empty_nrn_state() {
    let module = compile(
        "STATE { m }\nINITIAL { m = 0 }\nBREAKPOINT { }\nDERIVATIVE states {\n    m' = -m\n}\n",
    );
    let nrn_state = module.api_methods.iter().find(|m| m.name == "nrn_state").expect("nrn_state synthesized");
    assert!(nrn_state.body.is_empty());
    assert!(nrn_state.outputs.is_empty());
}
