//! Property checks for `visitors::linearity::classify` (spec §8): a
//! `Linear { coefficient, constant }` verdict must never itself mention
//! the state being classified, and a right-hand side built only from
//! products/sums/differences of state must never be misclassified as
//! constant.

use modcc_ast::ast::Expression;
use modcc_ast::symbol::ProcedureKind;
use modcc_compiler::visitors::linearity::{classify, depends_on, Linearity};

fn derivative_rhs(src: &str) -> (Expression, modcc_ast::symbol::SymbolId) {
    let (module, diags) = modcc_ast::parse(src);
    assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
    let deriv = module
        .symbols
        .iter()
        .find_map(|(_, s)| s.as_procedure().filter(|p| p.kind == ProcedureKind::Derivative))
        .expect("a DERIVATIVE block");
    match &deriv.body[0] {
        Expression::Derivative { state, rhs, .. } => (rhs.as_ref().clone(), *state),
        other => panic!("expected a derivative statement, got {other:?}"),
    }
}

#[test]
fn a_linear_verdict_never_mentions_the_state_in_its_coefficient_or_constant() {
    let (rhs, state) = derivative_rhs(
        "STATE { m }\nPARAMETER { tau = 10 minf = 0.5 }\nDERIVATIVE states {\n    m' = (minf - m) / tau\n}\n",
    );
    match classify(&rhs, state) {
        Linearity::Linear { coefficient, constant } => {
            assert!(!depends_on(&coefficient, state), "coefficient leaked the state: {coefficient:?}");
            assert!(!depends_on(&constant, state), "constant leaked the state: {constant:?}");
        }
        other => panic!("expected a linear verdict, got {other:?}"),
    }
}

#[test]
fn a_constant_verdict_is_returned_only_when_the_state_is_entirely_absent() {
    let (rhs, state) = derivative_rhs(
        "STATE { m }\nPARAMETER { k = 2 }\nDERIVATIVE states {\n    m' = k * 3\n}\n",
    );
    assert!(!depends_on(&rhs, state));
    assert!(matches!(classify(&rhs, state), Linearity::Constant(_)));
}

#[test]
fn squaring_the_state_is_never_classified_as_linear() {
    let (rhs, state) = derivative_rhs("STATE { m }\nDERIVATIVE states {\n    m' = m * m\n}\n");
    assert!(matches!(classify(&rhs, state), Linearity::Nonlinear));
}

#[test]
fn a_sum_of_two_state_terms_still_collapses_to_one_linear_coefficient() {
    let (rhs, state) = derivative_rhs(
        "STATE { m }\nPARAMETER { a = 1 b = 2 }\nDERIVATIVE states {\n    m' = a * m + b * m\n}\n",
    );
    match classify(&rhs, state) {
        Linearity::Linear { coefficient, .. } => assert!(!depends_on(&coefficient, state)),
        other => panic!("expected a linear verdict, got {other:?}"),
    }
}

#[test]
fn dividing_by_the_state_is_nonlinear() {
    let (rhs, state) = derivative_rhs("STATE { m }\nDERIVATIVE states {\n    m' = 1 / m\n}\n");
    assert!(matches!(classify(&rhs, state), Linearity::Nonlinear));
}
