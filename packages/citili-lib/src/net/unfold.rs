use crate::{
    formula::{Formula, IS_FIREABLE, Operator, TOKEN_COUNT},
    net::correspondence::{Correspondence, IdentifierMapping},
};

/// Rewrites a formula over the identifiers of a colored model into the same
/// formula over the identifiers of its PT twin.
///
/// The operands of `is-fireable` and `token-count` are replaced, in order, by
/// the unfoldings of each identifier. Every other node keeps its operator and
/// its operands are unfolded recursively. Identifiers without unfolding
/// contribute nothing; generation never uses them once the correspondence
/// has been built.
pub fn unfold(formula: &Formula, correspondence: &Correspondence) -> Formula {
    match formula.name() {
        IS_FIREABLE => unfold_leaf(formula, &correspondence.transitions),
        TOKEN_COUNT => unfold_leaf(formula, &correspondence.places),
        _ => Formula::new(
            formula.operator.clone(),
            formula
                .operands
                .iter()
                .map(|op| unfold(op, correspondence))
                .collect(),
        ),
    }
}

fn unfold_leaf(formula: &Formula, mapping: &IdentifierMapping) -> Formula {
    Formula::new(
        formula.operator.clone(),
        formula
            .operands
            .iter()
            .flat_map(|id| mapping.get(id.name()))
            .map(|unfolded| Formula::leaf(Operator::literal(unfolded.as_str())))
            .collect(),
    )
}
