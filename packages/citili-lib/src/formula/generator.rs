use rand::{RngExt, rngs::StdRng};

use crate::formula::{
    ALL_PATHS, EXISTS_PATH, FINALLY, Formula, GLOBALLY, GenerationError, Grammar, Operator,
    operators::OperatorCatalog,
};

/// Below this depth the CTL grammar can only produce formulas without a
/// temporal operator, which are all rejected.
pub const MIN_CTL_DEPTH: usize = 2;

/// Random formula trees over the operators of an [`OperatorCatalog`].
///
/// All randomness comes from the `StdRng` handed to each call, so the same
/// seed and parameters always yield the same tree.
#[derive(Debug, Clone, Copy)]
pub struct FormulaGenerator<'a> {
    catalog: &'a OperatorCatalog,
}

impl<'a> FormulaGenerator<'a> {
    pub fn new(catalog: &'a OperatorCatalog) -> Self {
        FormulaGenerator { catalog }
    }

    pub fn generate(
        &self,
        grammar: Grammar,
        rng: &mut StdRng,
        max_depth: usize,
    ) -> Result<Formula, GenerationError> {
        match grammar {
            Grammar::CTL => self.ctl_formula(rng, max_depth),
            Grammar::Reachability => Ok(self.reachability_formula(rng, max_depth)),
        }
    }

    /// A CTL formula that is neither in the linear-time fragment nor free of
    /// temporal operators, with double negations removed. Atoms are still
    /// placeholders.
    pub fn ctl_formula(
        &self,
        rng: &mut StdRng,
        max_depth: usize,
    ) -> Result<Formula, GenerationError> {
        if max_depth < MIN_CTL_DEPTH {
            return Err(GenerationError::DepthTooSmall {
                depth: max_depth,
                min: MIN_CTL_DEPTH,
            });
        }

        let mut rejected = 0usize;
        loop {
            let formula = self.boolean_formula(rng, max_depth);
            if is_interesting(&formula) && !is_linear_time(&formula) {
                tracing::trace!(rejected, "accepted CTL formula");
                return Ok(formula.remove_double_negations());
            }
            rejected += 1;
        }
    }

    /// `A G state` or `E F state` with equal probability.
    pub fn reachability_formula(&self, rng: &mut StdRng, max_depth: usize) -> Formula {
        let state = self.state_formula(rng, max_depth);

        let (quantifier, modality) = if rng.random_range(0..2usize) == 0 {
            (ALL_PATHS, GLOBALLY)
        } else {
            (EXISTS_PATH, FINALLY)
        };

        Formula::new(
            Operator::new(quantifier, 1, 1, false),
            vec![Formula::new(
                Operator::new(modality, 1, 1, false),
                vec![state],
            )],
        )
        .remove_double_negations()
    }

    /// An unconstrained formula of the boolean category. At depth one or
    /// below this is always an atom placeholder.
    pub fn boolean_formula(&self, rng: &mut StdRng, max_depth: usize) -> Formula {
        if max_depth <= 1 {
            return Formula::atom();
        }

        let operator = pick(rng, self.catalog.boolean_operators());
        let arity = rng.random_range(operator.min_arity..=operator.max_arity);

        let mut operands = Vec::with_capacity(arity);
        for _ in 0..arity {
            if operator.is_over_booleans {
                operands.push(self.boolean_formula(rng, max_depth - 1));
            } else {
                operands.push(self.path_formula(rng, max_depth - 1));
            }
        }

        Formula::new(operator, operands)
    }

    /// A temporal operator applied to boolean formulas.
    pub fn path_formula(&self, rng: &mut StdRng, max_depth: usize) -> Formula {
        let operator = pick(rng, self.catalog.path_operators());
        let arity = rng.random_range(operator.min_arity..=operator.max_arity);

        let mut operands = Vec::with_capacity(arity);
        for _ in 0..arity {
            operands.push(self.boolean_formula(rng, max_depth.saturating_sub(1)));
        }

        Formula::new(operator, operands)
    }

    /// A formula built from atoms and boolean connectives only.
    pub fn state_formula(&self, rng: &mut StdRng, max_depth: usize) -> Formula {
        if max_depth <= 1 {
            return Formula::atom();
        }

        let operator = pick(rng, self.catalog.state_operators());
        let arity = rng.random_range(operator.min_arity..=operator.max_arity);

        let mut operands = Vec::with_capacity(arity);
        for _ in 0..arity {
            operands.push(self.state_formula(rng, max_depth - 1));
        }

        Formula::new(operator, operands)
    }
}

fn pick(rng: &mut StdRng, operators: &[Operator]) -> Operator {
    operators[rng.random_range(0..operators.len())].clone()
}

/// An `A` at the root over a subformula without any path quantifier
/// expresses an LTL property. Deeper `A` nodes are not inspected.
pub fn is_linear_time(formula: &Formula) -> bool {
    formula.operator.name == ALL_PATHS
        && !formula
            .operands
            .iter()
            .any(|op| op.contains_path_quantifier())
}

/// A formula is interesting if it uses at least one temporal operator. This
/// rules out bare atoms and pure boolean combinations.
pub fn is_interesting(formula: &Formula) -> bool {
    formula.contains_path_operator()
}
