use rand::{RngExt, rngs::StdRng, seq::SliceRandom};

use crate::{
    config::GenerationConfig,
    formula::{AtomKind, Formula, GenerationError, Operator},
    net::Model,
};

/// Picks between one and `max_size` distinct elements of `candidates`
/// (never more than there are candidates). The size is uniform, the elements
/// are the prefix of a uniform random permutation.
pub fn random_subset<'a>(
    rng: &mut StdRng,
    candidates: &'a [String],
    max_size: usize,
) -> Option<Vec<&'a str>> {
    if candidates.is_empty() {
        return None;
    }

    let upper = max_size.max(1).min(candidates.len());
    let size = rng.random_range(1..=upper);

    Some(random_sample(rng, candidates, size))
}

/// `size` distinct elements of `candidates` (all of them if there are fewer),
/// the prefix of a uniform random permutation.
pub fn random_sample<'a>(rng: &mut StdRng, candidates: &'a [String], size: usize) -> Vec<&'a str> {
    let mut shuffled: Vec<&str> = candidates.iter().map(String::as_str).collect();
    shuffled.shuffle(rng);
    shuffled.truncate(size);
    shuffled
}

/// Binds atom placeholders to the places and transitions of one model.
#[derive(Debug, Clone)]
pub struct AtomBinder<'a> {
    places: &'a [String],
    transitions: &'a [String],
    max_fireability_atom_size: usize,
    max_cardinality_atom_size: usize,
    constant_bounds: (i64, i64),
}

impl<'a> AtomBinder<'a> {
    pub fn new(places: &'a [String], transitions: &'a [String], config: &GenerationConfig) -> Self {
        AtomBinder {
            places,
            transitions,
            max_fireability_atom_size: *config.get_max_fireability_atom_size(),
            max_cardinality_atom_size: *config.get_max_cardinality_atom_size(),
            constant_bounds: config.integer_constant_bounds(),
        }
    }

    /// Uses the generation identifiers of `model`. The constant range is
    /// widened up to the largest constant of the initial marking, when known.
    pub fn for_model(model: &'a Model, config: &GenerationConfig) -> Self {
        let binder = AtomBinder::new(&model.places, &model.transitions, config);

        match model.max_marking_constant {
            Some(max_marking) if max_marking > binder.constant_bounds.1 => {
                let min = binder.constant_bounds.0;
                binder.with_constant_bounds((min, max_marking))
            }
            _ => binder,
        }
    }

    pub fn with_constant_bounds(mut self, constant_bounds: (i64, i64)) -> Self {
        self.constant_bounds = constant_bounds;
        self
    }

    pub fn constant_bounds(&self) -> (i64, i64) {
        self.constant_bounds
    }

    /// Replaces every atom placeholder of `formula`.
    pub fn bind(
        &self,
        formula: Formula,
        kind: AtomKind,
        rng: &mut StdRng,
    ) -> Result<Formula, GenerationError> {
        if formula.is_atom() {
            return match kind {
                AtomKind::Fireability => self.fireability_atom(rng),
                AtomKind::Cardinality => self.cardinality_atom(rng),
            };
        }

        let Formula {
            operator,
            operands,
        } = formula;
        let operands = operands
            .into_iter()
            .map(|op| self.bind(op, kind, rng))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Formula::new(operator, operands))
    }

    /// `is-fireable(t1, ..., tk)`.
    pub fn fireability_atom(&self, rng: &mut StdRng) -> Result<Formula, GenerationError> {
        let transitions = random_subset(rng, self.transitions, self.max_fireability_atom_size)
            .ok_or(GenerationError::NoCandidates(AtomKind::Fireability))?;

        Ok(Formula::new(
            Operator::is_fireable(),
            transitions
                .into_iter()
                .map(|t| Formula::leaf(Operator::literal(t)))
                .collect(),
        ))
    }

    /// `leq(a, b)` where one side is a token count and the other a constant,
    /// or both sides are token counts.
    pub fn cardinality_atom(&self, rng: &mut StdRng) -> Result<Formula, GenerationError> {
        let (left, right) = match rng.random_range(0..3usize) {
            0 => (self.token_count(rng)?, self.integer_constant(rng)),
            1 => (self.integer_constant(rng), self.token_count(rng)?),
            _ => (self.token_count(rng)?, self.token_count(rng)?),
        };

        Ok(Formula::new(Operator::leq(), vec![left, right]))
    }

    fn token_count(&self, rng: &mut StdRng) -> Result<Formula, GenerationError> {
        let places = random_subset(rng, self.places, self.max_cardinality_atom_size)
            .ok_or(GenerationError::NoCandidates(AtomKind::Cardinality))?;

        Ok(Formula::new(
            Operator::token_count(),
            places
                .into_iter()
                .map(|p| Formula::leaf(Operator::literal(p)))
                .collect(),
        ))
    }

    fn integer_constant(&self, rng: &mut StdRng) -> Formula {
        let (min, max) = self.constant_bounds;
        Formula::integer_constant(rng.random_range(min..=max))
    }
}
