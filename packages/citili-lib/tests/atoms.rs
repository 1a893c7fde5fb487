use citili_lib::{
    config::GenerationConfig,
    formula::{
        AtomKind, Formula, GenerationError, INTEGER_CONSTANT, IS_FIREABLE, LEQ, TOKEN_COUNT,
        atoms::{AtomBinder, random_sample, random_subset},
        generator::FormulaGenerator,
        operators::OperatorCatalog,
    },
    net::{Model, NetVariant},
};
use itertools::Itertools;
use rand::{SeedableRng, rngs::StdRng};

fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}", prefix, i)).collect()
}

fn constants(formula: &Formula, res: &mut Vec<i64>) {
    if formula.name() == INTEGER_CONSTANT {
        res.extend(formula.operands.iter().filter_map(|c| c.name().parse::<i64>().ok()));
        return;
    }
    for op in &formula.operands {
        constants(op, res);
    }
}

#[test]
fn sample_of_whole_pool() {
    let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample = random_sample(&mut rng, &pool, 3);

        assert_eq!(sample.len(), 3);
        assert_eq!(sample.iter().sorted().collect_vec(), vec![&"a", &"b", &"c"]);
    }
}

#[test]
fn subsets_are_bounded_and_distinct() {
    let pool = ids("t", 10);

    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let subset = random_subset(&mut rng, &pool, 4).unwrap();

        assert!(!subset.is_empty() && subset.len() <= 4);
        assert_eq!(subset.iter().unique().count(), subset.len());
        assert!(subset.iter().all(|t| pool.iter().any(|p| p == t)));
    }

    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(random_subset(&mut rng, &[], 4), None);
    // never more than the pool
    assert!(random_subset(&mut rng, &pool[..2], 10).unwrap().len() <= 2);
}

#[test]
fn fireability_atoms_use_model_transitions() {
    let places = ids("p", 3);
    let transitions = ids("t", 5);
    let config = GenerationConfig::default().with_max_fireability_atom_size(2);
    let binder = AtomBinder::new(&places, &transitions, &config);
    let catalog = OperatorCatalog::new(2);
    let generator = FormulaGenerator::new(&catalog);

    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let formula = generator.ctl_formula(&mut rng, 3).unwrap();
        let bound = binder.bind(formula, AtomKind::Fireability, &mut rng).unwrap();

        assert!(!bound.contains_atom());
        assert!(bound.respects_arities());
        assert!(bound.places().is_empty());
        assert!(
            bound
                .transitions()
                .iter()
                .all(|t| transitions.iter().any(|m| m == t))
        );
        assert!(!bound.any(&|f| f.name() == IS_FIREABLE && f.operands.len() > 2));
    }
}

#[test]
fn cardinality_constants_within_bounds() {
    let places = ids("p", 4);
    let transitions = ids("t", 1);
    let config = GenerationConfig::default()
        .with_min_integer_constant(3)
        .with_max_integer_constant(7)
        .with_max_cardinality_atom_size(3);
    let binder = AtomBinder::new(&places, &transitions, &config);

    let mut all_constants = vec![];
    for seed in 0..100 {
        let mut rng = StdRng::seed_from_u64(seed);
        let atom = binder.cardinality_atom(&mut rng).unwrap();

        assert_eq!(atom.name(), LEQ);
        assert_eq!(atom.operands.len(), 2);
        assert!(
            atom.operands
                .iter()
                .all(|op| op.name() == TOKEN_COUNT || op.name() == INTEGER_CONSTANT)
        );
        assert!(atom.places().iter().all(|p| places.iter().any(|m| m == p)));

        constants(&atom, &mut all_constants);
    }

    assert!(!all_constants.is_empty());
    assert!(all_constants.iter().all(|c| (3..=7).contains(c)));
}

#[test]
fn marking_constant_widens_bounds() {
    let config = GenerationConfig::default().with_max_integer_constant(10);
    let model = Model::new("M", "1", NetVariant::PlaceTransition, "M-PT-1".into())
        .with_identifiers(ids("p", 2), ids("t", 2));

    let mut big = model.clone();
    big.max_marking_constant = Some(500);
    assert_eq!(AtomBinder::for_model(&big, &config).constant_bounds(), (0, 500));

    let mut small = model;
    small.max_marking_constant = Some(5);
    assert_eq!(AtomBinder::for_model(&small, &config).constant_bounds(), (0, 10));
}

#[test]
fn empty_candidates_fail() {
    let config = GenerationConfig::default();
    let binder = AtomBinder::new(&[], &[], &config);
    let mut rng = StdRng::seed_from_u64(0);

    assert_eq!(
        binder.bind(Formula::atom(), AtomKind::Fireability, &mut rng),
        Err(GenerationError::NoCandidates(AtomKind::Fireability))
    );
    // every shape has at least one token count
    let results = (0..20)
        .map(|_| binder.cardinality_atom(&mut rng))
        .collect_vec();
    assert!(results.iter().all(|r| r.is_err()));
}
