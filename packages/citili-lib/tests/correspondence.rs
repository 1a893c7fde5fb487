use citili_lib::{
    config::GenerationConfig,
    formula::{
        AtomKind, Formula, Operator, atoms::AtomBinder, generator::FormulaGenerator,
        operators::OperatorCatalog,
    },
    net::{
        Model, NetVariant,
        correspondence::{
            Correspondence, MappingError, build_correspondence, ensure_correspondence, map_identifiers,
        },
        unfold::unfold,
    },
};
use rand::{SeedableRng, rngs::StdRng};

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn pair(
    colored_places: &[&str],
    colored_transitions: &[&str],
    places: &[&str],
    transitions: &[&str],
) -> (Model, Model) {
    let colored = Model::new("M", "1", NetVariant::Colored, "M-COL-1".into())
        .with_identifiers(strings(colored_places), strings(colored_transitions));
    let uncolored = Model::new("M", "1", NetVariant::PlaceTransition, "M-PT-1".into())
        .with_identifiers(strings(places), strings(transitions));
    (colored, uncolored)
}

fn owned(
    result: Result<&Correspondence, &MappingError>,
) -> Result<Correspondence, MappingError> {
    result.cloned().map_err(Clone::clone)
}

#[test]
fn prefix_mapping() {
    let mapping = map_identifiers(&strings(&["P1", "P2"]), &strings(&["P1.0", "P1.1", "P2.0"]));

    assert_eq!(mapping.get("P1"), &strings(&["P1.0", "P1.1"])[..]);
    assert_eq!(mapping.get("P2"), &strings(&["P2.0"])[..]);
    assert!(mapping.unmapped.is_empty());
    assert!(mapping.unclaimed.is_empty());
    assert_eq!(mapping.mapped, strings(&["P1", "P2"]));
}

#[test]
fn colored_ids_are_not_unfoldings_of_their_prefixes() {
    // `P1` is a colored place of its own, not an instance of `P`
    let mapping = map_identifiers(&strings(&["P", "P1"]), &strings(&["P_a", "P1", "P_b"]));

    assert_eq!(mapping.get("P"), &strings(&["P_a", "P_b"])[..]);
    assert_eq!(mapping.get("P1"), &strings(&["P1"])[..]);
}

#[test]
fn unmapped_and_unclaimed() {
    let mapping = map_identifiers(&strings(&["A", "B"]), &strings(&["A_0", "C_0"]));

    assert_eq!(mapping.mapped, strings(&["A"]));
    assert_eq!(mapping.unmapped, strings(&["B"]));
    assert_eq!(mapping.unclaimed, strings(&["C_0"]));
    assert!(mapping.get("B").is_empty());
    assert!(mapping.get("unknown").is_empty());
    assert!(mapping.iter().all(|(_, image)| !image.is_empty()));
}

#[test]
fn empty_mapping_is_an_error() {
    let (colored, uncolored) = pair(&["X"], &["T"], &["Y"], &["T_0"]);
    assert_eq!(
        build_correspondence(&colored, &uncolored),
        Err(MappingError::EmptyPlaces)
    );

    let (colored, uncolored) = pair(&["P"], &["T"], &["P_0"], &["U_0"]);
    assert_eq!(
        build_correspondence(&colored, &uncolored),
        Err(MappingError::EmptyTransitions)
    );
}

#[test]
fn correspondence_is_cached_and_restricts_identifiers() {
    let (mut colored, uncolored) = pair(
        &["P1", "P2", "Lost"],
        &["T1"],
        &["P1.0", "P1.1", "P2.0"],
        &["T1.0", "T1.1"],
    );

    let first = owned(ensure_correspondence(&mut colored, &uncolored));
    assert!(first.is_ok());
    assert_eq!(colored.places, strings(&["P1", "P2"]));
    assert_eq!(colored.unmapped_places, strings(&["Lost"]));
    assert_eq!(colored.transitions, strings(&["T1"]));

    // a different twin is ignored once the outcome is known
    let (_, other) = pair(&[], &[], &["Z"], &["Z"]);
    let second = owned(ensure_correspondence(&mut colored, &other));
    assert_eq!(first, second);
    assert!(colored.usable_correspondence().is_some());
}

#[test]
fn failed_correspondence_is_cached() {
    let (mut colored, uncolored) = pair(&["X"], &["T"], &["Y"], &["T_0"]);

    assert!(ensure_correspondence(&mut colored, &uncolored).is_err());
    assert!(colored.usable_correspondence().is_none());
    // identifiers are kept for independent generation
    assert_eq!(colored.places, strings(&["X"]));

    let (_, good) = pair(&[], &[], &["X_0"], &["T_0"]);
    assert_eq!(
        owned(ensure_correspondence(&mut colored, &good)),
        Err(MappingError::EmptyPlaces)
    );
}

#[test]
fn places_are_restricted_when_transitions_fail() {
    let (mut colored, uncolored) = pair(&["P1", "Lost"], &["T"], &["P1.0"], &["U_0"]);

    assert_eq!(
        owned(ensure_correspondence(&mut colored, &uncolored)),
        Err(MappingError::EmptyTransitions)
    );
    assert_eq!(colored.places, strings(&["P1"]));
    assert_eq!(colored.unmapped_places, strings(&["Lost"]));
    assert_eq!(colored.transitions, strings(&["T"]));
    assert!(colored.unmapped_transitions.is_empty());
}

#[test]
fn unfolded_formulas_only_use_uncolored_identifiers() {
    let (mut colored, uncolored) = pair(
        &["P1", "P2"],
        &["T1", "T2"],
        &["P1.0", "P1.1", "P2.0"],
        &["T1.0", "T2.0", "T2.1"],
    );
    let correspondence = ensure_correspondence(&mut colored, &uncolored)
        .unwrap()
        .clone();

    let config = GenerationConfig::default()
        .with_max_fireability_atom_size(2)
        .with_max_cardinality_atom_size(2);
    let catalog = OperatorCatalog::new(2);
    let generator = FormulaGenerator::new(&catalog);
    let binder = AtomBinder::for_model(&colored, &config);

    for seed in 0..30 {
        let mut rng = StdRng::seed_from_u64(seed);
        for kind in [AtomKind::Fireability, AtomKind::Cardinality] {
            let formula = generator.ctl_formula(&mut rng, 3).unwrap();
            let formula = binder.bind(formula, kind, &mut rng).unwrap();
            let unfolded = unfold(&formula, &correspondence);

            assert!(unfolded.respects_arities());
            assert!(
                unfolded
                    .places()
                    .iter()
                    .all(|p| uncolored.places.iter().any(|u| u == p))
            );
            assert!(
                unfolded
                    .transitions()
                    .iter()
                    .all(|t| uncolored.transitions.iter().any(|u| u == t))
            );
            assert!(unfolded.places().len() >= formula.places().len());
        }
    }
}

fn payload_node(operator: Operator, ids: &[&str]) -> Formula {
    Formula::new(
        operator,
        ids.iter().map(|id| Formula::leaf(Operator::literal(*id))).collect(),
    )
}

#[test]
fn unfolding_concatenates_images_in_order() {
    let correspondence = Correspondence {
        places: map_identifiers(&strings(&["P1"]), &strings(&["P1.0", "P1.1"])),
        transitions: map_identifiers(
            &strings(&["T1", "T2"]),
            &strings(&["T1.0", "T2.0", "T2.1"]),
        ),
    };

    let fireable = payload_node(Operator::is_fireable(), &["T2", "T1"]);
    assert_eq!(
        unfold(&fireable, &correspondence),
        payload_node(Operator::is_fireable(), &["T2.0", "T2.1", "T1.0"])
    );

    let cardinality = Formula::new(
        Operator::leq(),
        vec![
            payload_node(Operator::token_count(), &["P1"]),
            Formula::integer_constant(3),
        ],
    );
    assert_eq!(
        unfold(&cardinality, &correspondence),
        Formula::new(
            Operator::leq(),
            vec![
                payload_node(Operator::token_count(), &["P1.0", "P1.1"]),
                Formula::integer_constant(3),
            ],
        )
    );
}
