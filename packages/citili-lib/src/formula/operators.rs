use crate::formula::{
    ALL_PATHS, AND, EXISTS_PATH, FINALLY, GLOBALLY, NEXT, NOT, OR, Operator, UNTIL,
};

/// The operator tables the generator draws from.
///
/// `and` and `or` accept between two and `max_arity` operands, all other
/// operators have a fixed arity.
#[derive(Debug, Clone)]
pub struct OperatorCatalog {
    max_arity: usize,
    boolean: Vec<Operator>,
    path: Vec<Operator>,
    state: Vec<Operator>,
}

impl OperatorCatalog {
    pub fn new(max_arity: usize) -> Self {
        let max_arity = max_arity.max(2);

        let boolean = vec![
            Operator::atom(),
            Operator::new(ALL_PATHS, 1, 1, false),
            Operator::new(EXISTS_PATH, 1, 1, false),
            Operator::new(NOT, 1, 1, true),
            Operator::new(AND, 2, max_arity, true),
            Operator::new(OR, 2, max_arity, true),
        ];

        let path = vec![
            Operator::new(GLOBALLY, 1, 1, false),
            Operator::new(FINALLY, 1, 1, false),
            Operator::new(NEXT, 1, 1, false),
            Operator::new(UNTIL, 2, 2, false),
        ];

        let state = vec![
            Operator::atom(),
            Operator::new(NOT, 1, 1, true),
            Operator::new(AND, 2, max_arity, true),
            Operator::new(OR, 2, max_arity, true),
        ];

        OperatorCatalog {
            max_arity,
            boolean,
            path,
            state,
        }
    }

    pub fn max_arity(&self) -> usize {
        self.max_arity
    }

    /// Operators producing a boolean (state) formula, including path
    /// quantifiers.
    pub fn boolean_operators(&self) -> &[Operator] {
        &self.boolean
    }

    /// Temporal operators producing a path formula.
    pub fn path_operators(&self) -> &[Operator] {
        &self.path
    }

    /// Atoms and boolean connectives only, for reachability formulas.
    pub fn state_operators(&self) -> &[Operator] {
        &self.state
    }

    pub fn find(&self, name: &str) -> Option<&Operator> {
        self.boolean
            .iter()
            .chain(self.path.iter())
            .find(|op| op.name == name)
    }
}

#[test]
fn test_catalog_arities() {
    let catalog = OperatorCatalog::new(4);

    assert_eq!(catalog.find(AND).map(|op| op.max_arity), Some(4));
    assert_eq!(catalog.find(UNTIL).map(|op| op.min_arity), Some(2));
    assert!(catalog.boolean_operators()[0].name == crate::formula::ATOM);
    assert!(catalog.path_operators().iter().all(|op| op.is_path_operator()));
    assert!(
        catalog
            .state_operators()
            .iter()
            .all(|op| !op.is_path_operator() && !op.is_path_quantifier())
    );

    // a connective needs room for at least two operands
    assert_eq!(OperatorCatalog::new(1).max_arity(), 2);
}
