//! The population registry is process-wide, so this binary contains exactly one test:
//! no other test can acquire or release handles while the counts are observed.

use biodivine_lib_smt::population::{census, snapshot};
use biodivine_lib_smt::{
    Config, Model, Parameters, ResourceKind, SearchMode, Session, SolverError, Status, Term, Type,
};
use pretty_assertions::assert_eq;

fn run_workload() -> Result<(), SolverError> {
    let mut config = Config::new()?;
    config.set("mode", "push-pop")?;
    assert_eq!(census(ResourceKind::Config), 1);

    let mut session = Session::from_config(config)?;
    assert_eq!(census(ResourceKind::Config), 0);
    assert_eq!(census(ResourceKind::Session), 1);

    let p = Term::new_uninterpreted(Type::bool())?;
    session.assert_formula(p)?;
    let mut params = Parameters::new()?;
    params.defaults_for_session(&session)?;
    assert_eq!(session.check_with_params(&params)?, Status::Sat);
    let model = session.get_model()?;
    assert_eq!(census(ResourceKind::Model), 1);
    assert!(model.bool_value(p)?);

    // A failed construction acquires nothing and still releases the consumed config.
    let mut rejected = Config::new()?;
    rejected.set("solver-type", "mcsat")?;
    rejected.set("mode", "interactive")?;
    assert!(Session::from_config(rejected).is_err());
    assert!(Session::for_logic_and_mode("QF_NRA", SearchMode::Interactive).is_err());
    assert_eq!(census(ResourceKind::Config), 0);
    assert_eq!(census(ResourceKind::Session), 1);

    // Early return through `?` must release everything acquired so far.
    let _extra = Model::from_map(&[(p, Term::bool(false))])?;
    assert_eq!(census(ResourceKind::Model), 2);
    Term::int(1).ty()?.card()?;
    unreachable!("an int type has no cardinality");
}

#[test]
fn every_handle_is_released_exactly_once() {
    assert!(snapshot().is_clear());

    // Scoped release on an error path.
    let error = run_workload().unwrap_err();
    assert!(matches!(error, SolverError::Term(_)));
    assert!(snapshot().is_clear(), "leaked: {}", snapshot());

    // Closing N times has the effect of closing once.
    for closes in 1..5 {
        let mut session = Session::new().unwrap();
        let mut params = Parameters::new().unwrap();
        assert_eq!(census(ResourceKind::Session), 1);
        for _ in 0..closes {
            session.close();
            params.close();
        }
        assert_eq!(census(ResourceKind::Session), 0);
        assert_eq!(census(ResourceKind::Parameters), 0);
        drop(session);
        drop(params);
        assert!(snapshot().is_clear());
    }

    // Explicit close of a model which outlives its session.
    let mut session = Session::new().unwrap();
    let x = Term::new_uninterpreted(Type::bitvector(2).unwrap()).unwrap();
    session
        .assert_formula(x.equals(Term::bitvector(2, 1).unwrap()).unwrap())
        .unwrap();
    assert_eq!(session.check().unwrap(), Status::Sat);
    let mut model = session.get_model().unwrap();
    session.close();
    assert_eq!(model.bv_value(x).unwrap(), vec![true, false]);
    assert_eq!(snapshot().get(ResourceKind::Model), 1);
    model.close();
    assert!(snapshot().is_clear());
}
