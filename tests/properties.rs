use biodivine_lib_smt::{Config, ErrorCode, Session, SolverError, Status, Term, Type};
use proptest::prelude::*;

/// Every option accepted by a configuration, each with all of its valid values.
const OPTIONS: &[(&str, &[&str])] = &[
    (
        "mode",
        &["one-shot", "multi-check", "push-pop", "interactive"],
    ),
    ("solver-type", &["dpllt", "mcsat"]),
    ("uf-solver", &["default", "none"]),
    ("bv-solver", &["default", "none"]),
    ("array-solver", &["default", "none"]),
    ("arith-solver", &["default", "none", "simplex", "ifw", "rfw"]),
    (
        "arith-fragment",
        &["IDL", "RDL", "LRA", "LIA", "LIRA", "NRA", "NIA", "NIRA"],
    ),
];

fn valid_pair() -> impl Strategy<Value = (&'static str, &'static str)> {
    (0..OPTIONS.len()).prop_flat_map(|option| {
        let (name, values) = OPTIONS[option];
        (Just(name), proptest::sample::select(values.to_vec()))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pop_fails_exactly_at_depth_zero(ops in proptest::collection::vec(any::<bool>(), 0..24)) {
        let mut session = Session::new().unwrap();
        let mut depth = 0usize;
        for push in ops {
            if push {
                session.push().unwrap();
                depth += 1;
            } else {
                let result = session.pop();
                if depth == 0 {
                    let error = result.unwrap_err();
                    prop_assert!(matches!(error, SolverError::Scope(_)));
                } else {
                    prop_assert!(result.is_ok());
                    depth -= 1;
                }
            }
        }
        // A failed pop leaves the session usable.
        let p = Term::new_uninterpreted(Type::bool()).unwrap();
        session.assert_formula(p).unwrap();
        prop_assert_eq!(session.check().unwrap(), Status::Sat);
        for _ in 0..depth {
            session.pop().unwrap();
        }
        prop_assert!(session.pop().is_err());
    }

    #[test]
    fn repeated_close_behaves_like_one_close(closes in 1usize..6) {
        let mut session = Session::new().unwrap();
        let mut config = Config::new().unwrap();
        for _ in 0..closes {
            session.close();
            config.close();
        }
        prop_assert!(session.handle().is_closed());
        prop_assert!(matches!(session.push(), Err(SolverError::ResourceClosed(_))));
        prop_assert!(matches!(session.check(), Err(SolverError::ResourceClosed(_))));
        prop_assert!(matches!(
            config.set("mode", "push-pop"),
            Err(SolverError::ResourceClosed(_))
        ));
    }

    #[test]
    fn single_valid_setting_builds_a_session((name, value) in valid_pair()) {
        let mut config = Config::new().unwrap();
        config.set(name, value).unwrap();
        let session = Session::from_config(config);
        prop_assert!(session.is_ok(), "{} = {}: {:?}", name, value, session.err());
    }

    #[test]
    fn rejected_settings_keep_the_config_usable(
        name in "[a-z]{1,12}",
        value in "[a-z]{1,12}",
    ) {
        let mut config = Config::new().unwrap();
        let known = OPTIONS.iter().find(|(option, _)| *option == name.as_str());
        let valid = known.map(|(_, values)| values.contains(&value.as_str()));
        match valid {
            Some(true) => prop_assert!(config.set(&name, &value).is_ok()),
            Some(false) => {
                let error = config.set(&name, &value).unwrap_err();
                prop_assert_eq!(error.code(), Some(ErrorCode::InvalidConfigValue));
            }
            None => {
                let error = config.set(&name, &value).unwrap_err();
                prop_assert_eq!(error.code(), Some(ErrorCode::InvalidConfigName));
            }
        }
        config.set("mode", "one-shot").unwrap();
        prop_assert!(Session::from_config(config).is_ok());
    }
}
