use biodivine_lib_smt::{Session, Status, Term, Type, YValTag};
use num_bigint::BigInt;
use num_rational::BigRational;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Thirteen pigeons in twelve holes as a propositional formula. Unsatisfiable, but
/// resolution-based search needs exponentially many steps to refute it.
fn hard_session() -> Session {
    let (pigeons, holes) = (13, 12);
    let mut session = Session::new().unwrap();
    let mut at = Vec::new();
    for _ in 0..pigeons {
        let row: Vec<Term> = (0..holes)
            .map(|_| Term::new_uninterpreted(Type::bool()).unwrap())
            .collect();
        session.assert_formula(Term::or(&row).unwrap()).unwrap();
        at.push(row);
    }
    for hole in 0..holes {
        for i in 0..pigeons {
            for j in (i + 1)..pigeons {
                let clash = Term::or(&[at[i][hole].not().unwrap(), at[j][hole].not().unwrap()])
                    .unwrap();
                session.assert_formula(clash).unwrap();
            }
        }
    }
    session
}

#[test]
fn deadline_interrupts_a_long_check() {
    let mut session = hard_session();
    let started = Instant::now();
    let status = session.check_with_timeout(Duration::from_secs(1)).unwrap();
    let elapsed = started.elapsed();
    assert_eq!(status, Status::Interrupted);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    // The session is not poisoned: scopes can still be reset.
    session.reset().unwrap();
    assert_eq!(session.check().unwrap(), Status::Sat);
}

#[test]
fn short_deadlines_are_rounded_up() {
    let mut session = hard_session();
    let started = Instant::now();
    let status = session.check_with_timeout(Duration::from_millis(1)).unwrap();
    assert_eq!(status, Status::Interrupted);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[test]
fn fast_checks_are_not_interrupted_later() {
    let mut session = Session::new().unwrap();
    let p = Term::new_uninterpreted(Type::bool()).unwrap();
    session.assert_formula(p).unwrap();
    let started = Instant::now();
    assert_eq!(
        session.check_with_timeout(Duration::from_secs(30)).unwrap(),
        Status::Sat
    );
    // The timer is cancelled, not waited for.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn interrupter_stops_a_check_from_another_thread() {
    let mut session = hard_session();
    let interrupter = session.interrupter().unwrap();
    let done = Arc::new(AtomicBool::new(false));
    let stopper = {
        let done = done.clone();
        // A stop request is ignored while no search runs, so keep asking.
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(200));
                interrupter.stop();
            }
        })
    };
    assert_eq!(session.check().unwrap(), Status::Interrupted);
    done.store(true, Ordering::SeqCst);
    stopper.join().unwrap();
}

#[test]
fn tuple_values_are_expanded() {
    let mut session = Session::new().unwrap();
    let ty = Type::tuple(&[Type::bool(), Type::real(), Type::int()]).unwrap();
    let t = Term::new_uninterpreted(ty).unwrap();
    session
        .assert_formulas(&[
            t.select(1).unwrap().not().unwrap(),
            t.select(2).unwrap().equals(Term::int(1)).unwrap(),
            t.select(3).unwrap().equals(Term::int(0)).unwrap(),
        ])
        .unwrap();
    assert_eq!(session.check().unwrap(), Status::Sat);
    let model = session.get_model().unwrap();

    let value = model.get_value(t).unwrap();
    assert_eq!(value.tag(), YValTag::Tuple);
    assert_eq!(model.tuple_arity(&value).unwrap(), 3);
    let items = model.expand_tuple(&value).unwrap();
    let tags: Vec<YValTag> = items.iter().map(|it| it.tag()).collect();
    assert_eq!(
        tags,
        vec![YValTag::Bool, YValTag::Rational, YValTag::Rational]
    );
    assert!(!model.bool_of(&items[0]).unwrap());
    assert_eq!(
        model.rational_of(&items[1]).unwrap(),
        BigRational::from_integer(BigInt::from(1))
    );
    assert_eq!(model.integer_of(&items[2]).unwrap(), BigInt::from(0));
}

#[test]
fn function_values_are_expanded() {
    let mut session = Session::new().unwrap();
    let ty = Type::function(&[Type::int()], Type::int()).unwrap();
    let f = Term::new_uninterpreted(ty).unwrap();
    let at = |x: i64| f.apply(&[Term::int(x)]).unwrap();
    session
        .assert_formulas(&[
            at(1).equals(Term::int(10)).unwrap(),
            at(2).equals(Term::int(20)).unwrap(),
            at(3).equals(Term::int(30)).unwrap(),
            at(4).equals(Term::int(30)).unwrap(),
        ])
        .unwrap();
    assert_eq!(session.check().unwrap(), Status::Sat);
    let model = session.get_model().unwrap();

    let value = model.get_value(f).unwrap();
    assert_eq!(value.tag(), YValTag::Function);
    assert_eq!(model.function_arity(&value).unwrap(), 1);
    let vector = model.expand_function(&value).unwrap();
    let default = model.integer_of(&vector.default).unwrap();
    assert!(vector.children.len() <= 4);

    let mut entries = Vec::new();
    for child in &vector.children {
        assert_eq!(child.tag(), YValTag::Mapping);
        assert_eq!(model.mapping_arity(child).unwrap(), 1);
        let mapping = model.expand_mapping(child).unwrap();
        let argument = model.integer_of(&mapping.arguments[0]).unwrap();
        let result = model.integer_of(&mapping.result).unwrap();
        // Entries which agree with the default are left out.
        assert_ne!(result, default);
        entries.push((argument, result));
    }
    let lookup = |x: i64| {
        entries
            .iter()
            .find(|(argument, _)| *argument == BigInt::from(x))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| default.clone())
    };
    let values: Vec<BigInt> = (1..=4).map(lookup).collect();
    let expected: Vec<BigInt> = [10, 20, 30, 30].into_iter().map(BigInt::from).collect();
    assert_eq!(values, expected);
    assert_eq!(model.integer_value(at(1)).unwrap(), 10);
    assert_eq!(BigInt::from(model.integer_value(at(7)).unwrap()), default);
}

#[test]
fn support_skips_the_branch_not_taken() {
    let mut session = Session::new().unwrap();
    let x = Term::new_named("support_x", Type::int()).unwrap();
    let y = Term::new_named("support_y", Type::int()).unwrap();
    let z = Term::new_named("support_z", Type::int()).unwrap();
    let positive = x.greater_than(Term::int(0)).unwrap();
    session
        .assert_formulas(&[
            positive,
            y.greater_or_equal(Term::int(0)).unwrap(),
            z.greater_or_equal(Term::int(0)).unwrap(),
        ])
        .unwrap();
    assert_eq!(session.check().unwrap(), Status::Sat);
    let model = session.get_model().unwrap();

    let t0 = Term::ite(positive, x.plus(z).unwrap(), y).unwrap();
    let mut support = model.support(t0).unwrap();
    support.sort();
    let mut expected = vec![x, z];
    expected.sort();
    assert_eq!(support, expected);

    // The model is printed with the names of the symbols.
    let printed = model.to_string();
    assert!(printed.contains("(= support_x "));
    assert!(printed.contains("(= support_y "));
}

#[test]
fn nodes_and_shortcuts_agree() {
    let mut session = Session::new().unwrap();
    let colour = Type::new_scalar(4).unwrap();
    let p = Term::new_uninterpreted(Type::bool()).unwrap();
    let r = Term::new_uninterpreted(Type::real()).unwrap();
    let b = Term::new_uninterpreted(Type::bitvector(5).unwrap()).unwrap();
    let c = Term::new_uninterpreted(colour).unwrap();
    session
        .assert_formulas(&[
            p,
            r.equals(Term::rational(-3, 2).unwrap()).unwrap(),
            b.equals(Term::bitvector(5, 19).unwrap()).unwrap(),
            c.not_equals(Term::scalar(0, colour).unwrap()).unwrap(),
        ])
        .unwrap();
    assert_eq!(session.check().unwrap(), Status::Sat);
    let model = session.get_model().unwrap();

    let node = model.get_value(p).unwrap();
    assert_eq!(model.bool_of(&node).unwrap(), model.bool_value(p).unwrap());
    let node = model.get_value(r).unwrap();
    assert_eq!(
        model.rational_of(&node).unwrap(),
        model.big_rational_value(r).unwrap()
    );
    assert!(!model.is_integer(&node).unwrap());
    assert_eq!(model.double_value(r).unwrap(), -1.5);
    let node = model.get_value(b).unwrap();
    assert_eq!(model.bv_of(&node).unwrap(), model.bv_value(b).unwrap());
    assert_eq!(model.bit_size(&node).unwrap(), 5);
    let node = model.get_value(c).unwrap();
    let scalar = model.scalar_of(&node).unwrap();
    assert_eq!(scalar, model.scalar_value(c).unwrap());
    assert_ne!(scalar.index, 0);
    assert_eq!(scalar.ty, colour);
}
