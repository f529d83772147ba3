use crate::engine::{self, TermId, NULL_TERM};
use crate::error::{check_code, EngineFault};
use crate::{SolverError, Term, Type};
use num_rational::BigRational;
use std::fmt::{Display, Formatter};

/// **(internal)** Wrap the result of an engine term constructor.
fn make(id: TermId) -> Result<Term, SolverError> {
    if id < 0 {
        Err(SolverError::Term(EngineFault::take()))
    } else {
        Ok(Term(id))
    }
}

/// **(internal)** Engine ids of a slice of terms.
pub(crate) fn ids(terms: &[Term]) -> Vec<TermId> {
    terms.iter().map(|it| it.0).collect()
}

/// Constants and symbols.
impl Term {
    pub fn bool(value: bool) -> Term {
        Term(engine::bool_const(value))
    }

    pub fn int(value: i64) -> Term {
        Term(engine::int64(value))
    }

    /// The constant `num/den`. Integral values have type `int`, all others `real`.
    pub fn rational(num: i64, den: i64) -> Result<Term, SolverError> {
        make(engine::rational64(num, den))
    }

    pub fn big_rational(value: BigRational) -> Term {
        Term(engine::rational(value))
    }

    /// A bit-vector constant of the given width; `value` is reduced modulo `2^width`.
    pub fn bitvector(width: u32, value: u64) -> Result<Term, SolverError> {
        make(engine::bv_const_u64(width, value))
    }

    /// A bit-vector constant from its bits, least significant bit first.
    pub fn bitvector_from_bits(bits: &[bool]) -> Result<Term, SolverError> {
        make(engine::bv_from_bits(bits))
    }

    /// The `index`-th element of a scalar type.
    pub fn scalar(index: u32, ty: Type) -> Result<Term, SolverError> {
        make(engine::scalar_const(index, ty.id()))
    }

    /// A fresh uninterpreted symbol (a variable, or an uninterpreted function if `ty`
    /// is a function type).
    pub fn new_uninterpreted(ty: Type) -> Result<Term, SolverError> {
        make(engine::new_uninterpreted_term(ty.id()))
    }

    /// A fresh uninterpreted symbol bound to `name`.
    pub fn new_named(name: &str, ty: Type) -> Result<Term, SolverError> {
        let term = Term::new_uninterpreted(ty)?;
        term.set_name(name)?;
        Ok(term)
    }
}

/// Boolean connectives.
impl Term {
    pub fn not(self) -> Result<Term, SolverError> {
        make(engine::not(self.0))
    }

    /// Conjunction; the empty conjunction is `true`.
    pub fn and(args: &[Term]) -> Result<Term, SolverError> {
        make(engine::and(&ids(args)))
    }

    /// Disjunction; the empty disjunction is `false`.
    pub fn or(args: &[Term]) -> Result<Term, SolverError> {
        make(engine::or(&ids(args)))
    }

    pub fn xor(args: &[Term]) -> Result<Term, SolverError> {
        make(engine::xor(&ids(args)))
    }

    pub fn iff(self, other: Term) -> Result<Term, SolverError> {
        make(engine::iff(self.0, other.0))
    }

    pub fn implies(self, other: Term) -> Result<Term, SolverError> {
        make(engine::implies(self.0, other.0))
    }

    pub fn equals(self, other: Term) -> Result<Term, SolverError> {
        make(engine::eq(self.0, other.0))
    }

    pub fn not_equals(self, other: Term) -> Result<Term, SolverError> {
        make(engine::neq(self.0, other.0))
    }

    /// Pairwise disequality of at least two terms.
    pub fn distinct(args: &[Term]) -> Result<Term, SolverError> {
        make(engine::distinct(&ids(args)))
    }

    pub fn ite(condition: Term, then: Term, other: Term) -> Result<Term, SolverError> {
        make(engine::ite(condition.0, then.0, other.0))
    }
}

/// Arithmetic.
impl Term {
    /// Sum of arithmetic terms; the empty sum is `0`.
    pub fn sum(args: &[Term]) -> Result<Term, SolverError> {
        make(engine::sum(&ids(args)))
    }

    pub fn plus(self, other: Term) -> Result<Term, SolverError> {
        Term::sum(&[self, other])
    }

    pub fn minus(self, other: Term) -> Result<Term, SolverError> {
        make(engine::sub(self.0, other.0))
    }

    pub fn negate(self) -> Result<Term, SolverError> {
        make(engine::neg(self.0))
    }

    pub fn times(self, other: Term) -> Result<Term, SolverError> {
        make(engine::mul(self.0, other.0))
    }

    pub fn less_than(self, other: Term) -> Result<Term, SolverError> {
        make(engine::arith_lt(self.0, other.0))
    }

    pub fn less_or_equal(self, other: Term) -> Result<Term, SolverError> {
        make(engine::arith_le(self.0, other.0))
    }

    pub fn greater_than(self, other: Term) -> Result<Term, SolverError> {
        make(engine::arith_gt(self.0, other.0))
    }

    pub fn greater_or_equal(self, other: Term) -> Result<Term, SolverError> {
        make(engine::arith_ge(self.0, other.0))
    }
}

/// Bit-vectors (modular arithmetic, unsigned comparisons).
impl Term {
    pub fn bv_plus(self, other: Term) -> Result<Term, SolverError> {
        make(engine::bv_add(self.0, other.0))
    }

    pub fn bv_minus(self, other: Term) -> Result<Term, SolverError> {
        make(engine::bv_sub(self.0, other.0))
    }

    pub fn bv_times(self, other: Term) -> Result<Term, SolverError> {
        make(engine::bv_mul(self.0, other.0))
    }

    pub fn bv_less_than(self, other: Term) -> Result<Term, SolverError> {
        make(engine::bv_lt(self.0, other.0))
    }

    pub fn bv_less_or_equal(self, other: Term) -> Result<Term, SolverError> {
        make(engine::bv_le(self.0, other.0))
    }

    pub fn bv_greater_than(self, other: Term) -> Result<Term, SolverError> {
        make(engine::bv_gt(self.0, other.0))
    }

    pub fn bv_greater_or_equal(self, other: Term) -> Result<Term, SolverError> {
        make(engine::bv_ge(self.0, other.0))
    }
}

/// Tuples and functions.
impl Term {
    pub fn tuple(items: &[Term]) -> Result<Term, SolverError> {
        make(engine::tuple(&ids(items)))
    }

    /// The `index`-th component of a tuple. Components are numbered from `1`.
    pub fn select(self, index: u32) -> Result<Term, SolverError> {
        make(engine::select(index, self.0))
    }

    /// Application of a function term.
    pub fn apply(self, args: &[Term]) -> Result<Term, SolverError> {
        make(engine::application(self.0, &ids(args)))
    }
}

/// Names and metadata.
impl Term {
    /// The engine id of this term.
    pub fn id(self) -> TermId {
        self.0
    }

    pub fn ty(self) -> Result<Type, SolverError> {
        let ty = engine::term_type(self.0);
        if ty < 0 {
            Err(SolverError::Term(EngineFault::take()))
        } else {
            Ok(Type(ty))
        }
    }

    /// Bind `name` to this term. The first name of a term is used when printing it.
    pub fn set_name(self, name: &str) -> Result<(), SolverError> {
        check_code(engine::set_term_name(self.0, name), SolverError::Term)
    }

    /// The printing name of this term, if it has one.
    pub fn name(self) -> Option<String> {
        engine::get_term_name(self.0)
    }

    /// The term bound to `name`.
    pub fn by_name(name: &str) -> Option<Term> {
        match engine::get_term_by_name(name) {
            NULL_TERM => None,
            id => Some(Term(id)),
        }
    }

    /// Remove the binding of `name`. Unknown names are ignored.
    pub fn remove_name(name: &str) {
        engine::remove_term_name(name)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match engine::term_to_string(self.0) {
            Some(text) => write!(f, "{}", text),
            None => {
                engine::reset_error();
                write!(f, "<invalid term {}>", self.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ErrorCode, SolverError, Term, Type};

    #[test]
    fn formulas_are_well_typed() {
        let x = Term::new_uninterpreted(Type::int()).unwrap();
        let y = Term::new_uninterpreted(Type::real()).unwrap();
        let atom = x.plus(y).unwrap().greater_than(Term::int(2)).unwrap();
        assert_eq!(atom.ty().unwrap(), Type::bool());
        assert_eq!(x.plus(y).unwrap().ty().unwrap(), Type::real());

        let p = Term::new_uninterpreted(Type::bool()).unwrap();
        let error = Term::and(&[p, x]).unwrap_err();
        assert!(matches!(error, SolverError::Term(_)));
        assert_eq!(Term::and(&[]).unwrap(), Term::bool(true));
        assert_eq!(Term::and(&[p]).unwrap(), p);
    }

    #[test]
    fn constants() {
        assert_eq!(Term::rational(4, 2).unwrap(), Term::int(2));
        assert_eq!(Term::rational(1, 2).unwrap().ty().unwrap(), Type::real());
        let error = Term::rational(1, 0).unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::DivisionByZero));
        let five = Term::bitvector(4, 5).unwrap();
        assert_eq!(
            five,
            Term::bitvector_from_bits(&[true, false, true, false]).unwrap()
        );
        assert_eq!(five.to_string(), "#x5");
        assert_eq!(Term::bitvector(3, 5).unwrap().to_string(), "#b101");
    }

    #[test]
    fn tuples_are_selected_from_one() {
        let t = Term::tuple(&[Term::bool(true), Term::int(3)]).unwrap();
        assert_eq!(t.select(2).unwrap().ty().unwrap(), Type::int());
        assert!(t.select(0).is_err());
        assert!(t.select(3).is_err());
    }

    #[test]
    fn names_are_bound_and_removed() {
        let v = Term::new_named("term_names_test_v", Type::bool()).unwrap();
        assert_eq!(Term::by_name("term_names_test_v"), Some(v));
        assert_eq!(v.name(), Some("term_names_test_v".to_string()));
        assert_eq!(v.to_string(), "term_names_test_v");
        Term::remove_name("term_names_test_v");
        assert_eq!(Term::by_name("term_names_test_v"), None);
        assert_eq!(v.name(), None);
    }

    #[test]
    fn applications_check_their_arguments() {
        let f = Type::function(&[Type::int()], Type::bool()).unwrap();
        let f = Term::new_uninterpreted(f).unwrap();
        assert_eq!(f.apply(&[Term::int(1)]).unwrap().ty().unwrap(), Type::bool());
        assert!(f.apply(&[Term::bool(true)]).is_err());
        assert!(f.apply(&[]).is_err());
    }
}
