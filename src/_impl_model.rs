use crate::_impl_term::ids;
use crate::engine::{self, RawHandle, RawNode, TypeId};
use crate::error::{check_code, EngineFault};
use crate::{
    ErrorCode, Handle, MappingValue, Model, ResourceKind, ScalarValue, SolverError, Term, Type,
    VectorValue, YVal,
};
use num_bigint::BigInt;
use num_rational::{BigRational, Rational64};
use num_traits::{ToPrimitive, Zero};
use std::fmt::{Display, Formatter};

/// **(internal)** A `ValueError` raised by this layer rather than by the engine.
fn value_error(code: ErrorCode, message: String) -> SolverError {
    SolverError::Value(EngineFault::new(code, message))
}

impl Model {
    /// A model which assigns each symbol the corresponding constant.
    pub fn from_map(assignment: &[(Term, Term)]) -> Result<Model, SolverError> {
        let symbols: Vec<Term> = assignment.iter().map(|(symbol, _)| *symbol).collect();
        let constants: Vec<Term> = assignment.iter().map(|(_, value)| *value).collect();
        let raw = engine::model_from_map(&ids(&symbols), &ids(&constants));
        match Handle::acquire(ResourceKind::Model, raw) {
            Some(handle) => Ok(Model { handle }),
            None => Err(SolverError::Model(EngineFault::take())),
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Release the model. Idempotent. Nodes of a closed model cannot be explored anymore.
    pub fn close(&mut self) {
        self.handle.close();
    }

    /// **(internal)** The raw handle of this model and the engine reference of `value`,
    /// which must be a node of this model.
    fn resolve(&self, value: &YVal) -> Result<(RawHandle, RawNode), SolverError> {
        let raw = self.handle.raw()?;
        if value.model() != raw {
            return Err(value_error(
                ErrorCode::InvalidValueNode,
                format!("{value} is a node of a different model"),
            ));
        }
        Ok((raw, value.node()))
    }

    /// The value of `term` as a node of the value DAG of this model.
    pub fn get_value(&self, term: Term) -> Result<YVal, SolverError> {
        let raw = self.handle.raw()?;
        let mut node = RawNode::default();
        check_code(engine::get_value(raw, term.id(), &mut node), SolverError::Value)?;
        Ok(YVal::new(raw, node))
    }

    /// The constant term denoting the value of `term` (not available for functions).
    pub fn value_as_term(&self, term: Term) -> Result<Term, SolverError> {
        let raw = self.handle.raw()?;
        let id = engine::value_as_term(raw, term.id());
        if id < 0 {
            Err(SolverError::Value(EngineFault::take()))
        } else {
            Ok(Term(id))
        }
    }
}

/// Direct value shortcuts.
impl Model {
    pub fn bool_value(&self, term: Term) -> Result<bool, SolverError> {
        let raw = self.handle.raw()?;
        let mut value = false;
        check_code(
            engine::get_bool_value(raw, term.id(), &mut value),
            SolverError::Value,
        )?;
        Ok(value)
    }

    pub fn big_rational_value(&self, term: Term) -> Result<BigRational, SolverError> {
        let raw = self.handle.raw()?;
        let mut value = BigRational::zero();
        check_code(
            engine::get_rational_value(raw, term.id(), &mut value),
            SolverError::Value,
        )?;
        Ok(value)
    }

    /// The value of an arithmetic term, which must be an integer.
    pub fn big_integer_value(&self, term: Term) -> Result<BigInt, SolverError> {
        let value = self.big_rational_value(term)?;
        if value.is_integer() {
            Ok(value.to_integer())
        } else {
            Err(value_error(
                ErrorCode::EvalConversionFailed,
                format!("the value {value} of {term} is not an integer"),
            ))
        }
    }

    /// The value of an arithmetic term, which must be an integer fitting into `i64`.
    pub fn integer_value(&self, term: Term) -> Result<i64, SolverError> {
        let value = self.big_integer_value(term)?;
        value.to_i64().ok_or_else(|| {
            value_error(
                ErrorCode::EvalOverflow,
                format!("the value {value} of {term} does not fit into 64 bits"),
            )
        })
    }

    /// The value of an arithmetic term as a fraction of two `i64` numbers.
    pub fn rational_value(&self, term: Term) -> Result<Rational64, SolverError> {
        let value = self.big_rational_value(term)?;
        match (value.numer().to_i64(), value.denom().to_i64()) {
            (Some(numer), Some(denom)) => Ok(Rational64::new(numer, denom)),
            _ => Err(value_error(
                ErrorCode::EvalOverflow,
                format!("the value {value} of {term} does not fit into 64 bits"),
            )),
        }
    }

    /// The value of an arithmetic term, rounded to the nearest `f64`.
    pub fn double_value(&self, term: Term) -> Result<f64, SolverError> {
        let value = self.big_rational_value(term)?;
        value.to_f64().ok_or_else(|| {
            value_error(
                ErrorCode::EvalOverflow,
                format!("the value {value} of {term} is not representable as f64"),
            )
        })
    }

    /// The bits of a bit-vector value, least significant bit first.
    pub fn bv_value(&self, term: Term) -> Result<Vec<bool>, SolverError> {
        let raw = self.handle.raw()?;
        let mut bits = Vec::new();
        check_code(
            engine::get_bv_value(raw, term.id(), &mut bits),
            SolverError::Value,
        )?;
        Ok(bits)
    }

    /// The index of a scalar value, together with the scalar type of `term`.
    pub fn scalar_value(&self, term: Term) -> Result<ScalarValue, SolverError> {
        let raw = self.handle.raw()?;
        let mut index = 0;
        check_code(
            engine::get_scalar_value(raw, term.id(), &mut index),
            SolverError::Value,
        )?;
        let ty = term.ty().map_err(|error| match error {
            SolverError::Term(fault) => SolverError::Value(fault),
            other => other,
        })?;
        Ok(ScalarValue { index, ty })
    }
}

/// Exploration of the value DAG.
impl Model {
    /// `true` if the node is an integral rational.
    pub fn is_integer(&self, value: &YVal) -> Result<bool, SolverError> {
        let (raw, node) = self.resolve(value)?;
        flag(engine::val_is_int(raw, node))
    }

    /// `true` if the node is an integer which fits into `i64`.
    pub fn is_long(&self, value: &YVal) -> Result<bool, SolverError> {
        let (raw, node) = self.resolve(value)?;
        flag(engine::val_is_long(raw, node))
    }

    /// Width of a bit-vector node, `0` for other nodes.
    pub fn bit_size(&self, value: &YVal) -> Result<u32, SolverError> {
        let (raw, node) = self.resolve(value)?;
        size(engine::val_bitsize(raw, node))
    }

    pub fn bool_of(&self, value: &YVal) -> Result<bool, SolverError> {
        let (raw, node) = self.resolve(value)?;
        let mut result = false;
        check_code(engine::val_get_bool(raw, node, &mut result), SolverError::Value)?;
        Ok(result)
    }

    pub fn rational_of(&self, value: &YVal) -> Result<BigRational, SolverError> {
        let (raw, node) = self.resolve(value)?;
        let mut result = BigRational::zero();
        check_code(
            engine::val_get_rational(raw, node, &mut result),
            SolverError::Value,
        )?;
        Ok(result)
    }

    pub fn integer_of(&self, value: &YVal) -> Result<BigInt, SolverError> {
        let result = self.rational_of(value)?;
        if result.is_integer() {
            Ok(result.to_integer())
        } else {
            Err(value_error(
                ErrorCode::EvalConversionFailed,
                format!("the value {result} of {value} is not an integer"),
            ))
        }
    }

    /// Bits of a bit-vector node, least significant bit first.
    pub fn bv_of(&self, value: &YVal) -> Result<Vec<bool>, SolverError> {
        let (raw, node) = self.resolve(value)?;
        let mut bits = Vec::new();
        check_code(engine::val_get_bv(raw, node, &mut bits), SolverError::Value)?;
        Ok(bits)
    }

    pub fn scalar_of(&self, value: &YVal) -> Result<ScalarValue, SolverError> {
        let (raw, node) = self.resolve(value)?;
        let mut index = 0;
        let mut ty: TypeId = 0;
        check_code(
            engine::val_get_scalar(raw, node, &mut index, &mut ty),
            SolverError::Value,
        )?;
        Ok(ScalarValue {
            index,
            ty: Type(ty),
        })
    }

    /// Number of components of a tuple node, `0` for other nodes.
    ///
    /// A node of another tag is not an error: the result is `0` and the error record
    /// is left untouched.
    pub fn tuple_arity(&self, value: &YVal) -> Result<usize, SolverError> {
        let (raw, node) = self.resolve(value)?;
        size(engine::val_tuple_arity(raw, node)).map(|it| it as usize)
    }

    /// Components of a tuple node, in declaration order.
    pub fn expand_tuple(&self, value: &YVal) -> Result<Vec<YVal>, SolverError> {
        let (raw, node) = self.resolve(value)?;
        let mut items = Vec::new();
        check_code(
            engine::val_expand_tuple(raw, node, &mut items),
            SolverError::Value,
        )?;
        Ok(items.into_iter().map(|it| YVal::new(raw, it)).collect())
    }

    /// Number of arguments of a mapping node, `0` for other nodes.
    ///
    /// A node of another tag is not an error: the result is `0` and the error record
    /// is left untouched.
    pub fn mapping_arity(&self, value: &YVal) -> Result<usize, SolverError> {
        let (raw, node) = self.resolve(value)?;
        size(engine::val_mapping_arity(raw, node)).map(|it| it as usize)
    }

    pub fn expand_mapping(&self, value: &YVal) -> Result<MappingValue, SolverError> {
        let (raw, node) = self.resolve(value)?;
        let mut arguments = Vec::new();
        let mut result = RawNode::default();
        check_code(
            engine::val_expand_mapping(raw, node, &mut arguments, &mut result),
            SolverError::Value,
        )?;
        Ok(MappingValue {
            arguments: arguments.into_iter().map(|it| YVal::new(raw, it)).collect(),
            result: YVal::new(raw, result),
        })
    }

    /// Arity of a function node, `0` for other nodes.
    ///
    /// A node of another tag is not an error: the result is `0` and the error record
    /// is left untouched.
    pub fn function_arity(&self, value: &YVal) -> Result<usize, SolverError> {
        let (raw, node) = self.resolve(value)?;
        size(engine::val_function_arity(raw, node)).map(|it| it as usize)
    }

    /// The explicit mappings and the default value of a function node. The mappings
    /// are not expanded, see [`Model::expand_mapping`].
    pub fn expand_function(&self, value: &YVal) -> Result<VectorValue, SolverError> {
        let (raw, node) = self.resolve(value)?;
        let mut default = RawNode::default();
        let mut mappings = Vec::new();
        check_code(
            engine::val_expand_function(raw, node, &mut default, &mut mappings),
            SolverError::Value,
        )?;
        Ok(VectorValue {
            children: mappings.into_iter().map(|it| YVal::new(raw, it)).collect(),
            default: YVal::new(raw, default),
        })
    }
}

/// Explanations.
impl Model {
    /// Literals which are true in this model and together imply `formula`.
    pub fn implicant(&self, formula: Term) -> Result<Vec<Term>, SolverError> {
        self.implicant_for(&[formula])
    }

    /// Literals which are true in this model and together imply all `formulas`.
    /// Fails if one of the formulas is false in this model.
    pub fn implicant_for(&self, formulas: &[Term]) -> Result<Vec<Term>, SolverError> {
        let raw = self.handle.raw()?;
        let mut literals = Vec::new();
        check_code(
            engine::get_implicant(raw, &ids(formulas), &mut literals),
            SolverError::Model,
        )?;
        Ok(literals.into_iter().map(Term).collect())
    }

    /// Uninterpreted symbols whose values determine the value of `term` in this model.
    pub fn support(&self, term: Term) -> Result<Vec<Term>, SolverError> {
        self.support_for(&[term])
    }

    /// Uninterpreted symbols whose values determine the values of all `terms`.
    pub fn support_for(&self, terms: &[Term]) -> Result<Vec<Term>, SolverError> {
        let raw = self.handle.raw()?;
        let mut symbols = Vec::new();
        check_code(
            engine::get_support(raw, &ids(terms), &mut symbols),
            SolverError::Model,
        )?;
        Ok(symbols.into_iter().map(Term).collect())
    }
}

fn flag(code: i32) -> Result<bool, SolverError> {
    check_code(code, SolverError::Value)?;
    Ok(code == 1)
}

fn size(code: i32) -> Result<u32, SolverError> {
    check_code(code, SolverError::Value)?;
    Ok(code as u32)
}

impl Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = self
            .handle
            .raw()
            .ok()
            .and_then(engine::model_to_string);
        match text {
            Some(text) => write!(f, "{}", text),
            None => {
                engine::reset_error();
                write!(f, "<closed model>")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ErrorCode, Model, ResourceKind, Session, SolverError, Status, Term, Type, YValTag};
    use num_bigint::BigInt;
    use num_rational::Rational64;
    use pretty_assertions::assert_eq;

    #[test]
    fn shortcuts_agree_with_nodes() {
        let x = Term::new_uninterpreted(Type::int()).unwrap();
        let half = Term::new_uninterpreted(Type::real()).unwrap();
        let p = Term::new_uninterpreted(Type::bool()).unwrap();
        let bv = Term::new_uninterpreted(Type::bitvector(3).unwrap()).unwrap();
        let colour = Type::new_scalar(3).unwrap();
        let c = Term::new_uninterpreted(colour).unwrap();
        let model = Model::from_map(&[
            (x, Term::int(-7)),
            (half, Term::rational(1, 2).unwrap()),
            (p, Term::bool(true)),
            (bv, Term::bitvector(3, 6).unwrap()),
            (c, Term::scalar(2, colour).unwrap()),
        ])
        .unwrap();

        let node = model.get_value(x).unwrap();
        assert_eq!(node.tag(), YValTag::Rational);
        assert!(model.is_integer(&node).unwrap());
        assert!(model.is_long(&node).unwrap());
        assert_eq!(model.integer_of(&node).unwrap(), BigInt::from(-7));
        assert_eq!(model.integer_value(x).unwrap(), -7);
        assert_eq!(model.double_value(x).unwrap(), -7.0);

        assert_eq!(model.rational_value(half).unwrap(), Rational64::new(1, 2));
        assert_eq!(model.double_value(half).unwrap(), 0.5);
        let error = model.integer_value(half).unwrap_err();
        assert!(matches!(error, SolverError::Value(_)));
        assert_eq!(error.code(), Some(ErrorCode::EvalConversionFailed));

        let node = model.get_value(p).unwrap();
        assert_eq!(model.bool_of(&node).unwrap(), model.bool_value(p).unwrap());

        let node = model.get_value(bv).unwrap();
        assert_eq!(node.tag(), YValTag::BitVector);
        assert_eq!(model.bit_size(&node).unwrap(), 3);
        assert_eq!(model.bv_of(&node).unwrap(), vec![false, true, true]);
        assert_eq!(model.bv_value(bv).unwrap(), vec![false, true, true]);

        let node = model.get_value(c).unwrap();
        let scalar = model.scalar_of(&node).unwrap();
        assert_eq!(scalar, model.scalar_value(c).unwrap());
        assert_eq!(scalar.index, 2);
        assert_eq!(scalar.ty, colour);
    }

    #[test]
    fn mismatched_nodes_are_value_errors() {
        let p = Term::new_uninterpreted(Type::bool()).unwrap();
        let model = Model::from_map(&[(p, Term::bool(false))]).unwrap();
        let node = model.get_value(p).unwrap();
        assert_eq!(model.tuple_arity(&node).unwrap(), 0);
        assert_eq!(model.mapping_arity(&node).unwrap(), 0);
        assert_eq!(model.function_arity(&node).unwrap(), 0);
        let error = model.expand_tuple(&node).unwrap_err();
        assert!(matches!(error, SolverError::Value(_)));
        assert!(model.rational_of(&node).is_err());
        assert!(model.bool_value(Term::new_uninterpreted(Type::int()).unwrap()).is_err());

        let other = Model::from_map(&[(p, Term::bool(true))]).unwrap();
        let error = other.bool_of(&node).unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::InvalidValueNode));
    }

    #[test]
    fn closed_models_refuse_queries() {
        let p = Term::new_uninterpreted(Type::bool()).unwrap();
        let mut model = Model::from_map(&[(p, Term::bool(true))]).unwrap();
        let node = model.get_value(p).unwrap();
        model.close();
        model.close();
        assert_eq!(
            model.bool_of(&node),
            Err(SolverError::ResourceClosed(ResourceKind::Model))
        );
        assert_eq!(model.to_string(), "<closed model>");
    }

    #[test]
    fn values_convert_back_to_terms() {
        let mut session = Session::new().unwrap();
        let x = Term::new_uninterpreted(Type::bitvector(4).unwrap()).unwrap();
        let nine = Term::bitvector(4, 9).unwrap();
        session.assert_formula(x.equals(nine).unwrap()).unwrap();
        assert_eq!(session.check().unwrap(), Status::Sat);
        let model = session.get_model().unwrap();
        assert_eq!(model.value_as_term(x).unwrap(), nine);
        // The model outlives the session.
        session.close();
        assert_eq!(model.bv_value(x).unwrap(), vec![true, false, false, true]);
    }

    #[test]
    fn implicants_explain_formulas() {
        let p = Term::new_uninterpreted(Type::bool()).unwrap();
        let q = Term::new_uninterpreted(Type::bool()).unwrap();
        let formula = Term::or(&[p, q]).unwrap();
        let model = Model::from_map(&[(p, Term::bool(false)), (q, Term::bool(true))]).unwrap();
        assert_eq!(model.implicant(formula).unwrap(), vec![q]);
        let error = model.implicant(p).unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::EvalFormulaFalse));
    }
}
