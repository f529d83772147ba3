use crate::engine::{self, TypeId};
use crate::error::{check_code, EngineFault};
use crate::{SolverError, Type};
use std::fmt::{Display, Formatter};

/// **(internal)** Wrap the result of an engine type constructor.
fn make(id: TypeId) -> Result<Type, SolverError> {
    if id < 0 {
        Err(SolverError::Term(EngineFault::take()))
    } else {
        Ok(Type(id))
    }
}

impl Type {
    pub fn bool() -> Type {
        Type(engine::bool_type())
    }

    pub fn int() -> Type {
        Type(engine::int_type())
    }

    pub fn real() -> Type {
        Type(engine::real_type())
    }

    /// Bit-vectors of the given (positive) width.
    pub fn bitvector(width: u32) -> Result<Type, SolverError> {
        make(engine::bv_type(width))
    }

    /// A fresh scalar type with `card` elements. Every call creates a new, distinct type.
    pub fn new_scalar(card: u32) -> Result<Type, SolverError> {
        make(engine::new_scalar_type(card))
    }

    pub fn tuple(items: &[Type]) -> Result<Type, SolverError> {
        let ids: Vec<TypeId> = items.iter().map(|it| it.0).collect();
        make(engine::tuple_type(&ids))
    }

    pub fn function(domain: &[Type], range: Type) -> Result<Type, SolverError> {
        let ids: Vec<TypeId> = domain.iter().map(|it| it.0).collect();
        make(engine::function_type(&ids, range.0))
    }

    /// The engine id of this type.
    pub fn id(self) -> TypeId {
        self.0
    }

    /// Number of elements of a scalar type.
    pub fn card(self) -> Result<u32, SolverError> {
        let card = engine::scalar_type_card(self.0);
        if card < 0 {
            Err(SolverError::Term(EngineFault::take()))
        } else {
            Ok(card as u32)
        }
    }

    /// Width of a bit-vector type, `0` for any other type.
    pub fn bit_size(self) -> Result<u32, SolverError> {
        let size = engine::type_bitsize(self.0);
        if size < 0 {
            Err(SolverError::Term(EngineFault::take()))
        } else {
            Ok(size as u32)
        }
    }

    /// Component types of a tuple type, or the domain followed by the range of a
    /// function type. Empty for all other types.
    pub fn children(self) -> Result<Vec<Type>, SolverError> {
        let mut children = Vec::new();
        check_code(engine::type_children(self.0, &mut children), SolverError::Term)?;
        Ok(children.into_iter().map(Type).collect())
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match engine::type_to_string(self.0) {
            Some(text) => write!(f, "{}", text),
            None => {
                engine::reset_error();
                write!(f, "<invalid type {}>", self.0)
            }
        }
    }
}
