use crate::engine::_impl_error_report::{ErrorCode, Failure};
use crate::engine::{with_engine, TypeDesc, TypeEntry, TypeId, TypeTable, NULL_TYPE};
use z3::{DatatypeAccessor, DatatypeBuilder, FuncDecl, Sort, Symbol};

/// Bit-vectors wider than this are rejected by `bv_type`.
pub(crate) const MAX_BV_SIZE: u32 = 1 << 16;

const BOOL: TypeId = 0;
const INT: TypeId = 1;
const REAL: TypeId = 2;

impl TypeEntry {
    fn plain(desc: TypeDesc, sort: Option<Sort<'static>>) -> TypeEntry {
        TypeEntry {
            desc,
            sort,
            constants: Vec::new(),
            constructor: None,
            accessors: Vec::new(),
        }
    }
}

impl TypeTable {
    pub(crate) fn new(z3: &'static z3::Context) -> TypeTable {
        let mut table = TypeTable {
            entries: Vec::new(),
            index: Default::default(),
            next_scalar: 0,
        };
        // The order fixes the ids of the built-in types.
        table.intern(z3, TypeDesc::Bool);
        table.intern(z3, TypeDesc::Int);
        table.intern(z3, TypeDesc::Real);
        table
    }

    /// Find or create a structural type. Scalar types are created by `new_scalar` instead,
    /// and tuple components must not be function types.
    pub(crate) fn intern(&mut self, z3: &'static z3::Context, desc: TypeDesc) -> TypeId {
        if let Some(id) = self.index.get(&desc) {
            return *id;
        }
        let id = self.entries.len() as TypeId;
        let entry = match &desc {
            TypeDesc::Bool => TypeEntry::plain(desc.clone(), Some(Sort::bool(z3))),
            TypeDesc::Int => TypeEntry::plain(desc.clone(), Some(Sort::int(z3))),
            TypeDesc::Real => TypeEntry::plain(desc.clone(), Some(Sort::real(z3))),
            TypeDesc::BitVector(width) => {
                TypeEntry::plain(desc.clone(), Some(Sort::bitvector(z3, *width)))
            }
            TypeDesc::Function { .. } | TypeDesc::Scalar { .. } => {
                TypeEntry::plain(desc.clone(), None)
            }
            TypeDesc::Tuple(items) => self.tuple_entry(z3, id, items),
        };
        self.entries.push(entry);
        self.index.insert(desc, id);
        id
    }

    /// A single-constructor datatype with one field per component.
    fn tuple_entry(&self, z3: &'static z3::Context, id: TypeId, items: &[TypeId]) -> TypeEntry {
        let names: Vec<String> = (0..items.len()).map(|i| format!("tuple!{id}!{i}")).collect();
        let fields = names
            .iter()
            .zip(items)
            .filter_map(|(name, item)| {
                let sort = self.entries[*item as usize].sort.clone()?;
                Some((name.as_str(), DatatypeAccessor::Sort(sort)))
            })
            .collect();
        let datatype = DatatypeBuilder::new(z3, format!("tuple!{id}"))
            .variant(&format!("mk-tuple!{id}"), fields)
            .finish();
        let mut entry = TypeEntry::plain(TypeDesc::Tuple(items.to_vec()), Some(datatype.sort));
        if let Some(variant) = datatype.variants.into_iter().next() {
            entry.constructor = Some(variant.constructor);
            entry.accessors = variant.accessors;
        }
        entry
    }

    /// A fresh enumeration sort; scalar types are never shared.
    pub(crate) fn new_scalar(&mut self, z3: &'static z3::Context, card: u32) -> TypeId {
        let uid = self.next_scalar;
        self.next_scalar += 1;
        let names: Vec<Symbol> = (0..card)
            .map(|i| Symbol::String(format!("s!{uid}!{i}")))
            .collect();
        let (sort, constants, _testers) =
            Sort::enumeration(z3, Symbol::String(format!("scalar!{uid}")), &names);
        let id = self.entries.len() as TypeId;
        let mut entry = TypeEntry::plain(TypeDesc::Scalar { uid, card }, Some(sort));
        entry.constants = constants;
        self.entries.push(entry);
        id
    }

    pub(crate) fn get(&self, ty: TypeId) -> Result<&TypeDesc, Failure> {
        if ty < 0 {
            return Err(Failure::new(ErrorCode::InvalidType, format!("invalid type id {ty}")));
        }
        self.entries
            .get(ty as usize)
            .map(|it| &it.desc)
            .ok_or_else(|| Failure::new(ErrorCode::InvalidType, format!("invalid type id {ty}")))
    }

    /// Same as `get`, but for types that are already known to be valid (e.g. the type of
    /// an existing term).
    pub(crate) fn desc(&self, ty: TypeId) -> &TypeDesc {
        &self.entries[ty as usize].desc
    }

    /// The Z3 sort of a valid type; `None` for function types.
    pub(crate) fn sort(&self, ty: TypeId) -> Option<&Sort<'static>> {
        self.entries[ty as usize].sort.as_ref()
    }

    /// The enumeration constant of a scalar type.
    pub(crate) fn scalar_constant(&self, ty: TypeId, index: u32) -> Option<&FuncDecl<'static>> {
        self.entries[ty as usize].constants.get(index as usize)
    }

    pub(crate) fn tuple_constructor(&self, ty: TypeId) -> Option<&FuncDecl<'static>> {
        self.entries[ty as usize].constructor.as_ref()
    }

    /// Zero-based field accessor of a tuple type.
    pub(crate) fn tuple_accessor(&self, ty: TypeId, index: usize) -> Option<&FuncDecl<'static>> {
        self.entries[ty as usize].accessors.get(index)
    }

    pub(crate) fn is_arithmetic(&self, ty: TypeId) -> bool {
        ty == INT || ty == REAL
    }

    pub(crate) fn is_function(&self, ty: TypeId) -> bool {
        matches!(self.desc(ty), TypeDesc::Function { .. })
    }

    pub(crate) fn bool_type() -> TypeId {
        BOOL
    }

    pub(crate) fn int_type() -> TypeId {
        INT
    }

    pub(crate) fn real_type() -> TypeId {
        REAL
    }

    pub(crate) fn bv_width(&self, ty: TypeId) -> Option<u32> {
        match self.desc(ty) {
            TypeDesc::BitVector(width) => Some(*width),
            _ => None,
        }
    }

    /// `true` if every value of `sub` is also a value of `sup`. The only proper subtype
    /// relation is `int` below `real`.
    pub(crate) fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        sub == sup || (sub == INT && sup == REAL)
    }

    /// The smallest common supertype of two types, if it exists.
    pub(crate) fn super_type(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        if self.is_subtype(a, b) {
            Some(b)
        } else if self.is_subtype(b, a) {
            Some(a)
        } else {
            None
        }
    }

    pub(crate) fn to_string(&self, ty: TypeId) -> String {
        match self.desc(ty) {
            TypeDesc::Bool => "bool".to_string(),
            TypeDesc::Int => "int".to_string(),
            TypeDesc::Real => "real".to_string(),
            TypeDesc::BitVector(width) => format!("(bitvector {width})"),
            TypeDesc::Scalar { uid, card } => format!("(scalar!{uid} {card})"),
            TypeDesc::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|it| self.to_string(*it)).collect();
                format!("(tuple {})", items.join(" "))
            }
            TypeDesc::Function { domain, range } => {
                let items: Vec<String> = domain.iter().map(|it| self.to_string(*it)).collect();
                format!("(-> {} {})", items.join(" "), self.to_string(*range))
            }
        }
    }
}

/// **(internal)** Run a fallible type constructor and convert its failure into `NULL_TYPE`.
fn report(result: Result<TypeId, Failure>) -> TypeId {
    match result {
        Ok(ty) => ty,
        Err(failure) => {
            failure.report();
            NULL_TYPE
        }
    }
}

pub fn bool_type() -> TypeId {
    BOOL
}

pub fn int_type() -> TypeId {
    INT
}

pub fn real_type() -> TypeId {
    REAL
}

/// Bit-vector type of the given width; the width must be in `1..=MAX_BV_SIZE`.
pub fn bv_type(width: u32) -> TypeId {
    if width == 0 || width > MAX_BV_SIZE {
        return report(Err(Failure::new(
            ErrorCode::InvalidBvSize,
            format!("invalid bit-vector size {width}"),
        )));
    }
    with_engine(|engine| engine.types.intern(engine.z3, TypeDesc::BitVector(width)))
}

/// A fresh scalar (enumeration) type with `card` elements.
pub fn new_scalar_type(card: u32) -> TypeId {
    if card == 0 {
        return report(Err(Failure::new(
            ErrorCode::InvalidConstantIndex,
            "scalar types must have a positive cardinality",
        )));
    }
    with_engine(|engine| engine.types.new_scalar(engine.z3, card))
}

pub fn tuple_type(items: &[TypeId]) -> TypeId {
    report(with_engine(|engine| {
        if items.is_empty() {
            return Err(Failure::new(
                ErrorCode::WrongNumberOfArguments,
                "tuple types need at least one component",
            ));
        }
        for item in items {
            if let TypeDesc::Function { .. } = engine.types.get(*item)? {
                return Err(Failure::new(
                    ErrorCode::OperationNotSupported,
                    "tuple components cannot be functions",
                ));
            }
        }
        Ok(engine.types.intern(engine.z3, TypeDesc::Tuple(items.to_vec())))
    }))
}

pub fn function_type(domain: &[TypeId], range: TypeId) -> TypeId {
    report(with_engine(|engine| {
        if domain.is_empty() {
            return Err(Failure::new(
                ErrorCode::WrongNumberOfArguments,
                "function types need a non-empty domain",
            ));
        }
        for item in domain.iter().chain(std::iter::once(&range)) {
            if let TypeDesc::Function { .. } = engine.types.get(*item)? {
                return Err(Failure::new(
                    ErrorCode::OperationNotSupported,
                    "higher-order function types are not supported",
                ));
            }
        }
        let desc = TypeDesc::Function {
            domain: domain.to_vec(),
            range,
        };
        Ok(engine.types.intern(engine.z3, desc))
    }))
}

/// Cardinality of a scalar type, or `-1` if `ty` is not a scalar type.
pub fn scalar_type_card(ty: TypeId) -> i64 {
    with_engine(|engine| match engine.types.get(ty) {
        Ok(TypeDesc::Scalar { card, .. }) => i64::from(*card),
        Ok(_) => Failure::new(ErrorCode::TypeMismatch, "not a scalar type").report() as i64,
        Err(failure) => failure.report() as i64,
    })
}

/// Width of a bit-vector type, `0` for any other type, `-1` for an invalid type.
pub fn type_bitsize(ty: TypeId) -> i64 {
    with_engine(|engine| match engine.types.get(ty) {
        Ok(TypeDesc::BitVector(width)) => i64::from(*width),
        Ok(_) => 0,
        Err(failure) => failure.report() as i64,
    })
}

/// Component types of a tuple type, or domain followed by range for a function type.
/// Atomic types have no children. Returns `-1` for an invalid type.
pub fn type_children(ty: TypeId, out: &mut Vec<TypeId>) -> i32 {
    with_engine(|engine| match engine.types.get(ty) {
        Ok(TypeDesc::Tuple(items)) => {
            out.extend_from_slice(items);
            0
        }
        Ok(TypeDesc::Function { domain, range }) => {
            out.extend_from_slice(domain);
            out.push(*range);
            0
        }
        Ok(_) => 0,
        Err(failure) => failure.report(),
    })
}

pub fn type_to_string(ty: TypeId) -> Option<String> {
    with_engine(|engine| match engine.types.get(ty) {
        Ok(_) => Some(engine.types.to_string(ty)),
        Err(failure) => {
            failure.report();
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_are_fixed() {
        assert_eq!(bool_type(), 0);
        assert_eq!(int_type(), 1);
        assert_eq!(real_type(), 2);
        assert_eq!(type_to_string(real_type()).unwrap(), "real");
    }

    #[test]
    fn structural_types_are_shared() {
        let bv8 = bv_type(8);
        assert_eq!(bv8, bv_type(8));
        assert_ne!(bv8, bv_type(9));
        let tuple = tuple_type(&[bool_type(), bv8]);
        assert_eq!(tuple, tuple_type(&[bool_type(), bv8]));
        assert_eq!(type_bitsize(bv8), 8);
        assert_eq!(type_bitsize(tuple), 0);
        assert_eq!(type_to_string(tuple).unwrap(), "(tuple bool (bitvector 8))");
    }

    #[test]
    fn scalar_types_are_nominal() {
        let a = new_scalar_type(3);
        let b = new_scalar_type(3);
        assert_ne!(a, b);
        assert_eq!(scalar_type_card(a), 3);
        assert!(scalar_type_card(int_type()) < 0);
    }

    #[test]
    fn invalid_types_are_rejected() {
        assert_eq!(bv_type(0), NULL_TYPE);
        assert_eq!(tuple_type(&[]), NULL_TYPE);
        assert_eq!(function_type(&[int_type()], 1_000_000), NULL_TYPE);
        assert_eq!(new_scalar_type(0), NULL_TYPE);
        let f = function_type(&[int_type()], int_type());
        assert_eq!(tuple_type(&[f]), NULL_TYPE);
        assert_eq!(function_type(&[f], int_type()), NULL_TYPE);
    }

    #[test]
    fn int_is_a_subtype_of_real() {
        with_engine(|engine| {
            let types = &engine.types;
            assert!(types.is_subtype(INT, REAL));
            assert!(!types.is_subtype(REAL, INT));
            assert_eq!(types.super_type(INT, REAL), Some(REAL));
            assert_eq!(types.super_type(BOOL, REAL), None);
        });
    }
}
