use crate::engine::_impl_error_report::{ErrorCode, Failure};
use crate::engine::_impl_types::MAX_BV_SIZE;
use crate::engine::{
    with_engine, BvOp, Cmp, Engine, Features, Op, TermEntry, TermId, TermTable, TypeDesc, TypeId,
    TypeTable, Z3Term, NULL_TERM, NULL_TYPE,
};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;
use z3::ast::{Ast, Bool, Dynamic, Int, Real, BV};
use z3::FuncDecl;

impl TermEntry {
    pub(crate) fn ty(&self) -> TypeId {
        self.ty
    }

    pub(crate) fn op(&self) -> Op {
        self.op
    }

    /// Direct sub-terms, in argument order.
    pub(crate) fn children(&self) -> &[TermId] {
        &self.children
    }

    pub(crate) fn features(&self) -> Features {
        self.features
    }

    /// The expression of a non-function term.
    pub(crate) fn ast(&self) -> Option<&Dynamic<'static>> {
        match &self.z3 {
            Z3Term::Ast(ast) => Some(ast),
            Z3Term::Function(_) => None,
        }
    }

    /// The declaration of an uninterpreted function symbol.
    pub(crate) fn function(&self) -> Option<&FuncDecl<'static>> {
        match &self.z3 {
            Z3Term::Function(decl) => Some(decl),
            Z3Term::Ast(_) => None,
        }
    }
}

impl TermTable {
    pub(crate) fn new() -> TermTable {
        TermTable {
            entries: Vec::new(),
            index: Default::default(),
            names: Default::default(),
            term_names: Default::default(),
        }
    }

    /// Find or register an expression. Expressions which Z3 considers equal share one id,
    /// the operator of the first registration is kept.
    pub(crate) fn intern(
        &mut self,
        types: &TypeTable,
        ast: Dynamic<'static>,
        ty: TypeId,
        op: Op,
        children: Vec<TermId>,
    ) -> TermId {
        if let Some(id) = self.index.get(&ast) {
            return *id;
        }
        let features = self.scan(types, ty, op, &children);
        let id = self.entries.len() as TermId;
        self.entries.push(TermEntry {
            z3: Z3Term::Ast(ast.clone()),
            ty,
            op,
            children,
            features,
        });
        self.index.insert(ast, id);
        id
    }

    /// Theory features of a new term, from its own shape and those of its children.
    fn scan(&self, types: &TypeTable, ty: TypeId, op: Op, children: &[TermId]) -> Features {
        let mut features = Features {
            ground: op != Op::Symbol,
            ..Features::default()
        };
        for child in children {
            let inner = self.entries[*child as usize].features;
            features.arith |= inner.arith;
            features.real |= inner.real;
            features.nonlinear |= inner.nonlinear;
            features.bv |= inner.bv;
            features.uf |= inner.uf;
            features.ground &= inner.ground;
        }
        match types.desc(ty) {
            TypeDesc::Int => features.arith = true,
            TypeDesc::Real => {
                features.arith = true;
                features.real = true;
            }
            TypeDesc::BitVector(_) => features.bv = true,
            TypeDesc::Function { .. } => features.uf = true,
            _ => {}
        }
        match op {
            Op::Apply => features.uf = true,
            Op::ArithCmp(_) => features.arith = true,
            Op::BvCmp(_) => features.bv = true,
            Op::Product => {
                let variable = children
                    .iter()
                    .filter(|it| !self.entries[**it as usize].features.ground)
                    .count();
                if variable >= 2 {
                    features.nonlinear = true;
                }
            }
            _ => {}
        }
        features
    }

    pub(crate) fn get(&self, term: TermId) -> Result<&TermEntry, Failure> {
        let found = if term >= 0 {
            self.entries.get(term as usize)
        } else {
            None
        };
        found.ok_or_else(|| Failure::new(ErrorCode::InvalidTerm, format!("invalid term id {term}")))
    }

    /// Same as `get`, but for terms which are already known to be valid.
    pub(crate) fn entry(&self, term: TermId) -> &TermEntry {
        &self.entries[term as usize]
    }

    pub(crate) fn name_of(&self, term: TermId) -> Option<&str> {
        self.term_names.get(&term).map(|it| it.as_str())
    }

    /// The expression of a term which is used as an operand.
    pub(crate) fn ast(&self, term: TermId) -> Result<&Dynamic<'static>, Failure> {
        self.get(term)?.ast().ok_or_else(|| {
            Failure::new(
                ErrorCode::TypeMismatch,
                format!("function term {term} can only be applied"),
            )
        })
    }

    /// The Boolean expression of a formula.
    pub(crate) fn formula(&self, term: TermId) -> Result<Bool<'static>, Failure> {
        if self.get(term)?.ty != TypeTable::bool_type() {
            return Err(Failure::new(
                ErrorCode::TypeMismatch,
                format!("term {term} is not a Boolean term"),
            ));
        }
        self.ast(term)?.as_bool().ok_or_else(|| internal(term))
    }

    /// All terms reachable from `roots`, each once, parents before children.
    pub(crate) fn reachable(&self, roots: &[TermId]) -> Vec<TermId> {
        let mut visited = fxhash::FxHashSet::default();
        let mut stack: Vec<TermId> = roots.iter().rev().copied().collect();
        let mut result = Vec::new();
        while let Some(term) = stack.pop() {
            if visited.insert(term) {
                result.push(term);
                stack.extend(self.entry(term).children.iter().rev());
            }
        }
        result
    }

    /// The uninterpreted constants and function applications reachable from `roots`:
    /// the terms whose value a model chooses.
    pub(crate) fn leaves(&self, roots: &[TermId]) -> Vec<TermId> {
        self.reachable(roots)
            .into_iter()
            .filter(|it| {
                let entry = self.entry(*it);
                entry.op == Op::Apply || (entry.op == Op::Symbol && entry.ast().is_some())
            })
            .collect()
    }

    /// The uninterpreted symbols (constants and functions) reachable from `roots`.
    pub(crate) fn symbols(&self, roots: &[TermId]) -> Vec<TermId> {
        self.reachable(roots)
            .into_iter()
            .filter(|it| self.entry(*it).op == Op::Symbol)
            .collect()
    }

    pub(crate) fn to_string(&self, term: TermId) -> String {
        if let Some(name) = self.term_names.get(&term) {
            return name.clone();
        }
        let entry = self.entry(term);
        let list = |op: &str| {
            let args: Vec<String> = entry.children.iter().map(|it| self.to_string(*it)).collect();
            format!("({} {})", op, args.join(" "))
        };
        match entry.op {
            Op::Constant => entry.ast().map(|it| it.to_string()).unwrap_or_default(),
            Op::Symbol => format!("t!{term}"),
            Op::Not => list("not"),
            Op::And => list("and"),
            Op::Or => list("or"),
            Op::Xor => list("xor"),
            Op::Implies => list("=>"),
            Op::Eq => list("="),
            Op::Distinct => list("distinct"),
            Op::Ite => list("ite"),
            Op::Sum => list("+"),
            Op::Sub | Op::Neg => list("-"),
            Op::Product => list("*"),
            Op::ArithCmp(cmp) => list(cmp_symbol(cmp, false)),
            Op::BvArith(op) => list(match op {
                BvOp::Add => "bv-add",
                BvOp::Sub => "bv-sub",
                BvOp::Mul => "bv-mul",
            }),
            Op::BvCmp(cmp) => list(cmp_symbol(cmp, true)),
            Op::Tuple => list("mk-tuple"),
            Op::Select(index) => {
                format!("(select {} {})", self.to_string(entry.children[0]), index)
            }
            Op::Apply => {
                let items: Vec<String> = entry.children.iter().map(|it| self.to_string(*it)).collect();
                format!("({})", items.join(" "))
            }
        }
    }
}

fn cmp_symbol(cmp: Cmp, bitvector: bool) -> &'static str {
    match (cmp, bitvector) {
        (Cmp::Lt, false) => "<",
        (Cmp::Le, false) => "<=",
        (Cmp::Gt, false) => ">",
        (Cmp::Ge, false) => ">=",
        (Cmp::Lt, true) => "bv-lt",
        (Cmp::Le, true) => "bv-le",
        (Cmp::Gt, true) => "bv-gt",
        (Cmp::Ge, true) => "bv-ge",
    }
}

/// **(internal)** A term whose expression does not have the sort its type promises.
pub(crate) fn internal(term: TermId) -> Failure {
    Failure::new(
        ErrorCode::Internal,
        format!("term {term} has an unexpected sort"),
    )
}

/// **(internal)** Bit-vector numeral from its bits, least significant bit first.
pub(crate) fn bv_numeral(z3: &'static z3::Context, bits: &[bool]) -> BV<'static> {
    let mut chunks = bits.chunks(64).map(|chunk| {
        let value = chunk
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, bit)| if *bit { acc | (1 << i) } else { acc });
        BV::from_u64(z3, value, chunk.len() as u32)
    });
    let lowest = match chunks.next() {
        Some(lowest) => lowest,
        None => return BV::from_u64(z3, 0, 1),
    };
    if bits.len() <= 64 {
        return lowest;
    }
    chunks
        .fold(lowest, |low, high| high.concat(&low))
        .simplify()
}

/// **(internal)** Arithmetic operands converted to one common sort.
enum Numbers {
    Int(Vec<Int<'static>>),
    Real(Vec<Real<'static>>),
}

impl Engine {
    fn type_of(&self, term: TermId) -> Result<TypeId, Failure> {
        self.terms.get(term).map(|it| it.ty)
    }

    fn check_bool(&self, term: TermId) -> Result<Bool<'static>, Failure> {
        self.terms.formula(term)
    }

    fn check_bv(&self, term: TermId) -> Result<(u32, BV<'static>), Failure> {
        let ty = self.type_of(term)?;
        let width = self.types.bv_width(ty).ok_or_else(|| {
            Failure::new(
                ErrorCode::BitvectorRequired,
                format!("term {term} is not a bit-vector term"),
            )
        })?;
        let ast = self.terms.ast(term)?.as_bv().ok_or_else(|| internal(term))?;
        Ok((width, ast))
    }

    fn check_same_bv(
        &self,
        a: TermId,
        b: TermId,
    ) -> Result<(TypeId, BV<'static>, BV<'static>), Failure> {
        let (left, x) = self.check_bv(a)?;
        let (right, y) = self.check_bv(b)?;
        if left != right {
            return Err(Failure::new(
                ErrorCode::IncompatibleBvSizes,
                format!("bit-vector sizes {left} and {right} differ"),
            ));
        }
        Ok((self.type_of(a)?, x, y))
    }

    /// The expression of `term`, converted to `real` when `target` is `real`.
    pub(crate) fn coerced(&self, term: TermId, target: TypeId) -> Result<Dynamic<'static>, Failure> {
        let ast = self.terms.ast(term)?;
        if target == TypeTable::real_type() && self.type_of(term)? == TypeTable::int_type() {
            let int = ast.as_int().ok_or_else(|| internal(term))?;
            Ok(Dynamic::from_ast(&int.to_real()))
        } else {
            Ok(ast.clone())
        }
    }

    fn common_type(&self, a: TermId, b: TermId) -> Result<TypeId, Failure> {
        let left = self.type_of(a)?;
        let right = self.type_of(b)?;
        if self.types.is_function(left) || self.types.is_function(right) {
            return Err(Failure::new(
                ErrorCode::TypeMismatch,
                "function terms can only be applied",
            ));
        }
        self.types.super_type(left, right).ok_or_else(|| {
            Failure::new(
                ErrorCode::IncompatibleTypes,
                format!("terms {a} and {b} have incompatible types"),
            )
        })
    }

    fn numbers(&self, args: &[TermId]) -> Result<(TypeId, Numbers), Failure> {
        let mut ty = TypeTable::int_type();
        for arg in args {
            let arg_type = self.type_of(*arg)?;
            if !self.types.is_arithmetic(arg_type) {
                return Err(Failure::new(
                    ErrorCode::ArithTermRequired,
                    format!("term {arg} is not an arithmetic term"),
                ));
            }
            if arg_type == TypeTable::real_type() {
                ty = TypeTable::real_type();
            }
        }
        let mut ints = Vec::new();
        let mut reals = Vec::new();
        for arg in args {
            let ast = self.coerced(*arg, ty)?;
            if ty == TypeTable::real_type() {
                reals.push(ast.as_real().ok_or_else(|| internal(*arg))?);
            } else {
                ints.push(ast.as_int().ok_or_else(|| internal(*arg))?);
            }
        }
        let numbers = if ty == TypeTable::real_type() {
            Numbers::Real(reals)
        } else {
            Numbers::Int(ints)
        };
        Ok((ty, numbers))
    }

    fn add(&mut self, ast: impl Ast<'static>, ty: TypeId, op: Op, children: Vec<TermId>) -> TermId {
        let ast = Dynamic::from_ast(&ast);
        self.terms.intern(&self.types, ast, ty, op, children)
    }

    pub(crate) fn mk_bool(&mut self, value: bool) -> TermId {
        let ast = Bool::from_bool(self.z3, value);
        self.add(ast, TypeTable::bool_type(), Op::Constant, Vec::new())
    }

    /// An arithmetic constant; integral values are `int` terms.
    pub(crate) fn mk_rational(&mut self, value: &BigRational) -> Result<TermId, Failure> {
        let z3 = self.z3;
        let numeral = if value.is_integer() {
            Int::from_str(z3, &value.numer().to_string()).map(|it| Dynamic::from_ast(&it))
        } else {
            let (numer, denom) = (value.numer().to_string(), value.denom().to_string());
            Real::from_real_str(z3, &numer, &denom).map(|it| Dynamic::from_ast(&it))
        };
        let numeral = numeral.ok_or_else(|| {
            Failure::new(ErrorCode::Internal, format!("invalid numeral {value}"))
        })?;
        let ty = if value.is_integer() {
            TypeTable::int_type()
        } else {
            TypeTable::real_type()
        };
        Ok(self.add(numeral, ty, Op::Constant, Vec::new()))
    }

    pub(crate) fn mk_bv(&mut self, bits: &[bool]) -> TermId {
        let ty = self
            .types
            .intern(self.z3, TypeDesc::BitVector(bits.len() as u32));
        let numeral = bv_numeral(self.z3, bits);
        self.add(numeral, ty, Op::Constant, Vec::new())
    }

    /// Register a value computed by a model as a constant term of type `ty`.
    pub(crate) fn mk_value(&mut self, value: Dynamic<'static>, ty: TypeId) -> TermId {
        self.terms.intern(&self.types, value, ty, Op::Constant, Vec::new())
    }

    pub(crate) fn mk_not(&mut self, a: TermId) -> Result<TermId, Failure> {
        let x = self.check_bool(a)?;
        Ok(self.add(x.not(), TypeTable::bool_type(), Op::Not, vec![a]))
    }

    pub(crate) fn mk_eq(&mut self, a: TermId, b: TermId) -> Result<TermId, Failure> {
        let ty = self.common_type(a, b)?;
        let (x, y) = (self.coerced(a, ty)?, self.coerced(b, ty)?);
        Ok(self.add(x._eq(&y), TypeTable::bool_type(), Op::Eq, vec![a, b]))
    }

    /// Conjunction (`and`) or disjunction (`or`) of formulas. The empty list is the neutral
    /// element and a single argument is returned unchanged.
    pub(crate) fn mk_junction(&mut self, args: &[TermId], and: bool) -> Result<TermId, Failure> {
        let mut formulas = Vec::with_capacity(args.len());
        for arg in args {
            formulas.push(self.check_bool(*arg)?);
        }
        let refs: Vec<&Bool<'static>> = formulas.iter().collect();
        Ok(match args {
            [] => self.mk_bool(and),
            [single] => *single,
            _ if and => {
                let ast = Bool::and(self.z3, &refs);
                self.add(ast, TypeTable::bool_type(), Op::And, args.to_vec())
            }
            _ => {
                let ast = Bool::or(self.z3, &refs);
                self.add(ast, TypeTable::bool_type(), Op::Or, args.to_vec())
            }
        })
    }
}

/// **(internal)** Run a term constructor on the engine of this thread and turn its
/// failure into `NULL_TERM`.
fn build<F>(action: F) -> TermId
where
    F: FnOnce(&mut Engine) -> Result<TermId, Failure>,
{
    match with_engine(action) {
        Ok(term) => term,
        Err(failure) => {
            failure.report();
            NULL_TERM
        }
    }
}

pub fn bool_const(value: bool) -> TermId {
    build(|engine| Ok(engine.mk_bool(value)))
}

pub fn int64(value: i64) -> TermId {
    rational(BigRational::from_integer(BigInt::from(value)))
}

/// The constant `num/den`; fails with `DivisionByZero` when `den == 0`.
pub fn rational64(num: i64, den: i64) -> TermId {
    if den == 0 {
        Failure::new(ErrorCode::DivisionByZero, "zero denominator").report();
        return NULL_TERM;
    }
    rational(BigRational::new(BigInt::from(num), BigInt::from(den)))
}

/// An arithmetic constant. Integral values have type `int`, all others type `real`.
pub fn rational(value: BigRational) -> TermId {
    build(|engine| engine.mk_rational(&value))
}

pub fn bv_const_u64(width: u32, value: u64) -> TermId {
    if width == 0 || width > MAX_BV_SIZE {
        Failure::new(
            ErrorCode::InvalidBvSize,
            format!("invalid bit-vector size {width}"),
        )
        .report();
        return NULL_TERM;
    }
    let bits: Vec<bool> = (0..width)
        .map(|i| i < 64 && (value >> i) & 1 == 1)
        .collect();
    build(|engine| Ok(engine.mk_bv(&bits)))
}

/// A bit-vector constant from its bits, least significant bit first.
pub fn bv_from_bits(bits: &[bool]) -> TermId {
    if bits.is_empty() || bits.len() > MAX_BV_SIZE as usize {
        Failure::new(
            ErrorCode::InvalidBvSize,
            format!("invalid bit-vector size {}", bits.len()),
        )
        .report();
        return NULL_TERM;
    }
    build(|engine| Ok(engine.mk_bv(bits)))
}

/// The `index`-th element of the scalar type `ty`.
pub fn scalar_const(index: u32, ty: TypeId) -> TermId {
    build(|engine| match engine.types.get(ty)?.clone() {
        TypeDesc::Scalar { card, .. } if index < card => {
            let constant = engine
                .types
                .scalar_constant(ty, index)
                .map(|it| it.apply(&[]))
                .ok_or_else(|| Failure::new(ErrorCode::Internal, "missing scalar constant"))?;
            Ok(engine.add(constant, ty, Op::Constant, Vec::new()))
        }
        TypeDesc::Scalar { .. } => Err(Failure::new(
            ErrorCode::InvalidConstantIndex,
            format!("scalar index {index} out of range"),
        )),
        _ => Err(Failure::new(ErrorCode::TypeMismatch, "not a scalar type")),
    })
}

/// A fresh uninterpreted symbol of type `ty`.
pub fn new_uninterpreted_term(ty: TypeId) -> TermId {
    build(|engine| {
        let desc = engine.types.get(ty)?.clone();
        let id = engine.terms.entries.len() as TermId;
        let name = format!("t!{id}");
        if let TypeDesc::Function { domain, range } = desc {
            let sorts: Vec<_> = domain
                .iter()
                .chain(std::iter::once(&range))
                .map(|it| engine.types.sort(*it).cloned())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| Failure::new(ErrorCode::Internal, "function type without sorts"))?;
            let (range_sort, domain_sorts) = sorts.split_last().ok_or_else(|| {
                Failure::new(ErrorCode::Internal, "function type without sorts")
            })?;
            let domain_refs: Vec<_> = domain_sorts.iter().collect();
            let decl = FuncDecl::new(engine.z3, name, &domain_refs, range_sort);
            let features = Features {
                uf: true,
                ..Features::default()
            };
            engine.terms.entries.push(TermEntry {
                z3: Z3Term::Function(decl),
                ty,
                op: Op::Symbol,
                children: Vec::new(),
                features,
            });
            return Ok(id);
        }
        let sort = engine
            .types
            .sort(ty)
            .cloned()
            .ok_or_else(|| Failure::new(ErrorCode::Internal, "type without sort"))?;
        let symbol = FuncDecl::new(engine.z3, name, &[], &sort).apply(&[]);
        Ok(engine.add(symbol, ty, Op::Symbol, Vec::new()))
    })
}

pub fn not(a: TermId) -> TermId {
    build(|engine| engine.mk_not(a))
}

/// Conjunction; `and(&[])` is `true` and a single argument is returned unchanged.
pub fn and(args: &[TermId]) -> TermId {
    build(|engine| engine.mk_junction(args, true))
}

/// Disjunction; `or(&[])` is `false` and a single argument is returned unchanged.
pub fn or(args: &[TermId]) -> TermId {
    build(|engine| engine.mk_junction(args, false))
}

pub fn xor(args: &[TermId]) -> TermId {
    build(|engine| {
        let mut formulas = Vec::with_capacity(args.len());
        for arg in args {
            formulas.push(engine.check_bool(*arg)?);
        }
        let mut formulas = formulas.into_iter();
        Ok(match (args, formulas.next()) {
            ([single], _) => *single,
            (_, Some(first)) => {
                let ast = formulas.fold(first, |acc, it| acc.xor(&it));
                engine.add(ast, TypeTable::bool_type(), Op::Xor, args.to_vec())
            }
            (_, None) => engine.mk_bool(false),
        })
    })
}

pub fn iff(a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let (x, y) = (engine.check_bool(a)?, engine.check_bool(b)?);
        Ok(engine.add(x.iff(&y), TypeTable::bool_type(), Op::Eq, vec![a, b]))
    })
}

pub fn implies(a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let (x, y) = (engine.check_bool(a)?, engine.check_bool(b)?);
        Ok(engine.add(x.implies(&y), TypeTable::bool_type(), Op::Implies, vec![a, b]))
    })
}

pub fn eq(a: TermId, b: TermId) -> TermId {
    build(|engine| engine.mk_eq(a, b))
}

pub fn neq(a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let equal = engine.mk_eq(a, b)?;
        engine.mk_not(equal)
    })
}

/// Pairwise disequality of at least two terms.
pub fn distinct(args: &[TermId]) -> TermId {
    build(|engine| {
        if args.len() < 2 {
            return Err(Failure::new(
                ErrorCode::WrongNumberOfArguments,
                "distinct needs at least two arguments",
            ));
        }
        let mut ty = engine.type_of(args[0])?;
        for pair in args.windows(2) {
            let pair_type = engine.common_type(pair[0], pair[1])?;
            ty = engine
                .types
                .super_type(ty, pair_type)
                .ok_or_else(|| Failure::new(ErrorCode::IncompatibleTypes, "incompatible types"))?;
        }
        let mut items = Vec::with_capacity(args.len());
        for arg in args {
            items.push(engine.coerced(*arg, ty)?);
        }
        let refs: Vec<&Dynamic<'static>> = items.iter().collect();
        let ast = Dynamic::distinct(engine.z3, &refs);
        Ok(engine.add(ast, TypeTable::bool_type(), Op::Distinct, args.to_vec()))
    })
}

pub fn ite(condition: TermId, then: TermId, other: TermId) -> TermId {
    build(|engine| {
        let c = engine.check_bool(condition)?;
        let ty = engine.common_type(then, other)?;
        let (x, y) = (engine.coerced(then, ty)?, engine.coerced(other, ty)?);
        Ok(engine.add(c.ite(&x, &y), ty, Op::Ite, vec![condition, then, other]))
    })
}

/// Sum of arithmetic terms; `sum(&[])` is the integer zero.
pub fn sum(args: &[TermId]) -> TermId {
    build(|engine| {
        let (ty, numbers) = engine.numbers(args)?;
        if args.is_empty() {
            return engine.mk_rational(&BigRational::zero());
        }
        if let [single] = args {
            return Ok(*single);
        }
        Ok(match numbers {
            Numbers::Int(items) => {
                let refs: Vec<_> = items.iter().collect();
                engine.add(Int::add(engine.z3, &refs), ty, Op::Sum, args.to_vec())
            }
            Numbers::Real(items) => {
                let refs: Vec<_> = items.iter().collect();
                engine.add(Real::add(engine.z3, &refs), ty, Op::Sum, args.to_vec())
            }
        })
    })
}

pub fn sub(a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let (ty, numbers) = engine.numbers(&[a, b])?;
        Ok(match numbers {
            Numbers::Int(items) => {
                let refs: Vec<_> = items.iter().collect();
                engine.add(Int::sub(engine.z3, &refs), ty, Op::Sub, vec![a, b])
            }
            Numbers::Real(items) => {
                let refs: Vec<_> = items.iter().collect();
                engine.add(Real::sub(engine.z3, &refs), ty, Op::Sub, vec![a, b])
            }
        })
    })
}

pub fn neg(a: TermId) -> TermId {
    build(|engine| {
        let (ty, numbers) = engine.numbers(&[a])?;
        let ast = match numbers {
            Numbers::Int(items) => items.first().map(|it| Dynamic::from_ast(&it.unary_minus())),
            Numbers::Real(items) => items.first().map(|it| Dynamic::from_ast(&it.unary_minus())),
        };
        let ast = ast.ok_or_else(|| internal(a))?;
        Ok(engine.add(ast, ty, Op::Neg, vec![a]))
    })
}

pub fn mul(a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let (ty, numbers) = engine.numbers(&[a, b])?;
        Ok(match numbers {
            Numbers::Int(items) => {
                let refs: Vec<_> = items.iter().collect();
                engine.add(Int::mul(engine.z3, &refs), ty, Op::Product, vec![a, b])
            }
            Numbers::Real(items) => {
                let refs: Vec<_> = items.iter().collect();
                engine.add(Real::mul(engine.z3, &refs), ty, Op::Product, vec![a, b])
            }
        })
    })
}

fn arith_cmp(cmp: Cmp, a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let (_, numbers) = engine.numbers(&[a, b])?;
        let ast = match numbers {
            Numbers::Int(items) => match cmp {
                Cmp::Lt => items[0].lt(&items[1]),
                Cmp::Le => items[0].le(&items[1]),
                Cmp::Gt => items[0].gt(&items[1]),
                Cmp::Ge => items[0].ge(&items[1]),
            },
            Numbers::Real(items) => match cmp {
                Cmp::Lt => items[0].lt(&items[1]),
                Cmp::Le => items[0].le(&items[1]),
                Cmp::Gt => items[0].gt(&items[1]),
                Cmp::Ge => items[0].ge(&items[1]),
            },
        };
        Ok(engine.add(ast, TypeTable::bool_type(), Op::ArithCmp(cmp), vec![a, b]))
    })
}

pub fn arith_lt(a: TermId, b: TermId) -> TermId {
    arith_cmp(Cmp::Lt, a, b)
}

pub fn arith_le(a: TermId, b: TermId) -> TermId {
    arith_cmp(Cmp::Le, a, b)
}

pub fn arith_gt(a: TermId, b: TermId) -> TermId {
    arith_cmp(Cmp::Gt, a, b)
}

pub fn arith_ge(a: TermId, b: TermId) -> TermId {
    arith_cmp(Cmp::Ge, a, b)
}

fn bv_arith(op: BvOp, a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let (ty, x, y) = engine.check_same_bv(a, b)?;
        let ast = match op {
            BvOp::Add => x.bvadd(&y),
            BvOp::Sub => x.bvsub(&y),
            BvOp::Mul => x.bvmul(&y),
        };
        Ok(engine.add(ast, ty, Op::BvArith(op), vec![a, b]))
    })
}

pub fn bv_add(a: TermId, b: TermId) -> TermId {
    bv_arith(BvOp::Add, a, b)
}

pub fn bv_sub(a: TermId, b: TermId) -> TermId {
    bv_arith(BvOp::Sub, a, b)
}

pub fn bv_mul(a: TermId, b: TermId) -> TermId {
    bv_arith(BvOp::Mul, a, b)
}

fn bv_cmp(cmp: Cmp, a: TermId, b: TermId) -> TermId {
    build(|engine| {
        let (_, x, y) = engine.check_same_bv(a, b)?;
        let ast = match cmp {
            Cmp::Lt => x.bvult(&y),
            Cmp::Le => x.bvule(&y),
            Cmp::Gt => x.bvugt(&y),
            Cmp::Ge => x.bvuge(&y),
        };
        Ok(engine.add(ast, TypeTable::bool_type(), Op::BvCmp(cmp), vec![a, b]))
    })
}

/// Unsigned `a < b`.
pub fn bv_lt(a: TermId, b: TermId) -> TermId {
    bv_cmp(Cmp::Lt, a, b)
}

pub fn bv_le(a: TermId, b: TermId) -> TermId {
    bv_cmp(Cmp::Le, a, b)
}

pub fn bv_gt(a: TermId, b: TermId) -> TermId {
    bv_cmp(Cmp::Gt, a, b)
}

pub fn bv_ge(a: TermId, b: TermId) -> TermId {
    bv_cmp(Cmp::Ge, a, b)
}

pub fn tuple(args: &[TermId]) -> TermId {
    build(|engine| {
        if args.is_empty() {
            return Err(Failure::new(
                ErrorCode::WrongNumberOfArguments,
                "tuples need at least one component",
            ));
        }
        let mut item_types = Vec::with_capacity(args.len());
        let mut items = Vec::with_capacity(args.len());
        for arg in args {
            item_types.push(engine.type_of(*arg)?);
            items.push(engine.terms.ast(*arg)?.clone());
        }
        let ty = engine.types.intern(engine.z3, TypeDesc::Tuple(item_types));
        let refs: Vec<&dyn Ast<'static>> = items.iter().map(|it| it as &dyn Ast<'static>).collect();
        let ast = engine
            .types
            .tuple_constructor(ty)
            .map(|it| it.apply(&refs))
            .ok_or_else(|| Failure::new(ErrorCode::Internal, "missing tuple constructor"))?;
        Ok(engine.add(ast, ty, Op::Tuple, args.to_vec()))
    })
}

/// The `index`-th component of a tuple term. Components are numbered from `1`.
pub fn select(index: u32, tuple: TermId) -> TermId {
    build(|engine| {
        let ty = engine.type_of(tuple)?;
        let items = match engine.types.get(ty)? {
            TypeDesc::Tuple(items) => items,
            _ => {
                return Err(Failure::new(
                    ErrorCode::TypeMismatch,
                    format!("term {tuple} is not a tuple"),
                ))
            }
        };
        if index == 0 || index as usize > items.len() {
            return Err(Failure::new(
                ErrorCode::InvalidTupleIndex,
                format!("tuple index {index} out of range"),
            ));
        }
        let item = items[index as usize - 1];
        let value = engine.terms.ast(tuple)?;
        let ast = engine
            .types
            .tuple_accessor(ty, index as usize - 1)
            .map(|it| it.apply(&[value]))
            .ok_or_else(|| Failure::new(ErrorCode::Internal, "missing tuple accessor"))?;
        Ok(engine.add(ast, item, Op::Select(index), vec![tuple]))
    })
}

/// Application of a function term to arguments of matching types.
pub fn application(function: TermId, args: &[TermId]) -> TermId {
    build(|engine| {
        let ty = engine.type_of(function)?;
        let (domain, range) = match engine.types.get(ty)? {
            TypeDesc::Function { domain, range } => (domain.clone(), *range),
            _ => {
                return Err(Failure::new(
                    ErrorCode::TypeMismatch,
                    format!("term {function} is not a function"),
                ))
            }
        };
        if domain.len() != args.len() {
            return Err(Failure::new(
                ErrorCode::WrongNumberOfArguments,
                format!("expected {} arguments, got {}", domain.len(), args.len()),
            ));
        }
        let mut items = Vec::with_capacity(args.len());
        for (arg, expected) in args.iter().zip(&domain) {
            let actual = engine.type_of(*arg)?;
            if !engine.types.is_subtype(actual, *expected) {
                return Err(Failure::new(
                    ErrorCode::TypeMismatch,
                    format!("argument {arg} has the wrong type"),
                ));
            }
            items.push(engine.coerced(*arg, *expected)?);
        }
        let refs: Vec<&dyn Ast<'static>> = items.iter().map(|it| it as &dyn Ast<'static>).collect();
        let ast = engine
            .terms
            .entry(function)
            .function()
            .map(|it| it.apply(&refs))
            .ok_or_else(|| internal(function))?;
        let mut children = Vec::with_capacity(args.len() + 1);
        children.push(function);
        children.extend_from_slice(args);
        Ok(engine.add(ast, range, Op::Apply, children))
    })
}

/// Bind `name` to `term`. A name can be rebound; the first name given to a term
/// stays its printing name.
pub fn set_term_name(term: TermId, name: &str) -> i32 {
    with_engine(|engine| {
        let terms = &mut engine.terms;
        if let Err(failure) = terms.get(term) {
            return failure.report();
        }
        if name.is_empty() {
            return Failure::new(ErrorCode::InvalidOperation, "empty term name").report();
        }
        terms.names.insert(name.to_string(), term);
        terms
            .term_names
            .entry(term)
            .or_insert_with(|| name.to_string());
        0
    })
}

/// Term bound to `name`, or `NULL_TERM` (without reporting an error).
pub fn get_term_by_name(name: &str) -> TermId {
    with_engine(|engine| engine.terms.names.get(name).copied().unwrap_or(NULL_TERM))
}

pub fn get_term_name(term: TermId) -> Option<String> {
    with_engine(|engine| engine.terms.name_of(term).map(|it| it.to_string()))
}

/// Remove the binding of `name`. Unknown names are ignored.
pub fn remove_term_name(name: &str) {
    with_engine(|engine| {
        let terms = &mut engine.terms;
        if let Some(term) = terms.names.remove(name) {
            if terms.term_names.get(&term).map(|it| it == name).unwrap_or(false) {
                terms.term_names.remove(&term);
            }
        }
    })
}

pub fn term_type(term: TermId) -> TypeId {
    with_engine(|engine| match engine.terms.get(term) {
        Ok(entry) => entry.ty,
        Err(failure) => {
            failure.report();
            NULL_TYPE
        }
    })
}

pub fn term_to_string(term: TermId) -> Option<String> {
    with_engine(|engine| match engine.terms.get(term) {
        Ok(_) => Some(engine.terms.to_string(term)),
        Err(failure) => {
            failure.report();
            None
        }
    })
}
