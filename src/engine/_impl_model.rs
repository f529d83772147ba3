use crate::engine::_impl_error_report::{ErrorCode, Failure};
use crate::engine::_impl_numerals::{is_algebraic, parse_bv, parse_rational};
use crate::engine::{
    fresh_handle, with_engine, Engine, ModelRecord, Op, RawHandle, RawNode, TermId, TermTable,
    TypeDesc, TypeId, TypeTable, ValueNode, NULL_HANDLE, NULL_TERM, STATUS_SAT, TAG_ALGEBRAIC,
    TAG_BOOL, TAG_BV, TAG_FUNCTION, TAG_MAPPING, TAG_RATIONAL, TAG_SCALAR, TAG_TUPLE,
};
use fxhash::FxHashSet;
use num_rational::BigRational;
use num_traits::ToPrimitive;
use std::fmt::Write as _;
use z3::ast::{Ast, Dynamic};
use z3::{FuncDecl, Model, SatResult, Solver};

impl ValueNode {
    fn tag(&self) -> i32 {
        match self {
            ValueNode::Bool(_) => TAG_BOOL,
            ValueNode::Rational(_) => TAG_RATIONAL,
            ValueNode::Algebraic(_) => TAG_ALGEBRAIC,
            ValueNode::Bv(_) => TAG_BV,
            ValueNode::Scalar { .. } => TAG_SCALAR,
            ValueNode::Tuple(_) => TAG_TUPLE,
            ValueNode::Function { .. } => TAG_FUNCTION,
            ValueNode::Mapping { .. } => TAG_MAPPING,
        }
    }
}

fn unknown_value(term: TermId) -> Failure {
    Failure::new(
        ErrorCode::EvalUnknownTerm,
        format!("term {term} has no value in this model"),
    )
}

impl ModelRecord {
    fn new(model: Model<'static>, symbols: Vec<TermId>) -> ModelRecord {
        ModelRecord {
            model,
            symbols,
            nodes: Vec::new(),
            node_index: Default::default(),
        }
    }

    fn intern(&mut self, node: ValueNode) -> RawNode {
        let tag = node.tag();
        if let Some(id) = self.node_index.get(&node) {
            return RawNode { tag, id: *id };
        }
        let id = self.nodes.len() as i32;
        self.nodes.push(node.clone());
        self.node_index.insert(node, id);
        RawNode { tag, id }
    }

    pub(crate) fn node(&self, node: RawNode) -> Result<&ValueNode, Failure> {
        let found = if node.id >= 0 {
            self.nodes.get(node.id as usize)
        } else {
            None
        };
        match found {
            Some(it) if it.tag() == node.tag => Ok(it),
            _ => Err(Failure::new(
                ErrorCode::InvalidValueNode,
                format!("invalid value node <{}: {}>", node.tag, node.id),
            )),
        }
    }

    /// The value Z3 assigns to a non-function term, without completing the model:
    /// terms over symbols the model does not define stay symbolic.
    pub(crate) fn evaluate(&self, terms: &TermTable, term: TermId) -> Result<Dynamic<'static>, Failure> {
        let ast = terms.ast(term)?;
        self.model.eval(ast, false).ok_or_else(|| unknown_value(term))
    }

    /// The truth value of a formula in this model.
    pub(crate) fn truth(&self, terms: &TermTable, term: TermId) -> Result<bool, Failure> {
        self.evaluate(terms, term)?
            .as_bool()
            .and_then(|it| it.as_bool())
            .ok_or_else(|| unknown_value(term))
    }

    /// Decode a value of type `ty` into the value DAG; `None` if `value` is not a
    /// constant of that type.
    fn decode(&mut self, types: &TypeTable, ty: TypeId, value: &Dynamic<'static>) -> Option<RawNode> {
        let node = match types.desc(ty) {
            TypeDesc::Bool => ValueNode::Bool(value.as_bool()?.as_bool()?),
            TypeDesc::Int | TypeDesc::Real => {
                let text = value.to_string();
                if is_algebraic(&text) {
                    ValueNode::Algebraic(text)
                } else {
                    ValueNode::Rational(parse_rational(&text)?)
                }
            }
            TypeDesc::BitVector(width) => ValueNode::Bv(parse_bv(&value.to_string(), *width)?),
            TypeDesc::Scalar { card, .. } => {
                let index = (0..*card).find(|index| {
                    types
                        .scalar_constant(ty, *index)
                        .map(|it| &it.apply(&[]) == value)
                        .unwrap_or(false)
                })?;
                ValueNode::Scalar { ty, index }
            }
            TypeDesc::Tuple(items) => {
                let mut nodes = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let field = types.tuple_accessor(ty, i)?.apply(&[value as &dyn Ast]);
                    let field = self.model.eval(&field, false)?;
                    nodes.push(self.decode(types, *item, &field)?);
                }
                ValueNode::Tuple(nodes)
            }
            TypeDesc::Function { .. } => return None,
        };
        Some(self.intern(node))
    }

    /// Decode the interpretation of a function symbol. Entries which map to the default
    /// value are left out.
    fn decode_function(
        &mut self,
        types: &TypeTable,
        term: TermId,
        ty: TypeId,
        decl: &FuncDecl<'static>,
    ) -> Result<RawNode, Failure> {
        let (domain, range) = match types.desc(ty) {
            TypeDesc::Function { domain, range } => (domain.clone(), *range),
            _ => return Err(unknown_value(term)),
        };
        let interpretation = self
            .model
            .get_func_interp(decl)
            .ok_or_else(|| unknown_value(term))?;
        let default = self
            .decode(types, range, &interpretation.get_else())
            .ok_or_else(|| {
                Failure::new(
                    ErrorCode::EvalNotSupported,
                    format!("the default value of function {term} is not a constant"),
                )
            })?;
        let mut mappings = Vec::new();
        for entry in interpretation.get_entries() {
            let result = self
                .decode(types, range, &entry.get_value())
                .ok_or_else(|| unknown_value(term))?;
            if result == default {
                continue;
            }
            let mut args = Vec::with_capacity(domain.len());
            for (arg, arg_type) in entry.get_args().iter().zip(&domain) {
                args.push(self.decode(types, *arg_type, arg).ok_or_else(|| unknown_value(term))?);
            }
            mappings.push(self.intern(ValueNode::Mapping { args, result }));
        }
        Ok(self.intern(ValueNode::Function {
            ty,
            default,
            mappings,
        }))
    }

    /// The value of `term` as a node of the value DAG.
    pub(crate) fn value(
        &mut self,
        types: &TypeTable,
        terms: &TermTable,
        term: TermId,
    ) -> Result<RawNode, Failure> {
        let entry = terms.get(term)?;
        if let Some(decl) = entry.function() {
            return self.decode_function(types, term, entry.ty(), decl);
        }
        let value = self.evaluate(terms, term)?;
        self.decode(types, entry.ty(), &value)
            .ok_or_else(|| unknown_value(term))
    }

    fn render(&self, types: &TypeTable, node: RawNode) -> String {
        match self.node(node) {
            Ok(ValueNode::Bool(b)) => b.to_string(),
            Ok(ValueNode::Rational(r)) => r.to_string(),
            Ok(ValueNode::Algebraic(text)) => text.clone(),
            Ok(ValueNode::Bv(bits)) => {
                let bits: String = bits.iter().rev().map(|it| if *it { '1' } else { '0' }).collect();
                format!("#b{bits}")
            }
            Ok(ValueNode::Scalar { ty, index }) => match types.desc(*ty) {
                TypeDesc::Scalar { uid, .. } => format!("s!{uid}!{index}"),
                _ => format!("s!?!{index}"),
            },
            Ok(ValueNode::Tuple(items)) => {
                let items: Vec<String> = items.iter().map(|it| self.render(types, *it)).collect();
                format!("(mk-tuple {})", items.join(" "))
            }
            Ok(ValueNode::Function { .. }) | Ok(ValueNode::Mapping { .. }) | Err(_) => {
                "?".to_string()
            }
        }
    }
}

impl Engine {
    pub(crate) fn model(&self, handle: RawHandle) -> Result<&ModelRecord, Failure> {
        self.models.get(&handle).ok_or_else(|| invalid_model(handle))
    }
}

fn invalid_model(handle: RawHandle) -> Failure {
    Failure::new(
        ErrorCode::InvalidHandle,
        format!("invalid model handle {handle} (unknown on this thread)"),
    )
}

/// **(internal)** Run `action` on a model record together with the type and term tables.
fn with_model<F, R>(handle: RawHandle, action: F) -> Result<R, Failure>
where
    F: FnOnce(&mut ModelRecord, &TypeTable, &TermTable) -> Result<R, Failure>,
{
    with_engine(|engine| {
        let Engine {
            models,
            types,
            terms,
            ..
        } = engine;
        let record = models.get_mut(&handle).ok_or_else(|| invalid_model(handle))?;
        action(record, types, terms)
    })
}

fn register(engine: &mut Engine, record: ModelRecord) -> RawHandle {
    let handle = fresh_handle();
    engine.models.insert(handle, record);
    handle
}

fn code(result: Result<(), Failure>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(failure) => failure.report(),
    }
}

/// Build a model of the last satisfiable check of `ctx`.
/// Returns `NULL_HANDLE` if the context status is not `Sat`.
pub fn get_model(ctx: RawHandle) -> RawHandle {
    let result = with_engine(|engine| {
        let record = engine.context(ctx)?;
        if record.status() != STATUS_SAT {
            return Err(Failure::new(
                ErrorCode::InvalidOperation,
                "the context has no model",
            ));
        }
        let model = record.solver().get_model().ok_or_else(|| {
            Failure::new(ErrorCode::Internal, "the solver did not produce a model")
        })?;
        let symbols = engine.terms.symbols(&record.assertions());
        Ok(register(engine, ModelRecord::new(model, symbols)))
    });
    match result {
        Ok(handle) => handle,
        Err(failure) => {
            failure.report();
            NULL_HANDLE
        }
    }
}

/// Build a model which maps each of `symbols` to the value of the matching constant term.
pub fn model_from_map(symbols: &[TermId], constants: &[TermId]) -> RawHandle {
    let result = with_engine(|engine| {
        if symbols.len() != constants.len() {
            return Err(Failure::new(
                ErrorCode::WrongNumberOfArguments,
                "symbols and values differ in length",
            ));
        }
        let solver = Solver::new(engine.z3);
        let mut seen = FxHashSet::default();
        for (symbol, constant) in symbols.iter().zip(constants) {
            let symbol_entry = engine.terms.get(*symbol)?;
            let constant_entry = engine.terms.get(*constant)?;
            if symbol_entry.op() != Op::Symbol || symbol_entry.ast().is_none() {
                return Err(Failure::new(
                    ErrorCode::InvalidTerm,
                    format!("term {symbol} is not an uninterpreted constant"),
                ));
            }
            if !constant_entry.features().ground {
                return Err(Failure::new(
                    ErrorCode::EvalUnknownTerm,
                    format!("term {constant} is not a constant"),
                ));
            }
            if !engine.types.is_subtype(constant_entry.ty(), symbol_entry.ty()) {
                return Err(Failure::new(
                    ErrorCode::TypeMismatch,
                    format!("term {constant} does not match the type of {symbol}"),
                ));
            }
            if !seen.insert(*symbol) {
                return Err(Failure::new(
                    ErrorCode::InvalidOperation,
                    format!("symbol {symbol} is mapped twice"),
                ));
            }
            let value = engine.coerced(*constant, symbol_entry.ty())?;
            solver.assert(&engine.terms.ast(*symbol)?._eq(&value));
        }
        let model = match solver.check() {
            SatResult::Sat => solver.get_model(),
            _ => None,
        };
        let model = model.ok_or_else(|| {
            Failure::new(ErrorCode::Internal, "the value map has no model")
        })?;
        Ok(register(engine, ModelRecord::new(model, symbols.to_vec())))
    });
    match result {
        Ok(handle) => handle,
        Err(failure) => {
            failure.report();
            NULL_HANDLE
        }
    }
}

/// Release a model. Unknown handles are ignored.
pub fn free_model(handle: RawHandle) {
    with_engine(|engine| engine.models.remove(&handle));
}

/// Pretty-print a model, one symbol per line (function symbols span several lines).
/// Symbols without a value in the model are left out.
pub fn model_to_string(handle: RawHandle) -> Option<String> {
    let result = with_model(handle, |record, types, terms| {
        let mut out = String::new();
        for symbol in record.symbols.clone() {
            let name = terms
                .name_of(symbol)
                .map(|it| it.to_string())
                .unwrap_or_else(|| format!("t!{symbol}"));
            let node = match record.value(types, terms, symbol) {
                Ok(node) => node,
                Err(_) => continue,
            };
            match record.node(node)?.clone() {
                ValueNode::Function {
                    ty,
                    default,
                    mappings,
                } => {
                    let _ = writeln!(out, "(function {name}");
                    let _ = writeln!(out, " (type {})", types.to_string(ty));
                    for mapping in mappings {
                        if let ValueNode::Mapping { args, result } = record.node(mapping)? {
                            let args: Vec<String> =
                                args.iter().map(|it| record.render(types, *it)).collect();
                            let _ = writeln!(
                                out,
                                " (= ({} {}) {})",
                                name,
                                args.join(" "),
                                record.render(types, *result)
                            );
                        }
                    }
                    let _ = writeln!(out, " (default {}))", record.render(types, default));
                }
                _ => {
                    let _ = writeln!(out, "(= {} {})", name, record.render(types, node));
                }
            }
        }
        Ok(out)
    });
    match result {
        Ok(text) => Some(text),
        Err(failure) => {
            failure.report();
            None
        }
    }
}

/// Value of `term` as a node of the model's value DAG.
pub fn get_value(handle: RawHandle, term: TermId, out: &mut RawNode) -> i32 {
    code(with_model(handle, |record, types, terms| {
        *out = record.value(types, terms, term)?;
        Ok(())
    }))
}

/// Evaluate `term`, which must have a type accepted by `expected`, and project its value
/// with `project`; `what` names the expected kind.
fn extract<T>(
    handle: RawHandle,
    term: TermId,
    what: &str,
    expected: impl FnOnce(&TypeDesc) -> bool,
    project: impl FnOnce(&ValueNode) -> Option<T>,
) -> Result<T, Failure> {
    let conversion = || {
        Failure::new(
            ErrorCode::EvalConversionFailed,
            format!("the value of term {term} is not a {what}"),
        )
    };
    with_model(handle, |record, types, terms| {
        let ty = terms.get(term)?.ty();
        if !expected(types.desc(ty)) {
            return Err(conversion());
        }
        let node = record.value(types, terms, term)?;
        project(record.node(node)?).ok_or_else(conversion)
    })
}

pub fn get_bool_value(handle: RawHandle, term: TermId, out: &mut bool) -> i32 {
    let value = extract(
        handle,
        term,
        "Boolean",
        |ty| matches!(ty, TypeDesc::Bool),
        |node| match node {
            ValueNode::Bool(b) => Some(*b),
            _ => None,
        },
    );
    code(value.map(|it| *out = it))
}

pub fn get_rational_value(handle: RawHandle, term: TermId, out: &mut BigRational) -> i32 {
    let value = extract(
        handle,
        term,
        "rational",
        |ty| matches!(ty, TypeDesc::Int | TypeDesc::Real),
        |node| match node {
            ValueNode::Rational(r) => Some(r.clone()),
            _ => None,
        },
    );
    code(value.map(|it| *out = it))
}

/// Bits of a bit-vector value, least significant bit first.
pub fn get_bv_value(handle: RawHandle, term: TermId, out: &mut Vec<bool>) -> i32 {
    let value = extract(
        handle,
        term,
        "bit-vector",
        |ty| matches!(ty, TypeDesc::BitVector(_)),
        |node| match node {
            ValueNode::Bv(bits) => Some(bits.clone()),
            _ => None,
        },
    );
    code(value.map(|it| *out = it))
}

/// Index of a scalar value within its type.
pub fn get_scalar_value(handle: RawHandle, term: TermId, out: &mut i32) -> i32 {
    let value = extract(
        handle,
        term,
        "scalar",
        |ty| matches!(ty, TypeDesc::Scalar { .. }),
        |node| match node {
            ValueNode::Scalar { index, .. } => Some(*index as i32),
            _ => None,
        },
    );
    code(value.map(|it| *out = it))
}

/// The constant term denoting the value of `term` in the model.
pub fn value_as_term(handle: RawHandle, term: TermId) -> TermId {
    let result = with_engine(|engine| {
        let entry = engine.terms.get(term)?;
        if entry.function().is_some() {
            return Err(Failure::new(
                ErrorCode::EvalConversionFailed,
                "function values cannot be converted to terms",
            ));
        }
        let ty = entry.ty();
        let value = {
            let Engine {
                models,
                types,
                terms,
                ..
            } = &mut *engine;
            let record = models.get_mut(&handle).ok_or_else(|| invalid_model(handle))?;
            record.value(types, terms, term)?;
            record.evaluate(terms, term)?
        };
        Ok(engine.mk_value(value, ty))
    });
    match result {
        Ok(term) => term,
        Err(failure) => {
            failure.report();
            NULL_TERM
        }
    }
}

/// **(internal)** Resolve a value node of a model and run `action` on it.
fn with_node<T>(
    handle: RawHandle,
    node: RawNode,
    action: impl FnOnce(&ValueNode, &TypeTable) -> Result<T, Failure>,
) -> Result<T, Failure> {
    with_model(handle, |record, types, _| action(record.node(node)?, types))
}

fn wrong_node(expected: &str) -> Failure {
    Failure::new(
        ErrorCode::TypeMismatch,
        format!("the value node is not a {expected} node"),
    )
}

fn count(result: Result<i32, Failure>) -> i32 {
    match result {
        Ok(result) => result,
        Err(failure) => failure.report(),
    }
}

/// `1` if the node is an integral rational, `0` if it is not, negative on error.
pub fn val_is_int(handle: RawHandle, node: RawNode) -> i32 {
    count(with_node(handle, node, |it, _| {
        Ok(i32::from(matches!(it, ValueNode::Rational(r) if r.is_integer())))
    }))
}

/// `1` if the node is an integer which fits into `i64`, `0` if not, negative on error.
pub fn val_is_long(handle: RawHandle, node: RawNode) -> i32 {
    count(with_node(handle, node, |it, _| {
        Ok(i32::from(matches!(
            it,
            ValueNode::Rational(r) if r.is_integer() && r.to_integer().to_i64().is_some()
        )))
    }))
}

/// Width of a bit-vector node, `0` for other nodes, negative on error.
pub fn val_bitsize(handle: RawHandle, node: RawNode) -> i32 {
    count(with_node(handle, node, |it, _| {
        Ok(match it {
            ValueNode::Bv(bits) => bits.len() as i32,
            _ => 0,
        })
    }))
}

/// Number of components of a tuple node, `0` for other nodes, negative on error.
pub fn val_tuple_arity(handle: RawHandle, node: RawNode) -> i32 {
    count(with_node(handle, node, |it, _| {
        Ok(match it {
            ValueNode::Tuple(items) => items.len() as i32,
            _ => 0,
        })
    }))
}

/// Number of arguments of a mapping node, `0` for other nodes, negative on error.
pub fn val_mapping_arity(handle: RawHandle, node: RawNode) -> i32 {
    count(with_node(handle, node, |it, _| {
        Ok(match it {
            ValueNode::Mapping { args, .. } => args.len() as i32,
            _ => 0,
        })
    }))
}

/// Arity of the function type of a function node, `0` for other nodes,
/// negative on error.
pub fn val_function_arity(handle: RawHandle, node: RawNode) -> i32 {
    count(with_node(handle, node, |it, types| {
        Ok(match it {
            ValueNode::Function { ty, .. } => match types.desc(*ty) {
                TypeDesc::Function { domain, .. } => domain.len() as i32,
                _ => 0,
            },
            _ => 0,
        })
    }))
}

pub fn val_expand_tuple(handle: RawHandle, node: RawNode, out: &mut Vec<RawNode>) -> i32 {
    code(with_node(handle, node, |it, _| match it {
        ValueNode::Tuple(items) => {
            out.extend_from_slice(items);
            Ok(())
        }
        _ => Err(wrong_node("tuple")),
    }))
}

pub fn val_expand_mapping(
    handle: RawHandle,
    node: RawNode,
    args: &mut Vec<RawNode>,
    result: &mut RawNode,
) -> i32 {
    code(with_node(handle, node, |it, _| match it {
        ValueNode::Mapping {
            args: items,
            result: value,
        } => {
            args.extend_from_slice(items);
            *result = *value;
            Ok(())
        }
        _ => Err(wrong_node("mapping")),
    }))
}

/// Mapping nodes and default value of a function node.
pub fn val_expand_function(
    handle: RawHandle,
    node: RawNode,
    default: &mut RawNode,
    mappings: &mut Vec<RawNode>,
) -> i32 {
    code(with_node(handle, node, |it, _| match it {
        ValueNode::Function {
            mappings: items,
            default: value,
            ..
        } => {
            mappings.extend_from_slice(items);
            *default = *value;
            Ok(())
        }
        _ => Err(wrong_node("function")),
    }))
}

pub fn val_get_bool(handle: RawHandle, node: RawNode, out: &mut bool) -> i32 {
    code(with_node(handle, node, |it, _| match it {
        ValueNode::Bool(b) => {
            *out = *b;
            Ok(())
        }
        _ => Err(wrong_node("Boolean")),
    }))
}

pub fn val_get_rational(handle: RawHandle, node: RawNode, out: &mut BigRational) -> i32 {
    code(with_node(handle, node, |it, _| match it {
        ValueNode::Rational(r) => {
            *out = r.clone();
            Ok(())
        }
        _ => Err(wrong_node("rational")),
    }))
}

/// Bits of a bit-vector node, least significant bit first.
pub fn val_get_bv(handle: RawHandle, node: RawNode, out: &mut Vec<bool>) -> i32 {
    code(with_node(handle, node, |it, _| match it {
        ValueNode::Bv(bits) => {
            *out = bits.clone();
            Ok(())
        }
        _ => Err(wrong_node("bit-vector")),
    }))
}

/// Index and type of a scalar node.
pub fn val_get_scalar(
    handle: RawHandle,
    node: RawNode,
    index: &mut i32,
    ty: &mut TypeId,
) -> i32 {
    code(with_node(handle, node, |it, _| match it {
        ValueNode::Scalar {
            ty: scalar_type,
            index: value,
        } => {
            *index = *value as i32;
            *ty = *scalar_type;
            Ok(())
        }
        _ => Err(wrong_node("scalar")),
    }))
}
