use crate::engine::_impl_error_report::{ErrorCode, Failure};
use crate::engine::_impl_numerals::parse_rational;
use crate::engine::{
    with_engine, Engine, ModelRecord, Op, RawHandle, TermId, TermTable, TypeTable,
};
use fxhash::FxHashSet;
use num_traits::Zero;

/// **(internal)** Collects the literals of an implicant.
struct Implicant<'a> {
    record: &'a ModelRecord,
    terms: &'a TermTable,
    literals: Vec<(TermId, bool)>,
    seen: FxHashSet<(TermId, bool)>,
}

impl Implicant<'_> {
    fn truth(&self, term: TermId) -> Result<bool, Failure> {
        self.record.truth(self.terms, term)
    }

    /// Add literals which force `term` to have the value `polarity` (which it has).
    fn explain(&mut self, term: TermId, polarity: bool) -> Result<(), Failure> {
        let terms = self.terms;
        let entry = terms.get(term)?;
        let args = entry.children();
        match entry.op() {
            Op::Constant => {}
            Op::Not => self.explain(args[0], !polarity)?,
            op @ (Op::And | Op::Or) => {
                if polarity == (op == Op::And) {
                    // Every argument has the same value as the whole term.
                    for arg in args {
                        self.explain(*arg, polarity)?;
                    }
                } else {
                    // One witness argument decides the whole term.
                    for arg in args {
                        if self.truth(*arg)? == polarity {
                            return self.explain(*arg, polarity);
                        }
                    }
                }
            }
            Op::Implies => {
                if polarity {
                    if !self.truth(args[0])? {
                        self.explain(args[0], false)?;
                    } else {
                        self.explain(args[1], true)?;
                    }
                } else {
                    self.explain(args[0], true)?;
                    self.explain(args[1], false)?;
                }
            }
            Op::Eq if terms.entry(args[0]).ty() == TypeTable::bool_type() => {
                for arg in args {
                    let value = self.truth(*arg)?;
                    self.explain(*arg, value)?;
                }
            }
            Op::Xor => {
                for arg in args {
                    let value = self.truth(*arg)?;
                    self.explain(*arg, value)?;
                }
            }
            Op::Ite if entry.ty() == TypeTable::bool_type() => {
                let condition = self.truth(args[0])?;
                self.explain(args[0], condition)?;
                self.explain(if condition { args[1] } else { args[2] }, polarity)?;
            }
            _ => {
                if self.seen.insert((term, polarity)) {
                    self.literals.push((term, polarity));
                }
            }
        }
        Ok(())
    }
}

/// Compute literals (atoms or negated atoms) that are true in the model and whose
/// conjunction implies all of `formulas`. Fails with `EvalFormulaFalse` if some formula
/// is false in the model.
pub fn get_implicant(handle: RawHandle, formulas: &[TermId], out: &mut Vec<TermId>) -> i32 {
    let result = with_engine(|engine| {
        let literals = {
            let record = engine.model(handle)?;
            for formula in formulas {
                if engine.terms.get(*formula)?.ty() != TypeTable::bool_type() {
                    return Err(Failure::new(
                        ErrorCode::TypeMismatch,
                        format!("term {formula} is not a formula"),
                    ));
                }
            }
            let mut implicant = Implicant {
                record,
                terms: &engine.terms,
                literals: Vec::new(),
                seen: FxHashSet::default(),
            };
            for formula in formulas {
                if !implicant.truth(*formula)? {
                    return Err(Failure::new(
                        ErrorCode::EvalFormulaFalse,
                        format!("formula {formula} is false in the model"),
                    ));
                }
                implicant.explain(*formula, true)?;
            }
            implicant.literals
        };
        let mut result = Vec::with_capacity(literals.len());
        for (atom, polarity) in literals {
            result.push(if polarity {
                atom
            } else {
                engine.mk_not(atom)?
            });
        }
        Ok(result)
    });
    match result {
        Ok(literals) => {
            out.extend(literals);
            0
        }
        Err(failure) => failure.report(),
    }
}

/// **(internal)** Collects the support of a set of terms.
struct Support<'a> {
    record: &'a ModelRecord,
    terms: &'a TermTable,
    symbols: Vec<TermId>,
    visited: FxHashSet<TermId>,
}

impl Support<'_> {
    fn is_zero(&self, term: TermId) -> Result<bool, Failure> {
        let value = self.record.evaluate(self.terms, term)?;
        Ok(parse_rational(&value.to_string()).map_or(false, |it| it.is_zero()))
    }

    fn collect(&mut self, term: TermId) -> Result<(), Failure> {
        if !self.visited.insert(term) {
            return Ok(());
        }
        let terms = self.terms;
        let entry = terms.get(term)?;
        let args = entry.children();
        match entry.op() {
            Op::Symbol => self.symbols.push(term),
            Op::Ite => {
                self.collect(args[0])?;
                let condition = self.record.truth(terms, args[0])?;
                self.collect(if condition { args[1] } else { args[2] })?;
            }
            op @ (Op::And | Op::Or) => {
                let absorbing = op == Op::Or;
                let mut witness = None;
                for arg in args {
                    if self.record.truth(terms, *arg)? == absorbing {
                        witness = Some(*arg);
                        break;
                    }
                }
                match witness {
                    Some(arg) => self.collect(arg)?,
                    None => {
                        for arg in args {
                            self.collect(*arg)?;
                        }
                    }
                }
            }
            Op::Implies => {
                if !self.record.truth(terms, args[0])? {
                    self.collect(args[0])?;
                } else if self.record.truth(terms, args[1])? {
                    self.collect(args[1])?;
                } else {
                    self.collect(args[0])?;
                    self.collect(args[1])?;
                }
            }
            Op::Product => {
                let mut zero = None;
                for arg in args {
                    if self.is_zero(*arg)? {
                        zero = Some(*arg);
                        break;
                    }
                }
                match zero {
                    Some(arg) => self.collect(arg)?,
                    None => {
                        for arg in args {
                            self.collect(*arg)?;
                        }
                    }
                }
            }
            _ => {
                for child in args {
                    self.collect(*child)?;
                }
            }
        }
        Ok(())
    }
}

/// Compute the uninterpreted symbols whose values determine the values of `terms`
/// in the model. Branches of if-then-else terms that are not taken are skipped.
pub fn get_support(handle: RawHandle, terms: &[TermId], out: &mut Vec<TermId>) -> i32 {
    let result = with_engine(|engine: &mut Engine| {
        let record = engine.model(handle)?;
        for term in terms {
            engine.terms.get(*term)?;
        }
        let mut support = Support {
            record,
            terms: &engine.terms,
            symbols: Vec::new(),
            visited: FxHashSet::default(),
        };
        for term in terms {
            support.collect(*term)?;
        }
        Ok(support.symbols)
    });
    match result {
        Ok(symbols) => {
            out.extend(symbols);
            0
        }
        Err(failure) => failure.report(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        and, arith_gt, bool_const, bool_type, error_code, free_model, int64, int_type, ite,
        model_from_map, mul, new_uninterpreted_term, not, or, sum,
    };

    #[test]
    fn support_skips_the_branch_not_taken() {
        let x = new_uninterpreted_term(int_type());
        let y = new_uninterpreted_term(int_type());
        let z = new_uninterpreted_term(int_type());
        let term = ite(arith_gt(x, int64(0)), sum(&[x, z]), y);
        let model = model_from_map(&[x, y, z], &[int64(1), int64(2), int64(3)]);
        let mut support = Vec::new();
        assert_eq!(get_support(model, &[term], &mut support), 0);
        support.sort();
        let mut expected = vec![x, z];
        expected.sort();
        assert_eq!(support, expected);
        free_model(model);
    }

    #[test]
    fn support_of_a_product_with_a_zero_factor() {
        let x = new_uninterpreted_term(int_type());
        let y = new_uninterpreted_term(int_type());
        let model = model_from_map(&[x, y], &[int64(0), int64(5)]);
        let mut support = Vec::new();
        assert_eq!(get_support(model, &[mul(x, y)], &mut support), 0);
        assert_eq!(support, vec![x]);
        free_model(model);
    }

    #[test]
    fn implicant_picks_witnesses() {
        let p = new_uninterpreted_term(bool_type());
        let q = new_uninterpreted_term(bool_type());
        let r = new_uninterpreted_term(bool_type());
        let formula = and(&[or(&[p, q]), not(r)]);
        let model = model_from_map(
            &[p, q, r],
            &[bool_const(false), bool_const(true), bool_const(false)],
        );
        let mut literals = Vec::new();
        assert_eq!(get_implicant(model, &[formula], &mut literals), 0);
        assert_eq!(literals, vec![q, not(r)]);

        let mut ignored = Vec::new();
        assert!(get_implicant(model, &[p], &mut ignored) < 0);
        assert_eq!(error_code(), ErrorCode::EvalFormulaFalse);
        free_model(model);
    }
}
