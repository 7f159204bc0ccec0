//! Unification engine for Hindley-Milner inference.
//!
//! Union-find over type variables via `ena`'s table, with the occurs check,
//! level tracking for generalization, and scheme instantiation.
//!
//! Levels: every variable is created at the current `let`-nesting depth.
//! Unification only ever lowers levels -- binding a variable walks the
//! bound type and pulls every free variable down to the binding variable's
//! level, and unioning two variables gives the class the smaller level.
//! Generalization then quantifies exactly the variables whose level is
//! deeper than the current one.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use vibefun_common::Location;

use crate::error::TypeError;
use crate::ty::{Scheme, Type, TyVar};

/// The inference context: owns the unification table and level state.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
    /// Current let-nesting level for generalization.
    current_level: u32,
    /// Level at which each variable was created, indexed by `TyVar.0`.
    /// Only the root of each equivalence class is authoritative.
    var_levels: Vec<u32>,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            current_level: 0,
            var_levels: Vec::new(),
        }
    }

    // ── Type variable creation ──────────────────────────────────────────

    /// Create a fresh type variable at the current level.
    pub fn fresh_var(&mut self) -> Type {
        let var = self.table.new_key(None);
        while self.var_levels.len() <= var.0 as usize {
            self.var_levels.push(0);
        }
        self.var_levels[var.0 as usize] = self.current_level;
        Type::Var(var)
    }

    /// The level of a variable's equivalence class.
    pub fn level_of(&mut self, var: TyVar) -> u32 {
        let root = self.table.find(var);
        self.var_levels[root.0 as usize]
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// Resolve a type by following union-find indirection.
    ///
    /// Unbound variables normalize to their root key so variables in the
    /// same equivalence class resolve to the same representative; this is
    /// what makes generalization see unified-but-unbound vars as one.
    pub fn resolve(&mut self, ty: Type) -> Type {
        match ty {
            Type::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                None => Type::Var(self.table.find(v)),
            },
            Type::Fun(params, ret) => {
                let params = params.into_iter().map(|p| self.resolve(p)).collect();
                Type::Fun(params, Box::new(self.resolve(*ret)))
            }
            Type::App(ctor, args) => {
                let ctor = Box::new(self.resolve(*ctor));
                Type::App(ctor, args.into_iter().map(|a| self.resolve(a)).collect())
            }
            Type::Record(fields) => Type::Record(
                fields
                    .into_iter()
                    .map(|(name, ty)| (name, self.resolve(ty)))
                    .collect(),
            ),
            Type::Variant { name, args } => Type::Variant {
                name,
                args: args.into_iter().map(|a| self.resolve(a)).collect(),
            },
            Type::Union(alts) => {
                Type::Union(alts.into_iter().map(|a| self.resolve(a)).collect())
            }
            Type::Tuple(items) => {
                Type::Tuple(items.into_iter().map(|i| self.resolve(i)).collect())
            }
            other => other,
        }
    }

    // ── Occurs check ────────────────────────────────────────────────────

    /// Check whether `var` occurs anywhere inside `ty`, following bound
    /// variables. Prevents infinite types like `a ~ (a) -> Int`.
    pub fn occurs_in(&mut self, var: TyVar, ty: &Type) -> bool {
        match ty {
            Type::Var(v) => {
                if self.table.unioned(var, *v) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Type::Const(_) => false,
            Type::Fun(params, ret) => {
                params.iter().any(|p| self.occurs_in(var, p)) || self.occurs_in(var, ret)
            }
            Type::App(ctor, args) => {
                self.occurs_in(var, ctor) || args.iter().any(|a| self.occurs_in(var, a))
            }
            Type::Record(fields) => fields.values().any(|t| self.occurs_in(var, t)),
            Type::Variant { args, .. } => args.iter().any(|a| self.occurs_in(var, a)),
            Type::Union(alts) => alts.iter().any(|a| self.occurs_in(var, a)),
            Type::Tuple(items) => items.iter().any(|i| self.occurs_in(var, i)),
        }
    }

    // ── Level adjustment ────────────────────────────────────────────────

    /// Lower the level of every free variable in `ty` to at most `limit`.
    ///
    /// Called when a variable at level `limit` is bound to `ty`: a
    /// variable's level must strictly upper-bound the levels of the free
    /// variables of its substitution, and levels only ever move down.
    fn adjust_levels(&mut self, limit: u32, ty: &Type) {
        match ty {
            Type::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.adjust_levels(limit, &inner),
                None => {
                    let root = self.table.find(*v);
                    let level = &mut self.var_levels[root.0 as usize];
                    if *level > limit {
                        *level = limit;
                    }
                }
            },
            Type::Const(_) => {}
            Type::Fun(params, ret) => {
                for p in params {
                    self.adjust_levels(limit, p);
                }
                self.adjust_levels(limit, ret);
            }
            Type::App(ctor, args) => {
                self.adjust_levels(limit, ctor);
                for a in args {
                    self.adjust_levels(limit, a);
                }
            }
            Type::Record(fields) => {
                for ty in fields.values() {
                    self.adjust_levels(limit, ty);
                }
            }
            Type::Variant { args, .. } => {
                for a in args {
                    self.adjust_levels(limit, a);
                }
            }
            Type::Union(alts) => {
                for a in alts {
                    self.adjust_levels(limit, a);
                }
            }
            Type::Tuple(items) => {
                for i in items {
                    self.adjust_levels(limit, i);
                }
            }
        }
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two types, making them equal.
    ///
    /// Both sides are resolved through the union-find table, then compared
    /// structurally. Errors are returned, not recorded; the checker owns
    /// error collection so each failure is reported exactly once.
    pub fn unify(&mut self, a: Type, b: Type, loc: &Location) -> Result<(), TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (a, b) {
            (Type::Var(v1), Type::Var(v2)) if v1 == v2 => Ok(()),

            // Two unbound variables: union them; the class takes the
            // smaller level.
            (Type::Var(v1), Type::Var(v2)) => {
                let level = self.level_of(v1).min(self.level_of(v2));
                self.table
                    .unify_var_var(v1, v2)
                    .expect("unifying two unbound vars cannot fail");
                let root = self.table.find(v1);
                self.var_levels[root.0 as usize] = level;
                Ok(())
            }

            // Variable meets a concrete type: occurs check, pull levels
            // down, then bind.
            (Type::Var(v), ty) | (ty, Type::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    return Err(TypeError::InfiniteType { var: v, ty, loc: loc.clone() });
                }
                let limit = self.level_of(v);
                self.adjust_levels(limit, &ty);
                self.table
                    .unify_var_value(v, Some(ty))
                    .expect("binding after the occurs check cannot fail");
                Ok(())
            }

            (Type::Const(c1), Type::Const(c2)) => {
                if c1 == c2 {
                    Ok(())
                } else {
                    Err(TypeError::Mismatch {
                        expected: Type::Const(c1),
                        found: Type::Const(c2),
                        loc: loc.clone(),
                    })
                }
            }

            (Type::Fun(p1, r1), Type::Fun(p2, r2)) => {
                if p1.len() != p2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: p1.len(),
                        found: p2.len(),
                        loc: loc.clone(),
                    });
                }
                for (a, b) in p1.into_iter().zip(p2) {
                    self.unify(a, b, loc)?;
                }
                self.unify(*r1, *r2, loc)
            }

            (Type::App(c1, a1), Type::App(c2, a2)) => {
                self.unify(*c1, *c2, loc)?;
                if a1.len() != a2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: a1.len(),
                        found: a2.len(),
                        loc: loc.clone(),
                    });
                }
                for (a, b) in a1.into_iter().zip(a2) {
                    self.unify(a, b, loc)?;
                }
                Ok(())
            }

            // Records compare by field name; the sets must be identical.
            // Width subtyping is deliberately not implemented.
            (Type::Record(f1), Type::Record(f2)) => {
                let names1: Vec<&String> = f1.keys().collect();
                let names2: Vec<&String> = f2.keys().collect();
                if names1 != names2 {
                    return Err(TypeError::Mismatch {
                        expected: Type::Record(f1.clone()),
                        found: Type::Record(f2.clone()),
                        loc: loc.clone(),
                    });
                }
                for (name, a) in f1 {
                    let b = f2[&name].clone();
                    self.unify(a, b, loc)?;
                }
                Ok(())
            }

            // Variants are nominal: the declaration name is the identity.
            (
                Type::Variant { name: n1, args: a1 },
                Type::Variant { name: n2, args: a2 },
            ) => {
                if n1 != n2 {
                    return Err(TypeError::Mismatch {
                        expected: Type::Variant { name: n1, args: a1 },
                        found: Type::Variant { name: n2, args: a2 },
                        loc: loc.clone(),
                    });
                }
                if a1.len() != a2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: a1.len(),
                        found: a2.len(),
                        loc: loc.clone(),
                    });
                }
                for (a, b) in a1.into_iter().zip(a2) {
                    self.unify(a, b, loc)?;
                }
                Ok(())
            }

            (Type::Union(u1), Type::Union(u2)) => {
                if u1.len() != u2.len() {
                    return Err(TypeError::Mismatch {
                        expected: Type::Union(u1),
                        found: Type::Union(u2),
                        loc: loc.clone(),
                    });
                }
                for (a, b) in u1.into_iter().zip(u2) {
                    self.unify(a, b, loc)?;
                }
                Ok(())
            }

            (Type::Tuple(t1), Type::Tuple(t2)) => {
                if t1.len() != t2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: t1.len(),
                        found: t2.len(),
                        loc: loc.clone(),
                    });
                }
                for (a, b) in t1.into_iter().zip(t2) {
                    self.unify(a, b, loc)?;
                }
                Ok(())
            }

            (a, b) => Err(TypeError::Mismatch {
                expected: a,
                found: b,
                loc: loc.clone(),
            }),
        }
    }

    // ── Level management ────────────────────────────────────────────────

    /// Enter a new let-binding level.
    pub fn enter_level(&mut self) {
        self.current_level += 1;
    }

    /// Leave the current let-binding level.
    pub fn leave_level(&mut self) {
        debug_assert!(self.current_level > 0, "cannot leave level 0");
        self.current_level -= 1;
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    // ── Generalization ──────────────────────────────────────────────────

    /// Generalize a type into a polymorphic scheme, quantifying every
    /// variable whose level is strictly deeper than the current level.
    pub fn generalize(&mut self, ty: Type) -> Scheme {
        let resolved = self.resolve(ty);
        let mut vars = Vec::new();
        self.collect_generalizable(&resolved, &mut vars);
        let mut seen = std::collections::HashSet::new();
        vars.retain(|v| seen.insert(*v));
        Scheme { vars, ty: resolved }
    }

    fn collect_generalizable(&mut self, ty: &Type, out: &mut Vec<TyVar>) {
        match ty {
            Type::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.collect_generalizable(&inner, out),
                None => {
                    let root = self.table.find(*v);
                    if self.var_levels[root.0 as usize] > self.current_level {
                        out.push(root);
                    }
                }
            },
            Type::Const(_) => {}
            Type::Fun(params, ret) => {
                for p in params {
                    self.collect_generalizable(p, out);
                }
                self.collect_generalizable(ret, out);
            }
            Type::App(ctor, args) => {
                self.collect_generalizable(ctor, out);
                for a in args {
                    self.collect_generalizable(a, out);
                }
            }
            Type::Record(fields) => {
                for ty in fields.values() {
                    self.collect_generalizable(ty, out);
                }
            }
            Type::Variant { args, .. } => {
                for a in args {
                    self.collect_generalizable(a, out);
                }
            }
            Type::Union(alts) => {
                for a in alts {
                    self.collect_generalizable(a, out);
                }
            }
            Type::Tuple(items) => {
                for i in items {
                    self.collect_generalizable(i, out);
                }
            }
        }
    }

    // ── Instantiation ───────────────────────────────────────────────────

    /// Instantiate a scheme, replacing each quantified variable with a
    /// fresh variable at the current level.
    pub fn instantiate(&mut self, scheme: &Scheme) -> Type {
        if scheme.vars.is_empty() {
            return scheme.ty.clone();
        }
        let substitution: FxHashMap<TyVar, Type> = scheme
            .vars
            .iter()
            .map(|v| (*v, self.fresh_var()))
            .collect();
        self.apply_substitution(&scheme.ty, &substitution)
    }

    fn apply_substitution(&mut self, ty: &Type, subst: &FxHashMap<TyVar, Type>) -> Type {
        match ty {
            Type::Var(v) => {
                if let Some(replacement) = subst.get(v) {
                    return replacement.clone();
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.apply_substitution(&inner, subst),
                    None => ty.clone(),
                }
            }
            Type::Const(_) => ty.clone(),
            Type::Fun(params, ret) => Type::Fun(
                params.iter().map(|p| self.apply_substitution(p, subst)).collect(),
                Box::new(self.apply_substitution(ret, subst)),
            ),
            Type::App(ctor, args) => Type::App(
                Box::new(self.apply_substitution(ctor, subst)),
                args.iter().map(|a| self.apply_substitution(a, subst)).collect(),
            ),
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.apply_substitution(ty, subst)))
                    .collect(),
            ),
            Type::Variant { name, args } => Type::Variant {
                name: name.clone(),
                args: args.iter().map(|a| self.apply_substitution(a, subst)).collect(),
            },
            Type::Union(alts) => Type::Union(
                alts.iter().map(|a| self.apply_substitution(a, subst)).collect(),
            ),
            Type::Tuple(items) => Type::Tuple(
                items.iter().map(|i| self.apply_substitution(i, subst)).collect(),
            ),
        }
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
