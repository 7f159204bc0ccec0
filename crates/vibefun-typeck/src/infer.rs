//! Algorithm W over Core modules.
//!
//! The checker processes modules in the resolver's compilation order.
//! Within a module, declarations run in source order: imports bind names
//! from previously-checked modules' export interfaces, type declarations
//! register themselves (constructors become ordinary polymorphic
//! functions), externals bind with their JS metadata (overloads grouped by
//! name and resolved by arity at call sites), and let bindings are
//! inferred with let-polymorphism under the value restriction.
//!
//! Failure recovery: a type error is recorded once and checking resumes at
//! the next top-level declaration or match case, so one run surfaces as
//! many diagnostics as possible.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use vibefun_ast::core::{
    CoreBinOp, CoreDecl, CoreExpr, CoreExprKind, CoreMatchCase, CoreModule, CorePattern,
    CorePatternKind, CoreRecordItem, CoreUnOp,
};
use vibefun_ast::surface::{
    ExternalDecl, ImportDecl, Literal, Reexport, TypeDeclBody, TypeExpr, TypeExprKind,
};
use vibefun_common::{Diagnostic, Location};

use crate::builtins;
use crate::env::{Binding, CtorInfo, ExternalBinding, TypeDef, TypeDefs, TypeEnv};
use crate::error::TypeError;
use crate::exhaustiveness::{self, CtorSig, LitKind, Pat, TypeShape, TypeShapeSource};
use crate::ty::{Scheme, Type};
use crate::unify::InferCtx;

/// A module's export interface, kept for importers.
#[derive(Debug, Default)]
pub struct ModuleInterface {
    pub values: FxHashMap<String, Binding>,
    pub types: FxHashMap<String, TypeDef>,
}

/// The type checker for one compilation session.
///
/// Owns the unification context, the (session-global) type definition
/// table, and the per-module export interfaces built so far.
pub struct Checker {
    pub ctx: InferCtx,
    defs: TypeDefs,
    exports: FxHashMap<PathBuf, ModuleInterface>,
    problems: Vec<TypeError>,
    alias_depth: u32,
}

impl Checker {
    /// A checker with the built-in types and values registered.
    pub fn new() -> Self {
        let mut defs = TypeDefs::new();
        builtins::register_types(&mut defs);
        Checker {
            ctx: InferCtx::new(),
            defs,
            exports: FxHashMap::default(),
            problems: Vec::new(),
            alias_depth: 0,
        }
    }

    /// Drain the collected problems as coded diagnostics, in discovery
    /// order. Severity comes from each code's registry definition.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.problems)
            .iter()
            .map(TypeError::to_diagnostic)
            .collect()
    }

    /// Whether any problem has been recorded so far.
    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    // ── Module checking ─────────────────────────────────────────────────

    /// Check one core module. `resolved_imports` maps each import
    /// specifier to the canonical path the loader resolved it to.
    ///
    /// Returns the schemes of the module's top-level bindings.
    pub fn check_module(
        &mut self,
        module: &CoreModule,
        resolved_imports: &FxHashMap<String, PathBuf>,
    ) -> FxHashMap<String, Scheme> {
        let mut env = TypeEnv::new();
        builtins::register_values(&mut env);

        let mut declared_values: Vec<String> = Vec::new();
        let mut declared_types: Vec<String> = Vec::new();
        let mut export_list: Vec<String> = Vec::new();
        // re-exported name -> (binding, source specifier)
        let mut reexported: FxHashMap<String, (Binding, String)> = FxHashMap::default();
        let mut schemes: FxHashMap<String, Scheme> = FxHashMap::default();

        for decl in &module.decls {
            match decl {
                CoreDecl::Import(import) => {
                    self.process_import(import, resolved_imports, &mut env);
                }
                CoreDecl::Reexport(reexport) => {
                    let interface = match resolved_imports.get(&reexport.specifier) {
                        Some(path) => self.exports.get(path),
                        None => None,
                    };
                    let Some(interface) = interface else {
                        continue; // unresolved or not yet checked (cycle)
                    };
                    match &reexport.reexport {
                        Reexport::Wildcard => {
                            let mut names: Vec<&String> = interface.values.keys().collect();
                            names.sort();
                            let additions: Vec<(String, Binding)> = names
                                .into_iter()
                                .map(|n| (n.clone(), interface.values[n].clone()))
                                .collect();
                            for (name, binding) in additions {
                                match reexported.get(&name) {
                                    Some((_, first)) if *first != reexport.specifier => {
                                        self.problems.push(TypeError::ReexportConflict {
                                            name: name.clone(),
                                            first: first.clone(),
                                            second: reexport.specifier.clone(),
                                            loc: reexport.loc.clone(),
                                        });
                                    }
                                    Some(_) => {}
                                    None => {
                                        reexported
                                            .insert(name, (binding, reexport.specifier.clone()));
                                    }
                                }
                            }
                        }
                        Reexport::Named(names) => {
                            for name in names {
                                match interface.values.get(&name.name) {
                                    Some(binding) => {
                                        reexported.insert(
                                            name.local_name().to_string(),
                                            (binding.clone(), reexport.specifier.clone()),
                                        );
                                    }
                                    None => self.problems.push(TypeError::ImportNotExported {
                                        name: name.name.clone(),
                                        module: reexport.specifier.clone(),
                                        loc: name.loc.clone(),
                                    }),
                                }
                            }
                        }
                    }
                }
                CoreDecl::Export(export) => {
                    for name in &export.names {
                        if export_list.contains(name) {
                            self.problems.push(TypeError::DuplicateExport {
                                name: name.clone(),
                                loc: export.loc.clone(),
                            });
                        } else {
                            export_list.push(name.clone());
                        }
                    }
                }
                CoreDecl::Type(decl) => {
                    let def = match &decl.body {
                        TypeDeclBody::Alias(ty) => TypeDef::Alias {
                            params: decl.params.clone(),
                            ty: ty.clone(),
                        },
                        TypeDeclBody::Record(fields) => TypeDef::Record {
                            params: decl.params.clone(),
                            fields: fields.clone(),
                        },
                        TypeDeclBody::Variant(ctors) => TypeDef::Variant {
                            params: decl.params.clone(),
                            ctors: ctors
                                .iter()
                                .map(|c| (c.name.clone(), c.args.clone()))
                                .collect(),
                        },
                    };
                    self.defs.insert(decl.name.clone(), def);
                    declared_types.push(decl.name.clone());
                }
                CoreDecl::External(decl) => {
                    self.process_external(decl, &mut env);
                    declared_values.push(decl.name.clone());
                }
                CoreDecl::Let(decl) => {
                    let scheme = self.infer_top_binding(
                        &mut env,
                        &decl.name,
                        decl.mutable,
                        decl.annotation.as_ref(),
                        &decl.value,
                        &decl.loc,
                    );
                    schemes.insert(decl.name.clone(), scheme);
                    declared_values.push(decl.name.clone());
                }
                CoreDecl::LetRec(group) => {
                    let bindings: Vec<RecBinding> = group
                        .iter()
                        .map(|d| RecBinding {
                            name: &d.name,
                            annotation: d.annotation.as_ref(),
                            value: &d.value,
                            loc: &d.loc,
                        })
                        .collect();
                    let group_schemes = self.infer_rec_group(&mut env, &bindings);
                    for (name, scheme) in group_schemes {
                        schemes.insert(name.clone(), scheme.clone());
                        declared_values.push(name);
                    }
                }
            }
        }

        // Build the export interface: every top-level declaration is
        // visible to importers, plus whatever re-exports forwarded.
        let mut interface = ModuleInterface::default();
        for name in &declared_values {
            if let Some(binding) = env.globals().get(name) {
                interface
                    .values
                    .insert(name.clone(), self.portable_binding(binding.clone()));
            }
        }
        for (name, (binding, _)) in reexported {
            interface.values.insert(name, binding);
        }
        for name in &declared_types {
            if let Some(def) = self.defs.lookup(name) {
                interface.types.insert(name.clone(), def.clone());
            }
        }
        self.exports.insert(module.path.clone(), interface);

        schemes
    }

    /// Make a binding independent of this context's unification table so
    /// it can cross module boundaries.
    fn portable_binding(&mut self, binding: Binding) -> Binding {
        match binding {
            Binding::Value(scheme) => {
                let resolved = self.ctx.resolve(scheme.ty);
                Binding::Value(Scheme::normalize_from_ty(resolved))
            }
            Binding::External(mut ext) => {
                let resolved = self.ctx.resolve(ext.scheme.ty);
                ext.scheme = Scheme::normalize_from_ty(resolved);
                Binding::External(ext)
            }
            Binding::ExternalOverload(alts) => Binding::ExternalOverload(
                alts.into_iter()
                    .map(|mut alt| {
                        let resolved = self.ctx.resolve(alt.scheme.ty);
                        alt.scheme = Scheme::normalize_from_ty(resolved);
                        alt
                    })
                    .collect(),
            ),
        }
    }

    fn process_import(
        &mut self,
        import: &ImportDecl,
        resolved_imports: &FxHashMap<String, PathBuf>,
        env: &mut TypeEnv,
    ) {
        let interface = match resolved_imports.get(&import.specifier) {
            Some(path) => self.exports.get(path),
            None => None,
        };

        let Some(interface) = interface else {
            // The target failed to load, or sits later in a cycle. Bind
            // value imports to fresh monomorphic variables so checking
            // proceeds; the cycle warning was already issued.
            if !import.type_only {
                let names: Vec<String> = import
                    .names
                    .iter()
                    .map(|n| n.local_name().to_string())
                    .collect();
                for name in names {
                    let var = self.ctx.fresh_var();
                    env.insert_value(name, Scheme::mono(var));
                }
            }
            return;
        };

        let mut bindings: Vec<(String, Binding)> = Vec::new();
        let mut missing: Vec<(String, Location)> = Vec::new();
        for name in &import.names {
            if import.type_only {
                // Types live in the session-global table; just validate.
                if interface.types.contains_key(&name.name) || self.defs.contains(&name.name) {
                    continue;
                }
                missing.push((name.name.clone(), name.loc.clone()));
            } else if let Some(binding) = interface.values.get(&name.name) {
                bindings.push((name.local_name().to_string(), binding.clone()));
            } else if interface.types.contains_key(&name.name) {
                // Importing a variant type's name also brings its
                // constructors into scope via the global table.
            } else {
                missing.push((name.name.clone(), name.loc.clone()));
            }
        }
        for (name, binding) in bindings {
            env.insert(name, binding);
        }
        for (name, loc) in missing {
            self.problems.push(TypeError::ImportNotExported {
                name,
                module: import.specifier.clone(),
                loc,
            });
        }
    }

    fn process_external(&mut self, decl: &ExternalDecl, env: &mut TypeEnv) {
        let mut vars: FxHashMap<String, Type> = FxHashMap::default();
        let ty = match self.conv_type(&decl.ty, &mut vars, true) {
            Ok(ty) => ty,
            Err(err) => {
                self.problems.push(err);
                self.ctx.fresh_var()
            }
        };
        let arity = match &ty {
            Type::Fun(params, _) => params.len(),
            _ => 0,
        };
        let quantified = vars
            .values()
            .filter_map(|t| match t {
                Type::Var(v) => Some(*v),
                _ => None,
            })
            .collect();
        let binding = ExternalBinding {
            scheme: Scheme { vars: quantified, ty },
            js_name: decl.js_name.clone(),
            from_module: decl.from_module.clone(),
            arity,
        };

        // Repeated externals sharing a name form an overload set.
        let merged = match env.globals().get(&decl.name) {
            Some(Binding::External(existing)) => {
                Binding::ExternalOverload(vec![existing.clone(), binding])
            }
            Some(Binding::ExternalOverload(existing)) => {
                let mut alts = existing.clone();
                alts.push(binding);
                Binding::ExternalOverload(alts)
            }
            _ => Binding::External(binding),
        };
        env.insert(decl.name.clone(), merged);
    }

    /// Infer one top-level (non-recursive) binding, recovering at this
    /// declaration boundary on error.
    fn infer_top_binding(
        &mut self,
        env: &mut TypeEnv,
        name: &str,
        mutable: bool,
        annotation: Option<&TypeExpr>,
        value: &CoreExpr,
        loc: &Location,
    ) -> Scheme {
        self.ctx.enter_level();
        let result = self.infer_expr(env, value).and_then(|ty| {
            if let Some(annotation) = annotation {
                let mut vars = FxHashMap::default();
                let expected = self.conv_type(annotation, &mut vars, false)?;
                self.ctx.unify(ty.clone(), expected, loc)?;
            }
            Ok(ty)
        });
        self.ctx.leave_level();

        let scheme = match result {
            Ok(ty) => {
                if !mutable && self.is_syntactic_value(value) {
                    self.ctx.generalize(ty)
                } else {
                    // Value restriction: non-values stay monomorphic.
                    let resolved = self.ctx.resolve(ty);
                    Scheme::mono(resolved)
                }
            }
            Err(err) => {
                self.problems.push(err);
                Scheme::mono(self.ctx.fresh_var())
            }
        };
        env.insert_value(name.to_string(), scheme.clone());
        scheme
    }

    /// Infer a recursive binding group: pre-bind every name to a fresh
    /// monomorphic variable, infer all right-hand sides, then generalize
    /// the whole group at once so mutually recursive functions may share
    /// type variables.
    fn infer_rec_group<'b>(
        &mut self,
        env: &mut TypeEnv,
        bindings: &[RecBinding<'b>],
    ) -> Vec<(String, Scheme)> {
        self.ctx.enter_level();
        let pre: Vec<Type> = bindings.iter().map(|_| self.ctx.fresh_var()).collect();
        for (binding, var) in bindings.iter().zip(&pre) {
            env.insert_value(binding.name.to_string(), Scheme::mono(var.clone()));
        }

        for (binding, var) in bindings.iter().zip(&pre) {
            let result = self.infer_expr(env, binding.value).and_then(|ty| {
                self.ctx.unify(ty.clone(), var.clone(), binding.loc)?;
                if let Some(annotation) = binding.annotation {
                    let mut vars = FxHashMap::default();
                    let expected = self.conv_type(annotation, &mut vars, false)?;
                    self.ctx.unify(ty, expected, binding.loc)?;
                }
                Ok(())
            });
            if let Err(err) = result {
                self.problems.push(err);
            }
        }
        self.ctx.leave_level();

        let mut out = Vec::new();
        for (binding, var) in bindings.iter().zip(&pre) {
            let scheme = if self.is_syntactic_value(binding.value) {
                self.ctx.generalize(var.clone())
            } else {
                Scheme::mono(self.ctx.resolve(var.clone()))
            };
            env.insert_value(binding.name.to_string(), scheme.clone());
            out.push((binding.name.to_string(), scheme));
        }
        out
    }

    // ── Expression inference ────────────────────────────────────────────

    /// Infer the type of one core expression.
    pub fn infer_expr(&mut self, env: &mut TypeEnv, expr: &CoreExpr) -> Result<Type, TypeError> {
        let loc = &expr.loc;
        match &expr.kind {
            CoreExprKind::Lit(lit) => Ok(literal_type(lit)),

            CoreExprKind::Var(name) => match env.lookup(name) {
                Some(Binding::Value(scheme)) => {
                    let scheme = scheme.clone();
                    Ok(self.ctx.instantiate(&scheme))
                }
                Some(Binding::External(ext)) => {
                    let scheme = ext.scheme.clone();
                    Ok(self.ctx.instantiate(&scheme))
                }
                Some(Binding::ExternalOverload(alts)) => Err(TypeError::NoMatchingOverload {
                    name: name.clone(),
                    found: 0,
                    candidates: overload_arities(alts),
                    loc: loc.clone(),
                }),
                None => match self.ctor_type(name) {
                    Some(ty) => Ok(ty),
                    None if starts_uppercase(name) => Err(TypeError::UnboundConstructor {
                        name: name.clone(),
                        loc: loc.clone(),
                    }),
                    None => Err(TypeError::UnboundVariable {
                        name: name.clone(),
                        loc: loc.clone(),
                    }),
                },
            },

            CoreExprKind::Lambda { param, body } => {
                let param_ty = self.ctx.fresh_var();
                env.push_scope();
                let result = self
                    .check_pattern(env, param, param_ty.clone())
                    .and_then(|_| self.infer_expr(env, body));
                env.pop_scope();
                Ok(Type::fun(vec![param_ty], result?))
            }

            CoreExprKind::Apply { .. } => self.infer_apply(env, expr),

            CoreExprKind::Let { name, mutable, annotation, value, body } => {
                self.ctx.enter_level();
                let value_ty = self.infer_expr(env, value).and_then(|ty| {
                    if let Some(annotation) = annotation {
                        let mut vars = FxHashMap::default();
                        let expected = self.conv_type(annotation, &mut vars, false)?;
                        self.ctx.unify(ty.clone(), expected, loc)?;
                    }
                    Ok(ty)
                });
                self.ctx.leave_level();
                let value_ty = value_ty?;

                let scheme = if !mutable && self.is_syntactic_value(value) {
                    self.ctx.generalize(value_ty)
                } else {
                    Scheme::mono(self.ctx.resolve(value_ty))
                };
                env.push_scope();
                env.insert_value(name.clone(), scheme);
                let body_ty = self.infer_expr(env, body);
                env.pop_scope();
                body_ty
            }

            CoreExprKind::LetRec { bindings, body } => {
                env.push_scope();
                let rec: Vec<RecBinding> = bindings
                    .iter()
                    .map(|b| RecBinding {
                        name: &b.name,
                        annotation: b.annotation.as_ref(),
                        value: &b.value,
                        loc: &b.loc,
                    })
                    .collect();
                self.infer_rec_group(env, &rec);
                let body_ty = self.infer_expr(env, body);
                env.pop_scope();
                body_ty
            }

            CoreExprKind::Match { scrutinee, cases } => self.infer_match(env, scrutinee, cases, loc),

            CoreExprKind::Record(items) => {
                let mut fields: BTreeMap<String, Type> = BTreeMap::new();
                for item in items {
                    match item {
                        CoreRecordItem::Field(name, value) => {
                            let ty = self.infer_expr(env, value)?;
                            fields.insert(name.clone(), ty);
                        }
                        CoreRecordItem::Spread(value) => {
                            let ty = self.infer_expr(env, value)?;
                            match self.ctx.resolve(ty) {
                                Type::Record(spread) => {
                                    for (name, ty) in spread {
                                        fields.insert(name, ty);
                                    }
                                }
                                other => {
                                    return Err(TypeError::Mismatch {
                                        expected: Type::Record(BTreeMap::new()),
                                        found: other,
                                        loc: value.loc.clone(),
                                    });
                                }
                            }
                        }
                    }
                }
                Ok(Type::Record(fields))
            }

            CoreExprKind::RecordAccess { record, field } => {
                let record_ty = self.infer_expr(env, record)?;
                match self.ctx.resolve(record_ty.clone()) {
                    Type::Record(fields) => {
                        fields.get(field).cloned().ok_or_else(|| TypeError::UnknownField {
                            ty: Type::Record(fields.clone()).to_string(),
                            field: field.clone(),
                            loc: loc.clone(),
                        })
                    }
                    Type::Var(_) => {
                        // Nominal lookup: exactly one declared record type
                        // carrying this field pins the access down.
                        let candidates: Vec<String> = self
                            .defs
                            .records_with_field(field)
                            .into_iter()
                            .map(str::to_string)
                            .collect();
                        if candidates.len() == 1 {
                            let record_decl = self.instantiate_record_decl(&candidates[0], loc)?;
                            self.ctx.unify(record_ty, record_decl.clone(), loc)?;
                            match record_decl {
                                Type::Record(fields) => Ok(fields[field].clone()),
                                _ => unreachable!("record decls instantiate to records"),
                            }
                        } else {
                            Err(TypeError::UnknownField {
                                ty: "?".to_string(),
                                field: field.clone(),
                                loc: loc.clone(),
                            })
                        }
                    }
                    other => Err(TypeError::UnknownField {
                        ty: other.to_string(),
                        field: field.clone(),
                        loc: loc.clone(),
                    }),
                }
            }

            CoreExprKind::Tuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.infer_expr(env, item)?);
                }
                Ok(Type::Tuple(out))
            }

            CoreExprKind::BinOp { op, lhs, rhs } => {
                let lhs_ty = self.infer_expr(env, lhs)?;
                let rhs_ty = self.infer_expr(env, rhs)?;
                match op {
                    CoreBinOp::Add
                    | CoreBinOp::Sub
                    | CoreBinOp::Mul
                    | CoreBinOp::Div
                    | CoreBinOp::Mod => {
                        self.ctx.unify(lhs_ty, Type::int(), &lhs.loc)?;
                        self.ctx.unify(rhs_ty, Type::int(), &rhs.loc)?;
                        Ok(Type::int())
                    }
                    CoreBinOp::Eq
                    | CoreBinOp::Ne
                    | CoreBinOp::Lt
                    | CoreBinOp::Le
                    | CoreBinOp::Gt
                    | CoreBinOp::Ge => {
                        self.ctx.unify(lhs_ty, rhs_ty, loc)?;
                        Ok(Type::bool())
                    }
                    CoreBinOp::And | CoreBinOp::Or => {
                        self.ctx.unify(lhs_ty, Type::bool(), &lhs.loc)?;
                        self.ctx.unify(rhs_ty, Type::bool(), &rhs.loc)?;
                        Ok(Type::bool())
                    }
                    CoreBinOp::Concat => {
                        self.ctx.unify(lhs_ty, Type::string(), &lhs.loc)?;
                        self.ctx.unify(rhs_ty, Type::string(), &rhs.loc)?;
                        Ok(Type::string())
                    }
                    CoreBinOp::RefAssign => {
                        let inner = self.ctx.fresh_var();
                        self.ctx
                            .unify(lhs_ty, Type::reference(inner.clone()), &lhs.loc)?;
                        self.ctx.unify(rhs_ty, inner, &rhs.loc)?;
                        Ok(Type::unit())
                    }
                }
            }

            CoreExprKind::UnOp { op, operand } => {
                let operand_ty = self.infer_expr(env, operand)?;
                match op {
                    CoreUnOp::Neg => {
                        self.ctx.unify(operand_ty, Type::int(), &operand.loc)?;
                        Ok(Type::int())
                    }
                    CoreUnOp::Not => {
                        self.ctx.unify(operand_ty, Type::bool(), &operand.loc)?;
                        Ok(Type::bool())
                    }
                    CoreUnOp::Deref => {
                        let inner = self.ctx.fresh_var();
                        self.ctx
                            .unify(operand_ty, Type::reference(inner.clone()), &operand.loc)?;
                        Ok(inner)
                    }
                }
            }

            CoreExprKind::Annotated { expr: inner, ty } => {
                let inferred = self.infer_expr(env, inner)?;
                let mut vars = FxHashMap::default();
                let expected = self.conv_type(ty, &mut vars, false)?;
                self.ctx.unify(inferred, expected.clone(), loc)?;
                Ok(expected)
            }

            CoreExprKind::Unsafe(inner) => self.infer_expr(env, inner),
        }
    }

    /// Application inference. The spine is flattened first so overloaded
    /// externals can be resolved by the call site's arity; everything else
    /// uses ordinary one-argument-at-a-time unification.
    fn infer_apply(&mut self, env: &mut TypeEnv, expr: &CoreExpr) -> Result<Type, TypeError> {
        let (head, args) = flatten_spine(expr);

        let overload = match &head.kind {
            CoreExprKind::Var(name) => match env.lookup(name) {
                Some(Binding::ExternalOverload(alts)) => Some((name.clone(), alts.clone())),
                _ => None,
            },
            _ => None,
        };
        if let Some((name, alts)) = overload {
            let Some(alt) = alts.iter().find(|alt| alt.arity == args.len()) else {
                return Err(TypeError::NoMatchingOverload {
                    name,
                    found: args.len(),
                    candidates: overload_arities(&alts),
                    loc: expr.loc.clone(),
                });
            };
            let Type::Fun(params, ret) = self.ctx.instantiate(&alt.scheme) else {
                unreachable!("an overload alternative with arity > 0 is a function");
            };
            for (arg, param) in args.iter().zip(params) {
                let arg_ty = self.infer_expr(env, arg)?;
                self.ctx.unify(arg_ty, param, &arg.loc)?;
            }
            return Ok(*ret);
        }

        let mut func_ty = self.infer_expr(env, head)?;
        for arg in args {
            let arg_ty = self.infer_expr(env, arg)?;
            let result = self.ctx.fresh_var();
            self.ctx.unify(
                func_ty,
                Type::fun(vec![arg_ty], result.clone()),
                &arg.loc,
            )?;
            func_ty = result;
        }
        Ok(func_ty)
    }

    /// Match inference: cases unify against one scrutinee and one result
    /// type; a failing case records its error and checking resumes at the
    /// next case. Exhaustiveness and redundancy run afterwards.
    fn infer_match(
        &mut self,
        env: &mut TypeEnv,
        scrutinee: &CoreExpr,
        cases: &[CoreMatchCase],
        loc: &Location,
    ) -> Result<Type, TypeError> {
        let scrutinee_ty = self.infer_expr(env, scrutinee)?;
        let result_ty = self.ctx.fresh_var();

        let mut any_pattern_failed = false;
        for case in cases {
            env.push_scope();
            let result = self
                .check_pattern(env, &case.pattern, scrutinee_ty.clone())
                .and_then(|_| {
                    if let Some(guard) = &case.guard {
                        let guard_ty = self.infer_expr(env, guard)?;
                        self.ctx.unify(guard_ty, Type::bool(), &guard.loc)?;
                    }
                    let body_ty = self.infer_expr(env, &case.body)?;
                    self.ctx.unify(body_ty, result_ty.clone(), &case.body.loc)
                });
            env.pop_scope();
            if let Err(err) = result {
                any_pattern_failed = true;
                self.problems.push(err);
            }
        }

        if !any_pattern_failed {
            self.check_exhaustiveness(scrutinee_ty, cases, loc);
        }

        Ok(result_ty)
    }

    fn check_exhaustiveness(
        &mut self,
        scrutinee_ty: Type,
        cases: &[CoreMatchCase],
        loc: &Location,
    ) {
        let resolved = self.ctx.resolve(scrutinee_ty);
        let rows: Vec<(Pat, bool)> = cases
            .iter()
            .map(|case| (abstract_pattern(&case.pattern), case.guard.is_some()))
            .collect();

        let analysis = {
            let shapes = DefShapes { defs: &self.defs };
            exhaustiveness::analyze(&rows, &resolved, &shapes)
        };

        if let Some(witness) = analysis.missing {
            self.problems.push(TypeError::NonExhaustiveMatch {
                scrutinee_type: resolved.to_string(),
                witness: witness.to_string(),
                loc: loc.clone(),
            });
        }
        for index in analysis.redundant {
            self.problems.push(TypeError::RedundantCase {
                index,
                loc: cases[index].pattern.loc.clone(),
            });
        }
    }

    // ── Pattern checking ────────────────────────────────────────────────

    /// Check a pattern against an expected type, binding its variables
    /// into the current scope.
    pub fn check_pattern(
        &mut self,
        env: &mut TypeEnv,
        pattern: &CorePattern,
        expected: Type,
    ) -> Result<(), TypeError> {
        let loc = &pattern.loc;
        match &pattern.kind {
            CorePatternKind::Wildcard => Ok(()),
            CorePatternKind::Var(name) => {
                env.insert_value(name.clone(), Scheme::mono(expected));
                Ok(())
            }
            CorePatternKind::Lit(lit) => self.ctx.unify(literal_type(lit), expected, loc),
            CorePatternKind::Variant { ctor, args } => {
                let Some(info) = self.defs.lookup_ctor(ctor).cloned() else {
                    return Err(TypeError::UnboundConstructor {
                        name: ctor.clone(),
                        loc: loc.clone(),
                    });
                };
                let mut vars: FxHashMap<String, Type> = FxHashMap::default();
                let instance_args: Vec<Type> = info
                    .type_params
                    .iter()
                    .map(|p| {
                        let var = self.ctx.fresh_var();
                        vars.insert(p.clone(), var.clone());
                        var
                    })
                    .collect();
                if args.len() != info.args.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: info.args.len(),
                        found: args.len(),
                        loc: loc.clone(),
                    });
                }
                let result = Type::Variant {
                    name: info.type_name.clone(),
                    args: instance_args,
                };
                self.ctx.unify(result, expected, loc)?;
                for (sub, arg_expr) in args.iter().zip(&info.args) {
                    let arg_ty = self.conv_type(arg_expr, &mut vars, false)?;
                    self.check_pattern(env, sub, arg_ty)?;
                }
                Ok(())
            }
            CorePatternKind::Tuple(items) => {
                let item_tys: Vec<Type> = items.iter().map(|_| self.ctx.fresh_var()).collect();
                self.ctx.unify(Type::Tuple(item_tys.clone()), expected, loc)?;
                for (item, ty) in items.iter().zip(item_tys) {
                    self.check_pattern(env, item, ty)?;
                }
                Ok(())
            }
            CorePatternKind::Record(fields) => {
                let mut field_tys: BTreeMap<String, Type> = BTreeMap::new();
                for (name, _) in fields {
                    field_tys.insert(name.clone(), self.ctx.fresh_var());
                }
                self.ctx
                    .unify(Type::Record(field_tys.clone()), expected, loc)?;
                for (name, sub) in fields {
                    self.check_pattern(env, sub, field_tys[name].clone())?;
                }
                Ok(())
            }
        }
    }

    // ── Type expression conversion ──────────────────────────────────────

    /// Convert a surface type expression into an internal type.
    ///
    /// `vars` maps lowercase type-variable names to their (fresh)
    /// variables; each annotation gets its own map. In `external` mode,
    /// unknown Pascal-case names register themselves as opaque external
    /// types instead of erroring -- external signatures routinely mention
    /// JS-side types (`Promise`, `Response`) no `.vf` file declares.
    fn conv_type(
        &mut self,
        te: &TypeExpr,
        vars: &mut FxHashMap<String, Type>,
        external: bool,
    ) -> Result<Type, TypeError> {
        let loc = &te.loc;
        match &te.kind {
            TypeExprKind::Var(name) => Ok(vars
                .entry(name.clone())
                .or_insert_with(|| self.ctx.fresh_var())
                .clone()),
            TypeExprKind::Unit => Ok(Type::unit()),
            TypeExprKind::Const(name) => self.conv_named(name, &[], loc, vars, external),
            TypeExprKind::App { ctor, args } => {
                let mut converted = Vec::with_capacity(args.len());
                for arg in args {
                    converted.push(self.conv_type(arg, vars, external)?);
                }
                self.conv_named(ctor, &converted, loc, vars, external)
            }
            TypeExprKind::Fun { params, ret } => {
                let mut converted = Vec::with_capacity(params.len());
                for param in params {
                    converted.push(self.conv_type(param, vars, external)?);
                }
                let ret = self.conv_type(ret, vars, external)?;
                Ok(Type::Fun(converted, Box::new(ret)))
            }
            TypeExprKind::Record(fields) => {
                let mut out = BTreeMap::new();
                for (name, ty) in fields {
                    out.insert(name.clone(), self.conv_type(ty, vars, external)?);
                }
                Ok(Type::Record(out))
            }
            TypeExprKind::Union(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for alt in alts {
                    out.push(self.conv_type(alt, vars, external)?);
                }
                Ok(Type::Union(out))
            }
            TypeExprKind::Tuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.conv_type(item, vars, external)?);
                }
                Ok(Type::Tuple(out))
            }
        }
    }

    /// Resolve a named type reference (`Int`, `Option<T>`, an alias, a
    /// record or variant declaration, an external opaque type).
    fn conv_named(
        &mut self,
        name: &str,
        args: &[Type],
        loc: &Location,
        _vars: &mut FxHashMap<String, Type>,
        external: bool,
    ) -> Result<Type, TypeError> {
        if matches!(name, "Int" | "Float" | "String" | "Bool" | "Unit") {
            if !args.is_empty() {
                return Err(TypeError::ArityMismatch {
                    expected: 0,
                    found: args.len(),
                    loc: loc.clone(),
                });
            }
            return Ok(Type::Const(name.to_string()));
        }

        let Some(def) = self.defs.lookup(name).cloned() else {
            if external {
                self.defs
                    .insert(name.to_string(), TypeDef::External { arity: args.len() });
                return Ok(opaque(name, args));
            }
            return Err(TypeError::UnknownTypeName {
                name: name.to_string(),
                loc: loc.clone(),
            });
        };

        if def.arity() != args.len() {
            return Err(TypeError::ArityMismatch {
                expected: def.arity(),
                found: args.len(),
                loc: loc.clone(),
            });
        }

        match def {
            TypeDef::Variant { .. } => Ok(Type::Variant {
                name: name.to_string(),
                args: args.to_vec(),
            }),
            TypeDef::Record { params, fields } => {
                let mut mapping: FxHashMap<String, Type> = params
                    .iter()
                    .cloned()
                    .zip(args.iter().cloned())
                    .collect();
                let mut out = BTreeMap::new();
                for (field, ty) in &fields {
                    out.insert(field.clone(), self.conv_type(ty, &mut mapping, external)?);
                }
                Ok(Type::Record(out))
            }
            TypeDef::Alias { params, ty } => {
                self.alias_depth += 1;
                if self.alias_depth > 64 {
                    self.alias_depth = 0;
                    return Err(TypeError::UnknownTypeName {
                        name: format!("{name} (recursive alias)"),
                        loc: loc.clone(),
                    });
                }
                let mut mapping: FxHashMap<String, Type> = params
                    .iter()
                    .cloned()
                    .zip(args.iter().cloned())
                    .collect();
                let result = self.conv_type(&ty, &mut mapping, external);
                self.alias_depth = self.alias_depth.saturating_sub(1);
                result
            }
            TypeDef::External { .. } => Ok(opaque(name, args)),
        }
    }

    /// Instantiate a record type declaration with fresh parameters.
    fn instantiate_record_decl(&mut self, name: &str, loc: &Location) -> Result<Type, TypeError> {
        let Some(TypeDef::Record { params, fields }) = self.defs.lookup(name).cloned() else {
            return Err(TypeError::UnknownTypeName {
                name: name.to_string(),
                loc: loc.clone(),
            });
        };
        let mut mapping: FxHashMap<String, Type> = params
            .into_iter()
            .map(|p| (p, self.ctx.fresh_var()))
            .collect();
        let mut out = BTreeMap::new();
        for (field, ty) in &fields {
            out.insert(field.clone(), self.conv_type(ty, &mut mapping, false)?);
        }
        Ok(Type::Record(out))
    }

    /// The (curried) type of a variant constructor, freshly instantiated.
    fn ctor_type(&mut self, name: &str) -> Option<Type> {
        let info: CtorInfo = self.defs.lookup_ctor(name)?.clone();
        let mut vars: FxHashMap<String, Type> = FxHashMap::default();
        let instance_args: Vec<Type> = info
            .type_params
            .iter()
            .map(|p| {
                let var = self.ctx.fresh_var();
                vars.insert(p.clone(), var.clone());
                var
            })
            .collect();
        let mut ty = Type::Variant { name: info.type_name.clone(), args: instance_args };
        for arg in info.args.iter().rev() {
            // Constructor argument types come from the declaration; a
            // conversion failure here means the declaration itself was
            // rejected earlier, so fall back to a fresh variable.
            let arg_ty = self
                .conv_type(arg, &mut vars, false)
                .unwrap_or_else(|_| self.ctx.fresh_var());
            ty = Type::fun(vec![arg_ty], ty);
        }
        Some(ty)
    }

    // ── Value restriction ───────────────────────────────────────────────

    /// Whether an expression is a syntactic value: a literal, variable,
    /// lambda, tuple/record of values, or a constructor application of
    /// values. Only syntactic values generalize.
    fn is_syntactic_value(&self, expr: &CoreExpr) -> bool {
        match &expr.kind {
            CoreExprKind::Lit(_) | CoreExprKind::Var(_) | CoreExprKind::Lambda { .. } => true,
            CoreExprKind::Tuple(items) => items.iter().all(|i| self.is_syntactic_value(i)),
            CoreExprKind::Record(items) => items.iter().all(|item| match item {
                CoreRecordItem::Field(_, value) | CoreRecordItem::Spread(value) => {
                    self.is_syntactic_value(value)
                }
            }),
            CoreExprKind::Annotated { expr, .. } => self.is_syntactic_value(expr),
            CoreExprKind::Apply { .. } => {
                let (head, args) = flatten_spine(expr);
                match &head.kind {
                    CoreExprKind::Var(name) => {
                        self.defs.lookup_ctor(name).is_some()
                            && args.iter().all(|a| self.is_syntactic_value(a))
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

// ── Support types and helpers ───────────────────────────────────────────

/// One member of a recursive binding group, borrowed from either a
/// top-level declaration or an expression-level `letrec`.
struct RecBinding<'b> {
    name: &'b str,
    annotation: Option<&'b TypeExpr>,
    value: &'b CoreExpr,
    loc: &'b Location,
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Int(_) => Type::int(),
        Literal::Float(_) => Type::float(),
        Literal::Str(_) => Type::string(),
        Literal::Bool(_) => Type::bool(),
        Literal::Unit => Type::unit(),
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn overload_arities(alts: &[ExternalBinding]) -> Vec<usize> {
    let mut arities: Vec<usize> = alts.iter().map(|alt| alt.arity).collect();
    arities.sort_unstable();
    arities.dedup();
    arities
}

/// Flatten a curried application spine: `((f a) b) c` becomes
/// `(f, [a, b, c])`.
fn flatten_spine(expr: &CoreExpr) -> (&CoreExpr, Vec<&CoreExpr>) {
    let mut args = Vec::new();
    let mut current = expr;
    while let CoreExprKind::Apply { func, arg } = &current.kind {
        args.push(arg.as_ref());
        current = func;
    }
    args.reverse();
    (current, args)
}

/// Translate a core pattern into the abstract form the exhaustiveness
/// algorithm consumes. Bool and Unit literals become constructors; record
/// fields sort by name to match the record type's field order.
fn abstract_pattern(pattern: &CorePattern) -> Pat {
    match &pattern.kind {
        CorePatternKind::Wildcard | CorePatternKind::Var(_) => Pat::Wildcard,
        CorePatternKind::Lit(Literal::Bool(b)) => {
            Pat::Constructor { name: b.to_string(), args: vec![] }
        }
        CorePatternKind::Lit(Literal::Unit) => {
            Pat::Constructor { name: "()".to_string(), args: vec![] }
        }
        CorePatternKind::Lit(Literal::Int(n)) => {
            Pat::Literal { value: n.to_string(), kind: LitKind::Int }
        }
        CorePatternKind::Lit(Literal::Float(x)) => {
            Pat::Literal { value: x.to_string(), kind: LitKind::Float }
        }
        CorePatternKind::Lit(Literal::Str(s)) => {
            Pat::Literal { value: format!("{s:?}"), kind: LitKind::String }
        }
        CorePatternKind::Variant { ctor, args } => Pat::Constructor {
            name: ctor.clone(),
            args: args.iter().map(abstract_pattern).collect(),
        },
        CorePatternKind::Tuple(items) => Pat::Constructor {
            name: "(tuple)".to_string(),
            args: items.iter().map(abstract_pattern).collect(),
        },
        CorePatternKind::Record(fields) => {
            let mut sorted: Vec<(&String, &CorePattern)> =
                fields.iter().map(|(n, p)| (n, p)).collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Pat::Constructor {
                name: "(record)".to_string(),
                args: sorted.into_iter().map(|(_, p)| abstract_pattern(p)).collect(),
            }
        }
    }
}

/// Type shapes backed by the session's type definitions.
struct DefShapes<'a> {
    defs: &'a TypeDefs,
}

impl TypeShapeSource for DefShapes<'_> {
    fn shape(&self, ty: &Type) -> TypeShape {
        match ty {
            Type::Const(name) if name == "Bool" => TypeShape::Finite(vec![
                CtorSig { name: "true".into(), arity: 0 },
                CtorSig { name: "false".into(), arity: 0 },
            ]),
            Type::Const(name) if name == "Unit" => {
                TypeShape::Finite(vec![CtorSig { name: "()".into(), arity: 0 }])
            }
            Type::Const(name) if matches!(name.as_str(), "Int" | "Float" | "String") => {
                TypeShape::Infinite
            }
            Type::Variant { name, .. } => match self.defs.lookup(name) {
                Some(TypeDef::Variant { ctors, .. }) => TypeShape::Finite(
                    ctors
                        .iter()
                        .map(|(name, args)| CtorSig { name: name.clone(), arity: args.len() })
                        .collect(),
                ),
                _ => TypeShape::Open,
            },
            Type::Tuple(items) => TypeShape::Finite(vec![CtorSig {
                name: "(tuple)".into(),
                arity: items.len(),
            }]),
            Type::Record(fields) => TypeShape::Finite(vec![CtorSig {
                name: "(record)".into(),
                arity: fields.len(),
            }]),
            _ => TypeShape::Open,
        }
    }

    fn ctor_args(&self, ty: &Type, ctor: &str) -> Vec<Type> {
        match ty {
            Type::Variant { name, args } => {
                let Some(TypeDef::Variant { params, ctors }) = self.defs.lookup(name) else {
                    return Vec::new();
                };
                let Some((_, arg_exprs)) = ctors.iter().find(|(n, _)| n == ctor) else {
                    return Vec::new();
                };
                let mapping: FxHashMap<&str, &Type> = params
                    .iter()
                    .map(String::as_str)
                    .zip(args.iter())
                    .collect();
                arg_exprs
                    .iter()
                    .map(|te| shape_type(self.defs, te, &mapping))
                    .collect()
            }
            Type::Tuple(items) => items.clone(),
            Type::Record(fields) => fields.values().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Permissive surface-type conversion for exhaustiveness shapes only:
/// no fresh variables, no errors; unknown names become opaque constants.
fn shape_type(defs: &TypeDefs, te: &TypeExpr, mapping: &FxHashMap<&str, &Type>) -> Type {
    match &te.kind {
        TypeExprKind::Var(name) => mapping
            .get(name.as_str())
            .map(|t| (*t).clone())
            .unwrap_or_else(|| Type::Const(name.clone())),
        TypeExprKind::Unit => Type::unit(),
        TypeExprKind::Const(name) => match defs.lookup(name) {
            Some(TypeDef::Variant { .. }) => Type::Variant { name: name.clone(), args: vec![] },
            Some(TypeDef::Alias { params, ty }) if params.is_empty() => {
                shape_type(defs, ty, mapping)
            }
            _ => Type::Const(name.clone()),
        },
        TypeExprKind::App { ctor, args } => {
            let args: Vec<Type> = args.iter().map(|a| shape_type(defs, a, mapping)).collect();
            match defs.lookup(ctor) {
                Some(TypeDef::Variant { .. }) => {
                    Type::Variant { name: ctor.clone(), args }
                }
                Some(TypeDef::Alias { params, ty }) if params.len() == args.len() => {
                    let inner: FxHashMap<&str, &Type> = params
                        .iter()
                        .map(String::as_str)
                        .zip(args.iter())
                        .collect();
                    shape_type(defs, ty, &inner)
                }
                _ => opaque(ctor, &args),
            }
        }
        TypeExprKind::Fun { params, ret } => Type::Fun(
            params.iter().map(|p| shape_type(defs, p, mapping)).collect(),
            Box::new(shape_type(defs, ret, mapping)),
        ),
        TypeExprKind::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), shape_type(defs, t, mapping)))
                .collect(),
        ),
        TypeExprKind::Union(alts) => {
            Type::Union(alts.iter().map(|a| shape_type(defs, a, mapping)).collect())
        }
        TypeExprKind::Tuple(items) => {
            Type::Tuple(items.iter().map(|i| shape_type(defs, i, mapping)).collect())
        }
    }
}

fn opaque(name: &str, args: &[Type]) -> Type {
    if args.is_empty() {
        Type::Const(name.to_string())
    } else {
        Type::App(Box::new(Type::Const(name.to_string())), args.to_vec())
    }
}
