//! The interpreter driver: construction, host registration, package
//! loading, and entry-point invocation.

use std::rc::Rc;

use argus_syntax::ast;

use crate::{
    bridge::{self, HostFunction},
    builtins::Builtin,
    env::Env,
    error::{ErrorKind, EvalError, EvalResult, Flow, Panic, Pos, StackFrame, STACK_SNAPSHOT_FRAMES},
    eval::EvalScope,
    intrinsics::{wrap_host_callback, IntrinsicRegistry, ScopeView},
    io::{NoInput, PrintWriter, ReadInput, StdPrint},
    packages::{Package, PackageCache},
    scanner::SourceSet,
    scope::FileScope,
    tracer::{EvalTracer, NoopTracer},
    types::{AliasDef, StructDef, TypeDescr},
    value::{FuncValue, SymbolicValue, Value},
    HostValue,
};

/// Default maximum call depth before evaluation fails with a Runtime
/// error instead of exhausting the host stack.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// A live call record.
#[derive(Debug)]
pub(crate) struct Frame {
    pub function: String,
    pub file: String,
    /// Call-site position.
    pub pos: Pos,
    pub defers: Vec<DeferredCall>,
    /// Environment holding named-return variables, with their names, when
    /// the function declares named results.
    pub named_returns: Option<(Env, Vec<String>)>,
    /// The active panic while this frame runs its defers.
    pub panic: Option<Panic>,
    pub running_defer: bool,
}

/// A call expression captured by `defer`, replayed at frame exit in its
/// captured environment.
#[derive(Debug)]
pub(crate) struct DeferredCall {
    pub call: ast::Expr,
    pub scope: EvalScope,
    pub pos: Pos,
}

/// The symbolic interpreter.
///
/// One instance owns its package cache, intrinsic registry, I/O handles
/// and tracer; evaluation is single-threaded and synchronous. Construction
/// is programmatic only — there is no CLI and no environment variable the
/// core reads.
pub struct Interpreter {
    pub(crate) sources: SourceSet,
    pub(crate) policy: Box<dyn Fn(&str) -> bool>,
    pub(crate) cache: PackageCache,
    pub(crate) registry: IntrinsicRegistry,
    pub(crate) writer: Box<dyn PrintWriter>,
    pub(crate) input: Box<dyn ReadInput>,
    pub(crate) tracer: Box<dyn EvalTracer>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) max_depth: usize,
    /// Root scope holding the built-in functions; consulted after the
    /// lexical chain and import scopes miss.
    pub(crate) universe: Env,
    /// Aliases currently being resolved on the call path, for cycle
    /// detection (`Rc` addresses).
    pub(crate) resolving_aliases: Vec<usize>,
}

impl Interpreter {
    /// Creates an interpreter over `sources`, with `policy` deciding which
    /// import paths are deep-scanned (`true`) versus kept shallow.
    ///
    /// The policy must be deterministic and cheap; it is consulted on
    /// every first touch of a package.
    pub fn new(sources: SourceSet, policy: impl Fn(&str) -> bool + 'static) -> Self {
        let universe = Env::new();
        Builtin::install(&universe);
        Self {
            sources,
            policy: Box::new(policy),
            cache: PackageCache::new(),
            registry: IntrinsicRegistry::new(),
            writer: Box::new(StdPrint::default()),
            input: Box::new(NoInput),
            tracer: Box::new(NoopTracer),
            frames: Vec::new(),
            max_depth: DEFAULT_MAX_CALL_DEPTH,
            universe,
            resolving_aliases: Vec::new(),
        }
    }

    /// Replaces the `print`/`println` sink.
    pub fn set_writer(&mut self, writer: impl PrintWriter + 'static) {
        self.writer = Box::new(writer);
    }

    /// Replaces the `readln` source.
    pub fn set_input(&mut self, input: impl ReadInput + 'static) {
        self.input = Box::new(input);
    }

    /// Replaces the evaluation tracer.
    pub fn set_tracer(&mut self, tracer: impl EvalTracer + 'static) {
        self.tracer = Box::new(tracer);
    }

    /// Overrides the maximum call depth.
    pub fn set_max_call_depth(&mut self, depth: usize) {
        self.max_depth = depth.max(1);
    }

    /// Registers a regular intrinsic: called with evaluated arguments
    /// whenever a call resolves to `fq_name`
    /// (e.g. `example.com/pkg.New` or `(*example.com/pkg.Mux).Handle`).
    pub fn register_intrinsic(
        &mut self,
        fq_name: &str,
        f: impl Fn(Vec<HostValue>) -> Result<HostValue, String> + 'static,
    ) {
        let wrapped = wrap_host_callback(fq_name.to_owned(), f);
        self.registry.register(fq_name, wrapped);
    }

    /// Registers a special form: intercepts calls to `fq_name` *before*
    /// argument evaluation and receives the raw argument syntax plus a
    /// view of the call-site scope.
    pub fn register_special(
        &mut self,
        fq_name: &str,
        f: impl Fn(&[ast::Expr], &ScopeView) -> Result<HostValue, String> + 'static,
    ) {
        let name = fq_name.to_owned();
        self.registry.register_special(
            fq_name,
            Rc::new(move |interp: &mut Self, args: &[ast::Expr], env: &Env, pos: Pos| {
                let view = ScopeView { env };
                match f(args, &view) {
                    Ok(result) => Ok(bridge::host_to_value(&result)),
                    Err(message) => Err(Flow::Err(interp.attach_stack(EvalError::new(
                        ErrorKind::Foreign,
                        format!("{name}: {message}"),
                        interp.current_file(),
                        pos,
                    )))),
                }
            }),
        );
    }

    /// Registers a precompiled host function through the foreign bridge,
    /// including the pointer-to-host-struct write-back path.
    pub fn register_host_fn(&mut self, fq_name: &str, host_fn: HostFunction) {
        let wrapped = bridge::wrap_host_function(host_fn);
        self.registry.register(fq_name, wrapped);
    }

    /// Loads the module's root package and executes its `main` function.
    pub fn run_main(&mut self) -> Result<(), EvalError> {
        let module = self.sources.module_path().to_owned();
        self.run_entry(&module, "main").map(|_| ())
    }

    /// Loads `import_path` (regardless of policy — the entry package is
    /// always scanned) and calls `func_name` with no arguments, returning
    /// the result through the bridge.
    pub fn run_entry(&mut self, import_path: &str, func_name: &str) -> Result<HostValue, EvalError> {
        let pkg = self.cache.get_or_create(import_path);
        let loaded = self.ensure_loaded(&pkg, true);
        self.demote(loaded)?;
        let Some(func) = pkg.env.lookup(func_name) else {
            return Err(self.attach_stack(EvalError::new(
                ErrorKind::Resolution,
                format!("function {func_name} not found in package {import_path}"),
                "<entry>",
                Pos::NONE,
            )));
        };
        let sc = self.package_scope(&pkg);
        let result = self.call_value(func, Vec::new(), &sc, Pos::NONE);
        self.demote(result).map(|value| bridge::value_to_host(&value))
    }

    /// Reads a top-level binding of a loaded package through the bridge.
    /// Loads the package first when needed (regardless of policy).
    pub fn global(&mut self, import_path: &str, name: &str) -> Result<HostValue, EvalError> {
        let pkg = self.cache.get_or_create(import_path);
        let loaded = self.ensure_loaded(&pkg, true);
        self.demote(loaded)?;
        pkg.env.lookup(name).map(|v| bridge::value_to_host(&v)).ok_or_else(|| {
            self.attach_stack(EvalError::new(
                ErrorKind::Resolution,
                format!("{name} not found in package {import_path}"),
                "<entry>",
                Pos::NONE,
            ))
        })
    }

    // --- plumbing shared by the evaluator modules ---

    /// Collapses a control-flow result into the public error shape.
    fn demote<T>(&self, result: EvalResult<T>) -> Result<T, EvalError> {
        match result {
            Ok(value) => Ok(value),
            Err(Flow::Err(err)) => Err(err),
            Err(Flow::Panic(panic)) => Err(panic.into_error()),
            Err(Flow::Return(_)) => Err(EvalError::new(
                ErrorKind::ControlFlow,
                "return outside a function",
                "<entry>",
                Pos::NONE,
            )),
            Err(Flow::Break | Flow::Continue) => Err(EvalError::new(
                ErrorKind::ControlFlow,
                "break or continue outside a loop",
                "<entry>",
                Pos::NONE,
            )),
        }
    }

    pub(crate) fn package_scope(&self, pkg: &Rc<Package>) -> EvalScope {
        EvalScope {
            env: pkg.env.clone(),
            fs: pkg.file_scope.borrow().clone(),
            file: "<entry>".to_owned(),
            pkg_path: Some(pkg.import_path.clone()),
        }
    }

    pub(crate) fn current_file(&self) -> String {
        self.frames.last().map_or_else(|| "<entry>".to_owned(), |f| f.file.clone())
    }

    /// The last frames at this instant, innermost first.
    pub(crate) fn snapshot(&self) -> Vec<StackFrame> {
        self.frames
            .iter()
            .rev()
            .take(STACK_SNAPSHOT_FRAMES)
            .map(|frame| StackFrame {
                function: frame.function.clone(),
                file: frame.file.clone(),
                pos: frame.pos,
            })
            .collect()
    }

    pub(crate) fn attach_stack(&self, mut err: EvalError) -> EvalError {
        if err.stack.is_empty() {
            err.stack = self.snapshot();
        }
        err
    }

    /// Builds an error `Flow` with a stack snapshot attached.
    pub(crate) fn fail(&self, kind: ErrorKind, message: impl Into<String>, file: &str, pos: Pos) -> Flow {
        Flow::Err(self.attach_stack(EvalError::new(kind, message, file, pos)))
    }

    pub(crate) fn make_panic(&self, value: Value, file: &str, pos: Pos) -> Flow {
        Flow::Panic(Panic {
            value,
            file: file.to_owned(),
            pos,
            stack: self.snapshot(),
        })
    }

    /// `recover()`: defined only while a defer runs; clears and returns
    /// the active panic's payload, nil otherwise.
    pub(crate) fn recover_active_panic(&mut self) -> Value {
        for frame in self.frames.iter_mut().rev() {
            if frame.running_defer {
                if let Some(panic) = frame.panic.take() {
                    return panic.value;
                }
                return Value::Nil;
            }
        }
        Value::Nil
    }

    /// Produces a symbolic placeholder and reports it to the tracer.
    pub(crate) fn symbolic(&mut self, ty: Option<Rc<TypeDescr>>, sc: &EvalScope, pos: Pos) -> Value {
        let name = ty.as_ref().map(|t| t.display_name());
        self.tracer.on_symbolic(name.as_deref(), &sc.file, pos);
        Value::Symbolic(Rc::new(SymbolicValue { ty }))
    }

    // --- lazy package loading ---

    /// Loads a package's members if policy (or `force`) allows.
    ///
    /// Loading is idempotent and monotone: the `loaded` flag flips before
    /// member registration so import cycles terminate, and a package once
    /// loaded never rescans.
    pub(crate) fn ensure_loaded(&mut self, pkg: &Rc<Package>, force: bool) -> EvalResult<()> {
        if pkg.loaded.get() {
            return Ok(());
        }
        if !force && !(self.policy)(&pkg.import_path) {
            return Ok(());
        }
        let scanned = self
            .sources
            .scan(&pkg.import_path)
            .map_err(|err| Flow::Err(self.attach_stack(err)))?;
        pkg.loaded.set(true);
        *pkg.name.borrow_mut() = scanned.name.clone();
        let fs = Rc::new(FileScope::from_files(&scanned.files));
        *pkg.file_scope.borrow_mut() = Some(Rc::clone(&fs));

        // Pass 1: type declarations, so functions and values can refer to
        // every sibling type regardless of declaration order.
        for file in &scanned.files {
            let sc = self.file_scope_for(pkg, &fs, &file.name);
            for decl in &file.decls {
                if let ast::Decl::Type(specs) = decl {
                    self.declare_type_specs(specs, &sc)?;
                }
            }
        }

        // Pass 2: functions and methods.
        for file in &scanned.files {
            let sc = self.file_scope_for(pkg, &fs, &file.name);
            for decl in &file.decls {
                if let ast::Decl::Func(func) = decl {
                    self.register_func_decl(pkg, func, &sc)?;
                }
            }
        }

        // Pass 3: constants and variables, in source order.
        for file in &scanned.files {
            let sc = self.file_scope_for(pkg, &fs, &file.name);
            for decl in &file.decls {
                match decl {
                    ast::Decl::Var(group) => self.exec_var_group(group, &sc, false)?,
                    ast::Decl::Const(group) => self.exec_var_group(group, &sc, true)?,
                    _ => {}
                }
            }
        }

        self.tracer.on_package_loaded(&pkg.import_path);
        Ok(())
    }

    fn file_scope_for(&self, pkg: &Rc<Package>, fs: &Rc<FileScope>, file_name: &str) -> EvalScope {
        EvalScope {
            env: pkg.env.clone(),
            fs: Some(Rc::clone(fs)),
            file: file_name.to_owned(),
            pkg_path: Some(pkg.import_path.clone()),
        }
    }

    fn register_func_decl(&mut self, pkg: &Rc<Package>, decl: &ast::FuncDecl, sc: &EvalScope) -> EvalResult<()> {
        let func = Rc::new(FuncValue {
            name: Some(decl.name.name.clone()),
            recv: decl.recv.clone(),
            sig: decl.sig.clone(),
            body: decl.body.clone(),
            env: pkg.env.clone(),
            file: sc.fs.clone(),
            file_name: sc.file.clone(),
            pkg_path: Some(pkg.import_path.clone()),
        });
        match &decl.recv {
            None => {
                pkg.env
                    .declare(&decl.name.name, Value::Func(func), false)
                    .map_err(|msg| self.fail(ErrorKind::Resolution, msg, &sc.file, decl.pos))?;
            }
            Some(recv) => {
                let Some(Value::Type(ty)) = pkg.env.lookup(&recv.type_name.name) else {
                    return Err(self.fail(
                        ErrorKind::Resolution,
                        format!("method {} declared on unknown type {}", decl.name.name, recv.type_name.name),
                        &sc.file,
                        decl.pos,
                    ));
                };
                match &*ty {
                    TypeDescr::Struct(def) => {
                        def.methods.borrow_mut().insert(decl.name.name.clone(), func);
                    }
                    TypeDescr::Alias(def) => {
                        def.methods.borrow_mut().insert(decl.name.name.clone(), func);
                    }
                    other => {
                        return Err(self.fail(
                            ErrorKind::Resolution,
                            format!("cannot declare method on {}", other.display_name()),
                            &sc.file,
                            decl.pos,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Registers `type` specs into the scope's environment. Shared by
    /// package loading and block-local type declarations.
    pub(crate) fn declare_type_specs(&mut self, specs: &[ast::TypeSpec], sc: &EvalScope) -> EvalResult<()> {
        for spec in specs {
            let pkg_path = sc.pkg_path.clone().unwrap_or_default();
            let descr = match &spec.ty {
                ast::Expr::StructType { fields, .. } => TypeDescr::Struct(Rc::new(StructDef {
                    name: spec.name.name.clone(),
                    pkg_path,
                    type_params: spec.type_params.clone(),
                    fields: self.collect_fields(fields),
                    methods: Default::default(),
                    env: sc.env.clone(),
                    file: sc.fs.clone(),
                })),
                ast::Expr::InterfaceType { elems, .. } => {
                    TypeDescr::Interface(Rc::new(self.build_interface_def(&spec.name.name, &pkg_path, elems, sc)))
                }
                other => TypeDescr::Alias(Rc::new(AliasDef {
                    name: spec.name.name.clone(),
                    pkg_path,
                    type_params: spec.type_params.clone(),
                    target: other.clone(),
                    is_alias: spec.alias,
                    env: sc.env.clone(),
                    file: sc.fs.clone(),
                    resolved: Default::default(),
                    methods: Default::default(),
                })),
            };
            sc.env
                .declare_type(&spec.name.name, Value::Type(Rc::new(descr)))
                .map_err(|msg| self.fail(ErrorKind::Resolution, msg, &sc.file, spec.pos))?;
        }
        Ok(())
    }
}
