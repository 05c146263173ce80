use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use arc_vfs::VfsPath;
use rhai::{Dynamic, Engine, NativeCallContext, Scope, AST};

use crate::loader::{resolve_module_spec, ScriptLoader};
use crate::{Error, Result};

/// Execution budgets, projected from the effective policy.
#[derive(Debug, Clone)]
pub struct ScriptLimits {
    /// Hard per-invocation operation ceiling.
    pub max_operations: u64,
    /// Wall-clock hang deadline per invocation.
    pub hang_deadline: Duration,
    pub max_call_levels: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 50_000_000,
            hang_deadline: Duration::from_millis(2_000),
            max_call_levels: 128,
            max_string_size: 1 << 20,
            max_array_size: 1 << 20,
            max_map_size: 1 << 20,
        }
    }
}

/// The entry points every cartridge must define.
const ENTRY_POINTS: [&str; 3] = ["init", "update", "draw"];

/// One cartridge's script VM.
pub struct ScriptHost {
    engine: Engine,
    entry_ast: Option<AST>,
    scope: Scope<'static>,
    /// Persistent cartridge state, bound as `this` for every entry-point
    /// call. rhai script functions are pure, so `this` is where a
    /// cartridge keeps its world between ticks.
    state: Dynamic,
    /// Armed before every script invocation; the progress hook aborts the
    /// call once the deadline passes.
    deadline: Rc<Cell<Option<Instant>>>,
    hang_deadline: Duration,
    /// Canonical path -> module value. Partially constructed entries hold
    /// UNIT while their module body still runs, which is what a circular
    /// `require` observes instead of recursing forever.
    module_cache: Rc<RefCell<HashMap<String, Dynamic>>>,
}

impl ScriptHost {
    /// Builds the sandboxed engine: no `import`, no `eval`, budget hooks
    /// installed, `require` wired to the cartridge loader.
    pub fn new(limits: &ScriptLimits, loader: ScriptLoader) -> Self {
        let mut engine = Engine::new();

        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);
        engine.disable_symbol("eval");
        // `import` statements go through the module resolver; pointing it
        // at nothing closes that door entirely.
        engine.set_module_resolver(rhai::module_resolvers::DummyModuleResolver::new());

        let deadline: Rc<Cell<Option<Instant>>> = Rc::new(Cell::new(None));
        let hook_deadline = deadline.clone();
        engine.on_progress(move |_operations| {
            match hook_deadline.get() {
                Some(deadline) if Instant::now() > deadline => Some("hang".into()),
                _ => None,
            }
        });

        let module_cache: Rc<RefCell<HashMap<String, Dynamic>>> =
            Rc::new(RefCell::new(HashMap::new()));
        // Directory stack for relative `require` resolution; the entry
        // script sits at the cartridge root.
        let dir_stack: Rc<RefCell<Vec<VfsPath>>> = Rc::new(RefCell::new(vec![VfsPath::parse(
            "cart:/",
        )
        .expect("static path")]));

        let cache = module_cache.clone();
        let dirs = dir_stack.clone();
        engine.register_fn(
            "require",
            move |context: NativeCallContext<'_>, spec: &str| -> Result<Dynamic, Box<rhai::EvalAltResult>> {
                let requiring_dir = dirs.borrow().last().cloned().expect("dir stack never empty");
                let canonical = resolve_module_spec(spec, &requiring_dir)
                    .map_err(|message| runtime_error(format!("require: {}", message)))?;
                let key = canonical.to_string();

                if let Some(value) = cache.borrow().get(&key) {
                    return Ok(value.clone());
                }

                let source = loader(&key)
                    .map_err(|message| runtime_error(format!("require: {}: {}", key, message)))?;
                let mut ast = context
                    .engine()
                    .compile(&source)
                    .map_err(|err| runtime_error(format!("require: {}: {}", key, err)))?;
                ast.set_source(key.clone());

                // Mark in-progress so a circular require sees a partial
                // value instead of recursing.
                cache.borrow_mut().insert(key.clone(), Dynamic::UNIT);
                dirs.borrow_mut().push(canonical.parent());

                let result = context.engine().eval_ast::<Dynamic>(&ast);

                dirs.borrow_mut().pop();
                match result {
                    Ok(value) => {
                        cache.borrow_mut().insert(key, value.clone());
                        Ok(value)
                    }
                    Err(err) => {
                        cache.borrow_mut().remove(&key);
                        Err(err)
                    }
                }
            },
        );

        Self {
            engine,
            entry_ast: None,
            scope: Scope::new(),
            state: Dynamic::from_map(rhai::Map::new()),
            deadline,
            hang_deadline: limits.hang_deadline,
            module_cache,
        }
    }

    /// The engine, for the runtime to register API modules on.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Compiles and executes the entry script (which pulls in its
    /// transitive `require`s), then verifies the entry points exist.
    pub fn load_entry(&mut self, canonical_path: &str, source: &str) -> Result<()> {
        let mut ast = self.engine.compile(source).map_err(|err| {
            let (line, _) = position_of(err.position());
            Error::Compile {
                message: err.to_string(),
                source_name: canonical_path.to_string(),
                line,
            }
        })?;
        ast.set_source(canonical_path);

        self.arm_watchdog();
        let result = self
            .engine
            .run_ast_with_scope(&mut self.scope, &ast)
            .map_err(|err| self.map_eval_error(*err));
        self.disarm_watchdog();
        result?;

        let mut missing = Vec::new();
        for entry in ENTRY_POINTS {
            let defined = ast
                .iter_functions()
                .any(|function| function.name == entry);
            if !defined {
                missing.push(entry);
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingEntryPoints(missing.join(", ")));
        }

        self.entry_ast = Some(ast);
        Ok(())
    }

    pub fn call_init(&mut self) -> Result<()> {
        self.call_entry("init", ())
    }

    pub fn call_update(&mut self, dt: f64) -> Result<()> {
        self.call_entry("update", (dt,))
    }

    pub fn call_draw(&mut self, alpha: f64) -> Result<()> {
        self.call_entry("draw", (alpha,))
    }

    fn call_entry(&mut self, name: &str, args: impl rhai::FuncArgs) -> Result<()> {
        let Some(ast) = self.entry_ast.as_ref() else {
            return Err(Error::Runtime {
                message: "no entry script loaded".to_string(),
                source_name: None,
                line: None,
            });
        };
        self.deadline
            .set(Some(Instant::now() + self.hang_deadline));
        let options = rhai::CallFnOptions::new()
            .eval_ast(false)
            .bind_this_ptr(&mut self.state);
        let result = self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut self.scope,
            ast,
            name,
            args,
        );
        self.deadline.set(None);
        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(self.map_eval_error(*err)),
        }
    }

    fn arm_watchdog(&self) {
        self.deadline
            .set(Some(Instant::now() + self.hang_deadline));
    }

    fn disarm_watchdog(&self) {
        self.deadline.set(None);
    }

    fn map_eval_error(&self, err: rhai::EvalAltResult) -> Error {
        if is_budget_abort(&err) {
            return Error::HangDetected;
        }
        let position = err.position();
        let (line, _) = position_of(position);
        Error::Runtime {
            message: err.to_string(),
            source_name: self
                .entry_ast
                .as_ref()
                .and_then(|ast| ast.source())
                .map(str::to_string),
            line: if position.is_none() { None } else { Some(line) },
        }
    }

    /// Drops the cached module values. Used on stop/reload before the
    /// engine itself is dropped.
    pub fn clear_module_cache(&mut self) {
        self.module_cache.borrow_mut().clear();
    }
}

fn runtime_error(message: String) -> Box<rhai::EvalAltResult> {
    message.into()
}

/// Budget aborts can surface wrapped in a function-call error frame.
fn is_budget_abort(err: &rhai::EvalAltResult) -> bool {
    use rhai::EvalAltResult::{ErrorInFunctionCall, ErrorTerminated, ErrorTooManyOperations};
    match err {
        ErrorTerminated(..) | ErrorTooManyOperations(..) => true,
        ErrorInFunctionCall(_, _, inner, _) => is_budget_abort(inner),
        _ => false,
    }
}

fn position_of(position: rhai::Position) -> (usize, usize) {
    (
        position.line().unwrap_or(0),
        position.position().unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(files: &[(&str, &str)]) -> ScriptLoader {
        let map: HashMap<String, String> = files
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Rc::new(move |path: &str| {
            map.get(path)
                .cloned()
                .ok_or_else(|| "not found".to_string())
        })
    }

    const ENTRY_STUB: &str = "fn init() {}\nfn update(dt) {}\nfn draw(alpha) {}\n";

    #[test]
    fn entry_points_are_verified() {
        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        let err = host
            .load_entry("cart:/main.rhai", "fn init() {}\nfn update(dt) {}\n")
            .unwrap_err();
        assert!(matches!(err, Error::MissingEntryPoints(ref missing) if missing == "draw"));

        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        host.load_entry("cart:/main.rhai", ENTRY_STUB).unwrap();
        host.call_init().unwrap();
        host.call_update(1.0 / 60.0).unwrap();
        host.call_draw(0.5).unwrap();
    }

    #[test]
    fn this_state_persists_across_entry_calls() {
        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        host.load_entry(
            "cart:/main.rhai",
            r#"
            fn init() { this.ticks = 0; }
            fn update(dt) { this.ticks += 1; }
            fn draw(alpha) {
                if this.ticks != 3 { throw `expected 3 ticks, saw ${this.ticks}`; }
            }
            "#,
        )
        .unwrap();
        host.call_init().unwrap();
        for _ in 0..3 {
            host.call_update(1.0 / 60.0).unwrap();
        }
        host.call_draw(0.0).unwrap();
    }

    #[test]
    fn compile_errors_carry_the_source_path() {
        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        let err = host.load_entry("cart:/main.rhai", "fn init( {").unwrap_err();
        match err {
            Error::Compile { source_name, .. } => assert_eq!(source_name, "cart:/main.rhai"),
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn require_resolves_caches_and_returns_module_values() {
        let files = loader(&[(
            "cart:/lib/math.rhai",
            "let value = 21;\nvalue * 2\n",
        )]);
        let mut host = ScriptHost::new(&ScriptLimits::default(), files);
        host.load_entry(
            "cart:/main.rhai",
            r#"
            let a = require("lib/math");
            let b = require("cart:/lib/math.rhai");
            if a != 42 || b != 42 { throw "bad module value"; }
            fn init() {}
            fn update(dt) {}
            fn draw(alpha) {}
            "#,
        )
        .unwrap();
    }

    #[test]
    fn require_rejects_traversal_and_foreign_namespaces() {
        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        let err = host
            .load_entry(
                "cart:/main.rhai",
                "require(\"../etc/passwd\");\nfn init() {}\nfn update(dt) {}\nfn draw(alpha) {}\n",
            )
            .unwrap_err();
        assert!(matches!(err, Error::Runtime { .. }));

        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        assert!(host
            .load_entry(
                "cart:/main.rhai",
                "require(\"save:/x\");\nfn init() {}\nfn update(dt) {}\nfn draw(alpha) {}\n",
            )
            .is_err());
    }

    #[test]
    fn circular_require_returns_the_partial_value() {
        let files = loader(&[
            ("cart:/a.rhai", "let x = require(\"b\");\n\"module-a\"\n"),
            ("cart:/b.rhai", "let y = require(\"a\");\nif y != () { throw \"expected partial\"; }\n\"module-b\"\n"),
        ]);
        let mut host = ScriptHost::new(&ScriptLimits::default(), files);
        host.load_entry(
            "cart:/main.rhai",
            r#"
            let a = require("a");
            if a != "module-a" { throw "wrong value"; }
            fn init() {}
            fn update(dt) {}
            fn draw(alpha) {}
            "#,
        )
        .unwrap();
    }

    #[test]
    fn operation_budget_aborts_runaway_scripts() {
        let limits = ScriptLimits {
            max_operations: 10_000,
            ..ScriptLimits::default()
        };
        let mut host = ScriptHost::new(&limits, loader(&[]));
        host.load_entry(
            "cart:/main.rhai",
            "fn init() {}\nfn update(dt) { loop { } }\nfn draw(alpha) {}\n",
        )
        .unwrap();
        host.call_init().unwrap();
        let err = host.call_update(1.0 / 60.0).unwrap_err();
        assert!(matches!(err, Error::HangDetected));
    }

    #[test]
    fn wall_clock_watchdog_aborts_slow_scripts() {
        let limits = ScriptLimits {
            max_operations: u64::MAX,
            hang_deadline: Duration::from_millis(50),
            ..ScriptLimits::default()
        };
        let mut host = ScriptHost::new(&limits, loader(&[]));
        host.load_entry(
            "cart:/main.rhai",
            "fn init() {}\nfn update(dt) { loop { } }\nfn draw(alpha) {}\n",
        )
        .unwrap();
        let err = host.call_update(1.0 / 60.0).unwrap_err();
        assert!(matches!(err, Error::HangDetected));
    }

    #[test]
    fn import_and_eval_are_closed() {
        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        assert!(host
            .load_entry(
                "cart:/main.rhai",
                "import \"anything\" as x;\nfn init() {}\nfn update(dt) {}\nfn draw(alpha) {}\n",
            )
            .is_err());

        let mut host = ScriptHost::new(&ScriptLimits::default(), loader(&[]));
        assert!(host
            .load_entry(
                "cart:/main.rhai",
                "eval(\"1+1\");\nfn init() {}\nfn update(dt) {}\nfn draw(alpha) {}\n",
            )
            .is_err());
    }
}
