//! End-to-end script execution: compiles and runs a source string through
//! a real [`HatchArena`], the way a host actually drives this engine.

use gc_arena::ArenaParameters;
use hatchling_core::error::{ErrorChoice, ErrorPresenter, RuntimeError};
use hatchling_core::value::Value;
use hatchling_core::{HatchArena, Root};

/// Fails the test loudly instead of silently swallowing a recoverable
/// error the way a headless host's `LoggingPresenter` would.
struct PanicPresenter;

impl ErrorPresenter for PanicPresenter {
    fn present(&mut self, error: &RuntimeError) -> ErrorChoice {
        panic!("unexpected recoverable runtime error: {error}");
    }
}

fn run_and_read_global(source: &str, global: &str) -> i32 {
    let mut arena = HatchArena::new(ArenaParameters::default(), |mc| Root::new(mc));
    arena.mutate(|mc, root| {
        root.manager.define_global(global, Value::Null);
        let chunk = root.manager.load_module(mc, "test", source).expect("script compiles");
        let mut presenter = PanicPresenter;
        root.manager.run_module(mc, chunk, &mut presenter).expect("script runs");
        root.manager
            .global(global)
            .and_then(|v| v.as_integer())
            .unwrap_or_else(|| panic!("'{global}' was not set to an integer"))
    })
}

/// Scenario 1: constructing an instance runs its initializer (a method
/// named the same as the class), which sets a field another method then
/// reads back.
#[test]
fn class_method_call_emits_expected_value() {
    let source = r#"
        class C {
            C() {
                this.x = 1;
            }
            f() {
                return this.x + 2;
            }
        }
        var c = new C();
        result = c.f();
    "#;
    assert_eq!(run_and_read_global(source, "result"), 3);
}

/// A parent class method resolved across the inheritance chain.
#[test]
fn inherited_method_resolves_through_parent_chain() {
    let source = r#"
        class Base {
            value() {
                return 1;
            }
        }
        class Derived : Base {
        }
        result = new Derived().value();
    "#;
    assert_eq!(run_and_read_global(source, "result"), 1);
}

/// A top-level function call, distinct from the class-method path: it
/// runs through `OP_CALL`/`DefineGlobal` rather than `OP_INVOKE`/`Method`.
#[test]
fn top_level_function_call_emits_expected_value() {
    let source = r#"
        event triple(n) {
            return n * 3;
        }
        result = triple(4);
    "#;
    assert_eq!(run_and_read_global(source, "result"), 12);
}

/// `local const` requires an initialiser at parse time.
#[test]
fn local_const_without_initialiser_is_a_compile_error() {
    let mut arena = HatchArena::new(ArenaParameters::default(), |mc| Root::new(mc));
    arena.mutate(|mc, root| {
        let err = root.manager.load_module(mc, "test", "local const x;");
        assert!(err.is_err());
    });
}
