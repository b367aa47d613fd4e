//! The two global cells the instrumented program updates.
//!
//! Every instrumented unit references the same pair of externally linked 64-bit integers. Only
//! the unit defining the fuzzing entry point gives them a zero initializer, all other units
//! declare them so the linker resolves every reference to that single definition.
//!
//! The injected updates are plain load/add/store sequences. Threads executing instrumented blocks
//! concurrently may lose updates; harnesses treat `accumulator / counter` as an approximate score.

use log::debug;

use crate::error::{Error, Result};
use crate::ir::{ConstantInt, Linkage, Module, Type};

/// Sum of the distances of all instrumented blocks executed so far.
pub const ACCUMULATOR_NAME: &str = "__libfuzzer_directed_accumulator";

/// Number of instrumented block executions so far.
pub const COUNTER_NAME: &str = "__libfuzzer_directed_counter";

/// Symbol identifying the unit which contains the fuzzing entry point.
pub const DEFAULT_ENTRY_POINT: &str = "LLVMFuzzerTestOneInput";

/// Makes sure both counters exist in `module` as mutable, externally linked `i64` globals.
///
/// The counters are defined with a zero initializer if `module` contains `entry_point`, and are
/// otherwise left as declarations. Calling this repeatedly on the same unit is harmless.
pub fn provision(module: &mut Module, entry_point: &str) -> Result<()> {
    let owns_definition = module.get_function(entry_point).is_some();

    let names = [ACCUMULATOR_NAME, COUNTER_NAME];

    // refuse before touching the unit
    for name in names {
        match module.get_named_global(name) {
            Some(global) if global.ty != Type::I64 => {
                return Err(Error::CounterTypeMismatch {
                    name: name.to_string(),
                    found: global.ty,
                })
            }
            _ => {}
        }
    }

    for name in names {
        let global = module.get_or_insert_global(name, Type::I64);
        global.linkage = Linkage::External;
        global.constant = false;
        if owns_definition {
            global.initializer = Some(ConstantInt::null(Type::I64));
        }

        debug!(
            "Provisioned @{name} in {} ({})",
            module.name,
            if owns_definition {
                "definition"
            } else {
                "declaration"
            }
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, GlobalVariable};

    fn harness_unit() -> Module {
        let mut module = Module::new("harness.c");
        module.functions.push(Function::new(DEFAULT_ENTRY_POINT, vec![]));
        module
    }

    #[test_log::test]
    fn test_declares_counters_outside_entry_unit() {
        let mut module = Module::new("lib.c");

        provision(&mut module, DEFAULT_ENTRY_POINT).unwrap();

        for name in [ACCUMULATOR_NAME, COUNTER_NAME] {
            let global = module.get_named_global(name).unwrap();
            assert_eq!(global.ty, Type::I64);
            assert_eq!(global.linkage, Linkage::External);
            assert!(!global.constant);
            assert!(global.is_declaration());
        }
    }

    #[test_log::test]
    fn test_defines_counters_in_entry_unit() {
        let mut module = harness_unit();

        provision(&mut module, DEFAULT_ENTRY_POINT).unwrap();

        for name in [ACCUMULATOR_NAME, COUNTER_NAME] {
            let global = module.get_named_global(name).unwrap();
            assert_eq!(global.initializer, Some(ConstantInt::null(Type::I64)));
        }
    }

    #[test_log::test]
    fn test_provision_is_idempotent() {
        let mut module = harness_unit();

        provision(&mut module, DEFAULT_ENTRY_POINT).unwrap();
        let once = module.clone();
        provision(&mut module, DEFAULT_ENTRY_POINT).unwrap();

        assert_eq!(module, once);
        assert_eq!(module.globals.len(), 2);
    }

    #[test_log::test]
    fn test_fixes_up_existing_global() {
        let mut module = Module::new("lib.c");
        let mut existing = GlobalVariable::new(COUNTER_NAME, Type::I64);
        existing.linkage = Linkage::Internal;
        existing.constant = true;
        module.globals.push(existing);

        provision(&mut module, DEFAULT_ENTRY_POINT).unwrap();

        let global = module.get_named_global(COUNTER_NAME).unwrap();
        assert_eq!(global.linkage, Linkage::External);
        assert!(!global.constant);
        assert_eq!(module.globals.len(), 2);
    }

    #[test_log::test]
    fn test_rejects_mistyped_global() {
        let mut module = Module::new("lib.c");
        module
            .globals
            .push(GlobalVariable::new(ACCUMULATOR_NAME, Type::Int(32)));

        let before = module.clone();
        let result = provision(&mut module, DEFAULT_ENTRY_POINT);

        assert!(matches!(
            result,
            Err(Error::CounterTypeMismatch { found: Type::Int(32), .. })
        ));
        assert_eq!(module, before);
    }

    #[test_log::test]
    fn test_custom_entry_point() {
        let mut module = Module::new("driver.c");
        module.functions.push(Function::new("main", vec![]));

        provision(&mut module, "main").unwrap();

        assert!(!module
            .get_named_global(ACCUMULATOR_NAME)
            .unwrap()
            .is_declaration());
    }
}
