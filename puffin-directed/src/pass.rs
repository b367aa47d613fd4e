//! The distance instrumentation pass.
//!
//! For every basic block whose [`block_key`] is listed in the [`DistanceTable`], the pass injects
//!
//! ```text
//! __libfuzzer_directed_accumulator += distance
//! __libfuzzer_directed_counter += 1
//! ```
//!
//! at the first insertion point of the block.

use std::fmt;

use log::{debug, error, info, trace, warn};

use crate::block::block_key;
use crate::counters::{self, ACCUMULATOR_NAME, COUNTER_NAME};
use crate::distance::DistanceTable;
use crate::ir::{BasicBlock, DebugLoc, Instruction, Module, Op, Operand, Type, ValueNamer};
use crate::options::Options;

/// Which analyses of a unit are still valid after a pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreservedAnalyses {
    All,
    None,
}

/// A transformation applied to one compiled unit at a time.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&mut self, module: &mut Module) -> PreservedAnalyses;
}

/// Progress of the pass on the unit it last ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotLoaded,
    Loaded,
    Provisioned,
    Scanning,
    Done,
    Failed,
}

/// Summary of one run over a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub source_file_name: String,
    pub instrumented: usize,
    pub total: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instrumented != 0 {
            write!(
                f,
                "Instrumented: {} / {} in {}",
                self.instrumented, self.total, self.source_file_name
            )
        } else {
            write!(
                f,
                "No basic blocks instrumented in {}",
                self.source_file_name
            )
        }
    }
}

/// Injects distance feedback into every unit it runs on.
///
/// The [`DistanceTable`] is owned by the caller and shared by all units the pass processes. It is
/// reloaded from [`Options::distance_file`] at the start of every run; entries already present
/// are kept.
pub struct DirectedFuzzingPass<'t> {
    table: &'t mut DistanceTable,
    options: Options,
    state: State,
    history: Vec<State>,
    report: Option<Report>,
}

impl<'t> DirectedFuzzingPass<'t> {
    pub fn new(table: &'t mut DistanceTable, options: Options) -> Self {
        Self {
            table,
            options,
            state: State::NotLoaded,
            history: vec![State::NotLoaded],
            report: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Every state the last run went through, starting with [`State::NotLoaded`].
    pub fn history(&self) -> &[State] {
        &self.history
    }

    /// Summary of the last run, `None` if it failed.
    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn table(&self) -> &DistanceTable {
        &*self.table
    }

    /// The unit is left as it is. Nothing was changed but analyses are not claimed as preserved.
    fn fail(&mut self) -> PreservedAnalyses {
        self.transition(State::Failed);
        PreservedAnalyses::None
    }

    fn transition(&mut self, to: State) {
        trace!("{:?} -> {to:?}", self.state);
        self.state = to;
        self.history.push(to);
    }
}

impl Pass for DirectedFuzzingPass<'_> {
    fn name(&self) -> &'static str {
        "directed-fuzzing"
    }

    fn run(&mut self, module: &mut Module) -> PreservedAnalyses {
        self.state = State::NotLoaded;
        self.history = vec![State::NotLoaded];
        self.report = None;

        match self.table.load(self.options.distance_file()) {
            Ok(stats) => debug!("Loaded distances: {stats:?}"),
            Err(err) => {
                error!("Failed to load basic block distances: {err}");
                return self.fail();
            }
        }
        self.transition(State::Loaded);

        if let Err(err) = counters::provision(module, &self.options.entry_point) {
            error!("Failed to provision counters in {}: {err}", module.name);
            return self.fail();
        }
        self.transition(State::Provisioned);

        self.transition(State::Scanning);
        let report = instrument_module(&*self.table, module);
        info!("{report}");

        self.transition(State::Done);
        self.report = Some(report);

        PreservedAnalyses::None
    }
}

fn instrument_module(table: &DistanceTable, module: &mut Module) -> Report {
    let mut total = 0;
    let mut instrumented = 0;

    for function in module.functions.iter_mut() {
        let mut namer = ValueNamer::for_function(function);

        for block in function.blocks.iter_mut() {
            total += 1;

            let key = block_key(block);
            if key.is_empty() {
                continue;
            }

            let Some(distance) = table.get(&key) else {
                trace!("\t{key} - unknown distance");
                continue;
            };
            trace!("\t{key} - {distance}");

            if instrument_block(block, distance, &mut namer) {
                instrumented += 1;
            } else {
                warn!(
                    "Block {} of {} ({key}) has no insertion point",
                    block.label, function.name
                );
            }
        }
    }

    Report {
        source_file_name: module.source_file_name.clone(),
        instrumented,
        total,
    }
}

/// Adds `distance` to the accumulator and 1 to the counter on entry of `block`.
///
/// The injected instructions take the debug location of the instruction they are inserted
/// before. Returns `false` if the block has no insertion point.
fn instrument_block(block: &mut BasicBlock, distance: i64, namer: &mut ValueNamer) -> bool {
    let Some(index) = block.first_insertion_point() else {
        return false;
    };

    let loc = block
        .instructions
        .get(index)
        .and_then(|inst| inst.debug_loc.clone());

    let mut injected = add_to_global(ACCUMULATOR_NAME, distance, namer, &loc);
    injected.extend(add_to_global(COUNTER_NAME, 1, namer, &loc));
    block.insert(index, injected);

    true
}

fn add_to_global(
    name: &str,
    value: i64,
    namer: &mut ValueNamer,
    loc: &Option<DebugLoc>,
) -> Vec<Instruction> {
    let loaded = namer.fresh();
    let sum = namer.fresh();

    [
        Instruction::named(
            loaded.clone(),
            Op::Load {
                ty: Type::I64,
                ptr: Operand::global(name),
            },
        ),
        Instruction::named(
            sum.clone(),
            Op::Add {
                ty: Type::I64,
                lhs: Operand::local(loaded),
                rhs: Operand::i64(value),
            },
        ),
        Instruction::new(Op::Store {
            ty: Type::I64,
            value: Operand::local(sum),
            ptr: Operand::global(name),
        }),
    ]
    .into_iter()
    .map(|inst| Instruction {
        debug_loc: loc.clone(),
        ..inst
    })
    .collect()
}
