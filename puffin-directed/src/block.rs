use crate::ir::BasicBlock;

/// Derives the key under which a basic block appears in the distance file.
///
/// The key is `<basename>:<line>` of the first instruction whose debug location has a non-empty
/// file name and a non-zero line. Blocks without such an instruction get an empty key and are
/// never instrumented.
///
/// Only the first qualifying location counts, even if the block mixes locations of several
/// inlined call sites, and different blocks may share a key.
pub fn block_key(block: &BasicBlock) -> String {
    block
        .instructions
        .iter()
        .filter_map(|inst| inst.debug_loc.as_ref())
        .find(|loc| !loc.filename.is_empty() && loc.line != 0)
        .map(|loc| format!("{}:{}", basename(&loc.filename), loc.line))
        .unwrap_or_default()
}

/// Strips everything up to the last `/` or `\`.
fn basename(filename: &str) -> &str {
    filename
        .rfind(['/', '\\'])
        .map_or(filename, |pos| &filename[pos + 1..])
}
