#![no_main]
use libfuzzer_sys::{arbitrary::Unstructured, fuzz_target};

use cordyceps_rbtree::model::{run_btree_equivalence, Op};

// Decodes ops until the input runs out, so a truncated tail still replays its prefix.
fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let ops: Vec<Op> = u
        .arbitrary_iter::<Op>()
        .map(|ops| ops.map_while(Result::ok).collect())
        .unwrap_or_default();

    run_btree_equivalence(ops);
});
