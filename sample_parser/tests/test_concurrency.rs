use std::{collections::HashSet, sync::Arc, thread};

use atn_runtime::dfa::DfaCache;
use sample_parser::*;

const INPUTS: &[&str] = &[
    "1+2*3;",
    "x = (1+2)*y;",
    "if a if b c = 2^3^4; d;",
    "a = b - c - d / e;",
    "((((1))));",
    "x = 1; y = x * x + 1; if y z;",
];

fn assert_unique_states(cache: &DfaCache) {
    for d in 0..cache.len() {
        let dfa = cache.dfa(d);
        let mut seen = HashSet::new();
        let mut numbers = HashSet::new();
        for s in dfa.states() {
            assert!(seen.insert(s.configs.key()), "duplicate state in dfa {}", d);
            assert!(numbers.insert(s.state_number));
        }
    }
}

#[test]
fn test_shared_factories() {
    let sequential = Recognizers::expr();
    let expected: Vec<String> = INPUTS
        .iter()
        .map(|i| sequential.parse("prog", i).tree)
        .collect();

    let shared = Arc::new(Recognizers::expr());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut trees = vec![String::new(); INPUTS.len()];
                for k in 0..INPUTS.len() * 3 {
                    let idx = (t + k) % INPUTS.len();
                    let out = shared.parse("prog", INPUTS[idx]);
                    assert_eq!(out.num_syntax_errors, 0);
                    trees[idx] = out.tree;
                }
                trees
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }

    let parser_cache = shared.parser.dfa_cache();
    let lexer_cache = shared.lexer.dfa_cache();
    assert_unique_states(&parser_cache);
    assert_unique_states(&lexer_cache);
    assert_eq!(
        parser_cache.total_states(),
        sequential.parser.dfa_cache().total_states()
    );
    assert_eq!(
        lexer_cache.total_states(),
        sequential.lexer.dfa_cache().total_states()
    );
}

#[test]
fn test_warm_cache_gives_same_trees() {
    let r = Recognizers::expr();
    let cold: Vec<String> = INPUTS.iter().map(|i| r.parse("prog", i).tree).collect();
    let warm: Vec<String> = INPUTS.iter().map(|i| r.parse("prog", i).tree).collect();
    assert_eq!(cold, warm);
}
