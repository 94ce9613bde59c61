use atn_runtime::{error::ListenerEvent, parser::ParserHooks, PredictionMode, SimulatorOptions};
use sample_parser::*;

/// Answers predicate `i` with `self.0[i]`.
struct Allow(Vec<bool>);

impl ParserHooks for Allow {
    fn sempred(&mut self, _rule_index: usize, pred_index: usize) -> bool {
        self.0[pred_index]
    }
}

fn guarded_with(mode: PredictionMode) -> Recognizers {
    Recognizers::new(
        &GUARDED_PARSER,
        SimulatorOptions {
            prediction_mode: mode,
            ..SimulatorOptions::default()
        },
    )
}

fn no_viable_alts(out: &ParseOutcome) -> usize {
    out.events
        .events()
        .iter()
        .filter(|e| matches!(e, ListenerEvent::NoViableAlt { .. }))
        .count()
}

fn ambig_with(mode: PredictionMode) -> Recognizers {
    Recognizers::new(
        &AMBIG_PARSER,
        SimulatorOptions {
            prediction_mode: mode,
            ..SimulatorOptions::default()
        },
    )
}

#[test]
fn test_ambiguity_resolves_to_first_alt() {
    let r = Recognizers::ambig();
    // the second run goes through the warm DFA
    for _ in 0..2 {
        let out = r.parse("s", "x");
        assert_eq!(out.tree, "(s (a x))");
        assert_eq!(out.num_syntax_errors, 0);

        let events = out.events.events();
        assert!(matches!(
            events.first(),
            Some(ListenerEvent::AttemptingFullContext { .. })
        ));
        let ambiguities = out.events.ambiguities();
        assert_eq!(ambiguities.len(), 1);
        match &ambiguities[0] {
            ListenerEvent::Ambiguity { alts, exact, .. } => {
                assert_eq!(alts, &vec![1, 2]);
                assert!(!exact);
            }
            e => panic!("unexpected event {:?}", e),
        }
    }
}

#[test]
fn test_predicates_prune_alternatives() {
    for mode in [PredictionMode::Sll, PredictionMode::Ll] {
        let r = guarded_with(mode);
        for _ in 0..2 {
            let out = r.parse_with_hooks("p", "x", Box::new(Allow(vec![false, true])));
            assert_eq!(out.tree, "(p (b x))", "{:?}", mode);
            assert_eq!(out.num_syntax_errors, 0);
            assert!(out.events.ambiguities().is_empty());

            let out = r.parse_with_hooks("p", "x", Box::new(Allow(vec![true, false])));
            assert_eq!(out.tree, "(p (a x))", "{:?}", mode);
            assert_eq!(out.num_syntax_errors, 0);
        }
    }
}

#[test]
fn test_predicates_all_false_no_viable_alt() {
    let r = guarded_with(PredictionMode::Sll);
    let out = r.parse_with_hooks("p", "x", Box::new(Allow(vec![false, false])));
    assert_eq!(no_viable_alts(&out), 1);
    assert_eq!(
        out.syntax_errors(),
        vec!["line 1:0 no viable alternative at input 'x'".to_string()]
    );
}

#[test]
fn test_finished_entry_rule_is_not_a_failure() {
    // after `1` the lookahead `*` matches neither alternative of `sum`,
    // but alternative 1 already completed the rule
    let r = guarded_with(PredictionMode::Ll);
    let out = r.parse("sums", "1 *");
    assert_eq!(no_viable_alts(&out), 0);
    assert_eq!(
        out.syntax_errors(),
        vec!["line 1:2 extraneous input '*' expecting <EOF>".to_string()]
    );
    assert_eq!(out.tree, "(sums (sum 1) * <EOF>)");
}

#[test]
fn test_exact_ambiguity_detection() {
    let r = ambig_with(PredictionMode::LlExactAmbigDetection);
    let out = r.parse("s", "x");
    assert_eq!(out.tree, "(s (a x))");
    let ambiguities = out.events.ambiguities();
    assert_eq!(ambiguities.len(), 1);
    assert!(matches!(
        &ambiguities[0],
        ListenerEvent::Ambiguity { exact: true, .. }
    ));
}

#[test]
fn test_sll_reports_nothing() {
    let r = ambig_with(PredictionMode::Sll);
    let out = r.parse("s", "x");
    assert_eq!(out.tree, "(s (a x))");
    assert_eq!(out.events.events(), vec![]);
}

#[test]
fn test_context_sensitivity() {
    let r = Recognizers::ambig();
    let out = r.parse("cs", "= 34 abc");
    assert_eq!(out.tree, "(cs = (csa (cse 34) abc))");
    assert_eq!(out.num_syntax_errors, 0);
    assert!(out.events.ambiguities().is_empty());
    let sensitivities: Vec<_> = out
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, ListenerEvent::ContextSensitivity { .. }))
        .collect();
    assert_eq!(sensitivities.len(), 1);
    assert!(matches!(
        sensitivities[0],
        ListenerEvent::ContextSensitivity { prediction: 1, .. }
    ));

    let out = r.parse("cs", "( 34 5 abc");
    assert_eq!(out.tree, "(cs ( (csb (cse 34) 5 abc))");
    assert_eq!(out.num_syntax_errors, 0);

    let out = r.parse("cs", "( 5 abc");
    assert_eq!(out.tree, "(cs ( (csb cse 5 abc))");
    assert_eq!(out.num_syntax_errors, 0);
}

#[test]
fn test_prediction_stats() {
    let r = Recognizers::ambig();
    let lexer = r.lexer.lexer("x").unwrap();
    let mut parser = r.parser.parser_for(lexer).unwrap();
    parser.parse_rule("s").unwrap();
    let stats = parser.stats();
    assert_eq!(stats.ambiguities, 1);
    assert_eq!(stats.full_context_fallbacks, 1);
    assert!(stats.predictions >= 1);
}
