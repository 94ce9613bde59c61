use atn_runtime::{PredictionMode, SimulatorOptions};
use proptest::prelude::*;
use sample_parser::*;

fn expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        "[a-z]{1,3}".prop_filter("keyword", |s| s != "if"),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(vec!["+", "-", "*", "/", "^"]), inner.clone())
                .prop_map(|(a, op, b)| format!("{} {} {}", a, op, b)),
            inner.prop_map(|e| format!("({})", e)),
        ]
    })
}

fn stat() -> impl Strategy<Value = String> {
    prop_oneof![
        expr().prop_map(|e| format!("{};", e)),
        ("[a-z]{1,3}".prop_filter("keyword", |s| s != "if"), expr())
            .prop_map(|(id, e)| format!("{} = {};", id, e)),
        expr().prop_map(|e| format!("if {} {};", e, e)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn valid_programs_parse_cleanly(stats in prop::collection::vec(stat(), 1..4)) {
        let input = stats.join("\n");
        let ll = Recognizers::expr().parse("prog", &input);
        prop_assert_eq!(ll.num_syntax_errors, 0, "{}", input);
        prop_assert!(ll.events.ambiguities().is_empty());

        let sll = Recognizers::new(
            &EXPR_PARSER,
            SimulatorOptions {
                prediction_mode: PredictionMode::Sll,
                ..SimulatorOptions::default()
            },
        )
        .parse("prog", &input);
        prop_assert_eq!(sll.tree, ll.tree);
    }

    #[test]
    fn tokens_cover_the_input(input in "[a-z0-9+*/^()=; -]{0,40}") {
        let r = Recognizers::expr();
        let rendered = r.tokens(&input);
        let joined: String = rendered
            .split(' ')
            .filter_map(|t| t.split_once(':').map(|(_, text)| text))
            .collect();
        let expected: String = input.chars().filter(|c| *c != ' ').collect();
        prop_assert_eq!(joined, expected);
    }
}
