use atn_runtime::{parser::ListTokenSource, PredictionMode, SimulatorOptions};
use sample_parser::*;

#[test]
fn test_statements() {
    check_parse("stat", "x = 1;", "(stat x = (expr 1) ;)");
    check_parse(
        "prog",
        "if x y;",
        "(prog (stat if (expr x) (stat (expr y) ;)) <EOF>)",
    );
    check_parse(
        "prog",
        "a = 1; b;",
        "(prog (stat a = (expr 1) ;) (stat (expr b) ;) <EOF>)",
    );
}

#[test]
fn test_precedence() {
    check_parse(
        "prog",
        "1+2*3;",
        "(prog (stat (expr (expr 1) + (expr (expr 2) * (expr 3))) ;) <EOF>)",
    );
    check_parse(
        "prog",
        "1*2+3;",
        "(prog (stat (expr (expr (expr 1) * (expr 2)) + (expr 3)) ;) <EOF>)",
    );
    check_parse(
        "prog",
        "x = (1+2)*y;",
        "(prog (stat x = (expr (expr ( (expr (expr 1) + (expr 2)) )) * (expr y)) ;) <EOF>)",
    );
}

#[test]
fn test_associativity() {
    check_parse(
        "prog",
        "1-2-3;",
        "(prog (stat (expr (expr (expr 1) - (expr 2)) - (expr 3)) ;) <EOF>)",
    );
    check_parse(
        "prog",
        "2^3^4;",
        "(prog (stat (expr (expr 2) ^ (expr (expr 3) ^ (expr 4))) ;) <EOF>)",
    );
}

#[test]
fn test_same_trees_in_every_mode() {
    let inputs = ["1+2*3;", "x = (1+2)*y;", "if a if b c = 2^3; d;"];
    let expected: Vec<String> = inputs
        .iter()
        .map(|i| Recognizers::expr().parse("prog", i).tree)
        .collect();
    for mode in [PredictionMode::Sll, PredictionMode::LlExactAmbigDetection] {
        let r = Recognizers::new(
            &EXPR_PARSER,
            SimulatorOptions {
                prediction_mode: mode,
                ..SimulatorOptions::default()
            },
        );
        for (input, tree) in inputs.iter().zip(expected.iter()) {
            let out = r.parse("prog", input);
            assert_eq!(out.num_syntax_errors, 0);
            assert_eq!(&out.tree, tree, "{:?} in {:?}", input, mode);
        }
    }
}

#[test]
fn test_mismatched_input() {
    let r = Recognizers::expr();
    let out = r.parse("prog", "1 + ;");
    assert_eq!(out.num_syntax_errors, 1);
    assert_eq!(
        out.syntax_errors(),
        vec!["line 1:4 mismatched input ';' expecting {ID, INT, '('}".to_string()]
    );
}

#[test]
fn test_missing_token() {
    let r = Recognizers::expr();
    let out = r.parse("prog", "x = 1");
    assert_eq!(
        out.syntax_errors(),
        vec!["line 1:5 missing ';' at '<EOF>'".to_string()]
    );
    assert_eq!(
        out.tree,
        "(prog (stat x = (expr 1) <missing ';'>) <EOF>)"
    );
}

#[test]
fn test_extraneous_token() {
    let r = Recognizers::expr();
    let out = r.parse("prog", "1 2;");
    assert_eq!(
        out.syntax_errors(),
        vec!["line 1:2 extraneous input '2' expecting ';'".to_string()]
    );
    assert_eq!(out.tree, "(prog (stat (expr 1) 2 ;) <EOF>)");
}

#[test]
fn test_unknown_rule() {
    let r = Recognizers::expr();
    let lexer = r.lexer.lexer("1;").unwrap();
    let mut parser = r.parser.parser_for(lexer).unwrap();
    assert!(parser.parse_rule("nope").is_err());
}

#[test]
fn test_factory_checks_grammar_type() {
    let r = Recognizers::expr();
    assert!(r.parser.lexer("x").is_err());
    let lexer = r.lexer.lexer("x").unwrap();
    assert!(r.lexer.parser_for(lexer).is_err());
}

#[test]
fn test_clear_dfa() {
    let r = Recognizers::expr();
    r.parse("prog", "1+2;");
    assert!(r.parser.dfa_cache().total_states() > 0);
    r.parser.clear_dfa();
    assert_eq!(r.parser.dfa_cache().total_states(), 0);
    let out = r.parse("prog", "1+2;");
    assert_eq!(out.num_syntax_errors, 0);
}

#[test]
fn test_replayed_tokens() {
    let r = Recognizers::expr();
    let input = "x = 2 * 3;";
    let tokens = r.lexer.lexer(input).unwrap().all_tokens();
    let source = ListTokenSource::new(tokens).with_text(input);
    let mut parser = r.parser.parser_for(source).unwrap();
    let root = parser.parse_rule("stat").unwrap();
    assert_eq!(parser.num_syntax_errors(), 0);
    assert_eq!(
        parser.to_string_tree(root),
        "(stat x = (expr (expr 2) * (expr 3)) ;)"
    );
}
