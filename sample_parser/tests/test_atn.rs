use atn_runtime::{
    atn::{
        builder::{lit, seq, Element},
        serializer,
    },
    lexer::LexerAction,
    rule_deps::{check_dependencies, Dependents, RuleDependency},
    AtnBuilder, AtnDeserializer, AtnError, CompiledGrammar, RecognizerFactory,
};
use sample_parser::*;

#[test]
fn test_deserialize_is_deterministic() {
    for g in [&*EXPR_LEXER, &*EXPR_PARSER, &*AMBIG_PARSER] {
        let a = AtnDeserializer::new().deserialize(&g.serialized_atn).unwrap();
        let b = AtnDeserializer::new().deserialize(&g.serialized_atn).unwrap();
        assert_eq!(a.states.len(), b.states.len());
        assert_eq!(a.decision_to_state, b.decision_to_state);
        assert_eq!(serializer::serialize(&a).unwrap(), g.serialized_atn);
        assert_eq!(serializer::serialize(&b).unwrap(), g.serialized_atn);
    }
}

#[test]
fn test_shifted_form() {
    let shifted = serializer::shift(&EXPR_PARSER.serialized_atn);
    assert_eq!(shifted[0], EXPR_PARSER.serialized_atn[0]);
    let atn = AtnDeserializer::new().deserialize_shifted(&shifted).unwrap();
    assert_eq!(
        serializer::serialize(&atn).unwrap(),
        EXPR_PARSER.serialized_atn
    );
}

#[test]
fn test_version_mismatch() {
    let mut data = EXPR_LEXER.serialized_atn.clone();
    data[0] = 4;
    let err = AtnDeserializer::new().deserialize(&data).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AtnError>(),
        Some(AtnError::VersionMismatch { .. })
    ));
    let mut grammar = EXPR_LEXER.clone();
    grammar.serialized_atn = data;
    assert!(RecognizerFactory::new(&grammar).is_err());
}

#[test]
fn test_unknown_mode_is_rejected() {
    let mut atn = AtnDeserializer::new()
        .deserialize(&EXPR_LEXER.serialized_atn)
        .unwrap();
    for action in [LexerAction::Mode(5), LexerAction::PushMode(1)] {
        atn.lexer_actions.push(action);
        let mut grammar = EXPR_LEXER.clone();
        grammar.serialized_atn = serializer::serialize(&atn).unwrap();
        let err = AtnDeserializer::new()
            .deserialize(&grammar.serialized_atn)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AtnError>(),
            Some(AtnError::Malformed(_))
        ));
        assert!(RecognizerFactory::new(&grammar).is_err());
        atn.lexer_actions.pop();
    }

    let mut b = AtnBuilder::lexer("BadMode");
    b.rule(
        "A",
        seq(vec![lit("a"), Element::LexerCmd(LexerAction::Mode(5))]),
    );
    assert!(b.build().is_err());
}

#[test]
fn test_json_bundle() {
    let json = EXPR_PARSER.to_json();
    let g = CompiledGrammar::from_json(&json).unwrap();
    assert_eq!(g.serialized_atn, EXPR_PARSER.serialized_atn);
    assert_eq!(g.info.rule_names, vec!["prog", "stat", "expr"]);
    let r = Recognizers::new(&g, Default::default());
    let out = r.parse("prog", "1+1;");
    assert_eq!(out.num_syntax_errors, 0);
    assert!(CompiledGrammar::from_json("{\"grammar_type\": 1}").is_err());
}

#[test]
fn test_vocabulary() {
    let info = &EXPR_LEXER.info;
    assert_eq!(info.token_type("IF"), Some(1));
    assert_eq!(info.token_type("'('"), Some(11));
    assert_eq!(info.display_name(11), "'('");
    assert_eq!(info.display_name(2), "ID");
    assert_eq!(info.display_name(-1), "EOF");
    assert_eq!(EXPR_PARSER.info.token_type("SEMI"), Some(13));
}

#[test]
fn test_rule_dependencies() {
    let atn = AtnDeserializer::new()
        .deserialize(&EXPR_PARSER.serialized_atn)
        .unwrap();
    let info = &EXPR_PARSER.info;
    let prog = info.rule_index("prog").unwrap();
    let expr = info.rule_index("expr").unwrap();

    check_dependencies(
        &atn,
        info,
        &[
            RuleDependency::new(prog, 0, &[Dependents::Descendants]),
            RuleDependency::new(expr, 0, &[Dependents::SelfRule, Dependents::Ancestors]),
        ],
    )
    .unwrap();

    let err = check_dependencies(&atn, info, &[RuleDependency::new(expr, 1, &[])])
        .unwrap_err()
        .to_string();
    assert!(err.contains("maximum dependency version 0 (expected 1)"), "{}", err);
}
