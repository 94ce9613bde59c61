use std::sync::{Arc, Mutex};

use atn_runtime::{
    atn::builder::{lit, plus, range, seq, Element},
    error::RecordingListener,
    lexer::{CharStream, LexerAction, LexerHooks, LexerState},
    AtnBuilder, RecognizerFactory,
};
use sample_parser::*;

#[test]
fn test_keywords_and_longest_match() {
    check_tokens("if iff x", "IF:if ID:iff ID:x");
    check_tokens("a==b=c", "ID:a EQEQ:== ID:b EQ:= ID:c");
    check_tokens("===", "EQEQ:== EQ:=");
    check_tokens("x1", "ID:x INT:1");
    check_tokens("", "");
}

#[test]
fn test_skip_and_hidden_channel() {
    check_tokens("  (1 +\t2)\n", "LPAREN:( INT:1 PLUS:+ INT:2 RPAREN:)");
    check_tokens("a # note\nb", "ID:a COMMENT:# note ID:b");
}

#[test]
fn test_recognition_error() {
    let r = Recognizers::expr();
    let events = Arc::new(RecordingListener::new());
    let mut lexer = r.lexer.lexer("a @ b").unwrap();
    lexer.add_error_listener(events.clone());
    let tokens = lexer.all_tokens();
    assert_eq!(tokens.len(), 2);
    assert_eq!(
        events.syntax_errors(),
        vec!["line 1:2 token recognition error at: '@'".to_string()]
    );
}

#[test]
fn test_line_and_column() {
    let r = Recognizers::expr();
    let mut lexer = r.lexer.lexer("x\n  yy").unwrap();
    let tokens = lexer.all_tokens();
    assert_eq!(tokens.len(), 2);
    assert_eq!((tokens[0].line, tokens[0].column), (1, 0));
    assert_eq!((tokens[1].line, tokens[1].column), (2, 2));
}

fn string_lexer() -> RecognizerFactory {
    let mut b = AtnBuilder::lexer("Strings");
    b.rule(
        "QUOTE",
        seq(vec![lit("\""), Element::LexerCmd(LexerAction::PushMode(1))]),
    )
    .rule("ID", plus(range('a', 'z')))
    .mode("STR")
    .rule(
        "TEXT",
        plus(Element::NotSet(atn_runtime::atn::IntervalSet::from_ranges(
            &[('"' as i32, '"' as i32)],
        ))),
    )
    .rule(
        "END",
        seq(vec![lit("\""), Element::LexerCmd(LexerAction::PopMode)]),
    );
    let mut f = RecognizerFactory::new(&b.build().unwrap()).unwrap();
    f.quiet();
    f
}

#[test]
fn test_modes() {
    let f = string_lexer();
    assert_eq!(f.info().mode_names, vec!["DEFAULT_MODE", "STR"]);
    let mut lexer = f.lexer("ab\"x y\"c").unwrap();
    let names: Vec<String> = lexer
        .all_tokens()
        .iter()
        .map(|t| f.info().display_name(t.ttype))
        .collect();
    assert_eq!(names, vec!["ID", "QUOTE", "TEXT", "END", "ID"]);
}

struct RecordPositions(Arc<Mutex<Vec<usize>>>);

impl LexerHooks for RecordPositions {
    fn action(
        &mut self,
        _state: &mut LexerState,
        input: &dyn CharStream,
        _rule_index: usize,
        _action_index: usize,
    ) {
        self.0.lock().unwrap().push(input.index());
    }
}

#[test]
fn test_position_dependent_action() {
    let mut b = AtnBuilder::lexer("Actions");
    b.rule("X", seq(vec![lit("a"), Element::Action(0), lit("b")]));
    let mut f = RecognizerFactory::new(&b.build().unwrap()).unwrap();
    f.quiet();

    let seen = Arc::new(Mutex::new(vec![]));
    let mut lexer = f
        .lexer("abab")
        .unwrap()
        .with_hooks(Box::new(RecordPositions(seen.clone())));
    let tokens = lexer.all_tokens();
    assert_eq!(tokens.len(), 2);
    // the action runs with the input right after each 'a'
    assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
}

#[test]
fn test_dfa_reuse() {
    let r = Recognizers::expr();
    r.tokens("abc + 12");
    let states = r.lexer.dfa_cache().total_states();
    assert!(states > 0);
    let mut lexer = r.lexer.lexer("abc + 12").unwrap();
    lexer.all_tokens();
    assert_eq!(r.lexer.dfa_cache().total_states(), states);
    assert!(lexer.stats().dfa_hits > 0);
}
