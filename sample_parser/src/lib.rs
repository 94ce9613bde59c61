use std::sync::Arc;

use anyhow::Result;
use atn_runtime::{
    atn::builder::{
        alt, lit, one_of, plus, pred, range, rule, seq, star, tok, Assoc, Element, Operator,
    },
    error::RecordingListener,
    lexer::LexerAction,
    parser::{NoParserHooks, ParserHooks},
    AtnBuilder, CompiledGrammar, RecognizerFactory, SimulatorOptions,
};
use lazy_static::lazy_static;

/// Tokens of a small expression language.
pub fn expr_lexer_grammar() -> Result<CompiledGrammar> {
    let mut b = AtnBuilder::lexer("ExprLexer");
    // keywords come before ID so that they win ties
    b.rule("IF", lit("if"))
        .rule("ID", plus(range('a', 'z')))
        .rule("INT", plus(range('0', '9')))
        .rule("EQ", lit("="))
        .rule("EQEQ", lit("=="))
        .rule("PLUS", lit("+"))
        .rule("MINUS", lit("-"))
        .rule("STAR", lit("*"))
        .rule("SLASH", lit("/"))
        .rule("CARET", lit("^"))
        .rule("LPAREN", lit("("))
        .rule("RPAREN", lit(")"))
        .rule("SEMI", lit(";"))
        .rule(
            "WS",
            seq(vec![
                plus(one_of(" \t\r\n")),
                Element::LexerCmd(LexerAction::Skip),
            ]),
        )
        .rule(
            "COMMENT",
            seq(vec![
                lit("#"),
                star(Element::NotSet(
                    atn_runtime::atn::IntervalSet::from_ranges(&[('\n' as i32, '\n' as i32)]),
                )),
                Element::LexerCmd(LexerAction::Channel(atn_runtime::token::HIDDEN_CHANNEL)),
            ]),
        );
    b.build()
}

/// Statements over expressions; `expr` is left-recursive with `^` binding
/// tightest (right-associative), then `*` `/`, then `+` `-`.
pub fn expr_parser_grammar(lexer: &CompiledGrammar) -> Result<CompiledGrammar> {
    let mut b = AtnBuilder::parser("Expr", &lexer.info);
    b.rule("prog", seq(vec![plus(rule("stat")), Element::Eof]))
        .rule(
            "stat",
            alt(vec![
                seq(vec![tok("ID"), lit("="), rule("expr"), lit(";")]),
                seq(vec![tok("IF"), rule("expr"), rule("stat")]),
                seq(vec![rule("expr"), lit(";")]),
            ]),
        )
        .left_recursive_rule(
            "expr",
            vec![
                tok("INT"),
                tok("ID"),
                seq(vec![lit("("), rule("expr"), lit(")")]),
            ],
            vec![
                Operator::Binary(lit("^"), Assoc::Right),
                Operator::Binary(alt(vec![lit("*"), lit("/")]), Assoc::Left),
                Operator::Binary(alt(vec![lit("+"), lit("-")]), Assoc::Left),
            ],
        );
    b.build()
}

/// `s: a | b; a: ID; b: ID;` where both alternatives match the same
/// input, plus `cs`, whose decision in `cse` needs the invoking rule to
/// tell its alternatives apart.
pub fn ambiguous_parser_grammar(lexer: &CompiledGrammar) -> Result<CompiledGrammar> {
    let mut b = AtnBuilder::parser("Ambig", &lexer.info);
    b.rule("s", alt(vec![rule("a"), rule("b")]))
        .rule("a", tok("ID"))
        .rule("b", tok("ID"))
        .rule(
            "cs",
            alt(vec![
                seq(vec![lit("="), rule("csa")]),
                seq(vec![lit("("), rule("csb")]),
            ]),
        )
        .rule("csa", seq(vec![rule("cse"), tok("ID")]))
        .rule("csb", seq(vec![rule("cse"), tok("INT"), tok("ID")]))
        .rule("cse", alt(vec![tok("INT"), seq(vec![])]));
    b.build()
}

/// `p` picks between two identical alternatives with predicates 0 and 1;
/// `sums` has a decision whose first alternative ends the rule early.
pub fn guarded_parser_grammar(lexer: &CompiledGrammar) -> Result<CompiledGrammar> {
    let mut b = AtnBuilder::parser("Guarded", &lexer.info);
    b.rule(
        "p",
        alt(vec![
            seq(vec![pred(0), rule("a")]),
            seq(vec![pred(1), rule("b")]),
        ]),
    )
    .rule("a", tok("ID"))
    .rule("b", tok("ID"))
    .rule("sums", seq(vec![rule("sum"), Element::Eof]))
    .rule(
        "sum",
        alt(vec![
            tok("INT"),
            seq(vec![tok("INT"), lit("+"), tok("INT")]),
        ]),
    );
    b.build()
}

lazy_static! {
    pub static ref EXPR_LEXER: CompiledGrammar = expr_lexer_grammar().unwrap();
    pub static ref EXPR_PARSER: CompiledGrammar = expr_parser_grammar(&EXPR_LEXER).unwrap();
    pub static ref AMBIG_PARSER: CompiledGrammar =
        ambiguous_parser_grammar(&EXPR_LEXER).unwrap();
    pub static ref GUARDED_PARSER: CompiledGrammar =
        guarded_parser_grammar(&EXPR_LEXER).unwrap();
}

/// A lexer factory and a parser factory that share nothing but the
/// vocabulary, with console output turned off.
pub struct Recognizers {
    pub lexer: RecognizerFactory,
    pub parser: RecognizerFactory,
}

impl Recognizers {
    pub fn new(parser: &CompiledGrammar, options: SimulatorOptions) -> Self {
        let mut lexer = RecognizerFactory::with_options(&EXPR_LEXER, options.clone()).unwrap();
        lexer.quiet();
        let mut parser = RecognizerFactory::with_options(parser, options).unwrap();
        parser.quiet();
        Recognizers { lexer, parser }
    }

    pub fn expr() -> Self {
        Self::new(&EXPR_PARSER, SimulatorOptions::default())
    }

    pub fn ambig() -> Self {
        Self::new(&AMBIG_PARSER, SimulatorOptions::default())
    }

    /// Token types and texts, `TYPE:text`, separated by spaces.
    pub fn tokens(&self, input: &str) -> String {
        let mut lexer = self.lexer.lexer(input).unwrap();
        let info = self.lexer.info().clone();
        lexer
            .all_tokens()
            .iter()
            .map(|t| {
                let name = info
                    .symbolic_name(t.ttype)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| t.ttype.to_string());
                let text = t
                    .text
                    .clone()
                    .or_else(|| lexer_text(input, t.span.clone()))
                    .unwrap_or_default();
                format!("{}:{}", name, text)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parses `input` from `rule` and returns the LISP-style tree, with
    /// every listener event recorded.
    pub fn parse(&self, rule: &str, input: &str) -> ParseOutcome {
        self.parse_with_hooks(rule, input, Box::new(NoParserHooks))
    }

    /// Like `parse`, with predicates and actions answered by `hooks`.
    pub fn parse_with_hooks(
        &self,
        rule: &str,
        input: &str,
        hooks: Box<dyn ParserHooks + Send>,
    ) -> ParseOutcome {
        let events = Arc::new(RecordingListener::new());
        let mut lexer = self.lexer.lexer(input).unwrap();
        lexer.add_error_listener(events.clone());
        let mut parser = self.parser.parser_for(lexer).unwrap().with_hooks(hooks);
        parser.add_error_listener(events.clone());
        let root = parser.parse_rule(rule).unwrap();
        ParseOutcome {
            tree: parser.to_string_tree(root),
            num_syntax_errors: parser.num_syntax_errors(),
            events,
        }
    }
}

fn lexer_text(input: &str, span: std::ops::Range<usize>) -> Option<String> {
    Some(input.chars().skip(span.start).take(span.len()).collect())
}

pub struct ParseOutcome {
    pub tree: String,
    pub num_syntax_errors: usize,
    pub events: Arc<RecordingListener>,
}

impl ParseOutcome {
    pub fn syntax_errors(&self) -> Vec<String> {
        self.events.syntax_errors()
    }
}

/// Checks the token rendering of `input`.
pub fn check_tokens(input: &str, expected: &str) {
    let r = Recognizers::expr();
    assert_eq!(r.tokens(input), expected, "tokens of {:?}", input);
}

/// Checks that `input` parses from `rule` without errors into `expected`.
pub fn check_parse(rule: &str, input: &str, expected: &str) {
    let r = Recognizers::expr();
    let out = r.parse(rule, input);
    assert_eq!(out.syntax_errors(), Vec::<String>::new(), "errors in {:?}", input);
    assert_eq!(out.tree, expected, "tree of {:?}", input);
}
