use std::{env, fs::File, io::Read, sync::Arc};

use atn_runtime::{
    error::RecordingListener, CompiledGrammar, RecognizerFactory, SimulatorOptions,
};
use sample_parser::{EXPR_LEXER, EXPR_PARSER};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 && args.len() != 5 {
        eprintln!(
            "Usage: {} <input> [<lexer.json> <parser.json> <start_rule>]",
            args[0]
        );
        eprintln!("Without grammar files, the built-in expression grammar is used.");
        std::process::exit(1);
    }

    let input = read_file_to_string(&args[1]);
    let (lexer_grammar, parser_grammar, start_rule) = if args.len() == 5 {
        (
            load_grammar(&args[2]),
            load_grammar(&args[3]),
            args[4].clone(),
        )
    } else {
        (EXPR_LEXER.clone(), EXPR_PARSER.clone(), "prog".to_string())
    };

    // set to 2 for more output
    let stderr_log_level = 1;

    let options = SimulatorOptions {
        copy_token_text: true,
        ..SimulatorOptions::default()
    };
    let mut lexer_factory =
        RecognizerFactory::with_options(&lexer_grammar, options.clone()).unwrap();
    lexer_factory.set_stderr_log_level(stderr_log_level);
    let mut parser_factory = RecognizerFactory::with_options(&parser_grammar, options).unwrap();
    parser_factory.set_stderr_log_level(stderr_log_level);
    let events = Arc::new(RecordingListener::new());
    parser_factory.add_error_listener(events.clone());

    let mut lexer = lexer_factory.lexer(&input).unwrap();
    for t in lexer.all_tokens() {
        println!("TOKEN {} {}", lexer_grammar.info.display_name(t.ttype), t);
    }
    let lexer_stats = lexer.stats().clone();
    lexer.reset();

    let mut parser = parser_factory.parser_for(lexer).unwrap();
    let root = match parser.parse_rule(&start_rule) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Parse failed: {}", e);
            std::process::exit(2);
        }
    };

    println!("{}", parser.to_string_tree(root));
    for ev in events.events() {
        println!("EVENT {:?}", ev);
    }
    println!("Lexer stats: {}", serde_json::to_string(&lexer_stats).unwrap());
    println!(
        "Parser stats: {}",
        serde_json::to_string(parser.stats()).unwrap()
    );
    println!(
        "DFA states: {}; syntax errors: {}",
        parser_factory.dfa_cache().total_states(),
        parser.num_syntax_errors()
    );
}

fn load_grammar(filename: &str) -> CompiledGrammar {
    let content = read_file_to_string(filename);
    CompiledGrammar::from_json(&content).expect("Invalid compiled grammar JSON")
}

fn read_file_to_string(filename: &str) -> String {
    let mut file = File::open(filename).expect("Unable to open file");
    let mut content = String::new();
    file.read_to_string(&mut content)
        .expect("Unable to read file");
    content
}
