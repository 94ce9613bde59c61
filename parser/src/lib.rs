pub mod api;
pub mod atn;
pub mod context;
pub mod dfa;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod rule_deps;
pub mod token;

mod factory;
pub use factory::RecognizerFactory;

mod logging;
pub use logging::{LevelWriter, Logger};

pub use api::{CompiledGrammar, GrammarInfo, PredictionMode, SimulatorOptions, SimulatorStats};
pub use atn::{builder::AtnBuilder, deserializer::AtnDeserializer, Atn};
pub use error::{AtnError, ErrorListener, RecognitionError};
pub use lexer::{InputStream, Lexer};
pub use parser::{CommonTokenStream, ParseTree, ParserInterpreter};
pub use token::Token;

#[macro_export]
macro_rules! infoln {
    ($s:expr, $($arg:tt)*) => {
        if $s.logger.level_enabled(2) {
            use std::fmt::Write;
            writeln!($s.logger.info_logger(), $($arg)*).unwrap();
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($s:expr, $($arg:tt)*) => {
        if $s.logger.level_enabled(1) {
            use std::fmt::Write;
            $s.logger.write_warning("Warning: ");
            writeln!($s.logger.warning_logger(), $($arg)*).unwrap();
        }
    };
}

// Hot-path tracing for the simulators; compiled in only with the
// "logging" feature.
macro_rules! trace {
    ($($arg:tt)*) => {
        if cfg!(feature = "logging") && $crate::TRACE {
            eprintln!($($arg)*);
        }
    }
}

macro_rules! debug {
    ($($arg:tt)*) => {
        if cfg!(feature = "logging") && $crate::DEBUG {
            eprintln!($($arg)*);
        }
    }
}

pub(crate) use {debug, trace};

const TRACE: bool = false;
const DEBUG: bool = false;

#[cfg(test)]
mod tests {
    #[test]
    fn simulator_tracing_is_off() {
        // the "logging" feature must not flood stderr unless switched on here
        assert!(!super::TRACE);
        assert!(!super::DEBUG);
    }
}
