//! Parser side of the runtime: token streams, adaptive prediction, and an
//! interpreter that builds parse trees straight from the automaton.

mod interpreter;
mod simulator;
mod token_stream;
mod tree;

pub use interpreter::{NoParserHooks, ParserHooks, ParserInterpreter};
pub use simulator::ParserAtnSimulator;
pub use token_stream::{CommonTokenStream, ListTokenSource, TokenStream};
pub use tree::{NodeId, NodeKind, ParseTree, TreeNode};
