use serde::{Deserialize, Serialize};

use crate::token;

/// Which kind of recognizer an automaton drives.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrammarType {
    Lexer,
    Parser,
}

impl GrammarType {
    pub fn from_serialized(v: u16) -> Option<Self> {
        match v {
            0 => Some(GrammarType::Lexer),
            1 => Some(GrammarType::Parser),
            _ => None,
        }
    }

    pub fn serialized(&self) -> u16 {
        match self {
            GrammarType::Lexer => 0,
            GrammarType::Parser => 1,
        }
    }
}

/// How hard the parser prediction simulator tries before settling on an
/// alternative.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PredictionMode {
    /// Local-context prediction only. Conflicts resolve to the lowest
    /// alternative without full-context retry or ambiguity reports.
    Sll,
    /// Local-context prediction, falling back to full-context prediction
    /// when local context is not enough.
    #[default]
    Ll,
    /// Like `Ll`, but keeps consuming lookahead until the ambiguity is
    /// known to be exact.
    LlExactAmbigDetection,
}

/// Per-recognizer knobs; owned by the [`crate::RecognizerFactory`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SimulatorOptions {
    #[serde(default)]
    pub prediction_mode: PredictionMode,

    /// Build parse trees in the interpreter. When disabled the rule
    /// contexts are still tracked but children are not recorded.
    #[serde(default = "default_true")]
    pub build_parse_trees: bool,

    /// Copy token text eagerly out of the character stream.
    #[serde(default)]
    pub copy_token_text: bool,

    /// Run structural checks on the automaton after decoding.
    #[serde(default = "default_true")]
    pub verify_atn: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        SimulatorOptions {
            prediction_mode: PredictionMode::default(),
            build_parse_trees: true,
            copy_token_text: false,
            verify_atn: true,
        }
    }
}

/// Metadata that accompanies a serialized automaton.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GrammarInfo {
    pub name: String,
    pub rule_names: Vec<String>,
    #[serde(default)]
    pub literal_names: Vec<Option<String>>,
    #[serde(default)]
    pub symbolic_names: Vec<Option<String>>,
    #[serde(default)]
    pub mode_names: Vec<String>,
    #[serde(default)]
    pub channel_names: Vec<String>,
    /// Version number of each rule, consumed by the rule dependency checker.
    #[serde(default)]
    pub rule_versions: Vec<i32>,
}

impl GrammarInfo {
    pub fn literal_name(&self, ttype: i32) -> Option<&str> {
        if ttype < 0 {
            return None;
        }
        self.literal_names
            .get(ttype as usize)
            .and_then(|n| n.as_deref())
    }

    pub fn symbolic_name(&self, ttype: i32) -> Option<&str> {
        if ttype == token::EOF {
            return Some("EOF");
        }
        if ttype < 0 {
            return None;
        }
        self.symbolic_names
            .get(ttype as usize)
            .and_then(|n| n.as_deref())
    }

    /// Literal name if there is one, else the symbolic name, else the number.
    pub fn display_name(&self, ttype: i32) -> String {
        if let Some(n) = self.literal_name(ttype) {
            return n.to_string();
        }
        if let Some(n) = self.symbolic_name(ttype) {
            return n.to_string();
        }
        ttype.to_string()
    }

    pub fn token_type(&self, name: &str) -> Option<i32> {
        let lookup = |names: &[Option<String>]| {
            names
                .iter()
                .position(|n| n.as_deref() == Some(name))
                .map(|i| i as i32)
        };
        lookup(&self.symbolic_names).or_else(|| lookup(&self.literal_names))
    }

    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rule_names.iter().position(|n| n == name)
    }

    pub fn rule_name(&self, rule_index: usize) -> &str {
        self.rule_names
            .get(rule_index)
            .map(|s| s.as_str())
            .unwrap_or("<unknown rule>")
    }

    pub fn max_token_type(&self) -> i32 {
        std::cmp::max(self.literal_names.len(), self.symbolic_names.len()) as i32 - 1
    }
}

/// A compiled grammar as a grammar compiler would emit it: metadata plus
/// the serialized automaton words.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CompiledGrammar {
    pub grammar_type: GrammarType,
    pub info: GrammarInfo,
    pub serialized_atn: Vec<u16>,
}

impl CompiledGrammar {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SimulatorStats {
    /// Transitions answered from a cached DFA edge.
    pub dfa_hits: usize,
    /// Transitions that had to be computed by simulating the ATN.
    pub atn_fallbacks: usize,
    pub full_context_fallbacks: usize,
    pub ambiguities: usize,
    pub context_sensitivities: usize,
    pub predictions: usize,
    pub tokens: usize,
    pub compute_time_us: u64,
}

impl SimulatorStats {
    pub fn delta(&self, previous: &SimulatorStats) -> SimulatorStats {
        SimulatorStats {
            dfa_hits: self.dfa_hits - previous.dfa_hits,
            atn_fallbacks: self.atn_fallbacks - previous.atn_fallbacks,
            full_context_fallbacks: self.full_context_fallbacks - previous.full_context_fallbacks,
            ambiguities: self.ambiguities - previous.ambiguities,
            context_sensitivities: self.context_sensitivities - previous.context_sensitivities,
            predictions: self.predictions - previous.predictions,
            tokens: self.tokens - previous.tokens,
            compute_time_us: self.compute_time_us - previous.compute_time_us,
        }
    }

    pub fn max(&self, other: &SimulatorStats) -> SimulatorStats {
        SimulatorStats {
            dfa_hits: self.dfa_hits.max(other.dfa_hits),
            atn_fallbacks: self.atn_fallbacks.max(other.atn_fallbacks),
            full_context_fallbacks: self.full_context_fallbacks.max(other.full_context_fallbacks),
            ambiguities: self.ambiguities.max(other.ambiguities),
            context_sensitivities: self.context_sensitivities.max(other.context_sensitivities),
            predictions: self.predictions.max(other.predictions),
            tokens: self.tokens.max(other.tokens),
            compute_time_us: self.compute_time_us.max(other.compute_time_us),
        }
    }
}
