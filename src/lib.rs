//! regex-nfa: compiles regex syntax trees into NFAs ready for determinization.
//!
//! ```
//! use regex_nfa::{compile, AstFlags, NfaConfig, Pattern, RegexAst};
//!
//! // a(b)c
//! let pattern = Pattern::concat([
//!     Pattern::literal("a"),
//!     Pattern::capture(Pattern::literal("b")),
//!     Pattern::literal("c"),
//! ]);
//! let ast = RegexAst::new(&pattern, AstFlags::default()).unwrap();
//! let nfa = compile(&ast, &NfaConfig::default()).unwrap();
//! assert_eq!(nfa.unanchored_entries().len(), 1);
//! ```
//!
//! The automaton keeps capture boundaries, `^`/`$`, fixed-length
//! look-behind, conditionals on capture groups, must-advance matching and
//! one entry per start offset. States are deduplicated by the set of syntax
//! tree positions they stand for; states that can never accept are pruned.

pub mod ast;
pub mod boundaries;
pub mod charset;
mod config;
pub mod nfa;
pub mod util;

use std::fmt;

pub use ast::{AstFlags, Pattern, RegexAst};
pub use boundaries::GroupBoundaries;
pub use charset::CodePointSet;
pub use config::NfaConfig;
pub use nfa::{Nfa, NfaGenerator, NfaState, NfaTransition, OpKind, PackedOp, StateId, TransitionId};

/// Errors produced while building a syntax tree or an automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A size limit was exceeded; `kind` names the counter ("states" or
    /// "transitions").
    AutomatonTooLarge { kind: &'static str, limit: u32 },
    /// The pattern uses a construct the automaton cannot express.
    UnsupportedPattern(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AutomatonTooLarge { kind, limit } => {
                write!(f, "automaton too large: more than {} {}", limit, kind)
            }
            Error::UnsupportedPattern(msg) => write!(f, "unsupported pattern: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Builds the NFA for `ast`.
pub fn compile(ast: &RegexAst, config: &NfaConfig) -> Result<Nfa, Error> {
    NfaGenerator::new(ast, config).generate()
}
