pub mod event;
pub mod parser;

pub use event::{AssistType, BombAction, EventKind, KillModifier, LogEvent, PlayerRef, Side};
pub use parser::{classify, parse, ParseError, ParseResult, GRAMMAR_VERSION};
