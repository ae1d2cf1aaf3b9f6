//! Business logic services for the Agri Advisor platform

pub mod conversation;
pub mod input_parser;
pub mod location;
pub mod prompts;
pub mod session;

pub use conversation::{ConversationStateMachine, InitialSummary, TurnResponse};
pub use input_parser::{parse_user_input, ParsedInput};
pub use location::LocationContextBuilder;
pub use session::{SessionRegistry, SessionSnapshot, TurnRequest};
