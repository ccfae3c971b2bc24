/// Interactive session
///
/// Mode handling, conversations, agent advice and the settings form, tied
/// together by `SessionController`.

pub mod advisory;
pub mod controller;
pub mod conversation;
pub mod keys;
pub mod mode;
pub mod settings_form;

pub use advisory::{AdvisoryParser, CommandAdvisory, ParsedReply};
pub use controller::{AgentReply, SessionController, Submission, AGENT_UNAVAILABLE};
pub use conversation::{Conversation, Turn, TurnId, TurnKind, TurnStatus};
pub use keys::Key;
pub use mode::{CycleDirection, Mode};
pub use settings_form::{FormOutcome, SettingsForm};
