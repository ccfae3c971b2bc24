/// Session modes
///
/// The mode decides where submitted input goes. Command, Chat, Agent and
/// Search form a ring that the cycle chord walks through; Settings sits
/// outside it and is only reached by directive.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Command,
    Chat,
    Agent,
    Search,
    Settings,
}

/// Order of the cycle chord
pub const CYCLE: [Mode; 4] = [Mode::Command, Mode::Chat, Mode::Agent, Mode::Search];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    Forward,
    Backward,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Command => "command",
            Mode::Chat => "chat",
            Mode::Agent => "agent",
            Mode::Search => "search",
            Mode::Settings => "settings",
        }
    }

    /// Next mode in the ring, wrapping at both ends
    ///
    /// Settings does not take part: cycling from it returns Settings.
    pub fn cycle(self, direction: CycleDirection) -> Mode {
        let Some(index) = CYCLE.iter().position(|m| *m == self) else {
            return self;
        };

        let next = match direction {
            CycleDirection::Forward => (index + 1) % CYCLE.len(),
            CycleDirection::Backward => (index + CYCLE.len() - 1) % CYCLE.len(),
        };
        CYCLE[next]
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
