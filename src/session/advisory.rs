// Parses command advice out of agent-mode replies
//
// The advisor is asked to wrap each suggested command in a
// [COMMAND_RESPONSE] ... [/COMMAND_RESPONSE] block with one field per line.
// Blocks without a command or a description are dropped.

use regex::Regex;

const BLOCK_PATTERN: &str = r"(?s)\[COMMAND_RESPONSE\](.*?)\[/COMMAND_RESPONSE\]";

/// One suggested command, shown as a page the user can flip through
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandAdvisory {
    pub command: String,
    pub description: String,
    pub options: Option<String>,
    pub examples: Option<String>,
}

impl CommandAdvisory {
    fn from_block(content: &str) -> Option<Self> {
        let mut advisory = CommandAdvisory::default();

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(value) = line.strip_prefix("COMMAND:") {
                advisory.command = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("DESCRIPTION:") {
                advisory.description = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("OPTIONS:") {
                advisory.options = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("EXAMPLES:") {
                advisory.examples = Some(value.trim().to_string());
            }
        }

        if advisory.command.is_empty() || advisory.description.is_empty() {
            return None;
        }
        Some(advisory)
    }
}

/// An agent reply, split into prose and structured advice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// No advisory blocks at all
    Plain(String),
    /// At least one block was present
    Advisory {
        /// The reply with every block removed, or the raw reply when
        /// nothing else was left
        text: String,
        /// Well-formed blocks only, possibly none
        advisories: Vec<CommandAdvisory>,
    },
}

impl ParsedReply {
    /// What goes into the conversation transcript
    pub fn text(&self) -> &str {
        match self {
            ParsedReply::Plain(text) | ParsedReply::Advisory { text, .. } => text.as_str(),
        }
    }

    pub fn advisories(&self) -> &[CommandAdvisory] {
        match self {
            ParsedReply::Plain(_) => &[],
            ParsedReply::Advisory { advisories, .. } => advisories.as_slice(),
        }
    }
}

pub struct AdvisoryParser {
    block: Option<Regex>,
}

impl AdvisoryParser {
    pub fn new() -> Self {
        // Compiled once; a pattern that fails to build just means plain replies
        Self {
            block: Regex::new(BLOCK_PATTERN).ok(),
        }
    }

    pub fn parse(&self, reply: &str) -> ParsedReply {
        let Some(block) = &self.block else {
            return ParsedReply::Plain(reply.to_string());
        };

        let contents: Vec<&str> = block
            .captures_iter(reply)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect();

        if contents.is_empty() {
            return ParsedReply::Plain(reply.to_string());
        }

        let advisories = contents
            .into_iter()
            .filter_map(CommandAdvisory::from_block)
            .collect();

        let stripped = block.replace_all(reply, "");
        let stripped = stripped.trim();
        let text = if stripped.is_empty() {
            reply.to_string()
        } else {
            stripped.to_string()
        };

        ParsedReply::Advisory { text, advisories }
    }
}

impl Default for AdvisoryParser {
    fn default() -> Self {
        Self::new()
    }
}
