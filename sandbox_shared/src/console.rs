//! Operator console.
//!
//! Commands are whole, already-trimmed lines of the form
//! `category command [input]`, for example `chat broadcast hello` or
//! `system exit`. A [`CommandSet`] maps the two-level key to an action
//! token chosen at registration time; the caller matches on the token and
//! executes with whatever state it owns. Unrecognized input reports help
//! text, it never errors.
//!
//! Line intake runs on a dedicated blocking thread that hands complete
//! lines to the simulation through a bounded channel, polled once per
//! iteration, so the simulation thread never blocks on stdin.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::info;

/// Top-level command grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    Info,
    System,
    Chat,
}

impl CommandCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandCategory::Info => "info",
            CommandCategory::System => "system",
            CommandCategory::Chat => "chat",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(CommandCategory::Info),
            "system" => Some(CommandCategory::System),
            "chat" => Some(CommandCategory::Chat),
            _ => None,
        }
    }
}

/// Outcome of resolving one console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<A> {
    /// A registered command matched; `input` is the remainder of the line.
    Matched { action: A, input: String },
    /// The line was empty.
    Empty,
    /// The first token is not a known category.
    UnknownCategory,
    /// The category is known but no command under it matched.
    UnknownCommand(CommandCategory),
}

struct Command<A> {
    category: CommandCategory,
    name: String,
    action: A,
}

/// Registry of console commands keyed by `category command`.
pub struct CommandSet<A> {
    commands: Vec<Command<A>>,
}

impl<A> Default for CommandSet<A> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

impl<A: Copy> CommandSet<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under `category name`. Dispatch is resolved
    /// against this table; the first registration wins on duplicates.
    pub fn register(&mut self, category: CommandCategory, name: &str, action: A) {
        self.commands.push(Command {
            category,
            name: name.to_string(),
            action,
        });
    }

    /// Resolves a line to at most one registered action.
    pub fn resolve(&self, line: &str) -> Resolution<A> {
        let line = line.trim();
        if line.is_empty() {
            return Resolution::Empty;
        }

        let (category_str, rest) = match line.split_once(' ') {
            Some((head, tail)) => (head, tail.trim_start()),
            None => (line, ""),
        };
        let Some(category) = CommandCategory::parse(category_str) else {
            return Resolution::UnknownCategory;
        };

        let (name, input) = match rest.split_once(' ') {
            Some((head, tail)) => (head, tail),
            None => (rest, ""),
        };

        for command in &self.commands {
            if command.category == category && command.name == name {
                return Resolution::Matched {
                    action: command.action,
                    input: input.to_string(),
                };
            }
        }
        Resolution::UnknownCommand(category)
    }

    /// Names of the commands registered under `category`.
    pub fn commands_in(&self, category: CommandCategory) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| c.category == category)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Logs help for an unresolved line. Never an error: operators typo.
    pub fn report_unmatched(&self, resolution: &Resolution<A>) {
        match resolution {
            Resolution::UnknownCategory => {
                info!("unknown category; available: info, system, chat");
            }
            Resolution::UnknownCommand(category) => {
                info!(
                    category = category.as_str(),
                    available = ?self.commands_in(*category),
                    "unknown command"
                );
            }
            Resolution::Empty | Resolution::Matched { .. } => {}
        }
    }
}

/// Spawns the blocking stdin reader thread.
///
/// Lines are trimmed; empty lines are skipped. The returned receiver is
/// the single consumer, drained non-blockingly once per simulation
/// iteration. The thread stops when the receiver is dropped or stdin
/// closes.
pub fn spawn_stdin_reader(buffer: usize) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel::<String>(buffer);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if tx.blocking_send(trimmed.to_string()).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Action {
        Exit,
        Broadcast,
        Network,
    }

    fn sample_set() -> CommandSet<Action> {
        let mut set = CommandSet::new();
        set.register(CommandCategory::System, "exit", Action::Exit);
        set.register(CommandCategory::Chat, "broadcast", Action::Broadcast);
        set.register(CommandCategory::Info, "network", Action::Network);
        set
    }

    #[test]
    fn resolves_category_command_and_input() {
        let set = sample_set();
        assert_eq!(
            set.resolve("chat broadcast hello world"),
            Resolution::Matched {
                action: Action::Broadcast,
                input: "hello world".to_string()
            }
        );
        assert_eq!(
            set.resolve("system exit"),
            Resolution::Matched {
                action: Action::Exit,
                input: String::new()
            }
        );
    }

    #[test]
    fn unknown_input_never_errors() {
        let set = sample_set();
        assert_eq!(set.resolve("bogus nonsense"), Resolution::UnknownCategory);
        assert_eq!(
            set.resolve("system reboot"),
            Resolution::UnknownCommand(CommandCategory::System)
        );
        assert_eq!(set.resolve("   "), Resolution::Empty);
        // Category alone with no command.
        assert_eq!(
            set.resolve("system"),
            Resolution::UnknownCommand(CommandCategory::System)
        );
    }

    #[test]
    fn at_most_one_handler_matches() {
        let mut set = sample_set();
        // A duplicate registration never shadows the first.
        set.register(CommandCategory::System, "exit", Action::Network);
        assert_eq!(
            set.resolve("system exit"),
            Resolution::Matched {
                action: Action::Exit,
                input: String::new()
            }
        );
    }

    #[test]
    fn help_lists_category_commands() {
        let set = sample_set();
        assert_eq!(set.commands_in(CommandCategory::System), vec!["exit"]);
    }
}
