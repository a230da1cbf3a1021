use thiserror::Error;

use crate::dashboard::DashboardSnapshot;
use crate::request::Decision;

pub const HELP: &str = "commands: a <id|#n> [comment] | r <id|#n> [comment] | refresh | dismiss | help | quit\n\
     (#n is a list position; a bare number is an id if one matches, else a position)";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing request id or list position")]
    MissingTarget,

    #[error("no request at position {0}")]
    NoSuchPosition(usize),
}

/// One line typed at the watch prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptCommand {
    Decide {
        request_id: String,
        decision: Decision,
        comment: Option<String>,
    },
    Refresh,
    Dismiss,
    Help,
    Quit,
    Empty,
}

/// Parse a prompt line. Targets are a request id or the 1-based position
/// shown in the current snapshot. `#2` is always a position; a bare `2`
/// is a position only when no visible request has that id.
pub fn parse(line: &str, snapshot: &DashboardSnapshot) -> Result<PromptCommand, PromptError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let decision = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(PromptCommand::Empty),
        "a" | "approve" => Decision::Approved,
        "r" | "reject" => Decision::Rejected,
        "f" | "refresh" => return Ok(PromptCommand::Refresh),
        "d" | "dismiss" => return Ok(PromptCommand::Dismiss),
        "h" | "help" | "?" => return Ok(PromptCommand::Help),
        "q" | "quit" | "exit" => return Ok(PromptCommand::Quit),
        other => return Err(PromptError::UnknownCommand(other.to_string())),
    };

    let (target, comment) = match rest.split_once(char::is_whitespace) {
        Some((target, comment)) => (target, Some(comment.trim().to_string())),
        None => (rest, None),
    };
    if target.is_empty() {
        return Err(PromptError::MissingTarget);
    }

    Ok(PromptCommand::Decide {
        request_id: resolve_target(target, snapshot)?,
        decision,
        comment: comment.filter(|c| !c.is_empty()),
    })
}

fn resolve_target(target: &str, snapshot: &DashboardSnapshot) -> Result<String, PromptError> {
    let position = match target.strip_prefix('#') {
        Some(position) => position,
        None if snapshot.requests.iter().any(|r| r.request_id == target) => {
            return Ok(target.to_string());
        }
        None => target,
    };
    match position.parse::<usize>() {
        Ok(n) => snapshot
            .requests
            .get(n.wrapping_sub(1))
            .map(|r| r.request_id.clone())
            .ok_or(PromptError::NoSuchPosition(n)),
        Err(_) => Ok(target.to_string()),
    }
}
