use serde::{Deserialize, Serialize};

/// Whether a code fragment is ready to run. Serialized as a Jupyter
/// `is_complete_reply`, which always carries `indent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "IsCompleteReply", from = "IsCompleteReply")]
pub enum Completeness {
    Complete,
    /// The front-end prompts for another line, prefixed with `indent`.
    Incomplete { indent: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Complete,
    Incomplete,
}

#[derive(Serialize, Deserialize)]
struct IsCompleteReply {
    status: Status,
    #[serde(default)]
    indent: String,
}

impl From<Completeness> for IsCompleteReply {
    fn from(verdict: Completeness) -> Self {
        match verdict {
            Completeness::Complete => IsCompleteReply {
                status: Status::Complete,
                indent: String::new(),
            },
            Completeness::Incomplete { indent } => IsCompleteReply {
                status: Status::Incomplete,
                indent,
            },
        }
    }
}

impl From<IsCompleteReply> for Completeness {
    fn from(reply: IsCompleteReply) -> Self {
        match reply.status {
            Status::Complete => Completeness::Complete,
            Status::Incomplete => Completeness::Incomplete { indent: reply.indent },
        }
    }
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completeness::Complete)
    }
}

/// Decide whether `code` can be executed as it stands.
///
/// Counts `{` and `}` and calls the fragment complete when the counts match.
/// Braces inside quoted strings, comments or after a backslash are counted
/// too, so `puts "{"` reads as incomplete.
pub fn check_completeness(code: &str) -> Completeness {
    let opening = code.chars().filter(|&c| c == '{').count();
    let closing = code.chars().filter(|&c| c == '}').count();

    if opening == closing {
        Completeness::Complete
    } else {
        Completeness::Incomplete {
            indent: String::new(),
        }
    }
}
