// View filter over a task collection

use crate::task::Task;

/// Which tasks a view surfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    All,
    Completed,
    Pending,
}

/// Returned by the strict `FromStr` parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown filter: {0} (expected all, completed or pending)")]
pub struct UnknownFilter(pub String);

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::All, Filter::Completed, Filter::Pending];

    /// Parse a filter name, falling back to `All` for anything unrecognized
    pub fn parse_lenient(s: &str) -> Filter {
        s.parse().unwrap_or_default()
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Completed => task.completed,
            Filter::Pending => !task.completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Completed => "completed",
            Filter::Pending => "pending",
        }
    }
}

impl std::str::FromStr for Filter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "completed" => Ok(Filter::Completed),
            "pending" => Ok(Filter::Pending),
            _ => Err(UnknownFilter(s.to_string())),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
