use std::fmt;

/// How one stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Succeeded,
    Failed(String),
}

impl ExitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Index of the first failed stage in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureHorizon {
    None,
    At(usize),
}

impl FailureHorizon {
    pub fn from_outcomes(outcomes: &[ExitOutcome]) -> Self {
        outcomes
            .iter()
            .position(ExitOutcome::is_failed)
            .map_or(Self::None, Self::At)
    }

    /// Whether stage `index` has its diagnostics reported.
    ///
    /// Verbose reports everything. Otherwise stages past the first failure are suppressed;
    /// a run without failures reports every stage.
    pub fn reports(self, index: usize, verbose: bool) -> bool {
        match self {
            _ if verbose => true,
            Self::None => true,
            Self::At(first) => index <= first,
        }
    }
}

impl fmt::Display for FailureHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::At(i) => write!(f, "stage {i}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unlinked,
    Linked,
    Running,
    Draining,
    Aggregated,
    Done,
}

/// Everything one stage wrote to its diagnostic stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticBuffer {
    pub index: usize,
    pub bytes: Vec<u8>,
}
