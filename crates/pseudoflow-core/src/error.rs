use thiserror::Error;

use crate::node::NodeId;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Internal-consistency failures of graph construction.
///
/// Builder operations never hand these back to the traversal: a traversal
/// that mismatches enter/exit calls or rebinds a label is broken, and
/// [`internal_error`] aborts construction. Only the outer surfaces
/// (configuration loading, [`finish`](crate::ControlFlowInstructionsGenerator::finish))
/// return them as values.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("label `{label}` is already bound at position {position}")]
    LabelAlreadyBound { label: String, position: usize },

    #[error("label `{label}` belongs to pseudocode {owner}, not to pseudocode {pseudocode}")]
    ForeignLabel {
        label: String,
        owner: u32,
        pseudocode: u32,
    },

    #[error("subroutine {subroutine} finished with unbound labels: {}", labels.join(", "))]
    UnboundLabels {
        subroutine: NodeId,
        labels: Vec<String>,
    },

    #[error("subroutine {subroutine} finished without its {terminal} instruction")]
    MissingTerminal {
        subroutine: NodeId,
        terminal: &'static str,
    },

    #[error("block scope mismatch: expected {expected}, found {found}")]
    ScopeMismatch { expected: String, found: String },

    #[error("no open block scope for node {0}")]
    UnknownBlock(NodeId),

    #[error("no active builder; enter a subroutine first")]
    NoActiveBuilder,

    #[error("pseudocode for subroutine {0} is already finalized")]
    AlreadyFinalized(NodeId),

    #[error("traversal finished with {builders} open subroutine(s) and {scopes} open block scope(s)")]
    UnclosedScopes { builders: usize, scopes: usize },

    #[error("invalid generator configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::Config(err.to_string())
    }
}

/// Aborts graph construction on a traversal or API misuse.
#[cold]
#[track_caller]
pub(crate) fn internal_error(err: FlowError) -> ! {
    tracing::error!(error = %err, "control-flow construction failed");
    panic!("internal consistency failure: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_labels_message_lists_labels() {
        let err = FlowError::UnboundLabels {
            subroutine: NodeId(4),
            labels: vec!["l1".to_string(), "l7".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "subroutine n4 finished with unbound labels: l1, l7"
        );
    }

    #[test]
    fn test_config_error_from_json() {
        let err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = FlowError::from(err);
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    #[should_panic(expected = "internal consistency failure: no open block scope for node n9")]
    fn test_internal_error_panics_with_message() {
        internal_error(FlowError::UnknownBlock(NodeId(9)));
    }
}
