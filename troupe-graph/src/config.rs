use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::Observer;

/// Graph-level execution defaults, set on the builder.
///
/// `max_steps` is unset by default: cycles terminate through their own
/// counters, and a limit is only an opt-in safety net.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub max_steps: Option<usize>,
    /// Applied to nodes that have no timeout of their own.
    pub node_timeout: Option<Duration>,
}

impl ExecutionConfig {
    pub fn merge(&self, overrides: &ExecutionOptions) -> Self {
        Self {
            max_steps: overrides.max_steps.or(self.max_steps),
            node_timeout: overrides.node_timeout.or(self.node_timeout),
        }
    }
}

/// Per-invocation overrides.
#[derive(Clone, Default)]
pub struct ExecutionOptions {
    pub max_steps: Option<usize>,
    pub node_timeout: Option<Duration>,
    pub observer: Option<Arc<dyn Observer>>,
    pub cancellation: Option<CancellationToken>,
    pub run_id: Option<String>,
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("max_steps", &self.max_steps)
            .field("node_timeout", &self.node_timeout)
            .field("observer", &self.observer.is_some())
            .field("cancellation", &self.cancellation)
            .field("run_id", &self.run_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_defaults() {
        let config = ExecutionConfig {
            max_steps: Some(10),
            node_timeout: Some(Duration::from_secs(5)),
        };
        let merged = config.merge(&ExecutionOptions {
            max_steps: Some(3),
            ..Default::default()
        });
        assert_eq!(merged.max_steps, Some(3));
        assert_eq!(merged.node_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn default_config_is_unbounded() {
        let merged = ExecutionConfig::default().merge(&ExecutionOptions::default());
        assert_eq!(merged, ExecutionConfig::default());
        assert!(merged.max_steps.is_none());
    }
}
