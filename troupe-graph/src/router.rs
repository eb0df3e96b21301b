use std::sync::Arc;

use troupe_core::{GraphState, StateSchema};

/// Target names chosen by a routing function. `END` is a valid target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Targets(pub(crate) Vec<String>);

impl Targets {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Targets {
    fn from(target: &str) -> Self {
        Targets(vec![target.to_string()])
    }
}

impl From<String> for Targets {
    fn from(target: String) -> Self {
        Targets(vec![target])
    }
}

impl From<Vec<String>> for Targets {
    fn from(targets: Vec<String>) -> Self {
        Targets(targets)
    }
}

impl From<Vec<&str>> for Targets {
    fn from(targets: Vec<&str>) -> Self {
        Targets(targets.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(targets: [&str; N]) -> Self {
        Targets(targets.iter().map(|t| t.to_string()).collect())
    }
}

pub(crate) type RouterFn<S> = Arc<dyn Fn(&GraphState<S>) -> Targets + Send + Sync>;

pub(crate) fn boxed_router<S, F, R>(router: F) -> RouterFn<S>
where
    S: StateSchema,
    F: Fn(&GraphState<S>) -> R + Send + Sync + 'static,
    R: Into<Targets>,
{
    Arc::new(move |state| router(state).into())
}
