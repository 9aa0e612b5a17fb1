use crate::{common, error::Result, model::Item};

use std::{collections, fmt, sync::Arc};

/// Lifecycle action a hook is attached to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Action {
    /// Item creation, including `Item::save`.
    Create,
    /// Partial update.
    Update,
    /// Deletion.
    Destroy,
}

/// Hook run before a write; may rewrite the candidate attributes or abort.
pub type BeforeHook = Arc<dyn Fn(common::Attributes) -> Result<common::Attributes> + Send + Sync>;

/// Hook run after a successful write; failures are logged only.
pub type AfterHook = Arc<dyn Fn(&Item) -> Result<()> + Send + Sync>;

/// Before and after hooks of a model, run in registration order.
///
/// ```rust
/// use dynamodb_mapper::model::hooks::{Action, Hooks};
/// use serde_json::Value;
///
/// let hooks = Hooks::default().before(Action::Create, |mut attributes| {
///     attributes.insert("source".to_string(), Value::from("api"));
///     Ok(attributes)
/// });
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    after: collections::HashMap<Action, Vec<AfterHook>>,
    before: collections::HashMap<Action, Vec<BeforeHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |hooks: Option<usize>| hooks.unwrap_or(0);
        f.debug_struct("Hooks")
            .field(
                "before",
                &[Action::Create, Action::Update, Action::Destroy]
                    .map(|action| count(self.before.get(&action).map(Vec::len))),
            )
            .field(
                "after",
                &[Action::Create, Action::Update, Action::Destroy]
                    .map(|action| count(self.after.get(&action).map(Vec::len))),
            )
            .finish()
    }
}

impl Hooks {
    /// Register a hook run before `action`.
    pub fn before<F>(mut self, action: Action, hook: F) -> Self
    where
        F: Fn(common::Attributes) -> Result<common::Attributes> + Send + Sync + 'static,
    {
        self.before.entry(action).or_default().push(Arc::new(hook));
        self
    }

    /// Register a hook run after `action` succeeded.
    pub fn after<F>(mut self, action: Action, hook: F) -> Self
    where
        F: Fn(&Item) -> Result<()> + Send + Sync + 'static,
    {
        self.after.entry(action).or_default().push(Arc::new(hook));
        self
    }

    pub(crate) fn run_before(
        &self,
        action: Action,
        attributes: common::Attributes,
    ) -> Result<common::Attributes> {
        self.before
            .get(&action)
            .into_iter()
            .flatten()
            .try_fold(attributes, |attributes, hook| hook(attributes))
    }

    pub(crate) fn run_after(&self, action: Action, item: &Item) {
        for hook in self.after.get(&action).into_iter().flatten() {
            if let Err(error) = hook(item) {
                #[cfg(feature = "tracing")]
                tracing::warn!(?action, model = item.model().name(), %error, "after hook failed");
                #[cfg(not(feature = "tracing"))]
                let _ = error;
            }
        }
    }
}
