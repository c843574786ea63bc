//! Ordered execution of one decision's actions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use soulpilot_core_types::{Action, ActionCatalog, ActionResult, EnvironmentSnapshot, ObserveOptions};

use crate::control::RunControl;
use crate::environment::{ActionContext, SharedEnvironment, SharedInvoker};
use crate::errors::AgentError;

/// Runs a batch of actions, re-checking the environment before every
/// index-based action after the first.
pub struct ActionSequenceExecutor {
    env: SharedEnvironment,
    invoker: SharedInvoker,
    catalog: Arc<ActionCatalog>,
    control: RunControl,
    wait_between_actions: Duration,
}

impl ActionSequenceExecutor {
    pub fn new(
        env: SharedEnvironment,
        invoker: SharedInvoker,
        catalog: Arc<ActionCatalog>,
        control: RunControl,
        wait_between_actions: Duration,
    ) -> Self {
        Self {
            env,
            invoker,
            catalog,
            control,
            wait_between_actions,
        }
    }

    pub fn env(&self) -> &SharedEnvironment {
        &self.env
    }

    pub fn catalog(&self) -> &Arc<ActionCatalog> {
        &self.catalog
    }

    fn is_terminal(&self, action: &Action) -> bool {
        action.is_done() || self.catalog.is_terminal(action)
    }

    /// Execute `actions` in order against the environment last seen as `baseline`.
    ///
    /// Stops after a terminal or erroring result and whenever the page has
    /// drifted from `baseline`. An `Err` means the environment itself failed.
    pub async fn execute_batch(
        &self,
        actions: &[Action],
        baseline: &EnvironmentSnapshot,
        ctx: &ActionContext,
        check_for_new_elements: bool,
    ) -> Result<Vec<ActionResult>, AgentError> {
        let total = actions.len();
        let baseline_identities = baseline.identities();
        let mut results = Vec::with_capacity(total);

        for (i, action) in actions.iter().enumerate() {
            if i > 0 && self.is_terminal(action) {
                debug!(
                    "Done action is allowed only as a single action - stopped after action {i} / {total}."
                );
                break;
            }

            if i > 0 {
                if let Some(index) = action.index() {
                    let fresh = self.env.observe(ObserveOptions::cheap()).await?;
                    if baseline.identity_at(index) != fresh.identity_at(index) {
                        let msg = format!(
                            "Page changed after action: actions {} are not yet executed",
                            remaining_names(&actions[i..])
                        );
                        info!(index, "{msg}");
                        results.push(ActionResult::extracted(msg));
                        break;
                    }

                    let fresh_identities = fresh.identities();
                    if check_for_new_elements && !fresh_identities.is_subset(&baseline_identities) {
                        debug!(
                            "New elements: {}",
                            fresh_identities.len().abs_diff(baseline_identities.len())
                        );
                        let msg = format!(
                            "Something new appeared after action {i} / {total}: actions {} were not executed",
                            remaining_names(&actions[i..])
                        );
                        info!("{msg}");
                        results.push(ActionResult::extracted(msg));
                        break;
                    }
                }

                if !self.wait_between_actions.is_zero() {
                    tokio::time::sleep(self.wait_between_actions).await;
                }
            }

            self.control.check_interrupt()?;

            if action.is_empty() {
                continue;
            }
            if let Err(err) = self.catalog.validate(action) {
                results.push(ActionResult::error(AgentError::InvalidAction(err).to_string()));
                break;
            }

            let started = Instant::now();
            info!(action = action.name(), "  🦾 [ACTION {}/{}] {}", i + 1, total, action);
            let result = match self.invoker.execute(action, self.env.as_ref(), ctx).await {
                Ok(result) => result,
                Err(err) => {
                    error!(
                        "❌ Executing action {} failed in {:.2}s ({}) -> {}",
                        i + 1,
                        started.elapsed().as_secs_f64(),
                        action,
                        err
                    );
                    return Err(err);
                }
            };
            if let Err(err) = result.validate() {
                results.push(ActionResult::error(err.to_string()));
                break;
            }
            debug!(
                "☑️ Executed action {}/{}: {} in {:.2}s",
                i + 1,
                total,
                action,
                started.elapsed().as_secs_f64()
            );

            let stop = result.is_done || result.has_error() || i + 1 == total;
            results.push(result);
            if stop {
                break;
            }
        }

        Ok(results)
    }
}

fn remaining_names(actions: &[Action]) -> String {
    actions
        .iter()
        .map(|action| if action.is_empty() { "unknown" } else { action.name() })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remaining_names_lists_unknown_for_empty() {
        let actions = vec![
            Action::from_value("click", json!({"index": 1})).unwrap(),
            Action::empty(),
        ];
        assert_eq!(remaining_names(&actions), "click, unknown");
    }
}
