//! Types a fixed string into a fixed list of text fields.
//!
//! For every identifier in [`ExerciseConfig::fields`], in order, the
//! exerciser waits for the matching element to appear, taps it and types
//! [`ExerciseConfig::text`]. The first failing step ends the run; later
//! fields are never touched.
//!
//! The run makes no claims about what the fields contain afterwards. A
//! successful run only means that no step raised an error.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_core::agent_driver::AgentDriver;
//! use tessera_core::driver::AutomationDriver;
//! use tessera_core::exerciser::{ExerciseConfig, FieldExerciser};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut driver = AgentDriver::direct("localhost", 9800);
//! driver.connect().await?;
//! let exerciser = FieldExerciser::new(Arc::new(driver), ExerciseConfig::default());
//! let report = exerciser.run().await?;
//! println!("typed into {:?}", report.fields);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::action::{ActionLog, ActionResult, ActionType};
use crate::driver::{AutomationDriver, DriverError};
use crate::element::UIElement;

/// Field identifiers exercised by default, in order.
pub const DEFAULT_FIELDS: [&str; 3] = ["t_1", "t_2", "t_3"];

/// Text typed into each field by default.
pub const DEFAULT_TEXT: &str = "test";

/// Element type the fields are expected to have.
pub const TEXT_FIELD_TYPE: &str = "TextField";

pub const DEFAULT_IMPLICIT_WAIT: Duration = Duration::from_millis(5000);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum ExerciseError {
    /// No element with the identifier appeared within the wait window.
    #[error("element '{identifier}' not found after {waited_ms}ms")]
    ElementNotFound { identifier: String, waited_ms: u64 },

    /// The element exists but could not be activated or typed into.
    #[error("cannot interact with element '{identifier}': {reason}")]
    InteractionError { identifier: String, reason: String },

    /// The automation backend itself failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ExerciseError {
    /// The field identifier the run stopped at, if the failure is tied to one.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            ExerciseError::ElementNotFound { identifier, .. }
            | ExerciseError::InteractionError { identifier, .. } => Some(identifier),
            ExerciseError::Driver(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExerciseConfig {
    /// Accessibility identifiers, visited in order.
    pub fields: Vec<String>,
    /// Text typed into every field.
    pub text: String,
    /// Only elements of this type match; `None` matches any type.
    pub element_type: Option<String>,
    /// How long to keep looking for each field before giving up.
    pub implicit_wait: Duration,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            text: DEFAULT_TEXT.to_string(),
            element_type: Some(TEXT_FIELD_TYPE.to_string()),
            implicit_wait: DEFAULT_IMPLICIT_WAIT,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ExerciseReport {
    /// Fields typed into, in order.
    pub fields: Vec<String>,
    /// Every step performed.
    pub actions: Vec<ActionLog>,
}

pub struct FieldExerciser {
    driver: Arc<dyn AutomationDriver>,
    config: ExerciseConfig,
}

impl FieldExerciser {
    pub fn new(driver: Arc<dyn AutomationDriver>, config: ExerciseConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &ExerciseConfig {
        &self.config
    }

    /// Runs the whole sequence, stopping at the first error.
    pub async fn run(&self) -> Result<ExerciseReport, ExerciseError> {
        let mut actions = Vec::new();
        let fields = self.run_with_log(&mut actions).await?;
        Ok(ExerciseReport { fields, actions })
    }

    /// Like [`run`](Self::run), but appends every step to `log` as it
    /// happens so the log survives a failed run.
    ///
    /// Returns the fields typed into.
    pub async fn run_with_log(&self, log: &mut Vec<ActionLog>) -> Result<Vec<String>, ExerciseError> {
        let span = info_span!("exercise", fields = self.config.fields.len());
        async {
            let mut typed = Vec::with_capacity(self.config.fields.len());
            for identifier in &self.config.fields {
                let field_span = info_span!("field", id = %identifier);
                match self.exercise_field(identifier, log).instrument(field_span).await {
                    Ok(()) => typed.push(identifier.clone()),
                    Err(e) => {
                        warn!(id = %identifier, error = %e, typed = typed.len(), "exercise halted");
                        return Err(e);
                    }
                }
            }
            info!(typed = typed.len(), "exercise complete");
            Ok(typed)
        }
        .instrument(span)
        .await
    }

    async fn exercise_field(&self, identifier: &str, log: &mut Vec<ActionLog>) -> Result<(), ExerciseError> {
        let element = self.locate(identifier, log).await?;

        if let Some(reason) = not_interactable_reason(&element) {
            let err = ExerciseError::InteractionError {
                identifier: identifier.to_string(),
                reason: reason.to_string(),
            };
            log.push(ActionLog::new(
                ActionType::Tap { selector: identifier.to_string() },
                ActionResult::Failure(err.to_string()),
                None,
            ));
            return Err(err);
        }

        let tap = ActionType::Tap { selector: identifier.to_string() };
        self.step(identifier, tap, log, self.driver.tap_element(identifier)).await?;

        let keys = ActionType::SendKeys { text: self.config.text.clone() };
        self.step(identifier, keys, log, self.driver.type_text(&self.config.text)).await
    }

    /// Awaits one driver call, logs it and classifies its failure.
    async fn step<F>(
        &self,
        identifier: &str,
        action: ActionType,
        log: &mut Vec<ActionLog>,
        call: F,
    ) -> Result<(), ExerciseError>
    where
        F: std::future::Future<Output = Result<(), DriverError>>,
    {
        let start = Instant::now();
        let result = call.await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(action = action.name(), elapsed_ms, ok = result.is_ok(), "step complete");

        match result {
            Ok(()) => {
                log.push(ActionLog::new(action, ActionResult::Success, Some(elapsed_ms)));
                Ok(())
            }
            Err(e) => {
                log.push(ActionLog::new(action, ActionResult::Failure(e.to_string()), Some(elapsed_ms)));
                if e.is_transport() {
                    Err(ExerciseError::Driver(e))
                } else {
                    Err(ExerciseError::InteractionError {
                        identifier: identifier.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    /// Polls for the element until it appears or the implicit wait runs out.
    ///
    /// Rejected lookups count as "not there yet"; transport failures end the
    /// wait immediately.
    async fn locate(&self, identifier: &str, log: &mut Vec<ActionLog>) -> Result<UIElement, ExerciseError> {
        let element_type = self.config.element_type.as_deref();
        let timeout = self.config.implicit_wait;
        let action = ActionType::WaitFor {
            selector: identifier.to_string(),
            element_type: self.config.element_type.clone(),
            timeout_ms: timeout.as_millis() as u64,
        };
        let start = Instant::now();

        loop {
            match self.driver.find_element_with_type(identifier, element_type).await {
                Ok(Some(element)) => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    debug!(elapsed_ms, "element found");
                    log.push(ActionLog::new(action, ActionResult::Success, Some(elapsed_ms)));
                    return Ok(element);
                }
                Ok(None) => {}
                Err(e) if e.is_transport() => {
                    log.push(ActionLog::new(action, ActionResult::Failure(e.to_string()), None));
                    return Err(ExerciseError::Driver(e));
                }
                Err(e) => debug!(error = %e, "lookup rejected, retrying"),
            }

            if start.elapsed() >= timeout {
                let waited_ms = start.elapsed().as_millis() as u64;
                let err = ExerciseError::ElementNotFound {
                    identifier: identifier.to_string(),
                    waited_ms,
                };
                log.push(ActionLog::new(action, ActionResult::Failure(err.to_string()), Some(waited_ms)));
                return Err(err);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn not_interactable_reason(element: &UIElement) -> Option<&'static str> {
    if element.is_interactable() {
        None
    } else if element.hittable == Some(false) {
        Some("element is not hittable")
    } else {
        Some("element is disabled")
    }
}
