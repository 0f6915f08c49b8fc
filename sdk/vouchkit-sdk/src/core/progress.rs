use crate::error::Result;
use std::fmt;
use tracing::{debug, info, warn};

/// Externally observable steps of a sponsored flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    VoucherIssue,
    VoucherRenewal,
    VoucherTopUp,
    CredentialBind,
    Submission,
    Finalization,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::VoucherIssue => "voucher-issue",
            Step::VoucherRenewal => "voucher-renewal",
            Step::VoucherTopUp => "voucher-top-up",
            Step::CredentialBind => "credential-bind",
            Step::Submission => "submission",
            Step::Finalization => "finalization",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Started,
    Succeeded,
    Failed(String),
}

/// Receives every step outcome so a caller can render granular progress.
pub trait ProgressObserver: Send + Sync {
    fn on_step(&self, step: Step, outcome: &StepOutcome);
}

/// Default observer: reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_step(&self, step: Step, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Started => debug!(%step, "step started"),
            StepOutcome::Succeeded => info!(%step, "step succeeded"),
            StepOutcome::Failed(reason) => warn!(%step, %reason, "step failed"),
        }
    }
}

/// Report `Started`, await `fut`, then report its outcome.
pub(crate) async fn tracked<T, F>(observer: &dyn ProgressObserver, step: Step, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    observer.on_step(step, &StepOutcome::Started);
    let result = fut.await;
    match &result {
        Ok(_) => observer.on_step(step, &StepOutcome::Succeeded),
        Err(err) => observer.on_step(step, &StepOutcome::Failed(err.to_string())),
    }
    result
}
