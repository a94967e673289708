//! Tier chain: ordered fallback across execution strategies.
//!
//! ```text
//! run request
//!   ├─ tier 1 Ok                 → TierOutcome { level: Full, ... }
//!   ├─ tier 1 Err(recoverable)   → try tier 2
//!   │    └─ tier 2 Ok            → TierOutcome { level: Partial, warnings, ... }
//!   ├─ Err(Cancelled) / panic    → TierOutcome { level: Unavailable, degraded result }
//!   └─ all tiers exhausted       → TierOutcome { level: Unavailable, degraded result }
//! ```
//!
//! Tiers run strictly one after another; the chain never races them.

use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{CompilationResult, ExecutionTier, RunRequest, TierError};

/// Message used when no tier could produce a result.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "The program could not be executed right now. Check the diagnostics below and try again.";

/// Message used when a newer request superseded this run.
pub const CANCELLED_MESSAGE: &str = "Execution cancelled: a newer run replaced this one.";

/// How much of the execution fidelity was available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DegradationLevel {
    /// The first tier answered.
    Full,
    /// A fallback tier answered.
    Partial,
    /// No tier answered; the result was synthesised by the chain.
    Unavailable,
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Partial => write!(f, "partial"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A compilation result wrapped with fallback metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierOutcome {
    pub result: CompilationResult,
    pub level: DegradationLevel,
    /// Confidence of the serving tier (0.0–1.0); 0.0 when synthesised.
    pub confidence: f64,
    /// Name of the tier that produced `result`, or "none".
    pub served_by: String,
    /// One entry per failed tier plus a fallback notice.
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl TierOutcome {
    fn served(result: CompilationResult, served_by: &str, confidence: f64, first: bool) -> Self {
        Self {
            result,
            level: if first {
                DegradationLevel::Full
            } else {
                DegradationLevel::Partial
            },
            confidence: confidence.clamp(0.0, 1.0),
            served_by: served_by.to_string(),
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn unavailable(message: &str, warnings: Vec<String>) -> Self {
        Self {
            result: CompilationResult::degraded(message),
            level: DegradationLevel::Unavailable,
            confidence: 0.0,
            served_by: "none".to_string(),
            warnings,
            timestamp: Utc::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.level == DegradationLevel::Full
    }

    pub fn is_degraded(&self) -> bool {
        self.level != DegradationLevel::Full
    }
}

/// Ordered list of execution tiers, highest fidelity first.
#[derive(Default)]
pub struct TierChain {
    tiers: Vec<Box<dyn ExecutionTier>>,
}

impl TierChain {
    pub fn new() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Append a tier after the existing ones.
    pub fn add_tier(mut self, tier: impl ExecutionTier + 'static) -> Self {
        self.tiers.push(Box::new(tier));
        self
    }

    /// Append an already boxed tier.
    pub fn add_boxed(mut self, tier: Box<dyn ExecutionTier>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Try each tier in order until one yields a result.
    ///
    /// Never fails: cancellation, a panicking tier, a non-recoverable error
    /// and an exhausted chain all become a degraded result.
    pub async fn execute(&self, request: &RunRequest, cancel: &CancellationToken) -> TierOutcome {
        let mut warnings = Vec::new();

        for (idx, tier) in self.tiers.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(tier = tier.name(), "Run cancelled before tier attempt");
                return TierOutcome::unavailable(CANCELLED_MESSAGE, warnings);
            }

            let attempt = AssertUnwindSafe(tier.attempt(request, cancel))
                .catch_unwind()
                .await;

            match attempt {
                Ok(Ok(result)) => {
                    info!(
                        tier = tier.name(),
                        classification = %result.classification(),
                        exit_code = result.exit_code(),
                        "Tier produced result"
                    );
                    let mut outcome =
                        TierOutcome::served(result, tier.name(), tier.confidence(), idx == 0);
                    if idx > 0 {
                        warnings.push(format!(
                            "higher tier(s) failed, using fallback '{}'",
                            tier.name()
                        ));
                    }
                    outcome.warnings = warnings;
                    return outcome;
                }
                Ok(Err(TierError::Cancelled(reason))) => {
                    info!(tier = tier.name(), %reason, "Tier cancelled");
                    warnings.push(format!("'{}' cancelled: {}", tier.name(), reason));
                    return TierOutcome::unavailable(CANCELLED_MESSAGE, warnings);
                }
                Ok(Err(err)) if err.is_recoverable() => {
                    warn!(tier = tier.name(), kind = %err.kind(), "Tier failed, falling back: {}", err);
                    warnings.push(format!("'{}' failed: {}", tier.name(), err));
                }
                Ok(Err(err)) => {
                    error!(tier = tier.name(), "Tier failed unrecoverably: {}", err);
                    warnings.push(format!("'{}' failed: {}", tier.name(), err));
                    return TierOutcome::unavailable(GENERIC_FAILURE_MESSAGE, warnings);
                }
                Err(_) => {
                    error!(tier = tier.name(), "Tier panicked");
                    warnings.push(format!("'{}' crashed", tier.name()));
                    return TierOutcome::unavailable(GENERIC_FAILURE_MESSAGE, warnings);
                }
            }
        }

        warn!(tiers = self.tiers.len(), "All execution tiers exhausted");
        warnings.push(format!("all {} tiers exhausted", self.tiers.len()));
        TierOutcome::unavailable(GENERIC_FAILURE_MESSAGE, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Classification;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behaviour {
        Succeed(&'static str),
        DefinitiveError,
        Recoverable,
        Cancel,
        Panic,
    }

    struct ScriptedTier {
        name: &'static str,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedTier {
        fn new(name: &'static str, behaviour: Behaviour) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    behaviour,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ExecutionTier for ScriptedTier {
        fn name(&self) -> &str {
            self.name
        }

        fn confidence(&self) -> f64 {
            0.5
        }

        async fn attempt(
            &self,
            _request: &RunRequest,
            _cancel: &CancellationToken,
        ) -> Result<CompilationResult, TierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed(out) => Ok(CompilationResult::success(out)),
                Behaviour::DefinitiveError => Ok(CompilationResult::error("error: ';' expected", 1)),
                Behaviour::Recoverable => Err(TierError::Transport("connection refused".into())),
                Behaviour::Cancel => Err(TierError::Cancelled("superseded".into())),
                Behaviour::Panic => panic!("tier defect"),
            }
        }
    }

    fn request() -> RunRequest {
        RunRequest::new("class Main {}")
    }

    #[tokio::test]
    async fn test_first_tier_serves_full() {
        let (a, _) = ScriptedTier::new("a", Behaviour::Succeed("hello"));
        let (b, b_calls) = ScriptedTier::new("b", Behaviour::Succeed("never"));
        let chain = TierChain::new().add_tier(a).add_tier(b);

        let outcome = chain.execute(&request(), &CancellationToken::new()).await;
        assert!(outcome.is_full());
        assert_eq!(outcome.served_by, "a");
        assert_eq!(outcome.result.output_text(), "hello");
        assert!(outcome.warnings.is_empty());
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recoverable_failure_falls_through() {
        let (a, _) = ScriptedTier::new("a", Behaviour::Recoverable);
        let (b, _) = ScriptedTier::new("b", Behaviour::Succeed("fallback"));
        let chain = TierChain::new().add_tier(a).add_tier(b);

        let outcome = chain.execute(&request(), &CancellationToken::new()).await;
        assert_eq!(outcome.level, DegradationLevel::Partial);
        assert_eq!(outcome.served_by, "b");
        assert_eq!(outcome.confidence, 0.5);
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_definitive_error_is_terminal() {
        let (a, _) = ScriptedTier::new("a", Behaviour::DefinitiveError);
        let (b, b_calls) = ScriptedTier::new("b", Behaviour::Succeed("never"));
        let chain = TierChain::new().add_tier(a).add_tier(b);

        let outcome = chain.execute(&request(), &CancellationToken::new()).await;
        assert_eq!(outcome.result.classification(), Classification::Error);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_chain() {
        let (a, _) = ScriptedTier::new("a", Behaviour::Cancel);
        let (b, b_calls) = ScriptedTier::new("b", Behaviour::Succeed("never"));
        let chain = TierChain::new().add_tier(a).add_tier(b);

        let outcome = chain.execute(&request(), &CancellationToken::new()).await;
        assert_eq!(outcome.level, DegradationLevel::Unavailable);
        assert_eq!(outcome.result.classification(), Classification::Degraded);
        assert_eq!(outcome.result.output_text(), CANCELLED_MESSAGE);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_all_tiers() {
        let (a, a_calls) = ScriptedTier::new("a", Behaviour::Succeed("never"));
        let chain = TierChain::new().add_tier(a);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = chain.execute(&request(), &cancel).await;
        assert_eq!(outcome.result.output_text(), CANCELLED_MESSAGE);
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_tier_becomes_degraded() {
        let (a, _) = ScriptedTier::new("a", Behaviour::Recoverable);
        let (b, _) = ScriptedTier::new("local", Behaviour::Panic);
        let chain = TierChain::new().add_tier(a).add_tier(b);

        let outcome = chain.execute(&request(), &CancellationToken::new()).await;
        assert_eq!(outcome.result.classification(), Classification::Degraded);
        assert_eq!(outcome.result.output_text(), GENERIC_FAILURE_MESSAGE);
        assert!(outcome.warnings.iter().any(|w| w.contains("crashed")));
    }

    #[tokio::test]
    async fn test_all_fail_and_empty_chain() {
        let (a, _) = ScriptedTier::new("a", Behaviour::Recoverable);
        let (b, _) = ScriptedTier::new("b", Behaviour::Recoverable);
        let chain = TierChain::new().add_tier(a).add_tier(b);
        let outcome = chain.execute(&request(), &CancellationToken::new()).await;
        assert_eq!(outcome.level, DegradationLevel::Unavailable);
        assert_eq!(outcome.warnings.len(), 3);

        let empty = TierChain::new();
        let outcome = empty.execute(&request(), &CancellationToken::new()).await;
        assert_eq!(outcome.result.classification(), Classification::Degraded);
        assert_eq!(empty.tier_count(), 0);
    }

    #[test]
    fn test_degradation_level_ordering() {
        assert!(DegradationLevel::Full < DegradationLevel::Partial);
        assert!(DegradationLevel::Partial < DegradationLevel::Unavailable);
        assert_eq!(DegradationLevel::Partial.to_string(), "partial");
    }
}
