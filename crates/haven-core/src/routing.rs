use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::anchors::{AnchorQuery, AnchorSet};
use crate::calibration::{validate_anchor_set, CalibrationTable};
use crate::genai::TextGenerator;
use crate::providers::{
    AnchorProvider, GroundedAnchorProvider, StageError, StageId, StructuredAnchorProvider,
};

/// Per-stage failure as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageId,
    pub code: String,
    pub message: String,
}

impl StageFailure {
    fn new(stage: StageId, error: &StageError) -> Self {
        Self {
            stage,
            code: error.code().to_owned(),
            message: error.message().to_owned(),
        }
    }
}

/// Anchors accepted by one stage.
#[derive(Debug, Clone)]
pub struct RouteSuccess<T> {
    pub data: T,
    pub selected_stage: StageId,
    pub stage_chain: Vec<StageId>,
    pub warnings: Vec<String>,
    pub errors: Vec<StageFailure>,
    pub latency_ms: u64,
}

/// Every stage was tried and none produced plausible anchors.
#[derive(Debug, Clone)]
pub struct RouteFailure {
    pub stage_chain: Vec<StageId>,
    pub warnings: Vec<String>,
    pub errors: Vec<StageFailure>,
    pub latency_ms: u64,
}

pub type RouteResult<T> = Result<RouteSuccess<T>, RouteFailure>;

/// Ordered stage list with a plausibility gate after each stage.
#[derive(Clone)]
pub struct AnchorRouter {
    providers: Vec<Arc<dyn AnchorProvider>>,
    calibration: Arc<CalibrationTable>,
}

impl AnchorRouter {
    pub fn new(providers: Vec<Arc<dyn AnchorProvider>>, calibration: Arc<CalibrationTable>) -> Self {
        Self {
            providers,
            calibration,
        }
    }

    /// Grounded stage first, structured stage second, both on `generator`.
    pub fn for_generator(
        generator: Arc<dyn TextGenerator>,
        calibration: Arc<CalibrationTable>,
    ) -> Self {
        Self::new(
            vec![
                Arc::new(GroundedAnchorProvider::new(Arc::clone(&generator))),
                Arc::new(StructuredAnchorProvider::new(generator)),
            ],
            calibration,
        )
    }

    pub fn stages(&self) -> Vec<StageId> {
        self.providers.iter().map(|provider| provider.stage()).collect()
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    pub async fn route(&self, query: &AnchorQuery) -> RouteResult<AnchorSet> {
        let started = Instant::now();
        let mut stage_chain = Vec::with_capacity(self.providers.len());
        let mut errors = Vec::new();

        for provider in &self.providers {
            let stage = provider.stage();
            stage_chain.push(stage);

            let outcome = provider.try_fetch(query).await.and_then(|set| {
                validate_anchor_set(&set, &query.assets, &self.calibration)
                    .map(|()| set)
                    .map_err(|e| StageError::implausible(&e))
            });

            match outcome {
                Ok(data) => {
                    let mut warnings = Vec::new();
                    if !errors.is_empty() {
                        warnings.push(format!(
                            "anchor fallback succeeded with '{}' after {} failed stage(s)",
                            stage,
                            errors.len()
                        ));
                    }
                    info!(%stage, subject = %query.subject(), "anchors accepted");

                    return Ok(RouteSuccess {
                        data,
                        selected_stage: stage,
                        stage_chain,
                        warnings,
                        errors,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(error) => {
                    warn!(%stage, code = error.code(), message = error.message(), "anchor stage failed");
                    errors.push(StageFailure::new(stage, &error));
                }
            }
        }

        if errors.is_empty() {
            errors.push(StageFailure::new(
                StageId::Synthetic,
                &StageError::unavailable("no anchor stages are configured"),
            ));
        }

        Err(RouteFailure {
            stage_chain,
            warnings: vec![String::from(
                "no trustworthy market data; series generated from internal baseline",
            )],
            errors,
            latency_ms: elapsed_ms(started),
        })
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::AnchorRow;
    use crate::providers::StageFuture;
    use crate::{AssetId, DateWindow, YearMonth};
    use std::collections::BTreeMap;

    struct FixedProvider {
        stage: StageId,
        result: Result<AnchorSet, StageError>,
    }

    impl AnchorProvider for FixedProvider {
        fn stage(&self) -> StageId {
            self.stage
        }

        fn try_fetch<'a>(&'a self, _query: &'a AnchorQuery) -> StageFuture<'a> {
            let result = self.result.clone();
            Box::pin(async move { result })
        }
    }

    fn gold_set(values: &[(&str, f64)]) -> AnchorSet {
        AnchorSet::new(
            values
                .iter()
                .map(|(month, value)| AnchorRow {
                    month: YearMonth::parse(month).expect("month"),
                    values: BTreeMap::from([(AssetId::Gold, Some(*value))]),
                })
                .collect(),
        )
    }

    fn query() -> AnchorQuery {
        let today = YearMonth::parse("2026-10").expect("month");
        AnchorQuery::single(AssetId::Gold, DateWindow::trailing_years(5, today).expect("window"))
    }

    fn router(providers: Vec<FixedProvider>) -> AnchorRouter {
        AnchorRouter::new(
            providers
                .into_iter()
                .map(|provider| Arc::new(provider) as Arc<dyn AnchorProvider>)
                .collect(),
            Arc::new(CalibrationTable::default()),
        )
    }

    #[tokio::test]
    async fn first_plausible_stage_wins() {
        let router = router(vec![
            FixedProvider {
                stage: StageId::Grounded,
                result: Ok(gold_set(&[("2021-10", 1800.0), ("2026-10", 4000.0)])),
            },
            FixedProvider {
                stage: StageId::Structured,
                result: Err(StageError::unavailable("unused")),
            },
        ]);

        let success = router.route(&query()).await.expect("grounded accepted");

        assert_eq!(success.selected_stage, StageId::Grounded);
        assert_eq!(success.stage_chain, vec![StageId::Grounded]);
        assert!(success.warnings.is_empty());
    }

    #[tokio::test]
    async fn implausible_stage_falls_through_to_next() {
        let router = router(vec![
            FixedProvider {
                stage: StageId::Grounded,
                result: Ok(gold_set(&[("2021-10", 1800.0), ("2026-10", 9999.0)])),
            },
            FixedProvider {
                stage: StageId::Structured,
                result: Ok(gold_set(&[("2021-10", 1800.0), ("2026-10", 4000.0)])),
            },
        ]);

        let success = router.route(&query()).await.expect("structured accepted");

        assert_eq!(success.selected_stage, StageId::Structured);
        assert_eq!(success.stage_chain, vec![StageId::Grounded, StageId::Structured]);
        assert_eq!(success.errors.len(), 1);
        assert_eq!(success.errors[0].code, "stage.implausible_data");
        assert_eq!(success.warnings.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_stages_report_every_failure() {
        let router = router(vec![
            FixedProvider {
                stage: StageId::Grounded,
                result: Err(StageError::unavailable("offline")),
            },
            FixedProvider {
                stage: StageId::Structured,
                result: Ok(gold_set(&[("2026-10", 4000.0)])),
            },
        ]);

        let failure = router.route(&query()).await.expect_err("all stages fail");

        assert_eq!(failure.stage_chain, vec![StageId::Grounded, StageId::Structured]);
        assert_eq!(failure.errors.len(), 2);
        assert_eq!(failure.errors[1].stage, StageId::Structured);
    }

    #[tokio::test]
    async fn empty_router_fails_with_placeholder_error() {
        let failure = router(Vec::new()).route(&query()).await.expect_err("no stages");
        assert!(failure.stage_chain.is_empty());
        assert_eq!(failure.errors[0].code, "stage.unavailable");
    }
}
