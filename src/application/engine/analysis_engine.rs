use crate::application::engine::aggregator::CrossTimeframeAggregator;
use crate::application::engine::fetcher::CandleFetcher;
use crate::application::engine::pipeline::{TimeframePipeline, TimeframeRun};
use crate::application::engine::setup_scorer::{SetupContext, SetupScorer};
use crate::config::AnalysisConfig;
use crate::domain::analysis::indicators::AnalysisDepth;
use crate::domain::analysis::report::{AnalysisStatus, ComprehensiveAnalysis};
use crate::domain::analysis::signal::TimeframeOutcome;
use crate::domain::errors::{AnalysisError, TimeframeFailure};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::PriceDataProvider;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Entry point: fan out one task per timeframe, join, aggregate, score.
///
/// Each call is independent; the engine holds no state between calls beyond
/// its configuration and provider handle.
pub struct AnalysisEngine {
    fetcher: CandleFetcher,
    pipeline: Arc<TimeframePipeline>,
    aggregator: CrossTimeframeAggregator,
    scorer: SetupScorer,
    fetch_limit: usize,
}

impl AnalysisEngine {
    pub fn new(provider: Arc<dyn PriceDataProvider>, config: AnalysisConfig) -> Self {
        Self {
            fetcher: CandleFetcher::new(provider, config.retry.clone()),
            pipeline: Arc::new(TimeframePipeline::new(&config)),
            aggregator: CrossTimeframeAggregator::new(
                config.levels.clone(),
                config.structure.clone(),
                config.trend.adx_threshold,
            ),
            scorer: SetupScorer::new(config.setup.clone()),
            fetch_limit: config.fetch.limit,
        }
    }

    pub async fn analyze(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
        depth: AnalysisDepth,
    ) -> Result<ComprehensiveAnalysis, AnalysisError> {
        self.analyze_with_cancel(symbol, timeframes, depth, CancellationToken::new())
            .await
    }

    /// Like `analyze`, aborting every in-flight timeframe task once `cancel` fires.
    pub async fn analyze_with_cancel(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
        depth: AnalysisDepth,
        cancel: CancellationToken,
    ) -> Result<ComprehensiveAnalysis, AnalysisError> {
        let requested: BTreeSet<Timeframe> = timeframes.iter().copied().collect();
        if requested.is_empty() {
            return Err(AnalysisError::NoTimeframes {
                symbol: symbol.to_string(),
            });
        }

        info!(
            symbol,
            timeframes = requested.len(),
            depth = %depth,
            "AnalysisEngine: starting analysis"
        );

        let mut tasks = JoinSet::new();
        for &timeframe in &requested {
            let fetcher = self.fetcher.clone();
            let pipeline = Arc::clone(&self.pipeline);
            let symbol = symbol.to_string();
            let limit = self.fetch_limit;
            tasks.spawn(async move {
                let result = match fetcher.fetch(&symbol, timeframe, limit).await {
                    // indicator math is CPU-bound; keep it off the async workers
                    Ok(candles) => tokio::task::spawn_blocking(move || {
                        pipeline.run(&symbol, timeframe, candles, depth)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        Err(TimeframeFailure::TaskFailed {
                            reason: format!("pipeline task failed: {}", e),
                        })
                    }),
                    Err(failure) => Err(failure),
                };
                (timeframe, result)
            });
        }

        // Slots that never report back stay failed
        let mut results: BTreeMap<Timeframe, Result<TimeframeRun, TimeframeFailure>> = requested
            .iter()
            .map(|tf| {
                (
                    *tf,
                    Err(TimeframeFailure::TaskFailed {
                        reason: "task did not complete".to_string(),
                    }),
                )
            })
            .collect();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    warn!(symbol, "AnalysisEngine: cancelled, discarding partial results");
                    return Err(AnalysisError::Cancelled {
                        symbol: symbol.to_string(),
                    });
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((timeframe, result))) => {
                        results.insert(timeframe, result);
                    }
                    Some(Err(e)) => {
                        warn!(symbol, error = %e, "AnalysisEngine: timeframe task join error");
                    }
                },
            }
        }

        self.assemble(symbol, depth, results)
    }

    fn assemble(
        &self,
        symbol: &str,
        depth: AnalysisDepth,
        results: BTreeMap<Timeframe, Result<TimeframeRun, TimeframeFailure>>,
    ) -> Result<ComprehensiveAnalysis, AnalysisError> {
        let mut runs = BTreeMap::new();
        let mut failures = Vec::new();
        for (timeframe, result) in results {
            match result {
                Ok(run) => {
                    runs.insert(timeframe, run);
                }
                Err(failure) => {
                    warn!(
                        symbol,
                        timeframe = %timeframe,
                        failure = %failure,
                        "AnalysisEngine: timeframe degraded"
                    );
                    failures.push((timeframe, failure));
                }
            }
        }

        if runs.is_empty() {
            return Err(AnalysisError::AllTimeframesFailed {
                symbol: symbol.to_string(),
                failures,
            });
        }

        let aggregate = self.aggregator.aggregate(&runs);

        let status = if failures.is_empty() {
            AnalysisStatus::Complete
        } else {
            AnalysisStatus::Partial {
                degraded: failures.iter().map(|(tf, _)| *tf).collect(),
            }
        };

        let setup_quality = self.scorer.score(&SetupContext {
            current_price: aggregate.current_price,
            overall_trend: &aggregate.overall_trend,
            critical_levels: &aggregate.critical_levels,
            signals: runs.values().map(|run| &run.signal).collect(),
            degraded: failures.iter().map(|(tf, f)| (*tf, f)).collect(),
            reference_atr: aggregate.reference_atr,
        });

        let mut timeframes: BTreeMap<Timeframe, TimeframeOutcome> = runs
            .into_iter()
            .map(|(tf, run)| (tf, TimeframeOutcome::Ready(Box::new(run.signal))))
            .collect();
        for (tf, failure) in failures {
            timeframes.insert(tf, TimeframeOutcome::Degraded { failure });
        }

        info!(
            symbol,
            dominant = %aggregate.overall_trend.dominant,
            alignment = aggregate.overall_trend.alignment_score,
            setup_score = setup_quality.score,
            partial = status.is_partial(),
            "AnalysisEngine: analysis complete"
        );

        Ok(ComprehensiveAnalysis {
            symbol: symbol.to_string(),
            depth,
            status,
            current_price: aggregate.current_price,
            as_of: aggregate.as_of,
            timeframes,
            overall_trend: aggregate.overall_trend,
            critical_levels: aggregate.critical_levels,
            setup_quality,
            market_structure: aggregate.market_structure,
        })
    }
}
