use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};

use crate::{
    anchors::AnchorCatalog,
    models::{AnchorPair, CandidateRoute, Coordinate, RouteSegment, RouteSource, SelectionResult},
    provider::{ProviderError, SegmentFetcher},
    routing::jitter_path,
    scoring::{PointCount, RouteScorer},
};

/// Shown when the winning segment came back without turn-by-turn steps.
pub const DEFAULT_INSTRUCTION: &str = "custom messy route generated";

#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    /// Maximum segment fetches in flight at once.
    pub concurrency: usize,
    pub fetch_timeout: Duration,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of fetching one anchor pair.
#[derive(Debug)]
pub enum PairOutcome {
    Segment(RouteSegment),
    Failed(ProviderError),
}

/// Running "best so far" for one synthesis. Only ever touched from the
/// single aggregation loop, in pair order.
pub struct CandidateSelector<'a> {
    scorer: &'a dyn RouteScorer,
    best: Option<CandidateRoute>,
}

impl<'a> CandidateSelector<'a> {
    pub fn new(scorer: &'a dyn RouteScorer) -> Self {
        Self { scorer, best: None }
    }

    /// Scores the candidate and keeps it if it beats the current best.
    /// Equal scores keep the earlier candidate.
    pub fn offer(&mut self, mut candidate: CandidateRoute) -> bool {
        candidate.length_proxy = self.scorer.score(&candidate.points);

        if !candidate.is_eligible() {
            tracing::debug!(
                "Rejected pair {:?}: only {} points",
                candidate.pair,
                candidate.points.len()
            );
            return false;
        }
        if !self.scorer.admits(candidate.length_proxy) {
            tracing::debug!(
                "Rejected pair {:?}: length proxy {} at or above bound {}",
                candidate.pair,
                candidate.length_proxy,
                self.scorer.admission_bound()
            );
            return false;
        }

        let improves = self
            .best
            .as_ref()
            .map_or(true, |best| candidate.length_proxy > best.length_proxy);
        if improves {
            tracing::debug!(
                "New best pair {:?} with length proxy {}",
                candidate.pair,
                candidate.length_proxy
            );
            self.best = Some(candidate);
        }
        improves
    }

    pub fn best(&self) -> Option<&CandidateRoute> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<CandidateRoute> {
        self.best
    }
}

/// Builds deliberately convoluted routes by stitching provider segments
/// between unrelated anchor pairs onto the user's start and end.
///
/// # Algorithm
/// 1. Enumerate every anchor pair `(i, j)`, `i < j`, lexicographically.
/// 2. Fetch each pair's road segment, at most `concurrency` at a time, each
///    under `fetch_timeout`. Failed pairs are skipped.
/// 3. Stitch `[start] ++ segment ++ [end]` and score it.
/// 4. Keep the highest score strictly below the scorer's admission bound;
///    ties go to the earliest pair.
/// 5. With no admissible candidate, return the jitter path.
///
/// `synthesize` never fails.
pub struct DetourSynthesizer {
    catalog: Arc<AnchorCatalog>,
    fetcher: Arc<dyn SegmentFetcher>,
    scorer: Arc<dyn RouteScorer>,
    options: SynthesisOptions,
}

impl DetourSynthesizer {
    pub fn new(catalog: Arc<AnchorCatalog>, fetcher: Arc<dyn SegmentFetcher>) -> Self {
        Self {
            catalog,
            fetcher,
            scorer: Arc::new(PointCount::default()),
            options: SynthesisOptions::default(),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RouteScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &AnchorCatalog {
        &self.catalog
    }

    pub async fn synthesize(&self, start: Coordinate, end: Coordinate) -> SelectionResult {
        match self.best_candidate(start, end).await {
            Some(candidate) => self.into_selection(candidate),
            None => {
                tracing::info!("No admissible detour; falling back to jitter path");
                self.fallback(start, end)
            }
        }
    }

    /// Runs steps 1–4 and returns the winning candidate, if any.
    pub async fn best_candidate(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Option<CandidateRoute> {
        let pairs: Vec<AnchorPair> = self.catalog.pairs().collect();
        let concurrency = self.options.concurrency.max(1);

        tracing::info!(
            "Synthesizing detour {:?} -> {:?}: {} anchor pairs, {} in flight",
            start,
            end,
            pairs.len(),
            concurrency
        );

        // `buffered` yields in submission order, so the fold below sees pairs
        // in enumeration order no matter which fetch finishes first.
        let mut outcomes = stream::iter(pairs)
            .map(|pair| self.fetch_pair(pair))
            .buffered(concurrency);

        let mut selector = CandidateSelector::new(self.scorer.as_ref());
        let mut failures = 0usize;

        while let Some((pair, outcome)) = outcomes.next().await {
            match outcome {
                PairOutcome::Segment(segment) => {
                    selector.offer(CandidateRoute::stitch(pair, start, segment, end));
                }
                PairOutcome::Failed(err) if err.is_configuration() => {
                    tracing::error!("Routing provider misconfigured, skipping remaining pairs: {err}");
                    failures += 1;
                    break;
                }
                PairOutcome::Failed(err) => {
                    let (from, to) = self.catalog.endpoints(pair);
                    tracing::warn!("No segment for {} -> {}: {}", from.name, to.name, err);
                    failures += 1;
                }
            }
        }

        tracing::debug!(
            "Detour synthesis finished: {} failed pairs, best {:?}",
            failures,
            selector.best().map(|c| (c.pair, c.length_proxy))
        );

        selector.into_best()
    }

    pub fn fallback(&self, start: Coordinate, end: Coordinate) -> SelectionResult {
        let points = jitter_path(start, end);
        SelectionResult {
            length_proxy: self.scorer.score(&points),
            points,
            instructions: Vec::new(),
            source: RouteSource::Jitter,
        }
    }

    async fn fetch_pair(&self, pair: AnchorPair) -> (AnchorPair, PairOutcome) {
        let (from, to) = self.catalog.endpoints(pair);
        let timeout = self.options.fetch_timeout;

        let fetched = tokio::time::timeout(
            timeout,
            self.fetcher.fetch_segment(from.coords, to.coords),
        )
        .await
        .unwrap_or(Err(ProviderError::Timeout(timeout)));

        let outcome = match fetched {
            Ok(segment) => PairOutcome::Segment(segment),
            Err(err) => PairOutcome::Failed(err),
        };
        (pair, outcome)
    }

    fn into_selection(&self, candidate: CandidateRoute) -> SelectionResult {
        let (from, to) = self.catalog.endpoints(candidate.pair);
        tracing::info!(
            "✓ Selected detour via {} -> {} ({} points)",
            from.name,
            to.name,
            candidate.points.len()
        );

        let instructions = if candidate.instructions.is_empty() {
            vec![DEFAULT_INSTRUCTION.to_string()]
        } else {
            candidate.instructions
        };

        SelectionResult {
            source: RouteSource::Detour {
                from: from.name.clone(),
                to: to.name.clone(),
            },
            points: candidate.points,
            instructions,
            length_proxy: candidate.length_proxy,
        }
    }
}
