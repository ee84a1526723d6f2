//! Pipeline orchestration: document lookup, fetch-or-cache, split, extract, aggregate.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use kessan_core::{
    AggregateFinancials, CONTEXT_ID_COLUMN, ConsolidationScope, DocId, DocumentMeta, Extraction,
    FilingCache, FilingSource, KessanError, NarrativeAnalyzer, NarrativeRequest, Period,
    PeriodPartition, PeriodSplit, Result, RetryPolicy, compute_ratios, extract, split,
};

/// Default number of filings processed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings for a [`Pipeline`] run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Preferred consolidation scope.
    pub scope: ConsolidationScope,
    /// Maximum number of filings in flight.
    pub concurrency: usize,
    /// Retry policy handed to the filing source for archive downloads.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scope: ConsolidationScope::default(),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Extraction results for one filing, one entry per period.
#[derive(Clone, Debug, PartialEq)]
pub struct FilingOutcome {
    /// The filing.
    pub doc_id: DocId,
    /// Prior-period result.
    pub prior: Result<Extraction>,
    /// Current-period result.
    pub current: Result<Extraction>,
}

impl FilingOutcome {
    /// Returns the result for `period`.
    #[must_use]
    pub const fn get(&self, period: Period) -> &Result<Extraction> {
        match period {
            Period::Prior => &self.prior,
            Period::Current => &self.current,
        }
    }

    /// Returns true if both periods were extracted.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.prior.is_ok() && self.current.is_ok()
    }
}

/// Everything a run produced: per-filing outcomes and per-period aggregates.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineReport {
    /// Outcomes in the order the filings were requested.
    pub filings: Vec<FilingOutcome>,
    /// Aggregate over the successful prior-period extractions.
    pub prior: AggregateFinancials,
    /// Aggregate over the successful current-period extractions.
    pub current: AggregateFinancials,
}

impl PipelineReport {
    /// Builds a report by aggregating the successful extractions of each period.
    #[must_use]
    pub fn from_outcomes(filings: Vec<FilingOutcome>) -> Self {
        let aggregate = |period: Period| {
            let snapshots: Vec<_> = filings
                .iter()
                .filter_map(|f| f.get(period).as_ref().ok())
                .map(|e| e.snapshot)
                .collect();
            compute_ratios(&snapshots)
        };
        let prior = aggregate(Period::Prior);
        let current = aggregate(Period::Current);
        Self {
            filings,
            prior,
            current,
        }
    }

    /// Returns the aggregate for `period`.
    #[must_use]
    pub const fn aggregate(&self, period: Period) -> &AggregateFinancials {
        match period {
            Period::Prior => &self.prior,
            Period::Current => &self.current,
        }
    }

    /// Every failed (filing, period) pair.
    pub fn failures(&self) -> impl Iterator<Item = (&DocId, Period, &KessanError)> {
        self.filings.iter().flat_map(|f| {
            Period::ALL
                .into_iter()
                .filter_map(move |p| f.get(p).as_ref().err().map(|e| (&f.doc_id, p, e)))
        })
    }

    /// Builds the narrative request from the aggregated figures.
    ///
    /// A period with no successful extraction is left out.
    ///
    /// # Errors
    /// Returns [`KessanError::InvalidParameter`] when no period has figures.
    pub fn narrative_request(&self) -> Result<NarrativeRequest> {
        let totals = |agg: &AggregateFinancials| (agg.filings > 0).then_some(agg.totals);
        let prior = totals(&self.prior);
        let current = totals(&self.current);
        NarrativeRequest::from_periods(prior.as_ref(), current.as_ref())
    }

    /// Asks `analyzer` for a written analysis of the aggregated figures.
    ///
    /// # Errors
    /// Propagates [`Self::narrative_request`] and analyzer errors.
    pub async fn narrate(&self, analyzer: &dyn NarrativeAnalyzer) -> Result<String> {
        let request = self.narrative_request()?;
        debug!(analyzer = analyzer.name(), "Requesting narrative analysis");
        analyzer.analyze(&request).await
    }
}

/// Clamps a requested document-list date to `today`.
///
/// No date means today.
#[must_use]
pub fn effective_date(requested: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    requested.map_or(today, |date| date.min(today))
}

/// Drives filings from a [`FilingSource`] through split, extraction and aggregation.
///
/// Derived partitions (and document lists) are read from and written to an
/// optional [`FilingCache`]; cache failures are logged and never fail a run.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use kessan::{DocId, EdinetConfig, EdinetProvider, InMemoryCache, Pipeline};
///
/// let source = Arc::new(EdinetProvider::new(EdinetConfig::from_env()?)?);
/// let pipeline = Pipeline::new(source).with_cache(Arc::new(InMemoryCache::new()));
///
/// let report = pipeline.run(&[DocId::new("S100ABCD")]).await;
/// println!("{:?}", report.current.current_ratio);
/// ```
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn FilingSource>,
    cache: Option<Arc<dyn FilingCache>>,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field("cache", &self.cache.as_ref().map(|_| "configured"))
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline over `source` with default settings and no cache.
    #[must_use]
    pub fn new(source: Arc<dyn FilingSource>) -> Self {
        Self {
            source,
            cache: None,
            config: PipelineConfig::default(),
        }
    }

    /// Set the cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn FilingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the run configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the run configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Finds the documents a company submitted.
    ///
    /// The document list for `date` comes from the cache when present,
    /// otherwise from the source (and is stored back). Entries whose filer
    /// name equals `company_name` are returned; when there are none, every
    /// cached document list is searched instead.
    ///
    /// # Errors
    /// Returns [`KessanError::DocumentNotFound`] if no document matches, or the
    /// source's error if the list cannot be fetched.
    #[instrument(skip(self))]
    pub async fn resolve_documents(
        &self,
        company_name: &str,
        date: NaiveDate,
    ) -> Result<Vec<DocumentMeta>> {
        let documents = match self.cached_documents(date).await {
            Some(documents) => documents,
            None => {
                let documents = self.source.list_documents(date).await?;
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.put_documents(date, &documents).await {
                        warn!(error = %e, "Failed to cache document list");
                    }
                }
                documents
            }
        };

        let matched: Vec<_> = documents
            .into_iter()
            .filter(|doc| doc.is_filed_by(company_name))
            .collect();
        if !matched.is_empty() {
            debug!(count = matched.len(), "Resolved documents from date list");
            return Ok(matched);
        }

        if let Some(cache) = &self.cache {
            match cache.find_documents_by_filer(company_name).await {
                Ok(found) if !found.is_empty() => {
                    info!(count = found.len(), "Resolved documents from cached lists");
                    return Ok(found);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to search cached document lists"),
            }
        }

        Err(KessanError::DocumentNotFound(format!(
            "no document filed by {company_name}"
        )))
    }

    async fn cached_documents(&self, date: NaiveDate) -> Option<Vec<DocumentMeta>> {
        let cache = self.cache.as_ref()?;
        match cache.get_documents(date).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(error = %e, "Failed to read cached document list");
                None
            }
        }
    }

    /// Returns the prior/current partitions of a filing.
    ///
    /// Cached partitions are used when both are present; otherwise the filing
    /// is fetched, split, and both partitions are persisted.
    ///
    /// # Errors
    /// Returns source errors and [`KessanError::Schema`] if the export has no
    /// context-id column.
    #[instrument(skip(self), fields(doc_id = %doc_id))]
    pub async fn load_split(&self, doc_id: &DocId) -> Result<PeriodSplit> {
        if let Some(cache) = &self.cache {
            let prior = cache.get_partition(doc_id, Period::Prior).await;
            let current = cache.get_partition(doc_id, Period::Current).await;
            match (prior, current) {
                (Ok(Some(prior)), Ok(Some(current))) => {
                    debug!("Using cached partitions");
                    return Ok(PeriodSplit { prior, current });
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to read cached partitions");
                }
                _ => {}
            }
        }

        let table = self
            .source
            .fetch_archive(doc_id, &self.config.retry)
            .await?;
        let split = split(table, CONTEXT_ID_COLUMN)?;

        if let Some(cache) = &self.cache {
            for period in Period::ALL {
                if let Err(e) = cache.put_partition(doc_id, period, split.get(period)).await {
                    warn!(%period, error = %e, "Failed to cache partition");
                }
            }
        }

        Ok(split)
    }

    /// Extracts both periods of one filing.
    ///
    /// A retrieval failure is reported for both periods; an extraction failure
    /// only for its own period.
    #[instrument(skip(self), fields(doc_id = %doc_id))]
    pub async fn process_filing(&self, doc_id: &DocId) -> FilingOutcome {
        let scope = self.config.scope;
        let (prior, current) = match self.load_split(doc_id).await {
            Ok(split) => {
                let run = |period: Period| {
                    PeriodPartition::from_table(period, split.get(period))
                        .and_then(|partition| extract(&partition, scope))
                };
                (run(Period::Prior), run(Period::Current))
            }
            Err(e) => (Err(e.clone()), Err(e)),
        };

        for (period, result) in [(Period::Prior, &prior), (Period::Current, &current)] {
            if let Err(e) = result {
                warn!(%period, error = %e, "Extraction failed");
            }
        }

        FilingOutcome {
            doc_id: doc_id.clone(),
            prior,
            current,
        }
    }

    /// Processes `doc_ids` with bounded concurrency and aggregates each period.
    ///
    /// Outcomes keep the order of `doc_ids`. Failed filings are kept in the
    /// report and left out of the aggregates.
    #[instrument(skip(self, doc_ids), fields(count = doc_ids.len()))]
    pub async fn run(&self, doc_ids: &[DocId]) -> PipelineReport {
        let outcomes: Vec<FilingOutcome> = stream::iter(doc_ids)
            .map(|doc_id| self.process_filing(doc_id))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let report = PipelineReport::from_outcomes(outcomes);
        info!(
            filings = report.filings.len(),
            failures = report.failures().count(),
            "Pipeline run finished"
        );
        report
    }
}
