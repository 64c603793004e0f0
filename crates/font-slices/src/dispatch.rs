//! Parallel subset job dispatch and result aggregation.

use std::{
    error,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    css::{self, FontFace},
    definition::{CodepointSet, Slice},
    errors::DispatchError,
    ranges::compact,
};

/// Progress is logged after every this many completed units (and at the end).
const PROGRESS_INTERVAL: usize = 10;

/// Diagnostic reported by a failed [`Subsetter`] invocation.
pub type SubsetError = Box<dyn error::Error + Send + Sync>;

/// One unit of subsetting work handed to a [`Subsetter`].
#[derive(Debug, Clone, Copy)]
pub struct SubsetJob<'a> {
    /// Ordinal of the slice being subset.
    pub ordinal: usize,
    /// `unicode-range` value covering exactly the codepoints to retain.
    pub unicode_range: &'a str,
    /// Artifact file name, relative to the output directory.
    pub file_name: &'a str,
}

/// Capability for producing one subset font file.
///
/// Injected into [`dispatch()`] so the fan-out / aggregation logic stays
/// independent of how subsetting is physically performed (an external
/// `fonttools` process in the shipped CLI, a recording fake in tests).
/// Implementations are called concurrently from worker threads.
pub trait Subsetter: Sync {
    /// Produces the subset artifact for `job`.
    ///
    /// # Errors
    ///
    /// A failure is recorded against the job's slice without cancelling
    /// sibling jobs; the run as a whole reports it once aggregation
    /// completes.
    fn subset(&self, job: &SubsetJob<'_>) -> Result<(), SubsetError>;
}

/// Configuration for [`dispatch()`].
///
/// `jobs` is a passed-in value; the dispatcher never consults ambient
/// parallelism state itself. Callers derive the default from the detected
/// CPU count.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// CSS-facing font properties embedded into every emitted rule.
    pub face: FontFace,
    /// Sanitized file stem shared by artifact names and the stylesheet.
    pub file_stem: String,
    /// Output container format, e.g. `woff2`.
    pub container: String,
    /// Worker pool width; clamped to at least 1.
    pub jobs: usize,
}

impl DispatchOptions {
    fn file_name(&self, ordinal: usize) -> String {
        // Zero-padded so reruns with identical input overwrite their own
        // artifacts instead of accumulating stale ones.
        format!("{}-slice{ordinal:03}.{}", self.file_stem, self.container)
    }
}

/// Outcome of one slice: the `@font-face` rule if a subset was produced,
/// `None` if the slice had no overlap with the font's coverage.
#[derive(Debug, Clone)]
pub struct SliceResult {
    /// Ordinal of the originating slice.
    pub ordinal: usize,
    /// Stylesheet fragment, absent for skipped slices.
    pub fragment: Option<String>,
}

/// A subsetting unit that failed, with its underlying diagnostic.
#[derive(Debug)]
pub struct SliceFailure {
    /// Ordinal of the failed slice.
    pub ordinal: usize,
    /// Diagnostic reported by the [`Subsetter`].
    pub error: SubsetError,
}

/// Aggregated results of a [`dispatch()`] run, in ordinal order.
#[derive(Debug)]
pub struct DispatchReport {
    /// Per-slice outcomes (emitted or skipped), sorted by ordinal.
    pub results: Vec<SliceResult>,
    /// Failed units, sorted by ordinal. Empty on a fully successful run.
    pub failures: Vec<SliceFailure>,
}

impl DispatchReport {
    /// Total number of dispatched slices.
    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Number of slices for which a subset artifact and rule were produced.
    pub fn emitted(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.fragment.is_some())
            .count()
    }

    /// Number of slices skipped for empty coverage intersection.
    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.fragment.is_none())
            .count()
    }

    /// Assembles the stylesheet from the emitted fragments.
    ///
    /// Results are already ordinal-sorted, so the document reproduces source
    /// definition order byte-for-byte regardless of the worker count used.
    pub fn stylesheet(&self) -> String {
        let fragments = self
            .results
            .iter()
            .filter_map(|result| result.fragment.as_deref());
        css::stylesheet(fragments)
    }
}

struct RawOutcome {
    ordinal: usize,
    kind: OutcomeKind,
}

enum OutcomeKind {
    Emitted(String),
    Skipped,
    Failed(SubsetError),
}

/// Runs the per-slice subset pipeline concurrently over a bounded worker
/// pool and reassembles results in definition order.
///
/// Each eligible slice (non-empty intersection with `coverage`) becomes one
/// unit of work: compact the overlap, serialize it, invoke `subsetter`, and
/// build the `@font-face` fragment. Units share no mutable state; the only
/// coordination point is the completion buffer, which is sorted by ordinal
/// once the pool drains. A failed unit does not cancel its siblings.
///
/// # Errors
///
/// Fails only if the worker pool itself cannot be constructed; per-unit
/// failures are reported through [`DispatchReport::failures`].
pub fn dispatch(
    slices: &[Slice],
    coverage: &CodepointSet,
    subsetter: &dyn Subsetter,
    options: &DispatchOptions,
) -> Result<DispatchReport, DispatchError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .thread_name(|idx| format!("slice-worker-{idx}"))
        .build()
        .map_err(DispatchError::new)?;

    let total = slices.len();
    let completed = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let outcomes = Mutex::new(Vec::with_capacity(total));

    pool.scope(|scope| {
        for slice in slices {
            let (completed, skipped, outcomes) = (&completed, &skipped, &outcomes);
            scope.spawn(move |_| {
                let outcome = run_slice(slice, coverage, subsetter, options);
                if matches!(outcome.kind, OutcomeKind::Skipped) {
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_INTERVAL == 0 || done == total {
                    tracing::info!(
                        "progress: {done}/{total} slices ({} skipped)",
                        skipped.load(Ordering::Relaxed),
                    );
                }
                let mut outcomes = outcomes.lock().expect("slice worker panicked");
                outcomes.push(outcome);
            });
        }
    });

    let mut outcomes = outcomes.into_inner().expect("slice worker panicked");
    // Completion order is nondeterministic; source order is the contract.
    outcomes.sort_unstable_by_key(|outcome| outcome.ordinal);

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        let ordinal = outcome.ordinal;
        match outcome.kind {
            OutcomeKind::Emitted(fragment) => results.push(SliceResult {
                ordinal,
                fragment: Some(fragment),
            }),
            OutcomeKind::Skipped => results.push(SliceResult {
                ordinal,
                fragment: None,
            }),
            OutcomeKind::Failed(error) => failures.push(SliceFailure { ordinal, error }),
        }
    }
    Ok(DispatchReport { results, failures })
}

fn run_slice(
    slice: &Slice,
    coverage: &CodepointSet,
    subsetter: &dyn Subsetter,
    options: &DispatchOptions,
) -> RawOutcome {
    let ordinal = slice.ordinal;
    let overlap: CodepointSet = slice.codepoints.intersection(coverage).copied().collect();
    if overlap.is_empty() {
        // A definition may enumerate codepoints (e.g. emoji) entirely absent
        // from this font; subsetting for zero glyphs is wasted work.
        tracing::debug!("slice {ordinal:03}: no overlap with font coverage, skipping");
        return RawOutcome {
            ordinal,
            kind: OutcomeKind::Skipped,
        };
    }

    let unicode_range = css::unicode_range(&compact(&overlap));
    let file_name = options.file_name(ordinal);
    let job = SubsetJob {
        ordinal,
        unicode_range: &unicode_range,
        file_name: &file_name,
    };
    let kind = match subsetter.subset(&job) {
        Ok(()) => OutcomeKind::Emitted(css::font_face_rule(
            &options.face,
            &file_name,
            &options.container,
            &unicode_range,
        )),
        Err(error) => {
            tracing::warn!("slice {ordinal:03}: subsetting failed: {error}");
            OutcomeKind::Failed(error)
        }
    };
    RawOutcome { ordinal, kind }
}
