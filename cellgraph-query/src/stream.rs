use crate::assembler::{GraphMaterializer, SlidingResultsAssembler};
use crate::error::{Error, Result};
use cellgraph_api::DataGraph;
use cellgraph_storage::{ColumnFilter, ScanDescriptor, ScanExecutor, Scanner};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

const COMPLETE_KEY_IN_STREAM: &str =
    "expected scan query for streaming context - use a non-streaming API for this query";

/// Runs `scans` in order and yields graphs as the assembler accepts them.
///
/// Complete keys are point lookups and cannot be streamed; such a plan
/// yields a single error without executing any scan.
pub fn execute_streaming<'a, E, M>(
    executor: &'a E,
    scans: Vec<ScanDescriptor>,
    columns: ColumnFilter,
    assembler: SlidingResultsAssembler<M>,
) -> GraphStream<'a, E, M>
where
    E: ScanExecutor + ?Sized,
    M: GraphMaterializer,
{
    let pending = scans
        .iter()
        .any(ScanDescriptor::is_complete)
        .then_some(Error::Contract(COMPLETE_KEY_IN_STREAM));
    let assembler = if scans.len() > 1 {
        assembler.with_dedupe()
    } else {
        assembler
    };
    GraphStream {
        executor,
        scans: scans.into(),
        columns,
        assembler,
        scanner: None,
        sorted: None,
        pending,
        scans_started: 0,
        started: Instant::now(),
        done: false,
    }
}

/// Runs `scans` to completion, serving complete keys by point lookup, and
/// returns the accepted graphs sorted when the assembler has a comparator.
pub fn execute_collect<E, M>(
    executor: &E,
    scans: &[ScanDescriptor],
    columns: &ColumnFilter,
    assembler: SlidingResultsAssembler<M>,
) -> Result<Vec<DataGraph>>
where
    E: ScanExecutor + ?Sized,
    M: GraphMaterializer,
{
    let mut assembler = if scans.len() > 1 {
        assembler.with_dedupe()
    } else {
        assembler
    };
    let started = Instant::now();
    'scans: for scan in scans {
        if assembler.is_end_range_reached() {
            break;
        }
        match scan {
            ScanDescriptor::Complete(key) => {
                if let Some(row) = executor.get(&key.key, columns)? {
                    assembler.collect(&row)?;
                }
            }
            scan => {
                for row in executor.scan(scan, columns)? {
                    if assembler.is_end_range_reached() {
                        break 'scans;
                    }
                    assembler.collect(&row?)?;
                }
            }
        }
    }
    debug!(
        assembled = assembler.size(),
        ignored = assembler.ignored_count(),
        unrecognized = assembler.unrecognized_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "find complete"
    );
    Ok(assembler.into_results())
}

/// Lazy sequence of result graphs. Ends after the first error.
pub struct GraphStream<'a, E: ?Sized, M> {
    executor: &'a E,
    scans: VecDeque<ScanDescriptor>,
    columns: ColumnFilter,
    assembler: SlidingResultsAssembler<M>,
    scanner: Option<Scanner<'a>>,
    sorted: Option<std::vec::IntoIter<DataGraph>>,
    pending: Option<Error>,
    scans_started: usize,
    started: Instant,
    done: bool,
}

impl<'a, E, M> GraphStream<'a, E, M>
where
    E: ScanExecutor + ?Sized,
    M: GraphMaterializer,
{
    /// Feeds the next row to the assembler. `Ok(false)` once the window is
    /// satisfied or every scan is exhausted.
    fn advance(&mut self) -> Result<bool> {
        loop {
            if self.assembler.is_end_range_reached() {
                self.scanner = None;
                return Ok(false);
            }
            if let Some(scanner) = self.scanner.as_mut() {
                match scanner.next() {
                    Some(row) => {
                        self.assembler.collect(&row?)?;
                        return Ok(true);
                    }
                    None => {
                        self.scanner = None;
                        continue;
                    }
                }
            }
            let Some(scan) = self.scans.pop_front() else {
                return Ok(false);
            };
            debug!(
                start = ?scan.start(),
                stop = ?scan.stop(),
                "starting scan"
            );
            self.scanner = Some(self.executor.scan(&scan, &self.columns)?);
            self.scans_started += 1;
        }
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.scanner = None;
        debug!(
            "stream complete {} assembled, {} ignored, {} unrecognized ({} ms)",
            self.assembler.size(),
            self.assembler.ignored_count(),
            self.assembler.unrecognized_count(),
            self.started.elapsed().as_millis()
        );
    }

    /// Graphs placed in the window so far.
    pub fn size(&self) -> usize {
        self.assembler.size()
    }

    pub fn ignored_count(&self) -> usize {
        self.assembler.ignored_count()
    }

    pub fn unrecognized_count(&self) -> usize {
        self.assembler.unrecognized_count()
    }

    pub fn scans_started(&self) -> usize {
        self.scans_started
    }
}

impl<'a, E, M> Iterator for GraphStream<'a, E, M>
where
    E: ScanExecutor + ?Sized,
    M: GraphMaterializer,
{
    type Item = Result<DataGraph>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            self.finish();
            return Some(Err(err));
        }
        loop {
            if self.done {
                return None;
            }
            if let Some(sorted) = self.sorted.as_mut() {
                let next = sorted.next();
                if next.is_none() {
                    self.finish();
                }
                return next.map(Ok);
            }
            if let Some(graph) = self.assembler.pop_ready() {
                return Some(Ok(graph));
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) if self.assembler.has_comparator() => {
                    self.scanner = None;
                    self.sorted = Some(self.assembler.drain_results().into_iter());
                }
                Ok(false) => {
                    self.finish();
                    return None;
                }
                Err(err) => {
                    self.finish();
                    return Some(Err(err));
                }
            }
        }
    }
}
