//! # Wave Sequencer
//!
//! Drives generation: starting at the singularity, it evaluates one
//! [`WavePoint`] per step and walks the position down by the step size while
//! the position stays strictly positive.
//!
//! ## States
//! `Ready → Running → Completed | Failed | Cancelled`. A run takes
//! `&mut self`, so one instance can never run twice at once. A finished
//! sequencer may be run again and replays the identical series.
//!
//! ## Consumers
//! - [`WaveSequencer::points`]: lazy iterator, pulled by the caller
//! - [`WaveSequencer::generate`]: blocking push into a [`WaveSink`]
//! - [`WaveSequencer::generate_async`]: the same loop on tokio's blocking pool
//!
//! Positions are computed as `singularity - n * step` rather than by repeated
//! subtraction, so a run emits exactly `ceil(singularity / step)` points.

use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::debug;

use crate::datasets::DatasetTable;
use crate::evaluator::{EvaluationError, PointEvaluator};
use crate::params::WaveParams;
use crate::powers::PowerTable;
use crate::{WaveError, WavePoint};

/// Lifecycle of a [`WaveSequencer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Final signal of a run.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub success: bool,
    pub error: Option<&'a WaveError>,
}

/// Receives the output of a generation run.
///
/// Both calls happen on the generating thread, in order: every point, then
/// exactly one completion. A slow sink stalls the sequencer.
pub trait WaveSink {
    fn on_point(&mut self, point: WavePoint);

    fn on_complete(&mut self, _completion: Completion<'_>) {}
}

impl WaveSink for Vec<WavePoint> {
    fn on_point(&mut self, point: WavePoint) {
        self.push(point);
    }
}

impl<S: WaveSink + ?Sized> WaveSink for &mut S {
    fn on_point(&mut self, point: WavePoint) {
        (**self).on_point(point);
    }

    fn on_complete(&mut self, completion: Completion<'_>) {
        (**self).on_complete(completion);
    }
}

/// Owned event form of the sink calls, for channel consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum WaveEvent {
    Point(WavePoint),
    Complete {
        success: bool,
        error: Option<String>,
    },
}

impl WaveSink for Sender<WaveEvent> {
    fn on_point(&mut self, point: WavePoint) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(WaveEvent::Point(point));
    }

    fn on_complete(&mut self, completion: Completion<'_>) {
        let _ = self.send(WaveEvent::Complete {
            success: completion.success,
            error: completion.error.map(|e| e.to_string()),
        });
    }
}

/// Cooperative cancellation flag, checked once per step.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything handed back by [`WaveSequencer::generate_async`].
#[derive(Debug)]
pub struct AsyncRun<S> {
    pub sequencer: WaveSequencer,
    pub sink: S,
    /// Number of points emitted, or the error that ended the run
    pub outcome: Result<u64, WaveError>,
}

/// Generates the wave for one set of parameters.
#[derive(Debug)]
pub struct WaveSequencer {
    params: WaveParams,
    powers: PowerTable,
    table: Arc<DatasetTable>,
    state: SequencerState,
}

impl WaveSequencer {
    pub fn new(params: WaveParams, table: Arc<DatasetTable>) -> Self {
        let powers = PowerTable::build(params.scale_factor());
        Self {
            params,
            powers,
            table,
            state: SequencerState::Ready,
        }
    }

    pub fn params(&self) -> &WaveParams {
        &self.params
    }

    pub fn powers(&self) -> &PowerTable {
        &self.powers
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn evaluator(&self) -> PointEvaluator<'_> {
        PointEvaluator::new(&self.powers, &self.table)
    }

    /// Evaluate every dataset at `position`.
    pub fn point_at(&self, position: f64) -> Result<WavePoint, EvaluationError> {
        let values = self.evaluator().evaluate_all(position)?;
        Ok(WavePoint { position, values })
    }

    /// Lazy series from the singularity down toward zero.
    ///
    /// Each call starts over. The iterator ends after the last positive
    /// position or right after yielding an error.
    pub fn points(&self) -> WavePoints<'_> {
        WavePoints {
            evaluator: self.evaluator(),
            singularity: self.params.singularity(),
            step: self.params.step(),
            index: 0,
            done: false,
        }
    }

    /// Run to completion on the current thread, pushing into `sink`.
    ///
    /// The sink always receives a completion signal, including on failure
    /// and cancellation. Returns the number of emitted points.
    pub fn generate<S: WaveSink + ?Sized>(
        &mut self,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> Result<u64, WaveError> {
        self.state = SequencerState::Running;
        debug!(
            singularity = self.params.singularity(),
            step = self.params.step(),
            scale_factor = self.params.scale_factor(),
            "wave generation started"
        );

        let result = self.run(sink, cancel);

        self.state = match &result {
            Ok(_) => SequencerState::Completed,
            Err(WaveError::Cancelled { .. }) => SequencerState::Cancelled,
            Err(_) => SequencerState::Failed,
        };
        match &result {
            Ok(count) => {
                debug!(points = count, "wave generation completed");
                sink.on_complete(Completion {
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                debug!(error = %e, "wave generation stopped");
                sink.on_complete(Completion {
                    success: false,
                    error: Some(e),
                });
            }
        }
        result
    }

    fn run<S: WaveSink + ?Sized>(&self, sink: &mut S, cancel: &CancelToken) -> Result<u64, WaveError> {
        let mut emitted = 0;
        let mut points = self.points();
        loop {
            if cancel.is_cancelled() && points.has_pending() {
                return Err(WaveError::Cancelled { emitted });
            }
            match points.next() {
                Some(point) => {
                    sink.on_point(point?);
                    emitted += 1;
                }
                None => return Ok(emitted),
            }
        }
    }

    /// Run [`generate`](Self::generate) on tokio's blocking pool.
    ///
    /// The loop itself is unchanged; this only moves it off the caller's
    /// task. Must be awaited inside a tokio runtime. A panic on the blocking
    /// pool, including one raised by the sink, is resumed on the caller.
    pub async fn generate_async<S>(mut self, mut sink: S, cancel: CancelToken) -> AsyncRun<S>
    where
        S: WaveSink + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(move || {
            let outcome = self.generate(&mut sink, &cancel);
            AsyncRun {
                sequencer: self,
                sink,
                outcome,
            }
        });
        match handle.await {
            Ok(run) => run,
            // The sequencer and sink moved into the task; a panic loses them.
            Err(join) => std::panic::resume_unwind(join.into_panic()),
        }
    }
}

/// Iterator returned by [`WaveSequencer::points`].
#[derive(Debug)]
pub struct WavePoints<'a> {
    evaluator: PointEvaluator<'a>,
    singularity: f64,
    step: f64,
    index: u64,
    done: bool,
}

impl WavePoints<'_> {
    /// Position the next call to `next` will evaluate.
    pub fn next_position(&self) -> f64 {
        self.singularity - self.index as f64 * self.step
    }

    /// True while another call to `next` would yield an item.
    pub fn has_pending(&self) -> bool {
        !self.done && self.next_position() > 0.0
    }
}

impl Iterator for WavePoints<'_> {
    type Item = Result<WavePoint, EvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let position = self.next_position();
        if !(position > 0.0) {
            self.done = true;
            return None;
        }

        match self.evaluator.evaluate_all(position) {
            Ok(values) => {
                self.index += 1;
                Some(Ok(WavePoint { position, values }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for WavePoints<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{WaveType, SET_COUNT, SET_SIZE};
    use std::sync::mpsc;

    fn ramp_table() -> Arc<DatasetTable> {
        let mut sets = [[0i32; SET_SIZE]; SET_COUNT];
        for (n, set) in sets.iter_mut().enumerate() {
            for (i, value) in set.iter_mut().enumerate() {
                *value = ((i * 11 + n * 5) % 37) as i32;
            }
        }
        Arc::new(DatasetTable::from_sets(sets))
    }

    fn zero_table() -> Arc<DatasetTable> {
        Arc::new(DatasetTable::from_sets([[0; SET_SIZE]; SET_COUNT]))
    }

    /// Records everything, including completion.
    #[derive(Default)]
    struct Recorder {
        points: Vec<WavePoint>,
        completions: Vec<(bool, Option<String>)>,
    }

    impl WaveSink for Recorder {
        fn on_point(&mut self, point: WavePoint) {
            self.points.push(point);
        }

        fn on_complete(&mut self, completion: Completion<'_>) {
            self.completions
                .push((completion.success, completion.error.map(|e| e.to_string())));
        }
    }

    #[test]
    fn test_zero_table_scenario() {
        let params = WaveParams::new(1.0, 0.0, 60.0, 64).unwrap();
        let mut sequencer = WaveSequencer::new(params, zero_table());
        let mut recorder = Recorder::default();

        let count = sequencer
            .generate(&mut recorder, &CancelToken::new())
            .unwrap();

        assert_eq!(count, 24);
        assert_eq!(recorder.points.len(), 24);
        for point in &recorder.points {
            assert_eq!(point.values, [0.0; SET_COUNT]);
        }
        assert_eq!(recorder.completions, vec![(true, None)]);
        assert_eq!(sequencer.state(), SequencerState::Completed);
    }

    #[test]
    fn test_positions_step_down_to_smallest_positive() {
        let params = WaveParams::new(1.0, 0.0, 60.0, 64).unwrap();
        let sequencer = WaveSequencer::new(params, ramp_table());
        let points: Vec<WavePoint> = sequencer.points().map(Result::unwrap).collect();

        assert_eq!(points.len() as u64, params.point_count());
        assert_eq!(points[0].position, 1.0);
        let last = points.last().unwrap().position;
        assert!(last > 0.0);
        assert!(last - params.step() <= 1e-12);
        for window in points.windows(2) {
            assert!(window[1].position < window[0].position);
        }
    }

    #[test]
    fn test_points_are_restartable_and_deterministic() {
        let params = WaveParams::new(2.0, 0.0, 90.0, 64).unwrap();
        let sequencer = WaveSequencer::new(params, ramp_table());
        let first: Vec<WavePoint> = sequencer.points().map(Result::unwrap).collect();
        let second: Vec<WavePoint> = sequencer.points().map(Result::unwrap).collect();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.position.to_bits(), b.position.to_bits());
            for (x, y) in a.values.iter().zip(&b.values) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn test_point_values_match_evaluator() {
        let params = WaveParams::new(0.5, 0.0, 60.0, 64).unwrap();
        let sequencer = WaveSequencer::new(params, ramp_table());
        let point = sequencer.points().next().unwrap().unwrap();
        assert_eq!(point, sequencer.point_at(0.5).unwrap());
        let evaluator = sequencer.evaluator();
        for wave in WaveType::ALL {
            assert_eq!(point.value(wave), evaluator.evaluate(0.5, wave).unwrap());
        }
    }

    #[test]
    fn test_evaluation_failure_stops_the_run() {
        // 2^63 < 1e19, so the first point runs off the power table.
        let params = WaveParams::new(1e19, 0.0, 1e18, 2).unwrap();
        let mut sequencer = WaveSequencer::new(params, ramp_table());
        let mut recorder = Recorder::default();

        let err = sequencer
            .generate(&mut recorder, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, WaveError::Evaluation(_)));
        assert!(recorder.points.is_empty());
        assert_eq!(recorder.completions.len(), 1);
        assert!(!recorder.completions[0].0);
        assert!(recorder.completions[0].1.is_some());
        assert_eq!(sequencer.state(), SequencerState::Failed);
    }

    #[test]
    fn test_iterator_fuses_after_error() {
        let step_minutes = 1e18 * 60.0 * 24.0;
        let params = WaveParams::new(1e19, 0.0, step_minutes, 2).unwrap();
        let sequencer = WaveSequencer::new(params, ramp_table());
        let mut points = sequencer.points();
        assert!(points.next().unwrap().is_err());
        assert!(points.next().is_none());
    }

    #[test]
    fn test_cancel_before_start_emits_nothing() {
        let params = WaveParams::new(1.0, 0.0, 60.0, 64).unwrap();
        let mut sequencer = WaveSequencer::new(params, zero_table());
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut recorder = Recorder::default();

        let err = sequencer.generate(&mut recorder, &cancel).unwrap_err();

        assert!(matches!(err, WaveError::Cancelled { emitted: 0 }));
        assert!(recorder.points.is_empty());
        assert_eq!(recorder.completions.len(), 1);
        assert_eq!(sequencer.state(), SequencerState::Cancelled);
    }

    #[test]
    fn test_cancel_mid_run() {
        struct CancelAfter {
            limit: usize,
            seen: usize,
            cancel: CancelToken,
        }

        impl WaveSink for CancelAfter {
            fn on_point(&mut self, _point: WavePoint) {
                self.seen += 1;
                if self.seen == self.limit {
                    self.cancel.cancel();
                }
            }
        }

        let params = WaveParams::new(1.0, 0.0, 60.0, 64).unwrap();
        let mut sequencer = WaveSequencer::new(params, zero_table());
        let cancel = CancelToken::new();
        let mut sink = CancelAfter {
            limit: 5,
            seen: 0,
            cancel: cancel.clone(),
        };

        let err = sequencer.generate(&mut sink, &cancel).unwrap_err();
        assert!(matches!(err, WaveError::Cancelled { emitted: 5 }));
        assert_eq!(sink.seen, 5);
    }

    #[test]
    fn test_cancel_after_last_point_still_completes() {
        struct CancelOnLast {
            total: u64,
            seen: u64,
            cancel: CancelToken,
        }

        impl WaveSink for CancelOnLast {
            fn on_point(&mut self, _point: WavePoint) {
                self.seen += 1;
                if self.seen == self.total {
                    self.cancel.cancel();
                }
            }
        }

        let params = WaveParams::new(1.0, 0.0, 60.0, 64).unwrap();
        let mut sequencer = WaveSequencer::new(params, zero_table());
        let cancel = CancelToken::new();
        let mut sink = CancelOnLast {
            total: params.point_count(),
            seen: 0,
            cancel: cancel.clone(),
        };

        let count = sequencer.generate(&mut sink, &cancel).unwrap();
        assert_eq!(count, 24);
        assert_eq!(sequencer.state(), SequencerState::Completed);
    }

    #[test]
    fn test_next_position_tracks_the_iterator() {
        let params = WaveParams::new(0.1, 0.0, 60.0, 64).unwrap();
        let sequencer = WaveSequencer::new(params, zero_table());
        let mut points = sequencer.points();
        assert_eq!(points.next_position(), 0.1);
        assert!(points.has_pending());
        let first = points.next().unwrap().unwrap();
        assert_eq!(first.position, 0.1);
        assert_eq!(points.next_position(), 0.1 - params.step());
        assert_eq!(points.by_ref().count(), 2);
        assert!(!points.has_pending());
    }

    #[test]
    fn test_channel_sink_receives_events() {
        let params = WaveParams::new(0.1, 0.0, 60.0, 64).unwrap();
        let mut sequencer = WaveSequencer::new(params, zero_table());
        let (mut tx, rx) = mpsc::channel();
        sequencer.generate(&mut tx, &CancelToken::new()).unwrap();
        drop(tx);

        let events: Vec<WaveEvent> = rx.iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], WaveEvent::Point(_)));
        assert_eq!(
            events[3],
            WaveEvent::Complete {
                success: true,
                error: None
            }
        );
    }

    #[test]
    fn test_rerun_replays_same_series() {
        let params = WaveParams::new(0.25, 0.0, 30.0, 64).unwrap();
        let mut sequencer = WaveSequencer::new(params, ramp_table());
        let mut first = Vec::new();
        let mut second = Vec::new();
        sequencer.generate(&mut first, &CancelToken::new()).unwrap();
        sequencer.generate(&mut second, &CancelToken::new()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let params = WaveParams::new(1.5, 0.0, 45.0, 64).unwrap();
        let table = ramp_table();

        let mut sync_points = Vec::new();
        WaveSequencer::new(params, Arc::clone(&table))
            .generate(&mut sync_points, &CancelToken::new())
            .unwrap();

        let run = WaveSequencer::new(params, table)
            .generate_async(Vec::new(), CancelToken::new())
            .await;

        assert_eq!(run.outcome.unwrap(), sync_points.len() as u64);
        assert_eq!(run.sequencer.state(), SequencerState::Completed);
        assert_eq!(run.sink.len(), sync_points.len());
        for (a, b) in run.sink.iter().zip(&sync_points) {
            assert_eq!(a.position.to_bits(), b.position.to_bits());
            for (x, y) in a.values.iter().zip(&b.values) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[tokio::test]
    #[should_panic(expected = "sink exploded")]
    async fn test_async_resumes_sink_panic() {
        struct Exploding;

        impl WaveSink for Exploding {
            fn on_point(&mut self, _point: WavePoint) {
                panic!("sink exploded");
            }
        }

        let params = WaveParams::new(0.1, 0.0, 60.0, 64).unwrap();
        let _ = WaveSequencer::new(params, zero_table())
            .generate_async(Exploding, CancelToken::new())
            .await;
    }
}
