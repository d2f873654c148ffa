//! Audio-to-orchestrator session.

use crate::audio::{AudioSource, FrameAssembler};
use crate::engine::Inference;
use crate::error::{Result, WakegateError};
use crate::pipeline::orchestrator::Orchestrator;
use crate::pipeline::profile::Profiler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long to wait before polling a live source again when it had nothing.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of one [`Session::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    /// Samples were ingested, emitting this many frames.
    Delivered { samples: usize, frames: usize },
    /// A live source had nothing new.
    Idle,
    /// A finite source is exhausted.
    Exhausted,
}

/// Totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub deliveries: u64,
    pub samples: u64,
    pub frames: u64,
}

/// Feeds delivered audio through the frame assembler into the orchestrator.
pub struct Session<W, I>
where
    W: FnMut(),
    I: FnMut(Inference),
{
    assembler: FrameAssembler,
    orchestrator: Orchestrator<W, I>,
    profiler: Profiler,
    stats: SessionStats,
}

impl<W, I> Session<W, I>
where
    W: FnMut(),
    I: FnMut(Inference),
{
    pub fn new(orchestrator: Orchestrator<W, I>) -> Result<Self> {
        let assembler = FrameAssembler::new(orchestrator.frame_length())?;
        Ok(Self {
            assembler,
            orchestrator,
            profiler: Profiler::new(),
            stats: SessionStats::default(),
        })
    }

    /// Hand one delivery of any size to the pipeline.
    ///
    /// Returns the number of frames processed.
    pub fn ingest(&mut self, samples: &[i16]) -> Result<usize> {
        let orchestrator = &mut self.orchestrator;
        let assembler = &mut self.assembler;

        self.profiler.tic();
        let result = assembler.ingest(samples, |frame| orchestrator.process(frame));
        self.profiler.toc();

        let frames = result?;
        self.stats.deliveries += 1;
        self.stats.samples += samples.len() as u64;
        self.stats.frames += frames as u64;
        Ok(frames)
    }

    /// Read one delivery from `source` and ingest it.
    pub fn pump<S>(&mut self, source: &mut S) -> Result<Pump>
    where
        S: AudioSource + ?Sized,
    {
        let samples = source.read_samples()?;
        if samples.is_empty() {
            return Ok(if source.is_finite() {
                Pump::Exhausted
            } else {
                Pump::Idle
            });
        }
        let frames = self.ingest(&samples)?;
        Ok(Pump::Delivered {
            samples: samples.len(),
            frames,
        })
    }

    /// Drive the pipeline from `source` until it is exhausted, `running`
    /// goes false, or something fails.
    ///
    /// # Errors
    /// `AudioFormatMismatch` if the source rate differs from the engines';
    /// source and pipeline errors are passed through. The source is stopped
    /// in every case once started.
    pub fn run<S>(&mut self, source: &mut S, running: &AtomicBool) -> Result<SessionStats>
    where
        S: AudioSource + ?Sized,
    {
        let expected = self.orchestrator.sample_rate();
        if source.sample_rate() != expected {
            return Err(WakegateError::AudioFormatMismatch {
                expected: format!("{} Hz", expected),
                actual: format!("{} Hz", source.sample_rate()),
            });
        }

        source.start()?;
        debug!(sample_rate = expected, "audio source started");

        let outcome = self.drain(source, running);

        if let Err(e) = source.stop() {
            warn!("Failed to stop audio source: {}", e);
        }
        outcome?;

        info!(
            deliveries = self.stats.deliveries,
            samples = self.stats.samples,
            frames = self.stats.frames,
            "session finished"
        );
        Ok(self.stats)
    }

    fn drain<S>(&mut self, source: &mut S, running: &AtomicBool) -> Result<()>
    where
        S: AudioSource + ?Sized,
    {
        while running.load(Ordering::SeqCst) {
            match self.pump(source)? {
                Pump::Delivered { .. } => {}
                Pump::Idle => thread::sleep(POLL_INTERVAL),
                Pump::Exhausted => break,
            }
        }
        Ok(())
    }

    /// Discard any partial frame, e.g. after an audio gap.
    pub fn reset_assembler(&mut self) {
        self.assembler.reset();
    }

    pub fn orchestrator(&self) -> &Orchestrator<W, I> {
        &self.orchestrator
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Samples held back waiting for the current frame to fill.
    pub fn pending_samples(&self) -> usize {
        self.assembler.filled()
    }
}
