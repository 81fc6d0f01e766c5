use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pipeline stages, each reported exactly once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Loading,
    Separating,
    Spectrogram,
    Rms,
    Centroid,
    Contrast,
    Bands,
    Onset,
    Beats,
    HarmonicPercussive,
    Chroma,
    Normalizing,
    Assembling,
}

impl Stage {
    pub const ALL: [Stage; 13] = [
        Stage::Loading,
        Stage::Separating,
        Stage::Spectrogram,
        Stage::Rms,
        Stage::Centroid,
        Stage::Contrast,
        Stage::Bands,
        Stage::Onset,
        Stage::Beats,
        Stage::HarmonicPercussive,
        Stage::Chroma,
        Stage::Normalizing,
        Stage::Assembling,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Loading => "loading audio",
            Stage::Separating => "harmonic/percussive separation",
            Stage::Spectrogram => "spectrogram",
            Stage::Rms => "RMS energy",
            Stage::Centroid => "spectral centroid",
            Stage::Contrast => "spectral contrast",
            Stage::Bands => "frequency band energies",
            Stage::Onset => "onset strength",
            Stage::Beats => "beat tracking",
            Stage::HarmonicPercussive => "harmonic/percussive energy",
            Stage::Chroma => "chromagram",
            Stage::Normalizing => "normalization",
            Stage::Assembling => "frame assembly",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Share of stages completed, in (0, 1].
    pub fraction: f32,
}

/// Receives progress events. Called from worker threads, so must be `Sync`.
pub trait ProgressObserver: Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Discards all events.
pub struct Silent;

impl ProgressObserver for Silent {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Narrates progress through the `log` facade.
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_event(&self, event: ProgressEvent) {
        log::info!(
            "[{:>3.0}%] {} done",
            event.fraction * 100.0,
            event.stage.label()
        );
    }
}

/// Drives a terminal progress bar.
pub struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(1000);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("analysis complete");
    }
}

impl ProgressObserver for BarObserver {
    fn on_event(&self, event: ProgressEvent) {
        self.bar.set_message(event.stage.label());
        self.bar.set_position((event.fraction * 1000.0).round() as u64);
    }
}

/// Counts completed stages and forwards fractions to an observer.
///
/// Extractors finish in arbitrary order; the counter keeps fractions
/// monotonic regardless of which worker reports first.
pub struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    completed: AtomicUsize,
    total: usize,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn ProgressObserver, total: usize) -> Self {
        Self {
            observer,
            completed: AtomicUsize::new(0),
            total: total.max(1),
        }
    }

    pub fn complete(&self, stage: Stage) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let fraction = (done.min(self.total) as f32) / self.total as f32;
        self.observer.on_event(ProgressEvent { stage, fraction });
    }
}
