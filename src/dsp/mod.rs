pub mod cqt;
pub mod hpss;
pub mod mel;
pub mod stft;
