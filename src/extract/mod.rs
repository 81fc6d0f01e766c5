pub mod chroma;
pub mod energy;
pub mod onset;
pub mod spectral;
