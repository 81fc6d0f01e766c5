pub mod analysis;
pub mod assemble;
pub mod decode;
pub mod features;
pub mod normalize;
pub mod resample;
