pub mod audio;
pub mod dsp;
pub mod engine;
pub mod mask;
pub mod scheduler;
pub mod splitter;
