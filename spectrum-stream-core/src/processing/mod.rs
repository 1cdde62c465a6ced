pub mod averager;
pub mod fft;
pub mod pcm;
pub mod rate_gate;
pub mod ring_buffer;
