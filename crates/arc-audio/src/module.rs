/// The interface the mixer asks of a tracker-module renderer.
///
/// This is the seam in front of the vendor playback library: the runtime
/// core only ever talks to this trait. Implementations are constructed on
/// the main thread (they may allocate there); once handed to the mixer
/// they are driven exclusively from the audio callback and must not
/// allocate in [`ModuleDecoder::read_interleaved_stereo`].
pub trait ModuleDecoder: Send {
    /// Renders up to `frames` stereo frames at `sample_rate` into `out`
    /// (interleaved, `out.len() >= frames * 2`). Returns the number of
    /// frames produced; fewer than requested means the module ended.
    fn read_interleaved_stereo(&mut self, sample_rate: u32, frames: usize, out: &mut [f32])
        -> usize;

    /// Seeks to an absolute position in seconds.
    fn seek(&mut self, seconds: f64);

    /// Playback speed factor (1.0 = authored tempo).
    fn set_tempo_factor(&mut self, factor: f64);

    /// Whether playback restarts at the end instead of stopping.
    fn set_repeat(&mut self, looping: bool);
}
