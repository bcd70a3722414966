use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use audio_stream_core::{SampleFormat, SineWave, StreamError, WriteCallback, WriteContext};

use crate::pcm::{encoder_for, Encoder};

/// Realtime write callback that plays a sine tone through the Begin/End
/// protocol, filling everything the backend offers each cycle.
pub struct SineSource {
    sine: SineWave,
    encode: Encoder,
    pause_requested: Arc<AtomicBool>,
}

impl SineSource {
    pub fn new(frequency: f64, format: SampleFormat) -> Self {
        Self {
            sine: SineWave::new(frequency),
            encode: encoder_for(format),
            pause_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that makes the next cycle pause the stream from inside the
    /// callback.
    pub fn pause_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.pause_requested)
    }

    fn fill(&mut self, stream: &mut WriteContext<'_>, frame_count_max: usize) -> Result<(), StreamError> {
        let seconds_per_frame = stream.seconds_per_frame();
        let mut frames_left = frame_count_max;
        while frames_left > 0 {
            let mut areas = match stream.begin_write(frames_left)? {
                Some(areas) => areas,
                None => return stream.end_write(),
            };
            let frames = areas.frame_count();
            self.sine.render(&mut areas, seconds_per_frame, self.encode);
            match stream.end_write() {
                Ok(()) | Err(StreamError::Underflow) => {}
                Err(err) => return Err(err),
            }
            frames_left -= frames;
        }
        Ok(())
    }
}

impl WriteCallback for SineSource {
    fn on_write(&mut self, stream: &mut WriteContext<'_>, _frame_count_min: usize, frame_count_max: usize) {
        // Errors fault the stream and reach its delegate; nothing to add here.
        let _ = self.fill(stream, frame_count_max);
        if self.pause_requested.swap(false, Ordering::AcqRel) {
            let _ = stream.pause(true);
        }
    }
}
