//! Simulated device buffer and the wall clock that paces it.

use std::time::Instant;

use audio_stream_core::{CaptureRegion, ReadTransport, StreamError, StreamParams, WriteTransport};

/// Frame-granular circular buffer standing in for device memory.
///
/// Playback streams write into it through [`WriteTransport`] while the
/// stream thread drains it at the sample rate. Capture streams see the
/// reverse: the thread fills it and the callback reads it through
/// [`ReadTransport`].
pub(crate) struct HardwareBuffer {
    data: Vec<u8>,
    bytes_per_frame: usize,
    capacity: usize,
    read_pos: usize,
    fill: usize,
    seconds_per_frame: f64,
    silence_frame: Vec<u8>,
}

impl HardwareBuffer {
    pub(crate) fn new(params: &StreamParams, capacity: usize) -> Self {
        let bytes_per_frame = params.bytes_per_frame();
        let mut silence_frame = vec![0u8; bytes_per_frame];
        for sample in silence_frame.chunks_exact_mut(params.bytes_per_sample()) {
            params.format.write_silence(sample);
        }
        let mut data = Vec::with_capacity(capacity * bytes_per_frame);
        for _ in 0..capacity {
            data.extend_from_slice(&silence_frame);
        }
        Self {
            data,
            bytes_per_frame,
            capacity,
            read_pos: 0,
            fill: 0,
            seconds_per_frame: params.seconds_per_frame(),
            silence_frame,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn fill(&self) -> usize {
        self.fill
    }

    pub(crate) fn free(&self) -> usize {
        self.capacity - self.fill
    }

    fn write_pos(&self) -> usize {
        (self.read_pos + self.fill) % self.capacity
    }

    /// Plays `frames` out of the buffer. Returns how many of them were
    /// missing.
    pub(crate) fn drain(&mut self, frames: usize) -> usize {
        let taken = frames.min(self.fill);
        self.read_pos = (self.read_pos + taken) % self.capacity;
        self.fill -= taken;
        frames - taken
    }

    /// Records `frames` of silence into the buffer, overwriting the oldest
    /// frames when it is full. Returns how many frames were lost.
    pub(crate) fn capture(&mut self, frames: usize) -> usize {
        let mut lost = 0;
        for _ in 0..frames {
            if self.fill == self.capacity {
                self.read_pos = (self.read_pos + 1) % self.capacity;
                self.fill -= 1;
                lost += 1;
            }
            let start = self.write_pos() * self.bytes_per_frame;
            self.data[start..start + self.bytes_per_frame].copy_from_slice(&self.silence_frame);
            self.fill += 1;
        }
        lost
    }

    /// Drops everything queued.
    pub(crate) fn clear(&mut self) {
        self.read_pos = 0;
        self.fill = 0;
    }

    /// Samples still queued for playback, in the order they will be played.
    #[cfg(test)]
    pub(crate) fn queued(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.fill * self.bytes_per_frame);
        for index in 0..self.fill {
            let start = ((self.read_pos + index) % self.capacity) * self.bytes_per_frame;
            out.extend_from_slice(&self.data[start..start + self.bytes_per_frame]);
        }
        out
    }

    fn buffered_latency(&self) -> f64 {
        self.fill as f64 * self.seconds_per_frame
    }
}

impl WriteTransport for HardwareBuffer {
    /// Lends free space up to the wrap point; the next bracket continues
    /// from the start of the buffer.
    fn begin_write(&mut self, frame_count: usize) -> Result<(&mut [u8], usize), StreamError> {
        let start = self.write_pos();
        let frames = frame_count.min(self.free()).min(self.capacity - start);
        let begin = start * self.bytes_per_frame;
        let end = begin + frames * self.bytes_per_frame;
        Ok((&mut self.data[begin..end], frames))
    }

    fn end_write(&mut self, frame_count: usize) -> Result<(), StreamError> {
        if frame_count > self.free() {
            return Err(StreamError::invalid("committed more frames than were lent"));
        }
        self.fill += frame_count;
        Ok(())
    }

    fn latency(&self) -> Result<f64, StreamError> {
        Ok(self.buffered_latency())
    }
}

impl ReadTransport for HardwareBuffer {
    fn begin_read(&mut self, frame_count: usize) -> Result<CaptureRegion<'_>, StreamError> {
        let frames = frame_count.min(self.fill).min(self.capacity - self.read_pos);
        let begin = self.read_pos * self.bytes_per_frame;
        let end = begin + frames * self.bytes_per_frame;
        Ok(CaptureRegion::Data(&self.data[begin..end], frames))
    }

    fn end_read(&mut self, frame_count: usize) -> Result<(), StreamError> {
        if frame_count > self.fill {
            return Err(StreamError::invalid("released more frames than were captured"));
        }
        self.drain(frame_count);
        Ok(())
    }

    fn latency(&self) -> Result<f64, StreamError> {
        Ok(self.buffered_latency())
    }
}

/// Converts elapsed wall-clock time into whole frames, carrying the
/// fractional remainder to the next tick.
pub(crate) struct FrameClock {
    origin: Instant,
    sample_rate: f64,
    emitted: u64,
}

impl FrameClock {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            origin: Instant::now(),
            sample_rate: f64::from(sample_rate),
            emitted: 0,
        }
    }

    /// Frames that elapsed since the previous tick.
    pub(crate) fn tick(&mut self) -> usize {
        let total = (self.origin.elapsed().as_secs_f64() * self.sample_rate) as u64;
        let frames = total.saturating_sub(self.emitted);
        self.emitted = total;
        frames as usize
    }
}

/// Encoding of a silent sample, used by tests to recognise untouched frames.
#[cfg(test)]
pub(crate) fn silence_sample(format: audio_stream_core::SampleFormat) -> Vec<u8> {
    let mut sample = vec![0u8; format.bytes_per_sample()];
    format.write_silence(&mut sample);
    sample
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use audio_stream_core::{ChannelLayout, SampleFormat};

    use super::*;

    fn params(format: SampleFormat) -> StreamParams {
        StreamParams {
            name: "test".into(),
            format,
            sample_rate: 48000,
            layout: ChannelLayout::stereo(),
            software_latency: 0.01,
        }
    }

    fn write_frames(buffer: &mut HardwareBuffer, frames: usize, byte: u8) -> usize {
        let (region, lent) = WriteTransport::begin_write(buffer, frames).unwrap();
        region.fill(byte);
        WriteTransport::end_write(buffer, lent).unwrap();
        lent
    }

    #[test]
    fn write_region_stops_at_wrap_point() {
        let mut buffer = HardwareBuffer::new(&params(SampleFormat::S16_NE), 8);
        assert_eq!(write_frames(&mut buffer, 6, 1), 6);
        assert_eq!(buffer.drain(4), 0);

        // Two frames to the end of memory, then the rest from the start.
        assert_eq!(write_frames(&mut buffer, 6, 2), 2);
        assert_eq!(write_frames(&mut buffer, 6, 3), 4);
        assert_eq!(buffer.free(), 0);
        assert_eq!(write_frames(&mut buffer, 6, 4), 0);

        let queued = buffer.queued();
        let frame = 4;
        assert!(queued[..2 * frame].iter().all(|&b| b == 1));
        assert!(queued[2 * frame..4 * frame].iter().all(|&b| b == 2));
        assert!(queued[4 * frame..].iter().all(|&b| b == 3));
    }

    #[test]
    fn drain_reports_missing_frames() {
        let mut buffer = HardwareBuffer::new(&params(SampleFormat::FLOAT32_NE), 16);
        write_frames(&mut buffer, 5, 7);
        assert_eq!(buffer.drain(8), 3);
        assert_eq!(buffer.fill(), 0);
    }

    #[test]
    fn over_commit_is_rejected() {
        let mut buffer = HardwareBuffer::new(&params(SampleFormat::FLOAT32_NE), 4);
        let (_, lent) = WriteTransport::begin_write(&mut buffer, 4).unwrap();
        assert_eq!(lent, 4);
        assert!(matches!(
            WriteTransport::end_write(&mut buffer, 5),
            Err(StreamError::Invalid(_))
        ));
    }

    #[test]
    fn capture_overwrites_oldest_frames_when_full() {
        let mut buffer = HardwareBuffer::new(&params(SampleFormat::U8), 10);
        assert_eq!(buffer.capture(7), 0);
        assert_eq!(buffer.capture(7), 4);
        assert_eq!(buffer.fill(), 10);
    }

    #[test]
    fn captured_frames_are_encoded_silence() {
        let format = SampleFormat::U16_NE;
        let mut buffer = HardwareBuffer::new(&params(format), 8);
        buffer.capture(3);
        let silence = silence_sample(format);
        match ReadTransport::begin_read(&mut buffer, 8).unwrap() {
            CaptureRegion::Data(bytes, frames) => {
                assert_eq!(frames, 3);
                for sample in bytes.chunks_exact(format.bytes_per_sample()) {
                    assert_eq!(sample, silence.as_slice());
                }
            }
            CaptureRegion::Hole(_) => panic!("dummy capture never reports holes"),
        }
        ReadTransport::end_read(&mut buffer, 3).unwrap();
        assert_eq!(buffer.fill(), 0);
    }

    #[test]
    fn read_region_stops_at_wrap_point() {
        let mut buffer = HardwareBuffer::new(&params(SampleFormat::S16_NE), 8);
        buffer.capture(6);
        ReadTransport::end_read(&mut buffer, 6).unwrap();
        buffer.capture(5);
        match ReadTransport::begin_read(&mut buffer, 5).unwrap() {
            CaptureRegion::Data(_, frames) => assert_eq!(frames, 2),
            CaptureRegion::Hole(_) => panic!("unexpected hole"),
        }
    }

    #[test]
    fn latency_tracks_buffered_frames() {
        let mut buffer = HardwareBuffer::new(&params(SampleFormat::FLOAT32_NE), 4800);
        write_frames(&mut buffer, 480, 0);
        let latency = WriteTransport::latency(&buffer).unwrap();
        approx::assert_abs_diff_eq!(latency, 0.01, epsilon = 1e-9);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut buffer = HardwareBuffer::new(&params(SampleFormat::FLOAT32_NE), 32);
        write_frames(&mut buffer, 20, 9);
        buffer.clear();
        assert_eq!(buffer.fill(), 0);
        assert_eq!(buffer.free(), buffer.capacity());
    }

    #[test]
    fn frame_clock_counts_elapsed_frames() {
        let mut clock = FrameClock::new(1000);
        std::thread::sleep(Duration::from_millis(20));
        let first = clock.tick();
        assert!(first >= 20, "only {first} frames after 20ms");
    }
}
