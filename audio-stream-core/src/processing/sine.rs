use std::f64::consts::TAU;

use super::channel_areas::ChannelAreasMut;

/// Sine oscillator whose phase survives across callbacks and brackets.
///
/// The running offset is kept modulo one period so it never grows large
/// enough to lose precision.
#[derive(Debug, Clone, PartialEq)]
pub struct SineWave {
    frequency: f64,
    amplitude: f64,
    seconds_offset: f64,
}

impl SineWave {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            amplitude: 1.0,
            seconds_offset: 0.0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }

    pub fn seconds_offset(&self) -> f64 {
        self.seconds_offset
    }

    /// Value of the `frame`-th sample after the current offset.
    pub fn value_at(&self, frame: usize, seconds_per_frame: f64) -> f64 {
        let t = self.seconds_offset + frame as f64 * seconds_per_frame;
        (TAU * self.frequency * t).sin() * self.amplitude
    }

    /// Moves the offset forward by `frames`.
    pub fn advance(&mut self, frames: usize, seconds_per_frame: f64) {
        self.seconds_offset =
            (self.seconds_offset + frames as f64 * seconds_per_frame) % self.period();
    }

    /// Writes the same waveform into every channel of `areas`, encoding each
    /// value with `encode`, then advances by the bracket's frame count.
    pub fn render(
        &mut self,
        areas: &mut ChannelAreasMut<'_>,
        seconds_per_frame: f64,
        mut encode: impl FnMut(f64, &mut [u8]),
    ) {
        let frames = areas.frame_count();
        for frame in 0..frames {
            let value = self.value_at(frame, seconds_per_frame);
            for channel in 0..areas.channel_count() {
                encode(value, areas.sample_mut(channel, frame));
            }
        }
        self.advance(frames, seconds_per_frame);
    }
}
