//! Per-channel views over a backend buffer region.
//!
//! A backend describes where each channel's samples live with an
//! [`AreaLayout`]: one byte offset and one stride per channel, relative to the
//! start of the region it lends for a cycle. The layout is validated once when
//! the stream opens; afterwards [`ChannelAreas`] and [`ChannelAreasMut`] only
//! check that the lent region is long enough for the frame count.

use crate::models::error::StreamError;
use crate::models::format::SampleFormat;

/// Location of one channel inside a buffer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelArea {
    /// Byte offset of the channel's first sample.
    pub offset: usize,
    /// Bytes between consecutive samples of the channel.
    pub step: usize,
}

/// Where every channel's samples live inside a buffer region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaLayout {
    areas: Vec<ChannelArea>,
    bytes_per_sample: usize,
}

impl AreaLayout {
    /// Frames stored one after another, channels adjacent within a frame.
    pub fn interleaved(channel_count: usize, bytes_per_sample: usize) -> Self {
        let step = channel_count * bytes_per_sample;
        let areas = (0..channel_count)
            .map(|channel| ChannelArea {
                offset: channel * bytes_per_sample,
                step,
            })
            .collect();
        Self {
            areas,
            bytes_per_sample,
        }
    }

    /// One contiguous block of `frames_per_channel` samples per channel.
    pub fn planar(channel_count: usize, bytes_per_sample: usize, frames_per_channel: usize) -> Self {
        let block = frames_per_channel * bytes_per_sample;
        let areas = (0..channel_count)
            .map(|channel| ChannelArea {
                offset: channel * block,
                step: bytes_per_sample,
            })
            .collect();
        Self {
            areas,
            bytes_per_sample,
        }
    }

    /// Arbitrary per-channel placement, as reported by a backend.
    pub fn from_areas(areas: Vec<ChannelArea>, bytes_per_sample: usize) -> Self {
        Self {
            areas,
            bytes_per_sample,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.areas.len()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    pub fn areas(&self) -> &[ChannelArea] {
        &self.areas
    }

    /// Bytes a region must span to hold `frame_count` frames.
    pub fn required_len(&self, frame_count: usize) -> usize {
        if frame_count == 0 {
            return 0;
        }
        self.areas
            .iter()
            .map(|area| area.offset + (frame_count - 1) * area.step + self.bytes_per_sample)
            .max()
            .unwrap_or(0)
    }

    /// Checks the layout against the negotiated channel count and sample width.
    pub fn validate(&self, channel_count: usize, bytes_per_sample: usize) -> Result<(), StreamError> {
        if self.areas.len() != channel_count {
            return Err(StreamError::invalid(format!(
                "area layout has {} channels, stream has {}",
                self.areas.len(),
                channel_count
            )));
        }
        if self.bytes_per_sample != bytes_per_sample || bytes_per_sample == 0 {
            return Err(StreamError::invalid(format!(
                "area layout sample width {} does not match {}",
                self.bytes_per_sample, bytes_per_sample
            )));
        }
        if let Some(area) = self.areas.iter().find(|area| area.step < bytes_per_sample) {
            return Err(StreamError::invalid(format!(
                "channel stride {} is shorter than a sample ({} bytes)",
                area.step, bytes_per_sample
            )));
        }
        Ok(())
    }
}

// Runs inside Begin/End brackets; the error must not allocate.
fn check_region(layout: &AreaLayout, len: usize, frame_count: usize) -> Result<(), StreamError> {
    let required = layout.required_len(frame_count);
    if required > len {
        return Err(StreamError::invalid("buffer region is shorter than the requested frames"));
    }
    Ok(())
}

/// Read-only channel view for one capture bracket.
#[derive(Debug, Clone, Copy)]
pub struct ChannelAreas<'a> {
    buffer: &'a [u8],
    layout: &'a AreaLayout,
    frame_count: usize,
}

impl<'a> ChannelAreas<'a> {
    pub fn new(buffer: &'a [u8], layout: &'a AreaLayout, frame_count: usize) -> Result<Self, StreamError> {
        check_region(layout, buffer.len(), frame_count)?;
        Ok(Self {
            buffer,
            layout,
            frame_count,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.layout.bytes_per_sample
    }

    pub fn area(&self, channel: usize) -> ChannelArea {
        self.layout.areas[channel]
    }

    /// Bytes of one sample.
    ///
    /// # Panics
    ///
    /// If `channel` or `frame` is out of range.
    pub fn sample(&self, channel: usize, frame: usize) -> &'a [u8] {
        assert!(frame < self.frame_count, "frame {} out of {}", frame, self.frame_count);
        let area = self.layout.areas[channel];
        let start = area.offset + frame * area.step;
        &self.buffer[start..start + self.layout.bytes_per_sample]
    }

    /// Samples of one channel in frame order.
    pub fn channel(&self, channel: usize) -> impl ExactSizeIterator<Item = &'a [u8]> + 'a {
        let area = self.layout.areas[channel];
        let width = self.layout.bytes_per_sample;
        let frames = self.frame_count;
        self.buffer
            .get(area.offset..)
            .unwrap_or(&[])
            .chunks(area.step.max(1))
            .take(frames)
            .map(move |chunk| &chunk[..width])
    }

    /// Copies whole frames into `dst` in interleaved order and returns how
    /// many frames fit.
    pub fn copy_to_interleaved(&self, dst: &mut [u8]) -> usize {
        let width = self.bytes_per_sample();
        let frame_bytes = width * self.channel_count();
        if frame_bytes == 0 {
            return 0;
        }
        let frames = (dst.len() / frame_bytes).min(self.frame_count);
        for frame in 0..frames {
            for channel in 0..self.channel_count() {
                let at = frame * frame_bytes + channel * width;
                dst[at..at + width].copy_from_slice(self.sample(channel, frame));
            }
        }
        frames
    }
}

/// Writable channel view for one playback bracket.
#[derive(Debug)]
pub struct ChannelAreasMut<'a> {
    buffer: &'a mut [u8],
    layout: &'a AreaLayout,
    frame_count: usize,
}

impl<'a> ChannelAreasMut<'a> {
    pub fn new(
        buffer: &'a mut [u8],
        layout: &'a AreaLayout,
        frame_count: usize,
    ) -> Result<Self, StreamError> {
        check_region(layout, buffer.len(), frame_count)?;
        Ok(Self {
            buffer,
            layout,
            frame_count,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.layout.bytes_per_sample
    }

    pub fn area(&self, channel: usize) -> ChannelArea {
        self.layout.areas[channel]
    }

    /// Bytes of one sample.
    ///
    /// # Panics
    ///
    /// If `channel` or `frame` is out of range.
    pub fn sample_mut(&mut self, channel: usize, frame: usize) -> &mut [u8] {
        assert!(frame < self.frame_count, "frame {} out of {}", frame, self.frame_count);
        let area = self.layout.areas[channel];
        let start = area.offset + frame * area.step;
        &mut self.buffer[start..start + self.layout.bytes_per_sample]
    }

    /// Mutable samples of one channel in frame order.
    pub fn channel_mut(&mut self, channel: usize) -> impl Iterator<Item = &mut [u8]> + '_ {
        let area = self.layout.areas[channel];
        let width = self.layout.bytes_per_sample;
        let frames = self.frame_count;
        let tail: &mut [u8] = match self.buffer.get_mut(area.offset..) {
            Some(tail) => tail,
            None => &mut [],
        };
        tail.chunks_mut(area.step.max(1))
            .take(frames)
            .map(move |chunk| &mut chunk[..width])
    }

    /// Writes silence for `format` into every sample of the bracket.
    pub fn fill_silence(&mut self, format: SampleFormat) {
        for channel in 0..self.channel_count() {
            for sample in self.channel_mut(channel) {
                format.write_silence(sample);
            }
        }
    }

    /// Copies whole interleaved frames from `src` and returns how many were
    /// copied.
    pub fn copy_from_interleaved(&mut self, src: &[u8]) -> usize {
        let width = self.bytes_per_sample();
        let frame_bytes = width * self.channel_count();
        if frame_bytes == 0 {
            return 0;
        }
        let frames = (src.len() / frame_bytes).min(self.frame_count);
        for frame in 0..frames {
            for channel in 0..self.channel_count() {
                let at = frame * frame_bytes + channel * width;
                self.sample_mut(channel, frame)
                    .copy_from_slice(&src[at..at + width]);
            }
        }
        frames
    }

    pub fn as_areas(&self) -> ChannelAreas<'_> {
        ChannelAreas {
            buffer: &*self.buffer,
            layout: self.layout,
            frame_count: self.frame_count,
        }
    }
}
