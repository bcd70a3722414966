//! Sample encoding and the format/rate preferences of the sample programs.

use audio_stream_core::{DeviceDescriptor, SampleFormat};

/// Writes a value in `-1.0..=1.0` into one sample slot.
pub type Encoder = fn(f64, &mut [u8]);

/// Formats `sine` tries, first supported wins.
pub const SINE_FORMATS: [SampleFormat; 4] = [
    SampleFormat::FLOAT32_NE,
    SampleFormat::FLOAT64_NE,
    SampleFormat::S32_NE,
    SampleFormat::S16_NE,
];

/// Formats `record` tries, first supported wins.
pub const RECORD_FORMATS: [SampleFormat; 18] = [
    SampleFormat::FLOAT32_NE,
    SampleFormat::FLOAT32_FE,
    SampleFormat::S32_NE,
    SampleFormat::S32_FE,
    SampleFormat::S24_NE,
    SampleFormat::S24_FE,
    SampleFormat::S16_NE,
    SampleFormat::S16_FE,
    SampleFormat::FLOAT64_NE,
    SampleFormat::FLOAT64_FE,
    SampleFormat::U32_NE,
    SampleFormat::U32_FE,
    SampleFormat::U24_NE,
    SampleFormat::U24_FE,
    SampleFormat::U16_NE,
    SampleFormat::U16_FE,
    SampleFormat::S8,
    SampleFormat::U8,
];

/// Rates `record` tries before falling back to the one nearest the first.
pub const RECORD_RATES: [u32; 4] = [48000, 44100, 96000, 24000];

/// First format in `priority` the device supports.
pub fn pick_format(device: &DeviceDescriptor, priority: &[SampleFormat]) -> Option<SampleFormat> {
    priority
        .iter()
        .copied()
        .find(|&format| device.supports_format(format))
}

/// Like [`pick_format`], falling back to the device's first advertised format.
pub fn pick_format_or_first(device: &DeviceDescriptor, priority: &[SampleFormat]) -> Option<SampleFormat> {
    pick_format(device, priority).or_else(|| device.capabilities().ok()?.formats.first().copied())
}

/// First rate in `priority` the device supports, else the top of the
/// device's first advertised range.
pub fn pick_sample_rate(device: &DeviceDescriptor, priority: &[u32]) -> Option<u32> {
    priority
        .iter()
        .copied()
        .find(|&rate| device.supports_sample_rate(rate))
        .or_else(|| Some(device.capabilities().ok()?.sample_rates.first()?.max))
}

macro_rules! int_encoder {
    ($name:ident, $ty:ty, $bits:expr, $offset:expr, $to_bytes:ident) => {
        fn $name(value: f64, sample: &mut [u8]) {
            let max = ((1i64 << ($bits - 1)) - 1) as f64;
            let scaled = (value.clamp(-1.0, 1.0) * max).round() as i64 + $offset;
            sample.copy_from_slice(&(scaled as $ty).$to_bytes());
        }
    };
}

int_encoder!(encode_s8, i8, 8, 0, to_ne_bytes);
int_encoder!(encode_u8, u8, 8, 1i64 << 7, to_ne_bytes);
int_encoder!(encode_s16le, i16, 16, 0, to_le_bytes);
int_encoder!(encode_s16be, i16, 16, 0, to_be_bytes);
int_encoder!(encode_u16le, u16, 16, 1i64 << 15, to_le_bytes);
int_encoder!(encode_u16be, u16, 16, 1i64 << 15, to_be_bytes);
// 24-bit samples sit in the low three bytes of a 32-bit slot.
int_encoder!(encode_s24le, i32, 24, 0, to_le_bytes);
int_encoder!(encode_s24be, i32, 24, 0, to_be_bytes);
int_encoder!(encode_u24le, u32, 24, 1i64 << 23, to_le_bytes);
int_encoder!(encode_u24be, u32, 24, 1i64 << 23, to_be_bytes);
int_encoder!(encode_s32le, i32, 32, 0, to_le_bytes);
int_encoder!(encode_s32be, i32, 32, 0, to_be_bytes);
int_encoder!(encode_u32le, u32, 32, 1i64 << 31, to_le_bytes);
int_encoder!(encode_u32be, u32, 32, 1i64 << 31, to_be_bytes);

fn encode_f32le(value: f64, sample: &mut [u8]) {
    sample.copy_from_slice(&(value as f32).to_le_bytes());
}

fn encode_f32be(value: f64, sample: &mut [u8]) {
    sample.copy_from_slice(&(value as f32).to_be_bytes());
}

fn encode_f64le(value: f64, sample: &mut [u8]) {
    sample.copy_from_slice(&value.to_le_bytes());
}

fn encode_f64be(value: f64, sample: &mut [u8]) {
    sample.copy_from_slice(&value.to_be_bytes());
}

pub fn encoder_for(format: SampleFormat) -> Encoder {
    match format {
        SampleFormat::S8 => encode_s8,
        SampleFormat::U8 => encode_u8,
        SampleFormat::S16Le => encode_s16le,
        SampleFormat::S16Be => encode_s16be,
        SampleFormat::U16Le => encode_u16le,
        SampleFormat::U16Be => encode_u16be,
        SampleFormat::S24Le => encode_s24le,
        SampleFormat::S24Be => encode_s24be,
        SampleFormat::U24Le => encode_u24le,
        SampleFormat::U24Be => encode_u24be,
        SampleFormat::S32Le => encode_s32le,
        SampleFormat::S32Be => encode_s32be,
        SampleFormat::U32Le => encode_u32le,
        SampleFormat::U32Be => encode_u32be,
        SampleFormat::Float32Le => encode_f32le,
        SampleFormat::Float32Be => encode_f32be,
        SampleFormat::Float64Le => encode_f64le,
        SampleFormat::Float64Be => encode_f64be,
    }
}

#[cfg(test)]
mod tests {
    use audio_stream_core::{ChannelLayout, DeviceAim, DeviceCapabilities, SampleRateRange};

    use super::*;

    fn encode(format: SampleFormat, value: f64) -> Vec<u8> {
        let mut sample = vec![0u8; format.bytes_per_sample()];
        encoder_for(format)(value, &mut sample);
        sample
    }

    #[test]
    fn every_format_has_a_sized_encoder() {
        for format in SampleFormat::ALL {
            // Panics on a size mismatch.
            encode(format, 0.25);
        }
    }

    #[test]
    fn zero_encodes_as_silence() {
        for format in SampleFormat::ALL {
            let mut silence = vec![0u8; format.bytes_per_sample()];
            format.write_silence(&mut silence);
            assert_eq!(encode(format, 0.0), silence, "{}", format);
        }
    }

    #[test]
    fn integer_extremes() {
        assert_eq!(encode(SampleFormat::S16Le, 1.0), 32767i16.to_le_bytes());
        assert_eq!(encode(SampleFormat::S16Be, -1.0), (-32767i16).to_be_bytes());
        assert_eq!(encode(SampleFormat::U8, -1.0), vec![1]);
        assert_eq!(encode(SampleFormat::S24Le, 1.0), vec![0xff, 0xff, 0x7f, 0x00]);
        assert_eq!(encode(SampleFormat::U24Be, 0.0), vec![0x00, 0x80, 0x00, 0x00]);
        // Out-of-range input is clipped.
        assert_eq!(encode(SampleFormat::S16Le, 3.0), 32767i16.to_le_bytes());
    }

    #[test]
    fn float_round_trips() {
        let bytes = encode(SampleFormat::Float32Be, 0.5);
        assert_eq!(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 0.5);
        let bytes = encode(SampleFormat::Float64Le, -0.25);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        assert_eq!(f64::from_le_bytes(raw), -0.25);
    }

    fn device(formats: Vec<SampleFormat>, rates: Vec<SampleRateRange>) -> DeviceDescriptor {
        DeviceDescriptor::new(
            "test",
            "Test",
            DeviceAim::Input,
            DeviceCapabilities {
                layouts: vec![ChannelLayout::stereo()],
                current_layout: Some(ChannelLayout::stereo()),
                formats,
                current_format: None,
                sample_rates: rates,
                sample_rate_current: 0,
                software_latency_min: 0.0,
                software_latency_max: 0.0,
                software_latency_current: 0.0,
            },
        )
    }

    #[test]
    fn format_priority_picks_first_supported() {
        let dev = device(vec![SampleFormat::S16_NE, SampleFormat::S32_NE], vec![SampleRateRange::single(48000)]);
        assert_eq!(pick_format(&dev, &SINE_FORMATS), Some(SampleFormat::S32_NE));
        assert_eq!(pick_format(&dev, &RECORD_FORMATS), Some(SampleFormat::S32_NE));
        let dev = device(vec![SampleFormat::U8], vec![SampleRateRange::single(48000)]);
        assert_eq!(pick_format(&dev, &SINE_FORMATS), None);
        assert_eq!(pick_format_or_first(&dev, &SINE_FORMATS), Some(SampleFormat::U8));
    }

    #[test]
    fn rate_priority_falls_back_to_first_advertised_range() {
        let dev = device(vec![SampleFormat::S16_NE], vec![SampleRateRange::single(96000)]);
        assert_eq!(pick_sample_rate(&dev, &RECORD_RATES), Some(96000));
        let dev = device(vec![SampleFormat::S16_NE], vec![SampleRateRange::new(8000, 32000)]);
        assert_eq!(pick_sample_rate(&dev, &RECORD_RATES), Some(24000));
        let dev = device(
            vec![SampleFormat::S16_NE],
            vec![SampleRateRange::single(8000), SampleRateRange::single(32000)],
        );
        assert_eq!(pick_sample_rate(&dev, &RECORD_RATES), Some(8000));
        let dev = device(vec![SampleFormat::S16_NE], vec![SampleRateRange::new(8000, 16000)]);
        assert_eq!(pick_sample_rate(&dev, &RECORD_RATES), Some(16000));
        let dev = device(vec![SampleFormat::S16_NE], vec![]);
        assert_eq!(pick_sample_rate(&dev, &RECORD_RATES), None);
    }
}
