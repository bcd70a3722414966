use std::fmt;

use serde::{Deserialize, Serialize};

/// Encoding of a single sample.
///
/// 24-bit formats are carried in a 4-byte container with the low three
/// bytes significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    S8,
    U8,
    S16Le,
    S16Be,
    U16Le,
    U16Be,
    S24Le,
    S24Be,
    U24Le,
    U24Be,
    S32Le,
    S32Be,
    U32Le,
    U32Be,
    Float32Le,
    Float32Be,
    Float64Le,
    Float64Be,
}

#[cfg(target_endian = "little")]
impl SampleFormat {
    pub const S16_NE: Self = Self::S16Le;
    pub const U16_NE: Self = Self::U16Le;
    pub const S24_NE: Self = Self::S24Le;
    pub const U24_NE: Self = Self::U24Le;
    pub const S32_NE: Self = Self::S32Le;
    pub const U32_NE: Self = Self::U32Le;
    pub const FLOAT32_NE: Self = Self::Float32Le;
    pub const FLOAT64_NE: Self = Self::Float64Le;

    pub const S16_FE: Self = Self::S16Be;
    pub const U16_FE: Self = Self::U16Be;
    pub const S24_FE: Self = Self::S24Be;
    pub const U24_FE: Self = Self::U24Be;
    pub const S32_FE: Self = Self::S32Be;
    pub const U32_FE: Self = Self::U32Be;
    pub const FLOAT32_FE: Self = Self::Float32Be;
    pub const FLOAT64_FE: Self = Self::Float64Be;
}

#[cfg(target_endian = "big")]
impl SampleFormat {
    pub const S16_NE: Self = Self::S16Be;
    pub const U16_NE: Self = Self::U16Be;
    pub const S24_NE: Self = Self::S24Be;
    pub const U24_NE: Self = Self::U24Be;
    pub const S32_NE: Self = Self::S32Be;
    pub const U32_NE: Self = Self::U32Be;
    pub const FLOAT32_NE: Self = Self::Float32Be;
    pub const FLOAT64_NE: Self = Self::Float64Be;

    pub const S16_FE: Self = Self::S16Le;
    pub const U16_FE: Self = Self::U16Le;
    pub const S24_FE: Self = Self::S24Le;
    pub const U24_FE: Self = Self::U24Le;
    pub const S32_FE: Self = Self::S32Le;
    pub const U32_FE: Self = Self::U32Le;
    pub const FLOAT32_FE: Self = Self::Float32Le;
    pub const FLOAT64_FE: Self = Self::Float64Le;
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 18] = [
        Self::S8,
        Self::U8,
        Self::S16Le,
        Self::S16Be,
        Self::U16Le,
        Self::U16Be,
        Self::S24Le,
        Self::S24Be,
        Self::U24Le,
        Self::U24Be,
        Self::S32Le,
        Self::S32Be,
        Self::U32Le,
        Self::U32Be,
        Self::Float32Le,
        Self::Float32Be,
        Self::Float64Le,
        Self::Float64Be,
    ];

    /// Width of one sample in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::S8 | Self::U8 => 1,
            Self::S16Le | Self::S16Be | Self::U16Le | Self::U16Be => 2,
            Self::S24Le
            | Self::S24Be
            | Self::U24Le
            | Self::U24Be
            | Self::S32Le
            | Self::S32Be
            | Self::U32Le
            | Self::U32Be
            | Self::Float32Le
            | Self::Float32Be => 4,
            Self::Float64Le | Self::Float64Be => 8,
        }
    }

    pub const fn bytes_per_frame(self, channel_count: usize) -> usize {
        self.bytes_per_sample() * channel_count
    }

    pub const fn bytes_per_second(self, channel_count: usize, sample_rate: u32) -> usize {
        self.bytes_per_frame(channel_count) * sample_rate as usize
    }

    /// Whether multi-byte samples are stored big-endian. Single-byte formats
    /// report `false`.
    pub const fn is_big_endian(self) -> bool {
        matches!(
            self,
            Self::S16Be
                | Self::U16Be
                | Self::S24Be
                | Self::U24Be
                | Self::S32Be
                | Self::U32Be
                | Self::Float32Be
                | Self::Float64Be
        )
    }

    pub const fn is_native_endian(self) -> bool {
        self.bytes_per_sample() == 1 || self.is_big_endian() == cfg!(target_endian = "big")
    }

    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float32Le | Self::Float32Be | Self::Float64Le | Self::Float64Be
        )
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::S8
                | Self::S16Le
                | Self::S16Be
                | Self::S24Le
                | Self::S24Be
                | Self::S32Le
                | Self::S32Be
        ) || self.is_float()
    }

    /// Writes the encoding of silence into `sample`, which must be
    /// [`bytes_per_sample`](Self::bytes_per_sample) long. Unsigned formats
    /// centre on their midpoint rather than zero.
    pub fn write_silence(self, sample: &mut [u8]) {
        sample.fill(0);
        let msb = match self {
            Self::U8 | Self::U16Be | Self::U32Be => Some(0),
            Self::U16Le => Some(1),
            Self::U24Le => Some(2),
            Self::U24Be => Some(1),
            Self::U32Le => Some(3),
            _ => None,
        };
        if let Some(index) = msb {
            sample[index] = 0x80;
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::S8 => "signed 8-bit",
            Self::U8 => "unsigned 8-bit",
            Self::S16Le => "signed 16-bit LE",
            Self::S16Be => "signed 16-bit BE",
            Self::U16Le => "unsigned 16-bit LE",
            Self::U16Be => "unsigned 16-bit BE",
            Self::S24Le => "signed 24-bit LE",
            Self::S24Be => "signed 24-bit BE",
            Self::U24Le => "unsigned 24-bit LE",
            Self::U24Be => "unsigned 24-bit BE",
            Self::S32Le => "signed 32-bit LE",
            Self::S32Be => "signed 32-bit BE",
            Self::U32Le => "unsigned 32-bit LE",
            Self::U32Be => "unsigned 32-bit BE",
            Self::Float32Le => "float 32-bit LE",
            Self::Float32Be => "float 32-bit BE",
            Self::Float64Le => "float 64-bit LE",
            Self::Float64Be => "float 64-bit BE",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
