use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// Maximum number of channels a [`ChannelLayout`] can hold.
pub const MAX_CHANNELS: usize = 24;

macro_rules! channel_ids {
    ($($variant:ident => $name:literal,)+) => {
        /// Role of one channel within a layout.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ChannelId {
            $($variant,)+
        }

        impl ChannelId {
            pub const ALL: &'static [ChannelId] = &[$(ChannelId::$variant,)+];

            pub const fn name(self) -> &'static str {
                match self {
                    $(ChannelId::$variant => $name,)+
                }
            }
        }
    };
}

channel_ids! {
    FrontLeft => "Front Left",
    FrontRight => "Front Right",
    FrontCenter => "Front Center",
    Lfe => "LFE",
    BackLeft => "Back Left",
    BackRight => "Back Right",
    FrontLeftCenter => "Front Left Center",
    FrontRightCenter => "Front Right Center",
    BackCenter => "Back Center",
    SideLeft => "Side Left",
    SideRight => "Side Right",
    TopCenter => "Top Center",
    TopFrontLeft => "Top Front Left",
    TopFrontCenter => "Top Front Center",
    TopFrontRight => "Top Front Right",
    TopBackLeft => "Top Back Left",
    TopBackCenter => "Top Back Center",
    TopBackRight => "Top Back Right",
    BackLeftCenter => "Back Left Center",
    BackRightCenter => "Back Right Center",
    FrontLeftWide => "Front Left Wide",
    FrontRightWide => "Front Right Wide",
    FrontLeftHigh => "Front Left High",
    FrontCenterHigh => "Front Center High",
    FrontRightHigh => "Front Right High",
    TopFrontLeftCenter => "Top Front Left Center",
    TopFrontRightCenter => "Top Front Right Center",
    TopSideLeft => "Top Side Left",
    TopSideRight => "Top Side Right",
    LeftLfe => "Left LFE",
    RightLfe => "Right LFE",
    Lfe2 => "LFE 2",
    BottomCenter => "Bottom Center",
    BottomLeftCenter => "Bottom Left Center",
    BottomRightCenter => "Bottom Right Center",
    MsMid => "Mid/Side Mid",
    MsSide => "Mid/Side Side",
    AmbisonicW => "Ambisonic W",
    AmbisonicX => "Ambisonic X",
    AmbisonicY => "Ambisonic Y",
    AmbisonicZ => "Ambisonic Z",
    XyX => "X-Y X",
    XyY => "X-Y Y",
    HeadphonesLeft => "Headphones Left",
    HeadphonesRight => "Headphones Right",
    ClickTrack => "Click Track",
    ForeignLanguage => "Foreign Language",
    HearingImpaired => "Hearing Impaired",
    Narration => "Narration",
    Haptic => "Haptic",
    DialogCentricMix => "Dialog Centric Mix",
    Aux => "Aux",
    Aux0 => "Aux 0",
    Aux1 => "Aux 1",
    Aux2 => "Aux 2",
    Aux3 => "Aux 3",
    Aux4 => "Aux 4",
    Aux5 => "Aux 5",
    Aux6 => "Aux 6",
    Aux7 => "Aux 7",
    Aux8 => "Aux 8",
    Aux9 => "Aux 9",
    Aux10 => "Aux 10",
    Aux11 => "Aux 11",
    Aux12 => "Aux 12",
    Aux13 => "Aux 13",
    Aux14 => "Aux 14",
    Aux15 => "Aux 15",
}

const SHORT_ALIASES: &[(&str, ChannelId)] = &[
    ("fl", ChannelId::FrontLeft),
    ("fr", ChannelId::FrontRight),
    ("fc", ChannelId::FrontCenter),
    ("bl", ChannelId::BackLeft),
    ("br", ChannelId::BackRight),
    ("flc", ChannelId::FrontLeftCenter),
    ("frc", ChannelId::FrontRightCenter),
    ("bc", ChannelId::BackCenter),
    ("sl", ChannelId::SideLeft),
    ("sr", ChannelId::SideRight),
    ("tc", ChannelId::TopCenter),
    ("left", ChannelId::FrontLeft),
    ("right", ChannelId::FrontRight),
    ("center", ChannelId::FrontCenter),
];

impl ChannelId {
    /// Parses a display name (case-insensitive, `-`/`_` accepted for spaces)
    /// or a short alias such as `fl`.
    pub fn parse(text: &str) -> Option<ChannelId> {
        let wanted = text.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        if let Some((_, id)) = SHORT_ALIASES.iter().find(|(alias, _)| *alias == wanted) {
            return Some(*id);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().to_ascii_lowercase().replace('-', " ") == wanted)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Well-known layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinLayout {
    Mono,
    Stereo,
    TwoPointOne,
    ThreePointZero,
    ThreePointZeroBack,
    ThreePointOne,
    FourPointZero,
    Quad,
    QuadSide,
    FourPointOne,
    FivePointZeroBack,
    FivePointZeroSide,
    FivePointOne,
    FivePointOneBack,
    SixPointZeroSide,
    SixPointZeroFront,
    Hexagonal,
    SixPointOne,
    SixPointOneBack,
    SixPointOneFront,
    SevenPointZero,
    SevenPointZeroFront,
    SevenPointOne,
    SevenPointOneWide,
    SevenPointOneWideBack,
    Octagonal,
}

impl BuiltinLayout {
    pub const ALL: [BuiltinLayout; 26] = [
        Self::Mono,
        Self::Stereo,
        Self::TwoPointOne,
        Self::ThreePointZero,
        Self::ThreePointZeroBack,
        Self::ThreePointOne,
        Self::FourPointZero,
        Self::Quad,
        Self::QuadSide,
        Self::FourPointOne,
        Self::FivePointZeroBack,
        Self::FivePointZeroSide,
        Self::FivePointOne,
        Self::FivePointOneBack,
        Self::SixPointZeroSide,
        Self::SixPointZeroFront,
        Self::Hexagonal,
        Self::SixPointOne,
        Self::SixPointOneBack,
        Self::SixPointOneFront,
        Self::SevenPointZero,
        Self::SevenPointZeroFront,
        Self::SevenPointOne,
        Self::SevenPointOneWide,
        Self::SevenPointOneWideBack,
        Self::Octagonal,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Mono => "Mono",
            Self::Stereo => "Stereo",
            Self::TwoPointOne => "2.1",
            Self::ThreePointZero => "3.0",
            Self::ThreePointZeroBack => "3.0 (back)",
            Self::ThreePointOne => "3.1",
            Self::FourPointZero => "4.0",
            Self::Quad => "Quad",
            Self::QuadSide => "Quad (side)",
            Self::FourPointOne => "4.1",
            Self::FivePointZeroBack => "5.0 (back)",
            Self::FivePointZeroSide => "5.0 (side)",
            Self::FivePointOne => "5.1",
            Self::FivePointOneBack => "5.1 (back)",
            Self::SixPointZeroSide => "6.0 (side)",
            Self::SixPointZeroFront => "6.0 (front)",
            Self::Hexagonal => "Hexagonal",
            Self::SixPointOne => "6.1",
            Self::SixPointOneBack => "6.1 (back)",
            Self::SixPointOneFront => "6.1 (front)",
            Self::SevenPointZero => "7.0",
            Self::SevenPointZeroFront => "7.0 (front)",
            Self::SevenPointOne => "7.1",
            Self::SevenPointOneWide => "7.1 (wide)",
            Self::SevenPointOneWideBack => "7.1 (wide) (back)",
            Self::Octagonal => "Octagonal",
        }
    }

    pub const fn channels(self) -> &'static [ChannelId] {
        use ChannelId::*;
        match self {
            Self::Mono => &[FrontCenter],
            Self::Stereo => &[FrontLeft, FrontRight],
            Self::TwoPointOne => &[FrontLeft, FrontRight, Lfe],
            Self::ThreePointZero => &[FrontLeft, FrontRight, FrontCenter],
            Self::ThreePointZeroBack => &[FrontLeft, FrontRight, BackCenter],
            Self::ThreePointOne => &[FrontLeft, FrontRight, FrontCenter, Lfe],
            Self::FourPointZero => &[FrontLeft, FrontRight, FrontCenter, BackCenter],
            Self::Quad => &[FrontLeft, FrontRight, BackLeft, BackRight],
            Self::QuadSide => &[FrontLeft, FrontRight, SideLeft, SideRight],
            Self::FourPointOne => &[FrontLeft, FrontRight, FrontCenter, Lfe, BackCenter],
            Self::FivePointZeroBack => &[FrontLeft, FrontRight, FrontCenter, BackLeft, BackRight],
            Self::FivePointZeroSide => &[FrontLeft, FrontRight, FrontCenter, SideLeft, SideRight],
            Self::FivePointOne => &[FrontLeft, FrontRight, FrontCenter, Lfe, SideLeft, SideRight],
            Self::FivePointOneBack => {
                &[FrontLeft, FrontRight, FrontCenter, Lfe, BackLeft, BackRight]
            }
            Self::SixPointZeroSide => {
                &[FrontLeft, FrontRight, FrontCenter, BackCenter, SideLeft, SideRight]
            }
            Self::SixPointZeroFront => &[
                FrontLeft,
                FrontRight,
                FrontLeftCenter,
                FrontRightCenter,
                SideLeft,
                SideRight,
            ],
            Self::Hexagonal => {
                &[FrontLeft, FrontRight, FrontCenter, BackLeft, BackRight, BackCenter]
            }
            Self::SixPointOne => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackCenter,
                SideLeft,
                SideRight,
            ],
            Self::SixPointOneBack => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackLeft,
                BackRight,
                BackCenter,
            ],
            Self::SixPointOneFront => &[
                FrontLeft,
                FrontRight,
                Lfe,
                FrontLeftCenter,
                FrontRightCenter,
                SideLeft,
                SideRight,
            ],
            Self::SevenPointZero => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                BackLeft,
                BackRight,
                SideLeft,
                SideRight,
            ],
            Self::SevenPointZeroFront => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                FrontLeftCenter,
                FrontRightCenter,
                SideLeft,
                SideRight,
            ],
            Self::SevenPointOne => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackLeft,
                BackRight,
                SideLeft,
                SideRight,
            ],
            Self::SevenPointOneWide => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                FrontLeftCenter,
                FrontRightCenter,
                SideLeft,
                SideRight,
            ],
            Self::SevenPointOneWideBack => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackLeft,
                BackRight,
                FrontLeftCenter,
                FrontRightCenter,
            ],
            Self::Octagonal => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                BackLeft,
                BackRight,
                BackCenter,
                SideLeft,
                SideRight,
            ],
        }
    }
}

/// Ordered assignment of channel roles.
///
/// Stored inline so layouts can be copied and compared on any thread
/// without allocating. Equality compares the channel sequence only; the
/// name is informational.
#[derive(Clone, Copy, Serialize)]
#[serde(into = "LayoutRepr")]
pub struct ChannelLayout {
    name: Option<&'static str>,
    channel_count: usize,
    channels: [ChannelId; MAX_CHANNELS],
}

impl ChannelLayout {
    /// Builds a layout from an explicit channel list and names it if it
    /// matches a builtin.
    pub fn new(channels: &[ChannelId]) -> Result<Self, StreamError> {
        if channels.is_empty() || channels.len() > MAX_CHANNELS {
            return Err(StreamError::invalid(format!(
                "layout must have 1..={} channels, got {}",
                MAX_CHANNELS,
                channels.len()
            )));
        }
        let mut layout = Self::from_slice(None, channels);
        layout.detect_builtin();
        Ok(layout)
    }

    pub fn builtin(which: BuiltinLayout) -> Self {
        Self::from_slice(Some(which.name()), which.channels())
    }

    pub fn builtins() -> impl Iterator<Item = ChannelLayout> {
        BuiltinLayout::ALL.into_iter().map(Self::builtin)
    }

    pub fn mono() -> Self {
        Self::builtin(BuiltinLayout::Mono)
    }

    pub fn stereo() -> Self {
        Self::builtin(BuiltinLayout::Stereo)
    }

    /// Default layout for a channel count, if one is defined.
    pub fn default_for_channel_count(channel_count: usize) -> Option<Self> {
        let which = match channel_count {
            1 => BuiltinLayout::Mono,
            2 => BuiltinLayout::Stereo,
            3 => BuiltinLayout::ThreePointZero,
            4 => BuiltinLayout::FourPointZero,
            5 => BuiltinLayout::FivePointZeroBack,
            6 => BuiltinLayout::FivePointOneBack,
            7 => BuiltinLayout::SixPointOne,
            8 => BuiltinLayout::SevenPointOne,
            _ => return None,
        };
        Some(Self::builtin(which))
    }

    fn from_slice(name: Option<&'static str>, channels: &[ChannelId]) -> Self {
        let mut storage = [ChannelId::Aux; MAX_CHANNELS];
        storage[..channels.len()].copy_from_slice(channels);
        Self {
            name,
            channel_count: channels.len(),
            channels: storage,
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels[..self.channel_count]
    }

    /// Index of `channel` within the layout.
    pub fn find_channel(&self, channel: ChannelId) -> Option<usize> {
        self.channels().iter().position(|&c| c == channel)
    }

    /// Names the layout after the builtin it matches. Returns whether one did.
    pub fn detect_builtin(&mut self) -> bool {
        match Self::builtins().find(|builtin| *builtin == *self) {
            Some(builtin) => {
                self.name = builtin.name;
                true
            }
            None => {
                self.name = None;
                false
            }
        }
    }

    /// First entry of `preferred` that also appears in `available`.
    ///
    /// List order is the only tie-break.
    pub fn best_matching(
        preferred: &[ChannelLayout],
        available: &[ChannelLayout],
    ) -> Option<ChannelLayout> {
        preferred
            .iter()
            .find(|candidate| available.contains(candidate))
            .copied()
    }

    /// Sorts layouts from most to fewest channels, keeping the relative
    /// order of equal counts.
    pub fn sort_by_channel_count(layouts: &mut [ChannelLayout]) {
        layouts.sort_by(|a, b| b.channel_count.cmp(&a.channel_count));
    }
}

impl PartialEq for ChannelLayout {
    fn eq(&self, other: &Self) -> bool {
        self.channels() == other.channels()
    }
}

impl Eq for ChannelLayout {}

impl fmt::Debug for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelLayout")
            .field("name", &self.name)
            .field("channels", &self.channels())
            .finish()
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name {
            return f.write_str(name);
        }
        for (i, channel) in self.channels().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(channel.name())?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct LayoutRepr {
    name: Option<String>,
    channels: Vec<ChannelId>,
}

impl From<ChannelLayout> for LayoutRepr {
    fn from(layout: ChannelLayout) -> Self {
        Self {
            name: layout.name.map(str::to_string),
            channels: layout.channels().to_vec(),
        }
    }
}

impl TryFrom<LayoutRepr> for ChannelLayout {
    type Error = StreamError;

    fn try_from(repr: LayoutRepr) -> Result<Self, Self::Error> {
        ChannelLayout::new(&repr.channels)
    }
}

// Hand-written: the `&'static str` name would otherwise tie `'de` to `'static`.
impl<'de> Deserialize<'de> for ChannelLayout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = LayoutRepr::deserialize(deserializer)?;
        ChannelLayout::try_from(repr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(channels: &[ChannelId]) -> ChannelLayout {
        ChannelLayout::new(channels).unwrap()
    }

    #[test]
    fn best_matching_follows_preference_order() {
        let a = ChannelLayout::builtin(BuiltinLayout::SevenPointOne);
        let b = ChannelLayout::builtin(BuiltinLayout::FivePointOne);
        let c = ChannelLayout::stereo();

        let found = ChannelLayout::best_matching(&[a, b, c], &[c, b]);
        assert_eq!(found, Some(b));
    }

    #[test]
    fn best_matching_without_overlap_is_none() {
        let preferred = [ChannelLayout::builtin(BuiltinLayout::Quad)];
        let available = [ChannelLayout::mono(), ChannelLayout::stereo()];
        assert_eq!(ChannelLayout::best_matching(&preferred, &available), None);
    }

    #[test]
    fn new_detects_builtin_names() {
        let stereo = layout(&[ChannelId::FrontLeft, ChannelId::FrontRight]);
        assert_eq!(stereo.name(), Some("Stereo"));

        let custom = layout(&[ChannelId::Aux0, ChannelId::Aux1]);
        assert_eq!(custom.name(), None);
        assert_eq!(custom.to_string(), "Aux 0, Aux 1");
    }

    #[test]
    fn equality_ignores_name() {
        let mut named = ChannelLayout::stereo();
        let unnamed = named;
        named.name = Some("something else");
        assert_eq!(named, unnamed);
    }

    #[test]
    fn rejects_empty_and_oversized_layouts() {
        assert!(ChannelLayout::new(&[]).is_err());
        let too_many = [ChannelId::Aux; MAX_CHANNELS + 1];
        assert!(matches!(
            ChannelLayout::new(&too_many),
            Err(StreamError::Invalid(_))
        ));
    }

    #[test]
    fn defaults_per_channel_count() {
        assert_eq!(
            ChannelLayout::default_for_channel_count(1),
            Some(ChannelLayout::mono())
        );
        assert_eq!(
            ChannelLayout::default_for_channel_count(6).map(|l| l.channel_count()),
            Some(6)
        );
        assert_eq!(ChannelLayout::default_for_channel_count(9), None);
    }

    #[test]
    fn builtins_have_consistent_counts() {
        for which in BuiltinLayout::ALL {
            let layout = ChannelLayout::builtin(which);
            assert_eq!(layout.channel_count(), which.channels().len());
            assert_eq!(layout.name(), Some(which.name()));
        }
    }

    #[test]
    fn find_channel_reports_index() {
        let surround = ChannelLayout::builtin(BuiltinLayout::FivePointOne);
        assert_eq!(surround.find_channel(ChannelId::Lfe), Some(3));
        assert_eq!(surround.find_channel(ChannelId::TopCenter), None);
    }

    #[test]
    fn sort_puts_widest_first() {
        let mut layouts = [
            ChannelLayout::mono(),
            ChannelLayout::builtin(BuiltinLayout::SevenPointOne),
            ChannelLayout::stereo(),
        ];
        ChannelLayout::sort_by_channel_count(&mut layouts);
        let counts: Vec<usize> = layouts.iter().map(|l| l.channel_count()).collect();
        assert_eq!(counts, vec![8, 2, 1]);
    }

    #[test]
    fn parse_channel_names_and_aliases() {
        assert_eq!(ChannelId::parse("Front Left"), Some(ChannelId::FrontLeft));
        assert_eq!(ChannelId::parse("front-left"), Some(ChannelId::FrontLeft));
        assert_eq!(ChannelId::parse("FR"), Some(ChannelId::FrontRight));
        assert_eq!(ChannelId::parse("lfe 2"), Some(ChannelId::Lfe2));
        assert_eq!(ChannelId::parse("aux 15"), Some(ChannelId::Aux15));
        assert_eq!(ChannelId::parse("nonsense"), None);
    }

    #[test]
    fn serde_round_trip_restores_builtin_name() {
        let json = serde_json::to_string(&ChannelLayout::builtin(BuiltinLayout::Quad)).unwrap();
        let back: ChannelLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), Some("Quad"));
        assert_eq!(back.channel_count(), 4);
    }
}
