use serde::Deserialize;

/// Aspect family of the console framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum AspectMode {
    #[serde(rename = "16:9")]
    #[default]
    Wide,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "any")]
    Any,
}

/// Resolution preset. The concrete pixel size depends on the aspect mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Low,
    Medium,
    High,
    Ultra,
}

impl Preset {
    /// Console framebuffer size for this preset under the given aspect.
    ///
    /// `AspectMode::Any` sizes as 16:9; the cartridge declared it does not
    /// care, and 16:9 is the runtime default.
    pub fn console_size(self, aspect: AspectMode) -> (u32, u32) {
        match aspect {
            AspectMode::Wide | AspectMode::Any => match self {
                Self::Low => (480, 270),
                Self::Medium => (960, 540),
                Self::High => (1920, 1080),
                Self::Ultra => (3840, 2160),
            },
            AspectMode::Classic => match self {
                Self::Low => (400, 300),
                Self::Medium => (800, 600),
                Self::High => (1600, 1200),
                Self::Ultra => (3200, 2400),
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

impl AspectMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wide => "16:9",
            Self::Classic => "4:3",
            Self::Any => "any",
        }
    }
}

/// Policy mapping the console framebuffer onto the backbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    #[default]
    Fit,
    IntegerNearest,
    Fill,
    Stretch,
}

impl ScalingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::IntegerNearest => "integer_nearest",
            Self::Fill => "fill",
            Self::Stretch => "stretch",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fit" => Some(Self::Fit),
            "integer_nearest" => Some(Self::IntegerNearest),
            "fill" => Some(Self::Fill),
            "stretch" => Some(Self::Stretch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_sizes_match_the_aspect_tables() {
        assert_eq!(Preset::Low.console_size(AspectMode::Wide), (480, 270));
        assert_eq!(Preset::Ultra.console_size(AspectMode::Wide), (3840, 2160));
        assert_eq!(Preset::Low.console_size(AspectMode::Classic), (400, 300));
        assert_eq!(Preset::Ultra.console_size(AspectMode::Classic), (3200, 2400));
        assert_eq!(Preset::Medium.console_size(AspectMode::Any), (960, 540));
    }
}
