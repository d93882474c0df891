use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::render::surface::Rgba;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircularStyle {
    Bars,
    Dots,
    Lines,
    /// Bars for the lower 60% of the spectrum, dots for the rest
    Mixed,
}

/// The closed set of visualization styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Preset {
    Bar,
    Circular(CircularStyle),
    Spectrum,
    Waveform,
}

impl Default for Preset {
    fn default() -> Self {
        Preset::Circular(CircularStyle::Bars)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgba,
    pub primary: Rgba,
    pub secondary: Rgba,
    /// Beat colour for bar/circular, peak colour for spectrum, playhead for waveform
    pub accent: Rgba,
}

impl Preset {
    /// Cycle order.
    pub const ALL: [Preset; 7] = [
        Preset::Circular(CircularStyle::Bars),
        Preset::Circular(CircularStyle::Dots),
        Preset::Circular(CircularStyle::Lines),
        Preset::Circular(CircularStyle::Mixed),
        Preset::Bar,
        Preset::Spectrum,
        Preset::Waveform,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|&p| p == self).unwrap_or(0)
    }

    pub fn next(self) -> Preset {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Preset {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Human-readable name shown in overlays.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Circular(CircularStyle::Bars) => "Neon Bars",
            Preset::Circular(CircularStyle::Dots) => "Cosmic Dots",
            Preset::Circular(CircularStyle::Lines) => "Spectrum Lines",
            Preset::Circular(CircularStyle::Mixed) => "Mixed Visualization",
            Preset::Bar => "Frequency Bars",
            Preset::Spectrum => "Spectrum Analyzer",
            Preset::Waveform => "Waveform",
        }
    }

    /// Stable identifier used on the command line and in config files.
    pub fn id(self) -> &'static str {
        match self {
            Preset::Circular(CircularStyle::Bars) => "circular-bars",
            Preset::Circular(CircularStyle::Dots) => "circular-dots",
            Preset::Circular(CircularStyle::Lines) => "circular-lines",
            Preset::Circular(CircularStyle::Mixed) => "circular-mixed",
            Preset::Bar => "bar",
            Preset::Spectrum => "spectrum",
            Preset::Waveform => "waveform",
        }
    }

    pub fn palette(self) -> Palette {
        let dark = Rgba::hex(0x0a0a0a);
        let charcoal = Rgba::hex(0x1a1a1a);
        let neon = Palette {
            background: dark,
            primary: Rgba::hex(0x4f46e5),
            secondary: Rgba::hex(0x06b6d4),
            accent: Rgba::hex(0xf59e0b),
        };
        match self {
            Preset::Circular(CircularStyle::Bars) | Preset::Bar => neon,
            Preset::Circular(CircularStyle::Dots) => Palette {
                background: dark,
                primary: Rgba::hex(0xec4899),
                secondary: Rgba::hex(0x8b5cf6),
                accent: Rgba::hex(0x06b6d4),
            },
            Preset::Circular(CircularStyle::Lines) => Palette {
                background: dark,
                primary: Rgba::hex(0x10b981),
                secondary: Rgba::hex(0xf59e0b),
                accent: Rgba::hex(0xef4444),
            },
            Preset::Circular(CircularStyle::Mixed) => Palette {
                background: dark,
                primary: Rgba::hex(0x6366f1),
                secondary: Rgba::hex(0x14b8a6),
                accent: Rgba::hex(0xf97316),
            },
            Preset::Spectrum => Palette {
                background: charcoal,
                primary: Rgba::hex(0x4f46e5),
                secondary: Rgba::hex(0x60a5fa),
                accent: Rgba::hex(0x60a5fa),
            },
            Preset::Waveform => Palette {
                background: charcoal,
                primary: Rgba::hex(0x4f46e5),
                secondary: Rgba::hex(0x60a5fa),
                accent: Rgba::WHITE,
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let wanted = match wanted.as_str() {
            "circular" => "circular-bars",
            "bars" => "bar",
            other => other,
        };
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.id() == wanted || p.name().to_ascii_lowercase().replace(' ', "-") == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Preset::ALL.iter().map(|p| p.id()).collect();
                format!("unknown preset '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

impl TryFrom<String> for Preset {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Preset> for String {
    fn from(preset: Preset) -> Self {
        preset.id().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_returns_to_start() {
        for start in Preset::ALL {
            let mut p = start;
            for _ in 0..Preset::ALL.len() {
                p = p.next();
            }
            assert_eq!(p, start);
            assert_eq!(start.next().previous(), start);
        }
    }

    #[test]
    fn cycle_order_wraps() {
        assert_eq!(Preset::Waveform.next(), Preset::Circular(CircularStyle::Bars));
        assert_eq!(Preset::Circular(CircularStyle::Bars).previous(), Preset::Waveform);
        assert_eq!(Preset::Circular(CircularStyle::Mixed).next(), Preset::Bar);
    }

    #[test]
    fn parses_ids_and_names() {
        assert_eq!("circular-dots".parse::<Preset>(), Ok(Preset::Circular(CircularStyle::Dots)));
        assert_eq!("Neon Bars".parse::<Preset>(), Ok(Preset::Circular(CircularStyle::Bars)));
        assert_eq!("SPECTRUM".parse::<Preset>(), Ok(Preset::Spectrum));
        assert!("plasma".parse::<Preset>().is_err());
        for p in Preset::ALL {
            assert_eq!(p.to_string().parse::<Preset>(), Ok(p));
        }
    }

    #[test]
    fn deserializes_from_toml_string() {
        #[derive(Deserialize)]
        struct Doc {
            preset: Preset,
        }
        let doc: Doc = toml::from_str("preset = \"circular-lines\"").unwrap();
        assert_eq!(doc.preset, Preset::Circular(CircularStyle::Lines));
    }

    #[test]
    fn palettes_follow_named_presets() {
        let cosmic = Preset::Circular(CircularStyle::Dots).palette();
        assert_eq!(cosmic.primary, Rgba::hex(0xec4899));
        assert_eq!(Preset::Waveform.palette().background, Rgba::hex(0x1a1a1a));
    }
}
