use std::{fmt, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// File extensions offered by the input picker. This is a selection hint only;
/// the service decides what it can actually decode.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

pub fn has_accepted_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

/// One locally selected audio source. Identity is its position in the
/// owning set, so two items may share a name.
#[derive(Clone, PartialEq, Eq)]
pub struct InputItem {
    pub name: String,
    pub payload: Arc<[u8]>,
}

impl InputItem {
    pub fn new(name: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Debug for InputItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputItem")
            .field("name", &self.name)
            .field("size_bytes", &self.payload.len())
            .finish()
    }
}

macro_rules! bounded_control {
    ($name:ident, $label:literal, $min:expr, $max:expr, $default:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i32", into = "i32")]
        pub struct $name(i32);

        impl $name {
            pub const MIN: i32 = $min;
            pub const MAX: i32 = $max;
            pub const DEFAULT: i32 = $default;

            /// Strict constructor for programmatic callers.
            pub fn new(value: i32) -> Result<Self, ParameterError> {
                if (Self::MIN..=Self::MAX).contains(&value) {
                    Ok(Self(value))
                } else {
                    Err(ParameterError::OutOfRange {
                        control: $label,
                        value,
                        min: Self::MIN,
                        max: Self::MAX,
                    })
                }
            }

            /// Slider constructor: pins the value to the nearest bound.
            pub fn clamped(value: i32) -> Self {
                Self(value.clamp(Self::MIN, Self::MAX))
            }

            pub fn get(self) -> i32 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(Self::DEFAULT)
            }
        }

        impl TryFrom<i32> for $name {
            type Error = ParameterError;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

bounded_control!(Tempo, "tempo", 60, 180, 100);
bounded_control!(PitchShift, "pitch shift", -12, 12, 0);
bounded_control!(EffectMix, "effect mix", 0, 100, 0);

/// The three remix controls. Setters clamp because they back bounded
/// sliders; `try_new` rejects for callers that bypass the controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemixParameters {
    pub tempo: Tempo,
    pub pitch_shift: PitchShift,
    pub effect_mix: EffectMix,
}

impl RemixParameters {
    pub fn try_new(tempo: i32, pitch_shift: i32, effect_mix: i32) -> Result<Self, ParameterError> {
        Ok(Self {
            tempo: Tempo::new(tempo)?,
            pitch_shift: PitchShift::new(pitch_shift)?,
            effect_mix: EffectMix::new(effect_mix)?,
        })
    }

    pub fn set_tempo(&mut self, value: i32) -> i32 {
        self.tempo = Tempo::clamped(value);
        self.tempo.get()
    }

    pub fn set_pitch_shift(&mut self, value: i32) -> i32 {
        self.pitch_shift = PitchShift::clamped(value);
        self.pitch_shift.get()
    }

    pub fn set_effect_mix(&mut self, value: i32) -> i32 {
        self.effect_mix = EffectMix::clamped(value);
        self.effect_mix.get()
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
