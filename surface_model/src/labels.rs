use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{value} is not a known {kind} label")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! label_set {
    ($(#[$meta:meta])* $name:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const COUNT: usize = Self::ALL.len();

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Position of the label in the classifier head output.
            pub fn index(self) -> usize {
                self as usize
            }

            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| UnknownLabel {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

label_set!(
    /// Coarse substance category of a photographed surface.
    Material,
    "material",
    [Metal, Plastic, Glass, Painted, Wood, Other]
);

label_set!(
    /// Texture or treatment of a photographed surface.
    Finish,
    "finish",
    [Mirror, Rough, Hairline, Matte, Glossy, Pattern, Other]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_counts_match_heads() {
        assert_eq!(Material::COUNT, 6);
        assert_eq!(Finish::COUNT, 7);
    }

    #[test]
    fn test_index_order() {
        assert_eq!(Material::from_index(0), Some(Material::Metal));
        assert_eq!(Material::from_index(5), Some(Material::Other));
        assert_eq!(Material::from_index(6), None);
        assert_eq!(Finish::Glossy.index(), 4);
        assert_eq!(Finish::from_index(6), Some(Finish::Other));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("metal".parse::<Material>(), Ok(Material::Metal));
        assert_eq!(" HAIRLINE ".parse::<Finish>(), Ok(Finish::Hairline));

        let err = "Sandblast".parse::<Finish>().unwrap_err();
        assert_eq!(err.kind, "finish");
        assert_eq!(err.to_string(), "Sandblast is not a known finish label");
    }
}
