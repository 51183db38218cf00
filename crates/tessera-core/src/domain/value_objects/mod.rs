//! Value objects shared by the DAOs.
//!
//! Enumerations are persisted as their upper-case text form; unknown text
//! read back from a row is reported as a datastore error.

/// Declares an enum persisted as TEXT.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Persisted text form.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::TesseraError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(crate::TesseraError::Datastore(format!(
                        "Unknown {} value: {other}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

mod access_type;
mod alias_type;
mod etag;
mod node_type;
mod object_type;

pub use access_type::*;
pub use alias_type::*;
pub use etag::*;
pub use node_type::*;
pub use object_type::*;
