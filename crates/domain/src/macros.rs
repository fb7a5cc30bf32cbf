//! Macro for implementing Display and FromStr for wire-name enums
//!
//! Stream event kinds and done statuses travel as lowercase words on the
//! wire. This macro keeps the `Display` and `FromStr` spellings in one table
//! so they cannot drift apart. Parsing is case-insensitive.
//!
//! # Example
//!
//! ```rust
//! use relaygate_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Open,
//!     Closed,
//! }
//!
//! impl_domain_status_conversions!(Phase {
//!     Open => "open",
//!     Closed => "closed",
//! });
//!
//! assert_eq!(Phase::Open.to_string(), "open");
//! assert_eq!("CLOSED".parse::<Phase>(), Ok(Phase::Closed));
//! ```

/// Implements Display and FromStr for a fieldless enum
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of each variant to its lowercase wire name
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
