use std::fmt::Display;
use std::str::FromStr;

use semver::Version;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub mod add;
pub mod check;
pub mod config;
pub mod context;
pub mod delete;
pub mod error;
pub mod lock;
pub mod response;
#[cfg(test)]
pub(crate) mod testutil;
pub mod types;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// CNI spec version results are emitted under.
pub const CNI_VERSION: Version = Version::new(1, 0, 0);

pub const SUPPORTED_CNI_VERSIONS: [Version; 4] = [
    Version::new(0, 3, 0),
    Version::new(0, 3, 1),
    Version::new(0, 4, 0),
    Version::new(1, 0, 0),
];

/// Advisory lock serializing CNI invocations per host.
pub const LOCK_PATH: &str = "/var/run/gcp-ipam.lock";

pub fn serialize_to_string<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(D::Error::custom)
}

pub fn serialize_to_string_slice<T, S>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_seq(values.iter().map(|v| v.to_string()))
}

pub fn deserialize_from_str_vec<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let values = Vec::<String>::deserialize(deserializer)?;
    values
        .iter()
        .map(|v| v.parse().map_err(D::Error::custom))
        .collect()
}
