//! # Generate Options
//!
//! Every [`BracketKind`] accepts a number of optional settings, like including a match for the
//! third place in a single elimination bracket or the seeding strategy used to order the
//! participants.
//!
//! The settings are passed around as a key-value map ([`OptionValues`]) and checked against the
//! [`Options`] a bracket kind accepts. [`GenerateOptions::from_values`] turns a checked map into
//! typed settings.
//!
//! [`BracketKind`]: crate::BracketKind
#[cfg(feature = "serde")]
mod serde_impl;

use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashMap;

use thiserror::Error;

use crate::bracket::BracketKind;
use crate::math::MAX_PARTICIPANTS;
use crate::seeding::{RatingField, RatingOrder, SeedingStrategy};
use crate::ParticipantId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const SEEDING_STRATEGY: &str = "seeding_strategy";
pub const RATING_FIELD: &str = "rating_field";
pub const RATING_ORDER: &str = "rating_order";
pub const CUSTOM_ORDER: &str = "custom_order";
pub const THIRD_PLACE_MATCH: &str = "third_place_match";
pub const FULL_DOUBLE_ELIMINATION: &str = "full_double_elimination";
pub const MAX_PARTICIPANTS_KEY: &str = "max_participants";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unknown key {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: expected {expected}, found {found}")]
    InvalidValue {
        key: String,
        found: &'static str,
        expected: &'static str,
    },
    #[error("invalid choice for {key}: {value}")]
    InvalidChoice { key: String, value: String },
}

/// A description of all options a bracket kind accepts, including their human-readable names
/// and default values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Options(BTreeMap<String, OptionDescriptor>);

impl Options {
    /// Creates a new [`Builder`].
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns the option with the given `key`. Returns `None` if the given key does not exist.
    pub fn get(&self, key: &str) -> Option<&OptionDescriptor> {
        self.0.get(key)
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, OptionDescriptor> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, OptionDescriptor> {
        self.0.iter()
    }

    /// Parses the raw string `value` for `key` into the type of the default value of `key`.
    ///
    /// Booleans accept `true` and `false`, id lists are separated by commas.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if `key` does not exist or `value` cannot be parsed.
    pub fn parse(&self, key: &str, value: &str) -> Result<OptionValue, Error> {
        let descriptor = self
            .get(key)
            .ok_or_else(|| Error::UnknownKey(key.to_owned()))?;

        let invalid = || Error::InvalidValue {
            key: key.to_owned(),
            found: "string",
            expected: descriptor.value.value_type(),
        };

        match descriptor.value {
            OptionValue::Bool(_) => value.parse().map(OptionValue::Bool).map_err(|_| invalid()),
            OptionValue::U64(_) => value.parse().map(OptionValue::U64).map_err(|_| invalid()),
            OptionValue::String(_) => Ok(OptionValue::String(value.to_owned())),
            OptionValue::Ids(_) => value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| id.parse::<ParticipantId>())
                .collect::<Result<Vec<_>, _>>()
                .map(OptionValue::Ids)
                .map_err(|_| invalid()),
        }
    }
}

/// A list of key-value pairs without any names.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OptionValues(HashMap<String, OptionValue>);

impl OptionValues {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the [`OptionValue`] with the given `key`. Returns `None` if no value exist for the
    /// given `key`.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn take(&mut self, key: &str) -> Option<OptionValue> {
        self.0.remove(key)
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: ToString,
        V: Into<OptionValue>,
    {
        self.0.insert(key.to_string(), value.into());
    }

    /// Sets `key` to `value` if `key` has no value yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: ToString,
        V: Into<OptionValue>,
    {
        self.0.entry(key.to_string()).or_insert_with(|| value.into());
    }

    pub fn iter(&self) -> std::collections::hash_map::Iter<'_, String, OptionValue> {
        self.0.iter()
    }

    /// Checks all values against `options` and fills every missing key with its default value.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a key is not accepted by `options` or a value has a different
    /// type than the default value.
    pub fn merge(mut self, options: &Options) -> Result<Self, Error> {
        for (key, value) in self.0.iter() {
            let descriptor = options
                .get(key)
                .ok_or_else(|| Error::UnknownKey(key.to_owned()))?;

            if descriptor.value.value_type() != value.value_type() {
                return Err(Error::InvalidValue {
                    key: key.to_owned(),
                    found: value.value_type(),
                    expected: descriptor.value.value_type(),
                });
            }
        }

        for (key, descriptor) in options.iter() {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), descriptor.value.clone());
            }
        }

        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptionDescriptor {
    pub name: String,
    pub value: OptionValue,
}

/// The value of an option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    U64(u64),
    String(String),
    Ids(Vec<ParticipantId>),
}

impl OptionValue {
    /// Returns the name of the type of this value.
    pub fn value_type(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::U64(_) => "u64",
            Self::String(_) => "string",
            Self::Ids(_) => "ids",
        }
    }

    /// Returns the contained [`Bool`] value or the provided default.
    ///
    /// # Examples
    ///
    /// ```
    /// # use bracket_generator_core::options::OptionValue;
    /// let val = OptionValue::Bool(true);
    /// assert!(val.unwrap_bool_or(false));
    ///
    /// let val = OptionValue::U64(0);
    /// assert!(val.unwrap_bool_or(true));
    /// ```
    ///
    /// [`Bool`]: Self::Bool
    #[inline]
    pub fn unwrap_bool_or(self, default: bool) -> bool {
        match self {
            Self::Bool(val) => val,
            _ => default,
        }
    }

    /// Returns the contained [`U64`] value or the provided default.
    ///
    /// [`U64`]: Self::U64
    #[inline]
    pub fn unwrap_u64_or(self, default: u64) -> u64 {
        match self {
            Self::U64(val) => val,
            _ => default,
        }
    }

    /// Returns the contained [`String`] value or computes it from the provided closure.
    ///
    /// [`String`]: Self::String
    #[inline]
    pub fn unwrap_string_or_else<F>(self, f: F) -> String
    where
        F: FnOnce() -> String,
    {
        match self {
            Self::String(val) => val,
            _ => f(),
        }
    }

    /// Returns the contained [`Ids`] value or an empty list.
    ///
    /// [`Ids`]: Self::Ids
    #[inline]
    pub fn unwrap_ids_or_default(self) -> Vec<ParticipantId> {
        match self {
            Self::Ids(val) => val,
            _ => Vec::new(),
        }
    }
}

impl From<bool> for OptionValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for OptionValue {
    #[inline]
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl<'a> From<&'a str> for OptionValue {
    #[inline]
    fn from(value: &'a str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for OptionValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<ParticipantId>> for OptionValue {
    #[inline]
    fn from(value: Vec<ParticipantId>) -> Self {
        Self::Ids(value)
    }
}

/// A builder for [`Options`].
#[derive(Clone, Debug, Default)]
pub struct Builder {
    options: Options,
}

impl Builder {
    /// Inserts a new option. If the `key` already exists, it is overwritten.
    pub fn option<T, V>(mut self, key: &'static str, name: T, value: V) -> Self
    where
        T: ToString,
        V: Into<OptionValue>,
    {
        self.options.0.insert(
            key.to_owned(),
            OptionDescriptor {
                name: name.to_string(),
                value: value.into(),
            },
        );
        self
    }

    /// Consumes the `Builder`, returning the collected [`Options`].
    #[inline]
    pub fn build(self) -> Options {
        self.options
    }
}

/// The typed settings for a single generation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenerateOptions {
    pub strategy: SeedingStrategy,
    /// Only used by single elimination brackets.
    pub third_place_match: bool,
    /// Only used by double elimination brackets.
    pub full_double_elimination: bool,
    /// Generation fails if more participants are given.
    pub max_participants: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            strategy: SeedingStrategy::Random,
            third_place_match: false,
            full_double_elimination: true,
            max_participants: MAX_PARTICIPANTS,
        }
    }
}

impl GenerateOptions {
    /// Returns the [`Options`] accepted by brackets of `kind`.
    pub fn options(kind: BracketKind) -> Options {
        let builder = Options::builder()
            .option(SEEDING_STRATEGY, "Seeding Strategy", "random")
            .option(RATING_FIELD, "Rating Field", "primary")
            .option(RATING_ORDER, "Rating Order", "descending")
            .option(CUSTOM_ORDER, "Custom Order", Vec::<ParticipantId>::new())
            .option(
                MAX_PARTICIPANTS_KEY,
                "Maximum Participants",
                MAX_PARTICIPANTS as u64,
            );

        match kind {
            BracketKind::SingleElimination => builder
                .option(THIRD_PLACE_MATCH, "Match for 3rd place", false)
                .build(),
            BracketKind::DoubleElimination => builder
                .option(FULL_DOUBLE_ELIMINATION, "Grand Final Reset", true)
                .build(),
        }
    }

    /// Creates the `GenerateOptions` for `kind` from raw `values`. Missing keys take their
    /// default values.
    ///
    /// An unknown seeding strategy falls back to the random strategy.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if `values` contains a key not accepted by `kind`, a value of
    /// the wrong type or an unknown rating field or order.
    pub fn from_values(kind: BracketKind, values: OptionValues) -> Result<Self, Error> {
        let mut values = values.merge(&Self::options(kind))?;

        let field = values
            .take(RATING_FIELD)
            .map(|value| value.unwrap_string_or_else(String::new))
            .unwrap_or_default();
        let field = choice::<RatingField>(RATING_FIELD, &field)?;

        let order = values
            .take(RATING_ORDER)
            .map(|value| value.unwrap_string_or_else(String::new))
            .unwrap_or_default();
        let order = choice::<RatingOrder>(RATING_ORDER, &order)?;

        let custom_order = values
            .take(CUSTOM_ORDER)
            .map(OptionValue::unwrap_ids_or_default)
            .unwrap_or_default();

        let strategy = values
            .take(SEEDING_STRATEGY)
            .map(|value| value.unwrap_string_or_else(|| String::from("random")))
            .unwrap_or_else(|| String::from("random"));
        let strategy = SeedingStrategy::from_name(&strategy, field, order, custom_order);

        let third_place_match = values
            .take(THIRD_PLACE_MATCH)
            .map(|value| value.unwrap_bool_or(false))
            .unwrap_or(false);

        let full_double_elimination = values
            .take(FULL_DOUBLE_ELIMINATION)
            .map(|value| value.unwrap_bool_or(true))
            .unwrap_or(true);

        let max_participants = values
            .take(MAX_PARTICIPANTS_KEY)
            .map(|value| value.unwrap_u64_or(MAX_PARTICIPANTS as u64))
            .unwrap_or(MAX_PARTICIPANTS as u64);

        Ok(Self {
            strategy,
            third_place_match,
            full_double_elimination,
            max_participants: usize::try_from(max_participants).unwrap_or(usize::MAX),
        })
    }
}

fn choice<T>(key: &str, value: &str) -> Result<T, Error>
where
    T: std::str::FromStr,
{
    value.parse().map_err(|_| Error::InvalidChoice {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}
