//! # bracket-generator-core
//!
//! This crate contains everything required to build the match graph of an elimination bracket
//! before any match is played. It currently contains two builtin bracket kinds:
//! [`SingleElimination`] and [`DoubleElimination`].
//!
//! Important types:
//! - [`Participant`]: An entrant with an id, a name and optional ratings.
//! - [`BracketShape`]: The numeric shape of a single elimination bracket.
//! - [`MatchGraph`]: An arena of [`MatchNode`]s referenced by index. Every generated bracket is
//! built and validated as a `MatchGraph` before anything leaves this crate.
//! - [`EntrantSpot`]: A *spot* within a match, which can contain a participant, be permanently
//! empty (a bye) or wait for the result of another match.
//! - [`BracketKind`]: Selects the engine used by [`generate`].
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to almost all types.
//!
pub mod bracket;
pub mod double_elimination;
pub mod graph;
pub mod id;
pub mod math;
pub mod options;
pub mod seeding;
pub mod single_elimination;
mod utils;

pub use bracket::{generate, Bracket, BracketKind, BracketStats, SeedingInfo};
pub use double_elimination::DoubleElimination;
pub use graph::{BracketSection, Link, MatchGraph, MatchNode, MatchStatus, RoundMarker};
pub use id::{MatchId, ParticipantId, TournamentId};
pub use math::BracketShape;
pub use options::GenerateOptions;
pub use single_elimination::SingleElimination;

use double_elimination::structures::StructureError;
use graph::Inconsistency;
use seeding::RatingField;

use thiserror::Error;

use std::result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A participant of a tournament. This can be a single player or a team.
///
/// Participants are always supplied by the caller. The generators in this crate only reorder
/// and group them.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rating: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub secondary_rating: Option<f64>,
}

impl Participant {
    /// Creates a new `Participant` without any ratings.
    #[inline]
    pub fn new<N>(id: u64, name: N) -> Self
    where
        N: Into<String>,
    {
        Self {
            id: ParticipantId(id),
            name: name.into(),
            rating: None,
            secondary_rating: None,
        }
    }

    #[inline]
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    #[inline]
    pub fn with_secondary_rating(mut self, rating: f64) -> Self {
        self.secondary_rating = Some(rating);
        self
    }

    /// Returns the rating stored in `field`.
    #[inline]
    pub fn rating(&self, field: RatingField) -> Option<f64> {
        match field {
            RatingField::Primary => self.rating,
            RatingField::Secondary => self.secondary_rating,
        }
    }
}

/// A spot for a participant in a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntrantSpot<T> {
    /// The spot is taken by a participant.
    Entrant(T),
    /// The spot is permanently empty. The opponent advances without playing (a bye).
    Empty,
    /// The spot waits for the winner or loser of another match.
    #[cfg_attr(feature = "serde", serde(rename = "tbd"))]
    TBD,
}

impl<T> EntrantSpot<T> {
    /// Creates a new `EntrantSpot` from an [`Option`]. A `Some(T)` value will translate into
    /// a `Entrant(T)` value, a `None` value will translate into a `Empty` value.
    pub fn new(entrant: Option<T>) -> Self {
        match entrant {
            Some(entrant) => Self::Entrant(entrant),
            None => Self::Empty,
        }
    }

    /// Returns `true` if the `EntrantSpot` is [`Entrant`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use bracket_generator_core::EntrantSpot;
    /// let spot = EntrantSpot::Entrant(());
    /// assert!(spot.is_entrant());
    /// ```
    /// [`Entrant`]: Self::Entrant
    pub fn is_entrant(&self) -> bool {
        matches!(self, Self::Entrant(_))
    }

    /// Returns `true` if the `EntrantSpot` is [`Empty`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use bracket_generator_core::EntrantSpot;
    /// let spot: EntrantSpot<()> = EntrantSpot::Empty;
    /// assert!(spot.is_empty());
    /// ```
    ///
    /// [`Empty`]: Self::Empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` if the `EntrantSpot` is [`TBD`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use bracket_generator_core::EntrantSpot;
    /// let spot: EntrantSpot<()> = EntrantSpot::TBD;
    /// assert!(spot.is_tbd());
    /// ```
    ///
    /// [`TBD`]: Self::TBD
    pub fn is_tbd(&self) -> bool {
        matches!(self, Self::TBD)
    }

    /// Returns the contained entrant, if any.
    pub fn entrant(&self) -> Option<&T> {
        match self {
            Self::Entrant(entrant) => Some(entrant),
            _ => None,
        }
    }

    /// Converts an `&EntrantSpot<T>` into an `EntrantSpot<&T>`.
    pub fn as_ref(&self) -> EntrantSpot<&T> {
        match *self {
            Self::Entrant(ref entrant) => EntrantSpot::Entrant(entrant),
            Self::Empty => EntrantSpot::Empty,
            Self::TBD => EntrantSpot::TBD,
        }
    }

    /// Maps `EntrantSpot<T>` to `EntrantSpot<U>` by applying `f` on it.
    pub fn map<U, F>(self, f: F) -> EntrantSpot<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Entrant(entrant) => EntrantSpot::Entrant(f(entrant)),
            Self::Empty => EntrantSpot::Empty,
            Self::TBD => EntrantSpot::TBD,
        }
    }
}

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid number of participants: {count} is not within {min}..={max}")]
    InvalidParticipantCount { count: usize, min: usize, max: usize },
    #[error("invalid participant at {index}: {reason}")]
    InvalidParticipant { index: usize, reason: &'static str },
    #[error("participant {0} is given more than once")]
    DuplicateParticipant(ParticipantId),
    #[error("unsupported double elimination size: {participants} participants require a bracket of {size}")]
    UnsupportedSize { participants: usize, size: usize },
    #[error("invalid team formation: {0}")]
    InvalidTeams(&'static str),
    #[error("unknown bracket kind: {0}")]
    UnknownBracketKind(String),
    #[error("invalid option: {0}")]
    Options(#[from] options::Error),
    #[error("invalid double elimination table: {0}")]
    Table(#[from] StructureError),
    #[error("inconsistent bracket: {0}")]
    Inconsistent(#[from] Inconsistency),
}

impl Error {
    /// Returns `true` if the error was caused by the input, before any match was created.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, Self::Table(_) | Self::Inconsistent(_))
    }
}
