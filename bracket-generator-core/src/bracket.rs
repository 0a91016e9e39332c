//! # Bracket
//!
//! [`generate`] is the single entry point of this crate: it validates and seeds the
//! participants, then hands them to the engine selected by [`BracketKind`].
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use rand::Rng;

use crate::options::{GenerateOptions, Options};
use crate::seeding::{self, Seed, SeedingStrategy};
use crate::{
    DoubleElimination, Error, MatchGraph, Participant, ParticipantId, Result, SingleElimination,
    TournamentId,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BracketKind {
    SingleElimination,
    DoubleElimination,
}

impl BracketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleElimination => "single_elimination",
            Self::DoubleElimination => "double_elimination",
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::SingleElimination => 0,
            Self::DoubleElimination => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SingleElimination),
            1 => Some(Self::DoubleElimination),
            _ => None,
        }
    }

    /// Returns the [`Options`] accepted by this kind.
    #[inline]
    pub fn options(self) -> Options {
        GenerateOptions::options(self)
    }
}

impl Display for BracketKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BracketKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single_elimination" => Ok(Self::SingleElimination),
            "double_elimination" => Ok(Self::DoubleElimination),
            s => Err(Error::UnknownBracketKind(s.to_owned())),
        }
    }
}

/// Numbers describing a generated bracket.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BracketStats {
    pub kind: BracketKind,
    pub participants: usize,
    /// The power of two the bracket is built around.
    pub bracket_size: usize,
    /// Single elimination: participants advancing into the first main round without a
    /// preliminary match. Double elimination: empty slots in the first round.
    pub byes: usize,
    /// The number of rounds. A grand final and its reset count as one round each.
    pub rounds: usize,
    pub total_matches: usize,
    pub preliminary_matches: usize,
    pub winners_matches: usize,
    pub losers_matches: usize,
    pub grand_final_matches: usize,
    pub third_place_match: bool,
}

/// How the participants were ordered.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeedingInfo {
    pub strategy: SeedingStrategy,
    /// The participant ids by seed position, starting with the first seed.
    pub order: Vec<ParticipantId>,
}

impl SeedingInfo {
    fn new(strategy: SeedingStrategy, seeds: &[Seed]) -> Self {
        Self {
            strategy,
            order: seeds.iter().map(|seed| seed.participant.id).collect(),
        }
    }
}

/// A generated and validated bracket.
#[derive(Clone, Debug)]
pub struct Bracket {
    pub kind: BracketKind,
    pub matches: MatchGraph,
    pub stats: BracketStats,
    pub seeding: SeedingInfo,
}

/// Generates the bracket of `kind` for `participants`.
///
/// Nothing is returned unless the whole match graph was built and passed validation.
///
/// # Errors
///
/// Returns an [`enum@Error`] if the participants or options are invalid (see
/// [`Error::is_invalid_input`]) or the built graph is inconsistent.
pub fn generate<R>(
    tournament_id: TournamentId,
    kind: BracketKind,
    participants: &[Participant],
    options: &GenerateOptions,
    rng: &mut R,
) -> Result<Bracket>
where
    R: Rng + ?Sized,
{
    seeding::validate(participants)?;

    let count = participants.len();

    log::debug!(
        "Generating {} bracket for tournament {} with {} participants",
        kind,
        tournament_id,
        count
    );

    let (matches, stats, seeds) = match kind {
        BracketKind::SingleElimination => {
            let bracket = SingleElimination::new(count, options.third_place_match)?;
            check_max(count, options)?;

            let seeds = seeding::seed(participants, &options.strategy, count, rng)?;
            let matches = bracket.build(tournament_id, &seeds)?;

            (matches, bracket.stats(), seeds)
        }
        BracketKind::DoubleElimination => {
            let bracket = DoubleElimination::new(count, options.full_double_elimination)?;
            check_max(count, options)?;

            let seeds = seeding::seed(participants, &options.strategy, count, rng)?;
            let matches = bracket.build(tournament_id, &seeds)?;

            (matches, bracket.stats(), seeds)
        }
    };

    Ok(Bracket {
        kind,
        matches,
        stats,
        seeding: SeedingInfo::new(options.strategy.clone(), &seeds),
    })
}

fn check_max(count: usize, options: &GenerateOptions) -> Result<()> {
    if count > options.max_participants {
        return Err(Error::InvalidParticipantCount {
            count,
            min: 2,
            max: options.max_participants,
        });
    }

    Ok(())
}
