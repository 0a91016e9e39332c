//! # Seeding
//!
//! Orders (and for mix events, groups) participants before they are placed into a bracket.
//! None of the functions in this module mutate their input.
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::utils::NumExt;
use crate::{Error, Participant, ParticipantId, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which of the two ratings of a [`Participant`] is used.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RatingField {
    #[default]
    Primary,
    Secondary,
}

impl FromStr for RatingField {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "primary" | "rating" => Ok(Self::Primary),
            "secondary" | "secondary_rating" => Ok(Self::Secondary),
            _ => Err(()),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RatingOrder {
    #[default]
    Descending,
    Ascending,
}

impl FromStr for RatingOrder {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "descending" | "desc" => Ok(Self::Descending),
            "ascending" | "asc" => Ok(Self::Ascending),
            _ => Err(()),
        }
    }
}

/// The algorithm used to order the participants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "strategy"))]
pub enum SeedingStrategy {
    /// A uniform shuffle.
    #[default]
    Random,
    /// A stable sort by a rating. Ties keep their original order.
    Ranking {
        field: RatingField,
        order: RatingOrder,
    },
    /// A snake draft over rating groups, spreading strong participants across the bracket.
    Balanced { field: RatingField },
    /// An explicit order of participant ids. Participants not mentioned follow in their
    /// original order.
    Manual { order: Vec<ParticipantId> },
}

impl SeedingStrategy {
    /// Creates a `SeedingStrategy` from its name. Unknown names fall back to
    /// [`SeedingStrategy::Random`].
    pub fn from_name(
        name: &str,
        field: RatingField,
        order: RatingOrder,
        custom_order: Vec<ParticipantId>,
    ) -> Self {
        match name {
            "random" => Self::Random,
            "ranking" => Self::Ranking { field, order },
            "balanced" => Self::Balanced { field },
            "manual" => Self::Manual {
                order: custom_order,
            },
            name => {
                log::warn!("Unknown seeding strategy {:?}, falling back to random", name);
                Self::Random
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Ranking { .. } => "ranking",
            Self::Balanced { .. } => "balanced",
            Self::Manual { .. } => "manual",
        }
    }
}

impl Display for SeedingStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A participant together with its 1-based seed position.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Seed {
    pub position: usize,
    pub participant: Participant,
}

/// Checks that `participants` are usable for seeding.
///
/// # Errors
///
/// Returns an error if there are less than 2 participants, a participant has no name or an id
/// is given more than once.
pub fn validate(participants: &[Participant]) -> Result<()> {
    if participants.len() < 2 {
        return Err(Error::InvalidParticipantCount {
            count: participants.len(),
            min: 2,
            max: usize::MAX,
        });
    }

    let mut ids = HashSet::with_capacity(participants.len());
    for (index, participant) in participants.iter().enumerate() {
        if participant.name.trim().is_empty() {
            return Err(Error::InvalidParticipant {
                index,
                reason: "missing name",
            });
        }

        if !ids.insert(participant.id) {
            return Err(Error::DuplicateParticipant(participant.id));
        }
    }

    Ok(())
}

/// Orders `participants` using `strategy`. The result has exactly
/// `min(participants.len(), max)` entries.
///
/// # Errors
///
/// Returns an error if `participants` are invalid (see [`validate`]) or fewer than 2
/// participants would be seeded.
pub fn seed<R>(
    participants: &[Participant],
    strategy: &SeedingStrategy,
    max: usize,
    rng: &mut R,
) -> Result<Vec<Seed>>
where
    R: Rng + ?Sized,
{
    validate(participants)?;

    if max < 2 {
        return Err(Error::InvalidParticipantCount {
            count: max,
            min: 2,
            max: usize::MAX,
        });
    }

    let len = participants.len().min(max);

    log::debug!(
        "Seeding {} of {} participants using {}",
        len,
        participants.len(),
        strategy
    );

    let ordered = match strategy {
        SeedingStrategy::Random => {
            let mut list = participants[..len].to_vec();
            list.shuffle(rng);
            list
        }
        SeedingStrategy::Ranking { field, order } => {
            let mut list = participants[..len].to_vec();
            sort_by_rating(&mut list, *field, *order);
            list
        }
        SeedingStrategy::Balanced { field } => balanced(&participants[..len], *field),
        SeedingStrategy::Manual { order } => {
            let mut list = manual(participants, order);
            list.truncate(len);
            list
        }
    };

    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(index, participant)| Seed {
            position: index + 1,
            participant,
        })
        .collect())
}

/// Stable sort by `field`. Participants without a rating always sort last.
fn sort_by_rating(list: &mut [Participant], field: RatingField, order: RatingOrder) {
    list.sort_by(|a, b| match (a.rating(field), b.rating(field)) {
        (Some(a), Some(b)) => match order {
            RatingOrder::Descending => b.total_cmp(&a),
            RatingOrder::Ascending => a.total_cmp(&b),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Sorts by rating and splits the list into `ceil(log2(n))` groups, then takes one participant
/// of every group at a time, reversing the group order on every pass.
fn balanced(participants: &[Participant], field: RatingField) -> Vec<Participant> {
    let mut sorted = participants.to_vec();
    sort_by_rating(&mut sorted, field, RatingOrder::Descending);

    // The first `n % g` groups take one extra participant so that exactly `g` groups exist.
    let num_groups = sorted.len().ilog2_ceil().max(1);
    let base = sorted.len() / num_groups;
    let extra = sorted.len() % num_groups;

    let mut groups: Vec<&[Participant]> = Vec::with_capacity(num_groups);
    let mut rest = sorted.as_slice();
    for group in 0..num_groups {
        let (head, tail) = rest.split_at(base + usize::from(group < extra));
        groups.push(head);
        rest = tail;
    }

    let passes = base + usize::from(extra > 0);

    let mut list = Vec::with_capacity(sorted.len());
    for pass in 0..passes {
        let order: Box<dyn Iterator<Item = &&[Participant]>> = if pass % 2 == 0 {
            Box::new(groups.iter())
        } else {
            Box::new(groups.iter().rev())
        };

        for group in order {
            if let Some(participant) = group.get(pass) {
                list.push(participant.clone());
            }
        }
    }

    list
}

fn manual(participants: &[Participant], order: &[ParticipantId]) -> Vec<Participant> {
    let mut taken = vec![false; participants.len()];
    let mut list = Vec::with_capacity(participants.len());

    for id in order {
        match participants.iter().position(|p| p.id == *id) {
            Some(index) if !taken[index] => {
                taken[index] = true;
                list.push(participants[index].clone());
            }
            Some(_) => log::debug!("Ignoring repeated participant {} in manual order", id),
            None => log::debug!("Ignoring unknown participant {} in manual order", id),
        }
    }

    for (participant, taken) in participants.iter().zip(taken) {
        if !taken {
            list.push(participant.clone());
        }
    }

    list
}

/// A team formed from solo participants.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Team {
    /// The 0-based index of the team.
    pub index: usize,
    pub members: Vec<Participant>,
}

impl Team {
    /// Returns the sum of all member ratings. Members without a rating count as `0`.
    pub fn rating(&self, field: RatingField) -> f64 {
        self.members
            .iter()
            .filter_map(|member| member.rating(field))
            .sum()
    }
}

/// The result of [`form_teams`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TeamFormation {
    pub teams: Vec<Team>,
    /// The participants that did not fit into any team, in their original order.
    pub excluded: Vec<Participant>,
}

/// Forms `team_count` teams of `team_size` members from solo `players`.
///
/// The members are selected with `strategy` and then distributed in a serpentine order by
/// rating so that the aggregate ratings of all teams end up close to each other.
///
/// # Errors
///
/// Returns an error if `players` are invalid, `team_size` is 0, `team_count` is less than 2 or
/// there are not enough players to fill every team.
pub fn form_teams<R>(
    players: &[Participant],
    team_size: usize,
    team_count: usize,
    strategy: &SeedingStrategy,
    field: RatingField,
    rng: &mut R,
) -> Result<TeamFormation>
where
    R: Rng + ?Sized,
{
    if team_size == 0 {
        return Err(Error::InvalidTeams("team size must be at least 1"));
    }

    if team_count < 2 {
        return Err(Error::InvalidTeams("at least 2 teams are required"));
    }

    let needed = team_size * team_count;
    if players.len() < needed {
        return Err(Error::InvalidTeams("not enough players to fill every team"));
    }

    let selected = seed(players, strategy, needed, rng)?;

    let selected_ids: HashSet<ParticipantId> =
        selected.iter().map(|seed| seed.participant.id).collect();
    let excluded = players
        .iter()
        .filter(|player| !selected_ids.contains(&player.id))
        .cloned()
        .collect();

    let mut members: Vec<Participant> = selected.into_iter().map(|seed| seed.participant).collect();
    sort_by_rating(&mut members, field, RatingOrder::Descending);

    let mut teams: Vec<Team> = (0..team_count)
        .map(|index| Team {
            index,
            members: Vec::with_capacity(team_size),
        })
        .collect();

    for (index, member) in members.into_iter().enumerate() {
        let pass = index / team_count;
        let position = index % team_count;

        let team = if pass % 2 == 0 {
            position
        } else {
            team_count - 1 - position
        };

        teams[team].members.push(member);
    }

    log::debug!(
        "Formed {} teams of {} members using {}",
        team_count,
        team_size,
        strategy
    );

    Ok(TeamFormation { teams, excluded })
}
