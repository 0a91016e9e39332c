//! Shapes of all supported double elimination brackets.
//!
//! Adding a new size only requires a new entry here. Every entry is validated on lookup, see
//! [`Structure::validate`].
use super::structures::Structure;

pub(super) static STRUCTURES: [Structure; 6] = [
    Structure {
        participants: 4,
        winners_rounds: &[2, 1],
        losers_rounds: &[1, 1],
        loser_feeds: &[1, 2],
        total_matches: 7,
    },
    Structure {
        participants: 8,
        winners_rounds: &[4, 2, 1],
        losers_rounds: &[2, 2, 1, 1],
        loser_feeds: &[1, 2, 4],
        total_matches: 15,
    },
    Structure {
        participants: 16,
        winners_rounds: &[8, 4, 2, 1],
        losers_rounds: &[4, 4, 2, 2, 1, 1],
        loser_feeds: &[1, 2, 4, 6],
        total_matches: 31,
    },
    Structure {
        participants: 32,
        winners_rounds: &[16, 8, 4, 2, 1],
        losers_rounds: &[8, 8, 4, 4, 2, 2, 1, 1],
        loser_feeds: &[1, 2, 4, 6, 8],
        total_matches: 63,
    },
    Structure {
        participants: 64,
        winners_rounds: &[32, 16, 8, 4, 2, 1],
        losers_rounds: &[16, 16, 8, 8, 4, 4, 2, 2, 1, 1],
        loser_feeds: &[1, 2, 4, 6, 8, 10],
        total_matches: 127,
    },
    Structure {
        participants: 128,
        winners_rounds: &[64, 32, 16, 8, 4, 2, 1],
        losers_rounds: &[32, 32, 16, 16, 8, 8, 4, 4, 2, 2, 1, 1],
        loser_feeds: &[1, 2, 4, 6, 8, 10, 12],
        total_matches: 255,
    },
];
