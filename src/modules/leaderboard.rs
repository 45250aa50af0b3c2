use rand::Rng;
use serde::Serialize;

pub const COMPETITORS: &[&str] = &[
    "Alex Storm",
    "Jordan Blaze",
    "Casey Iron",
    "Riley Swift",
    "Morgan Peak",
];

const SCORE_RANGE: std::ops::Range<u32> = 2000..17000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    pub is_current_user: bool,
}

/// Rank decorative competitors against the user's step count. Re-randomized on every call.
pub fn generate_leaderboard(user: &str, steps: u32) -> Vec<LeaderboardEntry> {
    generate_leaderboard_with(&mut rand::thread_rng(), user, steps)
}

pub fn generate_leaderboard_with<R: Rng>(
    rng: &mut R,
    user: &str,
    steps: u32,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = COMPETITORS
        .iter()
        .map(|name| LeaderboardEntry {
            name: name.to_string(),
            score: rng.gen_range(SCORE_RANGE),
            is_current_user: false,
        })
        .collect();

    entries.push(LeaderboardEntry {
        name: user.to_string(),
        score: steps,
        is_current_user: true,
    });

    // Stable: equal scores keep competitor order, user last.
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}
