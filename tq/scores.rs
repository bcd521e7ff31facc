use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub score: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Score,
}

impl SortBy {
    pub fn toggled(self) -> Self {
        match self {
            SortBy::Name => SortBy::Score,
            SortBy::Score => SortBy::Name,
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortBy::Name => "name",
            SortBy::Score => "score",
        })
    }
}

/// Base letters only: decomposed, stripped of combining marks, lowercased.
fn primary_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Orders names the way a browser `localeCompare` does by default: base
/// letters first, then accents, then lowercase before uppercase.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| b.cmp(a))
}

fn compare_players(a: &Player, b: &Player, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Name => compare_names(&a.name, &b.name).then_with(|| b.score.cmp(&a.score)),
        SortBy::Score => b
            .score
            .cmp(&a.score)
            .then_with(|| compare_names(&a.name, &b.name)),
    }
}

/// Players in insertion order; sorting only ever produces a view.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Scoreboard {
    players: Vec<Player>,
}

impl Scoreboard {
    pub fn new(players: Vec<Player>) -> Self {
        Self { players }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Adds a player at score 0. Blank names are ignored.
    pub fn add(&mut self, name: &str) -> Option<&Player> {
        self.add_at(name, now_millis())
    }

    fn add_at(&mut self, name: &str, millis: u128) -> Option<&Player> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let id = self.fresh_id(millis);
        self.players.push(Player {
            id,
            name: name.to_string(),
            score: 0,
        });
        self.players.last()
    }

    fn fresh_id(&self, mut millis: u128) -> String {
        loop {
            let candidate = millis.to_string();
            if !self.players.iter().any(|player| player.id == candidate) {
                return candidate;
            }
            millis += 1;
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Player> {
        let index = self.players.iter().position(|player| player.id == id)?;
        Some(self.players.remove(index))
    }

    /// Applies `delta` to a score, clamping at zero. Returns the new score.
    pub fn adjust(&mut self, id: &str, delta: i32) -> Option<u32> {
        let player = self.players.iter_mut().find(|player| player.id == id)?;
        player.score = player.score.saturating_add_signed(delta);
        Some(player.score)
    }

    pub fn increment(&mut self, id: &str) -> Option<u32> {
        self.adjust(id, 1)
    }

    pub fn decrement(&mut self, id: &str) -> Option<u32> {
        self.adjust(id, -1)
    }

    pub fn reset_scores(&mut self) {
        for player in &mut self.players {
            player.score = 0;
        }
    }

    pub fn reset_all(&mut self) {
        self.players.clear();
    }

    pub fn sorted(&self, sort_by: SortBy) -> Vec<&Player> {
        let mut view: Vec<&Player> = self.players.iter().collect();
        view.sort_by(|a, b| compare_players(a, b, sort_by));
        view
    }

    /// Resolves a reference typed on the command line: an id, an exact name
    /// (case-insensitive) or a 1-based row of the sorted listing.
    pub fn find(&self, query: &str, sort_by: SortBy) -> Option<&Player> {
        let query = query.trim();
        if let Some(player) = self.players.iter().find(|player| player.id == query) {
            return Some(player);
        }
        if let Some(player) = self
            .players
            .iter()
            .find(|player| player.name.to_lowercase() == query.to_lowercase())
        {
            return Some(player);
        }
        let row: usize = query.parse().ok()?;
        self.sorted(sort_by).get(row.checked_sub(1)?).copied()
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(entries: &[(&str, u32)]) -> Scoreboard {
        let mut board = Scoreboard::default();
        for (i, (name, score)) in entries.iter().enumerate() {
            let id = board.add_at(name, 1_000 + i as u128).unwrap().id.clone();
            board.adjust(&id, i32::try_from(*score).unwrap());
        }
        board
    }

    fn names(view: &[&Player]) -> Vec<String> {
        view.iter().map(|player| player.name.clone()).collect()
    }

    #[test]
    fn blank_names_are_ignored() {
        let mut board = Scoreboard::default();
        assert!(board.add("").is_none());
        assert!(board.add("   \t ").is_none());
        assert!(board.is_empty());
    }

    #[test]
    fn names_are_trimmed_and_start_at_zero() {
        let mut board = Scoreboard::default();
        let player = board.add("  Ada  ").unwrap().clone();
        assert_eq!(player.name, "Ada");
        assert_eq!(player.score, 0);
        assert!(!player.id.is_empty());
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let mut board = Scoreboard::default();
        let first = board.add_at("a", 42).unwrap().id.clone();
        let second = board.add_at("b", 42).unwrap().id.clone();
        let third = board.add_at("c", 42).unwrap().id.clone();
        assert_eq!(first, "42");
        assert_eq!(second, "43");
        assert_eq!(third, "44");
    }

    #[test]
    fn decrement_clamps_at_zero() {
        let mut board = board(&[("Ada", 1)]);
        let id = board.players()[0].id.clone();
        assert_eq!(board.decrement(&id), Some(0));
        assert_eq!(board.decrement(&id), Some(0));
        assert_eq!(board.adjust(&id, -10), Some(0));
        assert_eq!(board.increment(&id), Some(1));
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut board = board(&[("Ada", 2)]);
        assert_eq!(board.adjust("nope", 1), None);
        assert!(board.remove("nope").is_none());
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn remove_drops_only_that_player() {
        let mut board = board(&[("Ada", 1), ("Grace", 2)]);
        let id = board.players()[0].id.clone();
        assert_eq!(board.remove(&id).unwrap().name, "Ada");
        assert_eq!(board.len(), 1);
        assert_eq!(board.players()[0].name, "Grace");
    }

    #[test]
    fn sort_by_name_breaks_ties_by_score() {
        let board = board(&[("bob", 1), ("Alice", 2), ("alice", 5), ("Carol", 0)]);
        let view = board.sorted(SortBy::Name);
        assert_eq!(names(&view), ["alice", "Alice", "bob", "Carol"]);

        let board = self::board(&[("Sam", 1), ("Sam", 4)]);
        let scores: Vec<u32> = board.sorted(SortBy::Name).iter().map(|p| p.score).collect();
        assert_eq!(scores, [4, 1]);
    }

    #[test]
    fn accented_names_sort_with_their_base_letter() {
        let board = board(&[("Zoe", 0), ("Émile", 0), ("Adam", 0)]);
        assert_eq!(names(&board.sorted(SortBy::Name)), ["Adam", "Émile", "Zoe"]);

        let board = self::board(&[("Émile", 0), ("emile", 0), ("Emma", 0)]);
        assert_eq!(names(&board.sorted(SortBy::Name)), ["emile", "Émile", "Emma"]);

        let board = self::board(&[("Zoë", 2), ("Åsa", 2), ("Bo", 2)]);
        assert_eq!(names(&board.sorted(SortBy::Score)), ["Åsa", "Bo", "Zoë"]);
    }

    #[test]
    fn sort_by_score_breaks_ties_by_name() {
        let board = board(&[("dave", 3), ("Bea", 7), ("carl", 3), ("Al", 0)]);
        let view = board.sorted(SortBy::Score);
        assert_eq!(names(&view), ["Bea", "carl", "dave", "Al"]);
    }

    #[test]
    fn sorting_does_not_reorder_storage() {
        let board = board(&[("b", 0), ("a", 9)]);
        let _ = board.sorted(SortBy::Name);
        assert_eq!(board.players()[0].name, "b");
    }

    #[test]
    fn reset_scores_keeps_players() {
        let mut board = board(&[("Ada", 3), ("Grace", 7)]);
        board.reset_scores();
        assert_eq!(board.len(), 2);
        assert!(board.players().iter().all(|player| player.score == 0));
    }

    #[test]
    fn reset_all_empties_the_list() {
        let mut board = board(&[("Ada", 3), ("Grace", 7)]);
        board.reset_all();
        assert!(board.is_empty());
    }

    #[test]
    fn find_by_id_name_or_row() {
        let board = board(&[("Zed", 1), ("Amy", 5)]);
        let zed_id = board.players()[0].id.clone();
        assert_eq!(board.find(&zed_id, SortBy::Name).unwrap().name, "Zed");
        assert_eq!(board.find("amy", SortBy::Name).unwrap().name, "Amy");
        assert_eq!(board.find("1", SortBy::Name).unwrap().name, "Amy");
        assert_eq!(board.find("1", SortBy::Score).unwrap().name, "Amy");
        assert_eq!(board.find("2", SortBy::Name).unwrap().name, "Zed");
        assert!(board.find("0", SortBy::Name).is_none());
        assert!(board.find("3", SortBy::Name).is_none());
        assert!(board.find("nobody", SortBy::Name).is_none());
    }

    #[test]
    fn sort_keys_toggle() {
        assert_eq!(SortBy::Score.to_string(), "score");
        assert_eq!(SortBy::Name.toggled(), SortBy::Score);
        assert_eq!(SortBy::default(), SortBy::Name);
    }
}
