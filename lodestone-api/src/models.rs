use serde::Serialize;

/// Roster and player count, always replaced together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerSnapshot {
  /// Player names in the order the API returned them
  pub players: Vec<String>,
  /// Online player count after the failsafe rule
  pub online_count: u32,
}

impl ServerSnapshot {
  /// Pair a roster with the count the API reported.
  ///
  /// A reported count of zero next to a non-empty roster is treated as a backend
  /// inconsistency and replaced by the roster length.
  pub fn reconcile(players: Vec<String>, reported_count: u32) -> Self {
    let online_count = if reported_count == 0 && !players.is_empty() {
      u32::try_from(players.len()).unwrap_or(u32::MAX)
    } else {
      reported_count
    };
    Self {
      players,
      online_count,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.players.is_empty()
  }
}
