use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Player, Team};
use crate::types::{generate_invite_code, AuctionId, PlayerId, Role, UserId};

/// Aggregate root of one auction run: participant teams, player pools,
/// invite code and capacity. Enforces assignment and join invariants in
/// memory; owns no I/O.
///
/// Instances are disposable reconstructions of the persisted tree, never a
/// source of truth: the store bridge rebuilds them on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    /// Store-generated id; empty until first persisted.
    #[serde(default)]
    pub id: AuctionId,
    pub name: String,
    /// Configured participant count.
    pub capacity: u32,
    /// Initial budget handed to every team.
    pub credits_per_participant: u32,
    pub invite_code: String,
    pub admin_id: UserId,
    /// Participants actually enrolled. Persisted separately from the team
    /// list; the administrator counts as the first participant.
    pub enrolled: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub teams: Vec<Team>,
    /// Full catalog snapshot for this auction. Optional: current data omits
    /// it and recovers player data by walking team rosters.
    #[serde(default)]
    pub catalog: Vec<Player>,
    /// Catalog entries not yet bought by any team.
    #[serde(default)]
    pub available: Vec<Player>,
    /// Catalog entries currently on a roster.
    #[serde(default)]
    pub assigned: Vec<Player>,
}

impl Auction {
    pub fn new(
        name: impl Into<String>,
        capacity: u32,
        credits_per_participant: u32,
        admin_id: impl Into<UserId>,
        teams: Vec<Team>,
        catalog: Vec<Player>,
    ) -> Self {
        // The administrator always counts as the first participant, with or
        // without a team node of their own.
        let enrolled = if teams.is_empty() {
            1
        } else {
            teams.len() as u32
        };
        let available = catalog.iter().filter(|p| !p.assigned).cloned().collect();
        let assigned = catalog.iter().filter(|p| p.assigned).cloned().collect();

        Auction {
            id: AuctionId::new(),
            name: name.into(),
            capacity,
            credits_per_participant,
            invite_code: generate_invite_code(),
            admin_id: admin_id.into(),
            enrolled,
            active: true,
            created_at: Utc::now(),
            teams,
            catalog,
            available,
            assigned,
        }
    }

    /// Reassemble an auction from persisted parts. Scalars are restored
    /// verbatim rather than recomputed, so drift in the stored counter stays
    /// visible. The assigned pool is rebuilt by walking team rosters; the
    /// available pool is whatever remains of the (possibly empty) catalog.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: AuctionId,
        name: String,
        capacity: u32,
        credits_per_participant: u32,
        invite_code: String,
        admin_id: UserId,
        enrolled: u32,
        active: bool,
        created_at: DateTime<Utc>,
        teams: Vec<Team>,
        catalog: Vec<Player>,
    ) -> Self {
        let assigned: Vec<Player> = teams
            .iter()
            .flat_map(|t| t.players.iter().cloned())
            .collect();
        let available = catalog
            .iter()
            .filter(|p| !assigned.iter().any(|a| a.id == p.id))
            .cloned()
            .collect();

        Auction {
            id,
            name,
            capacity,
            credits_per_participant,
            invite_code,
            admin_id,
            enrolled,
            active,
            created_at,
            teams,
            catalog,
            available,
            assigned,
        }
    }

    /// Whether a new team may still enroll.
    pub fn can_join(&self) -> bool {
        self.active && self.enrolled < self.capacity
    }

    /// Append a team if the auction accepts joins. The first team is the
    /// administrator's own and is already counted in `enrolled`.
    ///
    /// Mutates the participant counter; the caller must persist it.
    pub fn add_team(&mut self, team: Team) -> bool {
        if !self.can_join() {
            return false;
        }
        self.teams.push(team);
        if self.teams.len() > 1 {
            self.enrolled += 1;
        }
        true
    }

    pub fn team_by_key(&self, key: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.key == key)
    }

    pub fn team_by_key_mut(&mut self, key: &str) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.key == key)
    }

    /// The team whose roster contains `player_id`, if any.
    pub fn owning_team_of(&self, player_id: PlayerId) -> Option<&Team> {
        self.teams
            .iter()
            .find(|t| t.find_player(player_id).is_some())
    }

    /// Assign `player` to the team identified by `team_key` at `price`.
    ///
    /// Fails (returning `false`, with no mutation) when the player is already
    /// on a roster, the team is unknown, its role cap is reached, or its
    /// budget is short. On success the player moves from the available pool
    /// to the team roster and the assigned pool.
    pub fn assign_player(&mut self, player: &Player, team_key: &str, price: u32) -> bool {
        if player.assigned || self.owning_team_of(player.id).is_some() {
            return false;
        }
        let Some(team) = self.team_by_key_mut(team_key) else {
            return false;
        };
        if !team.add_player(player, price) {
            return false;
        }

        let team_name = team.name.clone();
        if let Some(index) = self.available.iter().position(|p| p.id == player.id) {
            self.available.remove(index);
        }
        self.assigned.push(player.assigned_copy(&team_name, price));
        true
    }

    /// Undo an assignment: restores the owning team's budget and moves the
    /// player back to the available pool. Fails if no team's roster contains
    /// the player.
    pub fn unassign_player(&mut self, player_id: PlayerId) -> bool {
        let Some(owner_index) = self
            .teams
            .iter()
            .position(|t| t.find_player(player_id).is_some())
        else {
            return false;
        };
        let Some(cleared) = self.teams[owner_index].remove_player(player_id) else {
            return false;
        };

        if let Some(index) = self.assigned.iter().position(|p| p.id == player_id) {
            self.assigned.remove(index);
        }
        self.available.push(cleared);
        true
    }

    pub fn players_by_role(&self, role: Role) -> Vec<&Player> {
        self.catalog.iter().filter(|p| p.role == role).collect()
    }

    pub fn available_by_role(&self, role: Role) -> Vec<&Player> {
        self.available.iter().filter(|p| p.role == role).collect()
    }

    pub fn assigned_by_role(&self, role: Role) -> Vec<&Player> {
        self.assigned.iter().filter(|p| p.role == role).collect()
    }

    pub fn assigned_to_team(&self, team_key: &str) -> Vec<&Player> {
        self.team_by_key(team_key)
            .map(|t| t.players.iter().collect())
            .unwrap_or_default()
    }

    pub fn assigned_to_team_by_role(&self, team_key: &str, role: Role) -> Vec<&Player> {
        self.team_by_key(team_key)
            .map(|t| t.players_by_role(role))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: PlayerId, role: Role) -> Player {
        Player::new(id, format!("Giocatore {}", id), "Club", role)
    }

    fn auction_with_team() -> Auction {
        let team = Team::new("team_a", "TeamA", 500).with_owner("u1", "u1@example.com");
        let catalog = vec![
            player(1, Role::Goalkeeper),
            player(2, Role::Goalkeeper),
            player(3, Role::Goalkeeper),
            player(4, Role::Goalkeeper),
            player(9, Role::Attacker),
        ];
        Auction::new("LegaTest", 4, 500, "u1", vec![team], catalog)
    }

    #[test]
    fn new_auction_counts_admin_as_first_participant() {
        let auction = Auction::new("LegaTest", 2, 500, "u1", vec![], vec![]);
        assert_eq!(auction.enrolled, 1);
        assert!(auction.active);
        assert_eq!(auction.invite_code.len(), 6);
    }

    #[test]
    fn can_join_respects_capacity_and_active_flag() {
        let mut auction = Auction::new("LegaTest", 2, 500, "u1", vec![], vec![]);
        assert!(auction.can_join());

        auction.enrolled = 2;
        assert!(!auction.can_join());

        auction.enrolled = 1;
        auction.active = false;
        assert!(!auction.can_join());
    }

    #[test]
    fn add_team_increments_counter_except_for_first() {
        let mut auction = Auction::new("LegaTest", 3, 500, "u1", vec![], vec![]);
        assert_eq!(auction.enrolled, 1);

        // First team is the administrator's own, already counted.
        assert!(auction.add_team(Team::new("team_a", "TeamA", 500)));
        assert_eq!(auction.enrolled, 1);

        assert!(auction.add_team(Team::new("team_b", "TeamB", 500)));
        assert_eq!(auction.enrolled, 2);

        assert!(auction.add_team(Team::new("team_c", "TeamC", 500)));
        assert_eq!(auction.enrolled, 3);

        // Capacity reached
        assert!(!auction.add_team(Team::new("team_d", "TeamD", 500)));
        assert_eq!(auction.enrolled, 3);
    }

    #[test]
    fn assign_moves_player_between_pools() {
        let mut auction = auction_with_team();
        let target = auction.available[0].clone();

        assert!(auction.assign_player(&target, "team_a", 50));

        assert!(auction.available.iter().all(|p| p.id != target.id));
        assert!(auction.assigned.iter().any(|p| p.id == target.id));
        let team = auction.team_by_key("team_a").unwrap();
        assert_eq!(team.budget, 450);
        assert!(team.find_player(target.id).is_some());
    }

    #[test]
    fn assign_rejects_double_assignment() {
        let mut auction = auction_with_team();
        let target = auction.available[0].clone();

        assert!(auction.assign_player(&target, "team_a", 50));
        assert!(!auction.assign_player(&target, "team_a", 50));
        assert_eq!(auction.team_by_key("team_a").unwrap().budget, 450);
    }

    #[test]
    fn assign_rejects_role_cap() {
        let mut auction = auction_with_team();
        for id in 1..=3 {
            let p = player(id, Role::Goalkeeper);
            assert!(auction.assign_player(&p, "team_a", 10));
        }
        // TeamA already has 3 goalkeepers: budget must not move.
        let fourth = player(4, Role::Goalkeeper);
        assert!(!auction.assign_player(&fourth, "team_a", 10));
        assert_eq!(auction.team_by_key("team_a").unwrap().budget, 470);
    }

    #[test]
    fn assign_rejects_insufficient_budget() {
        let mut auction = auction_with_team();
        let target = auction.available[0].clone();
        assert!(!auction.assign_player(&target, "team_a", 501));
        assert_eq!(auction.team_by_key("team_a").unwrap().budget, 500);
    }

    #[test]
    fn assign_rejects_unknown_team() {
        let mut auction = auction_with_team();
        let target = auction.available[0].clone();
        assert!(!auction.assign_player(&target, "team_missing", 50));
    }

    #[test]
    fn assign_then_unassign_restores_budget_exactly() {
        let mut auction = auction_with_team();
        let target = auction.available[0].clone();

        assert!(auction.assign_player(&target, "team_a", 120));
        assert_eq!(auction.team_by_key("team_a").unwrap().budget, 380);

        assert!(auction.unassign_player(target.id));
        assert_eq!(auction.team_by_key("team_a").unwrap().budget, 500);

        let restored = auction
            .available
            .iter()
            .find(|p| p.id == target.id)
            .expect("player back in available pool");
        assert!(!restored.assigned);
        assert_eq!(restored.assigned_team, None);
        assert_eq!(restored.purchase_price, None);
    }

    #[test]
    fn unassign_unknown_player_fails() {
        let mut auction = auction_with_team();
        assert!(!auction.unassign_player(999));
    }

    #[test]
    fn role_filtered_queries() {
        let mut auction = auction_with_team();
        let keeper = auction.available_by_role(Role::Goalkeeper)[0].clone();
        auction.assign_player(&keeper, "team_a", 10);

        assert_eq!(auction.players_by_role(Role::Goalkeeper).len(), 4);
        assert_eq!(auction.available_by_role(Role::Goalkeeper).len(), 3);
        assert_eq!(auction.assigned_by_role(Role::Goalkeeper).len(), 1);
        assert_eq!(auction.assigned_to_team("team_a").len(), 1);
        assert_eq!(
            auction
                .assigned_to_team_by_role("team_a", Role::Goalkeeper)
                .len(),
            1
        );
        assert!(auction
            .assigned_to_team_by_role("team_a", Role::Attacker)
            .is_empty());
    }

    #[test]
    fn capacity_invariant_over_join_sequence() {
        let mut auction = Auction::new("LegaTest", 2, 500, "u1", vec![], vec![]);
        assert!(auction.add_team(Team::new("team_a", "Admin", 500)));
        assert!(auction.add_team(Team::new("team_b", "TeamB", 500)));
        assert!(!auction.add_team(Team::new("team_c", "TeamC", 500)));
        assert!(auction.enrolled <= auction.capacity);
        assert_eq!(auction.enrolled, 2);
    }
}
