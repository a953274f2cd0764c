use serde::{Deserialize, Serialize};

use super::Player;
use crate::types::{PlayerId, Role, TeamKey, UserId};

/// One participant's roster and budget ledger within an auction.
///
/// Identity is the store-generated `key`, not the display name: names are only
/// checked for uniqueness at join time and may legitimately collide after a
/// rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub key: TeamKey,
    pub name: String,
    /// Owner of this team. Empty for an admin team created alongside the
    /// auction, until the admin claims it by joining.
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub owner_email: Option<String>,
    pub budget: u32,
    pub initial_budget: u32,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Team {
    pub fn new(key: impl Into<TeamKey>, name: impl Into<String>, budget: u32) -> Self {
        Team {
            key: key.into(),
            name: name.into(),
            owner_id: None,
            owner_email: None,
            budget,
            initial_budget: budget,
            players: Vec::new(),
        }
    }

    pub fn with_owner(mut self, user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        self.owner_id = Some(user_id.into());
        self.owner_email = Some(email.into());
        self
    }

    pub fn role_count(&self, role: Role) -> usize {
        self.players.iter().filter(|p| p.role == role).count()
    }

    pub fn role_cap_reached(&self, role: Role) -> bool {
        self.role_count(role) >= role.max_slots()
    }

    pub fn find_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Buy `player` at `price`: marks the player as assigned to this team,
    /// appends it to the roster and debits the budget.
    ///
    /// Returns `false` without mutating anything if the role cap is reached
    /// or the price exceeds the remaining budget.
    pub fn add_player(&mut self, player: &Player, price: u32) -> bool {
        if self.role_cap_reached(player.role) {
            return false;
        }
        if price > self.budget {
            return false;
        }

        self.players.push(player.assigned_copy(&self.name, price));
        self.budget -= price;
        true
    }

    /// Remove a player from the roster by id, crediting back its recorded
    /// purchase price. Returns the removed player with its assignment fields
    /// cleared, or `None` if no roster entry matches.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let mut player = self.players.remove(index);
        self.budget += player.purchase_price.unwrap_or(0);
        player.clear_assignment();
        Some(player)
    }

    pub fn players_by_role(&self, role: Role) -> Vec<&Player> {
        self.players.iter().filter(|p| p.role == role).collect()
    }

    /// Roster in display order: goalkeepers, defenders, midfielders, attackers.
    pub fn sorted_roster(&self) -> Vec<&Player> {
        let mut roster: Vec<&Player> = self.players.iter().collect();
        roster.sort_by_key(|p| p.role.sort_order());
        roster
    }

    /// Sum of recorded purchase prices. More reliable than
    /// `initial_budget - budget` when the budget has drifted.
    pub fn total_spent(&self) -> u32 {
        self.players
            .iter()
            .map(|p| p.purchase_price.unwrap_or(0))
            .sum()
    }

    pub fn spent_for_role(&self, role: Role) -> u32 {
        self.players
            .iter()
            .filter(|p| p.role == role)
            .map(|p| p.purchase_price.unwrap_or(0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goalkeeper(id: PlayerId) -> Player {
        Player::new(id, format!("Portiere {}", id), "Club", Role::Goalkeeper)
    }

    fn attacker(id: PlayerId) -> Player {
        Player::new(id, format!("Attaccante {}", id), "Club", Role::Attacker)
    }

    #[test]
    fn add_player_debits_budget_and_marks_assignment() {
        let mut team = Team::new("team_1", "TeamA", 500);
        assert!(team.add_player(&goalkeeper(1), 50));

        assert_eq!(team.budget, 450);
        assert_eq!(team.players.len(), 1);
        let rostered = &team.players[0];
        assert!(rostered.assigned);
        assert_eq!(rostered.assigned_team.as_deref(), Some("TeamA"));
        assert_eq!(rostered.purchase_price, Some(50));
    }

    #[test]
    fn add_player_rejects_insufficient_budget() {
        let mut team = Team::new("team_1", "TeamA", 30);
        assert!(!team.add_player(&goalkeeper(1), 50));
        assert_eq!(team.budget, 30);
        assert!(team.players.is_empty());
    }

    #[test]
    fn add_player_rejects_role_cap() {
        let mut team = Team::new("team_1", "TeamA", 500);
        for id in 1..=3 {
            assert!(team.add_player(&goalkeeper(id), 10));
        }
        // Fourth goalkeeper exceeds the cap of 3
        assert!(!team.add_player(&goalkeeper(4), 10));
        assert_eq!(team.role_count(Role::Goalkeeper), 3);
        assert_eq!(team.budget, 470);
    }

    #[test]
    fn remove_player_restores_budget_exactly() {
        let mut team = Team::new("team_1", "TeamA", 500);
        team.add_player(&attacker(9), 120);
        assert_eq!(team.budget, 380);

        let removed = team.remove_player(9).expect("player on roster");
        assert_eq!(team.budget, 500);
        assert!(team.players.is_empty());
        assert!(!removed.assigned);
        assert_eq!(removed.assigned_team, None);
        assert_eq!(removed.purchase_price, None);
    }

    #[test]
    fn remove_player_unknown_id_is_noop() {
        let mut team = Team::new("team_1", "TeamA", 500);
        team.add_player(&attacker(9), 120);
        assert!(team.remove_player(99).is_none());
        assert_eq!(team.budget, 380);
        assert_eq!(team.players.len(), 1);
    }

    #[test]
    fn spend_queries() {
        let mut team = Team::new("team_1", "TeamA", 500);
        team.add_player(&goalkeeper(1), 50);
        team.add_player(&attacker(9), 120);
        team.add_player(&attacker(10), 30);

        assert_eq!(team.total_spent(), 200);
        assert_eq!(team.spent_for_role(Role::Goalkeeper), 50);
        assert_eq!(team.spent_for_role(Role::Attacker), 150);
        assert_eq!(team.spent_for_role(Role::Defender), 0);
    }

    #[test]
    fn sorted_roster_follows_role_order() {
        let mut team = Team::new("team_1", "TeamA", 500);
        team.add_player(&attacker(9), 10);
        team.add_player(&goalkeeper(1), 10);
        let roster = team.sorted_roster();
        assert_eq!(roster[0].role, Role::Goalkeeper);
        assert_eq!(roster[1].role, Role::Attacker);
    }
}
