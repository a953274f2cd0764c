//! Roster export: the flat CSV dump consumed by external league tools.

use crate::model::Auction;

/// Separator line between team blocks.
const TEAM_SEPARATOR: &str = "$,$,$";

/// Flatten an auction's rosters into the exchange format: one leading
/// separator line, then per team one `name,playerId,price` line per roster
/// entry in display order, with a separator line between teams.
pub fn rosters_csv(auction: &Auction) -> String {
    let mut out = String::new();
    for team in &auction.teams {
        out.push_str(TEAM_SEPARATOR);
        out.push('\n');
        for player in team.sorted_roster() {
            out.push_str(&format!(
                "{},{},{}\n",
                team.name,
                player.id,
                player.purchase_price.unwrap_or(0)
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Player, Team};
    use crate::types::Role;

    fn auction_with_rosters() -> Auction {
        let mut team_a = Team::new("team_a", "TeamA", 500);
        team_a.add_player(&Player::new(9, "Lautaro", "Inter", Role::Attacker), 120);
        team_a.add_player(&Player::new(1, "Meret", "Napoli", Role::Goalkeeper), 20);
        let mut team_b = Team::new("team_b", "TeamB", 500);
        team_b.add_player(&Player::new(4, "Bremer", "Juventus", Role::Defender), 30);

        Auction::new("LegaTest", 4, 500, "u1", vec![team_a, team_b], vec![])
    }

    #[test]
    fn format_leads_with_separator_and_splits_teams() {
        let csv = rosters_csv(&auction_with_rosters());
        // Goalkeeper sorts before attacker within TeamA
        assert_eq!(
            csv,
            "$,$,$\nTeamA,1,20\nTeamA,9,120\n$,$,$\nTeamB,4,30\n"
        );
    }

    #[test]
    fn team_without_players_still_gets_its_separator() {
        let auction = Auction::new(
            "LegaTest",
            4,
            500,
            "u1",
            vec![Team::new("team_a", "Vuota", 500)],
            vec![],
        );
        assert_eq!(rosters_csv(&auction), "$,$,$\n");
    }

    #[test]
    fn no_teams_yields_empty_export() {
        let auction = Auction::new("LegaTest", 4, 500, "u1", vec![], vec![]);
        assert_eq!(rosters_csv(&auction), "");
    }
}
