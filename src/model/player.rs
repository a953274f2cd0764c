use serde::{Deserialize, Serialize};

use crate::types::{PlayerId, Role};

/// A catalog entry: one footballer with role and valuation data, plus the
/// mutable assignment state it carries while inside an auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Real-world club the player belongs to.
    pub club: String,
    pub role: Role,
    /// Secondary role tag ("Mantra" role), informational only.
    #[serde(default)]
    pub role_detail: String,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub base_value: f64,
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub market_current_value: f64,
    #[serde(default)]
    pub market_base_value: f64,
    #[serde(default)]
    pub market_delta: f64,
    #[serde(default)]
    pub fair_value: f64,
    #[serde(default)]
    pub market_fair_value: f64,
    #[serde(default)]
    pub assigned: bool,
    /// Display name of the owning team. Never used for lookups; teams are
    /// resolved by their store key.
    #[serde(default)]
    pub assigned_team: Option<String>,
    #[serde(default)]
    pub purchase_price: Option<u32>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, club: impl Into<String>, role: Role) -> Self {
        Player {
            id,
            name: name.into(),
            club: club.into(),
            role,
            role_detail: String::new(),
            current_value: 0.0,
            base_value: 0.0,
            delta: 0.0,
            market_current_value: 0.0,
            market_base_value: 0.0,
            market_delta: 0.0,
            fair_value: 0.0,
            market_fair_value: 0.0,
            assigned: false,
            assigned_team: None,
            purchase_price: None,
        }
    }

    /// A copy marked as bought by `team_name` at `price`, decoupled from any
    /// catalog-shared instance.
    pub fn assigned_copy(&self, team_name: &str, price: u32) -> Player {
        let mut copy = self.clone();
        copy.assigned = true;
        copy.assigned_team = Some(team_name.to_string());
        copy.purchase_price = Some(price);
        copy
    }

    pub fn clear_assignment(&mut self) {
        self.assigned = false;
        self.assigned_team = None;
        self.purchase_price = None;
    }
}
