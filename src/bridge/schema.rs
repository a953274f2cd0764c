//! Typed schema of the persisted auction tree.
//!
//! Every store read goes through these structs so malformed nodes surface as
//! typed errors instead of undefined-field surprises. Field names are the
//! wire names; maps are `BTreeMap` so reconstruction iterates store keys in a
//! stable sorted order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Player;
use crate::types::{PlayerId, Role};

pub const AUCTIONS_PATH: &str = "/aste";
pub const CATALOG_PATH: &str = "/calciatori";

/// One auction node under `/aste/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionNode {
    #[serde(default)]
    pub id: String,
    pub nome: String,
    #[serde(default = "default_capacity")]
    pub numero_partecipanti: u32,
    #[serde(default = "default_credits")]
    pub crediti_per_partecipante: u32,
    pub codice_invito: String,
    #[serde(default)]
    pub amministratore: String,
    #[serde(default)]
    pub partecipanti_iscritti: u32,
    #[serde(default = "default_true")]
    pub is_attiva: bool,
    #[serde(default)]
    pub created_at: String,
    /// Team nodes are deserialized entry-by-entry so one malformed team does
    /// not fail the whole auction.
    #[serde(default)]
    pub teams: BTreeMap<String, Value>,
    /// Legacy per-auction catalog snapshot. Empty in current data.
    #[serde(default)]
    pub calciatori: BTreeMap<String, Value>,
}

fn default_capacity() -> u32 {
    8
}

fn default_credits() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

/// One team node under `/aste/{id}/teams/{teamKey}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNode {
    pub nome: String,
    pub budget: u32,
    pub budget_iniziale: u32,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub calciatori: BTreeMap<String, Value>,
}

/// One player node, either on a roster or in the flat catalog path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNode {
    pub id: PlayerId,
    pub nome: String,
    #[serde(default)]
    pub squadra: String,
    pub codice_ruolo: String,
    #[serde(default)]
    pub ruolo: String,
    #[serde(default)]
    pub ruolo_mantra: String,
    #[serde(default)]
    pub quotazione_attuale: f64,
    #[serde(default)]
    pub quotazione_iniziale: f64,
    #[serde(default)]
    pub differenza: f64,
    #[serde(default)]
    pub quotazione_attuale_mercato: f64,
    #[serde(default)]
    pub quotazione_iniziale_mercato: f64,
    #[serde(default)]
    pub differenza_mercato: f64,
    #[serde(default)]
    pub fair_market_value: f64,
    #[serde(default)]
    pub fair_market_value_mercato: f64,
    #[serde(default)]
    pub assegnato: bool,
    #[serde(default)]
    pub team_assegnato: Option<String>,
    #[serde(default)]
    pub prezzo_acquisto: Option<u32>,
}

impl PlayerNode {
    /// Validate required fields and build the domain player.
    ///
    /// Errors carry a human-readable reason and feed the reconstruction's
    /// skipped-entry diagnostics.
    pub fn into_player(self) -> std::result::Result<Player, String> {
        if self.id == 0 {
            return Err("missing or zero player id".to_string());
        }
        if self.nome.is_empty() {
            return Err("missing player name".to_string());
        }
        let Some(role) = Role::from_code(&self.codice_ruolo) else {
            return Err(format!("unknown role code '{}'", self.codice_ruolo));
        };

        Ok(Player {
            id: self.id,
            name: self.nome,
            club: self.squadra,
            role,
            role_detail: self.ruolo_mantra,
            current_value: self.quotazione_attuale,
            base_value: self.quotazione_iniziale,
            delta: self.differenza,
            market_current_value: self.quotazione_attuale_mercato,
            market_base_value: self.quotazione_iniziale_mercato,
            market_delta: self.differenza_mercato,
            fair_value: self.fair_market_value,
            market_fair_value: self.fair_market_value_mercato,
            assigned: self.assegnato,
            assigned_team: self.team_assegnato.filter(|t| !t.is_empty()),
            purchase_price: self.prezzo_acquisto,
        })
    }
}

impl From<&Player> for PlayerNode {
    fn from(p: &Player) -> Self {
        PlayerNode {
            id: p.id,
            nome: p.name.clone(),
            squadra: p.club.clone(),
            codice_ruolo: p.role.code().to_string(),
            ruolo: p.role.display_name().to_string(),
            ruolo_mantra: p.role_detail.clone(),
            quotazione_attuale: p.current_value,
            quotazione_iniziale: p.base_value,
            differenza: p.delta,
            quotazione_attuale_mercato: p.market_current_value,
            quotazione_iniziale_mercato: p.market_base_value,
            differenza_mercato: p.market_delta,
            fair_market_value: p.fair_value,
            fair_market_value_mercato: p.market_fair_value,
            assegnato: p.assigned,
            team_assegnato: p.assigned_team.clone(),
            prezzo_acquisto: p.purchase_price,
        }
    }
}

// Path builders. All paths are absolute.

pub fn auction_path(auction_id: &str) -> String {
    format!("{}/{}", AUCTIONS_PATH, auction_id)
}

pub fn teams_path(auction_id: &str) -> String {
    format!("{}/{}/teams", AUCTIONS_PATH, auction_id)
}

pub fn team_path(auction_id: &str, team_key: &str) -> String {
    format!("{}/{}/teams/{}", AUCTIONS_PATH, auction_id, team_key)
}

pub fn team_budget_path(auction_id: &str, team_key: &str) -> String {
    format!("{}/budget", team_path(auction_id, team_key))
}

pub fn participants_path(auction_id: &str) -> String {
    format!("{}/{}/partecipantiIscritti", AUCTIONS_PATH, auction_id)
}

pub fn active_path(auction_id: &str) -> String {
    format!("{}/{}/isAttiva", AUCTIONS_PATH, auction_id)
}

pub fn player_key(player_id: PlayerId) -> String {
    format!("calc_{}", player_id)
}

pub fn team_player_path(auction_id: &str, team_key: &str, player_id: PlayerId) -> String {
    format!(
        "{}/calciatori/{}",
        team_path(auction_id, team_key),
        player_key(player_id)
    )
}

pub fn team_player_price_path(auction_id: &str, team_key: &str, player_id: PlayerId) -> String {
    format!(
        "{}/prezzoAcquisto",
        team_player_path(auction_id, team_key, player_id)
    )
}
