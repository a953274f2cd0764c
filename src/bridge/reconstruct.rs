//! Tree → object graph reconstruction.
//!
//! A raw auction subtree becomes an [`Auction`] plus a list of entries that
//! could not be reconstructed. Malformed team or player entries are skipped
//! and reported, never fatal; a malformed auction node itself is a typed
//! error.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::schema::{self, AuctionNode, PlayerNode, TeamNode};
use crate::error::{AuctionError, Result};
use crate::model::{Auction, Player, Team};

/// An entry dropped during reconstruction, with the tree path it lived at.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

/// Outcome of reconstructing one auction: the rebuilt graph and whatever had
/// to be skipped along the way.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub auction: Auction,
    pub skipped: Vec<SkippedEntry>,
}

/// Rebuild an auction from its raw subtree.
///
/// Teams are visited in sorted key order and keep their store key as the
/// back-reference all later lookups use. Scalar fields (participant counter,
/// activity flag) are restored verbatim, not recomputed, so drift in the
/// stored data stays observable.
pub fn auction_from_value(raw: &Value) -> Result<Reconstruction> {
    let node: AuctionNode =
        serde_json::from_value(raw.clone()).map_err(|e| AuctionError::MalformedNode {
            path: schema::AUCTIONS_PATH.to_string(),
            reason: e.to_string(),
        })?;

    let mut skipped = Vec::new();
    let auction_id = node.id.clone();

    let mut teams = Vec::new();
    for (team_key, team_raw) in &node.teams {
        let team_path = schema::team_path(&auction_id, team_key);
        let team_node: TeamNode = match serde_json::from_value(team_raw.clone()) {
            Ok(t) => t,
            Err(e) => {
                skipped.push(SkippedEntry {
                    path: team_path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let mut team = Team::new(team_key.clone(), team_node.nome, team_node.budget_iniziale);
        if !team_node.user_id.is_empty() {
            team.owner_id = Some(team_node.user_id);
        }
        if !team_node.user_email.is_empty() {
            team.owner_email = Some(team_node.user_email);
        }

        for (calc_key, calc_raw) in &team_node.calciatori {
            match parse_player(calc_raw) {
                Ok(player) => team.players.push(player),
                Err(reason) => skipped.push(SkippedEntry {
                    path: format!("{}/calciatori/{}", team_path, calc_key),
                    reason,
                }),
            }
        }

        // Budget restored verbatim, after the roster is in place
        team.budget = team_node.budget;
        teams.push(team);
    }

    let mut catalog = Vec::new();
    for (calc_key, calc_raw) in &node.calciatori {
        match parse_player(calc_raw) {
            Ok(player) => catalog.push(player),
            Err(reason) => skipped.push(SkippedEntry {
                path: format!("{}/calciatori/{}", schema::auction_path(&auction_id), calc_key),
                reason,
            }),
        }
    }

    let created_at = parse_created_at(&node.created_at);
    let auction = Auction::from_stored(
        node.id,
        node.nome,
        node.numero_partecipanti,
        node.crediti_per_partecipante,
        node.codice_invito,
        node.amministratore,
        node.partecipanti_iscritti,
        node.is_attiva,
        created_at,
        teams,
        catalog,
    );

    Ok(Reconstruction { auction, skipped })
}

fn parse_player(raw: &Value) -> std::result::Result<Player, String> {
    let node: PlayerNode = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
    node.into_player()
}

fn parse_created_at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
