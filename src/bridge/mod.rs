//! The auction store bridge: the only reader and writer of the persisted
//! auction tree.
//!
//! Every mutation is validated against a freshly loaded snapshot and then
//! written as one targeted multi-path atomic update, touching only the paths
//! that actually changed. Reads go through the typed schema and the
//! reconstruction protocol; live views are per-auction watch channels fed by
//! the store's change events.

pub mod join;
pub mod reconstruct;
pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};

use crate::error::{AuctionError, Result};
use crate::model::{Auction, Player};
use crate::store::{paths_overlap, Rtdb};
use crate::types::{normalize_invite_code, AuctionId, PlayerId};

use join::{generate_team_key, JoinLocks, JoinOutcome, JoinRequest};
use reconstruct::SkippedEntry;
use schema::{PlayerNode, TeamNode};

const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AuctionStore {
    db: Arc<Rtdb>,
    join_locks: Arc<JoinLocks>,
    join_timeout: Duration,
}

impl AuctionStore {
    pub fn new(db: Arc<Rtdb>) -> Self {
        AuctionStore {
            db,
            join_locks: JoinLocks::new(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    /// Bound on how long a join may hold its in-flight lock before it is
    /// force-released and reported as timed out.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    // ---- Lookups ----

    /// Load and reconstruct one auction. `Ok(None)` when the id is unknown;
    /// a malformed auction node is a typed error.
    pub async fn auction_by_id(&self, auction_id: &str) -> Result<Option<Auction>> {
        let Some(raw) = self.db.get(&schema::auction_path(auction_id)).await else {
            return Ok(None);
        };
        let rec = reconstruct::auction_from_value(&raw)?;
        log_skipped(&rec.skipped);
        Ok(Some(rec.auction))
    }

    /// All auctions currently in the store. Auctions whose node fails to
    /// reconstruct are logged and dropped from the listing.
    pub async fn all_auctions(&self) -> Vec<Auction> {
        let Some(raw) = self.db.get(schema::AUCTIONS_PATH).await else {
            return Vec::new();
        };
        let Some(map) = raw.as_object() else {
            return Vec::new();
        };

        map.values()
            .filter_map(|value| match reconstruct::auction_from_value(value) {
                Ok(rec) => {
                    log_skipped(&rec.skipped);
                    Some(rec.auction)
                }
                Err(e) => {
                    tracing::warn!("dropping unreadable auction node from listing: {}", e);
                    None
                }
            })
            .collect()
    }

    pub async fn auction_by_code(&self, invite_code: &str) -> Option<Auction> {
        let code = normalize_invite_code(invite_code);
        self.all_auctions()
            .await
            .into_iter()
            .find(|a| a.invite_code == code)
    }

    /// Active auctions that still accept joins.
    pub async fn open_auctions(&self) -> Vec<Auction> {
        self.all_auctions()
            .await
            .into_iter()
            .filter(|a| a.can_join())
            .collect()
    }

    /// Auctions the user participates in, as administrator or team owner.
    pub async fn auctions_for_user(&self, user_id: &str) -> Vec<Auction> {
        self.all_auctions()
            .await
            .into_iter()
            .filter(|a| {
                a.admin_id == user_id
                    || a.teams
                        .iter()
                        .any(|t| t.owner_id.as_deref() == Some(user_id))
            })
            .collect()
    }

    pub async fn auctions_created_by(&self, user_id: &str) -> Vec<Auction> {
        self.all_auctions()
            .await
            .into_iter()
            .filter(|a| a.admin_id == user_id)
            .collect()
    }

    // ---- Live view ----

    /// Live view of one auction: the receiver holds the latest reconstructed
    /// state and flips to `None` when the auction is deleted. The feeding
    /// task exits when the last receiver is dropped.
    pub async fn watch_auction(&self, auction_id: &str) -> watch::Receiver<Option<Auction>> {
        let id = auction_id.to_string();
        let initial = reload_auction(&self.db, &id).await;
        let (tx, rx) = watch::channel(initial);

        let db = Arc::clone(&self.db);
        let mut events = db.subscribe();
        tokio::spawn(async move {
            let root = schema::auction_path(&id);
            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(ev) => {
                                if !ev.paths.iter().any(|p| paths_overlap(p, &root)) {
                                    continue;
                                }
                            }
                            // Missed events: resync from the tree anyway
                            Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                        let state = reload_auction(&db, &id).await;
                        if tx.send(state).is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
        });

        rx
    }

    // ---- Lifecycle mutations ----

    /// Create a new auction: store-generated id, scalar fields plus an empty
    /// teams map. No per-auction catalog snapshot is written; player data is
    /// recovered from team rosters on reconstruction.
    pub async fn create_auction(
        &self,
        name: &str,
        capacity: u32,
        credits_per_participant: u32,
        admin_id: &str,
        catalog: Vec<Player>,
    ) -> Result<Auction> {
        let mut auction = Auction::new(
            name,
            capacity,
            credits_per_participant,
            admin_id,
            Vec::new(),
            catalog,
        );
        auction.id = self.db.push_id();

        let node = json!({
            "id": auction.id,
            "nome": auction.name,
            "numeroPartecipanti": auction.capacity,
            "creditiPerPartecipante": auction.credits_per_participant,
            "codiceInvito": auction.invite_code,
            "amministratore": auction.admin_id,
            "partecipantiIscritti": auction.enrolled,
            "isAttiva": auction.active,
            "createdAt": auction.created_at.to_rfc3339(),
            "teams": {},
        });
        self.db.set(&schema::auction_path(&auction.id), node).await;

        tracing::info!(
            "created auction {} ({}) with invite code {}",
            auction.id,
            auction.name,
            auction.invite_code
        );
        Ok(auction)
    }

    /// Rewrite a whole auction node from the in-memory graph (admin edit).
    pub async fn update_auction(&self, auction: &Auction) -> Result<()> {
        if auction.id.is_empty() {
            return Err(AuctionError::MissingAuctionId);
        }

        let mut teams = serde_json::Map::new();
        for team in &auction.teams {
            teams.insert(team.key.clone(), serde_json::to_value(team_to_node(team))?);
        }
        let node = json!({
            "id": auction.id,
            "nome": auction.name,
            "numeroPartecipanti": auction.capacity,
            "creditiPerPartecipante": auction.credits_per_participant,
            "codiceInvito": auction.invite_code,
            "amministratore": auction.admin_id,
            "partecipantiIscritti": auction.enrolled,
            "isAttiva": auction.active,
            "createdAt": auction.created_at.to_rfc3339(),
            "teams": teams,
        });
        self.db.set(&schema::auction_path(&auction.id), node).await;
        Ok(())
    }

    /// Flip the activity flag with a targeted write. Returns `false` when the
    /// auction does not exist.
    pub async fn set_active(&self, auction_id: &str, active: bool) -> Result<bool> {
        if self.db.get(&schema::auction_path(auction_id)).await.is_none() {
            return Ok(false);
        }
        self.db
            .set(&schema::active_path(auction_id), json!(active))
            .await;
        Ok(true)
    }

    pub async fn delete_auction(&self, auction_id: &str) {
        self.db.remove(&schema::auction_path(auction_id)).await;
        tracing::info!("deleted auction {}", auction_id);
    }

    /// Account-removal cascade: delete every auction administered by
    /// `user_id` in one atomic update. Returns how many were removed.
    pub async fn delete_auctions_created_by(&self, user_id: &str) -> usize {
        let ids: Vec<AuctionId> = self
            .auctions_created_by(user_id)
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();
        if ids.is_empty() {
            return 0;
        }

        let changes: BTreeMap<String, Option<Value>> = ids
            .iter()
            .map(|id| (schema::auction_path(id), None))
            .collect();
        self.db.update(changes).await;
        tracing::info!("deleted {} auctions administered by {}", ids.len(), user_id);
        ids.len()
    }

    // ---- Join ----

    /// Join an auction as a new team. Serialized per (code, user) by the join
    /// coordinator; the whole attempt is bounded by the configured timeout,
    /// after which the lock is released and `JoinTimeout` is reported.
    pub async fn join_auction(&self, request: JoinRequest) -> Result<JoinOutcome> {
        match tokio::time::timeout(self.join_timeout, self.join_inner(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AuctionError::JoinTimeout),
        }
    }

    async fn join_inner(&self, request: &JoinRequest) -> Result<JoinOutcome> {
        let code = normalize_invite_code(&request.invite_code);
        let Some(_guard) = self.join_locks.acquire(&code, &request.user_id) else {
            return Ok(JoinOutcome::busy());
        };

        let Some(auction) = self.auction_by_code(&code).await else {
            return Ok(JoinOutcome::failure("Codice asta non valido"));
        };
        if !auction.active {
            return Ok(JoinOutcome::failure("Asta non più disponibile"));
        }

        // Second, authoritative read: the lookup above may be stale relative
        // to concurrent joins, so count teams and match owners on the raw
        // subtree rather than the reconstructed object.
        let raw_teams = self
            .db
            .get(&schema::teams_path(&auction.id))
            .await
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let teams_map = raw_teams.as_object().cloned().unwrap_or_default();

        // Joining twice is not an error: report success without a duplicate
        for team in teams_map.values() {
            let owner_id = team.get("userId").and_then(Value::as_str).unwrap_or("");
            let owner_email = team.get("userEmail").and_then(Value::as_str).unwrap_or("");
            let same_user = !owner_id.is_empty() && owner_id == request.user_id;
            let same_email = !request.user_email.is_empty() && owner_email == request.user_email;
            if same_user || same_email {
                return Ok(JoinOutcome::success(
                    "Sei già iscritto a questa asta",
                    auction.id.clone(),
                ));
            }
        }

        if teams_map.len() as u32 >= auction.capacity || !auction.can_join() {
            return Ok(JoinOutcome::failure("Asta al completo"));
        }

        let name_taken = teams_map.values().any(|team| {
            team.get("nome")
                .and_then(Value::as_str)
                .map(|n| n.to_lowercase() == request.team_name.to_lowercase())
                .unwrap_or(false)
        });
        if name_taken {
            return Ok(JoinOutcome::failure("Nome team già in uso"));
        }

        let team_key = generate_team_key();
        // The administrator was counted at creation time; everyone else
        // increments the persisted counter.
        let new_count = if request.user_id == auction.admin_id {
            auction.enrolled
        } else {
            auction.enrolled + 1
        };
        let team_node = TeamNode {
            nome: request.team_name.clone(),
            budget: auction.credits_per_participant,
            budget_iniziale: auction.credits_per_participant,
            user_id: request.user_id.clone(),
            user_email: request.user_email.clone(),
            calciatori: BTreeMap::new(),
        };

        let changes: BTreeMap<String, Option<Value>> = [
            (
                schema::team_path(&auction.id, &team_key),
                Some(serde_json::to_value(&team_node)?),
            ),
            (
                schema::participants_path(&auction.id),
                Some(json!(new_count)),
            ),
        ]
        .into_iter()
        .collect();
        self.db.update(changes).await;

        tracing::info!(
            "team '{}' ({}) joined auction {}",
            request.team_name,
            team_key,
            auction.id
        );
        Ok(JoinOutcome::success(
            "Iscrizione effettuata con successo",
            auction.id,
        ))
    }

    // ---- Assignment mutations ----

    /// Assign `player` to a team at `price`.
    ///
    /// The auction is loaded fresh and the team-level invariants re-checked
    /// against that state; on success exactly two paths change: the team's
    /// budget and the new player sub-node. `Ok(false)` on any validation
    /// failure or lookup miss.
    pub async fn assign_player(
        &self,
        auction_id: &str,
        player: &Player,
        team_key: &str,
        price: u32,
    ) -> Result<bool> {
        let Some(mut auction) = self.auction_by_id(auction_id).await? else {
            return Ok(false);
        };
        if auction.owning_team_of(player.id).is_some() {
            return Ok(false);
        }
        let Some(team) = auction.team_by_key_mut(team_key) else {
            return Ok(false);
        };

        // Decoupled copy of the catalog player, marked as bought
        let assigned = player.assigned_copy(&team.name, price);
        if !team.add_player(player, price) {
            return Ok(false);
        }

        let changes: BTreeMap<String, Option<Value>> = [
            (
                schema::team_budget_path(auction_id, team_key),
                Some(json!(team.budget)),
            ),
            (
                schema::team_player_path(auction_id, team_key, player.id),
                Some(serde_json::to_value(PlayerNode::from(&assigned))?),
            ),
        ]
        .into_iter()
        .collect();
        self.db.update(changes).await;
        Ok(true)
    }

    /// Remove a player's assignment, restoring the owning team's budget.
    /// The owning team is located by scanning rosters for the player id.
    pub async fn unassign_player(&self, auction_id: &str, player_id: PlayerId) -> Result<bool> {
        let Some(mut auction) = self.auction_by_id(auction_id).await? else {
            return Ok(false);
        };
        let Some(team) = auction
            .teams
            .iter_mut()
            .find(|t| t.find_player(player_id).is_some())
        else {
            return Ok(false);
        };
        if team.remove_player(player_id).is_none() {
            return Ok(false);
        }

        let team_key = team.key.clone();
        let changes: BTreeMap<String, Option<Value>> = [
            (
                schema::team_budget_path(auction_id, &team_key),
                Some(json!(team.budget)),
            ),
            (
                schema::team_player_path(auction_id, &team_key, player_id),
                None,
            ),
        ]
        .into_iter()
        .collect();
        self.db.update(changes).await;
        Ok(true)
    }

    /// Correct a recorded purchase price, adjusting the team budget by the
    /// delta. Reads the raw tree directly rather than reconstructing the
    /// object graph, and rejects deltas the remaining budget cannot cover.
    pub async fn update_player_price(
        &self,
        auction_id: &str,
        team_key: &str,
        player_id: PlayerId,
        new_price: u32,
    ) -> Result<bool> {
        let Some(raw_team) = self.db.get(&schema::team_path(auction_id, team_key)).await else {
            return Ok(false);
        };
        let team: TeamNode = match serde_json::from_value(raw_team) {
            Ok(t) => t,
            Err(e) => {
                return Err(AuctionError::MalformedNode {
                    path: schema::team_path(auction_id, team_key),
                    reason: e.to_string(),
                })
            }
        };

        let Some(raw_player) = team.calciatori.get(&schema::player_key(player_id)) else {
            return Ok(false);
        };
        let old_price = raw_player
            .get("prezzoAcquisto")
            .and_then(Value::as_u64)
            .unwrap_or(0) as i64;

        let delta = new_price as i64 - old_price;
        if delta > team.budget as i64 {
            return Ok(false);
        }
        let new_budget = (team.budget as i64 - delta) as u32;

        let changes: BTreeMap<String, Option<Value>> = [
            (
                schema::team_budget_path(auction_id, team_key),
                Some(json!(new_budget)),
            ),
            (
                schema::team_player_price_path(auction_id, team_key, player_id),
                Some(json!(new_price)),
            ),
        ]
        .into_iter()
        .collect();
        self.db.update(changes).await;
        Ok(true)
    }

    // ---- Catalog ----

    /// Persist the flat player reference data under `/calciatori`.
    pub async fn save_catalog(&self, players: &[Player]) -> Result<()> {
        let mut map = serde_json::Map::new();
        for player in players {
            map.insert(
                schema::player_key(player.id),
                serde_json::to_value(PlayerNode::from(player))?,
            );
        }
        self.db.set(schema::CATALOG_PATH, Value::Object(map)).await;
        tracing::info!("saved catalog with {} players", players.len());
        Ok(())
    }

    /// Load the flat catalog. Malformed entries are logged and skipped.
    pub async fn load_catalog(&self) -> Vec<Player> {
        let Some(raw) = self.db.get(schema::CATALOG_PATH).await else {
            return Vec::new();
        };
        let Some(map) = raw.as_object() else {
            return Vec::new();
        };

        let mut players: Vec<Player> = map
            .iter()
            .filter_map(|(key, value)| {
                let node: PlayerNode = match serde_json::from_value(value.clone()) {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!("skipping catalog entry {}: {}", key, e);
                        return None;
                    }
                };
                match node.into_player() {
                    Ok(p) => Some(p),
                    Err(reason) => {
                        tracing::warn!("skipping catalog entry {}: {}", key, reason);
                        None
                    }
                }
            })
            .collect();
        players.sort_by_key(|p| p.id);
        players
    }
}

fn team_to_node(team: &crate::model::Team) -> TeamNode {
    TeamNode {
        nome: team.name.clone(),
        budget: team.budget,
        budget_iniziale: team.initial_budget,
        user_id: team.owner_id.clone().unwrap_or_default(),
        user_email: team.owner_email.clone().unwrap_or_default(),
        calciatori: team
            .players
            .iter()
            .map(|p| {
                (
                    schema::player_key(p.id),
                    serde_json::to_value(PlayerNode::from(p)).unwrap_or(Value::Null),
                )
            })
            .collect(),
    }
}

async fn reload_auction(db: &Rtdb, auction_id: &str) -> Option<Auction> {
    let raw = db.get(&schema::auction_path(auction_id)).await?;
    match reconstruct::auction_from_value(&raw) {
        Ok(rec) => {
            log_skipped(&rec.skipped);
            Some(rec.auction)
        }
        Err(e) => {
            tracing::warn!("failed to reconstruct auction {}: {}", auction_id, e);
            None
        }
    }
}

fn log_skipped(skipped: &[SkippedEntry]) {
    for entry in skipped {
        tracing::warn!(
            "skipped malformed entry at {}: {}",
            entry.path,
            entry.reason
        );
    }
}
