use serde::{Deserialize, Serialize};

use crate::bridge::join::JoinOutcome;
use crate::model::{Auction, Player};
use crate::types::{AuctionId, PlayerId, Role, TeamKey, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new auction administered by the connected user.
    CreateAuction {
        name: String,
        capacity: u32,
        credits_per_participant: u32,
    },
    /// Join an auction as a new team via invite code.
    JoinAuction {
        invite_code: String,
        team_name: String,
    },
    /// Switch this session's live view to the given auction.
    Subscribe { auction_id: AuctionId },
    GetByCode { invite_code: String },
    ListOpen,
    ListMine,
    ListCreated,
    /// Admin: assign a player to a team at a negotiated price.
    AssignPlayer {
        auction_id: AuctionId,
        team_key: TeamKey,
        player: Player,
        price: u32,
    },
    /// Admin: undo an assignment, restoring the team budget.
    UnassignPlayer {
        auction_id: AuctionId,
        player_id: PlayerId,
    },
    /// Admin or team owner: correct a recorded purchase price.
    UpdatePrice {
        auction_id: AuctionId,
        team_key: TeamKey,
        player_id: PlayerId,
        new_price: u32,
    },
    /// Admin: open or close the auction for joins and managed operations.
    SetActive {
        auction_id: AuctionId,
        active: bool,
    },
    /// Admin: delete the auction and everything under it.
    DeleteAuction { auction_id: AuctionId },
    /// Account removal: delete every auction this user administers.
    DeleteMyAuctions,
    /// Admin: flat roster dump of the auction.
    ExportRosters { auction_id: AuctionId },
    /// Query the player catalog, optionally filtered.
    SearchCatalog {
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        only_available: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        user_id: UserId,
        server_now: String,
    },
    /// Latest reconstructed state of the subscribed auction.
    AuctionState { auction: Auction },
    /// The subscribed auction was deleted.
    AuctionGone { auction_id: AuctionId },
    AuctionCreated { auction: Auction },
    AuctionList { auctions: Vec<AuctionSummary> },
    JoinResult(JoinOutcome),
    /// Uniform acknowledgement for managed operations: `success == false`
    /// means a domain rule refused the change, not a transport failure.
    OpResult { op: String, success: bool },
    RostersExport {
        auction_id: AuctionId,
        csv: String,
    },
    CatalogPlayers { players: Vec<Player> },
    Error { code: String, msg: String },
}

/// Listing projection of an auction, without teams and pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSummary {
    pub id: AuctionId,
    pub name: String,
    pub invite_code: String,
    pub capacity: u32,
    pub enrolled: u32,
    pub active: bool,
    pub admin_id: UserId,
    pub created_at: String,
}

impl From<&Auction> for AuctionSummary {
    fn from(a: &Auction) -> Self {
        AuctionSummary {
            id: a.id.clone(),
            name: a.name.clone(),
            invite_code: a.invite_code.clone(),
            capacity: a.capacity,
            enrolled: a.enrolled,
            active: a.active,
            admin_id: a.admin_id.clone(),
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t": "join_auction", "invite_code": "ab12cd", "team_name": "TeamB"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::JoinAuction { .. }));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"t": "search_catalog", "query": "napoli"}"#).unwrap();
        match msg {
            ClientMessage::SearchCatalog {
                query,
                role,
                only_available,
            } => {
                assert_eq!(query.as_deref(), Some("napoli"));
                assert!(role.is_none());
                assert!(!only_available);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn server_messages_carry_the_tag() {
        let json = serde_json::to_value(ServerMessage::OpResult {
            op: "assign_player".to_string(),
            success: true,
        })
        .unwrap();
        assert_eq!(json["t"], "op_result");
        assert_eq!(json["success"], true);
    }
}
