//! WebSocket sessions: each connected browser tab gets one socket, an opaque
//! identity from its query parameters, and a live view of at most one auction
//! at a time.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::watch;

use crate::catalog;
use crate::directory::AuctionDirectory;
use crate::error::AuctionError;
use crate::model::Auction;
use crate::protocol::{AuctionSummary, ClientMessage, ServerMessage};
use crate::types::AuctionId;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// Identity of one connected session, as supplied by the external identity
/// provider. Treated as opaque strings throughout.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub user_id: String,
    pub email: String,
}

impl SessionIdentity {
    fn from_query(params: &WsQuery) -> Self {
        SessionIdentity {
            // Anonymous sessions still need a stable key for join locks
            user_id: params
                .user_id
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| ulid::Ulid::new().to_string()),
            email: params.email.clone().unwrap_or_default(),
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(directory): State<AuctionDirectory>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: user_id={:?}", params.user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, params, directory))
}

/// Handle one WebSocket connection until it closes.
async fn handle_socket(socket: WebSocket, params: WsQuery, directory: AuctionDirectory) {
    let (mut sender, mut receiver) = socket.split();
    let identity = SessionIdentity::from_query(&params);
    tracing::info!("WebSocket connected: user {}", identity.user_id);

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        user_id: identity.user_id.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    // The session's live view: at most one subscribed auction
    let mut auction_rx: Option<watch::Receiver<Option<Auction>>> = None;
    let mut subscribed_id: Option<AuctionId> = None;

    loop {
        tokio::select! {
            // Push updates from the subscribed auction's watch stream
            changed = async {
                match &mut auction_rx {
                    Some(rx) => rx.changed().await.ok(),
                    None => {
                        // No subscription: wait forever
                        std::future::pending::<Option<()>>().await
                    }
                }
            } => {
                let Some(()) = changed else {
                    // Feeding task went away; drop the stale subscription
                    auction_rx = None;
                    subscribed_id = None;
                    continue;
                };
                let state = auction_rx
                    .as_mut()
                    .map(|rx| rx.borrow_and_update().clone())
                    .unwrap_or(None);
                let message = match state {
                    Some(auction) => ServerMessage::AuctionState { auction },
                    None => {
                        let gone = subscribed_id.take().unwrap_or_default();
                        auction_rx = None;
                        ServerMessage::AuctionGone { auction_id: gone }
                    }
                };
                if let Ok(json) = serde_json::to_string(&message) {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }

            // Client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("received message: {}", text);
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { auction_id }) => {
                                let mut rx = directory.watch(&auction_id).await;
                                let initial = rx.borrow_and_update().clone();
                                let response = match initial {
                                    Some(auction) => {
                                        subscribed_id = Some(auction_id);
                                        auction_rx = Some(rx);
                                        ServerMessage::AuctionState { auction }
                                    }
                                    None => ServerMessage::Error {
                                        code: "NOT_FOUND".to_string(),
                                        msg: "Asta non trovata".to_string(),
                                    },
                                };
                                if let Ok(json) = serde_json::to_string(&response) {
                                    if sender.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handle_message(client_msg, &identity, &directory).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed for user {}", identity.user_id);
}

fn error(code: &str, msg: impl Into<String>) -> Option<ServerMessage> {
    Some(ServerMessage::Error {
        code: code.to_string(),
        msg: msg.into(),
    })
}

fn op_result(op: &str, success: bool) -> Option<ServerMessage> {
    Some(ServerMessage::OpResult {
        op: op.to_string(),
        success,
    })
}

/// Load an auction and fail with a uniform error when it is missing or the
/// store read blows up.
async fn load_auction(
    directory: &AuctionDirectory,
    auction_id: &str,
) -> Result<Auction, ServerMessage> {
    match directory.by_id(auction_id).await {
        Ok(Some(auction)) => Ok(auction),
        Ok(None) => Err(ServerMessage::Error {
            code: "NOT_FOUND".to_string(),
            msg: "Asta non trovata".to_string(),
        }),
        Err(e) => Err(ServerMessage::Error {
            code: "STORE_ERROR".to_string(),
            msg: e.to_string(),
        }),
    }
}

/// Macro to check that the session user administers the auction
macro_rules! require_admin {
    ($auction:expr, $identity:expr, $action:expr) => {
        if $auction.admin_id != $identity.user_id {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Solo l'amministratore può {}", $action),
            });
        }
    };
}

/// Handle client messages and return the optional direct response.
/// `Subscribe` is handled by the socket loop, which owns the live view.
pub async fn handle_message(
    msg: ClientMessage,
    identity: &SessionIdentity,
    directory: &AuctionDirectory,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Subscribe { .. } => None,

        ClientMessage::CreateAuction {
            name,
            capacity,
            credits_per_participant,
        } => {
            match directory
                .create(
                    &name,
                    capacity,
                    credits_per_participant,
                    &identity.user_id,
                    Vec::new(),
                )
                .await
            {
                Ok(auction) => Some(ServerMessage::AuctionCreated { auction }),
                Err(e) => error("STORE_ERROR", e.to_string()),
            }
        }

        ClientMessage::JoinAuction {
            invite_code,
            team_name,
        } => {
            let request = crate::bridge::join::JoinRequest {
                invite_code,
                team_name,
                user_id: identity.user_id.clone(),
                user_email: identity.email.clone(),
            };
            match directory.join(request).await {
                Ok(outcome) => Some(ServerMessage::JoinResult(outcome)),
                Err(AuctionError::JoinTimeout) => {
                    error("JOIN_TIMEOUT", "Tempo scaduto durante l'iscrizione, riprova")
                }
                Err(e) => error("STORE_ERROR", e.to_string()),
            }
        }

        ClientMessage::GetByCode { invite_code } => match directory.by_code(&invite_code).await {
            Some(auction) => Some(ServerMessage::AuctionState { auction }),
            None => error("NOT_FOUND", "Codice asta non valido"),
        },

        ClientMessage::ListOpen => Some(summaries(directory.open().await)),
        ClientMessage::ListMine => Some(summaries(directory.mine(&identity.user_id).await)),
        ClientMessage::ListCreated => {
            Some(summaries(directory.created_by_me(&identity.user_id).await))
        }

        ClientMessage::AssignPlayer {
            auction_id,
            team_key,
            player,
            price,
        } => {
            let auction = match load_auction(directory, &auction_id).await {
                Ok(a) => a,
                Err(e) => return Some(e),
            };
            require_admin!(auction, identity, "assegnare i calciatori");
            match directory.assign(&auction_id, &player, &team_key, price).await {
                Ok(success) => op_result("assign_player", success),
                Err(e) => error("STORE_ERROR", e.to_string()),
            }
        }

        ClientMessage::UnassignPlayer {
            auction_id,
            player_id,
        } => {
            let auction = match load_auction(directory, &auction_id).await {
                Ok(a) => a,
                Err(e) => return Some(e),
            };
            require_admin!(auction, identity, "rimuovere le assegnazioni");
            match directory.unassign(&auction_id, player_id).await {
                Ok(success) => op_result("unassign_player", success),
                Err(e) => error("STORE_ERROR", e.to_string()),
            }
        }

        ClientMessage::UpdatePrice {
            auction_id,
            team_key,
            player_id,
            new_price,
        } => {
            let auction = match load_auction(directory, &auction_id).await {
                Ok(a) => a,
                Err(e) => return Some(e),
            };
            // Price corrections are open to the team's owner as well
            let owns_team = auction
                .team_by_key(&team_key)
                .map(|t| t.owner_id.as_deref() == Some(identity.user_id.as_str()))
                .unwrap_or(false);
            if auction.admin_id != identity.user_id && !owns_team {
                return error("UNAUTHORIZED", "Non puoi modificare questo prezzo");
            }
            match directory
                .update_price(&auction_id, &team_key, player_id, new_price)
                .await
            {
                Ok(success) => op_result("update_price", success),
                Err(e) => error("STORE_ERROR", e.to_string()),
            }
        }

        ClientMessage::SetActive { auction_id, active } => {
            let auction = match load_auction(directory, &auction_id).await {
                Ok(a) => a,
                Err(e) => return Some(e),
            };
            require_admin!(auction, identity, "attivare o disattivare l'asta");
            match directory.set_active(&auction_id, active).await {
                Ok(success) => op_result("set_active", success),
                Err(e) => error("STORE_ERROR", e.to_string()),
            }
        }

        ClientMessage::DeleteAuction { auction_id } => {
            let auction = match load_auction(directory, &auction_id).await {
                Ok(a) => a,
                Err(e) => return Some(e),
            };
            require_admin!(auction, identity, "eliminare l'asta");
            directory.delete(&auction_id).await;
            op_result("delete_auction", true)
        }

        ClientMessage::DeleteMyAuctions => {
            let removed = directory.delete_created_by(&identity.user_id).await;
            tracing::info!(
                "account cascade: removed {} auctions for {}",
                removed,
                identity.user_id
            );
            op_result("delete_my_auctions", true)
        }

        ClientMessage::ExportRosters { auction_id } => {
            let auction = match load_auction(directory, &auction_id).await {
                Ok(a) => a,
                Err(e) => return Some(e),
            };
            require_admin!(auction, identity, "esportare le rose");
            match directory.export_rosters(&auction_id).await {
                Ok(csv) => Some(ServerMessage::RostersExport { auction_id, csv }),
                Err(AuctionError::AuctionNotFound(_)) => error("NOT_FOUND", "Asta non trovata"),
                Err(e) => error("STORE_ERROR", e.to_string()),
            }
        }

        ClientMessage::SearchCatalog {
            query,
            role,
            only_available,
        } => {
            let players = directory.catalog().await;
            let mut selected: Vec<&crate::model::Player> = match query.as_deref() {
                Some(q) => catalog::search(&players, q),
                None => players.iter().collect(),
            };
            if let Some(role) = role {
                selected.retain(|p| p.role == role);
            }
            if only_available {
                selected.retain(|p| !p.assigned);
            }
            Some(ServerMessage::CatalogPlayers {
                players: selected.into_iter().cloned().collect(),
            })
        }
    }
}

fn summaries(auctions: Vec<Auction>) -> ServerMessage {
    ServerMessage::AuctionList {
        auctions: auctions.iter().map(AuctionSummary::from).collect(),
    }
}
