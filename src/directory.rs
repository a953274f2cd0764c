//! Auction directory: the lifecycle surface consumed by session handlers.
//!
//! A thin orchestration layer; every persistence decision lives in the
//! bridge. Kept separate so callers never touch store paths directly.

use std::sync::Arc;

use tokio::sync::watch;

use crate::bridge::join::{JoinOutcome, JoinRequest};
use crate::bridge::AuctionStore;
use crate::error::{AuctionError, Result};
use crate::export;
use crate::model::{Auction, Player};
use crate::types::PlayerId;

#[derive(Clone)]
pub struct AuctionDirectory {
    store: Arc<AuctionStore>,
}

impl AuctionDirectory {
    pub fn new(store: Arc<AuctionStore>) -> Self {
        AuctionDirectory { store }
    }

    pub async fn create(
        &self,
        name: &str,
        capacity: u32,
        credits_per_participant: u32,
        admin_id: &str,
        players: Vec<Player>,
    ) -> Result<Auction> {
        self.store
            .create_auction(name, capacity, credits_per_participant, admin_id, players)
            .await
    }

    pub async fn join(&self, request: JoinRequest) -> Result<JoinOutcome> {
        self.store.join_auction(request).await
    }

    pub async fn by_id(&self, auction_id: &str) -> Result<Option<Auction>> {
        self.store.auction_by_id(auction_id).await
    }

    pub async fn by_code(&self, invite_code: &str) -> Option<Auction> {
        self.store.auction_by_code(invite_code).await
    }

    pub async fn open(&self) -> Vec<Auction> {
        self.store.open_auctions().await
    }

    pub async fn mine(&self, user_id: &str) -> Vec<Auction> {
        self.store.auctions_for_user(user_id).await
    }

    pub async fn created_by_me(&self, user_id: &str) -> Vec<Auction> {
        self.store.auctions_created_by(user_id).await
    }

    pub async fn watch(&self, auction_id: &str) -> watch::Receiver<Option<Auction>> {
        self.store.watch_auction(auction_id).await
    }

    pub async fn update(&self, auction: &Auction) -> Result<()> {
        self.store.update_auction(auction).await
    }

    pub async fn set_active(&self, auction_id: &str, active: bool) -> Result<bool> {
        self.store.set_active(auction_id, active).await
    }

    pub async fn delete(&self, auction_id: &str) {
        self.store.delete_auction(auction_id).await
    }

    /// Account-removal cascade for an administrator.
    pub async fn delete_created_by(&self, user_id: &str) -> usize {
        self.store.delete_auctions_created_by(user_id).await
    }

    pub async fn assign(
        &self,
        auction_id: &str,
        player: &Player,
        team_key: &str,
        price: u32,
    ) -> Result<bool> {
        self.store
            .assign_player(auction_id, player, team_key, price)
            .await
    }

    pub async fn unassign(&self, auction_id: &str, player_id: PlayerId) -> Result<bool> {
        self.store.unassign_player(auction_id, player_id).await
    }

    pub async fn update_price(
        &self,
        auction_id: &str,
        team_key: &str,
        player_id: PlayerId,
        new_price: u32,
    ) -> Result<bool> {
        self.store
            .update_player_price(auction_id, team_key, player_id, new_price)
            .await
    }

    /// Roster dump for an auction.
    pub async fn export_rosters(&self, auction_id: &str) -> Result<String> {
        let auction = self
            .store
            .auction_by_id(auction_id)
            .await?
            .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))?;
        Ok(export::rosters_csv(&auction))
    }

    pub async fn save_catalog(&self, players: &[Player]) -> Result<()> {
        self.store.save_catalog(players).await
    }

    pub async fn catalog(&self) -> Vec<Player> {
        self.store.load_catalog().await
    }
}
