//! Player catalog: parsing the import pipeline's output records and the
//! read-side queries over the resulting reference data.
//!
//! The import artifact is a JSON array whose records drift between three
//! shapes: canonical spreadsheet column names (`Nome`, `Qt.A`, ...), the
//! processed camelCase names (`nome`, `quotazioneAttuale`, ...), or plain
//! positional arrays in spreadsheet column order. Numeric cells may arrive as
//! numbers or as strings; both are accepted, anything unparsable counts as 0.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Result;
use crate::model::Player;
use crate::types::{PlayerId, Role};

/// One raw record from the import artifact.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ImportRecord {
    Named(NamedRecord),
    Positional(Vec<Value>),
}

/// A record keyed by column name, in either header dialect.
#[derive(Debug, Deserialize)]
pub struct NamedRecord {
    #[serde(default, alias = "Id", deserialize_with = "flexible_u32")]
    pub id: u32,
    #[serde(default, alias = "R", alias = "codiceRuolo")]
    pub codice_ruolo: String,
    #[serde(default, alias = "RM", alias = "ruoloMantra")]
    pub ruolo_mantra: String,
    #[serde(default, alias = "Nome")]
    pub nome: String,
    #[serde(default, alias = "Squadra")]
    pub squadra: String,
    #[serde(
        default,
        alias = "Qt.A",
        alias = "quotazioneAttuale",
        deserialize_with = "flexible_f64"
    )]
    pub quotazione_attuale: f64,
    #[serde(
        default,
        alias = "Qt.I",
        alias = "quotazioneIniziale",
        deserialize_with = "flexible_f64"
    )]
    pub quotazione_iniziale: f64,
    #[serde(
        default,
        alias = "Diff.",
        alias = "differenza",
        deserialize_with = "flexible_f64"
    )]
    pub differenza: f64,
    #[serde(
        default,
        alias = "Qt.A M",
        alias = "quotazioneAttualeMercato",
        deserialize_with = "flexible_f64"
    )]
    pub quotazione_attuale_mercato: f64,
    #[serde(
        default,
        alias = "Qt.I M",
        alias = "quotazioneInizialeMercato",
        deserialize_with = "flexible_f64"
    )]
    pub quotazione_iniziale_mercato: f64,
    #[serde(
        default,
        alias = "Diff.M",
        alias = "differenzaMercato",
        deserialize_with = "flexible_f64"
    )]
    pub differenza_mercato: f64,
    #[serde(
        default,
        alias = "FVM",
        alias = "fairMarketValue",
        deserialize_with = "flexible_f64"
    )]
    pub fair_market_value: f64,
    #[serde(
        default,
        alias = "FVM M",
        alias = "fairMarketValueMercato",
        deserialize_with = "flexible_f64"
    )]
    pub fair_market_value_mercato: f64,
}

/// Spreadsheet column order for positional records.
const POSITIONAL_COLUMNS: usize = 13;

impl ImportRecord {
    /// Build the domain player. `None` for records with an empty name or an
    /// unusable role code; `fallback_id` substitutes a missing id, numbered
    /// from the record's position like the extract script does.
    pub fn into_player(self, fallback_id: PlayerId) -> Option<Player> {
        let named = match self {
            ImportRecord::Named(named) => named,
            ImportRecord::Positional(cells) => positional_to_named(&cells),
        };

        if named.nome.trim().is_empty() {
            return None;
        }
        let role = Role::from_code(named.codice_ruolo.trim())?;
        let id = if named.id == 0 { fallback_id } else { named.id };

        let mut player = Player::new(id, named.nome.trim(), named.squadra.trim(), role);
        player.role_detail = named.ruolo_mantra.trim().to_string();
        player.current_value = named.quotazione_attuale;
        player.base_value = named.quotazione_iniziale;
        player.delta = named.differenza;
        player.market_current_value = named.quotazione_attuale_mercato;
        player.market_base_value = named.quotazione_iniziale_mercato;
        player.market_delta = named.differenza_mercato;
        player.fair_value = named.fair_market_value;
        player.market_fair_value = named.fair_market_value_mercato;
        Some(player)
    }
}

fn positional_to_named(cells: &[Value]) -> NamedRecord {
    let mut padded = cells.to_vec();
    padded.resize(POSITIONAL_COLUMNS, Value::Null);
    NamedRecord {
        id: coerce_f64(&padded[0]) as u32,
        codice_ruolo: coerce_string(&padded[1]),
        ruolo_mantra: coerce_string(&padded[2]),
        nome: coerce_string(&padded[3]),
        squadra: coerce_string(&padded[4]),
        quotazione_attuale: coerce_f64(&padded[5]),
        quotazione_iniziale: coerce_f64(&padded[6]),
        differenza: coerce_f64(&padded[7]),
        quotazione_attuale_mercato: coerce_f64(&padded[8]),
        quotazione_iniziale_mercato: coerce_f64(&padded[9]),
        differenza_mercato: coerce_f64(&padded[10]),
        fair_market_value: coerce_f64(&padded[11]),
        fair_market_value_mercato: coerce_f64(&padded[12]),
    }
}

fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value))
}

fn flexible_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value) as u32)
}

/// Parse a whole import artifact. Unusable records are logged and skipped;
/// only a structurally invalid document is an error.
pub fn parse_catalog(data: &str) -> Result<Vec<Player>> {
    let records: Vec<ImportRecord> = serde_json::from_str(data)?;
    let total = records.len();

    let players: Vec<Player> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let player = record.into_player(index as PlayerId + 1);
            if player.is_none() {
                tracing::warn!("skipping unusable catalog record at index {}", index);
            }
            player
        })
        .collect();

    tracing::info!("parsed catalog: {} players from {} records", players.len(), total);
    Ok(players)
}

// ---- Read-side queries ----

/// Case-insensitive substring search over player and club names.
pub fn search<'a>(players: &'a [Player], query: &str) -> Vec<&'a Player> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return players.iter().collect();
    }
    players
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&term) || p.club.to_lowercase().contains(&term)
        })
        .collect()
}

pub fn by_role(players: &[Player], role: Role) -> Vec<&Player> {
    players.iter().filter(|p| p.role == role).collect()
}

pub fn by_id(players: &[Player], id: PlayerId) -> Option<&Player> {
    players.iter().find(|p| p.id == id)
}

/// Players not yet bought by any team.
pub fn available(players: &[Player]) -> Vec<&Player> {
    players.iter().filter(|p| !p.assigned).collect()
}
