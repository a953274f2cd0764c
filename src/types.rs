use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type AuctionId = String;
pub type TeamKey = String;
pub type UserId = String;
pub type PlayerId = u32;

/// Roster role of a player, persisted as its single-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "P")]
    Goalkeeper,
    #[serde(rename = "D")]
    Defender,
    #[serde(rename = "C")]
    Midfielder,
    #[serde(rename = "A")]
    Attacker,
}

impl Role {
    /// Roster iteration order: goalkeepers first, attackers last.
    pub const ALL: [Role; 4] = [
        Role::Goalkeeper,
        Role::Defender,
        Role::Midfielder,
        Role::Attacker,
    ];

    pub fn from_code(code: &str) -> Option<Role> {
        match code {
            "P" => Some(Role::Goalkeeper),
            "D" => Some(Role::Defender),
            "C" => Some(Role::Midfielder),
            "A" => Some(Role::Attacker),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Role::Goalkeeper => "P",
            Role::Defender => "D",
            Role::Midfielder => "C",
            Role::Attacker => "A",
        }
    }

    /// Italian display name, as shown in rosters and exports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Goalkeeper => "Portiere",
            Role::Defender => "Difensore",
            Role::Midfielder => "Centrocampista",
            Role::Attacker => "Attaccante",
        }
    }

    /// Maximum roster slots per role.
    pub fn max_slots(&self) -> usize {
        match self {
            Role::Goalkeeper => 3,
            Role::Defender => 8,
            Role::Midfielder => 8,
            Role::Attacker => 6,
        }
    }

    pub fn sort_order(&self) -> usize {
        match self {
            Role::Goalkeeper => 0,
            Role::Defender => 1,
            Role::Midfielder => 2,
            Role::Attacker => 3,
        }
    }
}

/// Character set for invite codes (uppercase letters and digits)
const INVITE_CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_CODE_LENGTH: usize = 6;

/// Generate a random 6-character invite code.
pub fn generate_invite_code() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..INVITE_CODE_LENGTH)
        .map(|_| INVITE_CODE_CHARS[rng.random_range(0..INVITE_CODE_CHARS.len())] as char)
        .collect()
}

/// Invite codes are matched case-insensitively; the canonical form is uppercase.
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_code(role.code()), Some(role));
        }
        assert_eq!(Role::from_code("X"), None);
        assert_eq!(Role::from_code(""), None);
    }

    #[test]
    fn role_caps() {
        assert_eq!(Role::Goalkeeper.max_slots(), 3);
        assert_eq!(Role::Defender.max_slots(), 8);
        assert_eq!(Role::Midfielder.max_slots(), 8);
        assert_eq!(Role::Attacker.max_slots(), 6);
    }

    #[test]
    fn invite_code_shape() {
        let code = generate_invite_code();
        assert_eq!(code.len(), 6);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn invite_code_normalization() {
        assert_eq!(normalize_invite_code(" ab12cd "), "AB12CD");
        assert_eq!(normalize_invite_code("AB12CD"), "AB12CD");
    }

    #[test]
    fn role_serde_uses_single_letter() {
        assert_eq!(serde_json::to_string(&Role::Goalkeeper).unwrap(), "\"P\"");
        let role: Role = serde_json::from_str("\"A\"").unwrap();
        assert_eq!(role, Role::Attacker);
    }
}
