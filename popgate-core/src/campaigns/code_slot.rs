use std::fmt;

/// Where a discount code for one issuance lives in the campaign cache.
///
/// Shared codes sit on the reward itself (or on the tier). Identity-bound
/// codes (email-locked or single-use) are kept per shopper identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodeSlot {
    Shared { tier: Option<usize> },
    Identity { identity: String, tier: Option<usize> },
}

impl CodeSlot {
    pub fn shared(tier: Option<usize>) -> Self {
        CodeSlot::Shared { tier }
    }

    pub fn for_email(email: &str, tier: Option<usize>) -> Self {
        CodeSlot::Identity {
            identity: format!("email:{}", email.trim().to_lowercase()),
            tier,
        }
    }

    pub fn for_session(session_id: &str, tier: Option<usize>) -> Self {
        CodeSlot::Identity {
            identity: format!("session:{session_id}"),
            tier,
        }
    }

    pub fn tier(&self) -> Option<usize> {
        match self {
            CodeSlot::Shared { tier } | CodeSlot::Identity { tier, .. } => *tier,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, CodeSlot::Shared { .. })
    }

    /// Key into `Campaign::issued_codes`, `None` for shared slots.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            CodeSlot::Shared { .. } => None,
            CodeSlot::Identity { identity, tier } => Some(match tier {
                Some(tier) => format!("{identity}#{tier}"),
                None => format!("{identity}#shared"),
            }),
        }
    }
}

impl fmt::Display for CodeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeSlot::Shared { tier: Some(tier) } => write!(f, "shared tier {tier}"),
            CodeSlot::Shared { tier: None } => write!(f, "shared"),
            CodeSlot::Identity { .. } => {
                write!(f, "{}", self.cache_key().unwrap_or_default())
            }
        }
    }
}
