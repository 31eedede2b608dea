/*!
 * Wire types for the storefront popup script
 *
 * Everything in here crosses the HTTP boundary between the popup running on
 * the shop's storefront and the popgate server. The crate stays free of
 * server dependencies so the TypeScript generator compiles quickly.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

pub use serde;
pub use ts_rs;

/// How the popup hands the discount to the shopper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DeliveryMode {
    /// Reveal the code inside the popup
    #[default]
    ShowCode,
    /// Try to auto-apply, show the code if that fails
    ShowCodeFallback,
    /// Only auto-apply, never reveal the code
    AutoApplyOnly,
    /// Reveal the code in the popup, but lock it to the captured email
    ShowInPopupAuthorizedOnly,
}

impl DeliveryMode {
    pub fn is_email_locked(&self) -> bool {
        matches!(self, DeliveryMode::ShowInPopupAuthorizedOnly)
    }

    pub fn uses_auto_apply(&self) -> bool {
        matches!(
            self,
            DeliveryMode::AutoApplyOnly | DeliveryMode::ShowCodeFallback
        )
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::ShowCode => write!(f, "show_code"),
            DeliveryMode::ShowCodeFallback => write!(f, "show_code_fallback"),
            DeliveryMode::AutoApplyOnly => write!(f, "auto_apply_only"),
            DeliveryMode::ShowInPopupAuthorizedOnly => write!(f, "show_in_popup_authorized_only"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    pub variant_id: String,
    pub quantity: u32,
}

/// Body of `POST /api/v1/storefront/discounts/issue`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct IssueDiscountRequest {
    pub campaign_id: String,
    pub session_id: String,
    pub challenge_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_subtotal_cents: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,
}

/// Successful issuance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct IssueDiscountResponse {
    pub success: bool,
    pub discount_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_id: Option<String>,
    pub is_new_discount: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_used: Option<u32>,
    pub message: String,
    pub delivery_mode: DeliveryMode,
    /// Storefront path that applies the code to the cart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_apply_path: Option<String>,
}

/// Failure body shared by every storefront and campaign route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[ts(export)]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable, snake_case error kind
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Body of `POST /api/v1/storefront/challenge`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChallengeRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChallengeResponse {
    pub challenge_token: String,
    /// Unix timestamp (seconds) after which the token is rejected
    #[ts(type = "number")]
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[ts(export)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_request_uses_camel_case() {
        let json = serde_json::json!({
            "campaignId": "c1",
            "sessionId": "s1",
            "challengeToken": "t",
            "cartSubtotalCents": 7500,
            "lineItems": [{"variantId": "v1", "quantity": 2}]
        });
        let request: IssueDiscountRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.campaign_id, "c1");
        assert_eq!(request.cart_subtotal_cents, Some(7500));
        assert_eq!(request.email, None);
        assert_eq!(request.line_items.unwrap()[0].quantity, 2);
    }

    #[test]
    fn test_issue_request_rejects_missing_session() {
        let json = serde_json::json!({
            "campaignId": "c1",
            "challengeToken": "t"
        });
        assert!(serde_json::from_value::<IssueDiscountRequest>(json).is_err());
    }

    #[test]
    fn test_response_omits_absent_tier() {
        let response = IssueDiscountResponse {
            success: true,
            discount_code: "SAVE10".to_string(),
            discount_id: None,
            is_new_discount: false,
            tier_used: None,
            message: "10% off".to_string(),
            delivery_mode: DeliveryMode::ShowCode,
            auto_apply_path: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["discountCode"], "SAVE10");
        assert_eq!(value["deliveryMode"], "show_code");
        assert!(value.get("tierUsed").is_none());
    }

    #[test]
    fn test_delivery_mode_display_matches_serde() {
        for mode in [
            DeliveryMode::ShowCode,
            DeliveryMode::ShowCodeFallback,
            DeliveryMode::AutoApplyOnly,
            DeliveryMode::ShowInPopupAuthorizedOnly,
        ] {
            let serialized = serde_json::to_value(mode).unwrap();
            assert_eq!(serialized, mode.to_string());
        }
    }
}
