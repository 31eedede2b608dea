use popgate_types::DeliveryMode;

use crate::campaigns::RewardValue;

/// "10% off your order", "$5 off your order", "free shipping on your order"
pub fn describe_reward(reward: RewardValue, currency_symbol: &str) -> String {
    match reward {
        RewardValue::Percentage(value) => format!("{}% off your order", format_number(value)),
        RewardValue::FixedAmount(value) => {
            format!("{}{} off your order", currency_symbol, format_amount(value))
        }
        RewardValue::FreeShipping => "free shipping on your order".to_string(),
    }
}

/// Shopper-facing sentence for a successful issuance.
pub fn issuance_message(
    code: &str,
    reward: RewardValue,
    delivery_mode: DeliveryMode,
    currency_symbol: &str,
) -> String {
    let description = describe_reward(reward, currency_symbol);
    match delivery_mode {
        DeliveryMode::AutoApplyOnly => {
            format!("Your discount has been applied: {description}.")
        }
        _ => format!("Use code {code} at checkout for {description}."),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        let s = format!("{value:.2}");
        s.trim_end_matches('0').to_string()
    }
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
