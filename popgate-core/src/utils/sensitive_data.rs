//! Helpers for keeping tokens and shopper emails out of logs

/// Mask a secret while keeping its tail recognizable
///
/// - For values < 12 chars: last 2 chars visible, rest masked
/// - For values >= 12 chars: last 4 chars visible, rest masked
/// - Dashes ('-') stay in place
pub fn mask_sensitive_value(value: &str) -> String {
    let value_len = value.chars().count();
    let visible_suffix_len = if value_len >= 12 { 4 } else { 2.min(value_len) };
    let prefix_len = value_len.saturating_sub(visible_suffix_len);

    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i < prefix_len && c != '-' { '*' } else { c })
        .collect()
}

/// Mask the local part of an email address: `jane.doe@shop.com` becomes
/// `j*******@shop.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let mut chars = local.chars();
            match chars.next() {
                Some(first) => format!("{first}{}@{domain}", "*".repeat(chars.count())),
                None => format!("@{domain}"),
            }
        }
        None => mask_sensitive_value(email),
    }
}
