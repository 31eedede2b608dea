//! Discount code strings handed to shoppers.

use uuid::Uuid;

/// Uppercase letters and digits without the easily confused `0 O 1 I L`
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const RANDOM_PART_LEN: usize = 8;

/// `<prefix><8 chars>`, or `<prefix>T<tier>-<8 chars>` for tiered codes.
pub fn generate_code(prefix: &str, tier: Option<usize>) -> String {
    let random = random_part();
    match tier {
        Some(tier) => format!("{prefix}T{tier}-{random}"),
        None => format!("{prefix}{random}"),
    }
}

fn random_part() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(RANDOM_PART_LEN)
        .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
        .collect()
}
