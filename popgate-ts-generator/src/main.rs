/*!
 * TypeScript bindings for the storefront popup script
 *
 * Only depends on popgate-types, so it builds without the server stack.
 *
 * Usage: cargo run -p popgate-ts-generator [output dir]
 */

use std::path::{Path, PathBuf};

use popgate_types::{ts_rs::TS, *};

/// `<workspace>/popup/src/generated` unless a directory is passed.
fn export_dir() -> PathBuf {
    std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir
            .parent()
            .unwrap_or(manifest_dir)
            .join("popup/src/generated")
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let export_dir = export_dir();
    std::fs::create_dir_all(&export_dir)?;

    println!("Generating TypeScript bindings for the popup API...");

    // Issuance
    IssueDiscountRequest::export_all_to(&export_dir)?;
    IssueDiscountResponse::export_all_to(&export_dir)?;
    ErrorResponse::export_all_to(&export_dir)?;

    // Challenge
    ChallengeRequest::export_all_to(&export_dir)?;
    ChallengeResponse::export_all_to(&export_dir)?;

    ServerInfo::export_all_to(&export_dir)?;

    println!("Generated files in {}:", export_dir.display());

    let mut entries: Vec<_> = std::fs::read_dir(&export_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == "ts")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        println!("   - {}", entry.file_name().to_string_lossy());
    }

    Ok(())
}
