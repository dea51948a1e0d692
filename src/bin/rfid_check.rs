use std::time::Duration;

use oioi_cpo_sync::adapters::oioi_client::{OioiApi, OioiHttpClient};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    let _ = dotenvy::dotenv();

    let rfid = match std::env::args().nth(1) {
        Some(value) => value,
        None => {
            eprintln!("usage: rfid_check <rfid>");
            std::process::exit(2);
        }
    };

    let api_url = require_env("OIOI_API_URL");
    let api_key = require_env("OIOI_API_KEY");
    let timeout = std::env::var("REQUEST_TIMEOUT_S")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);

    let client = match OioiHttpClient::new(&api_url, &api_key, timeout) {
        Ok(client) => client,
        Err(error) => {
            eprintln!("cannot build partner client: {error}");
            std::process::exit(2);
        }
    };

    let response = match client.rfid_verify(&rfid) {
        Ok(response) => response,
        Err(error) => {
            eprintln!("invalid request: {error}");
            std::process::exit(2);
        }
    };

    println!(
        "{} -> code {} ({:?}): {}",
        rfid.trim(),
        response.code,
        response.outcome,
        response.message
    );

    if !response.is_success() {
        std::process::exit(1);
    }
}

fn require_env(key: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            eprintln!("{key} is required");
            std::process::exit(2);
        }
    }
}
