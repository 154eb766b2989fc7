//! Keyring integration for secure API key storage
//! Falls back to environment variables if the keyring is unavailable

use anyhow::{bail, Context, Result};

const SERVICE_NAME: &str = "voiceline";

/// Provider names with a stored credential: `llm`, `transcription`,
/// `speech`, `speech-alt`, `backend`.
pub const KNOWN_PROVIDERS: [&str; 5] = ["llm", "transcription", "speech", "speech-alt", "backend"];

fn entry_name(provider: &str) -> String {
    format!("{provider}-api-key")
}

fn env_name(provider: &str) -> String {
    format!(
        "VOICELINE_{}_API_KEY",
        provider.to_uppercase().replace('-', "_")
    )
}

/// Get a provider API key: keyring first, environment fallback
pub fn provider_key(provider: &str) -> Result<String> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, &entry_name(provider)) {
        if let Ok(key) = entry.get_password() {
            return Ok(key);
        }
    }

    let var = env_name(provider);
    match std::env::var(&var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => bail!(
            "No API key for '{provider}'. Run 'voiceline config --set-key {provider} <KEY>' or set {var}."
        ),
    }
}

/// Store a provider API key in the OS keyring
pub fn set_provider_key(provider: &str, key: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE_NAME, &entry_name(provider))
        .context("Failed to open keyring entry")?;
    entry
        .set_password(key)
        .context("Failed to store key in keyring")?;
    Ok(())
}

/// Delete a provider API key from the OS keyring
pub fn delete_provider_key(provider: &str) -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, &entry_name(provider)) {
        let _ = entry.delete_credential();
    }
    Ok(())
}
