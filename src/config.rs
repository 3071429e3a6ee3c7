use tracing::warn;

use crate::db::Database;
use crate::models::{SearchMode, Settings};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;

pub const ENV_API_URL: &str = "ORDER_DESK_API_URL";
pub const ENV_CSRF_TOKEN: &str = "ORDER_DESK_CSRF_TOKEN";

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            csrf_token: None,
            per_page: DEFAULT_PER_PAGE,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            search_mode: SearchMode::Server,
        }
    }
}

/// Reads stored settings, falling back to defaults for missing or unreadable
/// values, then applies environment overrides.
pub fn load_settings(db: &Database) -> Settings {
    let mut settings = Settings::default();

    if let Some(url) = read(db, "api_base_url") {
        settings.api_base_url = url;
    }
    settings.csrf_token = read(db, "csrf_token");
    if let Some(per_page) = read(db, "per_page").and_then(|v| v.parse::<u32>().ok()) {
        settings.per_page = per_page.clamp(1, MAX_PER_PAGE);
    }
    if let Some(ms) = read(db, "search_debounce_ms").and_then(|v| v.parse::<u64>().ok()) {
        settings.search_debounce_ms = ms;
    }
    if let Some(mode) = read(db, "search_mode").and_then(|v| SearchMode::parse(&v)) {
        settings.search_mode = mode;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn save_settings(db: &Database, settings: &Settings) -> rusqlite::Result<()> {
    db.set_setting("api_base_url", &settings.api_base_url)?;
    match settings.csrf_token.as_deref() {
        Some(token) if !token.trim().is_empty() => db.set_setting("csrf_token", token)?,
        _ => db.delete_setting("csrf_token")?,
    }
    db.set_setting("per_page", &settings.per_page.to_string())?;
    db.set_setting("search_debounce_ms", &settings.search_debounce_ms.to_string())?;
    db.set_setting("search_mode", settings.search_mode.as_str())?;
    Ok(())
}

pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        settings.api_base_url = url.trim().to_string();
    }
    if let Some(token) = lookup(ENV_CSRF_TOKEN).filter(|v| !v.trim().is_empty()) {
        settings.csrf_token = Some(token.trim().to_string());
    }
}

fn read(db: &Database, key: &str) -> Option<String> {
    match db.get_setting(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(err) => {
            warn!(key, error = %err, "failed to read setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_store_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let settings = load_settings(&db);
        assert_eq!(settings.per_page, DEFAULT_PER_PAGE);
        assert_eq!(settings.search_debounce_ms, DEFAULT_SEARCH_DEBOUNCE_MS);
        assert_eq!(settings.search_mode, SearchMode::Server);
    }

    #[test]
    fn saved_settings_round_trip_through_store() {
        let db = Database::open_in_memory().unwrap();
        let settings = Settings {
            api_base_url: "https://orders.example.com".to_string(),
            csrf_token: Some("token-1".to_string()),
            per_page: 500,
            search_debounce_ms: 250,
            search_mode: SearchMode::Client,
        };
        save_settings(&db, &settings).unwrap();

        assert_eq!(read(&db, "csrf_token").as_deref(), Some("token-1"));
        let loaded = load_settings(&db);
        assert_eq!(loaded.per_page, MAX_PER_PAGE);
        assert_eq!(loaded.search_debounce_ms, 250);
        assert_eq!(loaded.search_mode, SearchMode::Client);
    }

    #[test]
    fn clearing_token_removes_it() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = Settings::default();
        settings.csrf_token = Some("abc".to_string());
        save_settings(&db, &settings).unwrap();
        settings.csrf_token = None;
        save_settings(&db, &settings).unwrap();
        assert!(read(&db, "csrf_token").is_none());
    }

    #[test]
    fn env_overrides_win_over_stored_values() {
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |key| match key {
            ENV_API_URL => Some(" http://10.0.0.5:8000 ".to_string()),
            ENV_CSRF_TOKEN => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.api_base_url, "http://10.0.0.5:8000");
        assert!(settings.csrf_token.is_none());
    }
}
