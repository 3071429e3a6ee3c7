use crate::error::CommandError;
use crate::models::{ActivityEntry, SearchMode, Settings};
use crate::services::api::ApiClient;
use crate::services::state::AppState;
use serde::Deserialize;
use tauri::State;

#[derive(Deserialize)]
pub struct SettingsPayload {
    pub api_base_url: Option<String>,
    pub csrf_token: Option<String>,
    pub per_page: Option<u32>,
    pub search_debounce_ms: Option<u64>,
    pub search_mode: Option<SearchMode>,
}

#[tauri::command]
pub async fn get_settings(state: State<'_, AppState>) -> Result<Settings, CommandError> {
    state.current_settings()
}

#[tauri::command]
pub async fn save_settings(
    payload: SettingsPayload,
    state: State<'_, AppState>,
) -> Result<Settings, CommandError> {
    let mut settings = state.current_settings()?;

    if let Some(url) = payload.api_base_url.filter(|v| !v.trim().is_empty()) {
        settings.api_base_url = url.trim().to_string();
    }
    if let Some(token) = payload.csrf_token {
        settings.csrf_token = Some(token).filter(|t| !t.trim().is_empty());
    }
    if let Some(per_page) = payload.per_page {
        settings.per_page = per_page.clamp(1, crate::config::MAX_PER_PAGE);
    }
    if let Some(ms) = payload.search_debounce_ms {
        settings.search_debounce_ms = ms;
    }
    if let Some(mode) = payload.search_mode {
        settings.search_mode = mode;
    }

    state.update_settings(settings.clone())?;
    Ok(settings)
}

#[tauri::command]
pub async fn test_connection(api_base_url: String, csrf_token: Option<String>) -> Result<bool, CommandError> {
    let client = ApiClient::new(&api_base_url, csrf_token);
    Ok(client.ping().await?)
}

#[tauri::command]
pub async fn get_activity(limit: Option<usize>, state: State<'_, AppState>) -> Result<Vec<ActivityEntry>, CommandError> {
    let db = state
        .db
        .lock()
        .map_err(|_| CommandError::state("DB lock"))?;
    db.recent_activity(limit.unwrap_or(50))
        .map_err(|e| CommandError::state(e.to_string()))
}
