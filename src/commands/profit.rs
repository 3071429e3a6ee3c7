use crate::error::CommandError;
use crate::models::ProfitView;
use crate::services::state::AppState;
use serde::Deserialize;
use tauri::State;

#[derive(Deserialize)]
pub struct ProfitQueryPayload {
    pub project_name: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Deserialize)]
pub struct CostPayload {
    pub employee_cost: String,
    pub bp_cost: String,
}

#[tauri::command]
pub async fn get_projects(state: State<'_, AppState>) -> Result<Vec<String>, CommandError> {
    state.load_projects().await
}

#[tauri::command]
pub async fn load_profit_data(
    payload: ProfitQueryPayload,
    state: State<'_, AppState>,
) -> Result<Option<ProfitView>, CommandError> {
    state
        .load_profit(&payload.project_name, &payload.start_date, &payload.end_date)
        .await
}

#[tauri::command]
pub async fn update_costs(
    payload: CostPayload,
    state: State<'_, AppState>,
) -> Result<Option<ProfitView>, CommandError> {
    state.update_costs(&payload.employee_cost, &payload.bp_cost)
}
