use crate::error::CommandError;
use crate::models::{OrderFields, OrderTableView};
use crate::services::state::{AppState, MutationView};
use tauri::State;

#[tauri::command]
pub async fn list_orders(
    page: Option<u32>,
    state: State<'_, AppState>,
) -> Result<Option<OrderTableView>, CommandError> {
    state.refresh_orders(page, None).await
}

#[tauri::command]
pub async fn search_orders(
    term: String,
    state: State<'_, AppState>,
) -> Result<Option<OrderTableView>, CommandError> {
    state.search_orders(term).await
}

#[tauri::command]
pub async fn get_order_table(state: State<'_, AppState>) -> Result<OrderTableView, CommandError> {
    state.order_table()
}

#[tauri::command]
pub async fn edit_order(id: i64, state: State<'_, AppState>) -> Result<OrderFields, CommandError> {
    state.begin_edit(id)
}

#[tauri::command]
pub async fn cancel_edit(state: State<'_, AppState>) -> Result<(), CommandError> {
    state.cancel_edit()
}

#[tauri::command]
pub async fn save_order(
    fields: OrderFields,
    state: State<'_, AppState>,
) -> Result<MutationView, CommandError> {
    state.save_order(fields).await
}

#[tauri::command]
pub async fn request_delete(id: i64, state: State<'_, AppState>) -> Result<(), CommandError> {
    state.request_delete(id)
}

#[tauri::command]
pub async fn cancel_delete(state: State<'_, AppState>) -> Result<(), CommandError> {
    state.cancel_delete()
}

#[tauri::command]
pub async fn confirm_delete(state: State<'_, AppState>) -> Result<MutationView, CommandError> {
    state.confirm_delete().await
}
