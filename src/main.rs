#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::anyhow;
use tauri::Manager;
use tracing::info;

use order_desk::commands;
use order_desk::config::load_settings;
use order_desk::db::Database;
use order_desk::services::state::AppState;

fn main() {
    order_desk::logging::init();

    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app
                .path()
                .app_data_dir()
                .map_err(|e| anyhow!("App data dir: {}", e))?;
            std::fs::create_dir_all(&app_data_dir)?;

            let db_path = app_data_dir.join("order-desk.sqlite");
            let db = Database::new(db_path)?;
            let settings = load_settings(&db);
            info!(api = %settings.api_base_url, "starting order desk");

            app.manage(AppState::new(db, settings));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::settings::get_settings,
            commands::settings::save_settings,
            commands::settings::test_connection,
            commands::settings::get_activity,
            commands::orders::list_orders,
            commands::orders::search_orders,
            commands::orders::get_order_table,
            commands::orders::edit_order,
            commands::orders::cancel_edit,
            commands::orders::save_order,
            commands::orders::request_delete,
            commands::orders::cancel_delete,
            commands::orders::confirm_delete,
            commands::profit::get_projects,
            commands::profit::load_profit_data,
            commands::profit::update_costs,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
