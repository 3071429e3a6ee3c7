use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{ClientError, CommandError};
use crate::models::{OrderFields, OrderTableView, ProfitView, Settings};
use crate::services::api::ApiClient;
use crate::services::orders::{self, map_field_errors, OrderTable};
use crate::services::profit::{self, ProfitDashboard};
use crate::services::search::SearchDebouncer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SaveOrder,
    DeleteOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationView {
    pub message: String,
    pub table: Option<OrderTableView>,
}

pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub settings: Arc<Mutex<Settings>>,
    api: Mutex<ApiClient>,
    search: Mutex<Arc<SearchDebouncer>>,
    orders: Mutex<OrderTable>,
    profit: Mutex<ProfitDashboard>,
    in_flight: Arc<Mutex<HashSet<Action>>>,
}

/// Marks an action as running until dropped, on success and failure alike.
pub struct InFlightGuard {
    action: Action,
    in_flight: Arc<Mutex<HashSet<Action>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.action);
        }
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, CommandError> {
    mutex
        .lock()
        .map_err(|_| CommandError::state(format!("{} lock", what)))
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Self {
        AppState {
            api: Mutex::new(ApiClient::from_settings(&settings)),
            search: Mutex::new(Arc::new(SearchDebouncer::from_millis(settings.search_debounce_ms))),
            orders: Mutex::new(OrderTable::new(settings.per_page, settings.search_mode)),
            profit: Mutex::new(ProfitDashboard::new()),
            db: Arc::new(Mutex::new(db)),
            settings: Arc::new(Mutex::new(settings)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn current_settings(&self) -> Result<Settings, CommandError> {
        Ok(lock(&*self.settings, "Settings")?.clone())
    }

    /// Persists new settings and rebuilds everything derived from them.
    pub fn update_settings(&self, settings: Settings) -> Result<(), CommandError> {
        {
            let db = lock(&*self.db, "DB")?;
            crate::config::save_settings(&db, &settings)
                .map_err(|e| CommandError::state(e.to_string()))?;
        }
        *lock(&self.api, "API")? = ApiClient::from_settings(&settings);
        *lock(&self.search, "Search")? = Arc::new(SearchDebouncer::from_millis(settings.search_debounce_ms));
        lock(&self.orders, "Orders")?.configure(settings.per_page, settings.search_mode);
        info!(api = %settings.api_base_url, "settings updated");
        *lock(&*self.settings, "Settings")? = settings;
        Ok(())
    }

    pub fn api(&self) -> Result<ApiClient, CommandError> {
        Ok(lock(&self.api, "API")?.clone())
    }

    fn begin(&self, action: Action) -> Result<InFlightGuard, CommandError> {
        let mut set = lock(&*self.in_flight, "Action")?;
        if !set.insert(action) {
            return Err(CommandError::state("処理中です。しばらくお待ちください"));
        }
        Ok(InFlightGuard {
            action,
            in_flight: self.in_flight.clone(),
        })
    }

    fn record(&self, action: &str, order_id: Option<i64>, outcome: Result<(), &ClientError>) {
        let (status, message) = match outcome {
            Ok(()) => ("success", None),
            Err(err) => ("failed", Some(err.to_string())),
        };
        match self.db.lock() {
            Ok(db) => {
                if let Err(err) = db.log_activity(action, order_id, status, message.as_deref()) {
                    warn!(action, error = %err, "failed to write activity log");
                }
            }
            Err(_) => warn!(action, "activity log skipped, DB lock poisoned"),
        }
    }

    /// Loads the requested page (or the current one). Returns `None` when a
    /// newer request superseded this one. On failure the table keeps the page,
    /// search term and rows it showed before.
    pub async fn refresh_orders(
        &self,
        page: Option<u32>,
        search_term: Option<String>,
    ) -> Result<Option<OrderTableView>, CommandError> {
        let request = lock(&self.orders, "Orders")?.begin_list(page, search_term)?;
        let api = self.api()?;

        let result = orders::list(
            &api,
            request.page,
            request.per_page,
            &request.search_term,
            request.mode,
        )
        .await;

        lock(&self.orders, "Orders")?
            .finish_list(&request, result)
            .map_err(|err| {
                warn!(error = %err, "loading orders failed");
                CommandError::from(err)
            })
    }

    /// Search-as-you-type entry point: waits out the debounce delay and only
    /// the last keystroke of a burst reaches the backend.
    pub async fn search_orders(&self, term: String) -> Result<Option<OrderTableView>, CommandError> {
        let debouncer = lock(&self.search, "Search")?.clone();
        if !debouncer.settle().await {
            debug!(%term, "search superseded by newer input");
            return Ok(None);
        }
        self.refresh_orders(None, Some(term)).await
    }

    pub fn order_table(&self) -> Result<OrderTableView, CommandError> {
        Ok(lock(&self.orders, "Orders")?.view())
    }

    pub fn begin_edit(&self, id: i64) -> Result<OrderFields, CommandError> {
        Ok(lock(&self.orders, "Orders")?.begin_edit(id)?)
    }

    pub fn cancel_edit(&self) -> Result<(), CommandError> {
        lock(&self.orders, "Orders")?.cancel_edit();
        Ok(())
    }

    pub async fn save_order(&self, fields: OrderFields) -> Result<MutationView, CommandError> {
        let _guard = self.begin(Action::SaveOrder)?;
        let editing = lock(&self.orders, "Orders")?.editing();
        let api = self.api()?;

        let outcome = match orders::save(&api, editing, &fields).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record(if editing.is_some() { "update" } else { "create" }, editing, Err(&err));
                return Err(save_error(err));
            }
        };
        let saved_id = outcome.order.as_ref().map(|o| o.id).or(editing);
        self.record(if outcome.created { "create" } else { "update" }, saved_id, Ok(()));
        lock(&self.orders, "Orders")?.cancel_edit();

        let table = self.refresh_after_mutation().await;
        Ok(MutationView {
            message: outcome.message,
            table,
        })
    }

    pub fn request_delete(&self, id: i64) -> Result<(), CommandError> {
        lock(&self.orders, "Orders")?.request_delete(id);
        Ok(())
    }

    pub fn cancel_delete(&self) -> Result<(), CommandError> {
        lock(&self.orders, "Orders")?.cancel_delete();
        Ok(())
    }

    /// Deletes the order selected by `request_delete`. On failure the
    /// displayed rows are left exactly as they were.
    pub async fn confirm_delete(&self) -> Result<MutationView, CommandError> {
        let _guard = self.begin(Action::DeleteOrder)?;
        let id = lock(&self.orders, "Orders")?.take_pending_delete()?;
        let api = self.api()?;

        let message = match orders::delete(&api, id).await {
            Ok(message) => message,
            Err(err) => {
                self.record("delete", Some(id), Err(&err));
                return Err(CommandError::from(err));
            }
        };
        self.record("delete", Some(id), Ok(()));
        lock(&self.orders, "Orders")?.remove_row(id);

        let table = self.refresh_after_mutation().await;
        Ok(MutationView { message, table })
    }

    /// A failed refresh after a successful mutation is logged, not reported:
    /// the mutation itself went through.
    async fn refresh_after_mutation(&self) -> Option<OrderTableView> {
        match self.refresh_orders(None, None).await {
            Ok(view) => view,
            Err(err) => {
                warn!(error = %err, "refresh after mutation failed");
                self.order_table().ok()
            }
        }
    }

    pub async fn load_projects(&self) -> Result<Vec<String>, CommandError> {
        let api = self.api()?;
        api.list_projects().await.map_err(|err| {
            warn!(error = %err, "loading projects failed");
            CommandError::from(err)
        })
    }

    /// Validates the query, fetches the aggregate and recomputes the view with
    /// the costs currently entered. `None` means a newer query won the race.
    pub async fn load_profit(
        &self,
        project: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<Option<ProfitView>, CommandError> {
        let query = profit::set_query(project, start_date, end_date)?;
        let token = lock(&self.profit, "Profit")?.begin_fetch();
        let api = self.api()?;

        let result = profit::fetch_aggregate(&api, &query).await.map_err(|err| {
            warn!(error = %err, "loading profit data failed");
            CommandError::from(err)
        })?;
        Ok(lock(&self.profit, "Profit")?.apply_result(token, query, result))
    }

    pub fn update_costs(&self, employee_cost: &str, bp_cost: &str) -> Result<Option<ProfitView>, CommandError> {
        Ok(lock(&self.profit, "Profit")?.set_costs(employee_cost, bp_cost))
    }
}

fn save_error(err: ClientError) -> CommandError {
    match err {
        ClientError::Validation(errors) => {
            let (inline, general) = map_field_errors(errors);
            let mut banner = CommandError::from(ClientError::Validation(inline));
            if let Some(first) = general.into_iter().next() {
                banner.message = first;
            }
            banner
        }
        other => CommandError::from(other),
    }
}
