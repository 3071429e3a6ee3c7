use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::models::{
    FieldErrors, Order, OrderFields, OrderTableView, PageLink, Pagination, SearchMode,
};
use crate::services::api::ApiClient;
use crate::services::search::Generation;

const PAGE_WINDOW: u32 = 2;

/// One fetched page, after any client-side filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderListing {
    pub orders: Vec<Order>,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub token: u64,
    pub page: u32,
    pub per_page: u32,
    pub search_term: String,
    pub mode: SearchMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub message: String,
    pub order: Option<Order>,
    pub created: bool,
}

/// Case-insensitive substring match on customer or project name.
pub fn matches_search(order: &Order, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    order.customer_name.to_lowercase().contains(&term)
        || order.project_name.to_lowercase().contains(&term)
}

pub fn filter_orders(orders: Vec<Order>, term: &str) -> Vec<Order> {
    orders.into_iter().filter(|o| matches_search(o, term)).collect()
}

/// Fetches one page. In server mode the backend filters; in client mode the
/// unfiltered page is narrowed locally. `total_pages` always comes from the
/// backend, so in client mode it counts unfiltered pages and a later page may
/// hold no matches.
pub async fn list(
    api: &ApiClient,
    page: u32,
    page_size: u32,
    search_term: &str,
    mode: SearchMode,
) -> ClientResult<OrderListing> {
    validate_paging(page, page_size)?;

    let fetched = match mode {
        SearchMode::Server => api.list_orders(page, page_size, Some(search_term)).await?,
        SearchMode::Client => api.list_orders(page, page_size, None).await?,
    };
    let orders = match mode {
        SearchMode::Server => fetched.orders,
        SearchMode::Client => filter_orders(fetched.orders, search_term),
    };

    Ok(OrderListing {
        orders,
        page: fetched.page,
        total_pages: fetched.pages,
    })
}

fn validate_paging(page: u32, page_size: u32) -> ClientResult<()> {
    if page == 0 {
        return Err(ClientError::validation("page", "ページ番号は1以上で指定してください"));
    }
    if page_size == 0 {
        return Err(ClientError::validation("per_page", "表示件数は1以上で指定してください"));
    }
    Ok(())
}

/// Local checks mirroring the backend's order form, so obvious mistakes are
/// reported inline before a round trip.
pub fn validate_fields(fields: &OrderFields) -> ClientResult<()> {
    let mut errors = FieldErrors::new();
    let mut add = |field: &str, message: &str| {
        errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    };

    check_text(&mut add, "customer_name", &fields.customer_name, "顧客名", 200);
    check_text(&mut add, "project_name", &fields.project_name, "プロジェクト名", 200);
    if let Some(number) = &fields.order_number {
        if number.chars().count() > 100 {
            add("order_number", "受注番号は100文字以下で入力してください");
        }
    }
    for (field, label, value) in [
        ("sales_amount", "売上金額", fields.sales_amount),
        ("order_amount", "受注金額", fields.order_amount),
        ("invoiced_amount", "請求金額", fields.invoiced_amount),
    ] {
        if !value.is_finite() || value < 0.0 {
            add(field, &format!("{}は0以上で入力してください", label));
        }
    }
    if fields.order_date.is_none() {
        add("order_date", "受注日は必須です");
    }
    if let Some(remarks) = &fields.remarks {
        if remarks.chars().count() > 1000 {
            add("remarks", "備考は1000文字以下で入力してください");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(errors))
    }
}

fn check_text<F: FnMut(&str, &str)>(add: &mut F, field: &str, value: &str, label: &str, max: usize) {
    if value.trim().is_empty() {
        add(field, &format!("{}は必須です", label));
    } else if value.trim().chars().count() > max {
        add(field, &format!("{}は{}文字以下で入力してください", label, max));
    }
}

/// Backend field name to form input name. Only `description` differs.
pub fn input_for_field(field: &str) -> Option<&'static str> {
    match field {
        "order_number" => Some("order_number"),
        "customer_name" => Some("customer_name"),
        "project_name" => Some("project_name"),
        "sales_amount" => Some("sales_amount"),
        "order_amount" => Some("order_amount"),
        "invoiced_amount" => Some("invoiced_amount"),
        "order_date" => Some("order_date"),
        "delivery_date" => Some("delivery_date"),
        "billing_month" => Some("billing_month"),
        "contract_type" => Some("contract_type"),
        "sales_stage" => Some("sales_stage"),
        "work_in_progress" => Some("work_in_progress"),
        "description" | "remarks" => Some("remarks"),
        _ => None,
    }
}

/// Splits backend field errors into per-input messages and messages that
/// belong to no input (e.g. a stale CSRF token), which go to the banner.
pub fn map_field_errors(errors: FieldErrors) -> (FieldErrors, Vec<String>) {
    let mut inline = FieldErrors::new();
    let mut general = Vec::new();
    for (field, messages) in errors {
        match input_for_field(&field) {
            Some(input) => inline.entry(input.to_string()).or_default().extend(messages),
            None => general.extend(messages),
        }
    }
    (inline, general)
}

pub async fn save(api: &ApiClient, editing: Option<i64>, fields: &OrderFields) -> ClientResult<SaveOutcome> {
    validate_fields(fields)?;
    let (response, created) = match editing {
        Some(id) => (api.update_order(id, fields).await?, false),
        None => (api.create_order(fields).await?, true),
    };
    let message = response.message.unwrap_or_else(|| {
        if created {
            "受注が登録されました".to_string()
        } else {
            "受注が更新されました".to_string()
        }
    });
    info!(created, id = ?response.order.as_ref().map(|o| o.id), "order saved");
    Ok(SaveOutcome {
        message,
        order: response.order,
        created,
    })
}

pub async fn delete(api: &ApiClient, id: i64) -> ClientResult<String> {
    let response = api.delete_order(id).await?;
    info!(id, "order deleted");
    Ok(response.message.unwrap_or_else(|| "受注が削除されました".to_string()))
}

/// Pages `page-2 ..= page+2` clamped to the available range, with
/// previous/next links. Hidden when everything fits on one page.
pub fn pagination(page: u32, pages: u32) -> Pagination {
    if pages <= 1 {
        return Pagination {
            visible: false,
            previous: None,
            next: None,
            pages: Vec::new(),
        };
    }
    let page = page.clamp(1, pages);
    let start = page.saturating_sub(PAGE_WINDOW).max(1);
    let end = (page + PAGE_WINDOW).min(pages);
    Pagination {
        visible: true,
        previous: (page > 1).then(|| page - 1),
        next: (page < pages).then(|| page + 1),
        pages: (start..=end)
            .map(|number| PageLink {
                number,
                active: number == page,
            })
            .collect(),
    }
}

/// Grid state for the orders screen.
#[derive(Debug)]
pub struct OrderTable {
    page: u32,
    per_page: u32,
    search_term: String,
    mode: SearchMode,
    rows: Vec<Order>,
    total_pages: u32,
    editing: Option<i64>,
    pending_delete: Option<i64>,
    requests: Generation,
}

impl OrderTable {
    pub fn new(per_page: u32, mode: SearchMode) -> Self {
        OrderTable {
            page: 1,
            per_page: per_page.max(1),
            search_term: String::new(),
            mode,
            rows: Vec::new(),
            total_pages: 0,
            editing: None,
            pending_delete: None,
            requests: Generation::new(),
        }
    }

    pub fn rows(&self) -> &[Order] {
        &self.rows
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn configure(&mut self, per_page: u32, mode: SearchMode) {
        self.per_page = per_page.max(1);
        self.mode = mode;
    }

    /// Resolves the requested page/search and issues a token for the fetch.
    /// A new search term always starts from the first page. Nothing is
    /// committed to the table until `apply_listing` accepts the response.
    pub fn begin_list(&mut self, page: Option<u32>, search_term: Option<String>) -> ClientResult<ListRequest> {
        let mut target_page = self.page;
        let mut target_term = self.search_term.clone();
        if let Some(term) = search_term {
            let term = term.trim().to_string();
            if term != target_term {
                target_term = term;
                target_page = 1;
            }
        }
        if let Some(page) = page {
            validate_paging(page, self.per_page)?;
            target_page = page;
        }
        Ok(ListRequest {
            token: self.requests.issue(),
            page: target_page,
            per_page: self.per_page,
            search_term: target_term,
            mode: self.mode,
        })
    }

    pub fn is_current(&self, request: &ListRequest) -> bool {
        self.requests.is_current(request.token)
    }

    /// Replaces the rows with a fetched page unless a newer request was issued.
    pub fn apply_listing(&mut self, request: &ListRequest, listing: OrderListing) -> bool {
        if !self.is_current(request) {
            debug!(token = request.token, "dropping stale order listing");
            return false;
        }
        self.rows = listing.orders;
        self.page = listing.page.max(1);
        self.total_pages = listing.total_pages;
        self.search_term = request.search_term.clone();
        true
    }

    /// Settles a finished fetch. A superseded request yields `Ok(None)`
    /// whether it succeeded or failed; a current failure is returned and the
    /// table keeps what it showed before.
    pub fn finish_list(
        &mut self,
        request: &ListRequest,
        result: ClientResult<OrderListing>,
    ) -> ClientResult<Option<OrderTableView>> {
        match result {
            Ok(listing) => {
                if self.apply_listing(request, listing) {
                    Ok(Some(self.view()))
                } else {
                    Ok(None)
                }
            }
            Err(err) if !self.is_current(request) => {
                debug!(token = request.token, error = %err, "superseded order listing failed");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn view(&self) -> OrderTableView {
        OrderTableView {
            orders: self.rows.clone(),
            page: self.page,
            total_pages: self.total_pages,
            search_term: self.search_term.clone(),
            empty: self.rows.is_empty(),
            pagination: pagination(self.page, self.total_pages),
        }
    }

    pub fn begin_edit(&mut self, id: i64) -> ClientResult<OrderFields> {
        let order = self
            .rows
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| ClientError::validation("id", "受注データが見つかりません"))?;
        self.editing = Some(id);
        Ok(OrderFields::from(order))
    }

    pub fn editing(&self) -> Option<i64> {
        self.editing
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn request_delete(&mut self, id: i64) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Consumes the confirmed delete target.
    pub fn take_pending_delete(&mut self) -> ClientResult<i64> {
        self.pending_delete
            .take()
            .ok_or_else(|| ClientError::validation("id", "削除する受注が選択されていません"))
    }

    /// Drops a deleted row and steps back a page when the current one empties.
    pub fn remove_row(&mut self, id: i64) {
        self.rows.retain(|o| o.id != id);
        if self.editing == Some(id) {
            self.editing = None;
        }
        if self.rows.is_empty() && self.page > 1 {
            self.page -= 1;
        }
    }
}
