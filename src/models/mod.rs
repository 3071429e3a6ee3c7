use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::utils::{normalize_date, parse_decimal};

/// Per-field validation messages, keyed by the backend's form field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub order_number: Option<String>,
    pub customer_name: String,
    pub project_name: String,
    #[serde(default)]
    pub sales_amount: f64,
    #[serde(default)]
    pub order_amount: f64,
    #[serde(default)]
    pub invoiced_amount: f64,
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub billing_month: Option<NaiveDate>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub sales_stage: Option<String>,
    #[serde(default, deserialize_with = "nullable_flag")]
    pub work_in_progress: bool,
    #[serde(default, rename = "description")]
    pub remarks: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Editable order fields, submitted to the backend as a form-encoded body.
/// Amounts and dates coming from the form are parsed leniently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFields {
    #[serde(default)]
    pub order_number: Option<String>,
    pub customer_name: String,
    pub project_name: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub sales_amount: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub order_amount: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub invoiced_amount: f64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub order_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub billing_month: Option<NaiveDate>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub sales_stage: Option<String>,
    #[serde(default, deserialize_with = "nullable_flag")]
    pub work_in_progress: bool,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountInput {
    Number(f64),
    Text(String),
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match AmountInput::deserialize(deserializer)? {
        AmountInput::Number(value) => Ok(value),
        AmountInput::Text(text) if text.trim().is_empty() => Ok(0.0),
        AmountInput::Text(text) => {
            parse_decimal(&text).ok_or_else(|| D::Error::custom(format!("invalid amount: {}", text)))
        }
    }
}

/// The backend column is nullable; `null` reads as unchecked.
fn nullable_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => normalize_date(Some(text.clone()))
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date: {}", text))),
    }
}

impl OrderFields {
    /// Form pairs in the backend's field names. Empty optionals are omitted and
    /// `work_in_progress` is only sent when checked, like an HTML checkbox.
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = Vec::new();
        push_optional(&mut form, "order_number", self.order_number.as_deref());
        form.push(("customer_name", self.customer_name.trim().to_string()));
        form.push(("project_name", self.project_name.trim().to_string()));
        form.push(("sales_amount", self.sales_amount.to_string()));
        form.push(("order_amount", self.order_amount.to_string()));
        form.push(("invoiced_amount", self.invoiced_amount.to_string()));
        if let Some(date) = self.order_date {
            form.push(("order_date", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.delivery_date {
            form.push(("delivery_date", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.billing_month {
            form.push(("billing_month", date.format("%Y-%m-%d").to_string()));
        }
        push_optional(&mut form, "contract_type", self.contract_type.as_deref());
        push_optional(&mut form, "sales_stage", self.sales_stage.as_deref());
        if self.work_in_progress {
            form.push(("work_in_progress", "y".to_string()));
        }
        push_optional(&mut form, "description", self.remarks.as_deref());
        form
    }
}

impl From<&Order> for OrderFields {
    fn from(order: &Order) -> Self {
        OrderFields {
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            project_name: order.project_name.clone(),
            sales_amount: order.sales_amount,
            order_amount: order.order_amount,
            invoiced_amount: order.invoiced_amount,
            order_date: order.order_date,
            delivery_date: order.delivery_date,
            billing_month: order.billing_month,
            contract_type: order.contract_type.clone(),
            sales_stage: order.sales_stage.clone(),
            work_in_progress: order.work_in_progress,
            remarks: order.remarks.clone(),
        }
    }
}

fn push_optional(form: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        form.push((key, value.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: u32,
    pub pages: u32,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub order: Option<Order>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectList {
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ProjectSelector {
    All,
    Named(String),
}

impl ProjectSelector {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw {
            "" => None,
            "all" => Some(ProjectSelector::All),
            name => Some(ProjectSelector::Named(name.to_string())),
        }
    }

    pub fn as_query_value(&self) -> &str {
        match self {
            ProjectSelector::All => "all",
            ProjectSelector::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitQuery {
    pub project: ProjectSelector,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitResult {
    pub total_sales_amount: f64,
    pub total_order_amount: f64,
    pub total_invoiced_amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostInput {
    pub employee_cost: u64,
    pub bp_cost: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitSummary {
    pub total_sales_amount: f64,
    pub total_order_amount: f64,
    pub total_invoiced_amount: f64,
    pub employee_cost: u64,
    pub bp_cost: u64,
    pub total_cost: u64,
    pub profit: f64,
    pub profit_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitTone {
    Positive,
    Negative,
}

impl ProfitTone {
    pub fn css_class(&self) -> &'static str {
        match self {
            ProfitTone::Positive => "text-success",
            ProfitTone::Negative => "text-danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitView {
    pub period_label: String,
    pub total_sales: String,
    pub total_order: String,
    pub total_invoiced: String,
    pub total_cost: String,
    pub profit: String,
    pub profit_rate: String,
    pub tone: ProfitTone,
    pub tone_class: String,
    pub chart: ChartSeries,
    pub summary: ProfitSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub number: u32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub visible: bool,
    pub previous: Option<u32>,
    pub next: Option<u32>,
    pub pages: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTableView {
    pub orders: Vec<Order>,
    pub page: u32,
    pub total_pages: u32,
    pub search_term: String,
    pub empty: bool,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Server,
    Client,
}

impl SearchMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "server" => Some(SearchMode::Server),
            "client" => Some(SearchMode::Client),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Server => "server",
            SearchMode::Client => "client",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub csrf_token: Option<String>,
    pub per_page: u32,
    pub search_debounce_ms: u64,
    pub search_mode: SearchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub action: String,
    pub order_id: Option<i64>,
    pub status: String,
    pub message: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_deserializes_backend_dict() {
        let json = r#"{
            "id": 7,
            "customer_name": "Acme",
            "project_name": "Portal",
            "sales_amount": 1000.0,
            "order_amount": 900.0,
            "invoiced_amount": 800.0,
            "order_date": "2023-01-05",
            "contract_type": "Type1",
            "sales_stage": "Stage1",
            "billing_month": "2023-01-31",
            "work_in_progress": true,
            "description": "first",
            "created_at": "2023-01-05 10:00:00",
            "updated_at": "2023-01-05 10:00:00"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.id, 7);
        assert_eq!(order.remarks.as_deref(), Some("first"));
        assert_eq!(order.billing_month, NaiveDate::from_ymd_opt(2023, 1, 31));
        assert!(order.order_number.is_none());
        assert!(order.work_in_progress);
    }

    #[test]
    fn null_work_in_progress_reads_as_unchecked() {
        let json = r#"{"id": 8, "customer_name": "Acme", "project_name": "Portal",
            "sales_amount": 0.0, "order_amount": 0.0, "invoiced_amount": 0.0,
            "order_date": "2023-01-05", "contract_type": null, "sales_stage": null,
            "billing_month": null, "work_in_progress": null, "description": null,
            "created_at": "2023-01-05 10:00:00", "updated_at": "2023-01-05 10:00:00"}"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert!(!order.work_in_progress);
        assert!(order.remarks.is_none());

        let page: OrderPage = serde_json::from_str(&format!(r#"{{"orders": [{}], "page": 1, "pages": 1}}"#, json)).unwrap();
        assert_eq!(page.orders.len(), 1);
    }

    #[test]
    fn form_omits_blank_optionals_and_unchecked_flag() {
        let fields = OrderFields {
            customer_name: " Acme ".to_string(),
            project_name: "Portal".to_string(),
            order_amount: 1500.5,
            order_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            remarks: Some("   ".to_string()),
            ..Default::default()
        };
        let form = fields.to_form();
        let keys: Vec<&str> = form.iter().map(|(k, _)| *k).collect();
        assert!(!keys.contains(&"description"));
        assert!(!keys.contains(&"work_in_progress"));
        assert!(form.contains(&("customer_name", "Acme".to_string())));
        assert!(form.contains(&("order_amount", "1500.5".to_string())));
        assert!(form.contains(&("order_date", "2024-04-01".to_string())));
    }

    #[test]
    fn form_payload_accepts_grouped_amounts_and_slash_dates() {
        let json = r#"{
            "customer_name": "Acme",
            "project_name": "Portal",
            "order_amount": "1,500",
            "sales_amount": 200,
            "invoiced_amount": "",
            "order_date": "2024/04/01",
            "delivery_date": ""
        }"#;
        let fields: OrderFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.order_amount, 1500.0);
        assert_eq!(fields.sales_amount, 200.0);
        assert_eq!(fields.invoiced_amount, 0.0);
        assert_eq!(fields.order_date, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(fields.delivery_date, None);

        let bad = r#"{"customer_name": "A", "project_name": "B", "order_date": "tomorrow"}"#;
        assert!(serde_json::from_str::<OrderFields>(bad).is_err());
    }

    #[test]
    fn project_selector_parses_all_and_named() {
        assert_eq!(ProjectSelector::parse("all"), Some(ProjectSelector::All));
        assert_eq!(
            ProjectSelector::parse(" ProjectX "),
            Some(ProjectSelector::Named("ProjectX".to_string()))
        );
        assert_eq!(ProjectSelector::parse("  "), None);
    }
}
