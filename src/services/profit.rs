use chrono::NaiveDate;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::models::{
    ChartSeries, CostInput, FieldErrors, ProfitQuery, ProfitResult, ProfitSummary, ProfitTone,
    ProfitView, ProjectSelector,
};
use crate::services::api::ApiClient;
use crate::services::search::Generation;
use crate::utils::{format_date_jp, format_rate, format_yen, parse_cost_input, parse_iso_date};

const ALL_PROJECTS_LABEL: &str = "すべての案件";

const COLOR_SALES: &str = "#0d6efd";
const COLOR_ORDER: &str = "#6c757d";
const COLOR_INVOICED: &str = "#0dcaf0";
const COLOR_COST: &str = "#ffc107";
const COLOR_PROFIT: &str = "#198754";
const COLOR_LOSS: &str = "#dc3545";

/// Validates the analysis form. Every field is required, dates are ISO and the
/// window may not end before it starts.
pub fn set_query(project: &str, start_date: &str, end_date: &str) -> ClientResult<ProfitQuery> {
    let mut errors = FieldErrors::new();

    let project = ProjectSelector::parse(project);
    if project.is_none() {
        errors.insert("project_name".to_string(), vec!["プロジェクト名は必須です".to_string()]);
    }
    let start = parse_required_date(start_date, "start_date", "開始日", &mut errors);
    let end = parse_required_date(end_date, "end_date", "終了日", &mut errors);

    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            errors.insert(
                "end_date".to_string(),
                vec!["終了日は開始日以降の日付を入力してください".to_string()],
            );
        }
    }

    match (project, start, end) {
        (Some(project), Some(start_date), Some(end_date)) if errors.is_empty() => Ok(ProfitQuery {
            project,
            start_date,
            end_date,
        }),
        _ => Err(ClientError::Validation(errors)),
    }
}

fn parse_required_date(
    raw: &str,
    field: &str,
    label: &str,
    errors: &mut FieldErrors,
) -> Option<NaiveDate> {
    if raw.trim().is_empty() {
        errors.insert(field.to_string(), vec![format!("{}は必須です", label)]);
        return None;
    }
    let parsed = parse_iso_date(raw);
    if parsed.is_none() {
        errors.insert(
            field.to_string(),
            vec!["日付の形式が正しくありません。YYYY-MM-DD形式を使用してください。".to_string()],
        );
    }
    parsed
}

pub async fn fetch_aggregate(api: &ApiClient, query: &ProfitQuery) -> ClientResult<ProfitResult> {
    api.profit_data(query).await
}

/// Pure profit arithmetic. Negative costs count as zero and the rate is zero
/// whenever there is no positive revenue.
pub fn compute_summary(result: &ProfitResult, employee_cost: i64, bp_cost: i64) -> ProfitSummary {
    let revenue = finite_or_zero(result.total_sales_amount);
    let employee_cost = employee_cost.max(0) as u64;
    let bp_cost = bp_cost.max(0) as u64;
    let total_cost = employee_cost.saturating_add(bp_cost);

    let profit = revenue - total_cost as f64;
    let profit_rate = if revenue > 0.0 {
        finite_or_zero(profit / revenue * 100.0)
    } else {
        0.0
    };

    ProfitSummary {
        total_sales_amount: revenue,
        total_order_amount: finite_or_zero(result.total_order_amount),
        total_invoiced_amount: finite_or_zero(result.total_invoiced_amount),
        employee_cost,
        bp_cost,
        total_cost,
        profit,
        profit_rate,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn classify(profit: f64) -> ProfitTone {
    if profit >= 0.0 {
        ProfitTone::Positive
    } else {
        ProfitTone::Negative
    }
}

pub fn period_label(query: &ProfitQuery) -> String {
    let project = match &query.project {
        ProjectSelector::All => ALL_PROJECTS_LABEL,
        ProjectSelector::Named(name) => name.as_str(),
    };
    format!(
        "{} ({} 〜 {})",
        project,
        format_date_jp(query.start_date),
        format_date_jp(query.end_date)
    )
}

pub fn chart_series(summary: &ProfitSummary) -> ChartSeries {
    let profit_color = match classify(summary.profit) {
        ProfitTone::Positive => COLOR_PROFIT,
        ProfitTone::Negative => COLOR_LOSS,
    };
    ChartSeries {
        labels: ["売上", "受注", "請求", "原価", "利益"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        values: vec![
            summary.total_sales_amount,
            summary.total_order_amount,
            summary.total_invoiced_amount,
            summary.total_cost as f64,
            summary.profit,
        ],
        colors: [COLOR_SALES, COLOR_ORDER, COLOR_INVOICED, COLOR_COST, profit_color]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Presentation adapter: formats a summary for display. No I/O, no state.
pub fn render(query: &ProfitQuery, summary: &ProfitSummary) -> ProfitView {
    let tone = classify(summary.profit);
    ProfitView {
        period_label: period_label(query),
        total_sales: format_yen(summary.total_sales_amount),
        total_order: format_yen(summary.total_order_amount),
        total_invoiced: format_yen(summary.total_invoiced_amount),
        total_cost: format_yen(summary.total_cost as f64),
        profit: format_yen(summary.profit),
        profit_rate: format_rate(summary.profit_rate),
        tone,
        tone_class: tone.css_class().to_string(),
        chart: chart_series(summary),
        summary: *summary,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfitState {
    Empty,
    Loaded { query: ProfitQuery, result: ProfitResult },
}

/// Dashboard state: the last loaded result plus the locally entered costs.
/// Each completed fetch replaces the result as a whole.
#[derive(Debug)]
pub struct ProfitDashboard {
    state: ProfitState,
    costs: CostInput,
    fetches: Generation,
}

impl Default for ProfitDashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfitDashboard {
    pub fn new() -> Self {
        ProfitDashboard {
            state: ProfitState::Empty,
            costs: CostInput::default(),
            fetches: Generation::new(),
        }
    }

    pub fn state(&self) -> &ProfitState {
        &self.state
    }

    pub fn costs(&self) -> CostInput {
        self.costs
    }

    pub fn begin_fetch(&self) -> u64 {
        self.fetches.issue()
    }

    /// Stores a fetched result unless a newer fetch has been started since.
    pub fn apply_result(&mut self, token: u64, query: ProfitQuery, result: ProfitResult) -> Option<ProfitView> {
        if !self.fetches.is_current(token) {
            debug!(token, "dropping stale profit response");
            return None;
        }
        self.state = ProfitState::Loaded { query, result };
        self.current_view()
    }

    /// Updates costs from the raw input text and recomputes without fetching.
    pub fn set_costs(&mut self, employee_cost: &str, bp_cost: &str) -> Option<ProfitView> {
        self.costs = CostInput {
            employee_cost: parse_cost_input(employee_cost),
            bp_cost: parse_cost_input(bp_cost),
        };
        let view = self.current_view();
        if view.is_none() {
            debug!("costs updated before any profit data was loaded");
        }
        view
    }

    pub fn current_view(&self) -> Option<ProfitView> {
        match &self.state {
            ProfitState::Empty => None,
            ProfitState::Loaded { query, result } => {
                let summary = compute_summary(
                    result,
                    self.costs.employee_cost as i64,
                    self.costs.bp_cost as i64,
                );
                Some(render(query, &summary))
            }
        }
    }
}
