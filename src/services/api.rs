use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{
    ClientError, ClientResult, DEFAULT_DELETE_ERROR, DEFAULT_FETCH_ERROR, DEFAULT_SAVE_ERROR,
};
use crate::models::{
    FieldErrors, MutationResponse, OrderFields, OrderPage, ProfitQuery, ProfitResult, ProjectList,
    Settings,
};

const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<FieldErrors>,
}

/// Typed client for the order backend's `/api` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, csrf_token: Option<String>) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: csrf_token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.api_base_url, settings.csrf_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    pub async fn list_orders(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
    ) -> ClientResult<OrderPage> {
        let mut query = vec![("page", page.to_string()), ("per_page", per_page.to_string())];
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query.push(("search", term.to_string()));
        }

        let response = self
            .request(Method::GET, "/api/orders")
            .query(&query)
            .send()
            .await?;
        let response = ensure_success(response, DEFAULT_FETCH_ERROR).await?;
        Ok(response.json::<OrderPage>().await?)
    }

    pub async fn create_order(&self, fields: &OrderFields) -> ClientResult<MutationResponse> {
        let response = self
            .request(Method::POST, "/api/orders")
            .form(&fields.to_form())
            .send()
            .await?;
        let response = ensure_success(response, DEFAULT_SAVE_ERROR).await?;
        Ok(response.json::<MutationResponse>().await?)
    }

    pub async fn update_order(&self, id: i64, fields: &OrderFields) -> ClientResult<MutationResponse> {
        let response = self
            .request(Method::PUT, &format!("/api/orders/{}", id))
            .form(&fields.to_form())
            .send()
            .await?;
        let response = ensure_success(response, DEFAULT_SAVE_ERROR).await?;
        Ok(response.json::<MutationResponse>().await?)
    }

    pub async fn delete_order(&self, id: i64) -> ClientResult<MutationResponse> {
        let response = self
            .request(Method::DELETE, &format!("/api/orders/{}", id))
            .send()
            .await?;
        let response = ensure_success(response, DEFAULT_DELETE_ERROR).await?;
        Ok(response.json::<MutationResponse>().await?)
    }

    pub async fn list_projects(&self) -> ClientResult<Vec<String>> {
        let response = self.request(Method::GET, "/api/projects").send().await?;
        let response = ensure_success(response, "プロジェクト一覧の取得に失敗しました").await?;
        Ok(response.json::<ProjectList>().await?.projects)
    }

    pub async fn profit_data(&self, query: &ProfitQuery) -> ClientResult<ProfitResult> {
        let params = [
            ("project_name", query.project.as_query_value().to_string()),
            ("start_date", query.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", query.end_date.format("%Y-%m-%d").to_string()),
        ];
        let response = self
            .request(Method::GET, "/api/profit-data")
            .query(&params)
            .send()
            .await?;
        let response = ensure_success(response, DEFAULT_FETCH_ERROR).await?;
        Ok(response.json::<ProfitResult>().await?)
    }

    /// Connection check used by the settings screen.
    pub async fn ping(&self) -> ClientResult<bool> {
        let response = self.request(Method::GET, "/api/projects").send().await?;
        Ok(response.status().is_success())
    }
}

async fn ensure_success(response: Response, default_message: &str) -> ClientResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(error_from_response(response, default_message).await)
}

/// Maps a non-2xx response onto the error taxonomy. A 400 that carries field
/// errors is a validation failure; everything else is a server error with the
/// backend's text when it sent JSON, or the default message otherwise.
async fn error_from_response(response: Response, default_message: &str) -> ClientError {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

    if status == StatusCode::BAD_REQUEST {
        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            debug!(%url, fields = errors.len(), "backend rejected form");
            return ClientError::Validation(errors);
        }
    }

    let message = parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default_message.to_string());
    warn!(%url, status = status.as_u16(), %message, "request failed");
    ClientError::Server {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectSelector;
    use chrono::NaiveDate;
    use mockito::Matcher;

    fn fields() -> OrderFields {
        OrderFields {
            customer_name: "Acme".to_string(),
            project_name: "Portal".to_string(),
            order_amount: 1200.0,
            order_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        }
    }

    const ORDER_JSON: &str = r#"{"id": 3, "customer_name": "Acme", "project_name": "Portal",
        "sales_amount": 0, "order_amount": 1200, "invoiced_amount": 0,
        "order_date": "2024-05-01", "work_in_progress": false}"#;

    #[tokio::test]
    async fn list_orders_sends_paging_search_and_csrf() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/orders")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("per_page".into(), "20".into()),
                Matcher::UrlEncoded("search".into(), "Acme".into()),
            ]))
            .match_header("x-csrftoken", "tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"orders": [{}], "page": 2, "pages": 3, "total": 41}}"#, ORDER_JSON))
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Some("tok".to_string()));
        let page = client.list_orders(2, 20, Some(" Acme ")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.page, 2);
        assert_eq!(page.pages, 3);
        assert_eq!(page.total, Some(41));
        assert_eq!(page.orders[0].customer_name, "Acme");
    }

    #[tokio::test]
    async fn create_order_posts_form_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/orders")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("customer_name".into(), "Acme".into()),
                Matcher::UrlEncoded("order_date".into(), "2024-05-01".into()),
            ]))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"message": "受注が登録されました", "order": {}}}"#, ORDER_JSON))
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None);
        let saved = client.create_order(&fields()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(saved.order.map(|o| o.id), Some(3));
        assert_eq!(saved.message.as_deref(), Some("受注が登録されました"));
    }

    #[tokio::test]
    async fn field_errors_become_validation_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/api/orders/3")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "バリデーションエラー", "errors": {"customer_name": ["顧客名は必須です"]}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None);
        let err = client.update_order(3, &fields()).await.unwrap_err();

        let errors = err.field_errors().expect("validation error");
        assert_eq!(errors["customer_name"], vec!["顧客名は必須です".to_string()]);
    }

    #[tokio::test]
    async fn plain_bad_request_is_a_server_error_with_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/orders")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "この受注番号は既に存在します"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None);
        let err = client.create_order(&fields()).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "この受注番号は既に存在します");
    }

    #[tokio::test]
    async fn html_not_found_uses_default_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/orders/404")
            .with_status(404)
            .with_header("content-type", "text/html")
            .with_body("<html><body>Not Found</body></html>")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None);
        let err = client.delete_order(404).await.unwrap_err();
        match err {
            ClientError::Server { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, DEFAULT_DELETE_ERROR);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn profit_data_uses_canonical_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/profit-data")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("project_name".into(), "all".into()),
                Matcher::UrlEncoded("start_date".into(), "2023-01-01".into()),
                Matcher::UrlEncoded("end_date".into(), "2023-01-31".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total_sales_amount": 300, "total_order_amount": 270, "total_invoiced_amount": 240}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None);
        let query = ProfitQuery {
            project: ProjectSelector::All,
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
        };
        let result = client.profit_data(&query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.total_sales_amount, 300.0);
        assert_eq!(result.total_invoiced_amount, 240.0);
    }

    #[tokio::test]
    async fn server_error_propagates_backend_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/profit-data")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "利益データの計算中にエラーが発生しました"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/", server.url()), None);
        let query = ProfitQuery {
            project: ProjectSelector::Named("ProjectX".to_string()),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
        };
        let err = client.profit_data(&query).await.unwrap_err();
        assert_eq!(err.to_string(), "利益データの計算中にエラーが発生しました");
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn projects_are_listed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/projects")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"projects": ["ProjectX", "ProjectY"]}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None);
        assert_eq!(client.list_projects().await.unwrap(), vec!["ProjectX", "ProjectY"]);
        assert!(client.ping().await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let client = ApiClient::new("http://127.0.0.1:1", None);
        let err = client.list_projects().await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}
