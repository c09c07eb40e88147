//! Admin route controller.
//!
//! # Responsibility
//! - Match admin routes and parse their query/body inputs.
//! - Call the sort-order service and map outcomes to status codes and JSON.
//!
//! # Invariants
//! - Every response carries either no body (204) or a JSON body.
//! - Client mistakes map to 4xx; storage failures map to 500 without
//!   leaking internals into the body.

use crate::model::filter::parse_filters;
use crate::repo::entry_repo::{EntryRepoError, EntryRepository};
use crate::service::sort_order_service::{
    FetchEntriesRequest, SortOrderService, SortOrderServiceError, UpdateSortOrderRequest,
};
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;

const FETCH_ENTRIES_ROUTE: &str = "fetch-entries";
const UPDATE_SORT_ORDER_ROUTE: &str = "update-sort-order";

/// HTTP method subset used by admin routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Transport-neutral request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Route path, e.g. `/fetch-entries/api::product.product`.
    pub path: String,
    /// Decoded query parameters.
    pub query: BTreeMap<String, String>,
    /// Raw JSON body.
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: BTreeMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

/// Transport-neutral response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(json!({
                "error": {
                    "status": status,
                    "message": message.into(),
                }
            })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Deserialize)]
struct UpdateSortOrderBody {
    data: UpdateSortOrderData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSortOrderData {
    sort_order_field: Option<String>,
    sorted_document_ids: Option<Vec<String>>,
    /// `null` and absent both mean "no active filter".
    #[serde(default)]
    filters: Option<Value>,
    locale: Option<String>,
}

/// Admin controller over one repository.
pub struct AdminController<R: EntryRepository> {
    sort_orders: SortOrderService<R>,
}

impl<R: EntryRepository> AdminController<R> {
    pub fn new(repo: R) -> Self {
        Self {
            sort_orders: SortOrderService::new(repo),
        }
    }

    /// Routes one request and returns the response to send.
    pub fn dispatch(&self, request: &ApiRequest) -> ApiResponse {
        let started_at = Instant::now();
        let segments: Vec<&str> = request
            .path
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let (route, response) = match (request.method, segments.as_slice()) {
            (Method::Get, [FETCH_ENTRIES_ROUTE, uid]) => {
                (FETCH_ENTRIES_ROUTE, self.fetch_entries(uid, &request.query))
            }
            (Method::Post, [UPDATE_SORT_ORDER_ROUTE, uid]) => (
                UPDATE_SORT_ORDER_ROUTE,
                self.update_sort_order(uid, request.body.as_deref()),
            ),
            _ => (
                "unknown",
                ApiResponse::error(
                    404,
                    format!("no route for {} {}", request.method.as_str(), request.path),
                ),
            ),
        };

        info!(
            "event=api_request module=api status={} method={} route={} http_status={} duration_ms={}",
            if response.is_success() { "ok" } else { "error" },
            request.method.as_str(),
            route,
            response.status,
            started_at.elapsed().as_millis()
        );
        response
    }

    fn fetch_entries(&self, uid: &str, query: &BTreeMap<String, String>) -> ApiResponse {
        let Some(sort_order_field) = non_blank(query.get("sortOrderField")) else {
            return ApiResponse::error(400, "Missing required `sortOrderField` query parameter.");
        };
        let Some(main_field) = non_blank(query.get("mainField")) else {
            return ApiResponse::error(400, "Missing required `mainField` query parameter.");
        };

        let filters = match non_blank(query.get("filters")) {
            None => Vec::new(),
            Some(raw) => {
                let parsed = serde_json::from_str::<Value>(raw)
                    .map_err(|err| format!("`filters` is not valid JSON: {err}"))
                    .and_then(|value| parse_filters(&value).map_err(|err| err.to_string()));
                match parsed {
                    Ok(filters) => filters,
                    Err(message) => return ApiResponse::error(400, message),
                }
            }
        };

        let request = FetchEntriesRequest {
            content_type: uid.to_string(),
            sort_order_field: sort_order_field.to_string(),
            main_field: main_field.to_string(),
            filters,
            locale: non_blank(query.get("locale")).map(str::to_string),
        };
        match self.sort_orders.fetch_entries(&request) {
            Ok(entries) => ApiResponse::ok(Value::Array(
                entries
                    .into_iter()
                    .map(|entry| {
                        let mut item = Map::new();
                        item.insert("documentId".to_string(), Value::String(entry.document_id));
                        item.insert(request.main_field.clone(), entry.main_value);
                        Value::Object(item)
                    })
                    .collect(),
            )),
            Err(err) => service_error_response(&err),
        }
    }

    fn update_sort_order(&self, uid: &str, body: Option<&str>) -> ApiResponse {
        let body = match body.map(serde_json::from_str::<UpdateSortOrderBody>) {
            Some(Ok(body)) => body.data,
            Some(Err(err)) => {
                return ApiResponse::error(400, format!("Malformed request body: {err}"));
            }
            None => return ApiResponse::error(400, "Missing request body."),
        };

        let Some(sort_order_field) = body.sort_order_field.filter(|field| !field.trim().is_empty())
        else {
            return ApiResponse::error(400, "Missing required `sortOrderField` in request body.");
        };
        let Some(sorted_document_ids) = body.sorted_document_ids else {
            return ApiResponse::error(400, "Missing required `sortedDocumentIds` in request body.");
        };

        let request = UpdateSortOrderRequest {
            content_type: uid.to_string(),
            sort_order_field,
            sorted_document_ids,
            has_active_filter: body.filters.is_some(),
            locale: body.locale.filter(|locale| !locale.trim().is_empty()),
        };
        match self.sort_orders.update_sort_order(&request) {
            Ok(_) => ApiResponse::no_content(),
            Err(err) => service_error_response(&err),
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|raw| !raw.is_empty())
}

fn service_error_response(err: &SortOrderServiceError) -> ApiResponse {
    match err {
        SortOrderServiceError::InvalidRequest(_) | SortOrderServiceError::Reconcile(_) => {
            ApiResponse::error(400, err.to_string())
        }
        SortOrderServiceError::Repo(EntryRepoError::NotFound { .. }) => {
            ApiResponse::error(404, err.to_string())
        }
        SortOrderServiceError::Repo(repo_err) => {
            error!("event=api_request module=api status=error error={repo_err}");
            ApiResponse::error(500, "Internal server error.")
        }
    }
}
