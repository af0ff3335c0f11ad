//! Forwarding of tool calls to the commerce REST API.
//!
//! Each tool maps onto one backend route. The caller's bearer token is
//! attached to every request so the backend applies its own authorization.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a forwarded call that reached a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardResponse {
    /// Whether the backend reported success.
    pub success: bool,
    /// Response body on success, failure detail otherwise.
    pub body: String,
}

impl ForwardResponse {
    pub fn success(body: impl Into<String>) -> Self {
        Self {
            success: true,
            body: body.into(),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            body: detail.into(),
        }
    }
}

/// Errors that prevented a call from reaching a verdict.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("no backend route for tool '{0}'")]
    UnsupportedTool(String),

    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Executes an authorized tool invocation against the backend.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        tool: &str,
        arguments: &Map<String, Value>,
        bearer_token: &str,
    ) -> Result<ForwardResponse, ForwardError>;
}

/// How a tool call is sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRoute {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Fixed texts reported instead of the backend body, as (success, failure).
    pub fixed_text: Option<(&'static str, &'static str)>,
}

impl BackendRoute {
    fn new(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
            fixed_text: None,
        }
    }

    fn with_query(mut self, key: &str, value: String) -> Self {
        self.query.push((key.to_string(), value));
        self
    }

    fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error("no backend route for tool '{0}'")]
    UnknownTool(String),
}

/// Render an argument the way it appears in a query string.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn required(arguments: &Map<String, Value>, name: &'static str) -> Result<String, RouteError> {
    arguments
        .get(name)
        .map(query_value)
        .ok_or(RouteError::MissingArgument(name))
}

/// Map a tool call onto its backend route.
pub fn resolve_route(
    tool: &str,
    arguments: &Map<String, Value>,
) -> Result<BackendRoute, RouteError> {
    let route = match tool {
        "list_products" => BackendRoute::new(Method::GET, "/api/Product/GetAllProducts"),
        "get_product" => BackendRoute::new(Method::GET, "/api/Product/GetProductById")
            .with_query("productId", required(arguments, "productId")?),
        "add_product" => {
            let mut route = BackendRoute::new(Method::POST, "/api/Product/AddProductUsingParams");
            for (key, value) in arguments {
                route = route.with_query(key, query_value(value));
            }
            route
        }
        "delete_product" => {
            let mut route = BackendRoute::new(Method::DELETE, "/api/Product/DeleteProduct")
                .with_query("productId", required(arguments, "productId")?);
            route.fixed_text = Some(("Product deleted", "Failed to delete"));
            route
        }
        "list_categories" => BackendRoute::new(Method::GET, "/api/Category/GetCategories"),
        "get_category" => BackendRoute::new(Method::GET, "/api/Category/GetCategoryById")
            .with_query("categoryId", required(arguments, "categoryId")?),
        "add_category" => BackendRoute::new(Method::POST, "/api/Category/AddCategoryUsingModels")
            .with_body(Value::Object(arguments.clone())),
        "register_user" => BackendRoute::new(Method::POST, "/api/User/NewUserRegistry")
            .with_body(Value::Object(arguments.clone())),
        "list_users" => BackendRoute::new(Method::GET, "/api/User/DisplayAllUsers"),
        "update_user_role" => BackendRoute::new(Method::PUT, "/api/Admin/UpdateRoleForUsers")
            .with_body(Value::Object(arguments.clone())),
        other => return Err(RouteError::UnknownTool(other.to_string())),
    };
    Ok(route)
}

/// HTTP forwarder for the commerce REST API.
#[derive(Clone, Debug)]
pub struct RestForwarder {
    base_url: String,
    client: Client,
}

impl RestForwarder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Forwarder for RestForwarder {
    async fn forward(
        &self,
        tool: &str,
        arguments: &Map<String, Value>,
        bearer_token: &str,
    ) -> Result<ForwardResponse, ForwardError> {
        let route = match resolve_route(tool, arguments) {
            Ok(route) => route,
            Err(RouteError::MissingArgument(name)) => {
                warn!("Tool '{}' called without '{}'", tool, name);
                return Ok(ForwardResponse::failure(
                    RouteError::MissingArgument(name).to_string(),
                ));
            }
            Err(RouteError::UnknownTool(name)) => return Err(ForwardError::UnsupportedTool(name)),
        };

        let url = format!("{}{}", self.base_url, route.path);
        debug!("Forwarding tool '{}' to {} {}", tool, route.method, url);

        let mut request = self.client.request(route.method.clone(), &url);
        if !route.query.is_empty() {
            request = request.query(&route.query);
        }
        if let Some(body) = &route.body {
            request = request.json(body);
        }
        if !bearer_token.is_empty() {
            request = request.bearer_auth(bearer_token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if let Some((ok_text, failed_text)) = route.fixed_text {
            return Ok(if status.is_success() {
                ForwardResponse::success(ok_text)
            } else {
                ForwardResponse::failure(format!(
                    "API call failed with status code {}. Response: {}",
                    status, failed_text
                ))
            });
        }

        if status.is_success() {
            info!("Tool '{}' forwarded successfully ({})", tool, status);
            Ok(ForwardResponse::success(text))
        } else {
            warn!("Tool '{}' rejected by backend with {}", tool, status);
            Ok(ForwardResponse::failure(format!(
                "API call failed with status code {}. Response: {}",
                status, text
            )))
        }
    }
}
