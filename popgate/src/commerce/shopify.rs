use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use popgate_core::{
    campaigns::RewardValue,
    discounts::{CommerceError, CreateCodeParams, CreatedCode, DiscountClient, EmailLock},
    http::{HttpClient, RetryConfig},
    session::StoreSession,
    settings::commerce::CommerceSettings,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::code::generate_code;

const ACCESS_TOKEN_HEADER: &str = "x-shopify-access-token";
/// Fresh codes tried when the platform reports a code as taken
const MAX_CODE_ATTEMPTS: usize = 3;

const FIND_CUSTOMER: &str = r#"query FindCustomer($query: String!) {
  customers(first: 1, query: $query) { nodes { id } }
}"#;

const CREATE_CUSTOMER: &str = r#"mutation CreateCustomer($input: CustomerInput!) {
  customerCreate(input: $input) {
    customer { id }
    userErrors { field message }
  }
}"#;

const CREATE_BASIC_CODE: &str = r#"mutation CreateBasicCode($input: DiscountCodeBasicInput!) {
  discountCodeBasicCreate(basicCodeDiscount: $input) {
    codeDiscountNode { id }
    userErrors { field message }
  }
}"#;

const CREATE_FREE_SHIPPING_CODE: &str = r#"mutation CreateFreeShippingCode($input: DiscountCodeFreeShippingInput!) {
  discountCodeFreeShippingCreate(freeShippingCodeDiscount: $input) {
    codeDiscountNode { id }
    userErrors { field message }
  }
}"#;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UserError {
    #[serde(default)]
    field: Option<Vec<String>>,
    message: String,
}

impl UserError {
    fn is_code_taken(&self) -> bool {
        let on_code = self
            .field
            .as_ref()
            .and_then(|f| f.last())
            .map(|f| f == "code")
            .unwrap_or(false);
        on_code && self.message.to_lowercase().contains("unique")
    }
}

#[derive(Deserialize)]
struct Node {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeCreatePayload {
    code_discount_node: Option<Node>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize)]
struct CodeCreateData {
    #[serde(rename = "discountCodeBasicCreate", alias = "discountCodeFreeShippingCreate")]
    payload: Option<CodeCreatePayload>,
}

#[derive(Deserialize)]
struct NodeList {
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct FindCustomerData {
    customers: NodeList,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerCreatePayload {
    customer: Option<Node>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerData {
    customer_create: Option<CustomerCreatePayload>,
}

/// Creates discount codes through a Shopify-style Admin GraphQL API.
#[derive(Debug, Clone)]
pub struct ShopifyDiscountClient {
    http: HttpClient,
    settings: CommerceSettings,
}

impl ShopifyDiscountClient {
    pub fn new(settings: &CommerceSettings) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .with_timeout(Duration::from_secs(settings.timeout_seconds))
            .with_retry_config(RetryConfig {
                max_attempts: settings.max_attempts,
                ..RetryConfig::default()
            })
            .build()?;
        Ok(Self {
            http,
            settings: settings.clone(),
        })
    }

    async fn execute<D: DeserializeOwned>(
        &self,
        session: &StoreSession,
        query: &str,
        variables: Value,
    ) -> Result<D, CommerceError> {
        let url = self.settings.graphql_url(&session.shop_domain);
        let headers = admin_headers(session)?;
        let response: GraphQlResponse<D> = self
            .http
            .post_json_with_headers(&url, &headers, &GraphQlRequest { query, variables })
            .await?;

        if !response.errors.is_empty() {
            return Err(CommerceError::Rejected(
                response.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        response
            .data
            .ok_or_else(|| CommerceError::InvalidResponse("response has no data".to_string()))
    }

    /// Id of the customer with `email`, created when the shop has none yet.
    async fn customer_id(
        &self,
        session: &StoreSession,
        email: &str,
    ) -> Result<String, CommerceError> {
        let found: FindCustomerData = self
            .execute(
                session,
                FIND_CUSTOMER,
                json!({ "query": format!("email:\"{}\"", email.replace('"', "")) }),
            )
            .await?;
        if let Some(customer) = found.customers.nodes.into_iter().next() {
            return Ok(customer.id);
        }

        debug!("No customer for the authorized email yet, creating one");
        let created: CreateCustomerData = self
            .execute(
                session,
                CREATE_CUSTOMER,
                json!({ "input": { "email": email } }),
            )
            .await?;
        let payload = created
            .customer_create
            .ok_or_else(|| CommerceError::InvalidResponse("customerCreate missing".into()))?;
        if !payload.user_errors.is_empty() {
            return Err(rejected(payload.user_errors));
        }
        payload
            .customer
            .map(|c| c.id)
            .ok_or_else(|| CommerceError::InvalidResponse("customerCreate returned no customer".into()))
    }

    async fn create_once(
        &self,
        session: &StoreSession,
        params: &CreateCodeParams,
        customer_id: Option<&str>,
        code: &str,
    ) -> Result<Result<CreatedCode, Vec<UserError>>, CommerceError> {
        let (mutation, input) = code_input(params, customer_id, code);
        let data: CodeCreateData = self
            .execute(session, mutation, json!({ "input": input }))
            .await?;
        let payload = data
            .payload
            .ok_or_else(|| CommerceError::InvalidResponse("discount payload missing".into()))?;

        if !payload.user_errors.is_empty() {
            return Ok(Err(payload.user_errors));
        }
        let node = payload.code_discount_node.ok_or_else(|| {
            CommerceError::InvalidResponse("discount created without a node id".into())
        })?;
        Ok(Ok(CreatedCode {
            code: code.to_string(),
            discount_id: node.id,
        }))
    }
}

#[async_trait]
impl DiscountClient for ShopifyDiscountClient {
    #[instrument(skip_all, fields(store_id = %session.store_id, campaign_id = %params.campaign_id, tier = ?params.tier))]
    async fn create_code(
        &self,
        session: &StoreSession,
        params: &CreateCodeParams,
    ) -> Result<CreatedCode, CommerceError> {
        let customer_id = match &params.email_lock {
            Some(EmailLock {
                authorized_email,
                require_email_match: true,
            }) => Some(self.customer_id(session, authorized_email).await?),
            _ => None,
        };

        let mut last_errors = Vec::new();
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_code(&self.settings.code_prefix, params.tier);
            match self
                .create_once(session, params, customer_id.as_deref(), &code)
                .await?
            {
                Ok(created) => {
                    info!(code = %created.code, discount_id = %created.discount_id, "Discount code created");
                    return Ok(created);
                }
                Err(errors) if errors.iter().any(UserError::is_code_taken) => {
                    warn!(attempt, "Generated discount code already exists, trying another one");
                    last_errors = errors;
                }
                Err(errors) => return Err(rejected(errors)),
            }
        }
        Err(rejected(last_errors))
    }
}

fn admin_headers(session: &StoreSession) -> Result<HeaderMap, CommerceError> {
    let token = HeaderValue::from_str(session.admin_access_token.expose_secret())
        .map_err(|_| CommerceError::Misconfigured("admin access token is not a valid header".into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(ACCESS_TOKEN_HEADER), token);
    Ok(headers)
}

fn rejected(errors: Vec<UserError>) -> CommerceError {
    CommerceError::Rejected(errors.into_iter().map(|e| e.message).collect())
}

/// Major units with two decimals, as the Admin API expects money.
fn money(amount: f64) -> String {
    format!("{amount:.2}")
}

fn money_from_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Mutation and input for one code; everything that only depends on
/// `params` is shared between the basic and the free shipping variant.
fn code_input(
    params: &CreateCodeParams,
    customer_id: Option<&str>,
    code: &str,
) -> (&'static str, Value) {
    let now = Utc::now();
    let mut input = json!({
        "title": params.title,
        "code": code,
        "startsAt": now.to_rfc3339(),
        "usageLimit": params.usage_limit,
    });

    if let Some(days) = params.expiry_days {
        input["endsAt"] = json!((now + ChronoDuration::days(i64::from(days))).to_rfc3339());
    }
    if let Some(cents) = params.minimum_amount_cents {
        input["minimumRequirement"] =
            json!({ "subtotal": { "greaterThanOrEqualToSubtotal": money_from_cents(cents) } });
    }
    input["customerSelection"] = match customer_id {
        Some(id) => json!({ "customers": { "add": [id] } }),
        None => json!({ "all": true }),
    };
    if customer_id.is_some() || params.usage_limit.is_some() {
        input["appliesOncePerCustomer"] = json!(true);
    }

    match params.reward {
        RewardValue::Percentage(percentage) => {
            input["customerGets"] = json!({
                "value": { "percentage": percentage / 100.0 },
                "items": { "all": true },
            });
            (CREATE_BASIC_CODE, input)
        }
        RewardValue::FixedAmount(amount) => {
            input["customerGets"] = json!({
                "value": { "discountAmount": { "amount": money(amount), "appliesOnEachItem": false } },
                "items": { "all": true },
            });
            (CREATE_BASIC_CODE, input)
        }
        RewardValue::FreeShipping => {
            input["destination"] = json!({ "all": true });
            (CREATE_FREE_SHIPPING_CODE, input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use popgate_core::utils::secret::MaskedSecret;
    use wiremock::{
        matchers::{body_partial_json, body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn session() -> StoreSession {
        StoreSession::new(
            "demo-store",
            "demo-store.myshopify.com",
            MaskedSecret::from("shpat_test_demo"),
        )
    }

    fn params(reward: RewardValue) -> CreateCodeParams {
        CreateCodeParams {
            campaign_id: "welcome".to_string(),
            title: "Welcome popup".to_string(),
            reward,
            tier: None,
            expiry_days: Some(7),
            minimum_amount_cents: Some(2500),
            usage_limit: None,
            email_lock: None,
        }
    }

    async fn client(server: &MockServer) -> ShopifyDiscountClient {
        let settings = CommerceSettings::with_endpoint(&format!("{}/graphql.json", server.uri()));
        ShopifyDiscountClient::new(&settings).unwrap()
    }

    fn created(mutation: &str, id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "data": { mutation: { "codeDiscountNode": { "id": id }, "userErrors": [] } }
        }))
    }

    #[tokio::test]
    async fn test_create_percentage_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql.json"))
            .and(header("x-shopify-access-token", "shpat_test_demo"))
            .and(body_string_contains("discountCodeBasicCreate"))
            .and(body_partial_json(json!({
                "variables": { "input": {
                    "title": "Welcome popup",
                    "customerGets": { "value": { "percentage": 0.1 } },
                    "minimumRequirement": { "subtotal": { "greaterThanOrEqualToSubtotal": "25.00" } },
                    "customerSelection": { "all": true }
                } }
            })))
            .respond_with(created(
                "discountCodeBasicCreate",
                "gid://shopify/DiscountCodeNode/1",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .await
            .create_code(&session(), &params(RewardValue::Percentage(10.0)))
            .await
            .unwrap();

        assert!(result.code.starts_with("POP-"));
        assert_eq!(result.discount_id, "gid://shopify/DiscountCodeNode/1");
    }

    #[tokio::test]
    async fn test_create_fixed_amount_single_use_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "variables": { "input": {
                    "usageLimit": 1,
                    "appliesOncePerCustomer": true,
                    "customerGets": { "value": { "discountAmount": { "amount": "5.50" } } }
                } }
            })))
            .respond_with(created(
                "discountCodeBasicCreate",
                "gid://shopify/DiscountCodeNode/2",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut params = params(RewardValue::FixedAmount(5.5));
        params.usage_limit = Some(1);
        let result = client(&server)
            .await
            .create_code(&session(), &params)
            .await
            .unwrap();
        assert_eq!(result.discount_id, "gid://shopify/DiscountCodeNode/2");
    }

    #[tokio::test]
    async fn test_free_shipping_uses_its_own_mutation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("discountCodeFreeShippingCreate"))
            .and(body_partial_json(json!({
                "variables": { "input": { "destination": { "all": true } } }
            })))
            .respond_with(created(
                "discountCodeFreeShippingCreate",
                "gid://shopify/DiscountCodeNode/3",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .await
            .create_code(&session(), &params(RewardValue::FreeShipping))
            .await
            .unwrap();
        assert_eq!(result.discount_id, "gid://shopify/DiscountCodeNode/3");
    }

    #[tokio::test]
    async fn test_tiered_code_carries_tier_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(created(
                "discountCodeBasicCreate",
                "gid://shopify/DiscountCodeNode/4",
            ))
            .mount(&server)
            .await;

        let mut params = params(RewardValue::Percentage(15.0));
        params.tier = Some(1);
        let result = client(&server)
            .await
            .create_code(&session(), &params)
            .await
            .unwrap();
        assert!(result.code.starts_with("POP-T1-"));
    }

    #[tokio::test]
    async fn test_email_lock_creates_customer_and_restricts_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("FindCustomer"))
            .and(body_partial_json(json!({
                "variables": { "query": "email:\"a@x.com\"" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "customers": { "nodes": [] } }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("CreateCustomer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "customerCreate": {
                    "customer": { "id": "gid://shopify/Customer/9" },
                    "userErrors": []
                } }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("CreateBasicCode"))
            .and(body_partial_json(json!({
                "variables": { "input": {
                    "customerSelection": { "customers": { "add": ["gid://shopify/Customer/9"] } },
                    "appliesOncePerCustomer": true
                } }
            })))
            .respond_with(created(
                "discountCodeBasicCreate",
                "gid://shopify/DiscountCodeNode/5",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut params = params(RewardValue::Percentage(10.0));
        params.email_lock = Some(EmailLock::for_email("a@x.com"));
        let result = client(&server)
            .await
            .create_code(&session(), &params)
            .await
            .unwrap();
        assert_eq!(result.discount_id, "gid://shopify/DiscountCodeNode/5");
    }

    #[tokio::test]
    async fn test_user_errors_are_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "discountCodeBasicCreate": {
                    "codeDiscountNode": null,
                    "userErrors": [{ "field": ["basicCodeDiscount", "title"], "message": "Title is too long" }]
                } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .create_code(&session(), &params(RewardValue::Percentage(10.0)))
            .await
            .unwrap_err();
        match err {
            CommerceError::Rejected(messages) => assert_eq!(messages, vec!["Title is too long"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_taken_code_is_regenerated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "discountCodeBasicCreate": {
                    "codeDiscountNode": null,
                    "userErrors": [{ "field": ["basicCodeDiscount", "code"], "message": "Code must be unique" }]
                } }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(created(
                "discountCodeBasicCreate",
                "gid://shopify/DiscountCodeNode/6",
            ))
            .mount(&server)
            .await;

        let result = client(&server)
            .await
            .create_code(&session(), &params(RewardValue::Percentage(10.0)))
            .await
            .unwrap();
        assert_eq!(result.discount_id, "gid://shopify/DiscountCodeNode/6");
    }

    #[tokio::test]
    async fn test_server_errors_are_not_retried_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "errors": "Service unavailable"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .create_code(&session(), &params(RewardValue::Percentage(10.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Http(_)));
        assert!(err.to_string().contains("Service unavailable"));
    }

    #[tokio::test]
    async fn test_graphql_errors_are_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "Throttled" }]
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .create_code(&session(), &params(RewardValue::Percentage(10.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Rejected(ref m) if m == &vec!["Throttled".to_string()]));
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(5.0), "5.00");
        assert_eq!(money_from_cents(2500), "25.00");
        assert_eq!(money_from_cents(1999), "19.99");
        assert_eq!(money_from_cents(5), "0.05");
    }
}
