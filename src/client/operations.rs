//! FHIR interactions against the active base URL
//!
//! Every method is a fixed translation to one HTTP call. Transport errors are
//! returned unchanged.

use reqwest::{Method, StatusCode};
use serde_json::{Map, Value, json};

use super::{BlazeClient, ClientError, QueryParams};

impl BlazeClient {
    /// `GET /{type}/{id}`
    pub async fn read(&self, resource_type: &str, id: &str) -> Result<Value, ClientError> {
        self.get(&format!("/{resource_type}/{id}"), &QueryParams::new())
            .await
    }

    /// `GET /{type}/{id}/_history/{version}`
    pub async fn vread(
        &self,
        resource_type: &str,
        id: &str,
        version_id: &str,
    ) -> Result<Value, ClientError> {
        self.get(
            &format!("/{resource_type}/{id}/_history/{version_id}"),
            &QueryParams::new(),
        )
        .await
    }

    /// `GET /{type}?{params}&_count={count}`
    pub async fn search(
        &self,
        resource_type: &str,
        params: Option<&Map<String, Value>>,
        count: Option<u32>,
    ) -> Result<Value, ClientError> {
        let query = search_query(params, count);
        self.get(&format!("/{resource_type}"), &query).await
    }

    /// `GET /?{params}&_count={count}` across all resource types
    pub async fn search_system(
        &self,
        params: Option<&Map<String, Value>>,
        count: Option<u32>,
    ) -> Result<Value, ClientError> {
        let query = search_query(params, count);
        self.get("/", &query).await
    }

    /// `POST /{type}`
    pub async fn create(&self, resource_type: &str, resource: &Value) -> Result<Value, ClientError> {
        self.request_json(
            Method::POST,
            &format!("/{resource_type}"),
            &QueryParams::new(),
            Some(resource),
        )
        .await
    }

    /// `PUT /{type}/{id}`
    pub async fn update(
        &self,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> Result<Value, ClientError> {
        self.request_json(
            Method::PUT,
            &format!("/{resource_type}/{id}"),
            &QueryParams::new(),
            Some(resource),
        )
        .await
    }

    /// `DELETE /{type}/{id}`, true only for `204 No Content`
    pub async fn delete(&self, resource_type: &str, id: &str) -> Result<bool, ClientError> {
        let response = self
            .request(
                Method::DELETE,
                &format!("/{resource_type}/{id}"),
                &QueryParams::new(),
                None,
            )
            .await?;
        Ok(response.status == StatusCode::NO_CONTENT)
    }

    /// `GET /{type}/{id}/_history`
    pub async fn history(
        &self,
        resource_type: &str,
        id: &str,
        count: Option<u32>,
    ) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query.push_count("_count", count);
        self.get(&format!("/{resource_type}/{id}/_history"), &query)
            .await
    }

    /// `GET /{type}/_history`
    pub async fn history_type(
        &self,
        resource_type: &str,
        count: Option<u32>,
    ) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query.push_count("_count", count);
        self.get(&format!("/{resource_type}/_history"), &query).await
    }

    /// `POST /` with a transaction or batch Bundle
    pub async fn transaction(&self, bundle: &Value) -> Result<Value, ClientError> {
        self.request_json(Method::POST, "/", &QueryParams::new(), Some(bundle))
            .await
    }

    /// `GET /metadata`
    pub async fn capabilities(&self) -> Result<Value, ClientError> {
        self.get("/metadata", &QueryParams::new()).await
    }

    /// `GET /metadata` against `base_url`, leaving the active URL alone
    pub async fn capabilities_at(&self, base_url: &str) -> Result<Value, ClientError> {
        Ok(self
            .request_at(base_url, Method::GET, "/metadata", &QueryParams::new(), None)
            .await?
            .body)
    }

    /// `GET /Patient/{id}/$everything?start&end&_count`
    pub async fn patient_everything(
        &self,
        patient_id: &str,
        start: Option<&str>,
        end: Option<&str>,
        count: Option<u32>,
    ) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query
            .push_opt("start", start)
            .push_opt("end", end)
            .push_count("_count", count);
        self.get(&format!("/Patient/{patient_id}/$everything"), &query)
            .await
    }

    /// `GET /Measure/{id}/$evaluate-measure?periodStart&periodEnd&subject`
    pub async fn evaluate_measure(
        &self,
        measure_id: &str,
        period_start: &str,
        period_end: &str,
        subject: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query
            .push("periodStart", period_start)
            .push("periodEnd", period_end)
            .push_opt("subject", subject);
        self.get(&format!("/Measure/{measure_id}/$evaluate-measure"), &query)
            .await
    }

    /// `POST /$graphql` with `{query, variables?}`
    pub async fn graphql(&self, query: &str, variables: Option<&Value>) -> Result<Value, ClientError> {
        let mut body = json!({ "query": query });
        if let Some(variables) = variables.filter(|v| !is_empty_json(v)) {
            body["variables"] = variables.clone();
        }
        self.request_json(Method::POST, "/$graphql", &QueryParams::new(), Some(&body))
            .await
    }

    /// `GET /CodeSystem/$validate-code?system&code&display`
    pub async fn validate_code(
        &self,
        system: &str,
        code: &str,
        display: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query
            .push("system", system)
            .push("code", code)
            .push_opt("display", display);
        self.get("/CodeSystem/$validate-code", &query).await
    }

    /// `GET /ValueSet/{id}/$expand` or `GET /ValueSet/$expand?url=...`
    pub async fn expand_valueset(
        &self,
        valueset_id: Option<&str>,
        url: Option<&str>,
        filter: Option<&str>,
        count: Option<u32>,
    ) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query
            .push_opt("url", url)
            .push_opt("filter", filter)
            .push_count("count", count);
        let path = match valueset_id {
            Some(id) => format!("/ValueSet/{id}/$expand"),
            None => "/ValueSet/$expand".to_string(),
        };
        self.get(&path, &query).await
    }

    /// `GET /CodeSystem/$lookup?system&code`
    pub async fn lookup_code(&self, system: &str, code: &str) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query.push("system", system).push("code", code);
        self.get("/CodeSystem/$lookup", &query).await
    }

    /// `GET /$totals`
    pub async fn totals(&self) -> Result<Value, ClientError> {
        self.get("/$totals", &QueryParams::new()).await
    }

    /// `POST /$compact?column-family`
    pub async fn compact(&self, column_family: Option<&str>) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query.push_opt("column-family", column_family);
        self.request_json(Method::POST, "/$compact", &query, None)
            .await
    }

    /// `POST /$re-index?type&search-param`
    pub async fn reindex(
        &self,
        resource_type: Option<&str>,
        search_param: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut query = QueryParams::new();
        query
            .push_opt("type", resource_type)
            .push_opt("search-param", search_param);
        self.request_json(Method::POST, "/$re-index", &query, None)
            .await
    }

    async fn get(&self, path: &str, query: &QueryParams) -> Result<Value, ClientError> {
        self.request_json(Method::GET, path, query, None).await
    }
}

/// Search parameters plus `_count`; an explicit count replaces any `_count`
/// the caller put in `params`.
fn search_query(params: Option<&Map<String, Value>>, count: Option<u32>) -> QueryParams {
    let mut query = params.map(QueryParams::from_json_map).unwrap_or_default();
    if count.is_some() {
        query.remove("_count");
    }
    query.push_count("_count", count);
    query
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
