//! Human-readable headers for Bundle and Parameters responses

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::Value;

/// `Bundle.entry`, empty when absent
pub fn entries(bundle: &Value) -> &[Value] {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// `Bundle.total` as text, `unknown` when the server did not send one
pub fn bundle_total(bundle: &Value) -> String {
    match bundle.get("total") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "unknown".to_string(),
    }
}

/// One line describing a search result page
pub fn search_summary(bundle: &Value) -> String {
    format!(
        "Found {} total results, returning {} entries.",
        bundle_total(bundle),
        entries(bundle).len()
    )
}

/// Number of entries per `resource.resourceType`, sorted by type
pub fn resource_type_histogram(bundle: &Value) -> BTreeMap<String, usize> {
    let mut histogram = BTreeMap::new();
    for entry in entries(bundle) {
        let resource_type = entry
            .get("resource")
            .and_then(|r| r.get("resourceType"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        *histogram.entry(resource_type.to_string()).or_insert(0) += 1;
    }
    histogram
}

/// Header for a Patient `$everything` result
pub fn compartment_summary(patient_id: &str, bundle: &Value) -> String {
    let mut summary = format!(
        "Patient {} has {} resources:\n",
        patient_id,
        entries(bundle).len()
    );
    for (resource_type, count) in resource_type_histogram(bundle) {
        let _ = writeln!(summary, "  - {resource_type}: {count}");
    }
    summary
}

/// `name: value` listing of a `$totals` Parameters resource
pub fn totals_listing(parameters: &Value) -> String {
    let mut listing = String::from("Resource totals:\n");
    for (name, count) in totals(parameters) {
        let _ = writeln!(listing, "  {name}: {count}");
    }
    listing
}

/// `(name, valueUnsignedInt)` pairs of a `$totals` Parameters resource
pub fn totals(parameters: &Value) -> Vec<(String, Value)> {
    parameters
        .get("parameter")
        .and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .map(|param| {
                    let name = param
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let value = param
                        .get("valueUnsignedInt")
                        .cloned()
                        .unwrap_or(Value::from(0));
                    (name, value)
                })
                .collect()
        })
        .unwrap_or_default()
}
