use uuid::Uuid;

/// Listing cache key prefix, shared with the endpoint name.
const VEHICLE_EMISSIONS_PREFIX: &str = "vehicle_emissions:";

/// Comparison cache key prefix.
const VEHICLE_COMPARE_PREFIX: &str = "vehicle_emissions/compare:";

/// Placeholder for an absent filter.
const ANY: &str = "all";

/// Placeholder for an absent pagination cursor.
const FIRST_PAGE: &str = "start";

// Percent-encodes the separator and the escape character, and disguises a
// literal value that would read as a placeholder, so distinct inputs can never
// render to the same key.
fn component(value: &str) -> String {
    let escaped = value.replace('%', "%25").replace(':', "%3A");
    match escaped.as_str() {
        ANY | FIRST_PAGE => format!("%{:02X}{}", escaped.as_bytes()[0], &escaped[1..]),
        _ => escaped,
    }
}

fn optional(value: Option<&str>) -> String {
    value.map(component).unwrap_or_else(|| ANY.to_string())
}

/// `vehicle_emissions:<make|all>:<model|all>:<year|all>:<cursor|start>:<limit>`
pub fn vehicle_emissions_key(
    make: Option<&str>,
    model: Option<&str>,
    year: Option<i32>,
    cursor: Option<Uuid>,
    limit: i64,
) -> String {
    format!(
        "{}{}:{}:{}:{}:{}",
        VEHICLE_EMISSIONS_PREFIX,
        optional(make),
        optional(model),
        year.map(|y| y.to_string()).unwrap_or_else(|| ANY.to_string()),
        cursor.map(|c| c.to_string()).unwrap_or_else(|| FIRST_PAGE.to_string()),
        limit
    )
}

/// `vehicle_emissions/compare:<make>:<model>:<year>:<make>:<model>:<year>`
pub fn vehicle_compare_key(first: (&str, &str, i32), second: (&str, &str, i32)) -> String {
    format!(
        "{}{}:{}:{}:{}:{}:{}",
        VEHICLE_COMPARE_PREFIX,
        component(first.0),
        component(first.1),
        first.2,
        component(second.0),
        component(second.1),
        second.2
    )
}
