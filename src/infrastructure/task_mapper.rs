use crate::domain::models::Task;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MARKER_PROPERTY: &str = "Pomodorified";
pub const MARKER_VALUE: &str = "Yes";
pub const STATUS_PROPERTY: &str = "Status";
pub const NAME_PROPERTY: &str = "Name";
pub const PLANNED_PROPERTY: &str = "Planned";
pub const FINISHED_PROPERTY: &str = "Finished";
pub const ELIGIBLE_STATUSES: [&str; 2] = ["Not Started", "In Progress"];
pub const UNTITLED: &str = "Untitled";

/// How the eligibility marker is typed in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerSchema {
    Status,
    Select,
}

impl MarkerSchema {
    fn property_type(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Select => "select",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub filter: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<SortSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub property: String,
    pub direction: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub properties: Value,
}

pub fn eligible_tasks_query(marker: MarkerSchema) -> QueryRequest {
    let statuses = ELIGIBLE_STATUSES
        .iter()
        .map(|status| json!({ "property": STATUS_PROPERTY, "status": { "equals": status } }))
        .collect::<Vec<_>>();
    let filter = json!({
        "and": [
            { "property": MARKER_PROPERTY, marker.property_type(): { "equals": MARKER_VALUE } },
            { "or": statuses }
        ]
    });
    let sorts = match marker {
        MarkerSchema::Status => vec![SortSpec {
            property: STATUS_PROPERTY.to_string(),
            direction: "ascending".to_string(),
        }],
        MarkerSchema::Select => Vec::new(),
    };
    QueryRequest {
        filter,
        sorts,
        start_cursor: None,
    }
}

pub fn finished_update(finished_units: u32) -> Value {
    json!({ FINISHED_PROPERTY: { "number": finished_units } })
}

pub fn page_to_task(page: &NotionPage) -> Task {
    let properties = &page.properties;
    let name = properties
        .get(NAME_PROPERTY)
        .and_then(|property| property.get("title"))
        .and_then(Value::as_array)
        .map(|fragments| {
            fragments
                .iter()
                .filter_map(|fragment| fragment.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());
    let status = properties
        .get(STATUS_PROPERTY)
        .and_then(|property| property.get("status"))
        .and_then(|status| status.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Task {
        id: page.id.clone(),
        name,
        planned_units: number_property(properties, PLANNED_PROPERTY),
        finished_units: number_property(properties, FINISHED_PROPERTY).unwrap_or(0),
        status,
    }
}

fn number_property(properties: &Value, name: &str) -> Option<u32> {
    let number = properties.get(name)?.get("number")?.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    Some(number.max(0.0).floor().min(u32::MAX as f64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page(properties: Value) -> NotionPage {
        NotionPage {
            id: "page-1".to_string(),
            properties,
        }
    }

    #[test]
    fn primary_query_uses_status_marker_and_sort() {
        let body = serde_json::to_value(eligible_tasks_query(MarkerSchema::Status))
            .expect("serialize query");
        assert_eq!(
            body["filter"]["and"][0],
            json!({ "property": "Pomodorified", "status": { "equals": "Yes" } })
        );
        assert_eq!(
            body["filter"]["and"][1]["or"][1],
            json!({ "property": "Status", "status": { "equals": "In Progress" } })
        );
        assert_eq!(
            body["sorts"],
            json!([{ "property": "Status", "direction": "ascending" }])
        );
        assert!(body.get("start_cursor").is_none());
    }

    #[test]
    fn fallback_query_uses_select_marker_without_sort() {
        let body = serde_json::to_value(eligible_tasks_query(MarkerSchema::Select))
            .expect("serialize query");
        assert_eq!(
            body["filter"]["and"][0],
            json!({ "property": "Pomodorified", "select": { "equals": "Yes" } })
        );
        assert!(body.get("sorts").is_none());
    }

    #[test]
    fn page_fields_are_mapped() {
        let task = page_to_task(&sample_page(json!({
            "Name": { "title": [{ "plain_text": "Write " }, { "plain_text": "report" }] },
            "Planned": { "number": 4 },
            "Finished": { "number": 2 },
            "Status": { "status": { "name": "In Progress" } }
        })));
        assert_eq!(task.id, "page-1");
        assert_eq!(task.name, "Write report");
        assert_eq!(task.planned_units, Some(4));
        assert_eq!(task.finished_units, 2);
        assert_eq!(task.status, "In Progress");
    }

    #[test]
    fn missing_or_odd_fields_fall_back() {
        let task = page_to_task(&sample_page(json!({
            "Name": { "title": [] },
            "Planned": { "number": null },
            "Finished": { "number": "three" }
        })));
        assert_eq!(task.name, "Untitled");
        assert_eq!(task.planned_units, None);
        assert_eq!(task.finished_units, 0);
        assert_eq!(task.status, "");

        let bare = page_to_task(&sample_page(Value::Null));
        assert_eq!(bare.name, "Untitled");
        assert_eq!(bare.finished_units, 0);
    }

    #[test]
    fn fractional_and_negative_counts_are_floored() {
        let task = page_to_task(&sample_page(json!({
            "Planned": { "number": 2.7 },
            "Finished": { "number": -1 }
        })));
        assert_eq!(task.planned_units, Some(2));
        assert_eq!(task.finished_units, 0);
    }

    #[test]
    fn finished_update_targets_single_property() {
        assert_eq!(finished_update(3), json!({ "Finished": { "number": 3 } }));
    }
}
