//! Permit to work: ten role-gated steps from basic info to closure.

use crate::model::{FlowKind, FormRecord, Role, Row};
use crate::step::{FlowDefinition, StepDefinition};
use crate::validate::FieldRule;
use chrono::NaiveDate;
use serde_json::{Value, json};

pub const WORK_TYPES: &[&str] = &[
    "General Work",
    "Hot Work",
    "Work at Height",
    "Confined Space",
    "Electrical Work",
    "Excavation",
    "Lifting Operations",
    "Chemical Handling",
];

pub const PPE_ITEMS: &[&str] = &[
    "Safety Helmet",
    "Safety Glasses",
    "Face Shield",
    "Ear Protection",
    "Respirator",
    "Safety Gloves",
    "Safety Shoes",
    "Hi-Vis Vest",
    "Full Body Harness",
    "Fire Retardant Clothing",
    "Chemical Suit",
];

pub const RISK_STATUSES: &[&str] = &["open", "controlled", "closed"];

pub const CHECKLIST_ANSWERS: &[&str] = &["yes", "no", "na"];

pub const PERMIT_STATUSES: &[&str] = &["open", "extension", "closure"];

/// Site checklist, answered by the safety officer in order.
pub const CHECKLIST_ITEMS: [&str; 25] = [
    "Work area inspected before start",
    "Area barricaded and signs posted",
    "Energy sources isolated",
    "Lockout / tagout applied",
    "Gas test carried out",
    "Ventilation adequate",
    "Fire extinguisher available",
    "Fire watch briefed",
    "Combustibles removed or covered",
    "Scaffolding inspected and tagged",
    "Ladders in good condition",
    "Lifting gear certified",
    "Tools inspected",
    "Electrical cables protected",
    "Drains and openings covered",
    "Emergency exits clear",
    "First aid kit available",
    "Emergency contacts displayed",
    "Workers trained for the task",
    "Method statement reviewed",
    "Simultaneous operations checked",
    "Weather conditions acceptable",
    "Lighting adequate",
    "Housekeeping acceptable",
    "Permit displayed at work site",
];

/// Field name for checklist item `n` (1-based), e.g. `checklist_07`.
pub fn checklist_field(n: usize) -> String {
    format!("checklist_{n:02}")
}

const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";
const TIME_PATTERN: &str = r"^([01]\d|2[0-3]):[0-5]\d$";

fn date(record: &FormRecord, name: &str) -> Result<NaiveDate, String> {
    let raw = record.text(name).unwrap_or_default().trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("{name} must be a calendar date (YYYY-MM-DD), got '{raw}'"))
}

fn date_range(record: &FormRecord) -> Result<(), String> {
    let start = date(record, "startDate")?;
    let end = date(record, "endDate")?;
    if end < start {
        return Err(format!("endDate {end} is before startDate {start}"));
    }
    Ok(())
}

fn duration(record: &FormRecord) -> Value {
    match (date(record, "startDate"), date(record, "endDate")) {
        (Ok(start), Ok(end)) => json!({ "durationDays": (end - start).num_days() + 1 }),
        _ => json!({ "durationDays": null }),
    }
}

fn fire_watch(record: &FormRecord) -> Result<(), String> {
    if record.contains_item("workTypes", "Hot Work") && record.flag("fireWatchAssigned") != Some(true) {
        return Err("Hot work requires a fire watch to be assigned".to_string());
    }
    Ok(())
}

fn work_type_flags(record: &FormRecord) -> Value {
    json!({
        "hotWork": record.contains_item("workTypes", "Hot Work"),
        "workAtHeight": record.contains_item("workTypes", "Work at Height"),
        "confinedSpace": record.contains_item("workTypes", "Confined Space"),
    })
}

fn harness_for_height(record: &FormRecord) -> Result<(), String> {
    if record.contains_item("workTypes", "Work at Height")
        && !record.contains_item("ppe", "Full Body Harness")
    {
        return Err("Work at height requires a Full Body Harness".to_string());
    }
    Ok(())
}

fn cell<'a>(row: &'a Row, key: &str) -> &'a str {
    row.get(key).map(|v| v.trim()).unwrap_or_default()
}

fn risk_rows(record: &FormRecord) -> Result<(), String> {
    for (i, row) in record.rows("risks").iter().enumerate() {
        let n = i + 1;
        for key in ["hazard", "control"] {
            if cell(row, key).is_empty() {
                return Err(format!("Risk {n}: {key} is required"));
            }
        }
        let status = cell(row, "status");
        if !RISK_STATUSES.contains(&status) {
            return Err(format!(
                "Risk {n}: status must be one of {}, got '{status}'",
                RISK_STATUSES.join(", ")
            ));
        }
    }
    Ok(())
}

fn risk_counts(record: &FormRecord) -> Value {
    let rows = record.rows("risks");
    let count = |status: &str| rows.iter().filter(|r| cell(r, "status") == status).count();
    json!({
        "total": rows.len(),
        "open": count("open"),
        "controlled": count("controlled"),
        "closed": count("closed"),
    })
}

fn signed_attendance(record: &FormRecord) -> Result<(), String> {
    for (i, row) in record.rows("attendees").iter().enumerate() {
        let n = i + 1;
        if cell(row, "name").is_empty() {
            return Err(format!("Attendee {n}: name is required"));
        }
        if cell(row, "signed") != "yes" {
            return Err(format!("Attendee {n} ({}) has not signed", cell(row, "name")));
        }
    }
    Ok(())
}

fn checklist_counts(record: &FormRecord) -> Value {
    let answers: Vec<&str> = (1..=CHECKLIST_ITEMS.len())
        .filter_map(|n| record.text(&checklist_field(n)))
        .collect();
    let count = |answer: &str| answers.iter().filter(|a| **a == answer).count();
    json!({
        "yes": count("yes"),
        "no": count("no"),
        "na": count("na"),
        "hasNoResponses": count("no") > 0,
    })
}

fn closure_timestamp(record: &FormRecord) -> Result<(), String> {
    if record.text("permitStatus") != Some("closure") {
        return Ok(());
    }
    for name in ["closureDate", "closureTime"] {
        if !record.is_filled(name) {
            return Err(format!("{name} is required when the permit is closed"));
        }
    }
    Ok(())
}

fn closed_flag(record: &FormRecord) -> Value {
    json!({ "closed": record.text("permitStatus") == Some("closure") })
}

fn checklist_step() -> StepDefinition {
    let mut step = StepDefinition::new("checklists", "Safety checklists")
        .role_label("Safety Officer")
        .editable_by(&[Role::SafetyOfficer])
        .on_complete(checklist_counts);
    for n in 1..=CHECKLIST_ITEMS.len() {
        step = step.required_field(FieldRule::text(checklist_field(n)).one_of(CHECKLIST_ANSWERS));
    }
    step.field(FieldRule::text("checklistRemarks").max_len(500))
}

pub fn definition() -> FlowDefinition {
    let receiver = &[Role::Receiver];
    let issuer = &[Role::Issuer];

    FlowDefinition {
        kind: FlowKind::Permit,
        has_welcome: false,
        steps: vec![
            StepDefinition::new("basic_info", "Basic information")
                .role_label("Permit Receiver")
                .editable_by(receiver)
                .required_field(FieldRule::text("permitNumber").pattern(r"^PTW-\d{4,}$"))
                .required_field(FieldRule::text("workDescription").min_len(10).max_len(500))
                .required_field(FieldRule::text("workLocation").min_len(3))
                .required_field(FieldRule::text("startDate").pattern(DATE_PATTERN))
                .required_field(FieldRule::text("endDate").pattern(DATE_PATTERN))
                .required_field(FieldRule::text("contractorName").min_len(2))
                .validator("date range", date_range)
                .on_complete(duration),
            StepDefinition::new("security_verification", "Security verification")
                .role_label("Permit Receiver")
                .editable_by(receiver)
                .required_field(FieldRule::text("verifiedBy").min_len(2))
                .required_field(FieldRule::text("securityCode").pattern(r"^\d{6}$")),
            StepDefinition::new("work_type", "Type of work")
                .role_label("Permit Receiver")
                .editable_by(receiver)
                .required_field(FieldRule::list("workTypes").min_len(1).one_of(WORK_TYPES))
                .field(FieldRule::flag("fireWatchAssigned"))
                .validator("fire watch", fire_watch)
                .on_complete(work_type_flags),
            StepDefinition::new("equipment", "Equipment")
                .role_label("Permit Receiver")
                .editable_by(receiver)
                .required_field(FieldRule::list("equipment").min_len(1))
                .on_complete(|r| json!({ "equipmentCount": r.list("equipment").len() })),
            StepDefinition::new("ppe", "Personal protective equipment")
                .role_label("Permit Receiver")
                .editable_by(receiver)
                .required_field(FieldRule::list("ppe").min_len(1).one_of(PPE_ITEMS))
                .validator("harness for height", harness_for_height)
                .on_complete(|r| json!({ "ppeCount": r.list("ppe").len() })),
            StepDefinition::new("risk_assessment", "Risk assessment")
                .role_label("Permit Receiver")
                .editable_by(receiver)
                .required_field(FieldRule::rows("risks").min_len(1))
                .validator("risk rows", risk_rows)
                .on_complete(risk_counts),
            StepDefinition::new("toolbox_talk", "Tool-box talk")
                .role_label("Permit Issuer")
                .editable_by(issuer)
                .required_field(FieldRule::text("toolboxTopic").min_len(3))
                .required_field(FieldRule::rows("attendees").min_len(1))
                .validator("signed attendance", signed_attendance)
                .on_complete(|r| json!({ "attendeeCount": r.rows("attendees").len() })),
            checklist_step(),
            StepDefinition::new("authorization", "Authorization")
                .role_label("Permit Issuer")
                .editable_by(issuer)
                .required_field(FieldRule::text("issuerName").min_len(2))
                .required_field(FieldRule::text("issuerSignature").min_len(3))
                .field(FieldRule::text("authorizationRemarks").max_len(500))
                .allow_reject(),
            StepDefinition::new("closure", "Permit closure")
                .role_label("Permit Issuer")
                .editable_by(issuer)
                .required_field(FieldRule::text("permitStatus").one_of(PERMIT_STATUSES))
                .field(FieldRule::text("closureDate").pattern(DATE_PATTERN))
                .field(FieldRule::text("closureTime").pattern(TIME_PATTERN))
                .required_field(FieldRule::text("closureSignature").min_len(3))
                .field(FieldRule::text("closureRemarks").max_len(500))
                .validator("closure timestamp", closure_timestamp)
                .on_complete(closed_flag),
        ],
    }
}
