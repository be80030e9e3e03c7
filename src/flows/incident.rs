//! Incident report: welcome screen, then capture, location, body map,
//! classification and review.

use crate::model::{FlowKind, FormRecord};
use crate::step::{FlowDefinition, StepDefinition};
use crate::validate::FieldRule;

pub const INCIDENT_TYPES: &[&str] = &[
    "Slip / Trip / Fall",
    "Struck by Object",
    "Caught in Machinery",
    "Chemical Exposure",
    "Electrical Shock",
    "Burn",
    "Cut / Laceration",
    "Manual Handling",
    "Vehicle Incident",
    "Near Miss",
    "Other",
];

pub const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];

pub const BODY_AREAS: &[&str] = &[
    "Head",
    "Face",
    "Eyes",
    "Neck",
    "Chest",
    "Abdomen",
    "Back",
    "Left Arm",
    "Right Arm",
    "Left Hand",
    "Right Hand",
    "Left Leg",
    "Right Leg",
    "Left Foot",
    "Right Foot",
];

fn location_or_manual(record: &FormRecord) -> Result<(), String> {
    if record.is_filled("location") || record.is_filled("manualLocation") {
        Ok(())
    } else {
        Err("Capture the current location or describe it in manualLocation".to_string())
    }
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::Incident,
        has_welcome: true,
        steps: vec![
            StepDefinition::new("capture", "Photo of the scene")
                .role_label("Reporter")
                .required_field(FieldRule::text("photo").min_len(1)),
            StepDefinition::new("location", "Incident location")
                .role_label("Reporter")
                .field(FieldRule::location("location"))
                .field(FieldRule::text("manualLocation").min_len(3).max_len(200))
                .validator("location or manual", location_or_manual),
            StepDefinition::new("body_map", "Injured body areas")
                .role_label("Reporter")
                .field(FieldRule::list("bodyParts").one_of(BODY_AREAS)),
            StepDefinition::new("classification", "Incident classification")
                .role_label("Reporter")
                .required_field(FieldRule::text("incidentType").one_of(INCIDENT_TYPES))
                .required_field(FieldRule::text("severity").one_of(SEVERITIES))
                .field(FieldRule::text("description").max_len(1000)),
            StepDefinition::new("review", "Review and submit").role_label("Reporter"),
        ],
    }
}
