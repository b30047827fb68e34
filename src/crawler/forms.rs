// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Values used when the crawler fills a form

use std::collections::{BTreeMap, HashMap};

use crate::model::{HtmlElement, HtmlForm};

/// Field types that never take a typed value
const SKIPPED_TYPES: &[&str] = &["submit", "button", "reset", "image", "file"];

/// Maps form fields to fill values
///
/// Configured values win; then common field names; then the input type.
#[derive(Debug, Clone)]
pub struct FormFiller {
    configured: HashMap<String, String>,
    defaults: Vec<(&'static str, &'static str)>,
}

impl Default for FormFiller {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl FormFiller {
    pub fn new(configured: &HashMap<String, String>) -> Self {
        Self {
            configured: configured
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            // ordered: first partial match wins
            defaults: vec![
                ("email", "browserk@example.com"),
                ("mail", "browserk@example.com"),
                ("password", "Browserk1!"),
                ("pass", "Browserk1!"),
                ("username", "browserk"),
                ("user", "browserk"),
                ("login", "browserk"),
                ("search", "browserk"),
                ("query", "browserk"),
                ("phone", "+15555551234"),
                ("url", "https://example.com"),
                ("website", "https://example.com"),
                ("zip", "90210"),
                ("name", "Browserk Test"),
            ],
        }
    }

    /// Value for one field, or `None` to leave it untouched
    pub fn value_for(&self, field: &HtmlElement) -> Option<String> {
        let field_type = field
            .get_attr("type")
            .unwrap_or(if field.tag == "textarea" { "textarea" } else { "text" })
            .to_ascii_lowercase();
        if SKIPPED_TYPES.contains(&field_type.as_str()) {
            return None;
        }
        let key = field.get_attr("name").or_else(|| field.get_attr("id"))?;
        let lower = key.to_lowercase();

        if let Some(v) = self.configured.get(&lower) {
            return Some(v.clone());
        }
        match field_type.as_str() {
            // keep server-provided tokens
            "hidden" => return field.get_attr("value").map(str::to_string),
            "checkbox" | "radio" => {
                return Some(field.get_attr("value").unwrap_or("on").to_string())
            }
            _ => {}
        }
        if field.tag == "select" {
            return Some(String::new());
        }
        if let Some((_, v)) = self.defaults.iter().find(|(name, _)| lower.contains(name)) {
            return Some((*v).to_string());
        }

        let by_type = match field_type.as_str() {
            "email" => "browserk@example.com",
            "password" => "Browserk1!",
            "url" => "https://example.com",
            "tel" => "+15555551234",
            "number" | "range" => "42",
            "date" => "2024-01-01",
            "datetime-local" => "2024-01-01T12:00",
            "time" => "12:00",
            "month" => "2024-01",
            "week" => "2024-W01",
            "color" => "#000000",
            _ => "browserk",
        };
        Some(by_type.to_string())
    }

    /// Name (or id) to value map for every fillable field
    pub fn values(&self, form: &HtmlForm) -> BTreeMap<String, String> {
        form.fields
            .iter()
            .filter_map(|field| {
                let key = field.get_attr("name").or_else(|| field.get_attr("id"))?;
                self.value_for(field).map(|v| (key.to_string(), v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, ty: &str) -> HtmlElement {
        HtmlElement::new("input").attr("name", name).attr("type", ty)
    }

    #[test]
    fn test_configured_values_win() {
        let mut configured = HashMap::new();
        configured.insert("Username".to_string(), "admin".to_string());
        let filler = FormFiller::new(&configured);
        let form = HtmlForm::new()
            .field(input("username", "text"))
            .field(input("password", "password"));
        let values = filler.values(&form);
        assert_eq!(values["username"], "admin");
        assert_eq!(values["password"], "Browserk1!");
    }

    #[test]
    fn test_defaults_by_name_and_type() {
        let filler = FormFiller::default();
        assert_eq!(
            filler.value_for(&input("user_email", "text")).as_deref(),
            Some("browserk@example.com")
        );
        assert_eq!(filler.value_for(&input("qty", "number")).as_deref(), Some("42"));
        assert_eq!(filler.value_for(&input("when", "date")).as_deref(), Some("2024-01-01"));
        assert_eq!(filler.value_for(&input("go", "submit")), None);
        assert_eq!(
            filler.value_for(&HtmlElement::new("textarea").attr("name", "comment")).as_deref(),
            Some("browserk")
        );
    }

    #[test]
    fn test_hidden_and_checkable_fields() {
        let filler = FormFiller::default();
        let csrf = input("_csrf", "hidden").attr("value", "tok");
        assert_eq!(filler.value_for(&csrf).as_deref(), Some("tok"));
        assert_eq!(filler.value_for(&input("remember", "checkbox")).as_deref(), Some("on"));
        assert_eq!(filler.value_for(&HtmlElement::new("input").attr("type", "text")), None);
    }
}
