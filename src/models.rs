//! Records stored in the school collections.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    /// Authoritative list of class names in this faculty.
    #[serde(default)]
    pub classes: Vec<String>,
}

impl Faculty {
    /// Returns the stored spelling of `class_name` if the faculty offers it.
    pub fn find_class(&self, class_name: &str) -> Option<&str> {
        let wanted = class_name.trim();
        self.classes
            .iter()
            .find(|class| class.trim().eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub class: String,
    pub faculty_id: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub class: String,
    pub faculty_id: String,
    /// Section name, not id.
    #[serde(default)]
    pub section: Option<String>,
    pub parent_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub contact: Vec<String>,
    /// Back-reference to student ids, maintained by the commit link-back step.
    #[serde(default)]
    pub students: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Parent,
}

/// Login identity written by the signup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, to_document_data};
    use serde_json::json;

    #[test]
    fn faculty_class_lookup_is_case_insensitive() {
        let faculty = Faculty {
            id: "f1".into(),
            name: "Science".into(),
            classes: vec!["Grade 10".into(), "11".into()],
        };
        assert_eq!(faculty.find_class(" grade 10 "), Some("Grade 10"));
        assert_eq!(faculty.find_class("12"), None);
    }

    #[test]
    fn documents_decode_with_dollar_id() {
        let doc = Document::new(
            "sec-1",
            json!({ "name": "A", "class": "10", "facultyId": "f1", "subjects": ["Math"] }),
        );
        let section: Section = doc.into_model().unwrap();
        assert_eq!(section.id, "sec-1");
        assert_eq!(section.faculty_id, "f1");

        let data = to_document_data(&section).unwrap();
        assert!(data.get("$id").is_none());
        assert_eq!(data["facultyId"], json!("f1"));
    }
}
