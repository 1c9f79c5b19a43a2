//! Tabular snapshot of the directory for administrators
//!
//! Same columns/rows shape for the JSON view and the CSV download. Photo
//! bytes are not exported; `has_photo` says whether one is stored.

use karwan_common::db::models::Profile;
use serde::Serialize;
use serde_json::Value;

/// Export column order
pub const EXPORT_COLUMNS: [&str; 16] = [
    "id",
    "full_name",
    "email",
    "primary_phone",
    "secondary_phone",
    "city",
    "country",
    "profession",
    "expertise",
    "how_to_help",
    "help_needed",
    "business_url",
    "social_media_reference",
    "has_photo",
    "created_at",
    "updated_at",
];

const EXPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ProfileTable {
    pub fn from_profiles(profiles: &[Profile]) -> Self {
        let optional = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

        let rows = profiles
            .iter()
            .map(|p| {
                vec![
                    Value::String(p.id.to_string()),
                    Value::String(p.full_name.clone()),
                    Value::String(p.email.clone()),
                    optional(&p.primary_phone),
                    optional(&p.secondary_phone),
                    optional(&p.city),
                    optional(&p.country),
                    Value::String(p.profession.clone()),
                    Value::String(p.expertise.clone()),
                    Value::String(p.how_to_help.clone()),
                    optional(&p.help_needed),
                    optional(&p.business_url),
                    optional(&p.social_media_reference),
                    Value::Bool(p.has_photo()),
                    Value::String(p.created_at.format(EXPORT_TIME_FORMAT).to_string()),
                    Value::String(p.updated_at.format(EXPORT_TIME_FORMAT).to_string()),
                ]
            })
            .collect();

        Self {
            columns: EXPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header line plus one record per row; nulls become empty cells
    pub fn to_csv(&self) -> karwan_common::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .map_err(std::io::Error::from)?;

        for row in &self.rows {
            writer
                .write_record(row.iter().map(cell))
                .map_err(std::io::Error::from)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(bytes)
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
