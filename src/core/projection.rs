use crate::core::Record;
use crate::domain::model::Projection;
use crate::utils::error::{ExportError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// One output column: where to read it and what to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub label: String,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
        }
    }

    /// 解析 `source=Label`，省略 label 時沿用 source
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('=') {
            Some((source, label)) => Self::new(source.trim(), label.trim()),
            None => Self::new(spec.trim(), spec.trim()),
        }
    }
}

/// Config driven projection: picks, renames and orders fields.
#[derive(Debug, Clone, Default)]
pub struct FieldProjection {
    fields: Vec<FieldMapping>,
    uppercase_labels: bool,
}

impl FieldProjection {
    pub fn new(fields: Vec<FieldMapping>) -> Self {
        Self {
            fields,
            uppercase_labels: false,
        }
    }

    pub fn uppercase_labels(mut self, enabled: bool) -> Self {
        self.uppercase_labels = enabled;
        self
    }

    pub fn is_identity(&self) -> bool {
        self.fields.is_empty() && !self.uppercase_labels
    }

    pub fn apply(&self, record: &Record) -> Record {
        let mut projected = Record::new();

        if self.fields.is_empty() {
            for (key, value) in &record.data {
                let label = self.label(key);
                if projected.data.contains_key(&label) {
                    // id 與 ID 轉大寫後相同，保留第一個
                    tracing::warn!("⚠️ Field '{}' collides with column '{}', skipped", key, label);
                    continue;
                }
                projected.data.insert(label, value.clone());
            }
            return projected;
        }

        for field in &self.fields {
            let value = lookup_path(record, &field.source)
                .cloned()
                .unwrap_or(Value::Null);
            projected.data.insert(self.label(&field.label), value);
        }
        projected
    }

    pub fn into_projection(self) -> Projection {
        Arc::new(move |record: &Record| self.apply(record))
    }

    fn label(&self, label: &str) -> String {
        if self.uppercase_labels {
            label.to_uppercase()
        } else {
            label.to_string()
        }
    }
}

impl Validate for FieldProjection {
    /// Mapped labels must stay distinct after uppercasing.
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            let label = self.label(&field.label);
            if !seen.insert(label.clone()) {
                return Err(ExportError::InvalidConfigValueError {
                    field: "fields".to_string(),
                    value: field.label.clone(),
                    reason: format!("Duplicate output column '{}'", label),
                });
            }
        }
        Ok(())
    }
}

/// Resolves `a.b.c` through nested objects.
pub fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }

    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}
