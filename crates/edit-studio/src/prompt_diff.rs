/// Structured prompt editing, change detection and regeneration instructions
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::description::{FieldValue, NormalizedDescription, StructuredDescription};
use crate::{Result, StudioError};

pub const ADDITIONAL_INSTRUCTIONS_LABEL: &str = "Additional Instructions";

/// One field whose edited value differs from the analyzed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<FieldValue>,
    pub after: FieldValue,
}

impl FieldChange {
    pub fn label(&self) -> String {
        format_field_label(&self.field)
    }

    /// `"Label: value"` for text, `"Label:\nitem\nitem"` for lists.
    pub fn to_block(&self) -> String {
        let label = self.label();
        match &self.after {
            FieldValue::Text(text) => format!("{label}: {}", text.trim()),
            FieldValue::List(items) if items.is_empty() => format!("{label}: none"),
            FieldValue::List(items) => format!("{label}:\n{}", items.join("\n")),
        }
    }
}

/// `camera_angle` → `Camera Angle`, `key-light` → `Key Light`.
pub fn format_field_label(field: &str) -> String {
    field
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Fields of `edited` that differ from `original`, in edited field order.
pub fn diff_descriptions(
    original: &NormalizedDescription,
    edited: &NormalizedDescription,
) -> Vec<FieldChange> {
    edited
        .fields
        .iter()
        .filter_map(|(field, after)| {
            let before = original.get(field);
            let changed = before.map_or(true, |before| after.differs_from(before));
            changed.then(|| FieldChange {
                field: field.clone(),
                before: before.cloned(),
                after: after.clone(),
            })
        })
        .collect()
}

/// Instruction text for a regeneration request. Refused when there is nothing
/// to send.
pub fn build_regeneration_instruction(
    changes: &[FieldChange],
    additional_instructions: &str,
) -> Result<String> {
    let mut blocks: Vec<String> = changes.iter().map(FieldChange::to_block).collect();
    let additional = additional_instructions.trim();
    if !additional.is_empty() {
        blocks.push(format!("{ADDITIONAL_INSTRUCTIONS_LABEL}: {additional}"));
    }
    if blocks.is_empty() {
        return Err(StudioError::NothingToRegenerate);
    }
    Ok(blocks.join("\n\n"))
}

/// Edit buffer over a normalized copy of an image's structured description.
#[derive(Debug, Clone)]
pub struct DescriptionEditor {
    original: NormalizedDescription,
    edited: NormalizedDescription,
    expanded: HashSet<String>,
    additional_instructions: String,
}

impl DescriptionEditor {
    pub fn new(description: &StructuredDescription) -> Self {
        let original = description.normalize();
        Self {
            edited: original.clone(),
            original,
            expanded: HashSet::new(),
            additional_instructions: String::new(),
        }
    }

    pub fn original(&self) -> &NormalizedDescription {
        &self.original
    }

    pub fn edited(&self) -> &NormalizedDescription {
        &self.edited
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.edited.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_expanded(&self, field: &str) -> bool {
        self.expanded.contains(field)
    }

    pub fn toggle_expanded(&mut self, field: &str) {
        if !self.expanded.remove(field) {
            self.expanded.insert(field.to_string());
        }
    }

    pub fn expand_all(&mut self) {
        self.expanded = self.edited.fields.iter().map(|(name, _)| name.clone()).collect();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    pub fn set_text(&mut self, field: &str, text: impl Into<String>) -> Result<()> {
        match self.field_mut(field)? {
            FieldValue::Text(value) => {
                *value = text.into();
                Ok(())
            }
            FieldValue::List(_) => Err(StudioError::NotText(field.to_string())),
        }
    }

    pub fn set_item(&mut self, field: &str, index: usize, text: impl Into<String>) -> Result<()> {
        let items = self.list_mut(field)?;
        let item = items.get_mut(index).ok_or_else(|| StudioError::IndexOutOfRange {
            field: field.to_string(),
            index,
        })?;
        *item = text.into();
        Ok(())
    }

    /// Insert before `index`; `index == len` appends.
    pub fn insert_item(&mut self, field: &str, index: usize, text: impl Into<String>) -> Result<()> {
        let items = self.list_mut(field)?;
        if index > items.len() {
            return Err(StudioError::IndexOutOfRange {
                field: field.to_string(),
                index,
            });
        }
        items.insert(index, text.into());
        Ok(())
    }

    /// Replace a whole field. The new value must keep the field's kind.
    pub fn set_value(&mut self, field: &str, value: FieldValue) -> Result<()> {
        let current = self.field_mut(field)?;
        match (current.is_list(), value.is_list()) {
            (true, false) => Err(StudioError::NotText(field.to_string())),
            (false, true) => Err(StudioError::NotAList(field.to_string())),
            _ => {
                *current = value;
                Ok(())
            }
        }
    }

    pub fn push_item(&mut self, field: &str, text: impl Into<String>) -> Result<()> {
        self.list_mut(field)?.push(text.into());
        Ok(())
    }

    pub fn remove_item(&mut self, field: &str, index: usize) -> Result<String> {
        let items = self.list_mut(field)?;
        if index >= items.len() {
            return Err(StudioError::IndexOutOfRange {
                field: field.to_string(),
                index,
            });
        }
        Ok(items.remove(index))
    }

    pub fn set_additional_instructions(&mut self, text: impl Into<String>) {
        self.additional_instructions = text.into();
    }

    pub fn additional_instructions(&self) -> &str {
        &self.additional_instructions
    }

    pub fn changes(&self) -> Vec<FieldChange> {
        diff_descriptions(&self.original, &self.edited)
    }

    pub fn has_changes(&self) -> bool {
        !self.changes().is_empty()
    }

    /// True when a regeneration request would not be refused locally.
    pub fn can_regenerate(&self) -> bool {
        self.has_changes() || !self.additional_instructions.trim().is_empty()
    }

    pub fn regeneration_instruction(&self) -> Result<String> {
        build_regeneration_instruction(&self.changes(), &self.additional_instructions)
    }

    /// Drop all field edits and the additional instructions.
    pub fn reset(&mut self) {
        self.edited = self.original.clone();
        self.additional_instructions.clear();
    }

    fn field_mut(&mut self, field: &str) -> Result<&mut FieldValue> {
        self.edited
            .get_mut(field)
            .ok_or_else(|| StudioError::FieldNotFound(field.to_string()))
    }

    fn list_mut(&mut self, field: &str) -> Result<&mut Vec<String>> {
        match self.field_mut(field)? {
            FieldValue::List(items) => Ok(items),
            FieldValue::Text(_) => Err(StudioError::NotAList(field.to_string())),
        }
    }
}
