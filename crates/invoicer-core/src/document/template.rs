//! Visual templates applied at render time.

use serde::{Deserialize, Serialize};

use crate::config::Rgb;
use crate::error::{Error, Result};

/// Horizontal placement of the header or footer block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Left,
    Center,
    Right,
}

impl Position {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => Err(Error::InvariantViolation(format!("unknown position {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FooterDesign {
    #[default]
    Simple,
    Detailed,
    Minimal,
}

impl FooterDesign {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Detailed => "detailed",
            Self::Minimal => "minimal",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Self::Simple),
            "detailed" => Ok(Self::Detailed),
            "minimal" => Ok(Self::Minimal),
            other => Err(Error::InvariantViolation(format!("unknown footer design {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Colors {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub table_background: Rgb,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            primary: Rgb::navy(),
            secondary: Rgb::slate(),
            table_background: Rgb::light_gray(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub text: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toggles {
    pub show_tax: bool,
    pub show_contact: bool,
    pub show_logo: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            show_tax: true,
            show_contact: true,
            show_logo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    pub address: String,
    pub mobile: String,
    pub tax_id: String,
}

/// A named bundle of layout and styling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub colors: Colors,
    #[serde(default)]
    pub header_position: Position,
    #[serde(default)]
    pub footer_design: FooterDesign,
    #[serde(default)]
    pub footer_position: Position,
    #[serde(default = "enabled")]
    pub footer_enabled: bool,
    #[serde(default)]
    pub watermark: Watermark,
    #[serde(default)]
    pub toggles: Toggles,
    #[serde(default)]
    pub company_profile: CompanyProfile,
    #[serde(default)]
    pub logo_url: Option<String>,
}

const fn enabled() -> bool {
    true
}

/// Id of the built-in fallback template
pub const DEFAULT_TEMPLATE_ID: &str = "default";

impl Default for Template {
    fn default() -> Self {
        Self {
            id: DEFAULT_TEMPLATE_ID.to_string(),
            name: "Classic".to_string(),
            colors: Colors::default(),
            header_position: Position::Left,
            footer_design: FooterDesign::Simple,
            footer_position: Position::Center,
            footer_enabled: true,
            watermark: Watermark::default(),
            toggles: Toggles::default(),
            company_profile: CompanyProfile::default(),
            logo_url: None,
        }
    }
}

impl Template {
    /// A copy of the default template under a new id and name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// The set of available templates. Never empty.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self {
            templates: vec![Template::default()],
        }
    }
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored templates, falling back to the built-in default when empty
    pub fn from_templates(templates: Vec<Template>) -> Self {
        if templates.is_empty() {
            return Self::default();
        }
        Self { templates }
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Look up `id`, or the first template if it does not exist
    pub fn get_or_default(&self, id: &str) -> &Template {
        self.get(id).unwrap_or(&self.templates[0])
    }

    pub fn first(&self) -> &Template {
        &self.templates[0]
    }

    pub fn list(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Insert or replace by id
    pub fn upsert(&mut self, template: Template) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    /// Delete a template. The last one cannot be deleted.
    pub fn delete(&mut self, id: &str) -> Result<Template> {
        let index = self
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::InvariantViolation(format!("no template with id {id:?}")))?;
        if self.templates.len() == 1 {
            return Err(Error::InvariantViolation(
                "cannot delete the last template".to_string(),
            ));
        }
        Ok(self.templates.remove(index))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_keeps_one_template() {
        let mut registry = TemplateRegistry::new();
        let err = registry.delete(DEFAULT_TEMPLATE_ID).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(registry.len(), 1);

        let modern = Template::named("Modern");
        let id = modern.id.clone();
        registry.upsert(modern);
        assert_eq!(registry.len(), 2);

        registry.delete(DEFAULT_TEMPLATE_ID).unwrap();
        assert_eq!(registry.first().id, id);
        assert!(registry.delete(&id).is_err());
    }

    #[test]
    fn test_upsert_replaces() {
        let mut registry = TemplateRegistry::new();
        let mut edited = Template::default();
        edited.name = "Edited".to_string();
        registry.upsert(edited);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.first().name, "Edited");
    }

    #[test]
    fn test_get_or_default_falls_back() {
        let registry = TemplateRegistry::from_templates(Vec::new());
        assert_eq!(registry.get_or_default("missing").id, DEFAULT_TEMPLATE_ID);
    }

    #[test]
    fn test_deserialize_partial_template() {
        let json = serde_json::json!({
            "id": "t1",
            "name": "Warm",
            "headerPosition": "center",
            "footerDesign": "detailed",
            "colors": { "primary": "#aa3300", "secondary": "#333333", "tableBackground": "#fff5ee" }
        });
        let template: Template = serde_json::from_value(json).unwrap();
        assert_eq!(template.header_position, Position::Center);
        assert_eq!(template.footer_design, FooterDesign::Detailed);
        assert!(template.footer_enabled);
        assert_eq!(template.colors.primary.to_hex(), "#aa3300");
    }
}
