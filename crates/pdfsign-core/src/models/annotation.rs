use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::Lang;
use crate::error::PdfSignError;

/// Display name in both supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalizedName {
    pub de: &'static str,
    pub en: &'static str,
}

impl LocalizedName {
    pub fn get(&self, lang: Lang) -> &'static str {
        match lang {
            Lang::De => self.de,
            Lang::En => self.en,
        }
    }
}

/// Kind of metadata a user can attach to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnnotationType {
    /// Stable opaque key, embedded into the machine-readable annotation.
    pub key: &'static str,
    pub name: LocalizedName,
    /// Whether a row of this kind must reference an organization.
    pub has_organization: bool,
}

static ANNOTATION_TYPES: &[AnnotationType] = &[
    AnnotationType {
        key: "bbe3a371",
        name: LocalizedName {
            de: "Geschäftszahl",
            en: "Business number",
        },
        has_organization: true,
    },
    AnnotationType {
        key: "85a4eb4c",
        name: LocalizedName {
            de: "Verwendungszweck",
            en: "Intended use",
        },
        has_organization: false,
    },
    AnnotationType {
        key: "4e7f0c2d",
        name: LocalizedName {
            de: "Aktenzeichen",
            en: "File reference",
        },
        has_organization: false,
    },
];

/// All registered annotation kinds, in display order.
pub fn annotation_types() -> &'static [AnnotationType] {
    ANNOTATION_TYPES
}

/// Look up an annotation kind by key.
pub fn annotation_type(key: &str) -> Option<&'static AnnotationType> {
    ANNOTATION_TYPES.iter().find(|t| t.key == key)
}

/// One user-entered metadata row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRow {
    pub annotation_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_number: Option<String>,
}

/// Editable field of an [`AnnotationRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationField {
    AnnotationType,
    Value,
    OrganizationValue,
    OrganizationNumber,
}

impl FromStr for AnnotationField {
    type Err = PdfSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annotationType" => Ok(AnnotationField::AnnotationType),
            "value" => Ok(AnnotationField::Value),
            "organizationValue" => Ok(AnnotationField::OrganizationValue),
            "organizationNumber" => Ok(AnnotationField::OrganizationNumber),
            _ => Err(PdfSignError::InvalidInput(format!(
                "Unknown annotation field: {}",
                s
            ))),
        }
    }
}

impl AnnotationRow {
    pub fn new(annotation_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            annotation_type: annotation_type.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_organization(
        mut self,
        organization_number: impl Into<String>,
        organization_value: impl Into<String>,
    ) -> Self {
        self.organization_number = Some(organization_number.into());
        self.organization_value = Some(organization_value.into());
        self
    }

    pub fn set(&mut self, field: AnnotationField, value: impl Into<String>) {
        let value = value.into();
        match field {
            AnnotationField::AnnotationType => self.annotation_type = value,
            AnnotationField::Value => self.value = value,
            AnnotationField::OrganizationValue => self.organization_value = Some(value),
            AnnotationField::OrganizationNumber => self.organization_number = Some(value),
        }
    }

    /// Registered kind of this row, if the key is known.
    pub fn kind(&self) -> Option<&'static AnnotationType> {
        annotation_type(self.annotation_type.trim())
    }

    /// A row is embedded only when its kind is known and its value is not blank.
    pub fn is_complete(&self) -> bool {
        !self.annotation_type.trim().is_empty()
            && !self.value.trim().is_empty()
            && self.kind().is_some()
    }

    /// Value as embedded, prefixed with the organization number for kinds that need one.
    pub fn effective_value(&self) -> String {
        let value = self.value.trim();
        let organization = self
            .organization_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        match (self.kind(), organization) {
            (Some(kind), Some(number)) if kind.has_organization => {
                format!("{}-{}", number, value)
            }
            _ => value.to_string(),
        }
    }
}
