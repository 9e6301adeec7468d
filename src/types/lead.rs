//! Core lead types: Lead, LeadId, QualificationStatus, PipelineStage, NewLead

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Identity
// ============================================================================

/// Stable lead identifier assigned by the lead store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub i64);

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LeadId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(LeadId)
    }
}

// ============================================================================
// Qualification Status
// ============================================================================

/// Sales-funnel stage assigned by the sales team.
///
/// Stored values are the dashboard's Portuguese labels; English names are
/// accepted on input. A missing or `null` stored value is `New`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub enum QualificationStatus {
    #[default]
    #[serde(rename = "Novo", alias = "New")]
    New,
    #[serde(rename = "Quente", alias = "Hot")]
    Hot,
    #[serde(rename = "Morno", alias = "Warm")]
    Warm,
    #[serde(rename = "Frio", alias = "Cold")]
    Cold,
    #[serde(rename = "Venda", alias = "Won")]
    Won,
}

impl QualificationStatus {
    /// All statuses in dashboard order.
    pub const ALL: [Self; 5] = [Self::New, Self::Hot, Self::Warm, Self::Cold, Self::Won];

    /// Label used by the stored records and the dashboard UI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "Novo",
            Self::Hot => "Quente",
            Self::Warm => "Morno",
            Self::Cold => "Frio",
            Self::Won => "Venda",
        }
    }
}

impl std::fmt::Display for QualificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Hot => write!(f, "Hot"),
            Self::Warm => write!(f, "Warm"),
            Self::Cold => write!(f, "Cold"),
            Self::Won => write!(f, "Won"),
        }
    }
}

impl std::str::FromStr for QualificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" | "novo" => Ok(Self::New),
            "hot" | "quente" => Ok(Self::Hot),
            "warm" | "morno" => Ok(Self::Warm),
            "cold" | "frio" => Ok(Self::Cold),
            "won" | "venda" => Ok(Self::Won),
            other => Err(format!("unknown qualification status '{other}'")),
        }
    }
}

// ============================================================================
// Pipeline Stage
// ============================================================================

/// Commercial pipeline stage, tracked separately from qualification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    #[serde(rename = "novo")]
    New,
    #[serde(rename = "qualificado")]
    Qualified,
    #[serde(rename = "proposta")]
    Proposal,
    #[serde(rename = "negociacao")]
    Negotiation,
    #[serde(rename = "fechado")]
    Closed,
    #[serde(rename = "perdido")]
    Lost,
}

impl PipelineStage {
    /// Stages counted in the "qualified" metrics bucket.
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified | Self::Proposal | Self::Negotiation)
    }
}

// ============================================================================
// Lead
// ============================================================================

/// A prospective customer record.
///
/// The acquisition origin is intentionally absent: it is always derived
/// from `source`/`utm_source` by [`crate::analytics::classify_origin`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// Raw acquisition channel as captured by the lead form.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub qualification_status: QualificationStatus,
    #[serde(default)]
    pub status: Option<PipelineStage>,
}

impl Lead {
    /// Minimal lead with every optional field empty.
    pub fn new(id: LeadId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            name: None,
            email: None,
            phone: None,
            company: None,
            source: None,
            utm_source: None,
            utm_campaign: None,
            utm_medium: None,
            value: None,
            comment: None,
            qualification_status: QualificationStatus::New,
            status: None,
        }
    }

    /// Copy of this lead with a different qualification status.
    pub fn with_qualification(&self, status: QualificationStatus) -> Self {
        Self {
            qualification_status: status,
            ..self.clone()
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// New Lead (insert payload)
// ============================================================================

/// Fields submitted when creating a lead. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewLead {
    /// Check the submitted fields, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("lead name must not be empty".to_string());
        }
        if let Some(value) = self.value {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("lead value must be a non-negative amount, got {value}"));
            }
        }
        Ok(())
    }

    /// Materialize the stored record. New leads start at `New` in both
    /// qualification and pipeline.
    pub fn into_lead(self, id: LeadId, created_at: DateTime<Utc>) -> Lead {
        Lead {
            name: Some(self.name.trim().to_string()),
            email: self.email,
            phone: self.phone,
            company: self.company,
            source: self.source,
            utm_source: self.utm_source,
            value: self.value,
            comment: self.comment,
            status: Some(PipelineStage::New),
            ..Lead::new(id, created_at)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_null_qualification_default_to_new() {
        let missing: Lead =
            serde_json::from_str(r#"{"id": 1, "created_at": "2024-01-05T10:00:00Z"}"#).unwrap();
        assert_eq!(missing.qualification_status, QualificationStatus::New);

        let null: Lead = serde_json::from_str(
            r#"{"id": 2, "created_at": "2024-01-05T10:00:00Z", "qualification_status": null}"#,
        )
        .unwrap();
        assert_eq!(null.qualification_status, QualificationStatus::New);
    }

    #[test]
    fn test_qualification_wire_values() {
        let lead: Lead = serde_json::from_str(
            r#"{"id": 3, "created_at": "2024-01-05T10:00:00Z", "qualification_status": "Quente", "status": "negociacao"}"#,
        )
        .unwrap();
        assert_eq!(lead.qualification_status, QualificationStatus::Hot);
        assert_eq!(lead.status, Some(PipelineStage::Negotiation));

        let english: QualificationStatus = serde_json::from_str(r#""Won""#).unwrap();
        assert_eq!(english, QualificationStatus::Won);
        assert_eq!(serde_json::to_string(&QualificationStatus::Cold).unwrap(), r#""Frio""#);
    }

    #[test]
    fn test_qualification_from_str() {
        assert_eq!("hot".parse::<QualificationStatus>(), Ok(QualificationStatus::Hot));
        assert_eq!("Venda".parse::<QualificationStatus>(), Ok(QualificationStatus::Won));
        assert!("lukewarm".parse::<QualificationStatus>().is_err());
    }

    #[test]
    fn test_qualified_pipeline_bucket() {
        assert!(PipelineStage::Qualified.is_qualified());
        assert!(PipelineStage::Proposal.is_qualified());
        assert!(PipelineStage::Negotiation.is_qualified());
        assert!(!PipelineStage::New.is_qualified());
        assert!(!PipelineStage::Closed.is_qualified());
        assert!(!PipelineStage::Lost.is_qualified());
    }

    #[test]
    fn test_new_lead_validation() {
        let ok = NewLead { name: "Ana Souza".into(), value: Some(1500.0), ..Default::default() };
        assert!(ok.validate().is_ok());

        let blank = NewLead { name: "   ".into(), ..Default::default() };
        assert!(blank.validate().is_err());

        let negative = NewLead { name: "Rui".into(), value: Some(-1.0), ..Default::default() };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_new_lead_starts_as_new() {
        let lead = NewLead { name: " Bia ".into(), ..Default::default() }
            .into_lead(LeadId(9), Utc::now());
        assert_eq!(lead.name.as_deref(), Some("Bia"));
        assert_eq!(lead.qualification_status, QualificationStatus::New);
        assert_eq!(lead.status, Some(PipelineStage::New));
    }
}
