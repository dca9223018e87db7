//! Approval flows and the per-document approval state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::types::{Decision, DocType};

/// Approval progress of a PR or PO
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Level 0, no stage approved yet
    Pending,
    /// Some but not all stages approved
    InProgress,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::InProgress => "IN_PROGRESS",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ApprovalStatus::Pending),
            "IN_PROGRESS" => Some(ApprovalStatus::InProgress),
            "APPROVED" => Some(ApprovalStatus::Approved),
            "REJECTED" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Rejected)
    }
}

/// One named stage of a flow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalStage {
    pub level: i32,
    pub name: String,
}

/// Stage as submitted by a client. The level is ignored; stages are
/// renumbered in input order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageInput {
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default, alias = "stage")]
    pub name: Option<String>,
}

impl From<&str> for StageInput {
    fn from(name: &str) -> Self {
        Self {
            level: None,
            name: Some(name.to_string()),
        }
    }
}

/// Body for replacing a flow
#[derive(Debug, Clone, Deserialize)]
pub struct SaveFlowInput {
    pub doc_type: Option<DocType>,
    #[serde(default)]
    pub stages: Vec<StageInput>,
}

/// The current stage list for a document type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalFlow {
    pub doc_type: DocType,
    /// Zero only for the implicit single-stage flow used when none is stored
    pub version: i32,
    pub stages: Vec<ApprovalStage>,
    pub saved_at: DateTime<Utc>,
}

impl ApprovalFlow {
    /// Builds the next version of a flow from client stages
    pub fn define(
        doc_type: DocType,
        stages: &[StageInput],
        previous_version: Option<i32>,
    ) -> DomainResult<Self> {
        Ok(Self {
            doc_type,
            version: previous_version.unwrap_or(0) + 1,
            stages: normalize_stages(stages)?,
            saved_at: Utc::now(),
        })
    }

    /// Flow snapshotted by documents created while no flow is stored
    pub fn implicit(doc_type: DocType) -> Self {
        Self {
            doc_type,
            version: 0,
            stages: vec![ApprovalStage {
                level: 1,
                name: stage_label(1),
            }],
            saved_at: Utc::now(),
        }
    }

    pub fn final_level(&self) -> i32 {
        self.stages.len() as i32
    }
}

fn stage_label(level: i32) -> String {
    format!("Level {}", level)
}

/// Renumbers stages 1..N in input order and fills blank names
pub fn normalize_stages(stages: &[StageInput]) -> DomainResult<Vec<ApprovalStage>> {
    if stages.is_empty() {
        return Err(DomainError::validation(
            "stages",
            "Approval flow must have at least one stage",
        ));
    }

    Ok(stages
        .iter()
        .enumerate()
        .map(|(idx, stage)| {
            let level = idx as i32 + 1;
            let name = stage
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| stage_label(level));
            ApprovalStage { level, name }
        })
        .collect())
}

/// Approval fields carried by every PR and PO.
///
/// Stages are a copy of the flow at document creation; later flow changes
/// never reach an existing document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalState {
    pub approval_status: ApprovalStatus,
    pub approval_level: i32,
    pub approval_stages: Vec<ApprovalStage>,
    pub flow_version: i32,
}

impl ApprovalState {
    pub fn snapshot(flow: &ApprovalFlow) -> Self {
        Self {
            approval_status: ApprovalStatus::Pending,
            approval_level: 0,
            approval_stages: flow.stages.clone(),
            flow_version: flow.version,
        }
    }

    pub fn final_level(&self) -> i32 {
        self.approval_stages.len() as i32
    }

    /// Stage awaiting a decision, if any
    pub fn next_stage(&self) -> Option<&ApprovalStage> {
        if self.approval_status.is_terminal() {
            return None;
        }
        self.approval_stages
            .iter()
            .find(|s| s.level == self.approval_level + 1)
    }

    pub fn approve(&mut self) -> DomainResult<()> {
        self.ensure_open()?;

        let final_level = self.final_level();
        if self.approval_level >= final_level {
            return Err(DomainError::invalid_state(format!(
                "no approval stage beyond level {}",
                final_level
            )));
        }

        self.approval_level += 1;
        self.approval_status = if self.approval_level == final_level {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::InProgress
        };
        Ok(())
    }

    pub fn reject(&mut self) -> DomainResult<()> {
        self.ensure_open()?;
        self.approval_status = ApprovalStatus::Rejected;
        Ok(())
    }

    pub fn apply(&mut self, decision: Decision) -> DomainResult<()> {
        match decision {
            Decision::Approve => self.approve(),
            Decision::Reject => self.reject(),
        }
    }

    fn ensure_open(&self) -> DomainResult<()> {
        match self.approval_status {
            ApprovalStatus::Approved => Err(DomainError::invalid_state(
                "document is already approved",
            )),
            ApprovalStatus::Rejected => Err(DomainError::invalid_state(
                "document has been rejected",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(names: &[&str]) -> ApprovalFlow {
        let stages: Vec<StageInput> = names.iter().map(|n| StageInput::from(*n)).collect();
        ApprovalFlow::define(DocType::Po, &stages, None).unwrap()
    }

    #[test]
    fn test_normalize_renumbers_and_fills_names() {
        let stages = vec![
            StageInput {
                level: Some(7),
                name: Some("  Manager ".into()),
            },
            StageInput {
                level: Some(2),
                name: Some("".into()),
            },
            StageInput::default(),
        ];

        let normalized = normalize_stages(&stages).unwrap();
        assert_eq!(
            normalized,
            vec![
                ApprovalStage { level: 1, name: "Manager".into() },
                ApprovalStage { level: 2, name: "Level 2".into() },
                ApprovalStage { level: 3, name: "Level 3".into() },
            ]
        );
    }

    #[test]
    fn test_empty_flow_rejected() {
        let err = ApprovalFlow::define(DocType::Pr, &[], Some(3)).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "stages"));
    }

    #[test]
    fn test_versions_increase() {
        let first = ApprovalFlow::define(DocType::Pr, &[StageInput::from("A")], None).unwrap();
        let second =
            ApprovalFlow::define(DocType::Pr, &[StageInput::from("A")], Some(first.version)).unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
    }

    #[test]
    fn test_two_stage_approval() {
        let mut state = ApprovalState::snapshot(&flow(&["Manager", "Finance"]));
        assert_eq!(state.approval_status, ApprovalStatus::Pending);
        assert_eq!(state.next_stage().map(|s| s.name.as_str()), Some("Manager"));

        state.approve().unwrap();
        assert_eq!(state.approval_level, 1);
        assert_eq!(state.approval_status, ApprovalStatus::InProgress);

        state.approve().unwrap();
        assert_eq!(state.approval_level, 2);
        assert_eq!(state.approval_status, ApprovalStatus::Approved);
        assert!(state.next_stage().is_none());

        let err = state.approve().unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(state.approval_level, 2);
    }

    #[test]
    fn test_reject_is_terminal() {
        let mut state = ApprovalState::snapshot(&flow(&["Manager", "Finance"]));
        state.approve().unwrap();
        state.apply(Decision::Reject).unwrap();
        assert_eq!(state.approval_status, ApprovalStatus::Rejected);
        assert_eq!(state.approval_level, 1);

        assert!(state.apply(Decision::Approve).is_err());
        assert!(state.apply(Decision::Reject).is_err());
    }

    #[test]
    fn test_implicit_flow_single_stage() {
        let mut state = ApprovalState::snapshot(&ApprovalFlow::implicit(DocType::Pr));
        assert_eq!(state.flow_version, 0);
        assert_eq!(state.approval_stages[0].name, "Level 1");

        state.approve().unwrap();
        assert_eq!(state.approval_status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::InProgress,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
        ] {
            assert_eq!(ApprovalStatus::from_str(status.as_str()), Some(status));
        }
    }
}
