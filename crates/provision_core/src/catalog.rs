use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::JobId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("stage catalog is empty")]
    Empty,
    #[error("stage id at position {0} is blank")]
    BlankStageId(usize),
    #[error("duplicate stage id {0:?}")]
    DuplicateStage(String),
}

/// One named step of a workflow, as supplied by the job-creation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    pub id: String,
    #[serde(alias = "display_name")]
    pub display_name: String,
}

impl StageSpec {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Ordered stage list for one workflow type. Earlier stages must finish before
/// later ones can start, which is what gap repair relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCatalog {
    stages: Vec<StageSpec>,
    positions: HashMap<String, usize>,
}

impl StageCatalog {
    pub fn new(stages: Vec<StageSpec>) -> Result<Self, CatalogError> {
        if stages.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut positions = HashMap::with_capacity(stages.len());
        for (index, stage) in stages.iter().enumerate() {
            if stage.id.trim().is_empty() {
                return Err(CatalogError::BlankStageId(index));
            }
            if positions.insert(stage.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateStage(stage.id.clone()));
            }
        }
        Ok(Self { stages, positions })
    }

    /// Convenience for catalogs whose display names equal their ids.
    pub fn from_ids<I, S>(ids: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            ids.into_iter()
                .map(|id| {
                    let id = id.into();
                    StageSpec::new(id.clone(), id)
                })
                .collect(),
        )
    }

    /// Placeholder catalog for provisional jobs; never reachable through `new`.
    pub(crate) fn placeholder() -> Self {
        Self {
            stages: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn index_of(&self, stage_id: &str) -> Option<usize> {
        self.positions.get(stage_id).copied()
    }

    pub fn get(&self, index: usize) -> Option<&StageSpec> {
        self.stages.get(index)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.stages.len().checked_sub(1)
    }
}

/// Wire shape of a job registration: `{ jobId, stages: [{ id, displayName }] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogContract {
    #[serde(alias = "job_id")]
    pub job_id: JobId,
    pub stages: Vec<StageSpec>,
}

impl CatalogContract {
    pub fn into_parts(self) -> Result<(JobId, StageCatalog), CatalogError> {
        let catalog = StageCatalog::new(self.stages)?;
        Ok((self.job_id, catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_follow_declaration_order() {
        let catalog = StageCatalog::from_ids(["profile", "gmail", "instagram"]).unwrap();
        assert_eq!(catalog.index_of("profile"), Some(0));
        assert_eq!(catalog.index_of("instagram"), Some(2));
        assert_eq!(catalog.index_of("tiktok"), None);
        assert_eq!(catalog.last_index(), Some(2));
    }

    #[test]
    fn rejects_duplicates_blank_and_empty() {
        assert_eq!(
            StageCatalog::from_ids(["a", "b", "a"]).unwrap_err(),
            CatalogError::DuplicateStage("a".to_string())
        );
        assert_eq!(
            StageCatalog::from_ids(["a", "  "]).unwrap_err(),
            CatalogError::BlankStageId(1)
        );
        assert_eq!(
            StageCatalog::from_ids(Vec::<String>::new()).unwrap_err(),
            CatalogError::Empty
        );
    }

    #[test]
    fn contract_accepts_camel_and_snake_case() {
        let contract: CatalogContract = serde_json::from_str(
            r#"{"jobId":"job1","stages":[{"id":"profile","displayName":"Profile"},{"id":"gmail","display_name":"Gmail"}]}"#,
        )
        .unwrap();
        let (job_id, catalog) = contract.into_parts().unwrap();
        assert_eq!(job_id, "job1");
        assert_eq!(catalog.get(1).unwrap().display_name, "Gmail");
    }
}
