//! Representación almacenada.
//!
//! Una sola colección contiene tanto placeholders de instancia (sin
//! `executionId`) como ejecuciones completas. Los steps viajan embebidos en el
//! documento de su ejecución: cada mutación afecta a un único documento.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDocument {
    /// Obligatorio; se modela opcional para poder detectar su ausencia al
    /// decodificar documentos escritos por terceros.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<i64>,
    pub job_name: String,
    pub job_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub steps: Vec<StepDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_configuration_name: Option<String>,
}

impl ExecutionDocument {
    /// Documento placeholder de instancia: identidad sin ejecución.
    pub fn placeholder(instance_id: i64, job_name: &str, job_key: &str, parameters: Map<String, Value>) -> Self {
        Self { instance_id: Some(instance_id),
               job_name: job_name.to_string(),
               job_key: job_key.to_string(),
               execution_id: None,
               version: None,
               status: None,
               parameters,
               steps: Vec::new(),
               start_time: None,
               create_time: None,
               end_time: None,
               last_updated: None,
               exit_code: None,
               exit_description: None,
               execution_context: None,
               job_configuration_name: None }
    }

    pub fn is_placeholder(&self) -> bool {
        self.execution_id.is_none()
    }

    pub fn step(&self, step_execution_id: i64) -> Option<&StepDocument> {
        self.steps.iter().find(|s| s.step_execution_id == Some(step_execution_id))
    }

    /// Aplica un parche de actualización completa e incrementa la versión.
    pub fn apply_patch(&mut self, patch: &ExecutionPatch) {
        self.status = Some(patch.status.clone());
        self.create_time = patch.create_time;
        self.start_time = patch.start_time;
        self.end_time = patch.end_time;
        self.last_updated = patch.last_updated;
        self.exit_code = Some(patch.exit_code.clone());
        self.exit_description = Some(patch.exit_description.clone());
        self.job_configuration_name = patch.job_configuration_name.clone();
        self.version = Some(self.version.unwrap_or(0) + 1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_execution_id: Option<i64>,
    pub step_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_skip_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_skip_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_skip_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<Value>,
}

/// Campos que reescribe una actualización completa de ejecución. La versión
/// no viaja en el parche: la incrementa el propio store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPatch {
    pub status: String,
    pub create_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub exit_code: String,
    pub exit_description: String,
    pub job_configuration_name: Option<String>,
}

/// Versión y estado almacenados de una ejecución (lectura de sincronización).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub version: i64,
    pub status: Option<String>,
}

/// Documento de contador `{counterName, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDocument {
    pub counter_name: String,
    pub value: i64,
}

/// Fila agregada por instancia (resultado de agrupar registros por
/// `instanceId`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRow {
    pub instance_id: i64,
    pub job_name: String,
    pub job_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholder_omits_execution_fields() {
        let doc = ExecutionDocument::placeholder(3, "ReportJob", "abc", Map::new());
        let v = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(v, json!({"instanceId": 3, "jobName": "ReportJob", "jobKey": "abc", "parameters": {}, "steps": []}));
        assert!(doc.is_placeholder());
    }

    #[test]
    fn missing_optional_fields_deserialize() {
        let v = json!({"jobName": "j", "jobKey": "k", "executionId": 9,
                       "steps": [{"stepExecutionId": 1, "stepName": "s"}]});
        let doc: ExecutionDocument = serde_json::from_value(v).expect("deserialize");
        assert_eq!(doc.instance_id, None);
        assert_eq!(doc.steps[0].read_count, None);
        assert!(doc.step(1).is_some());
    }

    #[test]
    fn patch_bumps_version() {
        let mut doc = ExecutionDocument::placeholder(1, "j", "k", Map::new());
        doc.execution_id = Some(10);
        doc.version = Some(4);
        let patch = ExecutionPatch { status: "COMPLETED".into(),
                                     create_time: None,
                                     start_time: None,
                                     end_time: None,
                                     last_updated: None,
                                     exit_code: "COMPLETED".into(),
                                     exit_description: String::new(),
                                     job_configuration_name: None };
        doc.apply_patch(&patch);
        assert_eq!(doc.version, Some(5));
        assert_eq!(doc.status.as_deref(), Some("COMPLETED"));
    }
}
