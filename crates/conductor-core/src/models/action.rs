//! The recursive execution plan attached to desired LRPs and tasks.
//!
//! Conductor never executes actions; it only checks that a tree is
//! structurally well formed before persisting it. On the wire each node is
//! an externally tagged object: `{"run": {"path": "/bin/x"}}`.

use serde::{Deserialize, Serialize};

use super::EnvironmentVariable;
use crate::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Download(DownloadAction),
    Run(RunAction),
    Serial(SerialAction),
    Parallel(ParallelAction),
    EmitProgress(EmitProgressAction),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadAction {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cache_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunAction {
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvironmentVariable>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialAction {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelAction {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitProgressAction {
    pub action: Box<Action>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub success_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_message: String,
}

impl Action {
    /// Tag used on the wire and in validation field paths.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Download(_) => "download",
            Action::Run(_) => "run",
            Action::Serial(_) => "serial",
            Action::Parallel(_) => "parallel",
            Action::EmitProgress(_) => "emit_progress",
        }
    }

    /// Structural check of the whole tree. `prefix` is the field path of
    /// this node, used to name violations.
    pub fn validate(&self, prefix: &str) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        let here = format!("{prefix}.{}", self.kind());

        match self {
            Action::Download(a) => {
                if a.from.is_empty() {
                    errors.push(format!("{here}.from"), "must not be empty");
                }
                if a.to.is_empty() {
                    errors.push(format!("{here}.to"), "must not be empty");
                }
            }
            Action::Run(a) => {
                if a.path.is_empty() {
                    errors.push(format!("{here}.path"), "must not be empty");
                }
            }
            Action::Serial(SerialAction { actions }) | Action::Parallel(ParallelAction { actions }) => {
                if actions.is_empty() {
                    errors.push(format!("{here}.actions"), "must contain at least one action");
                }
                for (i, child) in actions.iter().enumerate() {
                    if let Err(e) = child.validate(&format!("{here}.actions[{i}]")) {
                        errors.extend(e);
                    }
                }
            }
            Action::EmitProgress(a) => {
                if let Err(e) = a.action.validate(&format!("{here}.action")) {
                    errors.extend(e);
                }
            }
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(path: &str) -> Action {
        Action::Run(RunAction {
            path: path.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn run_action_wire_shape() {
        let json = serde_json::to_value(run("/bin/x")).unwrap();
        assert_eq!(json, serde_json::json!({ "run": { "path": "/bin/x" } }));
    }

    #[test]
    fn nested_tree_decodes() {
        let json = serde_json::json!({
            "serial": {
                "actions": [
                    { "download": { "from": "http://blob/app.tgz", "to": "/app" } },
                    { "emit_progress": {
                        "action": { "run": { "path": "/app/start", "args": ["-p", "8080"] } },
                        "start_message": "starting"
                    } }
                ]
            }
        });
        let action: Action = serde_json::from_value(json).unwrap();
        let Action::Serial(serial) = &action else {
            panic!("expected serial, got {action:?}");
        };
        assert_eq!(serial.actions.len(), 2);
        assert!(action.validate("action").is_ok());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let json = serde_json::json!({ "teleport": {} });
        assert!(serde_json::from_value::<Action>(json).is_err());
    }

    #[test]
    fn validation_reports_every_nested_violation() {
        let action = Action::Serial(SerialAction {
            actions: vec![
                run(""),
                Action::Parallel(ParallelAction { actions: vec![] }),
                Action::Download(DownloadAction::default()),
            ],
        });

        let err = action.validate("action").unwrap_err();
        assert_eq!(
            err.field_names(),
            vec![
                "action.serial.actions[0].run.path",
                "action.serial.actions[1].parallel.actions",
                "action.serial.actions[2].download.from",
                "action.serial.actions[2].download.to",
            ]
        );
    }

    #[test]
    fn emit_progress_validates_inner_action() {
        let action = Action::EmitProgress(EmitProgressAction {
            action: Box::new(run("")),
            start_message: String::new(),
            success_message: String::new(),
            failure_message: String::new(),
        });
        let err = action.validate("action").unwrap_err();
        assert_eq!(err.field_names(), vec!["action.emit_progress.action.run.path"]);
    }
}
