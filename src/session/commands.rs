use serde::{Deserialize, Serialize};

use super::coordinator::SessionCoordinator;
use super::state::AnalysisStatus;

/// Requests a UI sends to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    StartAnalysis { session_id: String },
    #[serde(rename_all = "camelCase")]
    GetResults { session_id: String },
    #[serde(rename_all = "camelCase")]
    ClearResults { session_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ack {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Status(AnalysisStatus),
}

impl Response {
    fn ok() -> Self {
        Response::Ack {
            success: true,
            error: None,
        }
    }
}

impl SessionCoordinator {
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::StartAnalysis { session_id } => match self.start(&session_id).await {
                Ok(_) => Response::ok(),
                Err(err) => Response::Ack {
                    success: false,
                    error: Some(err.to_string()),
                },
            },
            Request::GetResults { session_id } => Response::Status(self.get_status(&session_id)),
            Request::ClearResults { session_id } => Response::Ack {
                success: self.clear(&session_id),
                error: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::replay::{PageTrace, ReplayConnector, ReplayPage};
    use crate::session::coordinator::PAGE_NOT_READY;
    use std::sync::Arc;

    #[test]
    fn test_requests_parse_from_wire_shape() {
        let request: Request =
            serde_json::from_str(r#"{"action":"startAnalysis","sessionId":"tab-7"}"#).unwrap();
        assert_eq!(
            request,
            Request::StartAnalysis {
                session_id: "tab-7".into()
            }
        );
        assert!(serde_json::from_str::<Request>(r#"{"action":"ping"}"#).is_err());
    }

    #[test]
    fn test_responses_serialize_flat() {
        let json = serde_json::to_value(Response::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"success": true}));

        let json = serde_json::to_value(Response::Status(AnalysisStatus::Running {
            progress: 30,
            message: "Detecting configuration...".into(),
        }))
        .unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["progress"], 30);

        let json = serde_json::to_value(Response::Status(AnalysisStatus::NotStarted)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "not_started"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_round_trip() {
        let connector = Arc::new(ReplayConnector::new());
        connector.insert(
            "tab-1",
            Arc::new(ReplayPage::new(PageTrace {
                url: "https://blog.test/".into(),
                ..PageTrace::default()
            })),
        );
        let coordinator = SessionCoordinator::new(connector, AnalyzerConfig::default());

        let response = coordinator
            .handle(Request::StartAnalysis {
                session_id: "tab-2".into(),
            })
            .await;
        assert_eq!(
            response,
            Response::Ack {
                success: false,
                error: Some(PAGE_NOT_READY.to_string()),
            }
        );

        let response = coordinator
            .handle(Request::StartAnalysis {
                session_id: "tab-1".into(),
            })
            .await;
        assert_eq!(response, Response::ok());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let response = coordinator
            .handle(Request::GetResults {
                session_id: "tab-1".into(),
            })
            .await;
        assert!(matches!(
            response,
            Response::Status(AnalysisStatus::Completed { .. })
        ));

        let cleared = coordinator
            .handle(Request::ClearResults {
                session_id: "tab-1".into(),
            })
            .await;
        assert_eq!(cleared, Response::ok());
    }
}
