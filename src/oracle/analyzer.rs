//! Request analysis: prompt → oracle → verdict.

use std::sync::Arc;

use crate::inspect::{InterpretedBody, RequestSnapshot};
use crate::oracle::client::Oracle;
use crate::oracle::prompt::PromptBuilder;
use crate::oracle::verdict::{OracleVerdict, VerdictParser};

/// Produces exactly one verdict per snapshot.
#[derive(Clone)]
pub struct Analyzer {
    oracle: Arc<dyn Oracle>,
    prompts: PromptBuilder,
    parser: VerdictParser,
}

impl Analyzer {
    pub fn new(oracle: Arc<dyn Oracle>, prompts: PromptBuilder, parser: VerdictParser) -> Self {
        Self {
            oracle,
            prompts,
            parser,
        }
    }

    pub async fn analyze(&self, snapshot: &RequestSnapshot, body: &InterpretedBody) -> OracleVerdict {
        let prompt = self.prompts.build(snapshot, body);
        let answer = self.oracle.query(prompt.as_str()).await;
        let verdict = self.parser.parse(&answer);

        if verdict.is_malicious {
            tracing::warn!(
                path = %snapshot.path(),
                client_ip = %snapshot.client_ip(),
                rationale = %verdict.rationale,
                "Anomaly detected"
            );
        }
        verdict
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("prompt_mode", &self.prompts.mode())
            .field("parser", &self.parser)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OracleConfig, PromptMode};
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::Request;
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed string.
    struct Recorder {
        answer: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Oracle for Recorder {
        async fn query(&self, prompt: &str) -> String {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.to_string()
        }
    }

    fn analyzer(oracle: Arc<Recorder>, mode: PromptMode) -> Analyzer {
        Analyzer::new(
            oracle,
            PromptBuilder::new(mode),
            VerdictParser::from_config(&OracleConfig::default()).unwrap(),
        )
    }

    fn snapshot(body: &'static str) -> RequestSnapshot {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri("/upload")
            .body(())
            .unwrap()
            .into_parts();
        RequestSnapshot::from_parts(&parts, Bytes::from_static(body.as_bytes()), "127.0.0.1:1".parse().unwrap())
    }

    #[tokio::test]
    async fn test_one_query_per_analysis() {
        let oracle = Arc::new(Recorder {
            answer: "RESULT: MALICIOUS\nREASON: web shell upload",
            prompts: Mutex::new(Vec::new()),
        });
        let snap = snapshot("------b\nContent-Disposition: form-data; name=\"f\"; filename=\"x.php\"\n\n<?php ?>\n------b--\n");
        let body = InterpretedBody::interpret(snap.body_text());

        let verdict = analyzer(oracle.clone(), PromptMode::Full).analyze(&snap, &body).await;
        assert!(verdict.is_malicious);
        assert_eq!(verdict.rationale, "web shell upload");

        let prompts = oracle.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(r#""filename":"x.php""#));
        assert!(!prompts[0].contains("<?php"));
    }

    #[tokio::test]
    async fn test_sentinel_answer_is_benign() {
        let oracle = Arc::new(Recorder {
            answer: crate::oracle::client::TIMEOUT_ANSWER,
            prompts: Mutex::new(Vec::new()),
        });
        let snap = snapshot("");
        let body = InterpretedBody::interpret(snap.body_text());
        let verdict = analyzer(oracle, PromptMode::BodyOnly).analyze(&snap, &body).await;
        assert_eq!(verdict, OracleVerdict::default());
    }
}
