use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde_json::json;

use crate::probe::{Probe, ProbeRequest};
use crate::results::ScenarioResult;
use crate::suite::{Flow, Suite, fmt_status};

use super::{HEADER_PROVIDER, HEADER_REQUEST_ID};

const JSON_TEST_BODY: &[u8] = br#"{"test": "data"}"#;
const SMOKE_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const SMOKE_ACCEPTED: &[u16] = &[200, 404, 502];

/// Method, whether it carries the JSON body, accepted statuses.
fn method_checks() -> [(Method, bool, &'static [u16]); 5] {
    [
        (Method::GET, false, &[200, 404]),
        (Method::POST, true, &[200, 201, 404]),
        (Method::PUT, true, &[200, 201, 404]),
        (Method::DELETE, false, &[200, 204, 404]),
        (Method::HEAD, false, &[200, 404]),
    ]
}

impl<P> Suite<P>
where
    P: Probe + 'static,
{
    /// One result per verb (`http_get`, `http_post`, ...) against `/{target}/test`.
    pub async fn http_methods(&mut self) -> Flow {
        let path = self.target_path("test");
        for (method, with_body, accepted) in method_checks() {
            let name = format!("http_{}", method.as_str().to_ascii_lowercase());
            tracing::info!(scenario = %name, "running scenario");

            let mut req = ProbeRequest::new(method.clone(), path.as_str());
            if with_body {
                req = req
                    .with_header("Content-Type", "application/json")
                    .with_body(Bytes::from_static(JSON_TEST_BODY));
            }
            let out = self.send(req).await;
            let passed = out.status_in(accepted);

            let msg = if passed {
                format!("HTTP {method} method")
            } else {
                format!("HTTP {method} unexpected status: {}", fmt_status(out.status))
            };
            self.record(
                ScenarioResult::new(
                    name,
                    passed,
                    json!({
                        "status": out.status,
                        "expected": accepted,
                    }),
                ),
                &msg,
            )?;
        }
        Ok(())
    }

    /// The proxy tags forwarded responses with a request id.
    pub async fn authentication(&mut self) -> Flow {
        tracing::info!(scenario = "authentication", "running scenario");
        let out = self.send(ProbeRequest::get(self.target_path("test"))).await;
        let has_request_id = out.headers.contains(HEADER_REQUEST_ID);
        let has_provider = out.headers.contains(HEADER_PROVIDER);
        let passed = out.status_in(&[200, 404]) && has_request_id;

        let msg = if passed {
            "Authentication and headers".to_string()
        } else if !has_request_id {
            format!(
                "Missing expected headers (status {})",
                fmt_status(out.status)
            )
        } else {
            format!("Authentication failed: {}", fmt_status(out.status))
        };
        self.record(
            ScenarioResult::new(
                "authentication",
                passed,
                json!({
                    "status": out.status,
                    "has_request_id": has_request_id,
                    "has_provider": has_provider,
                }),
            ),
            &msg,
        )
    }

    /// Hit every smoke target once. 502 is accepted: the target is routed but its upstream is down.
    pub async fn smoke_targets(&mut self) -> Flow {
        let targets = self.config.smoke_targets.clone();
        for target in targets {
            let name = format!("provider_{target}");
            tracing::info!(scenario = %name, "running scenario");

            let req = ProbeRequest::get(format!("/{target}/test")).with_timeout(SMOKE_PROBE_TIMEOUT);
            let out = self.send(req).await;
            let passed = out.status_in(SMOKE_ACCEPTED);

            let msg = if passed {
                format!("Target: {target}")
            } else {
                format!("Target {target} failed: {}", fmt_status(out.status))
            };
            self.record(
                ScenarioResult::new(name, passed, json!({ "status": out.status })),
                &msg,
            )?;
        }
        Ok(())
    }
}
