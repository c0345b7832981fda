use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mobvis_api::{build_router, ApiConfig};
use mobvis_core::engine::StrideKey;
use mobvis_core::{FixtureEngine, GaitEngine, GRAV_MS2, NO_GAIT_PARAMETERS_MESSAGE};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "mobvis-test-boundary";
const PRIMARY: &str = "/api/py/dmo_extraction";
const LEGACY: &str = "/dmo_extraction";

fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../mobvis-core/tests/data")
        .join(name);
    std::fs::read(path).expect("read fixture")
}

fn sinusoid_csv(rows: usize, hz: f64) -> Vec<u8> {
    let mut csv = String::from("samples,acc_x,acc_y,acc_z,gyr_x,gyr_y,gyr_z\n");
    for i in 0..rows {
        let t = i as f64 / hz;
        let phase = 2.0 * std::f64::consts::PI * t;
        csv.push_str(&format!(
            "{i},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5}\n",
            9.81 + 0.8 * phase.sin(),
            0.3 * (2.0 * phase).sin(),
            0.2 * phase.cos(),
            12.0 * phase.sin(),
            8.0 * phase.cos(),
            4.0 * (2.0 * phase).sin(),
        ));
    }
    csv.into_bytes()
}

struct Form {
    fields: Vec<(String, String)>,
    upload: Option<(String, Vec<u8>)>,
}

impl Form {
    fn standard(csv: Vec<u8>) -> Self {
        Self {
            fields: [
                ("name", "Morning walk"),
                ("description", "lower back sensor"),
                ("samplingRate", "100"),
                ("sensorHeight", "1.0"),
                ("patientHeight", "1.7"),
                ("setting", "laboratory"),
                ("convertToMs", "false"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            upload: Some(("csvFile".to_string(), csv)),
        }
    }

    fn set(mut self, name: &str, value: &str) -> Self {
        self.fields.retain(|(k, _)| k != name);
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    fn upload_as(mut self, field: &str) -> Self {
        if let Some((name, _)) = self.upload.as_mut() {
            *name = field.to_string();
        }
        self
    }

    fn without_upload(mut self) -> Self {
        self.upload = None;
        self
    }

    fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in &self.fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((name, csv)) = &self.upload {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"recording.csv\"\r\nContent-Type: text/csv\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(csv);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}

fn router(engine: Arc<dyn GaitEngine>) -> Router {
    build_router(&ApiConfig::default(), engine).expect("router")
}

async fn post(router: Router, path: &str, form: &Form) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(form.body()))
        .expect("request");
    let response = router.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).expect("json body");
    (status, json)
}

fn column(rows: &Value, name: &str) -> Vec<Value> {
    rows.as_array()
        .expect("array of records")
        .iter()
        .map(|row| row[name].clone())
        .collect()
}

#[tokio::test]
async fn primary_endpoint_returns_shaped_tables() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_lowerback_g.csv"));
    let (status, body) = post(router(engine.clone()), PRIMARY, &form).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(engine.runs(), 1);
    assert_eq!(body["total_walking_duration"].as_f64(), Some(0.0145));

    let per_wb = &body["per_wb_parameters"];
    assert_eq!(column(per_wb, "wb_id"), [0, 1, 2]);
    assert_eq!(per_wb[1]["stride_length_m"].as_f64(), Some(0.0));
    assert_eq!(per_wb[2]["walking_speed_mps"].as_f64(), Some(0.0));
    assert_eq!(per_wb[2]["stride_duration_s"].as_f64(), Some(0.0));
    for row in per_wb.as_array().expect("per-bout rows") {
        assert!(row.get("rule_name").is_none());
        assert!(row.get("rule_obj").is_none());
    }

    let per_stride = &body["per_stride_parameters"];
    assert_eq!(column(per_stride, "s_id"), [0, 1, 0, 1, 0]);
    assert_eq!(column(per_stride, "wb_id"), [0, 0, 1, 1, 2]);
    assert!(per_stride[0].get("original_gs_id").is_none());
    assert_eq!(per_stride[4]["lr_label"], 0);

    let params: Vec<Value> = column(&body["aggregate_parameters"], "param");
    assert!(params.contains(&Value::from("cadence_spm")));
    for excluded in ["wb_id", "start", "end", "rule_name"] {
        assert!(!params.contains(&Value::from(excluded)), "{excluded}");
    }
}

#[tokio::test]
async fn legacy_endpoint_requires_public_flag_and_uses_minus_one() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_lowerback_g.csv")).upload_as("file");

    let (status, body) = post(router(engine.clone()), LEGACY, &form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "missing form field 'public'");
    assert_eq!(engine.runs(), 0);

    let form = form.set("public", "true");
    let (status, body) = post(router(engine.clone()), LEGACY, &form).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.get("total_walking_duration").is_none());
    assert_eq!(body["per_wb_parameters"][1]["stride_length_m"].as_f64(), Some(-1.0));
    assert_eq!(body["per_stride_parameters"][4]["lr_label"], -1);
}

#[tokio::test]
async fn either_upload_field_name_is_accepted() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_lowerback_g.csv")).upload_as("file");
    let (status, _) = post(router(engine.clone()), PRIMARY, &form).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(router(engine), PRIMARY, &form.without_upload()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap_or_default().contains("csvFile"));
}

#[tokio::test]
async fn missing_column_is_a_format_error() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_missing_gyr_z.csv"));
    let (status, body) = post(router(engine.clone()), PRIMARY, &form).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap_or_default().contains("gyr_z"));
    assert_eq!(engine.runs(), 0);
}

#[tokio::test]
async fn invalid_setting_cites_both_conditions() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_lowerback_g.csv")).set("setting", "invalid_value");
    let (status, body) = post(router(engine.clone()), PRIMARY, &form).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().unwrap_or_default();
    assert!(detail.contains("laboratory"), "{detail}");
    assert!(detail.contains("free_living"), "{detail}");
    assert_eq!(engine.runs(), 0);
}

#[tokio::test]
async fn setting_must_match_exactly() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_lowerback_g.csv")).set("setting", " laboratory");
    let (status, body) = post(router(engine.clone()), PRIMARY, &form).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap_or_default()
        .contains("free_living"));
    assert_eq!(engine.runs(), 0);
}

#[tokio::test]
async fn malformed_stride_key_is_a_client_error() {
    let mut result = FixtureEngine::sample_result().expect("sample result");
    result.per_stride_parameters.index[0] = StrideKey::new(0, "stride0");
    let engine = Arc::new(FixtureEngine::returning(result));
    let form = Form::standard(fixture("imu_lowerback_g.csv"));
    let (status, body) = post(router(engine.clone()), PRIMARY, &form).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "stride id 'stride0' is not of the form '<wb_id>_<stride_id>'"
    );
    assert_eq!(engine.runs(), 1);
}

#[tokio::test]
async fn malformed_numbers_are_rejected() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_lowerback_g.csv")).set("samplingRate", "fast");
    let (status, body) = post(router(engine), PRIMARY, &form).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap_or_default()
        .contains("samplingRate"));
}

#[tokio::test]
async fn no_walking_bouts_returns_fixed_message() {
    let engine = Arc::new(FixtureEngine::without_walking_bouts());
    let form = Form::standard(fixture("imu_lowerback_g.csv"));
    let (status, body) = post(router(engine.clone()), PRIMARY, &form).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], NO_GAIT_PARAMETERS_MESSAGE);
    assert_eq!(engine.runs(), 1);
}

#[tokio::test]
async fn engine_failures_pass_through_or_are_rewritten() {
    let engine = Arc::new(FixtureEngine::failing(
        "A value (0.0) in x_new is below the interpolation range's minimum value (0.01).",
    ));
    let form = Form::standard(fixture("imu_lowerback_g.csv"));
    let (status, body) = post(router(engine), PRIMARY, &form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "The sampling rate may be too high.");

    let engine = Arc::new(FixtureEngine::failing("No initial contacts detected"));
    let (status, body) = post(router(engine), PRIMARY, &form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No initial contacts detected");
}

#[tokio::test]
async fn accelerations_are_converted_before_the_engine_runs() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let form = Form::standard(fixture("imu_lowerback_g.csv")).set("convertToMs", "true");
    let (status, _) = post(router(engine.clone()), PRIMARY, &form).await;
    assert_eq!(status, StatusCode::OK);

    let record = engine.last_record().expect("engine saw a record");
    assert_eq!(record.sampling_rate_hz, 100);
    let acc_x = record.recording.channel("acc_x").expect("acc_x");
    let first = acc_x[0].expect("first sample");
    assert!((first - 0.981 * GRAV_MS2).abs() < 1e-9);
}

#[tokio::test]
async fn synthetic_walk_never_faults() {
    let csv = sinusoid_csv(1000, 100.0);
    for engine in [
        Arc::new(FixtureEngine::sample().expect("sample engine")),
        Arc::new(FixtureEngine::without_walking_bouts()),
        Arc::new(FixtureEngine::failing("No initial contacts detected")),
    ] {
        let (status, body) = post(router(engine), PRIMARY, &Form::standard(csv.clone())).await;
        assert!(
            status == StatusCode::OK || status == StatusCode::BAD_REQUEST,
            "{status}: {body}"
        );
        if status == StatusCode::BAD_REQUEST {
            assert!(body["detail"].is_string());
        }
    }
}

#[tokio::test]
async fn non_multipart_body_is_a_client_error() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let request = Request::builder()
        .method(Method::POST)
        .uri(PRIMARY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .expect("request");
    let response = router(engine).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preflight_allows_configured_origin_only() {
    let engine = Arc::new(FixtureEngine::sample().expect("sample engine"));
    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri(PRIMARY)
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .expect("request")
    };

    let response = router(engine.clone())
        .oneshot(preflight("http://localhost:3000"))
        .await
        .expect("response");
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");

    let response = router(engine)
        .oneshot(preflight("https://elsewhere.example"))
        .await
        .expect("response");
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn health_reports_engine() {
    let engine = Arc::new(FixtureEngine::without_walking_bouts());
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let response = router(engine).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["engine"], "fixture");
}
