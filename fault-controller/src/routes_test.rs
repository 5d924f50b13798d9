use std::time::Duration;

use fault_core::fault::{Fault, FaultMode, Faultload};
use fault_core::report::{
	ReportsResponse, ResponseData, TraceReport, UidRequest, UidResponse, UnregisterRequest,
};
use fault_core::trace::{SpanId, TraceId};
use fault_core::uid::{FaultUid, PartialInjectionPoint};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::router;
use crate::AppState;
use crate::config::Config;

const TRACE: &str = "0af7651916cd43dd8448eb211c80319c";

fn trace_id() -> TraceId {
	TraceId::from(TRACE)
}

fn partial(sig: &str) -> PartialInjectionPoint {
	PartialInjectionPoint {
		destination: "api".to_string(),
		signature: sig.to_string(),
		payload: None,
	}
}

fn uid_request(span: &str, parent: &str, sig: &str, initial: bool, preds: bool) -> UidRequest {
	UidRequest {
		trace_id: trace_id(),
		span_id: SpanId::from(span),
		parent_span_id: SpanId::from(parent),
		partial_point: partial(sig),
		is_initial: initial,
		include_predecessors: preds,
	}
}

fn completed_report(span: &str, uid: FaultUid) -> TraceReport {
	TraceReport {
		trace_id: trace_id(),
		span_id: SpanId::from(span),
		uid,
		is_initial: false,
		protocol: "HTTP".to_string(),
		injected_fault: None,
		response: Some(ResponseData {
			status: 200,
			body: String::new(),
			duration_ms: 1.0,
			overhead_duration_ms: 0.1,
		}),
		concurrent_to: Some(vec![]),
	}
}

async fn spawn_controller(proxies: Vec<String>) -> (AppState, String) {
	fault_core::telemetry::testing::setup_test_logging();
	let cfg = Config {
		port: 0,
		proxy_list: proxies,
		proxy_retry_count: 2,
		proxy_timeout: Duration::from_millis(100),
		use_otel: false,
	};
	let state = AppState::new(&cfg).unwrap();
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let app = router(state.clone());
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(state, format!("http://{addr}"))
}

async fn get_uid(client: &reqwest::Client, base: &str, request: &UidRequest) -> FaultUid {
	let resp = client
		.post(format!("{base}/v1/proxy/get-uid"))
		.json(request)
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);
	resp.json::<UidResponse>().await.unwrap().uid
}

#[tokio::test]
async fn register_report_fetch_unregister_lifecycle() {
	let (_state, base) = spawn_controller(vec![]).await;
	let client = reqwest::Client::new();

	let resp = client
		.post(format!("{base}/v1/faultload/register"))
		.json(&Faultload {
			trace_id: Some(trace_id()),
			faults: vec![],
		})
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);

	let uid = get_uid(
		&client,
		&base,
		&uid_request("s1", "0", "GET /x", true, false),
	)
	.await;
	let resp = client
		.post(format!("{base}/v1/proxy/report"))
		.json(&completed_report("s1", uid))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);

	let resp = client
		.get(format!("{base}/v1/trace/{TRACE}"))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);
	let reports: ReportsResponse = resp.json().await.unwrap();
	assert_eq!(reports.reports.len(), 1);
	assert!(reports.reports[0].response.is_some());

	let resp = client
		.post(format!("{base}/v1/faultload/unregister"))
		.json(&UnregisterRequest {
			trace_id: Some(trace_id()),
		})
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);

	// the trace is no longer of interest
	let resp = client
		.get(format!("{base}/v1/trace/{TRACE}"))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 404);
	let resp = client
		.post(format!("{base}/v1/proxy/report"))
		.json(&completed_report("s2", FaultUid::root()))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn uid_counts_identical_siblings_densely() {
	let (_state, base) = spawn_controller(vec![]).await;
	let client = reqwest::Client::new();

	let parent_uid = get_uid(
		&client,
		&base,
		&uid_request("p1", "0", "GET /parent", true, false),
	)
	.await;
	assert_eq!(parent_uid.stack.as_ref().unwrap().len(), 1);
	assert_eq!(parent_uid.stack.as_ref().unwrap()[0].count, 0);

	// two identical child calls under the same parent
	let first = get_uid(
		&client,
		&base,
		&uid_request("c1", "p1", "GET /child", false, false),
	)
	.await;
	let second = get_uid(
		&client,
		&base,
		&uid_request("c2", "p1", "GET /child", false, false),
	)
	.await;
	assert_eq!(first.stack.as_ref().unwrap().len(), 2);
	assert_eq!(first.point().unwrap().count, 0);
	assert_eq!(second.point().unwrap().count, 1);
	assert!(first.point().unwrap().predecessors.is_none());
}

#[tokio::test]
async fn uid_requires_a_known_parent() {
	let (_state, base) = spawn_controller(vec![]).await;
	let client = reqwest::Client::new();
	let resp = client
		.post(format!("{base}/v1/proxy/get-uid"))
		.json(&uid_request("c1", "missing", "GET /x", false, false))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn predecessor_aware_uids() {
	let (_state, base) = spawn_controller(vec![]).await;
	let client = reqwest::Client::new();

	// parent P with a completed report
	let parent_uid = get_uid(
		&client,
		&base,
		&uid_request("p1", "0", "GET /parent", true, false),
	)
	.await;
	client
		.post(format!("{base}/v1/proxy/report"))
		.json(&completed_report("p1", parent_uid))
		.send()
		.await
		.unwrap();

	// two completed children with partials X and Y, both count 0
	for (span, sig) in [("x1", "GET /x"), ("y1", "GET /y")] {
		let uid = get_uid(&client, &base, &uid_request(span, "p1", sig, false, false)).await;
		client
			.post(format!("{base}/v1/proxy/report"))
			.json(&completed_report(span, uid))
			.send()
			.await
			.unwrap();
	}

	// a third call Z with usepred sees {X:0, Y:0} and count 0
	let z1 = get_uid(
		&client,
		&base,
		&uid_request("z1", "p1", "GET /z", false, true),
	)
	.await;
	let point = z1.point().unwrap();
	assert_eq!(point.count, 0);
	let preds = point.predecessors.as_ref().unwrap();
	assert_eq!(preds.0.len(), 2);
	assert_eq!(preds.0["api:GET /x"], 0);
	assert_eq!(preds.0["api:GET /y"], 0);

	// a second Z under the same predecessor set gets count 1; the stub of z1
	// is incomplete and must not show up as a predecessor
	let z2 = get_uid(
		&client,
		&base,
		&uid_request("z2", "p1", "GET /z", false, true),
	)
	.await;
	let point = z2.point().unwrap();
	assert_eq!(point.count, 1);
	assert_eq!(point.predecessors.as_ref().unwrap().0.len(), 2);
}

#[tokio::test]
async fn register_fans_out_to_proxies() {
	let proxy = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/faultload/register"))
		.respond_with(ResponseTemplate::new(200).set_body_string("OK"))
		.mount(&proxy)
		.await;
	let proxy_addr = proxy.address().to_string();
	let (_state, base) = spawn_controller(vec![proxy_addr]).await;

	let resp = reqwest::Client::new()
		.post(format!("{base}/v1/faultload/register"))
		.json(&Faultload {
			trace_id: Some(trace_id()),
			faults: vec![Fault {
				uid: FaultUid::any(),
				mode: FaultMode::Delay {
					duration: Duration::from_millis(10),
				},
			}],
		})
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);
	assert_eq!(proxy.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn register_fails_when_a_proxy_stays_unreachable() {
	// a server with no matching mock rejects every attempt
	let proxy = MockServer::start().await;
	let proxy_addr = proxy.address().to_string();
	let (state, base) = spawn_controller(vec![proxy_addr]).await;

	let resp = reqwest::Client::new()
		.post(format!("{base}/v1/faultload/register"))
		.json(&Faultload {
			trace_id: Some(trace_id()),
			faults: vec![],
		})
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 500);
	// both attempts were made
	assert_eq!(proxy.received_requests().await.unwrap().len(), 2);
	// the local registration happened before the fan-out failed
	assert!(state.faults.is_registered(&trace_id()));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
	let (_state, base) = spawn_controller(vec![]).await;
	let client = reqwest::Client::new();
	let resp = client
		.post(format!("{base}/v1/faultload/register"))
		.header("content-type", "application/json")
		.body("{not json")
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 400);

	// an unknown fault mode is rejected at parse time
	let resp = client
		.post(format!("{base}/v1/faultload/register"))
		.header("content-type", "application/json")
		.body(format!(
			r#"{{"trace_id":"{TRACE}","faults":[{{"uid":{{"stack":null}},"mode":{{"type":"PACKET_LOSS","args":["1"]}}}}]}}"#
		))
		.send()
		.await
		.unwrap();
	assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn clear_wipes_reports_and_registry() {
	let (state, base) = spawn_controller(vec![]).await;
	let client = reqwest::Client::new();
	client
		.post(format!("{base}/v1/faultload/register"))
		.json(&Faultload {
			trace_id: Some(trace_id()),
			faults: vec![],
		})
		.send()
		.await
		.unwrap();
	let uid = get_uid(
		&client,
		&base,
		&uid_request("s1", "0", "GET /x", true, false),
	)
	.await;
	client
		.post(format!("{base}/v1/proxy/report"))
		.json(&completed_report("s1", uid))
		.send()
		.await
		.unwrap();

	let resp = client.get(format!("{base}/v1/clear")).send().await.unwrap();
	assert_eq!(resp.status(), 200);

	assert!(!state.faults.is_registered(&trace_id()));
	assert!(state.reports.get_by_trace_id(&trace_id()).is_empty());
}
