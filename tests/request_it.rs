#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use twikey_client::{
	_preludet::*,
	client::RequestBody,
	http::{HeaderMap, HeaderValue, Method, header::ACCEPT_LANGUAGE},
};

async fn client_with_login(server: &MockServer) -> ReqwestTestClient {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/creditor");
			then.status(200).header("Authorization", "tok-req");
		})
		.await;

	let config = test_config_builder(&server.url("/"), "api-key")
		.user_agent("acme-test/1.0")
		.build()
		.expect("Request test config should build successfully.");

	build_reqwest_test_client(config)
}

#[tokio::test]
async fn execute_injects_token_and_default_headers() {
	let server = MockServer::start_async().await;
	let client = client_with_login(&server).await;
	let call = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/creditor/tx/detail")
				.header("authorization", "tok-req")
				.header("accept", "application/json")
				.header("user-agent", "acme-test/1.0")
				.header("accept-language", "en");
			then.status(200).body("{\"Entries\":[]}");
		})
		.await;
	let body = client
		.request(Method::GET, "/creditor/tx/detail", RequestBody::Empty, HeaderMap::new())
		.await
		.expect("Authenticated request should succeed.");

	assert_eq!(body, b"{\"Entries\":[]}");

	call.assert_calls_async(1).await;
}

#[tokio::test]
async fn caller_headers_override_defaults() {
	let server = MockServer::start_async().await;
	let client = client_with_login(&server).await;
	let call = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/creditor/invoice")
				.header("accept-language", "nl")
				.header("content-type", "application/json")
				.body("{\"number\":\"INV-1\"}");
			then.status(200).header("content-type", "application/json").body("{\"id\":\"i-1\"}");
		})
		.await;
	let mut headers = HeaderMap::new();

	headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("nl"));

	let created: Value = client
		.request_json(
			Method::POST,
			"/creditor/invoice",
			RequestBody::Json(serde_json::json!({ "number": "INV-1" })),
			headers,
		)
		.await
		.expect("Overriding request should succeed.");

	assert_eq!(created["id"], "i-1");

	call.assert_calls_async(1).await;
}

#[tokio::test]
async fn bad_request_becomes_a_domain_error() {
	let server = MockServer::start_async().await;
	let client = client_with_login(&server).await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/creditor/mandate/update");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"code\":\"err_invalid_params\",\"message\":\"Invalid iban\"}");
		})
		.await;

	let err = client
		.request(
			Method::POST,
			"/creditor/mandate/update",
			RequestBody::form([("mndtId", "M1"), ("iban", "nope")]),
			HeaderMap::new(),
		)
		.await
		.expect_err("400 responses should fail.");

	assert!(matches!(
		err,
		Error::Domain { code, message } if code == "err_invalid_params" && message == "Invalid iban"
	));
}

#[tokio::test]
async fn server_errors_become_protocol_errors() {
	let server = MockServer::start_async().await;
	let client = client_with_login(&server).await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/creditor/transaction");
			then.status(502).body("upstream down");
		})
		.await;

	let err = client
		.request(Method::GET, "/creditor/transaction", RequestBody::Empty, HeaderMap::new())
		.await
		.expect_err("5xx responses should fail.");

	assert!(matches!(err, Error::Protocol { reason } if reason == "Bad Gateway"));
}

#[tokio::test]
async fn mandate_detail_merges_state_headers() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let client = client_with_login(&server).await;
	let detail = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/creditor/mandate/detail")
				.query_param("mndtId", "MNDT 1")
				.query_param("force", "true");
			then.status(200)
				.header("content-type", "application/json")
				.header("X-STATE", "signed")
				.header("X-COLLECTABLE", "true")
				.body("{\"Mndt\":{\"MndtId\":\"MNDT 1\"}}");
		})
		.await;
	let mandate = client.mandate_detail("MNDT 1", true).await?;

	assert_eq!(mandate["Mndt"]["MndtId"], "MNDT 1");
	assert_eq!(mandate["Mndt"]["State"], "signed");
	assert_eq!(mandate["Mndt"]["Collectable"], Value::Bool(true));

	detail.assert_calls_async(1).await;

	Ok(())
}

#[tokio::test]
async fn mandate_detail_without_headers_is_untouched() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let client = client_with_login(&server).await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/creditor/mandate/detail").query_param("mndtId", "M2");
			then.status(200).body("{\"Mndt\":{\"MndtId\":\"M2\"}}");
		})
		.await;

	let mandate = client.mandate_detail("M2", false).await?;

	assert_eq!(mandate, serde_json::json!({ "Mndt": { "MndtId": "M2" } }));

	Ok(())
}
