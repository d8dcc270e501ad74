//! Demonstrates draining the transaction feed against a mock creditor endpoint with the default
//! reqwest transport, then resuming from the stored cursor.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use twikey_client::{
	client::Client,
	config::ClientConfig,
	feed::{FeedCursor, HandlerResult},
	feeds::{FeedEntry, FeedOptions},
	reqwest::{Client as ReqwestClient, redirect::Policy},
	transport::ReqwestHttpClient,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/creditor").form_urlencoded_tuple("apiToken", "demo-key");
			then.status(200).header("Authorization", "demo-token");
		})
		.await;
	let page = server
		.mock_async(|when, then| {
			when.method(GET).path("/creditor/transaction").header("x-resume-after", "0");
			then.status(200)
				.header("content-type", "application/json")
				.header("X-LAST", "42")
				.body("{\"Entries\":[{\"id\":41,\"state\":\"PAID\"},{\"id\":42,\"state\":\"ERROR\"}]}");
		})
		.await;
	let empty = server
		.mock_async(|when, then| {
			when.method(GET).path("/creditor/transaction").header("x-resume-after", "42");
			then.status(200).header("content-type", "application/json").body("{\"Entries\":[]}");
		})
		.await;
	let config = ClientConfig::builder("demo-key").endpoint(Url::parse(&server.url("/"))?).build()?;
	let http_client = ReqwestHttpClient::with_client(
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(Policy::none())
			.build()?,
	);
	let client: Client<ReqwestHttpClient> = Client::with_transport(config, http_client);
	let mut cursor = FeedCursor::resume_after("0");
	let mut handler = |entry: FeedEntry| -> HandlerResult {
		println!(
			"Transaction {} is now {}.",
			entry.field("id").cloned().unwrap_or_default(),
			entry.str_field("state").unwrap_or("unknown"),
		);

		Ok(())
	};
	let summary = client.transaction_feed(&mut cursor, &mut handler, &FeedOptions::new()).await?;

	println!(
		"Drained {} events over {} pages; resume after {:?} next time.",
		summary.events,
		summary.pages,
		cursor.position(),
	);

	login.assert_async().await;
	page.assert_async().await;
	empty.assert_async().await;

	Ok(())
}
