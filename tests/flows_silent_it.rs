mod common;

// self
use common::*;

async fn seed_account(engine: &ReqwestEngine, refresh: Option<&str>) -> Authority {
	let authority =
		engine.config.authority(Some(SUSI)).expect("Policy authority should resolve.");

	engine
		.accounts
		.upsert(Account::new(home_account_id()).with_username("ada@example.com"))
		.await
		.expect("Seeding the account should succeed.");

	if let Some(refresh) = refresh {
		engine
			.cache
			.store_refresh_credential(RefreshCredential::new(
				home_account_id(),
				authority.clone(),
				refresh,
			))
			.await
			.expect("Seeding the refresh credential should succeed.");
	}

	authority
}

async fn seed_record(engine: &ReqwestEngine, authority: &Authority, access: &str, ttl: Duration) {
	let now = OffsetDateTime::now_utc();
	let record = TokenRecord::builder(home_account_id(), authority.clone(), scopes(&[API_SCOPE]))
		.access_token(access)
		.issued_at(now - Duration::minutes(1))
		.expires_at(now + ttl)
		.build()
		.expect("Token record fixture should build.");

	engine.cache.store(record).await.expect("Seeding the token record should succeed.");
}

#[tokio::test]
async fn cached_record_is_returned_without_network() {
	let server = MockServer::start_async().await;
	let agent = ScriptedAgent::new(Script::Cancel);
	let (engine, _) = build_engine(&server, agent.clone());
	let authority = seed_account(&engine, Some("refresh-1")).await;

	seed_record(&engine, &authority, "cached-access", Duration::hours(1)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path(SUSI));
			then.status(500);
		})
		.await;
	let request = SilentRequest::new(home_account_id(), authority, scopes(&[API_SCOPE, "openid"]));
	let first = engine.acquire_silent(request.clone()).await.expect("First silent call should hit.");
	let second = engine.acquire_silent(request).await.expect("Second silent call should hit.");

	assert_eq!(first, second);
	assert_eq!(first.access_token.expose(), "cached-access");
	assert_eq!(engine.metrics.cache_hits(), 2);
	assert_eq!(engine.metrics.exchanges(), 0);
	assert!(agent.requests().is_empty());

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn expired_record_is_refreshed_and_credential_rotated() {
	let server = MockServer::start_async().await;
	let (engine, _) = build_engine(&server, ScriptedAgent::new(Script::Cancel));
	let authority = seed_account(&engine, Some("refresh-1")).await;

	seed_record(&engine, &authority, "stale-access", Duration::seconds(-5)).await;

	let body = token_response("fresh-access", Some("refresh-2"), 3600);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(token_path(SUSI))
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=refresh-1")
				.body_includes("client_id=client-123")
				.body_includes("client_info=1");
			then.status(200).header("content-type", "application/json").body(body.to_string());
		})
		.await;
	let record = engine
		.acquire_silent(SilentRequest::new(home_account_id(), authority.clone(), scopes(&[API_SCOPE])))
		.await
		.expect("Silent refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(record.access_token.expose(), "fresh-access");
	assert!(record.expires_at > OffsetDateTime::now_utc() + Duration::minutes(59));

	let credential = engine
		.cache
		.refresh_credential(&home_account_id(), &authority)
		.await
		.expect("Credential lookup should succeed.")
		.expect("Credential should remain present.");

	assert_eq!(credential.secret.expose(), "refresh-2");
	assert!(!credential.is_revoked());
	assert_eq!(
		engine
			.cache
			.lookup(&home_account_id(), &authority, &scopes(&[API_SCOPE]))
			.await
			.expect("Lookup should succeed.")
			.map(|r| r.access_token.expose().to_owned()),
		Some("fresh-access".to_owned())
	);
}

#[tokio::test]
async fn force_refresh_bypasses_the_cache() {
	let server = MockServer::start_async().await;
	let (engine, _) = build_engine(&server, ScriptedAgent::new(Script::Cancel));
	let authority = seed_account(&engine, Some("refresh-1")).await;

	seed_record(&engine, &authority, "cached-access", Duration::hours(1)).await;

	let body = token_response("forced-access", None, 600);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path(SUSI));
			then.status(200).header("content-type", "application/json").body(body.to_string());
		})
		.await;
	let record = engine
		.acquire_silent(
			SilentRequest::new(home_account_id(), authority.clone(), scopes(&[API_SCOPE]))
				.force_refresh(),
		)
		.await
		.expect("Forced refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(record.access_token.expose(), "forced-access");

	let credential = engine
		.cache
		.refresh_credential(&home_account_id(), &authority)
		.await
		.expect("Credential lookup should succeed.")
		.expect("Credential should remain present.");

	assert_eq!(credential.secret.expose(), "refresh-1");
}

#[tokio::test]
async fn invalid_grant_requires_interaction_and_revokes_credential() {
	let server = MockServer::start_async().await;
	let agent = ScriptedAgent::new(Script::Cancel);
	let (engine, _) = build_engine(&server, agent.clone());
	let authority = seed_account(&engine, Some("refresh-1")).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path(SUSI));
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"AADB2C90080: The provided grant has expired.\"}",
			);
		})
		.await;
	let request = SilentRequest::new(home_account_id(), authority.clone(), scopes(&[API_SCOPE]));
	let err = engine
		.acquire_silent(request.clone())
		.await
		.expect_err("An expired grant should require interaction.");

	mock.assert_async().await;

	assert!(err.is_interaction_required());
	assert!(
		matches!(err, Error::InteractionRequired { account: Some(ref id), .. } if *id == home_account_id())
	);
	assert!(agent.requests().is_empty());

	let credential = engine
		.cache
		.refresh_credential(&home_account_id(), &authority)
		.await
		.expect("Credential lookup should succeed.")
		.expect("Revoked credential should remain present.");

	assert!(credential.is_revoked());

	let again = engine
		.acquire_silent(request)
		.await
		.expect_err("A revoked credential should require interaction without a network call.");

	assert!(again.is_interaction_required());
	assert_eq!(engine.metrics.interaction_required(), 2);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_refresh_credential_requires_interaction() {
	let server = MockServer::start_async().await;
	let (engine, _) = build_engine(&server, ScriptedAgent::new(Script::Cancel));
	let authority = seed_account(&engine, None).await;
	let err = engine
		.acquire_silent(SilentRequest::new(home_account_id(), authority, scopes(&[API_SCOPE])))
		.await
		.expect_err("Without a refresh credential interaction is required.");

	assert!(err.is_interaction_required());
}

#[tokio::test]
async fn unknown_account_is_reported() {
	let server = MockServer::start_async().await;
	let (engine, _) = build_engine(&server, ScriptedAgent::new(Script::Cancel));
	let authority = engine.config.authority(Some(SUSI)).expect("Policy authority should resolve.");
	let err = engine
		.acquire_silent(SilentRequest::new(home_account_id(), authority, scopes(&[API_SCOPE])))
		.await
		.expect_err("Unknown accounts should be rejected.");

	assert!(matches!(err, Error::AccountNotFound { .. }));
}

#[tokio::test]
async fn foreign_authority_is_rejected() {
	let server = MockServer::start_async().await;
	let (engine, _) = build_engine(&server, ScriptedAgent::new(Script::Cancel));

	seed_account(&engine, Some("refresh-1")).await;

	let foreign = Authority::b2c("contoso.b2clogin.com", TENANT, SUSI)
		.expect("Foreign authority should still be well formed.");
	let unknown_policy = engine
		.config
		.authority(Some("b2c_1_unknown"))
		.expect("Unknown policy authority should still be well formed.");

	for authority in [foreign, unknown_policy] {
		let err = engine
			.acquire_silent(SilentRequest::new(home_account_id(), authority, scopes(&[API_SCOPE])))
			.await
			.expect_err("Authorities outside the configuration should be rejected.");

		assert!(matches!(err, Error::InvalidAuthority(_)));
	}
}

#[tokio::test]
async fn concurrent_acquisitions_for_one_key_fail_fast() {
	let server = MockServer::start_async().await;
	let (engine, _) = build_engine(&server, ScriptedAgent::new(Script::Cancel));
	let authority = seed_account(&engine, Some("refresh-1")).await;
	let body = token_response("slow-access", Some("refresh-2"), 3600);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path(SUSI));
			then.status(200)
				.delay(std::time::Duration::from_millis(500))
				.header("content-type", "application/json")
				.body(body.to_string());
		})
		.await;
	let request = SilentRequest::new(home_account_id(), authority, scopes(&[API_SCOPE]));
	let (first, second) = tokio::join!(engine.acquire_silent(request.clone()), async {
		tokio::time::sleep(std::time::Duration::from_millis(100)).await;

		engine.acquire_silent(request.clone()).await
	});

	assert_eq!(
		first.expect("The first acquisition should succeed.").access_token.expose(),
		"slow-access"
	);

	let err = second.expect_err("The overlapping acquisition should fail fast.");

	assert!(matches!(err, Error::ConcurrentAcquisition { .. }));
	assert!(err.is_retryable());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn bound_interactive_overlapping_silent_fails_fast() {
	let server = MockServer::start_async().await;
	let agent = ScriptedAgent::new(Script::Code("never-used"));
	let (engine, _) = build_engine(&server, agent.clone());
	let authority = seed_account(&engine, Some("refresh-1")).await;
	let body = token_response("slow-access", Some("refresh-2"), 3600);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path(SUSI));
			then.status(200)
				.delay(std::time::Duration::from_millis(500))
				.header("content-type", "application/json")
				.body(body.to_string());
		})
		.await;
	let silent = SilentRequest::new(home_account_id(), authority.clone(), scopes(&[API_SCOPE]));
	let interactive =
		InteractiveRequest::new(authority, scopes(&[API_SCOPE])).with_account(home_account_id());
	let (first, second) = tokio::join!(engine.acquire_silent(silent), async {
		tokio::time::sleep(std::time::Duration::from_millis(100)).await;

		engine.acquire_interactive(interactive).await
	});

	first.expect("The silent acquisition should succeed.");

	let err = second.expect_err("The overlapping sign-in should fail fast.");

	assert!(matches!(err, Error::ConcurrentAcquisition { .. }));
	assert!(agent.requests().is_empty(), "The agent must not be shown.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn sign_out_during_refresh_leaves_nothing_behind() {
	let server = MockServer::start_async().await;
	let (engine, store) = build_engine(&server, ScriptedAgent::new(Script::Cancel));
	let authority = seed_account(&engine, Some("refresh-1")).await;
	let body = token_response("late-access", Some("refresh-2"), 3600);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path(SUSI));
			then.status(200)
				.delay(std::time::Duration::from_millis(500))
				.header("content-type", "application/json")
				.body(body.to_string());
		})
		.await;
	let request = SilentRequest::new(home_account_id(), authority.clone(), scopes(&[API_SCOPE]));
	let (silent, signed_out) = tokio::join!(engine.acquire_silent(request), async {
		tokio::time::sleep(std::time::Duration::from_millis(100)).await;

		engine.sign_out(&home_account_id()).await
	});

	mock.assert_calls_async(1).await;
	signed_out.expect("Sign-out should succeed while a refresh is pending.");

	assert!(matches!(
		silent.expect_err("The refresh must not outlive the sign-out."),
		Error::AccountNotFound { ref account } if *account == home_account_id()
	));
	assert!(engine.list_accounts().await.expect("Listing should succeed.").is_empty());
	assert!(
		engine
			.cache
			.lookup(&home_account_id(), &authority, &scopes(&[API_SCOPE]))
			.await
			.expect("Lookup should succeed.")
			.is_none()
	);
	assert!(
		engine
			.cache
			.refresh_credential(&home_account_id(), &authority)
			.await
			.expect("Fetch should succeed.")
			.is_none()
	);
	assert!(store.snapshot().tokens.is_empty());
}

#[tokio::test]
async fn server_errors_surface_without_retry() {
	let server = MockServer::start_async().await;
	let (engine, _) = build_engine(&server, ScriptedAgent::new(Script::Cancel));
	let authority = seed_account(&engine, Some("refresh-1")).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path(SUSI));
			then.status(503).header("retry-after", "30").body("unavailable");
		})
		.await;
	let err = engine
		.acquire_silent(SilentRequest::new(home_account_id(), authority, scopes(&[API_SCOPE])))
		.await
		.expect_err("A 503 should fail.");

	assert!(matches!(err, Error::Acquisition(_)));
	assert!(err.is_retryable());
	assert_eq!(engine.metrics.failures(), 1);

	mock.assert_calls_async(1).await;
}
