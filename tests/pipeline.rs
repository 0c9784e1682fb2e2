use faultline::prelude::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const EXCLUDED: [&str; 4] = ["/css/**", "/*.ico", "/error", "/error-page/**"];

struct CountingAuth {
    inner: LoginCheckFilter,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Filter for CountingAuth {
    async fn before(&self, request: &RequestRecord) -> FilterResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.before(request).await
    }
}

struct PathRecorder(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Interceptor for PathRecorder {
    async fn pre_handle(&self, request: &RequestRecord) -> InterceptorResult {
        self.0.lock().unwrap().push(request.path().to_string());
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    auth_calls: Arc<AtomicUsize>,
    intercepted: Arc<Mutex<Vec<String>>>,
    custom_calls: Arc<AtomicUsize>,
}

fn bad(fault: &Fault) -> ResolutionOutcome {
    ResolutionOutcome::error_result(ErrorResult::new(
        StatusCode::BAD_REQUEST,
        "BAD",
        fault.message().unwrap_or_default(),
    ))
}

fn user_ex(fault: &Fault) -> ResolutionOutcome {
    ResolutionOutcome::error_result(ErrorResult::new(
        StatusCode::BAD_REQUEST,
        "USER-EX",
        fault.message().unwrap_or_default(),
    ))
}

fn ex(_: &Fault) -> ResolutionOutcome {
    ResolutionOutcome::error_result(ErrorResult::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "EX",
        "Internal error",
    ))
}

fn local_bad(fault: &Fault) -> ResolutionOutcome {
    ResolutionOutcome::error_result(ErrorResult::new(
        StatusCode::BAD_REQUEST,
        "LOCAL-BAD",
        fault.message().unwrap_or_default(),
    ))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn builder(counters: &Counters) -> ErrorPipelineBuilder {
    init_tracing();
    let custom_calls = Arc::clone(&counters.custom_calls);
    ErrorPipeline::builder()
        .declare_type("Runtime", FaultType::ROOT)
        .declare_type(FaultType::INVALID_INPUT, "Runtime")
        .declare_type("USER-EX", "Runtime")
        .declare_type("BadRequest", "Runtime")
        .annotate(
            "BadRequest",
            StatusAnnotation::new(StatusCode::BAD_REQUEST).with_reason("error.bad"),
        )
        .messages(StaticMessageSource::new().with("error.bad", "잘못된 요청 오류"))
        .handlers(
            DeclaredHandlers::new()
                .local("ApiExceptionV2Controller", [FaultType::INVALID_INPUT], local_bad)
                .advice_for_path("/api2", [FaultType::INVALID_INPUT], bad)
                .advice_for_path("/api2", ["USER-EX"], user_ex)
                .advice_for_path("/api2", [FaultType::ROOT], ex),
        )
        .register_strategy(
            priority::CUSTOM,
            "counting",
            |_| true,
            move |_, _| {
                custom_calls.fetch_add(1, Ordering::SeqCst);
                Ok(ResolutionOutcome::Unresolved)
            },
        )
        .register_error_route("404", "/error-page/404")
        .register_error_route("5xx", "/error-page/5xx")
        .template("error-page/404", "<h1>404 {{path}}</h1>")
        .template("error-page/5xx", "<h1>5xx wildcard: {{error}}</h1>")
        .static_page("error-page/5xx", "<h1>static 5xx</h1>")
        .template("error/4xx", "<h1>{{status}} {{message}}</h1>")
        .filter(FilterRegistration::new("log", LogFilter).order(1))
        .filter(
            FilterRegistration::new(
                "login",
                CountingAuth {
                    inner: LoginCheckFilter::new([
                        "/",
                        "/login",
                        "/css/**",
                        "/api/**",
                        "/api2/**",
                        "/members/**",
                    ]),
                    calls: Arc::clone(&counters.auth_calls),
                },
            )
            .order(2),
        )
        .interceptor(
            InterceptorRegistration::new("log", LogInterceptor)
                .order(1)
                .add_path_patterns(["/**"])
                .exclude_path_patterns(EXCLUDED),
        )
        .interceptor(
            InterceptorRegistration::new("recorder", PathRecorder(Arc::clone(&counters.intercepted)))
                .order(2)
                .add_path_patterns(["/**"])
                .exclude_path_patterns(EXCLUDED),
        )
}

fn pipeline() -> (ErrorPipeline, Counters) {
    let counters = Counters::default();
    let pipeline = builder(&counters).build().unwrap();
    (pipeline, counters)
}

fn api(path: &str) -> RequestRecord {
    RequestRecord::get(path).accepting("application/json")
}

fn page(path: &str) -> RequestRecord {
    RequestRecord::get(path).accepting("text/html")
}

async fn raise(pipeline: &ErrorPipeline, request: RequestRecord, fault: Fault) -> DispatchOutcome {
    pipeline.dispatch(request, |_| async move { Err(fault) }).await
}

#[tokio::test]
async fn test_invalid_input_on_api_request_is_bad() {
    let (pipeline, _) = pipeline();
    let outcome = raise(
        &pipeline,
        api("/api2/members/bad"),
        Fault::invalid_input("잘못된 입력 값"),
    )
    .await;

    assert_eq!(outcome.terminal, TerminalState::Responded);
    assert_eq!(outcome.resolved_by.as_deref(), Some("declared-handlers"));
    assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
    let body = outcome.response.json_body().unwrap();
    assert_eq!(body["status"], 400);
    assert_eq!(body["code"], "BAD");
    assert_eq!(body["message"], "잘못된 입력 값");
    assert_eq!(
        outcome.transitions,
        vec![
            PipelineState::Raised,
            PipelineState::Classified,
            PipelineState::Handled,
            PipelineState::Responded,
        ]
    );
}

#[tokio::test]
async fn test_domain_fault_uses_its_own_handler() {
    let (pipeline, _) = pipeline();
    let outcome = raise(
        &pipeline,
        api("/api2/members/user-ex"),
        Fault::domain("USER-EX", "사용자 오류"),
    )
    .await;

    let body = outcome.response.json_body().unwrap();
    assert_eq!(body["status"], 400);
    assert_eq!(body["code"], "USER-EX");
    assert_eq!(body["message"], "사용자 오류");
}

#[tokio::test]
async fn test_unclassified_fault_gets_generic_message() {
    let (pipeline, _) = pipeline();
    let outcome = raise(
        &pipeline,
        api("/api2/members/ex"),
        Fault::domain("Boom", "connection pool exhausted"),
    )
    .await;

    assert_eq!(outcome.response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = outcome.response.json_body().unwrap();
    assert_eq!(body["code"], "EX");
    assert_eq!(body["message"], "Internal error");
}

#[tokio::test]
async fn test_handler_local_declaration_beats_advice() {
    let (pipeline, _) = pipeline();
    let request = api("/api2/members/bad").with_handler("ApiExceptionV2Controller");
    let outcome = raise(&pipeline, request, Fault::invalid_input("bad")).await;
    assert_eq!(outcome.response.json_body().unwrap()["code"], "LOCAL-BAD");
}

#[tokio::test]
async fn test_page_request_renders_wildcard_route() {
    let (pipeline, counters) = pipeline();
    let outcome = raise(&pipeline, page("/members/ex"), Fault::internal("disk full")).await;

    assert_eq!(outcome.terminal, TerminalState::Rendered);
    assert_eq!(outcome.replay_path.as_deref(), Some("/error-page/5xx"));
    assert_eq!(outcome.response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(outcome.response.body, "<h1>5xx wildcard: Internal Server Error</h1>");
    assert!(!outcome.response.body.contains("disk full"));
    assert_eq!(outcome.resolved_by.as_deref(), Some("response-status"));
    assert_eq!(counters.custom_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exact_route_beats_class_and_default() {
    let counters = Counters::default();
    let pipeline = builder(&counters)
        .register_error_route("4xx", "/error-page/4xx")
        .template("error-page/4xx", "<h1>4xx</h1>")
        .build()
        .unwrap();

    let outcome = raise(&pipeline, page("/members/9"), Fault::not_found("member 9")).await;
    assert_eq!(outcome.replay_path.as_deref(), Some("/error-page/404"));
    assert_eq!(outcome.response.body, "<h1>404 /members/9</h1>");

    let outcome = raise(&pipeline, page("/members/9"), Fault::invalid_input("bad")).await;
    assert_eq!(outcome.replay_path.as_deref(), Some("/error-page/4xx"));
}

#[tokio::test]
async fn test_renamed_default_route_still_renders_status_views() {
    let counters = Counters::default();
    let pipeline = builder(&counters)
        .register_error_route("error", "/oops")
        .template("error", "<h1>generic</h1>")
        .build()
        .unwrap();

    let outcome = raise(&pipeline, page("/members/bad"), Fault::invalid_input("bad")).await;
    assert_eq!(outcome.replay_path.as_deref(), Some("/oops"));
    assert_eq!(outcome.terminal, TerminalState::Rendered);
    assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
    assert!(outcome.response.body.starts_with("<h1>400 "));
}

#[tokio::test]
async fn test_annotated_reason_is_resolved_through_messages() {
    let (pipeline, _) = pipeline();
    let outcome = raise(
        &pipeline,
        api("/api/response-status-ex1"),
        Fault::domain("BadRequest", "raw message"),
    )
    .await;

    assert_eq!(outcome.replay_path.as_deref(), Some("/error"));
    assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
    let body = outcome.response.json_body().unwrap();
    assert_eq!(body["message"], "잘못된 요청 오류");
    assert_eq!(body["path"], "/api/response-status-ex1");
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn test_replay_skips_authentication() {
    let (pipeline, counters) = pipeline();

    let client = pipeline
        .dispatch(page("/error"), |_| async { Ok(TransportResponse::new(StatusCode::OK)) })
        .await;
    assert_eq!(client.response.status, StatusCode::UNAUTHORIZED);
    let after_client = counters.auth_calls.load(Ordering::SeqCst);
    assert_eq!(after_client, 1);

    let replay = page("/error").with_origin(RequestOrigin::InternalErrorReplay);
    let outcome = pipeline
        .dispatch(replay, |_| async { Ok(TransportResponse::new(StatusCode::OK)) })
        .await;
    assert_eq!(outcome.response.status, StatusCode::OK);
    assert_eq!(counters.auth_calls.load(Ordering::SeqCst), after_client);
}

#[tokio::test]
async fn test_filter_fault_bypasses_resolver_chain() {
    let (pipeline, counters) = pipeline();
    let outcome = pipeline
        .dispatch(page("/items"), |_| async {
            Ok(TransportResponse::html(StatusCode::OK, "items"))
        })
        .await;

    assert_eq!(outcome.resolved_by, None);
    assert_eq!(counters.custom_calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.replay_path.as_deref(), Some("/error"));
    assert_eq!(outcome.response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(outcome.response.body, "<h1>401 login required for /items</h1>");
    assert_eq!(
        outcome.transitions,
        vec![
            PipelineState::Raised,
            PipelineState::Classified,
            PipelineState::Propagated,
            PipelineState::InternalReplay,
            PipelineState::Rendered,
        ]
    );
    // one call for the client request, none for the replay
    assert_eq!(counters.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interceptors_stay_off_error_routes() {
    let (pipeline, counters) = pipeline();
    let outcome = raise(&pipeline, page("/members/9"), Fault::not_found("member 9")).await;
    assert_eq!(outcome.replay_path.as_deref(), Some("/error-page/404"));
    assert_eq!(*counters.intercepted.lock().unwrap(), vec!["/members/9"]);
}

#[tokio::test]
async fn test_failing_error_page_ends_in_minimal_fallback() {
    let counters = Counters::default();
    let pipeline = builder(&counters)
        .template("error-page/404", "<h1>{{stackTrace}}</h1>")
        .build()
        .unwrap();

    let outcome = raise(&pipeline, page("/members/9"), Fault::not_found("member 9")).await;
    assert_eq!(outcome.terminal, TerminalState::UnhandledPropagation);
    assert_eq!(outcome.response, TransportResponse::minimal_fallback());
    let replays = outcome
        .transitions
        .iter()
        .filter(|state| **state == PipelineState::InternalReplay)
        .count();
    assert_eq!(replays, 1);
}

#[tokio::test]
async fn test_fault_on_replayed_request_is_not_resolved_again() {
    let (pipeline, counters) = pipeline();
    let replay = api("/error-page/404").with_origin(RequestOrigin::InternalErrorReplay);
    let outcome = raise(&pipeline, replay, Fault::internal("boom")).await;

    assert_eq!(outcome.terminal, TerminalState::UnhandledPropagation);
    assert_eq!(outcome.response, TransportResponse::minimal_fallback());
    assert_eq!(outcome.replay_path, None);
    assert_eq!(counters.custom_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unresolved_fault_propagates_to_boundary() {
    let counters = Counters::default();
    let pipeline = builder(&counters)
        .without_default_strategies()
        .build()
        .unwrap();

    let outcome = raise(&pipeline, page("/members/x"), Fault::not_found("x")).await;
    assert_eq!(counters.custom_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.resolved_by, None);
    assert_eq!(outcome.replay_path.as_deref(), Some("/error-page/404"));
    assert_eq!(
        &outcome.transitions[..4],
        &[
            PipelineState::Raised,
            PipelineState::Classified,
            PipelineState::Unresolved,
            PipelineState::Propagated,
        ]
    );
    assert_eq!(outcome.terminal, TerminalState::Rendered);
}

#[tokio::test]
async fn test_successful_request_completes() {
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .dispatch(api("/api/members/1"), |request| async move {
            Ok(TransportResponse::json(
                StatusCode::OK,
                &serde_json::json!({ "path": request.path() }),
            ))
        })
        .await;
    assert_eq!(outcome.terminal, TerminalState::Completed);
    assert!(outcome.transitions.is_empty());
    assert_eq!(outcome.response.json_body().unwrap()["path"], "/api/members/1");
}

#[tokio::test]
async fn test_concurrent_dispatches_are_independent() {
    let (pipeline, _) = pipeline();
    let pipeline = Arc::new(pipeline);

    let mut handles = Vec::new();
    for i in 0..32 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let (fault, expected) = match i % 3 {
                0 => (Fault::invalid_input(format!("bad {i}")), "BAD"),
                1 => (Fault::domain("USER-EX", format!("user {i}")), "USER-EX"),
                _ => (Fault::domain("Boom", format!("boom {i}")), "EX"),
            };
            let outcome = raise(&pipeline, api(&format!("/api2/members/{i}")), fault).await;
            (outcome.response.json_body().unwrap()["code"].clone(), expected)
        }));
    }

    for handle in handles {
        let (code, expected) = handle.await.unwrap();
        assert_eq!(code, expected);
    }
}

#[tokio::test]
async fn test_panicking_handler_falls_through_to_next_strategy() {
    init_tracing();
    let pipeline = Arc::new(
        ErrorPipeline::builder()
            .handlers(
                DeclaredHandlers::new()
                    .advice([FaultType::INVALID_INPUT], |_| panic!("handler bug")),
            )
            .build()
            .unwrap(),
    );

    let worker = Arc::clone(&pipeline);
    let outcome = tokio::spawn(async move {
        raise(&worker, api("/api/members/bad"), Fault::invalid_input("bad id")).await
    })
    .await
    .unwrap();

    assert_eq!(outcome.resolved_by.as_deref(), Some("response-status"));
    assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
    assert_eq!(outcome.response.json_body().unwrap()["status"], 400);
}
