use salvo::http::StatusCode;
use salvo::prelude::*;
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::{CompletionRequest, GenerateRequest, RecipeRequest};
use crate::prompt::build_recipe_prompt;
use crate::relay::relay_completion_stream;
use crate::state::app_state;
use crate::utils::now_timestamp_string;

const DEFAULT_CUISINE: &str = "random";
const DEFAULT_MEAL_TYPE: &str = "regular";

pub fn router() -> Router {
    Router::new()
        .get(root)
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("test-connection").get(test_connection))
        .push(
            Router::with_path("api")
                .push(Router::with_path("generate").post(generate))
                .push(Router::with_path("recipe").post(generate_recipe)),
        )
}

/// `POST /api/generate` — relays a raw prompt as a plain text stream.
#[handler]
pub async fn generate(req: &mut Request, res: &mut Response) {
    let max_size = app_state().config.request_body_max_size;
    let request = match req.parse_json_with_max_size::<GenerateRequest>(max_size).await {
        Ok(value) => value,
        Err(error) => {
            bad_request(res, &format!("invalid request body: {error}"));
            return;
        }
    };

    let Some(prompt) = request.prompt.filter(|prompt| !prompt.trim().is_empty()) else {
        bad_request(res, "no prompt in the request");
        return;
    };

    stream_completion(res, prompt).await;
}

/// `POST /api/recipe` — builds the recipe prompt server-side from the form
/// fields and feeds the same relay path.
#[handler]
pub async fn generate_recipe(req: &mut Request, res: &mut Response) {
    let max_size = app_state().config.request_body_max_size;
    let request = match req.parse_json_with_max_size::<RecipeRequest>(max_size).await {
        Ok(value) => value,
        Err(error) => {
            bad_request(res, &format!("invalid request body: {error}"));
            return;
        }
    };

    stream_completion(res, resolve_recipe_prompt(&request)).await;
}

#[handler]
pub async fn health_check(res: &mut Response) {
    let config = &app_state().config;
    res.render(Json(HealthCheckResponse {
        status: "healthy".to_string(),
        timestamp: now_timestamp_string(),
        openai_api_configured: !config.openai_api_key.is_empty(),
        api_key_valid: config.validate_openai_api_key_format(),
        completion_model: config.completion_model.clone(),
    }));
}

#[handler]
pub async fn test_connection(res: &mut Response) {
    let state = app_state();
    let probe = CompletionRequest::probe(&state.config);

    match state.upstream.completion(&probe, "connection-test").await {
        Ok(response) => res.render(Json(ConnectionTestSuccessResponse {
            status: "success".to_string(),
            message: "Successfully connected to upstream completion API".to_string(),
            model_used: state.config.completion_model.clone(),
            timestamp: now_timestamp_string(),
            response_id: response.id.unwrap_or_else(|| "unknown".to_string()),
        })),
        Err(upstream_error) => {
            error!("Connection test failed: {}", upstream_error.message);
            res.status_code(StatusCode::SERVICE_UNAVAILABLE);
            res.render(Json(ConnectionTestFailureResponse {
                status: "failed".to_string(),
                error_type: "API Error".to_string(),
                message: upstream_error.message,
                timestamp: now_timestamp_string(),
                suggestions: vec![
                    "Check OPENAI_API_KEY".to_string(),
                    "Verify the COMPLETION_MODEL is available to your account".to_string(),
                    "Check provider rate limits".to_string(),
                ],
            }));
        }
    }
}

#[handler]
pub async fn root(res: &mut Response) {
    let config = &app_state().config;
    res.render(Json(RootResponse {
        message: "Recipe completion relay (Rust/Salvo)".to_string(),
        status: "running".to_string(),
        config: RootConfig {
            openai_base_url: config.openai_base_url.clone(),
            api_key_configured: !config.openai_api_key.is_empty(),
            completion_model: config.completion_model.clone(),
        },
        endpoints: RootEndpoints {
            generate: "/api/generate".to_string(),
            recipe: "/api/recipe".to_string(),
            health: "/health".to_string(),
            test_connection: "/test-connection".to_string(),
        },
    }));
}

fn resolve_recipe_prompt(request: &RecipeRequest) -> String {
    let cuisine = non_empty(request.cuisine.as_deref()).unwrap_or(DEFAULT_CUISINE);
    let meal_type = non_empty(request.meal_type.as_deref()).unwrap_or(DEFAULT_MEAL_TYPE);
    build_recipe_prompt(cuisine, meal_type, request.ingredients.as_deref())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Opens the upstream stream and hands its body to the relay task. The
/// response becomes a chunked plain-text body fed through `res.channel()`.
async fn stream_completion(res: &mut Response, prompt: String) {
    let state = app_state();
    let request_id = Uuid::new_v4().to_string();
    let completion_request = CompletionRequest::streaming(prompt, &state.config);

    debug!(
        phase = "generate_request",
        request_id = %request_id,
        model = %completion_request.model,
        prompt_chars = completion_request.prompt.len(),
        "Opening upstream completion stream"
    );

    let upstream_response = match state
        .upstream
        .completion_stream(&completion_request, &request_id)
        .await
    {
        Ok(value) => value,
        Err(upstream_error) => {
            upstream_failed(res, upstream_error.status, &upstream_error.message);
            return;
        }
    };

    set_stream_headers(res);
    let sender = res.channel();
    tokio::spawn(async move {
        relay_completion_stream(upstream_response, sender, request_id).await;
    });
}

fn set_stream_headers(res: &mut Response) {
    res.status_code(StatusCode::OK);
    let _ = res.add_header("Cache-Control", "no-cache", true);
    let _ = res.add_header("Access-Control-Allow-Origin", "*", true);
    let _ = res.add_header("Content-Type", "text/plain; charset=utf-8", true);
}

fn bad_request(res: &mut Response, message: &str) {
    res.status_code(StatusCode::BAD_REQUEST);
    res.render(Json(DetailResponse {
        detail: message.to_string(),
    }));
}

fn upstream_failed(res: &mut Response, status: StatusCode, message: &str) {
    error!("Upstream error: {message}");
    res.status_code(status);
    res.render(Json(DetailResponse {
        detail: message.to_string(),
    }));
}

#[derive(Debug, Serialize)]
struct DetailResponse {
    detail: String,
}

#[derive(Debug, Serialize)]
struct HealthCheckResponse {
    status: String,
    timestamp: String,
    openai_api_configured: bool,
    api_key_valid: bool,
    completion_model: String,
}

#[derive(Debug, Serialize)]
struct ConnectionTestSuccessResponse {
    status: String,
    message: String,
    model_used: String,
    timestamp: String,
    response_id: String,
}

#[derive(Debug, Serialize)]
struct ConnectionTestFailureResponse {
    status: String,
    error_type: String,
    message: String,
    timestamp: String,
    suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: String,
    status: String,
    config: RootConfig,
    endpoints: RootEndpoints,
}

#[derive(Debug, Serialize)]
struct RootConfig {
    openai_base_url: String,
    api_key_configured: bool,
    completion_model: String,
}

#[derive(Debug, Serialize)]
struct RootEndpoints {
    generate: String,
    recipe: String,
    health: String,
    test_connection: String,
}
