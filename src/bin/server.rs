//! HTTP front end for codefort
//!
//! ## Endpoints
//!
//! GET /          - Service banner
//! GET /languages - Supported languages
//! POST /execute  - Compile and run a program

use std::sync::Arc;

use actix_web::error::InternalError;
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use codefort::api::{ApiResponse, ExecutionResponse, LanguageInfo, ServiceInfo};
use codefort::{
    ErrorKind, ExecutionCoordinator, ExecutionRequest, LanguageCatalog, ServerConfig,
    select_backend,
};
use log::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let (bind, coordinator) = match build_coordinator() {
        Ok(built) => built,
        Err(e) => {
            error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };
    let state = web::Data::new(AppState { coordinator });

    info!("Codefort listening on http://{}", bind);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config())
            .route("/", web::get().to(index))
            .route("/languages", web::get().to(list_languages))
            .route("/execute", web::post().to(execute))
    })
    .bind(bind)?
    .run()
    .await
}

fn build_coordinator() -> codefort::Result<(String, ExecutionCoordinator)> {
    let config = ServerConfig::from_env()?;
    let catalog = Arc::new(LanguageCatalog::load(&config.languages_dir)?);
    let backend = select_backend(config.backend)?;

    let coordinator = ExecutionCoordinator::builder(catalog, backend)
        .workspace_root(config.workspace_root())
        .output_limit(config.output_limit)
        .compile_failure(config.compile_failure)
        .build()?;
    Ok((config.bind, coordinator))
}

/// Rejects undecodable request bodies with the JSON error envelope
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid request body: {}", err);
        let resp = HttpResponse::BadRequest().json(ApiResponse::error(message));
        InternalError::from_response(err, resp).into()
    })
}

// ============ Application State ============

pub struct AppState {
    coordinator: ExecutionCoordinator,
}

// ============ Handlers ============

async fn index() -> impl Responder {
    HttpResponse::Ok().json(ServiceInfo::default())
}

async fn list_languages(state: web::Data<AppState>) -> impl Responder {
    let languages: Vec<LanguageInfo> = state
        .coordinator
        .catalog()
        .iter()
        .map(LanguageInfo::from)
        .collect();
    HttpResponse::Ok().json(languages)
}

async fn execute(
    req: web::Json<ExecutionRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let request = req.into_inner();
    let outcome = web::block(move || state.coordinator.execute(&request)).await;

    match outcome {
        Ok(Ok(result)) => HttpResponse::Ok().json(ExecutionResponse::from(&result)),
        Ok(Err(e)) => match e.kind() {
            ErrorKind::Request => {
                HttpResponse::BadRequest().json(ApiResponse::error(e.to_string()))
            }
            ErrorKind::Internal => {
                error!("execution failed: {}", e);
                HttpResponse::InternalServerError().json(ApiResponse::error(e.to_string()))
            }
        },
        Err(e) => {
            error!("blocking pool failure: {}", e);
            HttpResponse::InternalServerError().json(ApiResponse::error("execution was aborted"))
        }
    }
}
