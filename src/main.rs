use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use memoria::{
    application::{
        api_keys::{ApiKeyService, IssueApiKeyCommand},
        error::AppError,
        posts::PostService,
        repos::{ApiKeysRepo, HealthRepo, MediaRepo, PostsRepo},
        storage::ObjectStorage,
    },
    config,
    domain::storage_keys::PublicUrlScheme,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        telemetry,
        uploads::LocalObjectStorage,
    },
};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Keys(args) => run_keys(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let scheme = PublicUrlScheme::new(
        settings.storage.public_base_url.clone(),
        settings.storage.bucket.clone(),
    );
    let storage = Arc::new(
        LocalObjectStorage::new(settings.storage.directory.clone(), scheme)
            .map_err(|err| AppError::from(InfraError::storage(err.to_string())))?,
    );

    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let media_repo: Arc<dyn MediaRepo> = repositories.clone();
    let keys_repo: Arc<dyn ApiKeysRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();
    let object_storage: Arc<dyn ObjectStorage> = storage.clone();

    let router_state = RouterState {
        http: HttpState {
            storage,
            health: health_repo,
        },
        api: ApiState {
            api_keys: Arc::new(ApiKeyService::new(keys_repo)),
            posts: Arc::new(PostService::new(posts_repo, media_repo, object_storage)),
        },
    };

    serve_http(&settings, router_state).await
}

async fn run_keys(settings: config::Settings, command: config::KeysCommand) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let service = ApiKeyService::new(repositories);

    match command {
        config::KeysCommand::Issue(args) => {
            let expires_at = args
                .expires_in_days
                .map(|days| OffsetDateTime::now_utc() + time::Duration::days(i64::from(days)));
            let issued = service
                .issue(IssueApiKeyCommand {
                    name: args.name,
                    description: args.description,
                    scopes: args.scopes,
                    owner_id: args.owner,
                    expires_at,
                })
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            info!(
                target = "memoria::keys",
                key_id = %issued.record.id,
                owner_id = %issued.record.owner_id,
                "issued api key"
            );
            println!("id:     {}", issued.record.id);
            println!("owner:  {}", issued.record.owner_id);
            println!("token:  {}", issued.token);
        }
        config::KeysCommand::List(args) => {
            let keys = service
                .list(args.owner)
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            for key in keys {
                let scopes = key
                    .scopes
                    .iter()
                    .map(|scope| scope.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    key.id, key.owner_id, key.status, key.name, scopes
                );
            }
        }
        config::KeysCommand::Revoke(args) => {
            service
                .revoke(args.id)
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            info!(target = "memoria::keys", key_id = %args.id, "revoked api key");
            println!("revoked {}", args.id);
        }
    }

    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, router_state: RouterState) -> Result<(), AppError> {
    let body_limit = usize::try_from(settings.storage.max_request_bytes.get()).unwrap_or(usize::MAX);
    let router = http::build_app(router_state, body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "memoria::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let signalled = Arc::new(Notify::new());
    let notify = signalled.clone();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            notify.notify_one();
        },
    );

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        () = drain_deadline(signalled, grace) => {
            warn!(
                target = "memoria::serve",
                grace_seconds = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "memoria::serve", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "memoria::serve", "shutdown requested");
}

async fn drain_deadline(signalled: Arc<Notify>, grace: Duration) {
    signalled.notified().await;
    tokio::time::sleep(grace).await;
}
