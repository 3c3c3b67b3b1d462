use std::{future::IntoFuture, process, sync::Arc};

use postdesk::{
    application::{
        assets::AssetUploader,
        editor::{EditorService, EditorTimings, VerificationCode},
        error::AppError,
        post_store::PostStore,
        repos::PostDocuments,
    },
    config,
    infra::{
        auth::OperatorSession,
        db::{InMemoryDocumentStore, PostgresDocumentStore},
        error::InfraError,
        http::{self, AdminState},
        telemetry,
        uploads::LocalObjectStorage,
    },
};
use tokio::{net::TcpListener, sync::oneshot};
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
        config::Command::Migrate(_) => run_migrations(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let documents = init_documents(&settings).await?;

    let storage = Arc::new(
        LocalObjectStorage::new(
            settings.storage.directory.clone(),
            settings.storage.public_base_url.clone(),
        )
        .map_err(InfraError::from)?,
    );
    let session = Arc::new(OperatorSession::from_token(
        settings.auth.operator_token.clone(),
    ));
    if settings.auth.operator_token.is_none() {
        warn!(
            target = "postdesk::serve",
            "no operator token configured; uploads, publishing and deletion will be refused"
        );
    }

    let store = Arc::new(PostStore::new(
        documents.clone(),
        settings.database.collection.clone(),
    ));
    let editor = Arc::new(EditorService::new(
        documents.clone(),
        store,
        AssetUploader::new(storage.clone()),
        session.clone(),
        VerificationCode::new(settings.editor.verification_code.clone()),
        EditorTimings {
            success_reset: settings.editor.success_reset,
            copied_reset: settings.editor.copied_reset,
        },
    ));
    let follower = editor.start().await?;

    let state = AdminState {
        editor: editor.clone(),
        documents,
        session,
        storage,
        upload_limit_bytes: settings.storage.max_request_bytes.get(),
    };
    let result = serve_http(&settings, state).await;

    editor.store().unsubscribe().await;
    follower.abort();
    let _ = follower.await;

    result
}

async fn init_documents(settings: &config::Settings) -> Result<Arc<dyn PostDocuments>, AppError> {
    let Some(url) = settings.database.url.as_deref() else {
        warn!(
            target = "postdesk::serve",
            "no database url configured; posts are kept in memory only"
        );
        return Ok(Arc::new(InMemoryDocumentStore::new()));
    };

    let pool = PostgresDocumentStore::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresDocumentStore::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Arc::new(PostgresDocumentStore::new(pool)))
}

async fn run_migrations(settings: config::Settings) -> Result<(), AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database.url is required to run migrations",
        ))
    })?;

    let pool = PostgresDocumentStore::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresDocumentStore::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    info!(target = "postdesk::migrate", "migrations applied");
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: AdminState) -> Result<(), AppError> {
    let upload_body_limit = settings.storage.max_request_bytes.get() as usize;
    let router = http::build_admin_router(state, upload_body_limit);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "postdesk::serve",
        addr = %settings.server.addr,
        "editor listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!(
                target = "postdesk::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "postdesk::serve", error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(target = "postdesk::serve", "shutdown requested");
}
