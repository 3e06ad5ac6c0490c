use std::{process, sync::Arc};

use folio::{
    application::{
        content::ContentService,
        context::ContentServices,
        error::AppError,
        query::{Audience, ListParams},
    },
    cache::InvalidationCoordinator,
    config::{self, CacheCommand, Command, GetArgs, ListArgs, Settings},
    domain::kinds::{ContentRecord, ResourceKind},
    infra::{cache::connect_cache, db::PostgresRepositories, error::InfraError, telemetry},
};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain().join(": ");
    if dispatcher::has_been_set() {
        error!(error = %chain, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::validation(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    match cli_args.command.unwrap_or(Command::Health) {
        Command::Health => run_health(&settings).await,
        Command::Migrate => run_migrate(&settings).await,
        Command::Cache(args) => match args.command {
            CacheCommand::Purge(purge) => run_purge(&settings, &purge.kinds).await,
        },
        Command::Get(args) => run_get(&settings, args).await,
        Command::List(args) => run_list(&settings, args).await,
    }
}

async fn connect_database(settings: &Settings) -> Result<PgPool, AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    Ok(pool)
}

async fn build_services(settings: &Settings) -> Result<ContentServices, AppError> {
    let pool = connect_database(settings).await?;
    let (cache, cache_config) = connect_cache(&settings.cache).await;
    let store = Arc::new(PostgresRepositories::new(pool));
    Ok(ContentServices::new(store, cache, cache_config))
}

async fn run_health(settings: &Settings) -> Result<(), AppError> {
    let pool = connect_database(settings).await?;
    PostgresRepositories::new(pool)
        .health_check()
        .await
        .map_err(InfraError::from)?;

    let (cache, _) = connect_cache(&settings.cache).await;
    let cache_status = match cache.ping().await {
        Ok(()) if cache.is_enabled() => "ok".to_string(),
        Ok(()) => "disabled".to_string(),
        Err(err) => {
            warn!(error = %err, "cache ping failed");
            format!("degraded: {err}")
        }
    };

    print_json(&json!({
        "database": "ok",
        "cache": {
            "backend": cache.backend_name(),
            "status": cache_status,
        },
    }))
}

async fn run_migrate(settings: &Settings) -> Result<(), AppError> {
    let pool = connect_database(settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!("migrations applied");
    Ok(())
}

async fn run_purge(settings: &Settings, kinds: &[ResourceKind]) -> Result<(), AppError> {
    let (cache, _) = connect_cache(&settings.cache).await;
    if !cache.is_enabled() {
        warn!("cache is disabled; nothing to purge");
    }

    let removed = InvalidationCoordinator::new(cache).purge(kinds).await;
    print_json(&json!({ "removed": removed }))
}

async fn run_get(settings: &Settings, args: GetArgs) -> Result<(), AppError> {
    let services = build_services(settings).await?;
    match args.kind {
        ResourceKind::Post => get_record(&services.posts, &args).await,
        ResourceKind::Category => get_record(&services.categories, &args).await,
        ResourceKind::Tag => get_record(&services.tags, &args).await,
        ResourceKind::Product => get_record(&services.products, &args).await,
        ResourceKind::Comment => get_record(services.comments.content(), &args).await,
    }
}

async fn get_record<R: ContentRecord>(
    service: &ContentService<R>,
    args: &GetArgs,
) -> Result<(), AppError> {
    let audience = audience(args.privileged || args.include_deleted);
    let record = match (args.id, args.slug.as_deref()) {
        (Some(id), _) if args.include_deleted => service.get_including_deleted(id).await?,
        (Some(id), _) => service.get_by_id(id, audience).await?,
        (None, Some(slug)) => service.get_by_slug(slug, audience).await?,
        (None, None) => return Err(AppError::validation("either --id or --slug is required")),
    };

    print_json(&record.ok_or(AppError::NotFound)?)
}

async fn run_list(settings: &Settings, args: ListArgs) -> Result<(), AppError> {
    let services = build_services(settings).await?;
    let params = list_params(&args);
    let audience = audience(args.privileged || args.include_deleted);

    match args.kind {
        ResourceKind::Post => print_json(&services.posts.list(&params, audience).await?),
        ResourceKind::Category => print_json(&services.categories.list(&params, audience).await?),
        ResourceKind::Tag => print_json(&services.tags.list(&params, audience).await?),
        ResourceKind::Product => print_json(&services.products.list(&params, audience).await?),
        ResourceKind::Comment => {
            print_json(&services.comments.content().list(&params, audience).await?)
        }
    }
}

fn list_params(args: &ListArgs) -> ListParams {
    let mut params = ListParams::default();
    if let Some(page) = args.page {
        params = params.page(page);
    }
    if let Some(limit) = args.limit {
        params = params.limit(limit);
    }
    for (name, value) in &args.filters {
        params = params.filter(name.clone(), value.clone());
    }
    if let Some(search) = args.search.as_ref() {
        params = params.search(search.clone());
    }
    if args.include_deleted {
        params = params.include_deleted();
    }
    params
}

fn audience(privileged: bool) -> Audience {
    if privileged {
        Audience::Privileged
    } else {
        Audience::Public
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
