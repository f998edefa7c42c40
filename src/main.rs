use std::{process, sync::Arc};

use latexml_render::{
    application::{
        error::{AppError, error_chain},
        render::{MarkupEmbedder, RenderEngine, RenderEngineConfig, RenderResult, is_valid_markup},
        repos::{FormulaPages, MathCache},
    },
    config,
    domain::{
        entities::RenderRequest,
        settings::{SettingsValue, post_data, resolve_settings},
    },
    infra::{
        cache::{FileMathCache, MemoryMathCache},
        error::InfraError,
        latexml::HttpConversionClient,
        pages::StaticFormulaPages,
        telemetry,
    },
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let causes = error_chain(error);
    if dispatcher::has_been_set() {
        error!(error = %error, causes = ?causes, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = ?causes, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::Validate(args) => run_validate(args).await,
        config::Command::PostData(args) => run_post_data(settings, args).await,
    }
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let engine = build_engine(&settings)?;

    let mut request = RenderRequest::new(args.tex).with_force_refresh(args.force);
    if let Some(encoded) = args.settings {
        request = request.with_settings(SettingsValue::from(encoded.as_str()));
    }
    if let Some(label) = args.label {
        request = request.with_label(label);
    }
    if let Some(tag_id) = args.tag_id {
        request = request.with_tag_id(tag_id);
    }

    let (outcome, markup) = engine.render_markup(&request).await;
    write_stdout(&markup).await?;

    match outcome.result {
        RenderResult::Success { .. } => {
            info!(
                target = "latexml_render::render",
                fingerprint = %outcome.fingerprint,
                state = ?outcome.state,
                changed = outcome.is_changed(),
                "Render completed"
            );
            Ok(())
        }
        RenderResult::Failure(failure) => Err(AppError::from(failure)),
    }
}

async fn run_validate(args: config::ValidateArgs) -> Result<(), AppError> {
    let document = match args.file.as_ref() {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(InfraError::from)?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .map_err(InfraError::from)?;
            buffer
        }
    };

    if !is_valid_markup(&document) {
        return Err(AppError::validation(
            "document is not well-formed MathML with a math, table or div root",
        ));
    }

    write_stdout("valid").await
}

async fn run_post_data(
    settings: config::Settings,
    args: config::PostDataArgs,
) -> Result<(), AppError> {
    let instance = args.settings.as_deref().map(SettingsValue::from);
    let resolved = resolve_settings(instance.as_ref(), &settings.daemon.default_settings);

    write_stdout(&post_data(&args.tex, &resolved)).await
}

fn build_engine(settings: &config::Settings) -> Result<RenderEngine, AppError> {
    let client = Arc::new(HttpConversionClient::new()?);

    let cache: Arc<dyn MathCache> = match settings.cache.directory.as_ref() {
        Some(directory) => Arc::new(FileMathCache::new(directory.clone())?),
        None => Arc::new(MemoryMathCache::new(settings.cache.memory_capacity)),
    };

    let pages: Arc<dyn FormulaPages> =
        Arc::new(StaticFormulaPages::new(&settings.embed.existing_pages));
    let embedder = MarkupEmbedder::new(settings.embed.script_path.clone(), pages);

    Ok(RenderEngine::new(
        RenderEngineConfig::from(&settings.daemon),
        client,
        cache,
        embedder,
    ))
}

async fn write_stdout(text: &str) -> Result<(), AppError> {
    let mut stdout = tokio::io::stdout();
    let mut line = String::with_capacity(text.len() + 1);
    line.push_str(text);
    line.push('\n');
    stdout
        .write_all(line.as_bytes())
        .await
        .map_err(InfraError::from)?;
    stdout.flush().await.map_err(InfraError::from)?;
    Ok(())
}
