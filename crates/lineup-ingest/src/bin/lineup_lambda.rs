//! Lambda entrypoint for S3 upload notifications

use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use lineup_common::logging::{init_logging, LogConfig};
use lineup_ingest::config::IngestConfig;
use lineup_ingest::handler::{
    context_from_env, remaining_until, DeadlineGuard, IngestContext, InvocationResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _log_guard = init_logging(&LogConfig::for_lambda().with_env_overrides()?)?;

    let (config, context) = context_from_env().await?;
    info!(
        table = %config.table,
        notifications = if config.sns_topic.is_some() { "sns" } else { "log" },
        write_concurrency = config.write_concurrency,
        "Lambda initialized"
    );

    run(service_fn(|event| handle(event, &config, &context))).await
}

async fn handle(
    event: LambdaEvent<S3Event>,
    config: &IngestConfig,
    context: &IngestContext,
) -> Result<InvocationResponse, Error> {
    let cancel = CancellationToken::new();
    let _deadline = DeadlineGuard::start(
        cancel.clone(),
        remaining_until(event.context.deadline),
        config.deadline_margin,
    );

    let response = context.handle_event(event.payload, &cancel).await;
    info!(status_code = response.status_code, "Invocation finished");

    Ok(response)
}
