use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use serde_json::json;
use url::Url;

use crate::cli::utils::output_fields;
use crate::cli::CliContext;
use crate::guard::{GuardState, ProtectedView, Redirect, RouteGuard};
use crate::types::Role;

#[derive(Subcommand)]
pub enum GuardCommands {
    #[command(about = "Decide once whether a protected view may render")]
    Check {
        #[arg(long, help = "Required role (Admin or Client)")]
        role: Option<Role>,
        #[arg(long, help = "Landing URL to bootstrap from before deciding")]
        url: Option<String>,
    },

    #[command(about = "Mount a protected view and re-validate until redirected")]
    Watch {
        #[arg(long, help = "Required role (Admin or Client)")]
        role: Option<Role>,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..), help = "Re-validation interval in seconds")]
        interval: Option<u64>,
    },
}

fn build_guard(ctx: &CliContext, role: Option<Role>) -> anyhow::Result<Arc<RouteGuard>> {
    let settings = &crate::config::config().guard;
    let login_url = Url::parse(&settings.login_url)?;

    let mut guard = RouteGuard::new(
        ctx.store.clone(),
        Arc::new(ctx.api.clone()),
        login_url,
        settings.unauthorized_path.clone(),
    )
    .with_handoff_exchange(Arc::new(ctx.api.clone()));
    if let Some(role) = role {
        guard = guard.require_role(role);
    }
    Ok(Arc::new(guard))
}

fn describe(state: &GuardState) -> serde_json::Value {
    match state {
        GuardState::Loading => json!({ "state": "loading" }),
        GuardState::Authorized => json!({ "state": "authorized" }),
        GuardState::Redirecting(Redirect::Login(url)) => {
            json!({ "state": "redirecting", "target": url.as_str(), "reason": "login" })
        }
        GuardState::Redirecting(Redirect::Unauthorized(path)) => {
            json!({ "state": "redirecting", "target": path, "reason": "unauthorized" })
        }
    }
}

pub async fn handle(cmd: GuardCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let period = Duration::from_secs(crate::config::config().guard.revalidate_interval_secs);

    match cmd {
        GuardCommands::Check { role, url } => {
            let guard = build_guard(ctx, role)?;
            let mut view = ProtectedView::new(guard, (), period);

            let mut location = url.as_deref().map(Url::parse).transpose()?;
            let state = view.mount(location.as_mut()).await.clone();

            let mut report = describe(&state);
            if let Some(location) = location {
                report["location"] = json!(location.as_str());
            }
            output_fields(&ctx.format, report)
        }
        GuardCommands::Watch { role, interval } => {
            let period = interval.map(Duration::from_secs).unwrap_or(period);
            let guard = build_guard(ctx, role)?;
            let mut view = ProtectedView::new(guard, (), period);

            let state = view.mount(None).await.clone();
            output_fields(&ctx.format, describe(&state))?;
            if state != GuardState::Authorized {
                return Ok(());
            }

            tracing::info!("Re-validating every {:?}", period);
            tokio::select! {
                state = view.redirected() => output_fields(&ctx.format, describe(state)),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Unmounting view");
                    Ok(())
                }
            }
        }
    }
}
