use clap::Subcommand;
use serde_json::json;
use url::Url;

use crate::cli::utils::{output_error, output_fields, output_success, prompt_line};
use crate::cli::CliContext;
use crate::handoff::{bootstrap_from_url, handoff_code_url, handoff_url, take_handoff_code, Bootstrap, HandoffParcel};
use crate::session::SessionStore;
use crate::types::Role;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout and clear the stored session")]
    Logout,

    #[command(about = "Show stored session and backend reachability")]
    Status,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "Import a handoff parcel or code from a landing URL")]
    Bootstrap {
        #[arg(help = "Landing URL, e.g. https://admin.example.com/dashboard?token=...&role=Admin")]
        url: String,
    },

    #[command(about = "Build a redirect URL carrying the stored session to another dashboard")]
    Handoff {
        #[arg(help = "Target dashboard URL (defaults to the dashboard for the stored role)")]
        target: Option<String>,
        #[arg(long, help = "Carry a one-time code instead of the token itself")]
        code: bool,
    },
}

pub async fn handle(cmd: AuthCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let store = ctx.store.as_ref();

    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_line("Password: ")?,
            };

            match ctx.api.login(store, &email, &password).await {
                Ok(login) => output_success(
                    &ctx.format,
                    &format!("Logged in as {} ({})", login.user.role, email),
                    Some(json!({ "role": login.user.role })),
                ),
                Err(e) => {
                    output_error(&ctx.format, &e.to_string(), Some("LOGIN_FAILED"))?;
                    anyhow::bail!("login failed")
                }
            }
        }
        AuthCommands::Logout => {
            ctx.api.logout(store).await?;
            output_success(&ctx.format, "Logged out", None)
        }
        AuthCommands::Status => {
            let session = store.get()?;
            let profile = async {
                match &session.token {
                    Some(token) => Some(ctx.api.profile(token).await),
                    None => None,
                }
            };
            // Both calls settle independently; one failing does not hide the other
            let (health, profile) = futures::future::join(ctx.api.health(), profile).await;

            output_fields(
                &ctx.format,
                json!({
                    "api": ctx.api.base_url(),
                    "session": ctx.store.path().display().to_string(),
                    "authenticated": session.is_authenticated(),
                    "cached_role": session.role,
                    "backend": match health {
                        Ok(_) => "up".to_string(),
                        Err(e) => format!("down ({})", e),
                    },
                    "server_role": match profile {
                        Some(Ok(user)) => Some(user.role),
                        Some(Err(e)) => Some(format!("unknown ({})", e)),
                        None => None,
                    },
                }),
            )
        }
        AuthCommands::Whoami => {
            let token = store
                .token()?
                .ok_or_else(|| anyhow::anyhow!("Not logged in"))?;
            let user = ctx.api.profile(&token).await?;
            if let Ok(role) = user.role.parse() {
                store.cache_role(role)?;
            }
            output_fields(&ctx.format, serde_json::to_value(&user)?)
        }
        AuthCommands::Bootstrap { url } => {
            let mut url = Url::parse(&url)?;

            if let Some(code) = take_handoff_code(&mut url) {
                let parcel = ctx.api.exchange_handoff_code(store, &code).await?;
                return output_success(
                    &ctx.format,
                    &format!("Imported {} session from handoff code", parcel.role),
                    Some(json!({ "url": url.as_str() })),
                );
            }

            match bootstrap_from_url(&mut url, store)? {
                Bootstrap::Imported(parcel) => output_success(
                    &ctx.format,
                    &format!("Imported {} session", parcel.role),
                    Some(json!({ "url": url.as_str() })),
                ),
                Bootstrap::Rejected { role } => {
                    output_error(
                        &ctx.format,
                        &format!("Rejected handoff with role {:?}; stripped URL: {}", role, url),
                        Some("BAD_PARCEL"),
                    )?;
                    anyhow::bail!("handoff rejected")
                }
                Bootstrap::Absent => output_success(
                    &ctx.format,
                    "No handoff parameters in URL",
                    Some(json!({ "url": url.as_str() })),
                ),
            }
        }
        AuthCommands::Handoff { target, code } => {
            let target = match target {
                Some(target) => Url::parse(&target)?,
                None => {
                    let settings = &crate::config::config().guard;
                    let role = store
                        .cached_role()?
                        .ok_or_else(|| anyhow::anyhow!("No cached role; pass a target URL"))?;
                    Url::parse(match role {
                        Role::Admin => &settings.admin_app_url,
                        Role::Client => &settings.client_app_url,
                    })?
                }
            };

            let url = if code {
                let issued = ctx.api.issue_handoff_code(store).await?;
                handoff_code_url(&target, &issued.code)
            } else {
                let session = store.get()?;
                let (Some(token), Some(role)) = (session.token, session.role) else {
                    anyhow::bail!("No stored session with a role to hand off");
                };
                handoff_url(&target, &HandoffParcel { token, role })
            };

            match ctx.format {
                crate::cli::OutputFormat::Json => output_fields(&ctx.format, json!({ "url": url.as_str() })),
                crate::cli::OutputFormat::Text => {
                    println!("{}", url);
                    Ok(())
                }
            }
        }
    }
}
