use crate::cli::utils::{output_error, output_fields};
use crate::cli::{CliContext, OutputFormat};
use crate::session::SessionStore;

pub async fn handle(message: &str, ctx: &CliContext) -> anyhow::Result<()> {
    let token = ctx.store.token()?;

    match ctx.api.chat(token.as_deref(), message).await {
        Ok(reply) => match ctx.format {
            OutputFormat::Json => output_fields(&ctx.format, reply),
            OutputFormat::Text => {
                let content = reply.get("content").and_then(|c| c.as_str()).unwrap_or_default();
                let model = reply.get("modelUsed").and_then(|m| m.as_str()).unwrap_or("unknown");
                println!("{}", content);
                eprintln!("({})", model);
                Ok(())
            }
        },
        Err(e) => {
            output_error(&ctx.format, &e.to_string(), Some("CHAT_FAILED"))?;
            anyhow::bail!("chat relay failed")
        }
    }
}
