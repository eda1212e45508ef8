use anyhow::Context;
use clap::Parser;
use openapi_mcp_adapter::{Cli, OpenApiMcpServer, Transport, logging, server};
use openapi_mcp_http::{HttpClient, ReqwestHttpClient};
use openapi_mcp_tools::OpenApiToolSource;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format)?;

    let config = cli.api_config()?;
    info!(spec = %config.spec, transport = ?cli.transport, "starting openapi-mcp-adapter");

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let source = OpenApiToolSource::build(&config, client)
        .inspect_err(|e| error!(error = %e, spec = %config.spec, "failed to build tool source"))
        .with_context(|| format!("failed to load OpenAPI description '{}'", config.spec))?;
    let server = OpenApiMcpServer::new(Arc::new(source));

    match cli.transport {
        Transport::Stdio => server::serve_stdio(server).await?,
        Transport::Http => server::serve_http(server, cli.bind).await?,
    }
    Ok(())
}
