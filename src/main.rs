use std::env;
use std::process::ExitCode;

use dotenvy::dotenv;
use graphlink::{GraphConnection, Neo4jSettings, QueryParams};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();

    let params = match args.get(1).map(|raw| serde_json::from_str::<QueryParams>(raw)) {
        Some(Ok(params)) => Some(params),
        Some(Err(e)) => {
            error!("PARAMS_JSON must be a JSON object: {}", e);
            return ExitCode::from(2);
        }
        None => None,
    };

    let connection = GraphConnection::new(Neo4jSettings::from_env());

    let code = if !connection.verify_connection().await {
        error!("Neo4j is not reachable");
        ExitCode::FAILURE
    } else if let Some(query) = args.first() {
        match connection.run_query(query, params).await {
            Ok(rows) => match serde_json::to_string_pretty(&rows) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("Failed to render rows: {}", e);
                    ExitCode::FAILURE
                }
            },
            Err(_) => ExitCode::FAILURE,
        }
    } else {
        info!("Neo4j connection verified");
        ExitCode::SUCCESS
    };

    connection.close().await;
    code
}
