use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use harvest::Orchestrator;
use mav::MavApiClient;
use storage::gcs::{GcsConfig, GcsStore};
use storage::SharedStore;
use web::{start_web_server, WebState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port = env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(8080);
    let pairs_csv =
        PathBuf::from(env::var("PAIRS_CSV").unwrap_or_else(|_| "routes.csv".to_owned()));
    let output_root =
        PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "json_output".to_owned()));
    let base_prefix =
        env::var("BASE_PREFIX").unwrap_or_else(|_| "blog/mav/json_output".to_owned());

    let client = MavApiClient::new().expect("could not build offer api client.");

    let store: Option<SharedStore> = match GcsConfig::env() {
        Ok(config) => {
            let store = GcsStore::new(config).expect("could not build object store.");
            Some(Arc::new(store))
        }
        Err(why) => {
            log::warn!("object store not configured ({}), uploads disabled", why);
            None
        }
    };

    let orchestrator = Arc::new(
        Orchestrator::new(
            Arc::new(client),
            store,
            base_prefix,
            pairs_csv,
            output_root.clone(),
        )
        .with_call_log(output_root.join("mav_calls.jsonl")),
    );

    start_web_server(WebState { orchestrator }, port)
        .await
        .expect("web server failed.");
}
