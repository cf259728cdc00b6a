//! HTTP gateway that passes whitelisted requests through to the platform
//! backends.

mod admin;
pub mod config;
pub mod errors;
pub mod metrics_defs;
mod service;

use admin::AdminService;
use dataapi::ApiClient;
use errors::GatewayError;
use shared::http::run_http_service;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

pub use service::GatewayService;

/// Serves the gateway and admin listeners until `shutdown` resolves.
pub async fn run<F>(config: config::Config, client: ApiClient, shutdown: F) -> Result<(), GatewayError>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    let ready = Arc::new(AtomicBool::new(true));
    let (stop_tx, stop_rx) = watch::channel(false);

    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        GatewayService::new(client, config.modules.clone()),
        stopped(stop_rx.clone()),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(ready.clone()),
        stopped(stop_rx),
    );
    let shutdown_task = async {
        shutdown.await;
        tracing::info!("shutting down gateway");
        ready.store(false, Ordering::Relaxed);
        let _ = stop_tx.send(true);
        Ok::<(), GatewayError>(())
    };

    tokio::try_join!(gateway_task, admin_task, shutdown_task)?;
    Ok(())
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataapi::ApiSettings;
    use hyper::StatusCode;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn config(port: u16, admin_port: u16) -> config::Config {
        serde_yaml::from_str(&format!(
            r#"
listener: {{host: "127.0.0.1", port: {port}}}
admin_listener: {{host: "127.0.0.1", port: {admin_port}}}
modules:
    job:
        url_prefix: "http://127.0.0.1:1/jobv3/"
        supported:
            - method: GET
              url_regex: "get_job_instance_status/"
"#
        ))
        .unwrap()
    }

    fn client() -> ApiClient {
        ApiClient::new(ApiSettings::new("bkchat", "secret")).unwrap()
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (port, admin_port) = (free_port(), free_port());
        let ready_url = format!("http://127.0.0.1:{admin_port}/ready");
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let driver = async {
            let http = reqwest::Client::new();
            let mut status = None;
            for _ in 0..100 {
                if let Ok(response) = http.get(&ready_url).send().await {
                    status = Some(response.status());
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let _ = stop_tx.send(());
            status
        };
        let server = run(config(port, admin_port), client(), async {
            let _ = stop_rx.await;
        });

        let (result, status) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(server, driver)
        })
        .await
        .unwrap();
        result.unwrap();
        assert_eq!(status, Some(StatusCode::OK));

        // both listeners are closed once run returns
        let http = reqwest::Client::new();
        assert!(http.get(&ready_url).send().await.is_err());
        assert!(
            http.get(format!("http://127.0.0.1:{port}/job/get_job_instance_status/"))
                .send()
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let result = run(config(0, free_port()), client(), async {}).await;
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }
}
