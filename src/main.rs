use std::sync::Arc;
use std::time::Duration;

use job_executor::{ExecutorClient, ExecutorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut app_name = "demo-executor".to_string();
    let mut port: u16 = 9999;
    let mut admin_addresses: Vec<String> = vec![];

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--app" => {
                app_name = args[i + 1].clone();
                i += 2;
            }
            "--port" => {
                port = args[i + 1].parse()?;
                i += 2;
            }
            "--admin" => {
                admin_addresses.push(args[i + 1].clone());
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    if admin_addresses.is_empty() {
        eprintln!(
            "Usage: {} --app <name> --port <port> --admin <coordinator-url> [--admin <url>...]",
            args[0]
        );
        eprintln!(
            "Example: {} --app demo-executor --port 9999 --admin http://localhost:8080/xxl-job-admin",
            args[0]
        );
        std::process::exit(1);
    }

    let mut config = ExecutorConfig::new(app_name)
        .port(port)
        .beat_interval(Duration::from_secs(30));
    for address in admin_addresses {
        config = config.admin_address(address);
    }

    let client = Arc::new(ExecutorClient::new(config));

    client.register_job("echo_params", |ctx| async move {
        ctx.log(format!("echo_params started, log id {}", ctx.log_id));
        for (key, value) in ctx.params() {
            ctx.log(format!("param {}={}", key, value));
        }
        ctx.log("echo_params done");
        Ok(())
    })?;

    client.register_job("sharded_sleep", |ctx| async move {
        let (index, total) = ctx.sharding();
        ctx.log(format!("shard {}/{} working", index, total));
        for _ in 0..10 {
            if ctx.is_cancelled() {
                ctx.log("cancelled, winding down");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        ctx.log("shard finished");
        Ok(())
    })?;

    let shutdown_client = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown_client.shutdown();
        }
    });

    client.run().await
}
