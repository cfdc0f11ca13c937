use abac_common::Name;
use abac_daemon::{
    Deployment,
    cli::{AbacCli, Command, RunArgs, parse_request_line},
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::{io::BufRead, sync::Arc};
use tokio::{sync::mpsc, task::JoinSet};
use tracing_subscriber::EnvFilter;

pub fn main() -> Result<()> {
    let cli = AbacCli::parse();
    init_tracing(&cli.log_level);
    match cli.command {
        Command::Run(args) => run(args),
    }
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let plan = args.into_plan().context("unable to read configuration")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let deployment = runtime
        .block_on(Deployment::start(plan))
        .context("unable to start roles")?;
    let rejected = deployment
        .policy_outcomes
        .iter()
        .filter(|outcome| outcome.result.is_err())
        .count();
    tracing::info!(
        policies = deployment.policy_outcomes.len(),
        rejected,
        "all roles running"
    );

    // The network and every in-flight consume run on a dedicated thread so
    // the stdin loop below never blocks them.
    let (requests, mut inbox) = mpsc::unbounded_channel::<Name>();
    let network = std::thread::Builder::new()
        .name("abacd-network".into())
        .spawn(move || {
            runtime.block_on(async move {
                let consumer = Arc::clone(&deployment.consumer);
                let mut in_flight = JoinSet::new();
                while let Some(data_name) = inbox.recv().await {
                    let consumer = Arc::clone(&consumer);
                    in_flight.spawn(async move {
                        consumer
                            .consume_with(
                                &data_name,
                                |plaintext| {
                                    println!(
                                        "{data_name}: {}",
                                        String::from_utf8_lossy(&plaintext)
                                    );
                                },
                                |error| println!("{data_name}: failed with {}", error.category()),
                            )
                            .await;
                    });
                }
                while in_flight.join_next().await.is_some() {}
                drop(deployment);
            });
        })?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        match parse_request_line(line) {
            Some(data_name) => {
                if requests.send(data_name).is_err() {
                    break;
                }
            }
            None => eprintln!("expected 'producerName,dataName' or 'quit'"),
        }
    }
    drop(requests);

    network
        .join()
        .map_err(|_| anyhow!("network thread panicked"))
}
