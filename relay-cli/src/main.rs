//! # Relay CLI
//!
//! Interactive front end for the relay dispatch engine. Reads order lines
//! from stdin in the form `NAME DELAY_SECONDS`, submits them to a running
//! engine, and prints lifecycle events as deliveries progress.

use std::time::Duration;

use anyhow::Result;
use relay_core::{EngineBuilder, EngineEvent, OrderDeadline};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One stdin line, validated before it reaches the engine.
fn parse_order_line(line: &str) -> std::result::Result<(String, Duration), String> {
    let mut parts = line.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| "expected: NAME DELAY_SECONDS".to_string())?;
    let delay = parts
        .next()
        .ok_or_else(|| "missing delay, expected: NAME DELAY_SECONDS".to_string())?;
    if parts.next().is_some() {
        return Err("too many fields, expected: NAME DELAY_SECONDS".to_string());
    }
    let seconds: u64 = delay
        .parse()
        .map_err(|_| format!("unparsable delay '{delay}', expected whole seconds"))?;
    Ok((name.to_string(), Duration::from_secs(seconds)))
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::OrderScheduled { name, scheduled_at } => {
            println!("order {name} scheduled for {scheduled_at}");
        }
        EngineEvent::Dispatched { id, name, provider } => {
            println!("order {name} dispatched as {id} via {provider}");
        }
        EngineEvent::Finished { id, provider } => {
            println!("dispatch {id} delivered by {provider}");
        }
        EngineEvent::Archived { id, archived_at } => {
            println!("dispatch {id} archived at {archived_at}");
        }
        EngineEvent::Reaped { id } => {
            println!("dispatch {id} removed from the registry");
        }
        EngineEvent::ProviderFailed {
            id,
            provider,
            reason,
        } => {
            println!("dispatch {id} failed at {provider}: {reason}");
        }
        EngineEvent::DispatchFailed { name, reason } => {
            println!("order {name} could not be dispatched: {reason}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let engine = EngineBuilder::new().events(events_tx).start();
    info!("engine running");

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(&event);
        }
    });

    println!("enter orders as: NAME DELAY_SECONDS (ctrl-c to exit)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("exiting...");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_order_line(&line) {
                    Ok((name, delay)) => {
                        if let Err(error) = engine
                            .submit_order(&name, OrderDeadline::Delay(delay))
                            .await
                        {
                            println!("rejected: {error}");
                        }
                    }
                    Err(reason) => println!("rejected: {reason}"),
                }
            }
        }
    }

    engine.shutdown().await;
    printer.abort();
    Ok(())
}
