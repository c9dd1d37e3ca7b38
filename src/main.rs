#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod core;
mod error;
mod prelude;
mod quantity;
mod retry;
mod tables;
#[cfg(test)]
mod testing;

use chrono::Utc;
use clap::{Parser, crate_version};

use crate::{
    cli::Args,
    core::poll::{PollLoop, Publishing},
    prelude::*,
    tables::{build_batch_table, group_digits},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::from_filename("env.list");
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();
    let assembler = args.new_assembler()?;
    let heartbeat = args.new_heartbeat()?;

    if args.is_service {
        let cycle = Publishing { assembler, publisher: args.new_relic.new_api()?, heartbeat };
        PollLoop::new(cycle, args.polling_interval).run().await;
        return Ok(());
    }

    let batch = assembler.assemble(Utc::now()).await.context("failed to assemble the batch")?;
    if args.scout {
        info!("scouting, not publishing");
    } else {
        match args.new_relic.new_api()?.publish(&batch).await {
            Ok(()) => heartbeat.send().await,
            Err(error) => error!("failed to publish the batch: {error:#}"),
        }
    }
    println!("{}", build_batch_table(&batch));
    println!("timestamp:\t{}", group_digits(batch.timestamp().timestamp_millis()));
    Ok(())
}
