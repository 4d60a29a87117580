//! Command-line entry point for the zousui community simulation.
//!
//! The runner loads configuration, initializes logging, builds the
//! generation backends and the aggregating generator over an in-memory
//! store, optionally seeds demo data, then executes one subcommand (or a
//! stdin session of them) and prints the result as JSON.
//!
//! # Architecture
//!
//! ```text
//! CLI --> Simulator --> Orchestrator --> AggregatingGenerator --> Backends
//!                            |
//!                            +--> EntityStore
//! ```
//!
//! Logs go to stderr so stdout carries only JSON.

mod cli;

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zousui_sim::{RequestContext, SimConfig, Simulator};
use zousui_store::{EntityStore, seed_demo};
use zousui_types::{Community, CommunityId};

use crate::cli::{Cli, Command, CommunityCommand, split_line};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the command fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = SimConfig::from_env().context("loading configuration")?;
    if cli.no_seed {
        config.seed_demo = false;
    }
    if let Some(ms) = cli.timeout_ms {
        config.request_timeout = Some(Duration::from_millis(ms));
    }
    info!(
        backends = config.backends.len(),
        aggregation = ?config.aggregation,
        seed_demo = config.seed_demo,
        "configuration loaded"
    );

    let store = EntityStore::in_memory();
    if config.seed_demo {
        seed_demo(&store).context("seeding demo data")?;
    }
    let simulator = Simulator::from_config(&config, store)?;

    let (base_ctx, cancel) = RequestContext::with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight request");
            cancel.cancel();
        }
    });

    let runner = Runner {
        simulator,
        base_ctx,
        timeout: config.request_timeout,
    };
    match cli.command {
        Command::Session => runner.session().await,
        command => runner.run(command).await,
    }
}

/// Structured logging to stderr; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct Runner {
    simulator: Simulator,
    base_ctx: RequestContext,
    timeout: Option<Duration>,
}

impl Runner {
    /// A fresh context per request; Ctrl-C cancels all of them.
    fn request_context(&self) -> RequestContext {
        let ctx = self.base_ctx.clone();
        match self.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    async fn run(&self, command: Command) -> anyhow::Result<()> {
        let sim = &self.simulator;
        match command {
            Command::Communities(sub) => self.run_community(sub),
            Command::Agents { community_id } => {
                emit(&sim.communities().agents_of(&CommunityId::new(community_id))?)
            }
            Command::Evolve {
                community_id,
                steps,
            } => {
                let id = CommunityId::new(community_id);
                let mut latest = sim.communities().get(&id)?;
                for step in 1..=steps {
                    latest = sim.evolve(&self.request_context(), &id).await?;
                    info!(step, steps, population = latest.population, "evolution step done");
                }
                emit(&latest)
            }
            Command::Interfere {
                community_id,
                input,
            } => {
                let id = CommunityId::new(community_id);
                emit(
                    &sim.interfere(&self.request_context(), &id, input.as_deref())
                        .await?,
                )
            }
            Command::InterferePair {
                community_a,
                community_b,
                input,
            } => {
                let outcome = sim
                    .interfere_pair(
                        &self.request_context(),
                        &CommunityId::new(community_a),
                        &CommunityId::new(community_b),
                        &input,
                    )
                    .await?;
                emit(&outcome)
            }
            Command::Diplomacy {
                community_a,
                community_b,
            } => {
                let round = sim
                    .diplomacy(
                        &self.request_context(),
                        &CommunityId::new(community_a),
                        &CommunityId::new(community_b),
                    )
                    .await?;
                emit(&round)
            }
            Command::Merge(args) => {
                let merged = sim
                    .merge(
                        &self.request_context(),
                        &CommunityId::new(args.community_a),
                        &CommunityId::new(args.community_b),
                        &CommunityId::new(args.new_id),
                        &args.name,
                    )
                    .await?;
                emit(&merged)
            }
            Command::History => emit(&sim.communities().history()?),
            Command::Session => bail!("session cannot be nested"),
        }
    }

    fn run_community(&self, command: CommunityCommand) -> anyhow::Result<()> {
        let communities = self.simulator.communities();
        match command {
            CommunityCommand::List => emit(&communities.list()?),
            CommunityCommand::Show { id } => emit(&communities.get(&CommunityId::new(id))?),
            CommunityCommand::Create(args) => {
                let community = Community::new(args.id, args.name, args.population, args.culture)
                    .with_description(args.description);
                emit(&communities.create(community)?)
            }
            CommunityCommand::Delete { id } => {
                let id = CommunityId::new(id);
                communities.delete(&id)?;
                emit(&serde_json::json!({ "deleted": id.as_str() }))
            }
        }
    }

    /// Run one command per stdin line against the same store. A failing
    /// line is reported and the session continues.
    async fn session(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("reading stdin")? {
            let words = split_line(&line);
            if words.is_empty() || words.first().is_some_and(|w| w.starts_with('#')) {
                continue;
            }

            let args = std::iter::once("zousui".to_owned()).chain(words);
            let command = match Cli::try_parse_from(args) {
                Ok(cli) => cli.command,
                Err(e) => {
                    warn!(line = %line, error = %e, "invalid session command");
                    continue;
                }
            };
            if let Err(e) = self.run(command).await {
                warn!(line = %line, error = %format!("{e:#}"), "session command failed");
            }
        }
        Ok(())
    }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
