//! armsweep CLI - validity checks and random-policy rollouts
//!
//! Loads an environment config, selects problem instances and reports what
//! the motion validity core says about them.

use anyhow::{Context, Result};
use armsweep_physics::{goal_distance_policy, PlanError, PlanningEnv, ProblemSource};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "armsweep")]
#[command(about = "Time-synchronized motion validity checks for arms among scripted obstacles", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the init and goal states of a problem instance and the direct edge between them
    Check {
        /// Environment config (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Problem batch (JSON)
        #[arg(short, long)]
        problems: PathBuf,
        /// Instance slot; defaults to the first
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Run random-policy episodes over RL problems
    Rollout {
        /// Environment config (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Problem batch (JSON)
        #[arg(short, long)]
        problems: PathBuf,
        /// RL point sets and edges (JSON)
        #[arg(long)]
        rl: PathBuf,
        /// Number of episodes
        #[arg(short, long, default_value_t = 10)]
        episodes: usize,
        /// Step limit per episode
        #[arg(short, long, default_value_t = 100)]
        max_steps: usize,
    },
}

#[derive(Serialize)]
struct CheckReport {
    problem: usize,
    init_feasible: bool,
    goal_feasible: bool,
    edge_feasible: bool,
    edge_queries: u64,
    collision_passes: u64,
    weighted_checks: f64,
}

#[derive(Serialize)]
struct EpisodeReport {
    episode: usize,
    problem: usize,
    rl_problem: usize,
    steps: usize,
    episode_return: f64,
    success: bool,
    collision_passes: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Check {
            config,
            problems,
            index,
        } => {
            let report = check(&config, &problems, index)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_check(&report);
            }
        }
        Commands::Rollout {
            config,
            problems,
            rl,
            episodes,
            max_steps,
        } => {
            let reports = rollout(&config, &problems, &rl, episodes, max_steps)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print_rollout(&reports);
            }
        }
    }

    Ok(())
}

fn load_env(config: &Path) -> Result<PlanningEnv<armsweep_physics::CollisionWorld>> {
    PlanningEnv::from_config_file(config)
        .with_context(|| format!("Failed to load environment from {}", config.display()))
}

fn check(config: &Path, problems: &Path, index: Option<usize>) -> Result<CheckReport> {
    let mut env = load_env(config)?;
    let problem = env
        .init_new_problem(Some(ProblemSource::File(problems.to_path_buf())), index)
        .with_context(|| format!("Failed to load problems from {}", problems.display()))?;

    let init = env.init_state()?.clone();
    let goal = env.goal_state()?.clone();

    env.seek_obstacles(0)?;
    let init_feasible = env.static_feasible(init.as_slice())?;
    let goal_feasible = env.static_feasible(goal.as_slice())?;
    let edge_feasible = env.edge_feasible(init.as_slice(), goal.as_slice(), 0)?;

    let stats = env.stats();
    Ok(CheckReport {
        problem,
        init_feasible,
        goal_feasible,
        edge_feasible,
        edge_queries: stats.edge_queries,
        collision_passes: stats.collision_passes,
        weighted_checks: stats.weighted_checks,
    })
}

fn rollout(
    config: &Path,
    problems: &Path,
    rl: &Path,
    episodes: usize,
    max_steps: usize,
) -> Result<Vec<EpisodeReport>> {
    let mut env = load_env(config)?;
    let rl_count = env
        .init_all_rl_problems(rl)
        .with_context(|| format!("Failed to load RL problems from {}", rl.display()))?;

    let mut source = Some(ProblemSource::File(problems.to_path_buf()));
    let mut reports = Vec::with_capacity(episodes);

    for episode in 0..episodes {
        let problem = env.init_new_problem(source.take(), None)?;
        let rl_problem = episode % rl_count;
        let goal = env.goal_state()?.clone();
        env.init_rl_problem(rl_problem, goal_distance_policy(goal))?;
        env.reset()?;

        let mut steps = 0;
        let mut episode_return = 0.0;
        let mut success = false;
        while steps < max_steps {
            let action = match env.sample_random_action() {
                Ok(action) => action,
                Err(PlanError::NoCandidates { index }) => {
                    tracing::warn!(episode, index, "stuck on a node with no transitions");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            let outcome = env.step(action)?;
            steps += 1;
            episode_return += outcome.reward;
            if outcome.done {
                success = true;
                break;
            }
        }

        reports.push(EpisodeReport {
            episode,
            problem,
            rl_problem,
            steps,
            episode_return,
            success,
            collision_passes: env.stats().collision_passes,
        });
    }

    Ok(reports)
}

fn print_check(report: &CheckReport) {
    println!("Problem {}", report.problem);
    println!("  init state:  {}", verdict(report.init_feasible));
    println!("  goal state:  {}", verdict(report.goal_feasible));
    println!("  direct edge: {}", verdict(report.edge_feasible));
    println!(
        "  checks: {} edge queries, {} collision passes, {} weighted",
        report.edge_queries, report.collision_passes, report.weighted_checks
    );
}

fn print_rollout(reports: &[EpisodeReport]) {
    for r in reports {
        println!(
            "Episode {:>3}  problem {:>3}  rl {:>3}  steps {:>4}  return {:>9.3}  {}",
            r.episode,
            r.problem,
            r.rl_problem,
            r.steps,
            r.episode_return,
            if r.success { "reached goal" } else { "-" }
        );
    }
    let successes = reports.iter().filter(|r| r.success).count();
    println!("{successes}/{} episodes reached the goal", reports.len());
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "collision-free"
    } else {
        "in collision"
    }
}
