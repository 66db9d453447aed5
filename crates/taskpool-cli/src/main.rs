use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use taskpool_core::{Algorithm, Priority};
use taskpool_ipc::{Client, IpcConfig};

#[derive(Parser)]
#[command(name = "taskpool", about = "Control client for the task pool supervisor")]
struct Cli {
    /// Path to the supervisor's control socket (overrides
    /// TASKPOOL_RUNTIME_DIR).
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new task.
    Submit {
        /// Task name (max 256 bytes).
        name: String,
        /// HIGH, MEDIUM, or LOW.
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Nominal execution time in milliseconds.
        #[arg(long, default_value_t = 1000)]
        execution_ms: u64,
        /// Gang this task belongs to, if any.
        #[arg(long)]
        gang_id: Option<i64>,
        /// Lottery tickets for the LOTTERY policy.
        #[arg(long)]
        lottery_tickets: Option<u32>,
        /// Abort and retry/timeout after this many seconds.
        #[arg(long)]
        timeout_seconds: Option<u64>,
        /// Deadline for the EDF policy, as an offset from now in seconds.
        #[arg(long)]
        deadline_seconds: Option<u64>,
    },
    /// Cancel a pending task.
    Cancel { task_id: u64 },
    /// Switch the active scheduling policy.
    SetAlgorithm { algorithm: Algorithm },
    /// Print pool counters.
    Status,
    /// Print pool counters and every task record as JSON.
    Snapshot,
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let socket_path = match cli.socket {
        Some(path) => path,
        None => IpcConfig::from_env().socket_path(),
    };
    let mut client = Client::connect(&socket_path)
        .await
        .with_context(|| format!("connecting to supervisor at {}", socket_path.display()))?;

    match cli.command {
        Commands::Submit {
            name,
            priority,
            execution_ms,
            gang_id,
            lottery_tickets,
            timeout_seconds,
            deadline_seconds,
        } => {
            let result = client
                .submit(
                    name,
                    priority,
                    execution_ms,
                    gang_id,
                    lottery_tickets,
                    timeout_seconds,
                    deadline_seconds,
                )
                .await?;
            match result {
                Ok(task_id) => println!("submitted task {task_id}"),
                Err(e) => {
                    eprintln!("submit failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Cancel { task_id } => match client.cancel(task_id).await? {
            Ok(()) => println!("cancelled task {task_id}"),
            Err(e) => {
                eprintln!("cancel failed: {e}");
                std::process::exit(1);
            }
        },
        Commands::SetAlgorithm { algorithm } => {
            client.set_algorithm(algorithm).await?;
            println!("algorithm set to {algorithm}");
        }
        Commands::Status => {
            let stats = client.status().await?;
            println!("algorithm:        {}", stats.algorithm);
            println!("size/capacity:    {}/{}", stats.size, stats.capacity);
            println!("total submitted:  {}", stats.total_tasks);
            println!("completed:        {}", stats.completed_tasks);
            println!("failed:           {}", stats.failed_tasks);
            println!("active workers:   {}", stats.num_active_workers);
        }
        Commands::Snapshot => {
            let snapshot = client.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
