use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use todolist::config::Config;
use todolist::view::{render_list, render_stats, render_task_line};
use todolist::{Filter, KeyValueStore, TaskError, TaskId, TaskStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todolist")]
#[command(about = "Manage a to-do list stored on this machine")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the config file (default: ~/.config/todolist/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory, overrides storage.path from the config
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task to the top of the list
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List tasks
    List {
        /// all, completed or pending
        #[arg(short, long, default_value = "all")]
        filter: String,
    },

    /// Print a task's current text
    Show { id: TaskId },

    /// Replace a task's text
    Edit {
        id: TaskId,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Mark a task completed, or pending again
    Toggle { id: TaskId },

    /// Delete a task
    Delete { id: TaskId },

    /// Delete all completed tasks
    ClearCompleted {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show task counts
    Stats,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.store_path {
        config.storage.path = path;
    }

    // Setup tracing
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    if let Commands::Config = cli.command {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let backend = config.open_backend()?;
    let mut store = TaskStore::open(backend, config.store_options()).context("Failed to load tasks")?;
    if let Some(e) = store.last_load_error() {
        eprintln!("{} {}; starting with an empty list", "warning:".yellow(), e);
    }

    match run(&mut store, cli.command) {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<TaskError>() {
            Some(task_err) if !matches!(task_err, TaskError::Storage(_)) => {
                // Validation and lookup failures are user mistakes, not crashes
                eprintln!("{} {}", "warning:".yellow(), task_err);
                std::process::exit(1);
            }
            _ => Err(e),
        },
    }
}

fn run<S: KeyValueStore>(store: &mut TaskStore<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Add { text } => {
            let task = store.add_task(&text.join(" "))?;
            println!("{} {}", "Task added:".green(), render_task_line(&task));
        }
        Commands::List { filter } => {
            store.set_filter(Filter::parse_lenient(&filter));
            println!("{}", render_list(store.filtered_tasks(), store.filter()));
            println!();
            println!("{}", render_stats(&store.stats()));
        }
        Commands::Show { id } => {
            let task = store.get(id).ok_or(TaskError::NotFound(id))?;
            println!("{}", task.text);
        }
        Commands::Edit { id, text } => {
            let task = store.edit_task(id, &text.join(" "))?;
            println!("{} {}", "Task updated:".green(), render_task_line(&task));
        }
        Commands::Toggle { id } => {
            let task = store.toggle_task(id)?;
            println!("{}", render_task_line(&task));
        }
        Commands::Delete { id } => {
            store.delete_task(id)?;
            println!("{}", "Task deleted!".green());
        }
        Commands::ClearCompleted { yes } => {
            let count = store.completed_count();
            if count == 0 {
                return Err(TaskError::NothingToClear.into());
            }
            if !yes && !confirm(&format!("Delete {} completed task(s)?", count))? {
                println!("Nothing deleted");
                return Ok(());
            }
            let removed = store.clear_completed()?;
            println!("{}", format!("{} task(s) cleared!", removed).green());
        }
        Commands::Stats => {
            println!("{}", render_stats(&store.stats()));
        }
        // Printed before the store is opened
        Commands::Config => {}
    }

    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
