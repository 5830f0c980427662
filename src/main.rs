//! kanban-order CLI - kanban boards with dense, conflict-free task ordering.

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use kanban_order::{
    Action, BoardEvent, Client, Config, Daemon, DaemonConfig, Priority, Role, Store, Task, is_daemon_running,
};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod cli;

use cli::{BoardCommand, Cli, ColumnCommand, Command, MemberCommand, ProjectCommand, TaskCommand};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanban-order")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("kanban-order.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_store_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn get_user(cli: &Cli) -> String {
    cli.user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn load_config(store_dir: &Path, busy_timeout_ms: Option<u64>) -> Result<Config> {
    let config = Config::load(store_dir)?;
    Ok(match busy_timeout_ms {
        Some(ms) => config.busy_timeout(Duration::from_millis(ms)),
        None => config,
    })
}

fn format_priority(priority: &Priority) -> ColoredString {
    match priority {
        Priority::Low => "low".dimmed(),
        Priority::Medium => "medium".normal(),
        Priority::High => "high".yellow(),
        Priority::Urgent => "urgent".red(),
    }
}

fn format_action(action: &Action) -> ColoredString {
    match action {
        Action::Created => "created".green(),
        Action::Moved => "moved".blue(),
        Action::Deleted => "deleted".red(),
    }
}

fn print_event(event: &BoardEvent) {
    match event {
        BoardEvent::TaskCreate {
            task_id,
            column_id,
            order,
            user,
        } => println!(
            "{} {} created {} at {}[{}]",
            "+".green(),
            user.id.bold(),
            task_id.cyan(),
            column_id,
            order
        ),
        BoardEvent::TaskMove {
            task_id,
            source_column_id,
            destination_column_id,
            order,
            user,
        } => println!(
            "{} {} moved {} {} -> {}[{}]",
            "→".blue(),
            user.id.bold(),
            task_id.cyan(),
            source_column_id,
            destination_column_id,
            order
        ),
        BoardEvent::TaskDelete {
            task_id,
            column_id,
            user,
        } => println!(
            "{} {} deleted {} from {}",
            "✗".red(),
            user.id.bold(),
            task_id.cyan(),
            column_id
        ),
        BoardEvent::ColumnRepair {
            column_id,
            rewritten,
            user,
        } => println!(
            "{} {} repaired {} ({} order(s) rewritten)",
            "⟳".yellow(),
            user.id.bold(),
            column_id.cyan(),
            rewritten
        ),
    }
}

fn print_task(task: &Task) {
    println!("{}: {}", "ID".bold(), task.id.cyan());
    println!("{}: {}", "Title".bold(), task.title);
    println!("{}: {}", "Column".bold(), task.column_id);
    println!("{}: {}", "Order".bold(), task.order);
    println!("{}: {}", "Priority".bold(), format_priority(&task.priority));
    if let Some(desc) = &task.description {
        println!("{}: {}", "Description".bold(), desc);
    }
    println!("{}: {}", "Created".bold(), task.created_at);
    println!("{}: {}", "Updated".bold(), task.updated_at);
}

/// Check the acting user's role in the project owning a resource.
fn authorize(store: &Store, project: Option<String>, id: &str, user: &str, allowed: fn(&Role) -> bool) -> Result<()> {
    let Some(project_id) = project else {
        bail!("Not found: {}", id);
    };
    match store.member(&project_id, user)? {
        Some(member) if allowed(&member.role) => Ok(()),
        Some(member) => bail!(
            "Forbidden: role '{}' may not perform this operation in project {}",
            member.role.as_str(),
            project_id
        ),
        None => bail!("Forbidden: user '{}' is not a member of project {}", user, project_id),
    }
}

/// Record activity for a local write; failures are logged.
fn record(store: &mut Store, user: &str, task_id: &str, action: Action, description: &str) {
    if let Err(e) = store.record_activity(user, task_id, action, description) {
        log::warn!("Failed to record activity for {}: {}", task_id, e);
    }
}

/// Repair a column without a daemon, with the same rights as a task move.
fn repair_locally(store_dir: &Path, user: &str, config: Config, column_id: &str) -> Result<usize> {
    let mut store = Store::open_with_config(store_dir, config).context("Failed to open store")?;
    authorize(&store, store.project_of_column(column_id)?, column_id, user, Role::can_edit_tasks)?;
    store.repair_column(column_id).context("Failed to repair column")
}

fn run_task(command: TaskCommand, store_dir: &Path, user: &str, config: Config) -> Result<()> {
    // Route mutations through a running daemon so subscribers see them
    let mut client = if is_daemon_running(store_dir) {
        Some(Client::connect(store_dir, user, false).context("Failed to connect to daemon")?)
    } else {
        None
    };

    match command {
        TaskCommand::Create {
            column_id,
            title,
            priority,
            description,
        } => {
            let Some(priority) = Priority::parse(&priority) else {
                bail!("Unknown priority '{}' (expected low, medium, high or urgent)", priority);
            };

            let task = match client.as_mut() {
                Some(client) => client.create_task(&column_id, &title, description.as_deref(), priority)?,
                None => {
                    let mut store = Store::open_with_config(store_dir, config).context("Failed to open store")?;
                    authorize(&store, store.project_of_column(&column_id)?, &column_id, user, Role::can_edit_tasks)?;
                    let task = store
                        .create_task(&column_id, &title, description.as_deref(), priority)
                        .context("Failed to create task")?;
                    record(&mut store, user, &task.id, Action::Created, &format!("Created task '{}'", task.title));
                    task
                }
            };

            println!(
                "{} Created: {} {} at position {}",
                "✓".green(),
                task.id.cyan(),
                task.title,
                task.order
            );
        }

        TaskCommand::Move {
            task_id,
            column_id,
            order,
        } => {
            let outcome = match client.as_mut() {
                Some(client) => client.move_task(&task_id, &column_id, order)?,
                None => {
                    let mut store = Store::open_with_config(store_dir, config).context("Failed to open store")?;
                    authorize(&store, store.project_of_task(&task_id)?, &task_id, user, Role::can_edit_tasks)?;
                    authorize(&store, store.project_of_column(&column_id)?, &column_id, user, Role::can_edit_tasks)?;
                    let outcome = store
                        .move_task(&task_id, &column_id, order)
                        .context("Failed to move task")?;
                    record(
                        &mut store,
                        user,
                        &outcome.task.id,
                        Action::Moved,
                        &format!(
                            "Moved task '{}' to column {} at position {}",
                            outcome.task.title, outcome.task.column_id, outcome.task.order
                        ),
                    );
                    outcome
                }
            };

            if outcome.changed {
                println!(
                    "{} Moved: {} {}[{}] -> {}[{}]",
                    "→".blue(),
                    outcome.task.id.cyan(),
                    outcome.source_column_id,
                    outcome.source_order,
                    outcome.task.column_id,
                    outcome.task.order
                );
            } else {
                println!("{} {} already at that position", "✓".green(), outcome.task.id.cyan());
            }
        }

        TaskCommand::Delete { task_id } => {
            match client.as_mut() {
                Some(client) => client.delete_task(&task_id)?,
                None => {
                    let mut store = Store::open_with_config(store_dir, config).context("Failed to open store")?;
                    authorize(&store, store.project_of_task(&task_id)?, &task_id, user, Role::can_edit_tasks)?;
                    let task = store.delete_task(&task_id).context("Failed to delete task")?;
                    record(&mut store, user, &task.id, Action::Deleted, &format!("Deleted task '{}'", task.title));
                }
            }
            println!("{} Deleted: {}", "✓".green(), task_id.cyan());
        }

        TaskCommand::Get { id } => {
            let task = match client.as_mut() {
                Some(client) => client.get_task(&id)?,
                None => Store::open_with_config(store_dir, config)
                    .context("Failed to open store")?
                    .get_task(&id)
                    .context("Failed to get task")?,
            };

            match task {
                Some(task) => print_task(&task),
                None => {
                    eprintln!("{} Task not found: {}", "✗".red(), id);
                    std::process::exit(1);
                }
            }
        }

        TaskCommand::List { column_id } => {
            let tasks = match client.as_mut() {
                Some(client) => client.list_column(&column_id)?,
                None => Store::open_with_config(store_dir, config)
                    .context("Failed to open store")?
                    .list_tasks(&column_id)
                    .context("Failed to list tasks")?,
            };

            if tasks.is_empty() {
                println!("{}", "No tasks in column".dimmed());
            } else {
                for task in tasks {
                    println!(
                        "{:>3} {} {} {}",
                        task.order,
                        task.id.cyan(),
                        format_priority(&task.priority),
                        task.title
                    );
                }
            }
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let store_dir = get_store_dir(&cli);
    let user = get_user(&cli);
    let config = load_config(&store_dir, cli.busy_timeout_ms)?;

    match cli.command {
        Command::Init => {
            Store::init_with_config(&store_dir, config).context("Failed to initialize board store")?;
            println!("{} Initialized board store in {}", "✓".green(), store_dir.display());
        }

        Command::Project(ProjectCommand::Create { name, description }) => {
            let mut store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            let project = store
                .create_project(&name, description.as_deref(), &user)
                .context("Failed to create project")?;

            println!("{} Created project: {} {}", "✓".green(), project.id.cyan(), project.name);
        }

        Command::Member(MemberCommand::Add {
            project_id,
            member,
            role,
        }) => {
            let Some(role) = Role::parse(&role) else {
                bail!("Unknown role '{}' (expected owner, admin, manager, member or viewer)", role);
            };

            let mut store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            authorize(&store, Some(project_id.clone()), &project_id, &user, Role::can_manage)?;
            let member = store
                .add_member(&project_id, &member, role)
                .context("Failed to add member")?;

            println!(
                "{} {} is now {} of {}",
                "✓".green(),
                member.user.bold(),
                member.role.as_str(),
                project_id.cyan()
            );
        }

        Command::Board(BoardCommand::Create { project_id, name }) => {
            let mut store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            authorize(&store, Some(project_id.clone()), &project_id, &user, Role::can_edit_boards)?;
            let board = store
                .create_board(&project_id, &name)
                .context("Failed to create board")?;

            println!("{} Created board: {} {}", "✓".green(), board.id.cyan(), board.name);
        }

        Command::Column(ColumnCommand::Create {
            board_id,
            name,
            wip_limit,
        }) => {
            let mut store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            let project = store.get_board(&board_id)?.map(|b| b.project_id);
            authorize(&store, project, &board_id, &user, Role::can_edit_boards)?;
            let column = store
                .create_column(&board_id, &name, wip_limit)
                .context("Failed to create column")?;

            println!(
                "{} Created column: {} {} at position {}",
                "✓".green(),
                column.id.cyan(),
                column.name,
                column.order
            );
        }

        Command::Task(command) => run_task(command, &store_dir, &user, config)?,

        Command::Verify => {
            let store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            let reports = store.verify().context("Failed to verify orders")?;

            if reports.is_empty() {
                println!("{} Every column is dense", "✓".green());
            } else {
                println!("{} {} column(s) need repair:", "⊘".red(), reports.len());
                for report in reports {
                    println!("  {} {:?}", report.column_id.cyan(), report.orders);
                }
                std::process::exit(1);
            }
        }

        Command::Repair { column_id } => {
            let rewritten = if is_daemon_running(&store_dir) {
                let mut client = Client::connect(&store_dir, &user, false).context("Failed to connect to daemon")?;
                client.repair_column(&column_id)?
            } else {
                repair_locally(&store_dir, &user, config, &column_id)?
            };

            println!("{} Rewrote {} order(s) in {}", "✓".green(), rewritten, column_id.cyan());
        }

        Command::Log { task, limit } => {
            let store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            let entries = store
                .activity(task.as_deref(), limit)
                .context("Failed to read activity log")?;

            if entries.is_empty() {
                println!("{}", "No activity".dimmed());
            } else {
                for entry in entries {
                    println!(
                        "{} {} {} {} {}",
                        entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                        entry.user.bold(),
                        format_action(&entry.action),
                        entry.task_id.cyan(),
                        entry.description
                    );
                }
            }
        }

        Command::Vacuum => {
            let store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            store.vacuum().context("Failed to vacuum database")?;
            println!("{} Database compacted", "✓".green());
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), store_dir.display());

            let store = Store::open_with_config(&store_dir, config).context("Failed to open store")?;
            let mut daemon = Daemon::with_store(DaemonConfig::new(&store_dir), store);

            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&store_dir) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&store_dir, &user, false).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&store_dir) {
                println!("{} Daemon is running", "✓".green());

                if let Ok(mut client) = Client::connect(&store_dir, &user, false)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }

        Command::Watch { board_id } => {
            let client = Client::connect(&store_dir, &user, true).context("Failed to connect to daemon")?;
            println!("{} Watching board {} (Ctrl-C to stop)", "→".blue(), board_id.cyan());
            client.watch(&board_id, |event| {
                print_event(&event);
                true
            })?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
