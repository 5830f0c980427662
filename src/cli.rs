//! CLI argument parsing for kanban-order.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ko",
    about = "Kanban boards with dense, conflict-free task ordering",
    version,
    after_help = "Logs are written to: ~/.local/share/kanban-order/logs/kanban-order.log"
)]
pub struct Cli {
    /// Path to the board store directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    /// Acting user (default: $USER)
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,

    /// Override the SQLite busy timeout in milliseconds
    #[arg(long, global = true)]
    pub busy_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new board store in the current directory
    Init,

    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage project membership
    #[command(subcommand)]
    Member(MemberCommand),

    /// Manage boards
    #[command(subcommand)]
    Board(BoardCommand),

    /// Manage columns
    #[command(subcommand)]
    Column(ColumnCommand),

    /// Create, move, delete and inspect tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Report columns whose task orders are not dense
    Verify,

    /// Renumber a column's tasks to 0..n-1
    Repair {
        /// Column ID
        column_id: String,
    },

    /// Show the activity log
    Log {
        /// Only show activity for this task
        #[arg(short, long)]
        task: Option<String>,

        /// Maximum number of entries
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Compact the database file
    Vacuum,

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,

    /// Stream a board's events (starts the daemon if needed)
    Watch {
        /// Board ID
        board_id: String,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Create a project owned by the acting user
    Create {
        name: String,

        #[arg(short = 'D', long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MemberCommand {
    /// Add or update a project member
    Add {
        /// Project ID
        project_id: String,

        /// User to add
        member: String,

        /// Role (owner, admin, manager, member, viewer)
        #[arg(short, long, default_value = "member")]
        role: String,
    },
}

#[derive(Subcommand)]
pub enum BoardCommand {
    /// Create a board in a project
    Create {
        /// Project ID
        project_id: String,

        name: String,
    },
}

#[derive(Subcommand)]
pub enum ColumnCommand {
    /// Append a column to a board
    Create {
        /// Board ID
        board_id: String,

        name: String,

        /// Work in progress limit
        #[arg(short, long)]
        wip_limit: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Create a task at the end of a column
    Create {
        /// Column ID
        column_id: String,

        /// Task title
        title: String,

        /// Priority (low, medium, high, urgent)
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Description
        #[arg(short = 'D', long)]
        description: Option<String>,
    },

    /// Move a task to a position in a column
    Move {
        /// Task ID
        task_id: String,

        /// Destination column ID
        column_id: String,

        /// Zero-based destination position (clamped to the column length)
        #[arg(allow_negative_numbers = true)]
        order: i64,
    },

    /// Delete a task
    Delete {
        /// Task ID
        task_id: String,
    },

    /// Get a task by ID
    Get {
        /// Task ID
        id: String,
    },

    /// List a column's tasks in order
    List {
        /// Column ID
        column_id: String,
    },
}
