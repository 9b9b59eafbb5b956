use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use rowguard::{
    GuardConfig, InputKind, InputObjectFragment, InputTypeHook, InputTypeScope, MutationRequest,
    OptimisticLockGuard, TableDescriptor,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rowguard")]
#[command(about = "Inspect optimistic lock verification for a table")]
struct Cli {
    /// Table descriptor as JSON
    #[arg(long, global = true)]
    table: Option<PathBuf>,

    /// Guard configuration as JSON; overrides --version-column
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "updated_at")]
    version_column: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the locked verification query a mutation input would run
    Sql {
        /// Mutation input as a JSON object
        #[arg(long)]
        input: String,
    },
    /// Print the version field added to the table's mutation inputs
    Field {
        #[arg(long, value_enum, default_value_t = Kind::Update)]
        kind: Kind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Update,
    Delete,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let table_path = cli
        .table
        .as_deref()
        .ok_or_else(|| anyhow!("--table <path> is required"))?;
    let table = load_table(table_path)?;
    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GuardConfig::from_json(&text)?
        }
        None => GuardConfig::new(&cli.version_column),
    };
    let guard = OptimisticLockGuard::new(config)?;

    match cli.command {
        Command::Sql { input } => print_sql(&guard, &table, &input),
        Command::Field { kind } => print_field(&guard, table, kind),
    }
}

fn load_table(path: &Path) -> Result<TableDescriptor> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_table(&text).with_context(|| format!("invalid table descriptor {}", path.display()))
}

fn parse_table(text: &str) -> Result<TableDescriptor> {
    Ok(serde_json::from_str(text)?)
}

fn print_sql(guard: &OptimisticLockGuard, table: &TableDescriptor, input: &str) -> Result<()> {
    println!("{}", render_sql(guard, table, input)?);
    Ok(())
}

fn render_sql(guard: &OptimisticLockGuard, table: &TableDescriptor, input: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(input).context("--input is not JSON")?;
    let request = MutationRequest::from_json(value)?;

    let Some(query) = guard.plan(table, &request)? else {
        return Ok(format!("-- {} is not guarded", table.name()));
    };
    let statement = query.to_sql();
    let mut out = statement.text;
    for (idx, param) in statement.params.iter().enumerate() {
        out.push_str(&format!("\n  ${} = {}", idx + 1, param));
    }
    Ok(out)
}

fn print_field(guard: &OptimisticLockGuard, table: TableDescriptor, kind: Kind) -> Result<()> {
    println!("{}", render_field(guard, table, kind)?);
    Ok(())
}

fn render_field(guard: &OptimisticLockGuard, table: TableDescriptor, kind: Kind) -> Result<String> {
    let kind = match kind {
        Kind::Update => InputKind::Update,
        Kind::Delete => InputKind::Delete,
    };
    let scope = InputTypeScope::new(Arc::new(table), kind);
    let after = guard.augment_input_type(&scope, InputObjectFragment::new("Input"))?;

    Ok(match after.fields().first() {
        Some(field) => match &field.description {
            Some(description) => format!("{}\n  # {}", field, description),
            None => field.to_string(),
        },
        None => format!("-- {} is not guarded", scope.table.name()),
    })
}
