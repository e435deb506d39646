//! Command line interface.
//!
//! `load` builds `hospital.db` from a MySQL dump, `schema`, `ask` and `sql`
//! run one-off commands, and `chat` / `repl` start an interactive session
//! that ends when the user types `exit`.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};

use mediquery_data::loader::{self, LoaderConfig, DEFAULT_SQL_FILE};
use mediquery_data::{DatabaseConfig, DatabasePool, QueryResult};
use mediquery_domain::entities::{AskRequest, QueryAnswer};
use mediquery_domain::llm::{HuggingFaceClient, LlmConfig};
use mediquery_domain::services::{
    is_exit, ChatServiceTrait, ChatSession, QueryService, QueryServiceConfig, QueryServiceTrait,
};

/// Prompt shown before each line of input
pub const PROMPT: &str = "Enter a prompt: ";

/// Printed when an interactive session ends
pub const END_OF_SESSION: &str = "--End of session--";

#[derive(Debug, Parser)]
#[command(name = "mediquery", version, about = "Ask questions about a hospital database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the SQLite database from a MySQL dump
    Load {
        /// MySQL dump to load
        #[arg(long, env = "DB_SQL_FILE", default_value = DEFAULT_SQL_FILE)]
        sql_file: PathBuf,

        /// SQLite file to create, replacing any existing one
        #[arg(long, env = "DB_SQLITE_PATH", default_value = "hospital.db")]
        database: PathBuf,
    },

    /// Print the schema as it is shown to the model
    Schema,

    /// Answer one question
    Ask {
        question: String,

        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Run one read-only SQL query
    Sql {
        query: String,

        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Send prompts straight to the model until `exit`
    Chat,

    /// Answer questions until `exit`
    Repl,
}

/// Run a parsed command
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Load { sql_file, database } => Ok(load(LoaderConfig {
            sql_file,
            database_path: database,
        })),
        Command::Schema => {
            let pool = open_pool()?;
            println!("{}", pool.schema()?.to_prompt_context());
            Ok(ExitCode::SUCCESS)
        }
        Command::Ask { question, max_rows } => {
            let service = query_service()?;
            let answer = service
                .ask(AskRequest {
                    question,
                    max_rows,
                })
                .await?;
            println!("{}", render_answer(&answer));
            Ok(ExitCode::SUCCESS)
        }
        Command::Sql { query, max_rows } => {
            let service = query_service()?;
            let result = service.run_sql(&query, max_rows).await?;
            println!("{}", format_table(&result));
            Ok(ExitCode::SUCCESS)
        }
        Command::Chat => {
            let session = ChatSession::new(llm_client()?);
            let session = &session;
            let stdin = io::stdin();
            let mut stdout = io::stdout();

            run_prompt_loop(stdin.lock(), &mut stdout, |prompt| async move {
                match session.send(&prompt).await {
                    Ok(reply) => reply.reply,
                    Err(e) => format!("Error: {}", e),
                }
            })
            .await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Repl => {
            let service = query_service()?;
            let service = &service;
            let stdin = io::stdin();
            let mut stdout = io::stdout();

            run_prompt_loop(stdin.lock(), &mut stdout, |question| async move {
                match service.ask(AskRequest::new(question)).await {
                    Ok(answer) => render_answer(&answer),
                    Err(e) => format!("Error: {}", e),
                }
            })
            .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load(config: LoaderConfig) -> ExitCode {
    info!(
        "Loading {} into {}",
        config.sql_file.display(),
        config.database_path.display()
    );

    match loader::create_database(&config) {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Database creation failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_pool() -> anyhow::Result<DatabasePool> {
    Ok(DatabasePool::open(&DatabaseConfig::from_env())?)
}

fn llm_client() -> anyhow::Result<Arc<HuggingFaceClient>> {
    Ok(Arc::new(HuggingFaceClient::new(LlmConfig::from_env())?))
}

fn query_service() -> anyhow::Result<QueryService<HuggingFaceClient>> {
    Ok(QueryService::new(
        open_pool()?,
        llm_client()?,
        QueryServiceConfig::from_env(),
    )?)
}

/// Read prompts until `exit` or end of input, writing each reply.
///
/// Blank lines are ignored. The session always ends with [`END_OF_SESSION`].
pub async fn run_prompt_loop<R, W, F, Fut>(
    mut input: R,
    output: &mut W,
    mut handle: F,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = String>,
{
    let mut line = String::new();

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 || is_exit(&line) {
            break;
        }

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        let reply = handle(prompt.to_string()).await;
        writeln!(output, "{}\n", reply)?;
    }

    writeln!(output, "{}", END_OF_SESSION)?;
    output.flush()
}

/// SQL followed by the result table
pub fn render_answer(answer: &QueryAnswer) -> String {
    format!("SQL: {}\n\n{}", answer.sql, format_table(&answer.result))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render rows as a plain-text table
pub fn format_table(result: &QueryResult) -> String {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(render_value).collect())
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{:<width$}", value, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(&result.columns)];
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(cells.iter().map(|row| format_row(row)));

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    if result.truncated {
        lines.push(format!("({} {}, truncated)", result.row_count, noun));
    } else {
        lines.push(format!("({} {})", result.row_count, noun));
    }

    lines.join("\n")
}
