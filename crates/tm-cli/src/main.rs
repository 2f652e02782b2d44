use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tm", version, about = "Tripmates backend CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Apply database migrations
    Migrate,
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TM_USER_PASSWORD")]
        password: String,
        #[arg(long, default_value = "")]
        full_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = tm_api::load_config()?;
            tm_api::run(config).await?;
        }
        Commands::Migrate => {
            tm_core::logging::init("tm-cli");
            let database_url = tm_core::config::required_env("DATABASE_URL")?;
            let pool = tm_core::db::connect(&database_url).await?;
            tm_core::migrations::run(&pool).await?;
            tracing::info!("migrations applied");
        }
        Commands::User { command } => {
            tm_core::logging::init("tm-cli");
            let database_url = tm_core::config::required_env("DATABASE_URL")?;
            let pool = tm_core::db::connect(&database_url).await?;
            tm_core::migrations::run(&pool).await?;
            match command {
                UserCommand::Create {
                    username,
                    email,
                    password,
                    full_name,
                } => {
                    let user_id =
                        tm_api::create_account(&pool, &username, &email, &password, &full_name)
                            .await?;
                    tracing::info!(user_id, username = %username, "user created");
                }
            }
        }
    }

    Ok(())
}
