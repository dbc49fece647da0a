//! `plat` - plan, export, and apply schema reconciliation for the estate
//! data store.

mod catalog;
mod config;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use plat::{
    ActionKind, Catalog, Error, LiveState, Plan, PlanOptions, TracedClient, introspect,
};

/// Schema reconciliation for the estate data store.
#[derive(Parser, Debug)]
#[command(name = "plat", version, about)]
struct Cli {
    /// Database connection URL (falls back to DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Introspection timeout in seconds
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what reconciliation would create
    Plan {
        /// Include row-security enforcement and policies
        #[arg(long)]
        policies: bool,
    },
    /// Print the reconciliation plan as SQL, one statement per action
    Export {
        /// Include row-security enforcement and policies
        #[arg(long)]
        policies: bool,

        /// Render the full bootstrap without connecting to a backend
        #[arg(long)]
        assume_empty: bool,
    },
    /// Apply the reconciliation plan, stopping at the first failure
    Apply {
        /// Include row-security enforcement and policies
        #[arg(long)]
        policies: bool,
    },
    /// Print the declared catalog
    Catalog,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // any catalog problem blocks every command, before touching the backend
    let catalog = catalog::estate()?;

    let Cli {
        database_url,
        timeout_secs,
        command,
    } = cli;

    match command {
        Commands::Plan { policies } => {
            let plan = remote_plan(database_url, timeout_secs, &catalog, policies).await?;
            if plan.is_empty() {
                println!("Nothing to apply.");
            } else {
                print_plan(&plan);
                println!();
                println!("{} actions. Run `plat apply` to execute them.", plan.len());
            }
        }
        Commands::Export {
            policies,
            assume_empty,
        } => {
            let plan = if assume_empty {
                catalog.plan(
                    &LiveState::new(),
                    PlanOptions {
                        enforce_policies: policies,
                    },
                )
            } else {
                remote_plan(database_url, timeout_secs, &catalog, policies).await?
            };
            print!("{}", plan.to_sql());
        }
        Commands::Apply { policies } => {
            let settings = config::resolve(database_url, timeout_secs)?;
            let client = TracedClient::connect(&settings.database_url).await?;
            let live = introspect(&client, settings.timeout).await?;
            let plan = catalog.plan(
                &live,
                PlanOptions {
                    enforce_policies: policies,
                },
            );

            if plan.is_empty() {
                println!("Nothing to apply.");
                return Ok(());
            }

            let total = plan.len();
            for (applied, action) in plan.actions.iter().enumerate() {
                println!("  {}", action);
                if let Err(e) = client.batch_execute(&action.to_sql()).await {
                    eprintln!(
                        "applied {}/{} actions; rerunning `plat apply` resumes from the failed one",
                        applied, total
                    );
                    return Err(Error::Apply {
                        target: action.target().to_string(),
                        source: e,
                    }
                    .into());
                }
            }
            println!("Applied {} actions.", total);
        }
        Commands::Catalog => print_catalog(&catalog),
    }

    Ok(())
}

/// Introspect the backend and plan against it.
async fn remote_plan(
    database_url: Option<String>,
    timeout_secs: u64,
    catalog: &Catalog,
    policies: bool,
) -> Result<Plan, Box<dyn std::error::Error>> {
    let settings = config::resolve(database_url, timeout_secs)?;
    tracing::info!(
        database = %config::mask_password(&settings.database_url),
        "introspecting backend"
    );
    let client = TracedClient::connect(&settings.database_url).await?;
    let live = introspect(&client, settings.timeout).await?;
    Ok(catalog.plan(
        &live,
        PlanOptions {
            enforce_policies: policies,
        },
    ))
}

fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        match &action.kind {
            ActionKind::CreateEntity(_) | ActionKind::CreateIndex(_) => {
                println!("  {}", action.to_string().green());
            }
            ActionKind::EnableRowSecurity { .. } => {
                println!("  {}", action.to_string().yellow());
            }
            ActionKind::CreatePolicy(_) => {
                println!("  {}", action.to_string().cyan());
            }
        }
    }
}

fn print_catalog(catalog: &Catalog) {
    println!("Catalog ({} entities):", catalog.entity_count());
    println!();
    for entity in catalog.entities() {
        println!("  {} ({} columns)", entity.name, entity.columns.len());
        for col in &entity.columns {
            let mut attrs = Vec::new();
            if col.primary_key {
                attrs.push("PK".to_string());
            }
            if col.unique {
                attrs.push("UNIQUE".to_string());
            }
            if !col.nullable && !col.primary_key {
                attrs.push("NOT NULL".to_string());
            }
            if let Some(default) = &col.default {
                attrs.push(format!("DEFAULT {}", default));
            }

            let attrs_str = if attrs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", attrs.join(", "))
            };

            println!("    {}: {}{}", col.name, col.col_type, attrs_str);
        }

        for fk in &entity.foreign_keys {
            println!(
                "    FK: {} -> {}.{}",
                fk.column, fk.references_entity, fk.references_column
            );
        }

        for idx in catalog.indexes_for(&entity.name) {
            let unique = if idx.unique { "UNIQUE " } else { "" };
            println!("    {}INDEX: {}", unique, idx.name);
        }

        for policy in catalog.policies_for(&entity.name) {
            println!("    POLICY: {} ({})", policy.name, policy.operation);
        }

        println!();
    }
}
