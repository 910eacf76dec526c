use std::fs;
use std::io;
use std::io::IsTerminal;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use sobject_graphql::Configuration;
use sobject_graphql::FileMetadataSource;
use sobject_graphql::GraphQLService;
use sobject_graphql::LiveSchema;
use sobject_graphql::RestClient;
use sobject_graphql::SObjectSchema;
use sobject_graphql::configuration::generate_config_schema;
use sobject_graphql::graphql;
use sobject_graphql::query::QueryPlanner;
use sobject_graphql::query::parse_operation;
use tracing_subscriber::EnvFilter;

/// CLI arguments. See <https://docs.rs/clap/latest/clap/_derive/index.html>
#[derive(Parser)]
struct Args {
    /// Log level (off|error|warn|info|debug|trace).
    #[clap(long = "log", default_value = "warn", global = true, env = "SOBJECT_GRAPHQL_LOG")]
    log_level: String,

    /// Configuration file, in YAML.
    #[clap(short, long = "config", global = true, env = "SOBJECT_GRAPHQL_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Prints the GraphQL schema inferred from the organization's objects
    Schema {
        /// Read describe results from `<Object>.json` files instead of the organization
        #[clap(long)]
        describe_dir: Option<PathBuf>,
    },
    /// Prints the SOQL query compiled for each root field of a GraphQL query
    Plan {
        /// Read describe results from `<Object>.json` files instead of the organization
        #[clap(long)]
        describe_dir: Option<PathBuf>,
        /// The operation to run, when the document has several
        #[clap(long)]
        operation_name: Option<String>,
        /// The path to the GraphQL query, or `-` for stdin
        query: PathBuf,
    },
    /// Runs a GraphQL query against the organization and prints the response
    Query {
        /// The operation to run, when the document has several
        #[clap(long)]
        operation_name: Option<String>,
        /// The path to the GraphQL query, or `-` for stdin
        query: PathBuf,
    },
    /// Prints the JSON schema of the configuration file
    ConfigSchema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let builder = tracing_subscriber::fmt::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).context("could not parse log configuration")?,
        );
    if io::stderr().is_terminal() {
        builder.init();
    } else {
        builder.json().init();
    }

    let configuration = load_configuration(args.config_path.as_deref())?;
    match args.command {
        Command::Schema { describe_dir } => {
            let schema = build_schema(&configuration, describe_dir.as_deref()).await?;
            println!("{}", schema.sdl());
        }
        Command::Plan {
            describe_dir,
            operation_name,
            query,
        } => {
            let schema = build_schema(&configuration, describe_dir.as_deref()).await?;
            let planner = QueryPlanner::new(configuration.schema.max_parent_depth);
            for root in parse_operation(&read_input(&query)?, operation_name.as_deref())? {
                let plan = planner.plan(schema.graph(), schema.query_type_name(), &root)?;
                println!("{}: {}", plan.response_key, plan.soql);
            }
        }
        Command::Query {
            operation_name,
            query,
        } => {
            let client = Arc::new(RestClient::connect(configuration.connection.clone()).await?);
            let schema = SObjectSchema::fetch(client.as_ref(), &configuration.schema).await?;
            let service = GraphQLService::new(
                Arc::new(LiveSchema::new(schema)),
                client,
                &configuration.schema,
            );
            let mut request = graphql::Request::new(read_input(&query)?);
            if let Some(operation_name) = operation_name {
                request = request.with_operation_name(operation_name);
            }
            let response = service.execute(request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::ConfigSchema => {
            let schema = generate_config_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }
    Ok(())
}

fn load_configuration(path: Option<&Path>) -> Result<Configuration> {
    let Some(path) = path else {
        return Ok(Configuration::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("could not read configuration file {}", path.display()))?;
    contents
        .parse()
        .with_context(|| format!("invalid configuration file {}", path.display()))
}

async fn build_schema(
    configuration: &Configuration,
    describe_dir: Option<&Path>,
) -> Result<SObjectSchema> {
    let schema = match describe_dir {
        Some(directory) => {
            SObjectSchema::fetch(&FileMetadataSource::new(directory), &configuration.schema).await?
        }
        None => {
            let client = RestClient::connect(configuration.connection.clone()).await?;
            SObjectSchema::fetch(&client, &configuration.schema).await?
        }
    };
    let report = schema.report();
    tracing::info!(
        schema_id = %schema.id(),
        dropped_objects = report.dropped_objects.len(),
        unresolved_references = report.unresolved_references.len(),
        "schema built"
    );
    Ok(schema)
}

fn read_input(path: &Path) -> Result<String> {
    let input = if path == Path::new("-") {
        io::read_to_string(io::stdin())?
    } else {
        fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?
    };
    Ok(input)
}
