use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use cloud_failover::cloud::{ArmClient, ArmEndpoints, CloudNetworkApi, Credentials};
use cloud_failover::config::{
    AgentConfig, EipParams, MonitorMode, RouteParams, TimingConfig, DEFAULT_MAPPING_DIR,
};
use cloud_failover::controller::{EipController, RouteController};
use cloud_failover::ocf::{self, Outcome, Verb};
use cloud_failover::telemetry::{self, LogFormat};
use cloud_failover::Result;
use ipnet::Ipv4Net;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log line format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage public-IP associations on this node's interface
    Eip(EipArgs),
    /// Manage next-hops of virtual-appliance routes
    Route(RouteArgs),
}

/// Parameters shared by both controllers. Empty values are reported as
/// configuration errors rather than usage errors.
#[derive(ClapArgs, Debug)]
struct CommonArgs {
    #[arg(long, env = "OCF_RESKEY_subscription_id", default_value = "")]
    subscription_id: String,

    #[arg(long, env = "OCF_RESKEY_resource_group", default_value = "")]
    resource_group: String,

    /// Client id of a user-assigned managed identity
    #[arg(long, env = "OCF_RESKEY_managed_identity_id")]
    managed_identity_id: Option<String>,

    #[arg(long, env = "OCF_RESKEY_application_id")]
    application_id: Option<String>,

    #[arg(long, env = "OCF_RESKEY_secret", hide_env_values = true)]
    secret: Option<String>,

    #[arg(long, env = "OCF_RESKEY_directory_id")]
    directory_id: Option<String>,

    /// Monitor interval in milliseconds; non-zero marks a recurring check
    #[arg(long, env = "OCF_RESKEY_CRM_meta_interval")]
    interval: Option<u64>,

    /// Invocation timeout in milliseconds
    #[arg(long, env = "OCF_RESKEY_CRM_meta_timeout")]
    timeout: Option<u64>,

    /// Compute and log the convergence plan without applying it
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    #[arg(long, env = "ARM_MANAGEMENT_ENDPOINT")]
    management_endpoint: Option<String>,

    #[arg(long, env = "ARM_LOGIN_ENDPOINT")]
    login_endpoint: Option<String>,

    #[arg(long, env = "ARM_IMDS_ENDPOINT")]
    imds_endpoint: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct EipArgs {
    #[arg(value_enum)]
    verb: Verb,

    #[command(flatten)]
    common: CommonArgs,

    /// Interface suffix; the cloud interface is named `{hostname}-{interface}`
    #[arg(long, env = "OCF_RESKEY_interface", default_value = "")]
    interface: String,

    /// Directory holding `{interface}.toml` mapping files
    #[arg(long, env = "OCF_RESKEY_mapping_dir", default_value = DEFAULT_MAPPING_DIR)]
    mapping_dir: PathBuf,

    /// Override the short local hostname
    #[arg(long, env = "OCF_RESKEY_hostname")]
    hostname: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct RouteArgs {
    #[arg(value_enum)]
    verb: Verb,

    #[command(flatten)]
    common: CommonArgs,

    /// Local interface whose address routes should point at
    #[arg(long, env = "OCF_RESKEY_interface", default_value = "")]
    interface: String,

    #[arg(long, env = "OCF_RESKEY_table", default_value = "")]
    table: String,

    /// Use this address/prefix instead of reading it from the interface
    #[arg(long, env = "OCF_RESKEY_local_address")]
    local_address: Option<Ipv4Net>,
}

impl CommonArgs {
    fn agent_config(&self) -> Result<AgentConfig> {
        let credentials = Credentials::select(
            self.managed_identity_id.clone(),
            self.application_id.clone(),
            self.secret.clone(),
            self.directory_id.clone(),
        )?;

        let defaults = ArmEndpoints::default();
        let endpoints = ArmEndpoints {
            management: self.management_endpoint.clone().unwrap_or(defaults.management),
            login: self.login_endpoint.clone().unwrap_or(defaults.login),
            imds: self.imds_endpoint.clone().unwrap_or(defaults.imds),
        };

        let config = AgentConfig {
            subscription_id: self.subscription_id.trim().to_string(),
            resource_group: self.resource_group.trim().to_string(),
            credentials,
            endpoints,
            timing: TimingConfig::from_invocation_timeout(self.timeout),
            monitor_mode: MonitorMode::from_interval(self.interval),
            dry_run: self.dry_run,
        };
        config.validate()?;
        Ok(config)
    }
}

fn arm_client(config: &AgentConfig) -> Result<Arc<dyn CloudNetworkApi>> {
    let client = ArmClient::new(
        &config.subscription_id,
        config.credentials.clone(),
        config.endpoints.clone(),
    )?;
    Ok(Arc::new(client))
}

async fn run(command: Commands) -> Result<Outcome> {
    let verb = match &command {
        Commands::Eip(a) => a.verb,
        Commands::Route(a) => a.verb,
    };
    // Ownership only moves on the peer's start; stop needs no parameters.
    if verb == Verb::Stop {
        info!("Stop requested, cloud state stays as it is until the peer starts");
        return Ok(Outcome::Success);
    }

    match command {
        Commands::Eip(args) => {
            let config = args.common.agent_config()?;
            let params = EipParams {
                interface: args.interface,
                mapping_dir: args.mapping_dir,
                hostname: args.hostname,
            };
            let api = arm_client(&config)?;
            EipController::new(api, config, params)
                .handle(args.verb)
                .await
        }
        Commands::Route(args) => {
            let config = args.common.agent_config()?;
            let params = RouteParams {
                interface: args.interface,
                table: args.table,
                local_address: args.local_address,
            };
            let api = arm_client(&config)?;
            RouteController::new(api, config, params)
                .handle(args.verb)
                .await
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    telemetry::init_logging(args.log_format);

    let (controller, verb) = match &args.command {
        Commands::Eip(a) => ("eip", a.verb),
        Commands::Route(a) => ("route", a.verb),
    };
    info!(
        "cloud-failover v{}: {} {}",
        env!("CARGO_PKG_VERSION"),
        controller,
        verb
    );

    let result = run(args.command).await;
    let outcome = ocf::resolve(&result);
    match &result {
        Ok(_) => info!("{} {} finished: {}", controller, verb, outcome),
        Err(e) => error!("{} {} failed with {}: {}", controller, verb, outcome, e),
    }

    std::process::exit(outcome.exit_code());
}
