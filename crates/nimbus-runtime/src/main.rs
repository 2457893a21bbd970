mod driver;
mod namespace;
mod overlay;
mod session;
mod storage;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::process;

use crate::driver::StackDriver;
use crate::namespace::{NamespacePaths, NamespaceState};
use crate::overlay::OverlayParams;

#[derive(Debug, Parser)]
#[command(
    name = "nimbus",
    about = "nimbus: banco de dados serverless local em containers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sobe a pilha de um namespace e espera ficar pronta
    Start(StartArgs),
    /// Para os containers, preservando os dados e arquivos gerados
    Stop {
        #[arg(short = 'n', long, default_value = "main")]
        namespace: String,
    },
    /// Para os containers e apaga o estado gerado do namespace
    Destroy {
        #[arg(short = 'n', long, default_value = "main")]
        namespace: String,
    },
}

#[derive(Debug, Args)]
struct StartArgs {
    /// Namespace que isola esta instância da pilha
    #[arg(short = 'n', long, default_value = "main")]
    namespace: String,

    /// Destino de armazenamento: file://<dir> ou s3://<bucket>[/<prefixo>]
    #[arg(long)]
    path: String,

    /// Região do bucket, repassada sem validação
    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Endpoint S3 customizado (ex.: um MinIO local)
    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long)]
    access_key: Option<String>,

    #[arg(long)]
    secret_key: Option<String>,

    /// Porta do host mapeada para o serviço de computação
    #[arg(long, default_value_t = overlay::DEFAULT_HOST_PORT)]
    port: u16,

    /// Embute um MinIO (e o job de criação de bucket) na pilha
    #[arg(long)]
    with_minio: bool,

    /// Não bloqueia; deixa os containers rodando
    #[arg(long)]
    detach: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("ERROR: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    driver::check_orchestrator()?;

    match cli.command {
        Commands::Start(args) => cmd_start(args),
        Commands::Stop { namespace } => cmd_stop(&namespace),
        Commands::Destroy { namespace } => cmd_destroy(&namespace),
    }
}

fn cmd_start(args: StartArgs) -> Result<()> {
    // Resolver antes de tocar o disco: um URI inválido não deixa rastro.
    let fragment = storage::resolve(&args.path, &args.region, args.endpoint.as_deref())?;

    let paths = NamespacePaths::resolve(&args.namespace);
    paths.ensure()?;
    paths.write_config(&fragment.config_text)?;

    let config_path = paths.config_path();
    let doc = overlay::compose(&OverlayParams {
        fragment: &fragment,
        config_path: &config_path,
        host_port: args.port,
        access_key: args.access_key.as_deref(),
        secret_key: args.secret_key.as_deref(),
        with_minio: args.with_minio,
    });
    paths.write_overlay(&doc.to_yaml()?)?;

    let base = namespace::ensure_base_template()?;
    let stack = StackDriver::new(&args.namespace, base, paths.overlay_path());
    stack.bring_up()?;
    driver::wait_ready(args.port, driver::READY_TIMEOUT)?;

    println!(
        "✓ nimbus ({}) is ready on port {}",
        args.namespace, args.port
    );
    if args.detach {
        return Ok(());
    }

    println!("Press Ctrl-C to stop…");
    session::wait_for_interrupt()?;
    stack.tear_down()
}

fn cmd_stop(namespace: &str) -> Result<()> {
    let paths = NamespacePaths::resolve(namespace);
    if paths.state() == NamespaceState::Absent {
        println!("Namespace '{namespace}' has no recorded state; nothing to stop.");
        return Ok(());
    }

    let base = namespace::ensure_base_template()?;
    StackDriver::new(namespace, base, paths.overlay_path()).tear_down()
}

fn cmd_destroy(namespace: &str) -> Result<()> {
    cmd_stop(namespace)?;

    let paths = NamespacePaths::resolve(namespace);
    paths.destroy()?;
    println!("Namespace '{namespace}' removed.");
    Ok(())
}
