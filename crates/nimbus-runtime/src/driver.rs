//! Invocação do orquestrador externo e observação de prontidão.
//!
//! O docker compose é tratado como caixa-preta: recebe o template base e o
//! overlay, nessa ordem, e qualquer saída diferente de zero é falha dura.
//! A prontidão é observada só de fora, por conexão TCP na porta exposta.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

const ORCHESTRATOR: &str = "docker";

/// Cadência do laço de prontidão. Alvo em localhost; sem backoff.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Limite padrão de espera pela prontidão do serviço de computação.
pub const READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Verifica se o binário do orquestrador existe no PATH. Erro de
/// configuração, detectado antes de qualquer outra coisa.
pub fn check_orchestrator() -> Result<()> {
    Command::new(ORCHESTRATOR)
        .arg("--version")
        .output()
        .map(|_| ())
        .context("'docker' not found on PATH; install Docker and try again")
}

/// Driver de ciclo de vida de uma pilha: um projeto compose nomeado pelo
/// namespace, mais os dois arquivos de configuração que o definem.
pub struct StackDriver {
    project: String,
    base: PathBuf,
    overlay: PathBuf,
}

impl StackDriver {
    pub fn new(project: &str, base: PathBuf, overlay: PathBuf) -> Self {
        Self {
            project: project.to_string(),
            base,
            overlay,
        }
    }

    /// Argumentos comuns a todo subcomando. O template base vem sempre
    /// antes do overlay; o merge do compose dá precedência ao último
    /// arquivo por chave.
    fn compose_args(&self, tail: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "compose".into(),
            "-p".into(),
            self.project.clone().into(),
            "-f".into(),
            self.base.clone().into(),
            "-f".into(),
            self.overlay.clone().into(),
        ];
        args.extend(tail.iter().map(|arg| OsString::from(*arg)));
        args
    }

    fn run_compose(&self, tail: &[&str]) -> Result<()> {
        let status = Command::new(ORCHESTRATOR)
            .args(self.compose_args(tail))
            .status()
            .with_context(|| format!("failed to invoke 'docker compose {}'", tail.join(" ")))?;

        if !status.success() {
            match status.code() {
                Some(code) => bail!("docker compose {} exited with code {code}", tail.join(" ")),
                None => bail!("docker compose {} was terminated by a signal", tail.join(" ")),
            }
        }
        Ok(())
    }

    /// Sobe a pilha: `pull` e depois `up -d`, síncronos e nessa ordem.
    /// Sem rollback em falha; estado parcial fica para o operador.
    pub fn bring_up(&self) -> Result<()> {
        self.run_compose(&["pull"]).context("backend startup failed")?;
        self.run_compose(&["up", "-d"])
            .context("backend startup failed")?;
        Ok(())
    }

    /// Derruba a pilha. Sem overlay gravado não há o que parar: sucesso
    /// informativo, sem invocar o orquestrador.
    pub fn tear_down(&self) -> Result<()> {
        if !self.overlay.exists() {
            println!("Stack '{}' is not running.", self.project);
            return Ok(());
        }
        self.run_compose(&["down"])
    }
}

/// Espera a porta aceitar conexões TCP: uma tentativa por segundo até o
/// limite. Em timeout os containers ficam de pé para diagnóstico via logs.
pub fn wait_ready(port: u16, timeout: Duration) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let deadline = Instant::now() + timeout;

    loop {
        if TcpStream::connect_timeout(&addr, POLL_INTERVAL).is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!(
                "stack not ready in time on port {port} after {}s; check container logs",
                timeout.as_secs()
            );
        }
        thread::sleep(POLL_INTERVAL);
    }
}
