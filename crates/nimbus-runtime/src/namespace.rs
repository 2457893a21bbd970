//! Diretório de estado por namespace, sob `~/.nimbus/<ns>`.
//!
//! O caminho é função pura do nome do namespace: repetir `start` com o
//! mesmo nome sempre alcança os mesmos arquivos, e `stop`/`destroy`
//! encontram o que um `start` anterior gravou.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const OVERLAY_FILE: &str = "compose.override.yml";
pub const CONFIG_FILE: &str = "storage.toml";

const BASE_TEMPLATE_FILE: &str = "base-compose.yml";
const BASE_TEMPLATE: &str = include_str!("../assets/base-compose.yml");

/// Estado do namespace, derivado uma única vez por comando a partir da
/// existência do diretório.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceState {
    Absent,
    Provisioned,
}

/// Visão dos caminhos de um namespace. Os acessores não fazem I/O.
#[derive(Debug, Clone)]
pub struct NamespacePaths {
    root: PathBuf,
}

/// Raiz de estado da ferramenta. Sem diretório home, cai para um caminho
/// relativo ao diretório corrente.
pub fn state_root() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".nimbus"),
        None => PathBuf::from(".nimbus"),
    }
}

impl NamespacePaths {
    pub fn resolve(namespace: &str) -> Self {
        Self::at_root(&state_root(), namespace)
    }

    pub fn at_root(root: &Path, namespace: &str) -> Self {
        Self {
            root: root.join(namespace),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.root.join(OVERLAY_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn state(&self) -> NamespaceState {
        if self.root.is_dir() {
            NamespaceState::Provisioned
        } else {
            NamespaceState::Absent
        }
    }

    /// Cria o diretório do namespace. Idempotente; só falha por permissão
    /// ou erro de I/O real.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).with_context(|| {
            format!(
                "failed to create namespace directory '{}'",
                self.root.display()
            )
        })
    }

    /// Remove o diretório inteiro do namespace. Diretório já ausente conta
    /// como sucesso.
    pub fn destroy(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!(
                    "failed to remove namespace directory '{}'",
                    self.root.display()
                )
            }),
        }
    }

    /// Grava o overlay por inteiro, sobrescrevendo qualquer versão anterior.
    pub fn write_overlay(&self, yaml: &str) -> Result<()> {
        fs::write(self.overlay_path(), yaml).with_context(|| {
            format!("failed to write '{}'", self.overlay_path().display())
        })
    }

    /// Grava a configuração do motor de armazenamento por inteiro.
    pub fn write_config(&self, text: &str) -> Result<()> {
        fs::write(self.config_path(), text).with_context(|| {
            format!("failed to write '{}'", self.config_path().display())
        })
    }
}

/// Materializa o template base embutido sob a raiz de estado e devolve o
/// caminho. Sobrescreve a cada chamada, então `stop`/`destroy` funcionam
/// mesmo depois de uma limpeza externa do arquivo.
pub fn ensure_base_template() -> Result<PathBuf> {
    ensure_base_template_at(&state_root())
}

pub fn ensure_base_template_at(root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(root)
        .with_context(|| format!("failed to create state root '{}'", root.display()))?;
    let path = root.join(BASE_TEMPLATE_FILE);
    fs::write(&path, BASE_TEMPLATE)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;

    fn scratch_root(name: &str) -> PathBuf {
        let root = env::temp_dir().join(format!("nimbus-namespace-test-{name}"));
        if root.exists() {
            let _ = fs::remove_dir_all(&root);
        }
        root
    }

    #[test]
    fn test_paths_are_deterministic() {
        let root = PathBuf::from("/state");
        let paths = NamespacePaths::at_root(&root, "t1");
        assert_eq!(paths.root(), Path::new("/state/t1"));
        assert_eq!(paths.overlay_path(), PathBuf::from("/state/t1/compose.override.yml"));
        assert_eq!(paths.config_path(), PathBuf::from("/state/t1/storage.toml"));
    }

    #[test]
    fn test_state_tracks_directory_existence() {
        let root = scratch_root("state");
        let paths = NamespacePaths::at_root(&root, "ns");

        assert_eq!(paths.state(), NamespaceState::Absent);
        paths.ensure().unwrap();
        assert_eq!(paths.state(), NamespaceState::Provisioned);

        paths.destroy().unwrap();
        assert_eq!(paths.state(), NamespaceState::Absent);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_ensure_and_destroy_are_idempotent() {
        let root = scratch_root("idempotent");
        let paths = NamespacePaths::at_root(&root, "ns");

        paths.ensure().unwrap();
        paths.ensure().unwrap();
        paths.destroy().unwrap();
        // Segundo destroy não encontra nada e ainda assim tem sucesso.
        paths.destroy().unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_writes_replace_previous_content() {
        let root = scratch_root("rewrite");
        let paths = NamespacePaths::at_root(&root, "ns");
        paths.ensure().unwrap();

        paths
            .write_overlay("services:\n  compute:\n    ports: ['6000:55432']\n")
            .unwrap();
        paths.write_overlay("services: {}\n").unwrap();
        let content = fs::read_to_string(paths.overlay_path()).unwrap();
        assert_eq!(content, "services: {}\n");

        paths.write_config("[remote_storage]\nbucket_name = 'a'\n").unwrap();
        paths.write_config("[remote_storage]\nbucket_name = 'b'\n").unwrap();
        let content = fs::read_to_string(paths.config_path()).unwrap();
        assert!(content.contains("'b'"));
        assert!(!content.contains("'a'"));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_base_template_is_materialized() {
        let root = scratch_root("template");
        let path = ensure_base_template_at(&root).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("services:"));
        assert!(content.contains("compute:"));

        // Sobrescrita restaura o conteúdo embutido.
        fs::write(&path, "tampered").unwrap();
        ensure_base_template_at(&root).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("services:"));
        let _ = fs::remove_dir_all(&root);
    }
}
