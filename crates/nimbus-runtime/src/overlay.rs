//! Documento de overlay aplicado por cima do template base do compose.
//!
//! O overlay é um registro tipado (serviço -> portas/volumes/ambiente) em
//! vez de mapas aninhados sem forma; colisões de chave e erros de
//! estrutura aparecem na construção, não na serialização.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::storage::StorageFragment;

/// Serviço do motor de armazenamento no template base.
pub const STORAGE_SERVICE: &str = "storage";
/// Serviço de computação (front-end do banco) no template base.
pub const COMPUTE_SERVICE: &str = "compute";

/// Porta fixa em que o serviço de computação escuta dentro do container.
pub const COMPUTE_PORT: u16 = 55432;
/// Porta padrão exposta no host.
pub const DEFAULT_HOST_PORT: u16 = 55432;

/// Caminho fixo, dentro do container, do arquivo de configuração do motor
/// de armazenamento.
pub const CONFIG_MOUNT_POINT: &str = "/etc/nimbus/storage.toml";

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Fragmento de um serviço no overlay. Campos vazios não são emitidos, de
/// modo que cada serviço só carrega o que realmente sobrescreve.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct ServiceOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Overlay completo: serviços indexados por nome.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct ComposeOverlay {
    pub services: BTreeMap<String, ServiceOverride>,
}

impl ComposeOverlay {
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize compose overlay")
    }
}

/// Parâmetros de composição de um overlay.
#[derive(Debug)]
pub struct OverlayParams<'a> {
    pub fragment: &'a StorageFragment,
    /// Caminho no host do arquivo de configuração do motor já persistido.
    pub config_path: &'a Path,
    pub host_port: u16,
    pub access_key: Option<&'a str>,
    pub secret_key: Option<&'a str>,
    pub with_minio: bool,
}

/// Monta o documento de overlay. Reconstruído por inteiro a cada `start`;
/// nada de uma invocação anterior sobrevive aqui.
pub fn compose(params: &OverlayParams<'_>) -> ComposeOverlay {
    let mut environment = BTreeMap::new();

    // Credenciais são tudo-ou-nada: um par incompleto é descartado em vez
    // de injetado pela metade.
    if let (Some(access), Some(secret)) = (params.access_key, params.secret_key) {
        environment.insert(ACCESS_KEY_ENV.to_string(), access.to_string());
        environment.insert(SECRET_KEY_ENV.to_string(), secret.to_string());
    }

    // Em colisão de chave, o valor vindo do destino de armazenamento vence.
    for (key, value) in &params.fragment.extra_env {
        if environment.insert(key.clone(), value.clone()).is_some() {
            eprintln!(
                "[nimbus] warning: environment key '{key}' set twice; storage target value wins"
            );
        }
    }

    // O arquivo de configuração vem sempre antes dos mounts extras; um
    // destino duplicado mais adiante não pode sombreá-lo em silêncio.
    let mut volumes = vec![format!(
        "{}:{}:ro",
        params.config_path.display(),
        CONFIG_MOUNT_POINT
    )];
    volumes.extend(params.fragment.extra_mounts.iter().cloned());

    let mut services = BTreeMap::new();
    services.insert(
        STORAGE_SERVICE.to_string(),
        ServiceOverride {
            volumes,
            environment,
            ..Default::default()
        },
    );
    services.insert(
        COMPUTE_SERVICE.to_string(),
        ServiceOverride {
            ports: vec![format!("{}:{}", params.host_port, COMPUTE_PORT)],
            ..Default::default()
        },
    );

    if params.with_minio {
        for (name, service) in MINIO_BUNDLE.iter() {
            services.insert(name.clone(), service.clone());
        }
    }

    ComposeOverlay { services }
}

const MINIO_INIT_SCRIPT: &str = "until (mc alias set minio http://minio:9000 \
     $MINIO_ROOT_USER $MINIO_ROOT_PASSWORD) do echo 'waiting for minio...' && sleep 1; done; \
     mc mb minio/nimbus --region=us-east-1; exit 0;";

/// Pacote fixo do emulador de object store: o servidor e um job de uma
/// passada que cria o bucket inicial. Sem parâmetros; entra no overlay por
/// inteiro quando `--with-minio` é passado.
static MINIO_BUNDLE: Lazy<BTreeMap<String, ServiceOverride>> = Lazy::new(|| {
    let mut credentials = BTreeMap::new();
    credentials.insert("MINIO_ROOT_USER".to_string(), "minio".to_string());
    credentials.insert("MINIO_ROOT_PASSWORD".to_string(), "password".to_string());

    let mut services = BTreeMap::new();
    services.insert(
        "minio".to_string(),
        ServiceOverride {
            image: Some("quay.io/minio/minio:latest".to_string()),
            restart: Some("always".to_string()),
            ports: vec!["9000:9000".to_string(), "9001:9001".to_string()],
            environment: credentials.clone(),
            command: Some("server /data --address :9000 --console-address \":9001\"".to_string()),
            ..Default::default()
        },
    );
    services.insert(
        "minio-init".to_string(),
        ServiceOverride {
            image: Some("minio/mc".to_string()),
            environment: credentials,
            entrypoint: vec!["/bin/sh".to_string(), "-c".to_string()],
            command: Some(MINIO_INIT_SCRIPT.to_string()),
            depends_on: vec!["minio".to_string()],
            ..Default::default()
        },
    );
    services
});
