//! Resolução do destino de armazenamento do motor de páginas.
//!
//! Um URI `file://<dir>` ou `s3://<bucket>[/<prefixo>]` é convertido no
//! trecho de configuração que o motor de armazenamento lê, mais as
//! variáveis de ambiente e bind mounts que o destino exige. Nenhum
//! arquivo é escrito aqui; quem chama persiste o resultado.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

/// Ponto de montagem do diretório local dentro do container de armazenamento.
pub const LOCAL_MOUNT_POINT: &str = "/remote_storage";

/// Variável de ambiente que carrega o endpoint S3 customizado. Clientes que
/// não leem o arquivo de configuração dependem dela.
pub const ENDPOINT_ENV: &str = "NIMBUS_S3_ENDPOINT";

/// Destino de armazenamento já interpretado a partir do URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    /// Diretório no host, montado dentro do container.
    Local { dir: PathBuf },
    /// Bucket em um object store compatível com S3.
    ObjectStore { bucket: String, prefix: String },
}

impl StorageTarget {
    /// Interpreta o URI. Qualquer esquema fora de `file://`/`s3://` é um
    /// erro de configuração fatal, detectado antes de tocar disco ou
    /// containers.
    pub fn parse(path: &str) -> Result<Self> {
        if let Some(raw) = path.strip_prefix("file://") {
            return Ok(StorageTarget::Local {
                dir: absolutize(raw)?,
            });
        }

        if let Some(rest) = path.strip_prefix("s3://") {
            // s3://<bucket>(/<prefixo>)? — o prefixo mantém a barra inicial.
            let (bucket, prefix) = match rest.split_once('/') {
                Some((bucket, tail)) => (bucket.to_string(), format!("/{tail}")),
                None => (rest.to_string(), String::new()),
            };
            if bucket.is_empty() {
                bail!("s3 URI '{path}' is missing a bucket name");
            }
            return Ok(StorageTarget::ObjectStore { bucket, prefix });
        }

        bail!("path must start with file:// or s3:// (got '{path}')");
    }
}

/// Resultado da resolução: texto de configuração do motor de armazenamento,
/// variáveis de ambiente extras e bind mounts extras para o serviço.
#[derive(Debug, Clone, Default)]
pub struct StorageFragment {
    pub config_text: String,
    pub extra_env: BTreeMap<String, String>,
    pub extra_mounts: Vec<String>,
}

/// Resolve o URI em um [`StorageFragment`]. Função pura de entrada para
/// saída; `region` é repassada sem validação.
pub fn resolve(path: &str, region: &str, endpoint: Option<&str>) -> Result<StorageFragment> {
    match StorageTarget::parse(path)? {
        StorageTarget::Local { dir } => Ok(StorageFragment {
            config_text: format!("[remote_storage]\nlocal_path = '{LOCAL_MOUNT_POINT}'\n"),
            extra_env: BTreeMap::new(),
            extra_mounts: vec![format!("{}:{}", dir.display(), LOCAL_MOUNT_POINT)],
        }),
        StorageTarget::ObjectStore { bucket, prefix } => {
            let mut config_text = format!(
                "[remote_storage]\n\
                 bucket_name = '{bucket}'\n\
                 bucket_region = '{region}'\n\
                 prefix_in_bucket = '{prefix}'\n"
            );
            let mut extra_env = BTreeMap::new();
            if let Some(endpoint) = endpoint {
                // Endpoint vai nos dois lugares: o motor lê o arquivo, os
                // clientes auxiliares leem a variável de ambiente.
                config_text.push_str(&format!("endpoint = '{endpoint}'\n"));
                extra_env.insert(ENDPOINT_ENV.to_string(), endpoint.to_string());
            }
            Ok(StorageFragment {
                config_text,
                extra_env,
                extra_mounts: Vec::new(),
            })
        }
    }
}

/// Expande `~` e torna caminhos relativos absolutos em relação ao diretório
/// corrente. O diretório não precisa existir: o orquestrador cria a origem
/// de um bind mount ausente.
fn absolutize(raw: &str) -> Result<PathBuf> {
    let expanded = expand_home(raw);
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(env::current_dir()?.join(expanded))
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_local_target() {
        let target = StorageTarget::parse("file:///tmp/data").unwrap();
        assert_eq!(
            target,
            StorageTarget::Local {
                dir: PathBuf::from("/tmp/data")
            }
        );
    }

    #[test]
    fn test_parse_relative_local_target_becomes_absolute() {
        let target = StorageTarget::parse("file://data/dir").unwrap();
        match target {
            StorageTarget::Local { dir } => assert!(dir.is_absolute()),
            other => panic!("expected local target, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bucket_without_prefix() {
        let target = StorageTarget::parse("s3://mybucket").unwrap();
        assert_eq!(
            target,
            StorageTarget::ObjectStore {
                bucket: "mybucket".to_string(),
                prefix: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_bucket_with_prefix_keeps_leading_slash() {
        let target = StorageTarget::parse("s3://mybucket/a/b").unwrap();
        assert_eq!(
            target,
            StorageTarget::ObjectStore {
                bucket: "mybucket".to_string(),
                prefix: "/a/b".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = StorageTarget::parse("ftp://bad").unwrap_err();
        assert!(err.to_string().contains("file:// or s3://"));
    }

    #[test]
    fn test_parse_rejects_empty_bucket() {
        assert!(StorageTarget::parse("s3://").is_err());
        assert!(StorageTarget::parse("s3:///prefix").is_err());
    }

    #[test]
    fn test_local_fragment_has_single_mount_and_no_env() {
        let fragment = resolve("file:///tmp/data", "us-east-1", None).unwrap();
        assert_eq!(
            fragment.extra_mounts,
            vec!["/tmp/data:/remote_storage".to_string()]
        );
        assert!(fragment.extra_env.is_empty());
        assert!(fragment.config_text.contains("local_path = '/remote_storage'"));
    }

    #[test]
    fn test_object_store_fragment_fields() {
        let fragment = resolve("s3://mybucket/prefix", "eu-west-2", None).unwrap();
        assert!(fragment.extra_mounts.is_empty());

        // O texto gerado é TOML válido no dialeto do motor.
        let value: toml::Value = toml::from_str(&fragment.config_text).unwrap();
        let section = &value["remote_storage"];
        assert_eq!(section["bucket_name"].as_str(), Some("mybucket"));
        assert_eq!(section["bucket_region"].as_str(), Some("eu-west-2"));
        assert_eq!(section["prefix_in_bucket"].as_str(), Some("/prefix"));
        assert!(section.get("endpoint").is_none());
    }

    #[test]
    fn test_endpoint_sets_config_and_env_together() {
        let fragment =
            resolve("s3://mybucket", "us-east-1", Some("http://localhost:9000")).unwrap();
        assert!(fragment
            .config_text
            .contains("endpoint = 'http://localhost:9000'"));
        assert_eq!(
            fragment.extra_env.get(ENDPOINT_ENV),
            Some(&"http://localhost:9000".to_string())
        );
    }

    #[test]
    fn test_region_forwarded_verbatim() {
        let fragment = resolve("s3://b", "not-a-real-region", None).unwrap();
        assert!(fragment
            .config_text
            .contains("bucket_region = 'not-a-real-region'"));
    }

    #[test]
    fn test_empty_prefix_is_rendered_empty() {
        let fragment = resolve("s3://mybucket", "us-east-1", None).unwrap();
        assert!(fragment.config_text.contains("prefix_in_bucket = ''"));
    }
}
